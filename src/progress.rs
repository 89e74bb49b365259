use std::time::Duration;
use std::iter::Enumerate;

use console::style;
use indicatif::ProgressBar;
use indicatif::ProgressStyle;

/**
Everything the pipeline wants to tell the operator goes through this trait. The messages are passed as callbacks so an observer that doesn't care (`()`) never has to format them.
*/
pub(crate) trait ProgressObserver {

    fn announce<Message: AsRef<str>, Callback: FnOnce() -> Message>(&mut self, callback: Callback);

    fn start<Message: AsRef<str>, Callback: FnOnce() -> (Message,Option<usize>)>(&mut self, callback: Callback);

    fn start_unknown_endpoint<Message: AsRef<str>, Callback: FnOnce() -> Message>(&mut self, callback: Callback);

    fn update<Callback: FnOnce() -> usize>(&self, callback: Callback);

    fn message<Message: AsRef<str>, Callback: FnOnce() -> Message>(&self, callback: Callback);

    fn warning<Message: AsRef<str>, Callback: FnOnce() -> Message>(&self, callback: Callback);

    fn finish<Message: AsRef<str>, Callback: FnOnce() -> Message>(&mut self, callback: Callback);

}


// This one allows for not observing when you don't need it, mostly in tests.
impl ProgressObserver for () {

    fn announce<Message: AsRef<str>, Callback: FnOnce() -> Message>(&mut self, _: Callback) {
    }

    fn start<Message: AsRef<str>, Callback: FnOnce() -> (Message,Option<usize>)>(&mut self, _: Callback) {
    }

    fn start_unknown_endpoint<Message: AsRef<str>, Callback: FnOnce() -> Message>(&mut self, _: Callback) {
    }

    fn update<Callback: FnOnce() -> usize>(&self, _: Callback) {
    }

    fn message<Message: AsRef<str>, Callback: FnOnce() -> Message>(&self, _: Callback) {
    }

    fn warning<Message: AsRef<str>, Callback: FnOnce() -> Message>(&self, _: Callback){
    }

    fn finish<Message: AsRef<str>, Callback: FnOnce() -> Message>(&mut self, _: Callback) {
    }
}


pub(crate) struct ConsoleProgressBar {

    bar: Option<ProgressBar>

}

impl ConsoleProgressBar {

    pub(crate) const fn new() -> Self {
        Self {
            bar: None
        }
    }

    fn spinner_style() -> ProgressStyle {
        // the templates are constants, so the only way this fails is if I typo one of them.
        ProgressStyle::with_template("({elapsed_precise}) {msg} {spinner}").unwrap_or_else(|_| ProgressStyle::default_spinner())
    }

    fn progress_style() -> ProgressStyle {
        ProgressStyle::with_template("({elapsed_precise}) [{bar:40}] {pos}/{len} {msg} {spinner}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> ")
    }

    fn finished_style() -> ProgressStyle {
        ProgressStyle::with_template("({elapsed_precise}) {msg}").unwrap_or_else(|_| ProgressStyle::default_bar())
    }

    fn start_bar<Message: AsRef<str>>(&mut self, message: Message, step_count: Option<usize>) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
        let bar = if let Some(step_count) = step_count {
            ProgressBar::new(step_count as u64).with_style(Self::progress_style())
        } else {
            let bar = ProgressBar::new_spinner().with_style(Self::spinner_style());
            bar.enable_steady_tick(Duration::from_millis(100));
            bar
        };
        bar.set_message(message.as_ref().to_owned());
        self.bar = Some(bar);
    }

}

impl ProgressObserver for ConsoleProgressBar {

    fn announce<Message: AsRef<str>, Callback: FnOnce() -> Message>(&mut self, callback: Callback) {
        let message = format!("== {} ==",callback().as_ref());
        if let Some(bar) = &self.bar {
            bar.println(message);
        } else {
            println!("{}",style(message).bold());
        }
    }

    fn start<Message: AsRef<str>, Callback: FnOnce() -> (Message,Option<usize>)>(&mut self, callback: Callback) {
        let (message,step_count) = callback();
        self.start_bar(message, step_count);
    }

    fn start_unknown_endpoint<Message: AsRef<str>, Callback: FnOnce() -> Message>(&mut self, callback: Callback) {
        self.start_bar(callback(), None);
    }

    fn update<Callback: FnOnce() -> usize>(&self, callback: Callback) {
        if let Some(bar) = &self.bar {
            bar.set_position(callback() as u64);
        }
    }

    fn message<Message: AsRef<str>, Callback: FnOnce() -> Message>(&self, callback: Callback) {
        if let Some(bar) = &self.bar {
            bar.set_message(callback().as_ref().to_owned());
        } else {
            println!("{}",callback().as_ref());
        }
    }

    fn warning<Message: AsRef<str>, Callback: FnOnce() -> Message>(&self, callback: Callback){
        let message = format!("{} {}",style("warning:").yellow().bold(),callback().as_ref());
        if let Some(bar) = &self.bar {
            bar.println(message);
        } else {
            eprintln!("{}",message);
        }
    }

    fn finish<Message: AsRef<str>, Callback: FnOnce() -> Message>(&mut self, callback: Callback) {
        if let Some(bar) = self.bar.take() {
            bar.set_style(Self::finished_style());
            bar.finish_with_message(callback().as_ref().to_owned());
        } else {
            println!("{}",callback().as_ref());
        }
    }

}

pub(crate) struct IteratorWatcher<'progress,Message: AsRef<str>, Progress: ProgressObserver, IteratorType> {
    finish: Message,
    progress: &'progress mut Progress,
    inner: Enumerate<IteratorType>
}

impl<Message: AsRef<str>, Progress: ProgressObserver, ItemType, IteratorType: Iterator<Item=ItemType>> Iterator for IteratorWatcher<'_,Message,Progress,IteratorType> {

    type Item = ItemType;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some((i,next)) = self.inner.next() {
            self.progress.update(|| i);
            Some(next)
        } else {
            self.progress.finish(|| &self.finish);
            None
        }

    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }

}

pub(crate) trait WatchableIterator: Iterator + Sized {

    fn watch<StartMessage: AsRef<str>, FinishMessage: AsRef<str>, Progress: ProgressObserver>(self, progress: &mut Progress, start: StartMessage, finish: FinishMessage) -> IteratorWatcher<'_, FinishMessage, Progress, Self>;
}

impl<IteratorType: Iterator> WatchableIterator for IteratorType {

    fn watch<StartMessage: AsRef<str>, FinishMessage: AsRef<str>, Progress: ProgressObserver>(self, progress: &mut Progress, start: StartMessage, finish: FinishMessage) -> IteratorWatcher<'_, FinishMessage, Progress, Self> {
        progress.start(|| (start,self.size_hint().1));
        IteratorWatcher {
            finish,
            progress,
            inner: self.enumerate()
        }

    }

}
