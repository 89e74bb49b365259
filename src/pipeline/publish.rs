use std::path::Path;
use std::path::PathBuf;

use crate::context::RunContext;
use crate::errors::CommandError;
use crate::progress::ProgressObserver;
use crate::tools::ToolInvocation;
use crate::tools::Toolbox;
use crate::tools::ToolRunner;
use crate::utils::replace_tree;

pub(crate) const SITE_TILES_DIR: &str = "tiles";

#[derive(Debug,Clone,PartialEq,Eq)]
pub(crate) struct PublishOptions {
    pub(crate) root: PathBuf,
    pub(crate) site_dir: Option<PathBuf>,
    pub(crate) commit: bool,
    /// A program followed by its arguments. Empty means there's nothing to deploy.
    pub(crate) deploy: Vec<String>
}

impl PublishOptions {

    /// The copies a publish would make, in the order it makes them.
    pub(crate) fn destinations(&self, context: &RunContext) -> Vec<PathBuf> {
        let subpath = context.publish_subpath();
        let mut result = vec![self.root.join(&subpath)];
        if let Some(site_dir) = &self.site_dir {
            result.push(site_dir.join(SITE_TILES_DIR).join(&subpath));
        }
        result
    }
}

fn commit_message(context: &RunContext) -> String {
    format!("Update tiles {}",context.timestamp())
}

fn commit<Runner: ToolRunner, Progress: ProgressObserver>(runner: &mut Runner, tools: &Toolbox, repository: &Path, context: &RunContext, progress: &mut Progress) -> Result<(),CommandError> {
    _ = runner.run(&tools.git().current_dir(repository).arg("add").arg("-A"))?;

    let status = runner.run(&tools.git().current_dir(repository).arg("status").arg("--porcelain"))?;
    if status.stdout.trim().is_empty() {
        progress.warning(|| "Published tiles are identical to the last commit, nothing to commit.");
        return Ok(())
    }

    progress.start_unknown_endpoint(|| "Committing published tiles.");
    _ = runner.run(&tools.git().current_dir(repository).arg("commit").arg("-m").arg(commit_message(context)))?;
    _ = runner.run(&tools.git().current_dir(repository).arg("push"))?;
    progress.finish(|| "Published tiles committed and pushed.");
    Ok(())
}

/**
Copies the canonical tile tree to the publish root (and the site directory, if there is one), then commits and deploys when asked to. Each destination is replaced entirely, so nothing from an earlier publish to the same place survives. This is only ever called after every other stage has succeeded.
*/
pub(crate) fn publish<Runner: ToolRunner, Progress: ProgressObserver>(runner: &mut Runner, tools: &Toolbox, context: &RunContext, options: &PublishOptions, progress: &mut Progress) -> Result<Vec<PathBuf>,CommandError> {

    let destinations = options.destinations(context);
    for destination in &destinations {
        progress.start_unknown_endpoint(|| format!("Publishing to '{}'.",destination.display()));
        let copied = replace_tree(context.tile_root(), destination)?;
        progress.finish(|| format!("Published {} files to '{}'.",copied,destination.display()));
    }

    if options.commit {
        commit(runner, tools, &options.root, context, progress)?;
    }

    if let Some((program,args)) = options.deploy.split_first() {
        progress.start_unknown_endpoint(|| format!("Deploying with '{}'.",program));
        _ = runner.run(&ToolInvocation::new(program.clone()).args(args).current_dir(&options.root))?;
        progress.finish(|| "Deployed.");
    }

    Ok(destinations)
}

#[cfg(test)]
mod test {

    use std::fs;
    use std::path::PathBuf;

    use chrono::Local;
    use chrono::TimeZone;

    use super::PublishOptions;
    use super::publish;
    use crate::context::RunContext;
    use crate::context::RunMode;
    use crate::errors::CommandError;
    use crate::tools::ToolOutput;
    use crate::tools::Toolbox;
    use crate::tools::test_support::RecordingRunner;
    use crate::tools::test_support::write_file;

    fn context(mode: RunMode, work_dir: PathBuf) -> RunContext {
        let started = Local.with_ymd_and_hms(2024, 5, 6, 7, 8, 9).single().expect("unambiguous local time");
        let context = RunContext::with_start_time(started, mode, work_dir, None);
        write_file(&context.tile_root().join("0/0/0.pbf"), b"tile");
        write_file(&context.tile_root().join("tile_sizes.csv"), b"zoom_level,max_size_bytes\n0,4\n");
        context
    }

    fn options(root: PathBuf) -> PublishOptions {
        PublishOptions {
            root,
            site_dir: None,
            commit: false,
            deploy: Vec::new()
        }
    }

    /// Answers `git status` as if there were changes to commit.
    fn dirty_git() -> RecordingRunner {
        RecordingRunner::new(|invocation| {
            if invocation.argument_strings().first().map(String::as_str) == Some("status") {
                Ok(ToolOutput {
                    stdout: " M production/0/0/0.pbf\n".to_owned(),
                    stderr: String::new()
                })
            } else {
                Ok(ToolOutput::default())
            }
        })
    }

    #[test]
    fn test_production_replaces_previous_publish() {
        let dir = tempfile::tempdir().unwrap();
        let context = context(RunMode::Production, dir.path().join("build"));
        let root = dir.path().join("published");
        write_file(&root.join("production/9/9/9.pbf"), b"old");

        let mut runner = RecordingRunner::succeeding();
        let destinations = publish(&mut runner, &Toolbox::default(), &context, &options(root.clone()), &mut ()).unwrap();

        assert_eq!(destinations,vec![root.join("production")]);
        assert_eq!(fs::read(root.join("production/0/0/0.pbf")).unwrap(),b"tile");
        assert!(root.join("production/tile_sizes.csv").is_file());
        assert!(!root.join("production/9").exists());
        assert!(runner.invocations.is_empty());
    }

    #[test]
    fn test_test_mode_with_site_dir() {
        let dir = tempfile::tempdir().unwrap();
        let context = context(RunMode::Test, dir.path().join("build"));
        let root = dir.path().join("published");
        let site = dir.path().join("site");
        let options = PublishOptions {
            site_dir: Some(site.clone()),
            ..options(root.clone())
        };

        let destinations = publish(&mut RecordingRunner::succeeding(), &Toolbox::default(), &context, &options, &mut ()).unwrap();

        assert_eq!(destinations,vec![
            root.join("test").join("20240506_070809"),
            site.join("tiles").join("test").join("20240506_070809"),
        ]);
        for destination in destinations {
            assert!(destination.join("0/0/0.pbf").is_file());
        }
        assert!(!root.join("production").exists());
    }

    #[test]
    fn test_commit_and_deploy() {
        let dir = tempfile::tempdir().unwrap();
        let context = context(RunMode::Production, dir.path().join("build"));
        let root = dir.path().join("published");
        let options = PublishOptions {
            commit: true,
            deploy: vec!["firebase".to_owned(),"deploy".to_owned(),"--only".to_owned(),"hosting".to_owned()],
            ..options(root.clone())
        };

        let mut runner = dirty_git();
        _ = publish(&mut runner, &Toolbox::default(), &context, &options, &mut ()).unwrap();

        let calls: Vec<Vec<String>> = runner.invocations.iter().map(|i| i.argument_strings()).collect();
        assert_eq!(runner.programs(),vec!["git","git","git","git","firebase"]);
        assert_eq!(calls,vec![
            vec!["add".to_owned(),"-A".to_owned()],
            vec!["status".to_owned(),"--porcelain".to_owned()],
            vec!["commit".to_owned(),"-m".to_owned(),"Update tiles 20240506_070809".to_owned()],
            vec!["push".to_owned()],
            vec!["deploy".to_owned(),"--only".to_owned(),"hosting".to_owned()],
        ]);
    }

    #[test]
    fn test_nothing_to_commit() {
        let dir = tempfile::tempdir().unwrap();
        let context = context(RunMode::Production, dir.path().join("build"));
        let options = PublishOptions {
            commit: true,
            ..options(dir.path().join("published"))
        };

        let mut runner = RecordingRunner::succeeding();
        _ = publish(&mut runner, &Toolbox::default(), &context, &options, &mut ()).unwrap();
        assert_eq!(runner.invocations.len(),2);
    }

    #[test]
    fn test_push_failure() {
        let dir = tempfile::tempdir().unwrap();
        let context = context(RunMode::Production, dir.path().join("build"));
        let options = PublishOptions {
            commit: true,
            deploy: vec!["deploy.sh".to_owned()],
            ..options(dir.path().join("published"))
        };

        let mut runner = RecordingRunner::new(|invocation| {
            match invocation.argument_strings().first().map(String::as_str) {
                Some("push") => Err(CommandError::ToolFailed(invocation.describe(),Some(128),"rejected".to_owned())),
                Some("status") => Ok(ToolOutput { stdout: "?? production\n".to_owned(), stderr: String::new() }),
                _ => Ok(ToolOutput::default())
            }
        });
        let result = publish(&mut runner, &Toolbox::default(), &context, &options, &mut ());
        assert!(matches!(result,Err(CommandError::ToolFailed(_,Some(128),_))));
        // never deployed
        assert!(!runner.programs().contains(&"deploy.sh"));
    }
}
