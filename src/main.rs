/*!
Tilesmith turns a directory of polygon datasets into a set of vector tile layers, as described by a layer configuration file, and publishes the combined tile tree. The geometry work is done by ogr2ogr and tippecanoe, which need to be installed.
*/

// the rest of the lints are in Cargo.toml
#![warn(meta_variable_misuse)]
#![warn(unused_macro_rules)]

use clap::Parser;

pub(crate) mod errors;
pub(crate) mod commands;
pub(crate) mod context;
pub(crate) mod layers;
pub(crate) mod tools;
pub(crate) mod dataset;
pub(crate) mod pipeline;
pub(crate) mod utils;
pub(crate) mod progress;

use errors::ProgramError;

use commands::Task;
use commands::Tilesmith;
use progress::ConsoleProgressBar;

/**
Runs Tilesmith with arbitrary arguments. The first item in the arguments will be ignored. All output will be printed to Stdout or Stderr.
*/
fn run<Arg, Args>(args: &mut Args) -> Result<(),ProgramError>
where
    Arg: Clone + Into<std::ffi::OsString>,
    Args: Iterator<Item = Arg>
{
    let mut progress = ConsoleProgressBar::new();
    let command = Tilesmith::try_parse_from(args)?;
    command.run(&mut progress)?;
    Ok(())
}

fn main() -> std::process::ExitCode {
    let mut args = std::env::args();
    // Returning the error from main would print it with Debug, this gets the Display version instead.
    match run(&mut args) {
        Ok(()) => std::process::ExitCode::SUCCESS,
        // clap knows how to print help and version requests, and which exit code they get.
        Err(ProgramError::ArgumentError(err)) => err.exit(),
        Err(err) => {
            eprintln!("{}",err);
            std::process::ExitCode::FAILURE
        }
    }
}
