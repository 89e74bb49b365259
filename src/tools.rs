use std::ffi::OsStr;
use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::Path;
use std::path::PathBuf;
use std::process::Command;

use crate::errors::CommandError;

pub(crate) const DEFAULT_OGR2OGR: &str = "ogr2ogr";
pub(crate) const DEFAULT_TIPPECANOE: &str = "tippecanoe";
pub(crate) const DEFAULT_GIT: &str = "git";

/// One call to an external program. Nothing is run until it's handed to a `ToolRunner`.
#[derive(Debug,Clone,PartialEq,Eq)]
pub(crate) struct ToolInvocation {
    program: String,
    args: Vec<OsString>,
    current_dir: Option<PathBuf>
}

impl ToolInvocation {

    pub(crate) fn new<Program: Into<String>>(program: Program) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            current_dir: None
        }
    }

    #[must_use]
    pub(crate) fn arg<Arg: AsRef<OsStr>>(mut self, arg: Arg) -> Self {
        self.args.push(arg.as_ref().to_owned());
        self
    }

    #[must_use]
    pub(crate) fn args<Arg: AsRef<OsStr>, Args: IntoIterator<Item = Arg>>(mut self, args: Args) -> Self {
        self.args.extend(args.into_iter().map(|a| a.as_ref().to_owned()));
        self
    }

    #[must_use]
    pub(crate) fn current_dir<Dir: AsRef<Path>>(mut self, dir: Dir) -> Self {
        self.current_dir = Some(dir.as_ref().to_owned());
        self
    }

    pub(crate) fn program(&self) -> &str {
        &self.program
    }

    /// The arguments as strings, for printing and for tests.
    pub(crate) fn argument_strings(&self) -> Vec<String> {
        self.args.iter().map(|a| a.to_string_lossy().into_owned()).collect()
    }

    /// Something close enough to a shell command line to paste into a terminal when things go wrong.
    pub(crate) fn describe(&self) -> String {
        let mut result = self.program.clone();
        for arg in self.argument_strings() {
            result.push(' ');
            if arg.is_empty() || arg.contains([' ','"','\'']) {
                result.push('\'');
                result.push_str(&arg.replace('\'', "'\\''"));
                result.push('\'');
            } else {
                result.push_str(&arg);
            }
        }
        result
    }

}

#[derive(Debug,Clone,Default,PartialEq,Eq)]
pub(crate) struct ToolOutput {
    pub(crate) stdout: String,
    pub(crate) stderr: String
}

/**
The seam between the pipeline and the programs it drives. Every invocation blocks until the program is done, and anything other than a clean exit is an error.
*/
pub(crate) trait ToolRunner {

    fn run(&mut self, invocation: &ToolInvocation) -> Result<ToolOutput,CommandError>;

}

/// Runs the programs for real.
pub(crate) struct ProcessRunner;

impl ToolRunner for ProcessRunner {

    fn run(&mut self, invocation: &ToolInvocation) -> Result<ToolOutput,CommandError> {
        let mut command = Command::new(&invocation.program);
        _ = command.args(&invocation.args);
        if let Some(dir) = &invocation.current_dir {
            _ = command.current_dir(dir);
        }

        let output = command.output().map_err(|e| match e.kind() {
            ErrorKind::NotFound => CommandError::ToolNotFound(invocation.program.clone(),"program not found on PATH".to_owned()),
            _ => CommandError::ToolNotFound(invocation.program.clone(),format!("{}",e))
        })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if output.status.success() {
            Ok(ToolOutput {
                stdout,
                stderr
            })
        } else {
            Err(CommandError::ToolFailed(invocation.describe(),output.status.code(),stderr.trim_end().to_owned()))
        }
    }
}

/// Which programs to call for each job. The defaults expect them on the PATH.
#[derive(Debug,Clone,PartialEq,Eq)]
pub(crate) struct Toolbox {
    pub(crate) ogr2ogr: String,
    pub(crate) tippecanoe: String,
    pub(crate) git: String
}

impl Default for Toolbox {

    fn default() -> Self {
        Self {
            ogr2ogr: DEFAULT_OGR2OGR.to_owned(),
            tippecanoe: DEFAULT_TIPPECANOE.to_owned(),
            git: DEFAULT_GIT.to_owned()
        }
    }
}

impl Toolbox {

    pub(crate) fn ogr2ogr(&self) -> ToolInvocation {
        ToolInvocation::new(self.ogr2ogr.clone())
    }

    pub(crate) fn tippecanoe(&self) -> ToolInvocation {
        ToolInvocation::new(self.tippecanoe.clone())
    }

    pub(crate) fn git(&self) -> ToolInvocation {
        ToolInvocation::new(self.git.clone())
    }

    /// Runs a conversion through the SQLite dialect so the query can use spatial functions.
    pub(crate) fn ogr2ogr_sql(&self, format: &str, destination: &Path, source: &Path, layer_name: &str, sql: &str) -> ToolInvocation {
        self.ogr2ogr()
            .arg("-f").arg(format)
            .arg("-nln").arg(layer_name)
            .arg("-nlt").arg("MULTIPOLYGON")
            .arg("-dialect").arg("SQLite")
            .arg("-sql").arg(sql)
            .arg(destination)
            .arg(source)
    }
}
