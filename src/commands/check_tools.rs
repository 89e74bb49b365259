use clap::Args;
use gdal::version::VersionInfo;

use super::Task;
use super::ToolPaths;
use crate::errors::CommandError;
use crate::progress::ProgressObserver;
use crate::subcommand_def;
use crate::tools::ProcessRunner;
use crate::tools::ToolOutput;
use crate::tools::Toolbox;
use crate::tools::ToolRunner;

subcommand_def!{
    /// Makes sure the external programs can be run, and shows which GDAL library is linked in
    pub(crate) struct CheckTools {

        #[command(flatten)]
        tools: ToolPaths

    }
}

/// Some programs print their version on stderr.
fn version_line(output: &ToolOutput) -> &str {
    let text = if output.stdout.trim().is_empty() {
        &output.stderr
    } else {
        &output.stdout
    };
    text.lines().next().unwrap_or_default().trim()
}

impl Task for CheckTools {

    fn run<Progress: ProgressObserver>(self, progress: &mut Progress) -> Result<(),CommandError> {

        let tools: Toolbox = self.tools.into();
        let mut runner = ProcessRunner;

        progress.announce(|| "Checking tools");
        for invocation in [tools.ogr2ogr(),tools.tippecanoe(),tools.git()] {
            let invocation = invocation.arg("--version");
            let output = runner.run(&invocation)?;
            println!("{}: {}",invocation.program(),version_line(&output));
        }

        println!("{}",VersionInfo::version_report());
        Ok(())
    }
}

#[cfg(test)]
mod test {

    use super::version_line;
    use crate::tools::ToolOutput;

    #[test]
    fn test_version_line() {
        let stdout = ToolOutput {
            stdout: "GDAL 3.8.4, released 2024/02/08\n".to_owned(),
            stderr: String::new()
        };
        assert_eq!(version_line(&stdout),"GDAL 3.8.4, released 2024/02/08");

        let stderr = ToolOutput {
            stdout: "\n".to_owned(),
            stderr: "tippecanoe v2.53.0\nextra\n".to_owned()
        };
        assert_eq!(version_line(&stderr),"tippecanoe v2.53.0");
    }
}
