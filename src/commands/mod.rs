use clap::Args;
use clap::Parser;
use clap::Subcommand;

use crate::errors::CommandError;
use crate::progress::ProgressObserver;
use crate::tools::DEFAULT_GIT;
use crate::tools::DEFAULT_OGR2OGR;
use crate::tools::DEFAULT_TIPPECANOE;
use crate::tools::Toolbox;

mod build;
mod plan;
mod report;
mod check_tools;

use build::Build;
use plan::Plan;
use report::Report;
use check_tools::CheckTools;


pub(crate) trait Task {

    fn run<Progress: ProgressObserver>(self, progress: &mut Progress) -> Result<(),CommandError>;

}

#[macro_export]
macro_rules! command_def {
    ($struct_name: ident {$($command_name: ident),*}) => {

        #[derive(Subcommand)]
        pub(crate) enum $struct_name {
            $(
                $command_name($command_name)
            ),*
        }

        impl Task for $struct_name {

            fn run<Progress: ProgressObserver>(self, progress: &mut Progress) -> Result<(),CommandError> {
                match self {
                    $(Self::$command_name(a) => a.run(progress)),*
                }
            }

        }
    };
}

#[macro_export]
macro_rules! subcommand_def {
    ($(#[$attr: meta])* $visibility: vis struct $struct_name: ident $body: tt) => {

        #[derive(Args)]
        $(#[$attr])*
        $visibility struct $struct_name $body

    };
}

command_def!{
    MainCommand {
        Build,
        Plan,
        Report,
        CheckTools
    }
}

subcommand_def!{
    /// Paths to the external programs, for when they aren't on the PATH under their usual names.
    pub(crate) struct ToolPaths {

        /// The GDAL vector conversion program
        #[arg(long,default_value=DEFAULT_OGR2OGR)]
        ogr2ogr: String,

        /// The vector tile generator
        #[arg(long,default_value=DEFAULT_TIPPECANOE)]
        tippecanoe: String,

        /// The git executable, used when publishing with --commit
        #[arg(long,default_value=DEFAULT_GIT)]
        git: String

    }
}

impl From<ToolPaths> for Toolbox {

    fn from(value: ToolPaths) -> Self {
        Self {
            ogr2ogr: value.ogr2ogr,
            tippecanoe: value.tippecanoe,
            git: value.git
        }
    }
}

/// Converts polygon source data into vector tile layers and publishes them.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub(crate) struct Tilesmith {

    #[command(subcommand)]
    pub(crate) command: MainCommand

}

impl Task for Tilesmith {

    fn run<Progress: ProgressObserver>(self, progress: &mut Progress) -> Result<(),CommandError> {
        self.command.run(progress)
    }
}

#[cfg(test)]
mod test {

    use clap::CommandFactory;
    use clap::Parser;

    use super::MainCommand;
    use super::Tilesmith;

    #[test]
    fn test_command_definition() {
        Tilesmith::command().debug_assert();
    }

    #[test]
    fn test_build_requires_publish_root_for_commit() {
        assert!(Tilesmith::try_parse_from(["tilesmith","build","--commit"]).is_err());
        assert!(Tilesmith::try_parse_from(["tilesmith","build","--publish-root","site","--commit"]).is_ok());
    }

    #[test]
    fn test_subcommand_names() {
        for name in ["build","plan","check-tools"] {
            let parsed = Tilesmith::try_parse_from(["tilesmith",name]);
            assert!(parsed.is_ok(),"{} should parse without arguments",name);
        }
        assert!(matches!(Tilesmith::try_parse_from(["tilesmith","report","build/tiles"]).map(|a| a.command),Ok(MainCommand::Report(_))));
    }
}
