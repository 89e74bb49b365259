use std::path::PathBuf;

use clap::Args;
use console::style;

use super::Task;
use super::ToolPaths;
use crate::context::RunMode;
use crate::errors::CommandError;
use crate::pipeline::BuildOptions;
use crate::pipeline::publish::PublishOptions;
use crate::pipeline::run_build;
use crate::progress::ProgressObserver;
use crate::subcommand_def;
use crate::tools::ProcessRunner;

subcommand_def!{
    /// Merges the source files, generates every configured layer, combines the tiles and, if asked, publishes them
    pub(crate) struct Build {

        /// Directory holding the source datasets
        #[arg(long,default_value="data")]
        sources: PathBuf,

        /// The layer configuration file (YAML, or JSON with a .json extension)
        #[arg(long,default_value="config/layers.yml")]
        layers: PathBuf,

        /// CSV table of attribute renames. If not given, rename.csv in the sources directory is used if it's there.
        #[arg(long)]
        rename_table: Option<PathBuf>,

        /// Directory for the merged dataset, tiling inputs and per-layer tiles
        #[arg(long,default_value="build")]
        work_dir: PathBuf,

        /// Where the combined tile tree goes. Defaults to "tiles" inside the work directory.
        #[arg(long)]
        output: Option<PathBuf>,

        /// Publish as the production tiles instead of a timestamped test copy
        #[arg(long,env="TILESMITH_PRODUCTION")]
        production: bool,

        /// Copies the finished tiles under this directory
        #[arg(long)]
        publish_root: Option<PathBuf>,

        /// A static site directory to mirror the published tiles into, under its "tiles" directory
        #[arg(long,requires="publish_root")]
        site_dir: Option<PathBuf>,

        /// Commit and push the publish root with git after copying
        #[arg(long,requires="publish_root")]
        commit: bool,

        /// A program (and its arguments) to run in the publish root once everything else is done. This takes the rest of the command line, so put it last.
        #[arg(long,requires="publish_root",num_args=1..,allow_hyphen_values=true,value_name="PROGRAM")]
        deploy: Vec<String>,

        #[command(flatten)]
        tools: ToolPaths

    }
}

impl Build {

    fn into_options(self) -> BuildOptions {
        let publish = self.publish_root.map(|root| PublishOptions {
            root,
            site_dir: self.site_dir,
            commit: self.commit,
            deploy: self.deploy
        });
        BuildOptions {
            sources: self.sources,
            layers: self.layers,
            rename_table: self.rename_table,
            mode: if self.production { RunMode::Production } else { RunMode::Test },
            work_dir: self.work_dir,
            output: self.output,
            publish,
            tools: self.tools.into()
        }
    }
}

impl Task for Build {

    fn run<Progress: ProgressObserver>(self, progress: &mut Progress) -> Result<(),CommandError> {

        let outcome = run_build(&mut ProcessRunner, self.into_options(), progress)?;

        if outcome.merge.collisions > 0 {
            println!("{} tiles were overwritten by later layers.",outcome.merge.collisions);
        }
        println!("{} zoom levels in the size table, layer configuration copied to '{}'.",outcome.manifest.tile_sizes.len(),outcome.manifest.config_copy.display());
        for destination in outcome.published {
            println!("Published to '{}'.",destination.display());
        }
        println!("{}",style(format!("Run {} finished: {} files in '{}'.",outcome.manifest.timestamp,outcome.merge.files,outcome.context.tile_root().display())).green().bold());
        Ok(())
    }
}

#[cfg(test)]
mod test {

    use std::path::PathBuf;

    use clap::Parser;

    use crate::commands::MainCommand;
    use crate::commands::Tilesmith;
    use crate::context::RunMode;

    #[test]
    fn test_options_from_arguments() {
        let parsed = Tilesmith::try_parse_from([
            "tilesmith","build","--production","--sources","input","--publish-root","public","--site-dir","site",
            "--tippecanoe","/opt/tippecanoe/bin/tippecanoe","--deploy","firebase","deploy","--only","hosting"
        ]).unwrap();
        let MainCommand::Build(build) = parsed.command else {
            panic!("expected the build command")
        };

        let options = build.into_options();
        assert_eq!(options.mode,RunMode::Production);
        assert_eq!(options.sources,PathBuf::from("input"));
        assert_eq!(options.layers,PathBuf::from("config/layers.yml"));
        assert_eq!(options.work_dir,PathBuf::from("build"));
        assert_eq!(options.tools.tippecanoe,"/opt/tippecanoe/bin/tippecanoe");
        assert_eq!(options.tools.ogr2ogr,"ogr2ogr");
        let publish = options.publish.unwrap();
        assert_eq!(publish.root,PathBuf::from("public"));
        assert_eq!(publish.site_dir,Some(PathBuf::from("site")));
        assert!(!publish.commit);
        assert_eq!(publish.deploy,vec!["firebase","deploy","--only","hosting"]);
    }

    #[test]
    fn test_no_publish_root_means_no_publishing() {
        let parsed = Tilesmith::try_parse_from(["tilesmith","build"]).unwrap();
        let MainCommand::Build(build) = parsed.command else {
            panic!("expected the build command")
        };
        assert!(build.into_options().publish.is_none());
    }
}
