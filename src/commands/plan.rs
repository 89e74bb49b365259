use std::path::PathBuf;

use clap::Args;

use super::Task;
use super::ToolPaths;
use crate::context::RunContext;
use crate::context::RunMode;
use crate::dataset::discover_sources;
use crate::errors::CommandError;
use crate::layers::LayerConfig;
use crate::pipeline::plan_layers;
use crate::pipeline::rename::load_rename_table;
use crate::pipeline::rename::resolve_rename_table;
use crate::progress::ProgressObserver;
use crate::subcommand_def;
use crate::tools::Toolbox;

subcommand_def!{
    /// Checks the configuration and shows what a build would do for each layer, without running anything
    pub(crate) struct Plan {

        /// Directory holding the source datasets
        #[arg(long,default_value="data")]
        sources: PathBuf,

        /// The layer configuration file
        #[arg(long,default_value="config/layers.yml")]
        layers: PathBuf,

        /// CSV table of attribute renames
        #[arg(long)]
        rename_table: Option<PathBuf>,

        /// Directory the build would work in
        #[arg(long,default_value="build")]
        work_dir: PathBuf,

        #[command(flatten)]
        tools: ToolPaths

    }
}

impl Task for Plan {

    fn run<Progress: ProgressObserver>(self, progress: &mut Progress) -> Result<(),CommandError> {

        let config = LayerConfig::load(&self.layers)?;

        let sources = discover_sources(&self.sources)?;
        if sources.is_empty() {
            progress.warning(|| format!("No source files in '{}', a build would produce no tiles.",self.sources.display()));
        }
        println!("sources:");
        for source in &sources {
            println!("  {}",source.display());
        }

        if let Some(path) = resolve_rename_table(self.rename_table.as_deref(), &self.sources) {
            let rules = load_rename_table(&path)?;
            println!("renames ({}):",path.display());
            for rule in rules {
                println!("  {} -> {}",rule.old_name,rule.new_name);
            }
        }

        let tools: Toolbox = self.tools.into();
        let context = RunContext::new(RunMode::Test, self.work_dir, None);
        println!("layers:");
        for plan in plan_layers(&config, &context, &tools) {
            println!("  {} (zoom {}-{})",plan.name,plan.zoom.min,plan.zoom.max);
            if plan.dissolve_fields.is_empty() {
                println!("    input: {}",plan.input.display());
            } else {
                println!("    input: {} (dissolved by {})",plan.input.display(),plan.dissolve_fields.join(", "));
            }
            println!("    tiling: {}",plan.tiling.describe());
        }
        Ok(())
    }
}
