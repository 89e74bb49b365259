use std::fs;
use std::path::Path;
use std::path::PathBuf;

use crate::context::RunContext;
use crate::context::RunMode;
use crate::dataset::MergedDataset;
use crate::dataset::discover_sources;
use crate::errors::CommandError;
use crate::layers::LayerConfig;
use crate::layers::ZoomRange;
use crate::progress::ProgressObserver;
use crate::tools::ToolInvocation;
use crate::tools::Toolbox;
use crate::tools::ToolRunner;
use crate::utils::path_within;
use crate::utils::remove_dir_if_exists;

pub(crate) mod rename;
pub(crate) mod dissolve;
pub(crate) mod generate;
pub(crate) mod merge;
pub(crate) mod report;
pub(crate) mod publish;

use dissolve::TilingInputs;
use dissolve::check_layer_fields;
use generate::generate_layer;
use generate::tiling_invocation;
use merge::MergeSummary;
use merge::merge_tile_trees;
use publish::PublishOptions;
use publish::publish;
use rename::load_rename_table;
use rename::rename_attributes;
use rename::resolve_rename_table;
use report::RunManifest;
use report::write_reports;

#[derive(Debug,Clone)]
pub(crate) struct BuildOptions {
    pub(crate) sources: PathBuf,
    pub(crate) layers: PathBuf,
    pub(crate) rename_table: Option<PathBuf>,
    pub(crate) mode: RunMode,
    pub(crate) work_dir: PathBuf,
    pub(crate) output: Option<PathBuf>,
    pub(crate) publish: Option<PublishOptions>,
    pub(crate) tools: Toolbox
}

#[derive(Debug)]
pub(crate) struct BuildOutcome {
    pub(crate) context: RunContext,
    pub(crate) merge: MergeSummary,
    pub(crate) manifest: RunManifest,
    pub(crate) published: Vec<PathBuf>
}

/**
The tile root and the publish destinations are removed and rewritten by every run. None of them may hold the inputs, the working files or each other.
*/
fn check_output_locations(context: &RunContext, options: &BuildOptions) -> Result<(),CommandError> {
    let mut protected: Vec<PathBuf> = vec![
        context.work_dir().to_owned(),
        context.merged_dataset_path(),
        context.inputs_dir(),
        context.layer_scratch_dir(),
        context.staging_tile_dir(),
        options.sources.clone(),
        options.layers.clone()
    ];
    if let Some(rename_table) = &options.rename_table {
        protected.push(rename_table.clone());
    }

    let check = |outer: &Path, inner: &Path| -> Result<(),CommandError> {
        if path_within(outer, inner)? {
            Err(CommandError::OutputOverlap(outer.to_owned(),inner.to_owned()))
        } else {
            Ok(())
        }
    };

    let tile_root = context.tile_root();
    for path in &protected {
        check(tile_root, path)?;
    }

    if let Some(publish_options) = &options.publish {
        for destination in publish_options.destinations(context) {
            check(tile_root, &destination)?;
            check(&destination, tile_root)?;
            for path in &protected {
                check(&destination, path)?;
            }
        }
    }
    Ok(())
}

/**
Runs the whole pipeline once, from source files to published tiles. Everything that can be checked before tiling starts (the layer configuration, the rename table, the grouping fields) is checked first. Any failure ends the run, and nothing is published unless every stage succeeded.
*/
pub(crate) fn run_build<Runner: ToolRunner, Progress: ProgressObserver>(runner: &mut Runner, options: BuildOptions, progress: &mut Progress) -> Result<BuildOutcome,CommandError> {

    let tools = &options.tools;

    progress.announce(|| "Loading configuration");
    let config = LayerConfig::load(&options.layers)?;
    progress.message(|| format!("Loaded {} layers from '{}'.",config.layers().len(),config.source().display()));
    let rules = match resolve_rename_table(options.rename_table.as_deref(), &options.sources) {
        Some(path) => {
            let rules = load_rename_table(&path)?;
            progress.message(|| format!("Loaded {} rename rules from '{}'.",rules.len(),path.display()));
            rules
        },
        None => Vec::new()
    };

    let context = RunContext::new(options.mode, options.work_dir.clone(), options.output.clone());
    check_output_locations(&context, &options)?;
    fs::create_dir_all(context.work_dir())?;
    progress.message(|| format!("Run {} ({:?}).",context.timestamp(),context.mode()));

    progress.announce(|| "Preparing data");
    let sources = discover_sources(&options.sources)?;
    let dataset = MergedDataset::merge_sources(runner, tools, &sources, context.merged_dataset_path(), progress)?;

    let mut artifacts = Vec::new();
    if let Some(dataset) = &dataset {
        if !rules.is_empty() {
            rename_attributes(runner, tools, dataset, &rules, progress)?;
        }
        let attributes = dataset.attributes()?;
        progress.message(|| format!("Attributes: {}.",attributes.join(", ")));
        check_layer_fields(&attributes, config.layers())?;

        progress.announce(|| "Generating layers");
        remove_dir_if_exists(&context.inputs_dir())?;
        let mut inputs = TilingInputs::new(dataset, context.inputs_dir());
        for layer in config.layers() {
            let input = inputs.input_for(runner, tools, layer, progress)?;
            artifacts.push(generate_layer(runner, tools, layer, &input, &context.layer_scratch_dir(), progress)?);
        }
    } else {
        for layer in config.layers() {
            progress.warning(|| format!("Skipping layer '{}', there's no data to tile.",layer.name));
        }
    }

    progress.announce(|| "Merging tiles");
    let merge = merge_tile_trees(&artifacts, &context.staging_tile_dir(), context.tile_root(), progress)?;
    progress.message(|| format!("{} files in '{}'.",merge.files,context.tile_root().display()));

    progress.announce(|| "Writing reports");
    let manifest = write_reports(&context, &config, progress)?;

    let published = if let Some(publish_options) = &options.publish {
        progress.announce(|| "Publishing");
        publish(runner, tools, &context, publish_options, progress)?
    } else {
        Vec::new()
    };

    Ok(BuildOutcome {
        context,
        merge,
        manifest,
        published
    })
}

/// What a build would do for one layer.
#[derive(Debug,Clone,PartialEq,Eq)]
pub(crate) struct LayerPlan {
    pub(crate) name: String,
    pub(crate) zoom: ZoomRange,
    pub(crate) dissolve_fields: Vec<String>,
    pub(crate) input: PathBuf,
    pub(crate) tiling: ToolInvocation
}

/// Works out each layer's tiling input and tiling command without touching any data.
pub(crate) fn plan_layers(config: &LayerConfig, context: &RunContext, tools: &Toolbox) -> Vec<LayerPlan> {
    let inputs_dir = context.inputs_dir();
    let scratch = context.layer_scratch_dir();
    config.layers().iter().map(|layer| {
        let input = TilingInputs::planned_path(&inputs_dir, layer);
        let tiling = tiling_invocation(tools, layer, &input, &scratch.join(&layer.name));
        LayerPlan {
            name: layer.name.clone(),
            zoom: layer.zoom,
            dissolve_fields: layer.dissolve_fields.clone(),
            input,
            tiling
        }
    }).collect()
}
