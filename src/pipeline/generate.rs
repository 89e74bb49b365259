use std::fs;
use std::path::Path;
use std::path::PathBuf;

use crate::errors::CommandError;
use crate::layers::LayerSpec;
use crate::pipeline::report::zoom_directories;
use crate::progress::ProgressObserver;
use crate::tools::ToolInvocation;
use crate::tools::Toolbox;
use crate::tools::ToolRunner;
use crate::utils::remove_dir_if_exists;

/// One layer's tiles, in a directory nobody else writes to.
#[derive(Debug,Clone,PartialEq,Eq)]
pub(crate) struct TileArtifact {
    pub(crate) layer: String,
    pub(crate) dir: PathBuf
}

/**
The tiling command for one layer. Tiles are left uncompressed and neither the size nor the feature limits are enforced, so nothing gets silently dropped from a tile. Large tiles show up in the size report instead.
*/
pub(crate) fn tiling_invocation(tools: &Toolbox, layer: &LayerSpec, input: &Path, output_dir: &Path) -> ToolInvocation {
    let invocation = tools.tippecanoe()
        .arg("-e").arg(output_dir)
        .arg("-l").arg(&layer.name)
        .arg(format!("-z{}",layer.zoom.max))
        .arg(format!("-Z{}",layer.zoom.min))
        .arg("--no-tile-compression")
        .arg("--no-tile-size-limit")
        .arg("--no-feature-limit");
    let invocation = if layer.options.detect_shared_borders {
        invocation.arg("--detect-shared-borders")
    } else {
        invocation
    };
    let invocation = if layer.options.no_simplification_shared_nodes {
        invocation.arg("--no-simplification-of-shared-nodes")
    } else {
        invocation
    };
    invocation.arg("--force").arg(input)
}

/// Makes sure the tiling tool kept to the layer's zoom range.
fn check_zoom_bounds(layer: &LayerSpec, dir: &Path) -> Result<(),CommandError> {
    for (zoom,_) in zoom_directories(dir)? {
        let in_range = u8::try_from(zoom).is_ok_and(|zoom| layer.zoom.contains(zoom));
        if !in_range {
            return Err(CommandError::UnexpectedZoomLevel(layer.name.clone(),zoom))
        }
    }
    Ok(())
}

/**
Tiles one layer into `<scratch>/<layer name>`. Whatever was left there by an earlier run is removed first, so the directory only ever holds this run's tiles for this layer.
*/
pub(crate) fn generate_layer<Runner: ToolRunner, Progress: ProgressObserver>(runner: &mut Runner, tools: &Toolbox, layer: &LayerSpec, input: &Path, scratch: &Path, progress: &mut Progress) -> Result<TileArtifact,CommandError> {

    let dir = scratch.join(&layer.name);
    remove_dir_if_exists(&dir)?;
    fs::create_dir_all(scratch)?;

    progress.start_unknown_endpoint(|| format!("Tiling '{}' at zoom {}-{}.",layer.name,layer.zoom.min,layer.zoom.max));
    _ = runner.run(&tiling_invocation(tools, layer, input, &dir))?;

    if !dir.is_dir() {
        return Err(CommandError::MissingToolOutput(tools.tippecanoe.clone(),dir))
    }
    check_zoom_bounds(layer, &dir)?;
    progress.finish(|| format!("Tiled '{}'.",layer.name));

    Ok(TileArtifact {
        layer: layer.name.clone(),
        dir
    })
}
