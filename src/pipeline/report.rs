use std::ffi::OsStr;
use std::fs;
use std::fs::File;
use std::io::BufWriter;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;
use walkdir::WalkDir;

use crate::context::RunContext;
use crate::errors::CommandError;
use crate::layers::LayerConfig;
use crate::layers::LayerSpec;
use crate::layers::ZoomRange;
use crate::pipeline::merge::TILE_EXTENSION;
use crate::progress::ProgressObserver;

pub(crate) const TILE_SIZES_FILE: &str = "tile_sizes.csv";
pub(crate) const LAYERS_INFO_FILE: &str = "layers_info.json";
const TILE_SIZES_HEADER: &str = "zoom_level,max_size_bytes";

/**
The top level directories of a tile tree that are named like zoom levels, sorted by zoom. Anything else at that level (the metadata file, the reports) is ignored.
*/
pub(crate) fn zoom_directories(root: &Path) -> Result<Vec<(u32,PathBuf)>,CommandError> {
    let mut result = Vec::new();
    for entry in fs::read_dir(root)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        if let Some(zoom) = entry.file_name().to_str().and_then(|name| name.parse::<u32>().ok()) {
            result.push((zoom,entry.path()));
        }
    }
    result.sort_by_key(|(zoom,_)| *zoom);
    Ok(result)
}

#[derive(Debug,Clone,Copy,PartialEq,Eq)]
pub(crate) struct ZoomSize {
    pub(crate) zoom: u32,
    pub(crate) max_size_bytes: u64
}

/// The largest tile at each zoom level. A zoom level without any tiles gets no entry at all.
pub(crate) fn max_tile_sizes(root: &Path) -> Result<Vec<ZoomSize>,CommandError> {
    let mut result = Vec::new();
    for (zoom,dir) in zoom_directories(root)? {
        let mut largest = None;
        for entry in WalkDir::new(&dir) {
            let entry = entry?;
            if entry.file_type().is_file() && entry.path().extension() == Some(OsStr::new(TILE_EXTENSION)) {
                let size = entry.metadata()?.len();
                largest = Some(largest.map_or(size, |largest: u64| largest.max(size)));
            }
        }
        if let Some(max_size_bytes) = largest {
            result.push(ZoomSize {
                zoom,
                max_size_bytes
            });
        }
    }
    Ok(result)
}

pub(crate) fn write_tile_sizes(path: &Path, sizes: &[ZoomSize]) -> Result<(),CommandError> {
    let mut file = BufWriter::new(File::create(path)?);
    writeln!(file,"{}",TILE_SIZES_HEADER)?;
    for size in sizes {
        writeln!(file,"{},{}",size.zoom,size.max_size_bytes)?;
    }
    file.flush()?;
    Ok(())
}

#[derive(Debug,Clone,PartialEq,Serialize)]
pub(crate) struct LayerSummary {
    pub(crate) name: String,
    pub(crate) zoom_levels: ZoomRange,
    pub(crate) dissolve_fields: Vec<String>,
    pub(crate) options: IndexMap<String,Value>
}

impl From<&LayerSpec> for LayerSummary {

    fn from(value: &LayerSpec) -> Self {
        Self {
            name: value.name.clone(),
            zoom_levels: value.zoom,
            dissolve_fields: value.dissolve_fields.clone(),
            options: value.options.raw.clone()
        }
    }
}

#[derive(Debug,Clone,PartialEq,Serialize)]
pub(crate) struct LayersInfo {
    pub(crate) timestamp: String,
    pub(crate) layers: Vec<LayerSummary>
}

/// What a finished run leaves behind next to its tiles.
#[derive(Debug,Clone,PartialEq)]
pub(crate) struct RunManifest {
    pub(crate) timestamp: String,
    pub(crate) tile_sizes: Vec<ZoomSize>,
    pub(crate) layers: Vec<LayerSummary>,
    pub(crate) config_copy: PathBuf
}

/// Copies the configuration file byte for byte into the tile root, under its own file name.
fn copy_layer_config(config: &LayerConfig, root: &Path) -> Result<PathBuf,CommandError> {
    let name = config.source().file_name().unwrap_or_else(|| OsStr::new("layers.yml"));
    let target = root.join(name);
    _ = fs::copy(config.source(), &target).map_err(|e| CommandError::IoError(format!("Could not copy '{}' to '{}': {}",config.source().display(),target.display(),e)))?;
    Ok(target)
}

/**
Writes the size table, the copy of the layer configuration and the layer summary into the canonical tile root. This runs after the tiles are in place, since the size table is taken from the tree itself.
*/
pub(crate) fn write_reports<Progress: ProgressObserver>(context: &RunContext, config: &LayerConfig, progress: &mut Progress) -> Result<RunManifest,CommandError> {
    let root = context.tile_root();
    fs::create_dir_all(root)?;

    let tile_sizes = max_tile_sizes(root)?;
    write_tile_sizes(&root.join(TILE_SIZES_FILE), &tile_sizes)?;
    for size in &tile_sizes {
        progress.message(|| format!("zoom {}: largest tile is {} bytes",size.zoom,size.max_size_bytes));
    }

    let config_copy = copy_layer_config(config, root)?;

    let info = LayersInfo {
        timestamp: context.timestamp().to_owned(),
        layers: config.layers().iter().map(LayerSummary::from).collect()
    };
    let mut file = BufWriter::new(File::create(root.join(LAYERS_INFO_FILE))?);
    serde_json::to_writer_pretty(&mut file, &info)?;
    file.flush()?;

    Ok(RunManifest {
        timestamp: info.timestamp,
        tile_sizes,
        layers: info.layers,
        config_copy
    })
}
