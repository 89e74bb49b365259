use std::ffi::OsStr;
use std::fs;
use std::path::Path;

use walkdir::WalkDir;

use crate::errors::CommandError;
use crate::pipeline::generate::TileArtifact;
use crate::progress::ProgressObserver;
use crate::progress::WatchableIterator;
use crate::utils::remove_dir_if_exists;
use crate::utils::replace_tree;

pub(crate) const TILE_EXTENSION: &str = "pbf";

#[derive(Debug,Clone,Copy,Default,PartialEq,Eq)]
pub(crate) struct MergeSummary {
    /// Distinct files in the combined tree.
    pub(crate) files: usize,
    /// Tiles that were overwritten by a later layer.
    pub(crate) collisions: usize
}

/// Copies one layer's tree over the combined tree. Returns the number of new files and the number of tiles that replaced an earlier layer's.
fn overlay(source: &Path, target: &Path) -> Result<(usize,usize),CommandError> {
    let mut added = 0;
    let mut collisions = 0;
    for entry in WalkDir::new(source).min_depth(1).sort_by_file_name() {
        let entry = entry?;
        let relative = entry.path().strip_prefix(source).map_err(|e| CommandError::IoError(format!("{}",e)))?;
        let destination = target.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&destination)?;
            continue;
        }
        if destination.exists() {
            // the metadata file is always there more than once, it's only the tiles I care about.
            if destination.extension() == Some(OsStr::new(TILE_EXTENSION)) {
                collisions += 1;
            }
        } else {
            added += 1;
        }
        _ = fs::copy(entry.path(), &destination).map_err(|e| CommandError::IoError(format!("Could not copy '{}' to '{}': {}",entry.path().display(),destination.display(),e)))?;
    }
    Ok((added,collisions))
}

/**
Combines the layer trees into one. Layers are laid down in the order given, so when two layers have a tile at the same path, the later layer's file is the one that's kept. The layer directories are removed afterwards, and the combined tree replaces whatever was at `canonical`.
*/
pub(crate) fn merge_tile_trees<Progress: ProgressObserver>(artifacts: &[TileArtifact], staging: &Path, canonical: &Path, progress: &mut Progress) -> Result<MergeSummary,CommandError> {

    remove_dir_if_exists(staging)?;
    fs::create_dir_all(staging)?;

    let mut summary = MergeSummary::default();
    let mut collided_layers = Vec::new();
    for artifact in artifacts.iter().watch(progress, "Merging layer tiles.", "Layer tiles merged.") {
        let (added,collisions) = overlay(&artifact.dir, staging)?;
        summary.files += added;
        summary.collisions += collisions;
        if collisions > 0 {
            collided_layers.push((artifact.layer.as_str(),collisions));
        }
    }

    for (layer,collisions) in collided_layers {
        progress.warning(|| format!("Layer '{}' replaced {} tiles written by earlier layers.",layer,collisions));
    }

    for artifact in artifacts {
        remove_dir_if_exists(&artifact.dir)?;
    }

    remove_dir_if_exists(canonical)?;
    if let Some(parent) = canonical.parent() {
        fs::create_dir_all(parent)?;
    }
    if fs::rename(staging, canonical).is_err() {
        // probably a different filesystem
        _ = replace_tree(staging, canonical)?;
        remove_dir_if_exists(staging)?;
    }

    Ok(summary)
}
