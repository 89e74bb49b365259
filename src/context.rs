use std::path::Path;
use std::path::PathBuf;

use chrono::DateTime;
use chrono::Local;

pub(crate) const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

#[derive(Debug,Clone,Copy,PartialEq,Eq)]
pub(crate) enum RunMode {
    Production,
    Test
}

/**
Created once when a run starts and only read after that. Anything that needs to know when the run happened, or where it's supposed to put things, gets it from here instead of looking at the clock or the environment again.
*/
#[derive(Debug,Clone)]
pub(crate) struct RunContext {
    timestamp: String,
    mode: RunMode,
    work_dir: PathBuf,
    tile_root: PathBuf,
}

impl RunContext {

    pub(crate) fn new(mode: RunMode, work_dir: PathBuf, tile_root: Option<PathBuf>) -> Self {
        Self::with_start_time(Local::now(), mode, work_dir, tile_root)
    }

    pub(crate) fn with_start_time(started: DateTime<Local>, mode: RunMode, work_dir: PathBuf, tile_root: Option<PathBuf>) -> Self {
        let timestamp = started.format(TIMESTAMP_FORMAT).to_string();
        let tile_root = tile_root.unwrap_or_else(|| work_dir.join("tiles"));
        Self {
            timestamp,
            mode,
            work_dir,
            tile_root
        }
    }

    pub(crate) fn timestamp(&self) -> &str {
        &self.timestamp
    }

    pub(crate) const fn mode(&self) -> RunMode {
        self.mode
    }

    pub(crate) fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// The canonical output location for the combined tile tree and its reports.
    pub(crate) fn tile_root(&self) -> &Path {
        &self.tile_root
    }

    pub(crate) fn merged_dataset_path(&self) -> PathBuf {
        self.work_dir.join("merged.gpkg")
    }

    /// Tiling inputs (the undissolved export and the dissolved intermediates) go here.
    pub(crate) fn inputs_dir(&self) -> PathBuf {
        self.work_dir.join("inputs")
    }

    /// Each layer gets its own directory under here while it's being generated.
    pub(crate) fn layer_scratch_dir(&self) -> PathBuf {
        self.work_dir.join("layer_tiles")
    }

    /// The combined tree is assembled here before it replaces the canonical tile root.
    pub(crate) fn staging_tile_dir(&self) -> PathBuf {
        self.work_dir.join("tiles.staging")
    }

    /// Where this run's tiles land inside a publish target, relative to the target's root.
    pub(crate) fn publish_subpath(&self) -> PathBuf {
        match self.mode {
            RunMode::Production => PathBuf::from("production"),
            RunMode::Test => PathBuf::from("test").join(&self.timestamp),
        }
    }
}

#[cfg(test)]
mod test {

    use std::path::PathBuf;

    use chrono::Local;
    use chrono::TimeZone;

    use super::RunContext;
    use super::RunMode;

    fn context(mode: RunMode) -> RunContext {
        let started = Local.with_ymd_and_hms(2024, 3, 7, 9, 5, 2).single().expect("unambiguous local time");
        RunContext::with_start_time(started, mode, PathBuf::from("build"), None)
    }

    #[test]
    fn test_timestamp_format() {
        assert_eq!(context(RunMode::Test).timestamp(),"20240307_090502");
    }

    #[test]
    fn test_publish_subpath() {
        assert_eq!(context(RunMode::Production).publish_subpath(),PathBuf::from("production"));
        assert_eq!(context(RunMode::Test).publish_subpath(),PathBuf::from("test").join("20240307_090502"));
    }

    #[test]
    fn test_default_tile_root() {
        assert_eq!(context(RunMode::Test).tile_root(),PathBuf::from("build").join("tiles"));
    }
}
