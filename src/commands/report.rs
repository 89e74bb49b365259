use std::path::PathBuf;

use clap::Args;

use super::Task;
use crate::errors::CommandError;
use crate::pipeline::report::TILE_SIZES_FILE;
use crate::pipeline::report::max_tile_sizes;
use crate::pipeline::report::write_tile_sizes;
use crate::progress::ProgressObserver;
use crate::subcommand_def;

subcommand_def!{
    /// Prints the largest tile size at each zoom level of an existing tile tree
    pub(crate) struct Report {

        /// The root of the tile tree
        tiles: PathBuf,

        /// Also rewrite the size table inside the tile tree
        #[arg(long)]
        write: bool

    }
}

impl Task for Report {

    fn run<Progress: ProgressObserver>(self, progress: &mut Progress) -> Result<(),CommandError> {

        let sizes = max_tile_sizes(&self.tiles)?;
        if sizes.is_empty() {
            progress.warning(|| format!("No tiles found in '{}'.",self.tiles.display()));
        }

        println!("zoom_level,max_size_bytes");
        for size in &sizes {
            println!("{},{}",size.zoom,size.max_size_bytes);
        }

        if self.write {
            let path = self.tiles.join(TILE_SIZES_FILE);
            write_tile_sizes(&path, &sizes)?;
            progress.message(|| format!("Wrote '{}'.",path.display()));
        }
        Ok(())
    }
}
