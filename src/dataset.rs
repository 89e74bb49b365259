use std::ffi::OsStr;
use std::fs;
use std::path::Path;
use std::path::PathBuf;

use gdal::Dataset;
use gdal::vector::LayerAccess;

use crate::errors::CommandError;
use crate::progress::ProgressObserver;
use crate::tools::Toolbox;
use crate::tools::ToolRunner;
use crate::utils::remove_file_if_exists;

pub(crate) const MERGED_LAYER_NAME: &str = "merged";

/// Extensions that are picked up as source data. Everything is normalized to multipolygons on the way in, so the format doesn't matter after that.
const GEOJSON_EXTENSIONS: [&str; 2] = ["geojson","json"];
const SHAPEFILE_EXTENSIONS: [&str; 1] = ["shp"];

// the SQLite dialect calls the geometry this when the source doesn't give it a name.
const DEFAULT_GEOMETRY_COLUMN: &str = "GEOMETRY";

/**
Finds the source files in a directory, sorted by path so that the merge order (and therefore the feature order) is the same from run to run. Files in other formats, like the rename table, are ignored.
*/
pub(crate) fn discover_sources(dir: &Path) -> Result<Vec<PathBuf>,CommandError> {
    if !dir.is_dir() {
        return Ok(Vec::new())
    }
    let mut result = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let extension = path.extension().and_then(OsStr::to_str).map(str::to_ascii_lowercase);
        if let Some(extension) = extension {
            if GEOJSON_EXTENSIONS.contains(&extension.as_str()) || SHAPEFILE_EXTENSIONS.contains(&extension.as_str()) {
                result.push(path);
            }
        }
    }
    result.sort();
    Ok(result)
}

/// The GDAL driver name to hand to ogr2ogr for a path, based on its extension.
pub(crate) fn driver_for(path: &Path) -> &'static str {
    match path.extension().and_then(OsStr::to_str).map(str::to_ascii_lowercase).as_deref() {
        Some("geojson" | "json") => "GeoJSON",
        Some("shp") => "ESRI Shapefile",
        _ => "GPKG"
    }
}

#[derive(Debug,Clone,PartialEq,Eq)]
pub(crate) struct DatasetSchema {
    pub(crate) layer_name: String,
    pub(crate) geometry_column: String,
    pub(crate) attributes: Vec<String>
}

/**
The single normalized dataset that every later step works from. It's just a path; anything about its contents is looked up with GDAL when it's needed, since the renamer can replace the file underneath it.
*/
#[derive(Debug,Clone,PartialEq,Eq)]
pub(crate) struct MergedDataset {
    path: PathBuf
}

impl MergedDataset {

    pub(crate) const fn open(path: PathBuf) -> Self {
        Self {
            path
        }
    }

    /**
    Concatenates all of the sources into one GeoPackage at `target`. Returns None if there were no sources, which isn't an error, but means there's nothing to tile.
    */
    pub(crate) fn merge_sources<Runner: ToolRunner, Progress: ProgressObserver>(runner: &mut Runner, tools: &Toolbox, sources: &[PathBuf], target: PathBuf, progress: &mut Progress) -> Result<Option<Self>,CommandError> {

        if sources.is_empty() {
            progress.warning(|| "No source files were found, there will be nothing to tile.");
            return Ok(None)
        }

        remove_file_if_exists(&target)?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }

        progress.start(|| ("Merging source files.",Some(sources.len())));
        for (i,source) in sources.iter().enumerate() {
            progress.update(|| i);
            let invocation = tools.ogr2ogr().arg("-f").arg("GPKG");
            let invocation = if i == 0 {
                invocation
            } else {
                // -addfields implies -append, and lets sources with different attributes share the layer.
                invocation.arg("-update").arg("-addfields")
            };
            let invocation = invocation
                .arg("-nln").arg(MERGED_LAYER_NAME)
                .arg("-nlt").arg("MULTIPOLYGON")
                .arg("-t_srs").arg("EPSG:4326")
                .arg(&target)
                .arg(source);
            _ = runner.run(&invocation)?;
        }
        progress.finish(|| format!("Merged {} source files.",sources.len()));

        Ok(Some(Self::open(target)))
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the layer name, geometry column and attribute names, in the order they're stored.
    pub(crate) fn schema(&self) -> Result<DatasetSchema,CommandError> {
        let introspection_error = |e: gdal::errors::GdalError| CommandError::DatasetIntrospection(self.path.clone(),format!("{}",e));

        let dataset = Dataset::open(&self.path).map_err(introspection_error)?;
        let layer = dataset.layer(0).map_err(introspection_error)?;
        let defn = layer.defn();

        let attributes = defn.fields().map(|field| field.name()).collect();
        let geometry_column = defn.geom_fields()
            .next()
            .map(|field| field.name())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| DEFAULT_GEOMETRY_COLUMN.to_owned());

        Ok(DatasetSchema {
            layer_name: layer.name(),
            geometry_column,
            attributes
        })
    }

    pub(crate) fn attributes(&self) -> Result<Vec<String>,CommandError> {
        Ok(self.schema()?.attributes)
    }

    /// Writes a GeoJSON copy of the whole dataset for the tiling tool.
    pub(crate) fn export_geojson<Runner: ToolRunner>(&self, runner: &mut Runner, tools: &Toolbox, target: &Path) -> Result<(),CommandError> {
        remove_file_if_exists(target)?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        let invocation = tools.ogr2ogr()
            .arg("-f").arg("GeoJSON")
            .arg("-nlt").arg("MULTIPOLYGON")
            .arg(target)
            .arg(&self.path);
        _ = runner.run(&invocation)?;
        if target.is_file() {
            Ok(())
        } else {
            Err(CommandError::MissingToolOutput(tools.ogr2ogr.clone(),target.to_owned()))
        }
    }

}


#[cfg(test)]
mod test {

    use std::path::Path;

    use super::MergedDataset;
    use super::discover_sources;
    use super::driver_for;
    use super::test_support::write_geojson_fixture;
    use crate::errors::CommandError;
    use crate::tools::Toolbox;
    use crate::tools::test_support::RecordingRunner;
    use crate::tools::test_support::write_file;

    #[test]
    fn test_discover_sources() {
        let dir = tempfile::tempdir().unwrap();
        write_file(&dir.path().join("b.geojson"), b"{}");
        write_file(&dir.path().join("a.shp"), b"");
        write_file(&dir.path().join("a.dbf"), b"");
        write_file(&dir.path().join("rename.csv"), b"old,new\n");
        write_file(&dir.path().join("nested/c.geojson"), b"{}");

        let sources = discover_sources(dir.path()).unwrap();
        assert_eq!(sources,vec![dir.path().join("a.shp"),dir.path().join("b.geojson")]);
    }

    #[test]
    fn test_discover_sources_missing_directory() {
        assert!(discover_sources(Path::new("no/such/directory")).unwrap().is_empty());
    }

    #[test]
    fn test_driver_for() {
        assert_eq!(driver_for(Path::new("a.geojson")),"GeoJSON");
        assert_eq!(driver_for(Path::new("a.SHP")),"ESRI Shapefile");
        assert_eq!(driver_for(Path::new("merged.gpkg")),"GPKG");
    }

    #[test]
    fn test_merge_without_sources() {
        let dir = tempfile::tempdir().unwrap();
        let mut runner = RecordingRunner::succeeding();
        let merged = MergedDataset::merge_sources(&mut runner, &Toolbox::default(), &[], dir.path().join("merged.gpkg"), &mut ()).unwrap();
        assert!(merged.is_none());
        assert!(runner.invocations.is_empty());
    }

    #[test]
    fn test_merge_appends_after_first() {
        let dir = tempfile::tempdir().unwrap();
        let sources = vec![dir.path().join("a.geojson"),dir.path().join("b.shp")];
        let mut runner = RecordingRunner::succeeding();
        let merged = MergedDataset::merge_sources(&mut runner, &Toolbox::default(), &sources, dir.path().join("merged.gpkg"), &mut ()).unwrap();
        assert_eq!(merged.unwrap().path(),dir.path().join("merged.gpkg"));
        assert_eq!(runner.invocations.len(),2);
        assert!(!runner.invocations[0].argument_strings().contains(&"-addfields".to_owned()));
        assert!(runner.invocations[1].argument_strings().contains(&"-addfields".to_owned()));
    }

    #[test]
    fn test_schema() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_geojson_fixture(&dir.path().join("regions.geojson"), &[
            r#"{"region_id":1,"name":"North","area":3.5}"#,
            r#"{"region_id":2,"name":"South","area":1.0}"#,
        ]);
        let schema = MergedDataset::open(path).schema().unwrap();
        assert_eq!(schema.attributes,vec!["region_id".to_owned(),"name".to_owned(),"area".to_owned()]);
        assert_eq!(schema.layer_name,"regions");
    }

    #[test]
    fn test_schema_of_unreadable_dataset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.geojson");
        write_file(&path, b"this is not geojson");
        assert!(matches!(MergedDataset::open(path).schema(),Err(CommandError::DatasetIntrospection(..))));
    }
}
