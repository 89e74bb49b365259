use std::collections::HashMap;
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::path::PathBuf;

use gdal::Dataset;
use gdal::vector::LayerAccess;

use crate::dataset::DatasetSchema;
use crate::dataset::MergedDataset;
use crate::errors::CommandError;
use crate::layers::LayerSpec;
use crate::progress::ProgressObserver;
use crate::tools::Toolbox;
use crate::tools::ToolRunner;
use crate::utils::quote_identifier;
use crate::utils::remove_file_if_exists;

pub(crate) const UNDISSOLVED_INPUT_NAME: &str = "merged.geojson";
/// Dissolved inputs are named after their layer, so they're kept apart from the undissolved export.
pub(crate) const DISSOLVED_INPUTS_DIR: &str = "dissolved";

pub(crate) fn dissolve_sql(schema: &DatasetSchema, fields: &[String]) -> String {
    let fields = fields.iter().map(|field| quote_identifier(field)).collect::<Vec<_>>().join(", ");
    format!("SELECT ST_Union({}) AS geometry, {} FROM {} GROUP BY {}",
        quote_identifier(&schema.geometry_column),
        fields,
        quote_identifier(&schema.layer_name),
        fields
    )
}

fn check_fields(layer: &str, attributes: &[String], fields: &[String]) -> Result<(),CommandError> {
    if fields.is_empty() {
        return Err(CommandError::EmptyDissolveFields(layer.to_owned()))
    }
    for field in fields {
        if !attributes.contains(field) {
            return Err(CommandError::MissingDissolveField(layer.to_owned(),field.clone()))
        }
    }
    Ok(())
}

/// Checks every dissolving layer's grouping fields against the dataset before any of them is tiled.
pub(crate) fn check_layer_fields(attributes: &[String], layers: &[LayerSpec]) -> Result<(),CommandError> {
    for layer in layers.iter().filter(|layer| layer.needs_dissolve()) {
        check_fields(&layer.name, attributes, &layer.dissolve_fields)?;
    }
    Ok(())
}

/**
Counts the distinct combinations of values for the fields across a dataset. A missing or null value is its own value, so features without one still end up in a group.
*/
pub(crate) fn count_groups(path: &Path, fields: &[String]) -> Result<usize,CommandError> {
    let introspection_error = |e: gdal::errors::GdalError| CommandError::DatasetIntrospection(path.to_owned(),format!("{}",e));

    let dataset = Dataset::open(path).map_err(introspection_error)?;
    let mut layer = dataset.layer(0).map_err(introspection_error)?;

    let names: Vec<String> = layer.defn().fields().map(|field| field.name()).collect();
    let mut indexes = Vec::with_capacity(fields.len());
    for field in fields {
        match names.iter().position(|name| name == field) {
            Some(index) => indexes.push(index),
            None => return Err(CommandError::DatasetIntrospection(path.to_owned(),format!("no attribute named '{}'",field)))
        }
    }

    let mut groups = HashSet::new();
    for feature in layer.features() {
        let mut key = Vec::with_capacity(indexes.len());
        for index in &indexes {
            key.push(feature.field_as_string(*index).map_err(introspection_error)?);
        }
        _ = groups.insert(key);
    }
    Ok(groups.len())
}

pub(crate) fn count_features(path: &Path) -> Result<u64,CommandError> {
    let introspection_error = |e: gdal::errors::GdalError| CommandError::DatasetIntrospection(path.to_owned(),format!("{}",e));
    let dataset = Dataset::open(path).map_err(introspection_error)?;
    let layer = dataset.layer(0).map_err(introspection_error)?;
    Ok(layer.feature_count())
}

/**
Unions the geometries of the merged dataset by the values of the grouping fields, and writes a GeoJSON dataset whose only attributes are those fields. Every grouping field has to exist in the dataset. The output is checked to have one feature per group.
*/
pub(crate) fn dissolve<Runner: ToolRunner, Progress: ProgressObserver>(runner: &mut Runner, tools: &Toolbox, dataset: &MergedDataset, layer: &str, fields: &[String], target: &Path, progress: &mut Progress) -> Result<(),CommandError> {

    let schema = dataset.schema()?;
    check_fields(layer, &schema.attributes, fields)?;

    remove_file_if_exists(target)?;
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }

    progress.start_unknown_endpoint(|| format!("Dissolving '{}' by {}.",layer,fields.join(", ")));
    let invocation = tools.ogr2ogr_sql("GeoJSON", target, dataset.path(), layer, &dissolve_sql(&schema, fields));
    if let Err(err) = runner.run(&invocation) {
        remove_file_if_exists(target)?;
        return Err(err)
    }
    if !target.is_file() {
        return Err(CommandError::MissingToolOutput(tools.ogr2ogr.clone(),target.to_owned()))
    }

    let expected = count_groups(dataset.path(), fields)?;
    let found = count_features(target)?;
    if found != expected as u64 {
        return Err(CommandError::DissolveFeatureCount(layer.to_owned(),found,expected))
    }
    progress.finish(|| format!("Dissolved '{}' into {} features.",layer,found));

    Ok(())
}

/**
Hands out the tiling input for each layer, producing each one the first time it's asked for. Layers without grouping fields share one export of the merged dataset, and layers that dissolve on the same fields share one dissolved dataset.
*/
pub(crate) struct TilingInputs<'dataset> {
    dataset: &'dataset MergedDataset,
    dir: PathBuf,
    undissolved: Option<PathBuf>,
    dissolved: HashMap<Vec<String>,PathBuf>
}

impl<'dataset> TilingInputs<'dataset> {

    pub(crate) fn new(dataset: &'dataset MergedDataset, dir: PathBuf) -> Self {
        Self {
            dataset,
            dir,
            undissolved: None,
            dissolved: HashMap::new()
        }
    }

    /// Where the input for a layer would be written, without producing it.
    pub(crate) fn planned_path(dir: &Path, layer: &LayerSpec) -> PathBuf {
        if layer.needs_dissolve() {
            dir.join(DISSOLVED_INPUTS_DIR).join(format!("{}.geojson",layer.name))
        } else {
            dir.join(UNDISSOLVED_INPUT_NAME)
        }
    }

    pub(crate) fn input_for<Runner: ToolRunner, Progress: ProgressObserver>(&mut self, runner: &mut Runner, tools: &Toolbox, layer: &LayerSpec, progress: &mut Progress) -> Result<PathBuf,CommandError> {
        if layer.needs_dissolve() {
            if let Some(path) = self.dissolved.get(&layer.dissolve_fields) {
                progress.message(|| format!("Reusing dissolved input '{}' for '{}'.",path.display(),layer.name));
                return Ok(path.clone())
            }
            let path = Self::planned_path(&self.dir, layer);
            dissolve(runner, tools, self.dataset, &layer.name, &layer.dissolve_fields, &path, progress)?;
            _ = self.dissolved.insert(layer.dissolve_fields.clone(), path.clone());
            Ok(path)
        } else {
            if let Some(path) = &self.undissolved {
                return Ok(path.clone())
            }
            let path = Self::planned_path(&self.dir, layer);
            self.dataset.export_geojson(runner, tools, &path)?;
            self.undissolved = Some(path.clone());
            Ok(path)
        }
    }
}

#[cfg(test)]
mod test {

    use std::path::Path;

    use super::TilingInputs;
    use super::check_layer_fields;
    use super::count_groups;
    use super::dissolve;
    use super::dissolve_sql;
    use crate::dataset::DatasetSchema;
    use crate::dataset::MergedDataset;
    use crate::dataset::test_support::write_geojson_fixture;
    use crate::errors::CommandError;
    use crate::layers::LayerOptions;
    use crate::layers::LayerSpec;
    use crate::layers::ZoomRange;
    use crate::tools::ToolOutput;
    use crate::tools::Toolbox;
    use crate::tools::test_support::RecordingRunner;
    use crate::tools::test_support::flag_value;
    use crate::tools::test_support::trailing_arg;

    const REGION_FEATURES: [&str; 5] = [
        r#"{"region_id":1,"name":"a"}"#,
        r#"{"region_id":2,"name":"b"}"#,
        r#"{"region_id":1,"name":"c"}"#,
        r#"{"region_id":3,"name":"d"}"#,
        r#"{"region_id":2,"name":"e"}"#,
    ];

    fn layer(name: &str, fields: &[&str]) -> LayerSpec {
        LayerSpec {
            name: name.to_owned(),
            zoom: ZoomRange { min: 0, max: 4 },
            dissolve_fields: fields.iter().map(|a| (*a).to_owned()).collect(),
            options: LayerOptions::default()
        }
    }

    /// Pretends to be ogr2ogr by writing a dissolved dataset with one square per region.
    fn fake_dissolve(regions: usize) -> RecordingRunner {
        RecordingRunner::new(move |invocation| {
            let destination = trailing_arg(invocation, 1).expect("destination argument");
            let features: Vec<String> = (1..=regions).map(|id| format!(r#"{{"region_id":{}}}"#,id)).collect();
            let features: Vec<&str> = features.iter().map(String::as_str).collect();
            _ = write_geojson_fixture(Path::new(&destination), &features);
            Ok(ToolOutput::default())
        })
    }

    #[test]
    fn test_dissolve_sql() {
        let schema = DatasetSchema {
            layer_name: "merged".to_owned(),
            geometry_column: "geom".to_owned(),
            attributes: vec!["region_id".to_owned(),"kind".to_owned()]
        };
        assert_eq!(dissolve_sql(&schema, &["region_id".to_owned(),"kind".to_owned()]),
            r#"SELECT ST_Union("geom") AS geometry, "region_id", "kind" FROM "merged" GROUP BY "region_id", "kind""#);
    }

    #[test]
    fn test_count_groups_with_nulls() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_geojson_fixture(&dir.path().join("merged.geojson"), &[
            r#"{"region_id":1,"kind":"x"}"#,
            r#"{"region_id":1,"kind":"x"}"#,
            r#"{"region_id":null,"kind":"x"}"#,
            r#"{"region_id":null,"kind":"x"}"#,
            r#"{"region_id":2,"kind":null}"#,
        ]);
        assert_eq!(count_groups(&path, &["region_id".to_owned()]).unwrap(),3);
        assert_eq!(count_groups(&path, &["region_id".to_owned(),"kind".to_owned()]).unwrap(),3);
        assert_eq!(count_groups(&path, &["kind".to_owned()]).unwrap(),2);
    }

    #[test]
    fn test_dissolve_three_regions() {
        let dir = tempfile::tempdir().unwrap();
        let dataset = MergedDataset::open(write_geojson_fixture(&dir.path().join("merged.geojson"), &REGION_FEATURES));
        let target = dir.path().join("inputs").join("regions.geojson");

        let mut runner = fake_dissolve(3);
        dissolve(&mut runner, &Toolbox::default(), &dataset, "regions", &["region_id".to_owned()], &target, &mut ()).unwrap();

        assert_eq!(runner.invocations.len(),1);
        assert_eq!(flag_value(&runner.invocations[0], "-nlt").as_deref(),Some("MULTIPOLYGON"));
        assert!(flag_value(&runner.invocations[0], "-sql").unwrap().contains(r#"GROUP BY "region_id""#));
        assert!(target.is_file());
    }

    #[test]
    fn test_dissolve_wrong_feature_count() {
        let dir = tempfile::tempdir().unwrap();
        let dataset = MergedDataset::open(write_geojson_fixture(&dir.path().join("merged.geojson"), &REGION_FEATURES));
        let target = dir.path().join("regions.geojson");

        let mut runner = fake_dissolve(2);
        let result = dissolve(&mut runner, &Toolbox::default(), &dataset, "regions", &["region_id".to_owned()], &target, &mut ());
        assert!(matches!(result,Err(CommandError::DissolveFeatureCount(_,2,3))));
    }

    #[test]
    fn test_dissolve_missing_field() {
        let dir = tempfile::tempdir().unwrap();
        let dataset = MergedDataset::open(write_geojson_fixture(&dir.path().join("merged.geojson"), &REGION_FEATURES));

        let mut runner = RecordingRunner::succeeding();
        let result = dissolve(&mut runner, &Toolbox::default(), &dataset, "regions", &["district".to_owned()], &dir.path().join("out.geojson"), &mut ());
        assert!(matches!(result,Err(CommandError::MissingDissolveField(layer,field)) if layer == "regions" && field == "district"));
        assert!(runner.invocations.is_empty());
    }

    #[test]
    fn test_dissolve_without_fields() {
        let dir = tempfile::tempdir().unwrap();
        let dataset = MergedDataset::open(write_geojson_fixture(&dir.path().join("merged.geojson"), &REGION_FEATURES));
        let mut runner = RecordingRunner::succeeding();
        let result = dissolve(&mut runner, &Toolbox::default(), &dataset, "regions", &[], &dir.path().join("out.geojson"), &mut ());
        assert!(matches!(result,Err(CommandError::EmptyDissolveFields(_))));
    }

    #[test]
    fn test_check_layer_fields() {
        let attributes = vec!["region_id".to_owned(),"name".to_owned()];
        assert!(check_layer_fields(&attributes, &[layer("regions", &["region_id"]),layer("features", &[])]).is_ok());
        let result = check_layer_fields(&attributes, &[layer("regions", &["region_id"]),layer("districts", &["district_id"])]);
        assert!(matches!(result,Err(CommandError::MissingDissolveField(layer,field)) if layer == "districts" && field == "district_id"));
    }

    #[test]
    fn test_inputs_are_shared() {
        let dir = tempfile::tempdir().unwrap();
        let dataset = MergedDataset::open(write_geojson_fixture(&dir.path().join("merged.geojson"), &REGION_FEATURES));
        let mut inputs = TilingInputs::new(&dataset, dir.path().join("inputs"));
        let mut runner = fake_dissolve(3);
        let tools = Toolbox::default();

        let regions = inputs.input_for(&mut runner, &tools, &layer("regions", &["region_id"]), &mut ()).unwrap();
        let regions_again = inputs.input_for(&mut runner, &tools, &layer("region_labels", &["region_id"]), &mut ()).unwrap();
        let raw = inputs.input_for(&mut runner, &tools, &layer("features", &[]), &mut ()).unwrap();
        let raw_again = inputs.input_for(&mut runner, &tools, &layer("outlines", &[]), &mut ()).unwrap();

        assert_eq!(regions,dir.path().join("inputs").join("dissolved").join("regions.geojson"));
        assert_eq!(regions,regions_again);
        assert_eq!(raw,dir.path().join("inputs").join("merged.geojson"));
        assert_eq!(raw,raw_again);
        // one dissolve and one export
        assert_eq!(runner.invocations.len(),2);
    }

    #[test]
    fn test_layer_named_like_the_export() {
        let dir = tempfile::tempdir().unwrap();
        let dataset = MergedDataset::open(write_geojson_fixture(&dir.path().join("merged.geojson"), &REGION_FEATURES));
        let inputs_dir = dir.path().join("inputs");
        let parcels = layer("parcels", &[]);
        let merged = layer("merged", &["region_id"]);
        assert_ne!(TilingInputs::planned_path(&inputs_dir, &parcels),TilingInputs::planned_path(&inputs_dir, &merged));

        let mut inputs = TilingInputs::new(&dataset, inputs_dir);
        let mut runner = fake_dissolve(3);
        let tools = Toolbox::default();
        let raw = inputs.input_for(&mut runner, &tools, &parcels, &mut ()).unwrap();
        let dissolved = inputs.input_for(&mut runner, &tools, &merged, &mut ()).unwrap();
        let raw_again = inputs.input_for(&mut runner, &tools, &layer("outlines", &[]), &mut ()).unwrap();

        assert_ne!(raw,dissolved);
        assert_eq!(raw,raw_again);
        assert!(raw.is_file());
        assert!(dissolved.is_file());
        assert_eq!(runner.invocations.len(),2);
    }
}
