use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::path::PathBuf;

use gdal::Dataset;
use gdal::vector::LayerAccess;

use crate::dataset::DatasetSchema;
use crate::dataset::MergedDataset;
use crate::dataset::driver_for;
use crate::errors::CommandError;
use crate::progress::ProgressObserver;
use crate::tools::Toolbox;
use crate::tools::ToolRunner;
use crate::utils::quote_identifier;
use crate::utils::remove_file_if_exists;

pub(crate) const DEFAULT_RENAME_TABLE: &str = "rename.csv";

#[derive(Debug,Clone,PartialEq,Eq)]
pub(crate) struct RenameRule {
    pub(crate) old_name: String,
    pub(crate) new_name: String
}

impl RenameRule {

    #[cfg(test)]
    pub(crate) fn new(old_name: &str, new_name: &str) -> Self {
        Self {
            old_name: old_name.to_owned(),
            new_name: new_name.to_owned()
        }
    }
}

/**
Picks the rename table to use. An explicitly named table has to exist. Otherwise, the default table next to the sources is used only if it's there.
*/
pub(crate) fn resolve_rename_table(explicit: Option<&Path>, sources_dir: &Path) -> Option<PathBuf> {
    match explicit {
        Some(path) => Some(path.to_owned()),
        None => {
            let default = sources_dir.join(DEFAULT_RENAME_TABLE);
            default.is_file().then_some(default)
        }
    }
}

/// Reads the rename table with GDAL's CSV driver. The first row is the header, column 0 is the old name and column 1 the new.
pub(crate) fn load_rename_table(path: &Path) -> Result<Vec<RenameRule>,CommandError> {
    if !path.is_file() {
        return Err(CommandError::RenameTableNotFound(path.to_owned()))
    }

    let read_error = |e: gdal::errors::GdalError| CommandError::RenameTableRead(path.to_owned(),format!("{}",e));

    let dataset = Dataset::open(path).map_err(read_error)?;
    let mut layer = dataset.layer(0).map_err(read_error)?;
    let column_count = layer.defn().fields().count();
    if column_count < 2 {
        return Err(CommandError::RenameTableMissingColumns(path.to_owned(),column_count))
    }

    let mut result = Vec::new();
    for (i,feature) in layer.features().enumerate() {
        // header is line 1
        let row = i as u64 + 2;
        let old_name = feature.field_as_string(0).map_err(read_error)?;
        let new_name = feature.field_as_string(1).map_err(read_error)?;
        match (old_name,new_name) {
            (Some(old_name),Some(new_name)) if !old_name.trim().is_empty() && !new_name.trim().is_empty() => {
                result.push(RenameRule {
                    old_name: old_name.trim().to_owned(),
                    new_name: new_name.trim().to_owned()
                });
            },
            _ => return Err(CommandError::RenameTableMalformedRow(path.to_owned(),row))
        }
    }
    Ok(result)
}

/// Source attribute and the name it's written out under, in output order.
#[derive(Debug,Clone,PartialEq,Eq)]
pub(crate) struct RenamePlan {
    columns: Vec<(String,String)>
}

impl RenamePlan {

    /**
    Renamed attributes come first, in the order the rules are declared, then every attribute no rule touched, in its original order. Nothing is dropped.
    */
    pub(crate) fn new<Progress: ProgressObserver>(attributes: &[String], rules: &[RenameRule], progress: &mut Progress) -> Result<Self,CommandError> {

        let mut renamed = HashSet::new();
        let mut targets = HashSet::new();
        let mut columns = Vec::with_capacity(attributes.len());
        for rule in rules {
            if !attributes.contains(&rule.old_name) {
                progress.warning(|| format!("Rename rule '{}' -> '{}' doesn't match any attribute, skipping it.",rule.old_name,rule.new_name));
                continue;
            }
            if !renamed.insert(rule.old_name.as_str()) {
                progress.warning(|| format!("Attribute '{}' was already renamed, skipping rule '{}' -> '{}'.",rule.old_name,rule.old_name,rule.new_name));
                continue;
            }
            // only rules that are applied can collide
            if !targets.insert(rule.new_name.as_str()) {
                return Err(CommandError::DuplicateRenameTarget(rule.new_name.clone()))
            }
            columns.push((rule.old_name.clone(),rule.new_name.clone()));
        }

        for attribute in attributes {
            if renamed.contains(attribute.as_str()) {
                continue;
            }
            if targets.contains(attribute.as_str()) {
                return Err(CommandError::RenameCollidesWithAttribute(attribute.clone()))
            }
            columns.push((attribute.clone(),attribute.clone()));
        }

        Ok(Self {
            columns
        })
    }

    pub(crate) fn output_names(&self) -> Vec<&str> {
        self.columns.iter().map(|(_,output)| output.as_str()).collect()
    }

    pub(crate) fn to_sql(&self, schema: &DatasetSchema) -> String {
        let mut select = vec![quote_identifier(&schema.geometry_column)];
        for (source,output) in &self.columns {
            if source == output {
                select.push(quote_identifier(source));
            } else {
                select.push(format!("{} AS {}",quote_identifier(source),quote_identifier(output)));
            }
        }
        format!("SELECT {} FROM {}",select.join(", "),quote_identifier(&schema.layer_name))
    }
}

fn staged_path(path: &Path) -> PathBuf {
    let mut name = path.file_stem().map(|s| s.to_os_string()).unwrap_or_default();
    name.push(".renamed");
    if let Some(extension) = path.extension() {
        name.push(".");
        name.push(extension);
    }
    path.with_file_name(name)
}

/**
Rewrites the attribute names of the merged dataset. The new dataset is written next to the old one and only moved over it once it's complete, so any failure leaves the original alone.
*/
pub(crate) fn rename_attributes<Runner: ToolRunner, Progress: ProgressObserver>(runner: &mut Runner, tools: &Toolbox, dataset: &MergedDataset, rules: &[RenameRule], progress: &mut Progress) -> Result<(),CommandError> {

    let schema = dataset.schema()?;
    let plan = RenamePlan::new(&schema.attributes, rules, progress)?;
    let sql = plan.to_sql(&schema);

    let staged = staged_path(dataset.path());
    remove_file_if_exists(&staged)?;

    progress.start_unknown_endpoint(|| "Renaming attributes.");
    let invocation = tools.ogr2ogr_sql(driver_for(dataset.path()), &staged, dataset.path(), &schema.layer_name, &sql);
    if let Err(err) = runner.run(&invocation) {
        remove_file_if_exists(&staged)?;
        return Err(err)
    }
    if !staged.is_file() {
        return Err(CommandError::MissingToolOutput(tools.ogr2ogr.clone(),staged))
    }

    fs::rename(&staged, dataset.path()).map_err(|e| CommandError::IoError(format!("Could not replace '{}' with the renamed dataset: {}",dataset.path().display(),e)))?;
    progress.finish(|| format!("Renamed attributes: {}.",plan.output_names().join(", ")));

    Ok(())
}
