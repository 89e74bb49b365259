use std::collections::HashSet;
use std::ffi::OsStr;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::path::PathBuf;

use indexmap::IndexMap;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::errors::CommandError;

/// tippecanoe refuses anything past this.
pub(crate) const MAX_ZOOM: u8 = 24;

pub(crate) const DETECT_SHARED_BORDERS_OPTION: &str = "detect_shared_borders";
pub(crate) const NO_SIMPLIFICATION_SHARED_NODES_OPTION: &str = "no_simplification_shared_nodes";

#[derive(Debug,Clone,Copy,PartialEq,Eq,Serialize,Deserialize)]
pub(crate) struct ZoomRange {
    pub(crate) min: u8,
    pub(crate) max: u8
}

impl ZoomRange {

    pub(crate) fn contains(&self, zoom: u8) -> bool {
        (self.min..=self.max).contains(&zoom)
    }
}

#[derive(Debug,Clone,Default,PartialEq)]
pub(crate) struct LayerOptions {
    pub(crate) detect_shared_borders: bool,
    pub(crate) no_simplification_shared_nodes: bool,
    // everything, recognized or not, as it was written. This is what ends up in the summary.
    pub(crate) raw: IndexMap<String,Value>,
}

impl LayerOptions {

    fn from_raw(layer: &str, raw: IndexMap<String,Value>) -> Result<Self,CommandError> {

        let flag = |key: &str| -> Result<bool,CommandError> {
            match raw.get(key) {
                None | Some(Value::Null) => Ok(false),
                Some(Value::Bool(value)) => Ok(*value),
                Some(_) => Err(CommandError::InvalidLayerOption(layer.to_owned(),key.to_owned()))
            }
        };

        Ok(Self {
            detect_shared_borders: flag(DETECT_SHARED_BORDERS_OPTION)?,
            no_simplification_shared_nodes: flag(NO_SIMPLIFICATION_SHARED_NODES_OPTION)?,
            raw
        })
    }
}

#[derive(Debug,Clone,PartialEq)]
pub(crate) struct LayerSpec {
    pub(crate) name: String,
    pub(crate) zoom: ZoomRange,
    pub(crate) dissolve_fields: Vec<String>,
    pub(crate) options: LayerOptions
}

impl LayerSpec {

    pub(crate) fn needs_dissolve(&self) -> bool {
        !self.dissolve_fields.is_empty()
    }
}

#[derive(Deserialize)]
struct LayerDocument {
    layers: Vec<LayerEntry>
}

#[derive(Deserialize)]
struct LayerEntry {
    name: String,
    zoom_levels: ZoomRange,
    #[serde(default)]
    dissolve_fields: Option<Vec<String>>,
    #[serde(default)]
    options: Option<IndexMap<String,Value>>
}

/**
The parsed layer configuration, along with where it came from so that it can be copied verbatim into the output.
*/
#[derive(Debug,Clone)]
pub(crate) struct LayerConfig {
    source: PathBuf,
    layers: Vec<LayerSpec>
}

impl LayerConfig {

    pub(crate) fn load(path: &Path) -> Result<Self,CommandError> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == ErrorKind::NotFound => return Err(CommandError::LayerConfigNotFound(path.to_owned())),
            Err(err) => return Err(CommandError::LayerConfigRead(path.to_owned(),format!("{}",err)))
        };
        let layers = Self::parse(path, &text)?;
        Ok(Self {
            source: path.to_owned(),
            layers
        })
    }

    fn parse(path: &Path, text: &str) -> Result<Vec<LayerSpec>,CommandError> {
        let document: LayerDocument = if path.extension().and_then(OsStr::to_str) == Some("json") {
            serde_json::from_str(text).map_err(|e| CommandError::LayerConfigParse(path.to_owned(),format!("{}",e)))?
        } else {
            serde_yaml::from_str(text).map_err(|e| CommandError::LayerConfigParse(path.to_owned(),format!("{}",e)))?
        };

        let mut seen = HashSet::new();
        let mut result = Vec::with_capacity(document.layers.len());
        for entry in document.layers {
            let spec = Self::validate(entry)?;
            if !seen.insert(spec.name.clone()) {
                return Err(CommandError::DuplicateLayerName(spec.name))
            }
            result.push(spec);
        }
        Ok(result)
    }

    fn validate(entry: LayerEntry) -> Result<LayerSpec,CommandError> {
        let LayerEntry { name, zoom_levels, dissolve_fields, options } = entry;

        // the name becomes a directory under the scratch area, and an input file name.
        if name.trim().is_empty() || name == "." || name == ".." || name.contains(['/','\\']) {
            return Err(CommandError::InvalidLayerName(name))
        }

        if zoom_levels.min > zoom_levels.max {
            return Err(CommandError::InvalidZoomRange(name,zoom_levels.min,zoom_levels.max))
        }
        if zoom_levels.max > MAX_ZOOM {
            return Err(CommandError::ZoomOutOfBounds(name,zoom_levels.max))
        }

        let mut fields = Vec::new();
        for field in dissolve_fields.unwrap_or_default() {
            if !fields.contains(&field) {
                fields.push(field);
            }
        }

        let options = LayerOptions::from_raw(&name, options.unwrap_or_default())?;

        Ok(LayerSpec {
            name,
            zoom: zoom_levels,
            dissolve_fields: fields,
            options
        })
    }

    pub(crate) fn source(&self) -> &Path {
        &self.source
    }

    pub(crate) fn layers(&self) -> &[LayerSpec] {
        &self.layers
    }

}
