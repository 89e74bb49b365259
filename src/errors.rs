use std::error::Error;
use std::fmt::Display;
use std::path::PathBuf;

pub(crate) use gdal::errors::GdalError;

pub(crate) use clap::error::Error as ArgumentError;

/// The broad kind of failure, used to decide how loudly to complain and what exit path to take.
#[derive(Debug,Clone,Copy,PartialEq,Eq)]
pub(crate) enum ErrorCategory {
    /// Missing or malformed layer configuration or rename table. Nothing has been tiled yet.
    Configuration,
    /// The dataset doesn't look like the configuration says it should.
    Data,
    /// An external tool failed, or produced something it shouldn't have.
    Tool,
    /// Filesystem trouble while moving artifacts around.
    Io,
}

impl Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Configuration => write!(f,"configuration error"),
            Self::Data => write!(f,"data error"),
            Self::Tool => write!(f,"tool error"),
            Self::Io => write!(f,"i/o error"),
        }
    }
}

#[derive(Debug)]
pub(crate) enum CommandError {
    LayerConfigNotFound(PathBuf),
    LayerConfigRead(PathBuf,String),
    LayerConfigParse(PathBuf,String),
    DuplicateLayerName(String),
    InvalidLayerName(String),
    InvalidZoomRange(String,u8,u8),
    ZoomOutOfBounds(String,u8),
    InvalidLayerOption(String,String),
    RenameTableNotFound(PathBuf),
    RenameTableRead(PathBuf,String),
    RenameTableMissingColumns(PathBuf,usize),
    RenameTableMalformedRow(PathBuf,u64),
    DuplicateRenameTarget(String),
    RenameCollidesWithAttribute(String),
    OutputOverlap(PathBuf,PathBuf),
    DatasetIntrospection(PathBuf,String),
    MissingDissolveField(String,String),
    EmptyDissolveFields(String),
    ToolNotFound(String,String),
    ToolFailed(String,Option<i32>,String),
    UnexpectedZoomLevel(String,u32),
    DissolveFeatureCount(String,u64,usize),
    MissingToolOutput(String,PathBuf),
    GdalError(GdalError),
    IoError(String),
    SummaryWrite(String),
}

impl CommandError {

    pub(crate) const fn category(&self) -> ErrorCategory {
        match self {
            Self::LayerConfigNotFound(_) |
            Self::LayerConfigRead(..) |
            Self::LayerConfigParse(..) |
            Self::DuplicateLayerName(_) |
            Self::InvalidLayerName(_) |
            Self::InvalidZoomRange(..) |
            Self::ZoomOutOfBounds(..) |
            Self::InvalidLayerOption(..) |
            Self::RenameTableNotFound(_) |
            Self::RenameTableRead(..) |
            Self::RenameTableMissingColumns(..) |
            Self::RenameTableMalformedRow(..) |
            Self::DuplicateRenameTarget(_) |
            Self::RenameCollidesWithAttribute(_) |
            Self::OutputOverlap(..) => ErrorCategory::Configuration,
            Self::DatasetIntrospection(..) |
            Self::MissingDissolveField(..) |
            Self::EmptyDissolveFields(_) |
            Self::GdalError(_) => ErrorCategory::Data,
            Self::ToolNotFound(..) |
            Self::ToolFailed(..) |
            Self::UnexpectedZoomLevel(..) |
            Self::DissolveFeatureCount(..) |
            Self::MissingToolOutput(..) => ErrorCategory::Tool,
            Self::IoError(_) |
            Self::SummaryWrite(_) => ErrorCategory::Io,
        }
    }
}

impl Error for CommandError {

}

impl Display for CommandError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f,"{}: ",self.category())?;
        match self {
            Self::LayerConfigNotFound(a) => write!(f,"Layer configuration '{}' could not be found.",a.display()),
            Self::LayerConfigRead(a, b) => write!(f,"Error reading layer configuration '{}': {}",a.display(),b),
            Self::LayerConfigParse(a, b) => write!(f,"Error parsing layer configuration '{}': {}",a.display(),b),
            Self::DuplicateLayerName(a) => write!(f,"Layer '{}' is configured more than once.",a),
            Self::InvalidLayerName(a) => write!(f,"Layer name '{}' can't be used as a layer or directory name.",a),
            Self::InvalidZoomRange(a, min, max) => write!(f,"Layer '{}' has a minimum zoom ({}) greater than its maximum zoom ({}).",a,min,max),
            Self::ZoomOutOfBounds(a, b) => write!(f,"Layer '{}' asks for zoom level {}, which is beyond what the tiling tool supports.",a,b),
            Self::InvalidLayerOption(a, b) => write!(f,"Layer '{}' has a non-boolean value for option '{}'.",a,b),
            Self::RenameTableNotFound(a) => write!(f,"Rename table '{}' could not be found.",a.display()),
            Self::RenameTableRead(a, b) => write!(f,"Error reading rename table '{}': {}",a.display(),b),
            Self::RenameTableMissingColumns(a, b) => write!(f,"Rename table '{}' needs two columns, found {}.",a.display(),b),
            Self::RenameTableMalformedRow(a, b) => write!(f,"Rename table '{}' has an empty old or new name in row {}.",a.display(),b),
            Self::DuplicateRenameTarget(a) => write!(f,"More than one rename rule produces the attribute '{}'.",a),
            Self::RenameCollidesWithAttribute(a) => write!(f,"A rename rule produces '{}', which is already an attribute that isn't being renamed.",a),
            Self::OutputOverlap(a, b) => write!(f,"Output location '{}' can't be used, replacing it would also remove '{}'.",a.display(),b.display()),
            Self::DatasetIntrospection(a, b) => write!(f,"Could not read the attributes of '{}': {}",a.display(),b),
            Self::MissingDissolveField(a, b) => write!(f,"Layer '{}' dissolves on '{}', but the dataset has no such attribute.",a,b),
            Self::EmptyDissolveFields(a) => write!(f,"Layer '{}' was sent to dissolve without any grouping fields.",a),
            Self::ToolNotFound(a, b) => write!(f,"Could not run '{}': {}",a,b),
            Self::ToolFailed(a, code, stderr) => {
                match code {
                    Some(code) => write!(f,"'{}' failed with exit code {}.",a,code)?,
                    None => write!(f,"'{}' was terminated by a signal.",a)?
                }
                if stderr.is_empty() {
                    Ok(())
                } else {
                    write!(f,"\n{}",stderr)
                }
            },
            Self::UnexpectedZoomLevel(a, b) => write!(f,"Layer '{}' produced tiles at zoom level {}, outside of its configured range.",a,b),
            Self::DissolveFeatureCount(a, found, expected) => write!(f,"Dissolving layer '{}' produced {} features, but there are {} groups.",a,found,expected),
            Self::MissingToolOutput(a, b) => write!(f,"'{}' reported success, but '{}' wasn't written.",a,b.display()),
            Self::GdalError(a) => write!(f,"gdal: {}",a),
            Self::IoError(a) => write!(f,"{}",a),
            Self::SummaryWrite(a) => write!(f,"Error writing layer summary: {}",a),
        }
    }
}

impl From<GdalError> for CommandError {

    fn from(value: GdalError) -> Self {
        Self::GdalError(value)
    }
}

impl From<std::io::Error> for CommandError {

    fn from(value: std::io::Error) -> Self {
        Self::IoError(format!("{}",value))
    }
}

impl From<walkdir::Error> for CommandError {

    fn from(value: walkdir::Error) -> Self {
        Self::IoError(format!("{}",value))
    }
}

impl From<serde_json::Error> for CommandError {

    fn from(value: serde_json::Error) -> Self {
        Self::SummaryWrite(format!("{}",value))
    }
}

#[derive(Debug)]
pub(crate) enum ProgramError {
    ArgumentError(ArgumentError),
    CommandError(CommandError)
}

impl Error for ProgramError {

}

impl Display for ProgramError {

    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ArgumentError(a) => write!(f,"{}",a),
            Self::CommandError(a) => write!(f,"{}",a),
        }
    }
}

impl From<ArgumentError> for ProgramError {

    fn from(value: ArgumentError) -> Self {
        Self::ArgumentError(value)
    }
}

impl From<CommandError> for ProgramError {

    fn from(value: CommandError) -> Self {
        Self::CommandError(value)
    }
}
