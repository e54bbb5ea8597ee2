use std::{fmt, path::PathBuf};

use gdal::errors::GdalError;
use thiserror::Error;

use crate::geofile::schema::FieldType;

/// Coarse classification of a build failure. None of them is recoverable, the
/// kind only tells the caller where to look.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Io,
    Schema,
    Transformation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushStage {
    Layer,
    DataSource,
    Cache,
}

impl fmt::Display for FlushStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlushStage::Layer => write!(f, "layer"),
            FlushStage::DataSource => write!(f, "data source"),
            FlushStage::Cache => write!(f, "data source cache"),
        }
    }
}

#[derive(Debug, Error)]
pub enum GeodatabaseError {
    #[error("GDAL driver '{name}' is not available")]
    UnknownDriver {
        name: String,
        #[source]
        source: GdalError,
    },
    #[error("GDAL driver '{name}' cannot create vector datasets")]
    DriverCannotCreate { name: String },
    #[error("could not resolve spatial reference {id}")]
    SpatialReference {
        id: String,
        #[source]
        source: GdalError,
    },
    #[error("invalid option '{option}', expected KEY=VALUE")]
    InvalidOption { option: String },
    #[error("path {path:?} is not valid UTF-8")]
    InvalidPath { path: PathBuf },
    #[error("could not clear output path {path:?}")]
    ClearOutput {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not create data source at {path:?}: {message}")]
    CreateDataSource { path: PathBuf, message: String },
    #[error("could not create layer '{name}'")]
    CreateLayer {
        name: String,
        #[source]
        source: GdalError,
    },
    #[error("field name '{name}' is declared more than once")]
    DuplicateField { name: String },
    #[error("invalid field name '{name}'")]
    InvalidFieldName { name: String },
    #[error("could not create field '{name}': {message}")]
    CreateField { name: String, message: String },
    #[error("field '{name}' is not declared on layer '{layer}'")]
    UndeclaredField { name: String, layer: String },
    #[error("feature {index} does not set declared field '{name}'")]
    MissingField { index: usize, name: String },
    #[error("value for field '{name}' is not compatible with type {expected:?}")]
    FieldTypeMismatch { name: String, expected: FieldType },
    #[error("field '{name}' has unsupported OGR type {ogr_type}")]
    UnsupportedFieldType { name: String, ogr_type: u32 },
    #[error("field '{name}' holds unsupported value {value}")]
    UnsupportedFieldValue { name: String, value: String },
    #[error("expected a point geometry in layer '{layer}', found OGR type {ogr_type}")]
    UnexpectedGeometry { layer: String, ogr_type: u32 },
    #[error("could not append feature {index} to layer '{layer}'")]
    AppendFeature {
        index: usize,
        layer: String,
        #[source]
        source: GdalError,
    },
    #[error("could not flush {stage}: {message}")]
    Flush { stage: FlushStage, message: String },
    #[error("no transformation from {from} to {to}")]
    NoTransformation {
        from: String,
        to: String,
        #[source]
        source: GdalError,
    },
    #[error("reprojected geometry {geometry} carries no spatial reference")]
    MissingSpatialRef { geometry: String },
    #[error("projection failed")]
    ProjectionFailed {
        #[source]
        source: GdalError,
    },
    #[error(transparent)]
    Gdal(#[from] GdalError),
}

impl GeodatabaseError {
    pub fn kind(&self) -> ErrorKind {
        use GeodatabaseError::*;
        match self {
            UnknownDriver { .. }
            | DriverCannotCreate { .. }
            | SpatialReference { .. }
            | InvalidOption { .. }
            | InvalidPath { .. } => ErrorKind::Configuration,
            ClearOutput { .. }
            | CreateDataSource { .. }
            | CreateLayer { .. }
            | AppendFeature { .. }
            | Flush { .. } => ErrorKind::Io,
            DuplicateField { .. }
            | InvalidFieldName { .. }
            | CreateField { .. }
            | UndeclaredField { .. }
            | MissingField { .. }
            | FieldTypeMismatch { .. }
            | UnsupportedFieldType { .. }
            | UnsupportedFieldValue { .. }
            | UnexpectedGeometry { .. } => ErrorKind::Schema,
            NoTransformation { .. } | MissingSpatialRef { .. } | ProjectionFailed { .. } => {
                ErrorKind::Transformation
            }
            Gdal(GdalError::InvalidFieldName { .. }) => ErrorKind::Schema,
            Gdal(_) => ErrorKind::Io,
        }
    }
}
