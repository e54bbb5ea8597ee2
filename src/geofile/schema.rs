use std::collections::HashSet;

use gdal::vector::OGRFieldType;
use serde::Deserialize;

use crate::{crs::crs_utils::SpatialRefId, errors::GeodatabaseError};

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Integer,
    Real,
}

impl FieldType {
    pub fn ogr_type(&self) -> OGRFieldType::Type {
        match self {
            FieldType::String => OGRFieldType::OFTString,
            FieldType::Integer => OGRFieldType::OFTInteger,
            FieldType::Real => OGRFieldType::OFTReal,
        }
    }

    pub fn from_ogr_type(ogr_type: OGRFieldType::Type) -> Option<Self> {
        match ogr_type {
            OGRFieldType::OFTString => Some(FieldType::String),
            OGRFieldType::OFTInteger => Some(FieldType::Integer),
            OGRFieldType::OFTReal => Some(FieldType::Real),
            _ => None,
        }
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct FieldDefinition {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
}

impl FieldDefinition {
    pub fn new(name: &str, field_type: FieldType) -> Self {
        Self {
            name: name.to_string(),
            field_type,
        }
    }
}

/// Schema of the single point layer written by the builder.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct LayerSchema {
    pub name: String,
    pub spatial_ref: SpatialRefId,
    /// Declaration order is the column order of the written layer.
    pub fields: Vec<FieldDefinition>,
    /// Layer creation options as KEY=VALUE strings, passed to the driver as is.
    #[serde(default)]
    pub options: Vec<String>,
}

impl LayerSchema {
    pub fn field(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// Check field names before anything touches the disk.
    ///
    /// Duplicates are compared case-insensitively, file geodatabase and GeoPackage column names
    /// are case-insensitive.
    pub fn validate(&self) -> Result<(), GeodatabaseError> {
        let mut seen = HashSet::new();
        for field in &self.fields {
            if field.name.trim().is_empty() || field.name.contains('\0') {
                return Err(GeodatabaseError::InvalidFieldName {
                    name: field.name.clone(),
                });
            }
            if !seen.insert(field.name.to_lowercase()) {
                return Err(GeodatabaseError::DuplicateField {
                    name: field.name.clone(),
                });
            }
        }
        Ok(())
    }
}
