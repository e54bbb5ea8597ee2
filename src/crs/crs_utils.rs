use std::{convert::Infallible, fmt, str::FromStr};

use gdal::spatial_ref::SpatialRef;
use serde::Deserialize;

use crate::errors::GeodatabaseError;

pub type EpsgCode = u32;

/// Identifies a coordinate reference system either by EPSG code or by any
/// definition GDAL's `SetFromUserInput` understands, e.g. "WGS84".
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum SpatialRefId {
    Epsg(EpsgCode),
    Name(String),
}

impl SpatialRefId {
    /// Resolve the id with GDAL. The returned spatial ref uses the traditional GIS axis order,
    /// i.e. x is the longitude (or easting) and y the latitude (or northing).
    pub fn resolve(&self) -> Result<SpatialRef, GeodatabaseError> {
        let spatial_ref = match self {
            SpatialRefId::Epsg(code) => SpatialRef::from_epsg(*code),
            SpatialRefId::Name(name) => SpatialRef::from_definition(name),
        }
        .map_err(|source| GeodatabaseError::SpatialReference {
            id: self.to_string(),
            source,
        })?;
        use_traditional_gis_axis_order(&spatial_ref);
        log::debug!("Resolved spatial ref {}", self);
        Ok(spatial_ref)
    }
}

impl fmt::Display for SpatialRefId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpatialRefId::Epsg(code) => write!(f, "{}", epsg_code_to_authority_string(*code)),
            SpatialRefId::Name(name) => write!(f, "{}", name),
        }
    }
}

impl FromStr for SpatialRefId {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().parse::<EpsgCode>() {
            Ok(code) => SpatialRefId::Epsg(code),
            Err(_) => SpatialRefId::Name(s.trim().to_string()),
        })
    }
}

pub fn epsg_4326() -> SpatialRefId {
    SpatialRefId::Epsg(4326)
}

pub fn use_traditional_gis_axis_order(spatial_ref: &SpatialRef) {
    unsafe {
        gdal_sys::OSRSetAxisMappingStrategy(
            spatial_ref.to_c_hsrs(),
            gdal_sys::OSRAxisMappingStrategy::OAMS_TRADITIONAL_GIS_ORDER,
        );
    }
}

/// Find the EPSG code of a spatial ref.
///
/// Formats like the file geodatabase store an ESRI definition without an authority node. For those
/// GDAL's EPSG auto-identification is tried on a copy, leaving `spatial_ref` untouched.
pub fn identify_epsg_code(spatial_ref: &SpatialRef) -> Option<EpsgCode> {
    if let Ok(code) = spatial_ref.auth_code() {
        return EpsgCode::try_from(code).ok();
    }
    let candidate = spatial_ref.clone();
    let err = unsafe { gdal_sys::OSRAutoIdentifyEPSG(candidate.to_c_hsrs()) };
    if err != gdal_sys::OGRErr::OGRERR_NONE {
        return None;
    }
    candidate
        .auth_code()
        .ok()
        .and_then(|code| EpsgCode::try_from(code).ok())
}

pub fn describe_spatial_ref(spatial_ref: &SpatialRef) -> String {
    match identify_epsg_code(spatial_ref) {
        Some(code) => epsg_code_to_authority_string(code),
        None => "an unidentified CRS".to_string(),
    }
}

pub fn epsg_code_to_authority_string(code: EpsgCode) -> String {
    format!("EPSG:{}", code)
}
