pub mod feature;
pub mod field_defn;
pub mod gdal_geofile;
pub mod schema;
