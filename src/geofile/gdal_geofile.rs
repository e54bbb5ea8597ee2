use std::{
    collections::HashMap,
    ffi::CString,
    fs, io,
    path::{Path, PathBuf},
    sync::Once,
};

use gdal::{
    cpl::CslStringList,
    spatial_ref::SpatialRef,
    vector::{Layer, LayerAccess, OGRwkbGeometryType},
    Dataset, DatasetOptions, Driver, DriverManager, GdalOpenFlags, LayerOptions, Metadata,
};
use indicatif::ProgressBar;
use serde::Deserialize;

use crate::{
    crs::crs_utils::{describe_spatial_ref, identify_epsg_code, EpsgCode},
    errors::{FlushStage, GeodatabaseError},
};

use super::{
    feature::{AttributeValue, Feature},
    field_defn::{create_fields, last_gdal_error_message},
    schema::{FieldDefinition, FieldType, LayerSchema},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GdalDriverType {
    OpenFileGdb,
    FileGdb,
    GeoPackage,
    GeoJson,
}

impl GdalDriverType {
    pub fn name(&self) -> &'static str {
        match self {
            GdalDriverType::OpenFileGdb => "OpenFileGDB",
            GdalDriverType::FileGdb => "FileGDB",
            GdalDriverType::GeoPackage => "GPKG",
            GdalDriverType::GeoJson => "GeoJSON",
        }
    }
}

fn default_driver() -> String {
    GdalDriverType::OpenFileGdb.name().to_string()
}

/// Everything needed to write one point layer to a new dataset.
#[derive(Deserialize, Debug, Clone)]
pub struct GeodatabaseSpec {
    /// Anything already at this path is deleted before writing.
    pub output_path: PathBuf,
    #[serde(default = "default_driver")]
    pub driver: String,
    /// Dataset creation options as KEY=VALUE strings.
    #[serde(default)]
    pub dataset_options: Vec<String>,
    pub layer: LayerSchema,
    #[serde(default)]
    pub features: Vec<Feature>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildSummary {
    pub output_path: PathBuf,
    pub layer_name: String,
    pub feature_count: usize,
}

static REGISTER_DRIVERS: Once = Once::new();

/// Register all GDAL drivers. Only the first call does any work.
pub fn register_drivers() {
    REGISTER_DRIVERS.call_once(|| {
        DriverManager::register_all();
        log::debug!("Registered {} GDAL drivers", DriverManager::count());
    });
}

/// Write `spec` to disk, replacing whatever was at the output path.
///
/// Records are appended one at a time in order, then the layer, the dataset and the dataset cache
/// are flushed in that order. A failure after the data source is created can leave a partially
/// written dataset behind.
pub fn build_geodatabase(spec: &GeodatabaseSpec) -> Result<BuildSummary, GeodatabaseError> {
    spec.layer.validate()?;

    log::info!("Clearing output path {:?}", &spec.output_path);
    clear_output_path(&spec.output_path)?;

    register_drivers();
    let spatial_ref = spec.layer.spatial_ref.resolve()?;
    let driver = get_vector_driver(&spec.driver)?;

    log::info!(
        "Creating {} data source at {:?}",
        &spec.driver,
        &spec.output_path
    );
    let mut dataset = create_data_source(&driver, &spec.output_path, &spec.dataset_options)?;
    {
        let layer = create_point_layer(&mut dataset, &spec.layer, &spatial_ref)?;

        log::info!("Setting up {} fields", spec.layer.fields.len());
        create_fields(&layer, &spec.layer.fields)?;

        log::info!(
            "Writing {} features to layer {}",
            spec.features.len(),
            &spec.layer.name
        );
        append_features(&layer, &spec.layer, &spatial_ref, &spec.features)?;
        sync_layer(&layer, FlushStage::Layer)?;
    }
    sync_data_source(&dataset)?;
    flush_cache(&dataset)?;

    Ok(BuildSummary {
        output_path: spec.output_path.clone(),
        layer_name: spec.layer.name.clone(),
        feature_count: spec.features.len(),
    })
}

/// Remove the directory tree or file at `path`. A missing path is not an error.
pub fn clear_output_path(path: &Path) -> Result<(), GeodatabaseError> {
    let result = match fs::symlink_metadata(path) {
        Ok(metadata) if metadata.is_dir() => fs::remove_dir_all(path),
        Ok(_) => fs::remove_file(path),
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(err) => Err(err),
    };
    result.map_err(|source| GeodatabaseError::ClearOutput {
        path: path.to_path_buf(),
        source,
    })
}

/// Look up a driver by its short name and make sure it can create vector datasets.
pub fn get_vector_driver(name: &str) -> Result<Driver, GeodatabaseError> {
    let driver =
        DriverManager::get_driver_by_name(name).map_err(|source| GeodatabaseError::UnknownDriver {
            name: name.to_string(),
            source,
        })?;
    let has_capability =
        |capability: &str| driver.metadata_item(capability, "").as_deref() == Some("YES");
    if !has_capability("DCAP_VECTOR") || !has_capability("DCAP_CREATE") {
        return Err(GeodatabaseError::DriverCannotCreate {
            name: name.to_string(),
        });
    }
    Ok(driver)
}

fn parse_options(options: &[String]) -> Result<CslStringList, GeodatabaseError> {
    let mut list = CslStringList::new();
    for option in options {
        let (key, value) = option
            .split_once('=')
            .filter(|(key, _)| !key.trim().is_empty())
            .ok_or_else(|| GeodatabaseError::InvalidOption {
                option: option.clone(),
            })?;
        list.set_name_value(key.trim(), value.trim())?;
    }
    Ok(list)
}

fn create_data_source(
    driver: &Driver,
    path: &Path,
    options: &[String],
) -> Result<Dataset, GeodatabaseError> {
    let options = parse_options(options)?;
    let c_path = path
        .to_str()
        .and_then(|path| CString::new(path).ok())
        .ok_or_else(|| GeodatabaseError::InvalidPath {
            path: path.to_path_buf(),
        })?;
    let c_dataset = unsafe {
        gdal_sys::GDALCreate(
            driver.c_driver(),
            c_path.as_ptr(),
            0,
            0,
            0,
            gdal_sys::GDALDataType::GDT_Unknown,
            options.as_ptr(),
        )
    };
    if c_dataset.is_null() {
        return Err(GeodatabaseError::CreateDataSource {
            path: path.to_path_buf(),
            message: last_gdal_error_message(),
        });
    }
    Ok(unsafe { Dataset::from_c_dataset(c_dataset) })
}

fn create_point_layer<'a>(
    dataset: &'a mut Dataset,
    schema: &LayerSchema,
    spatial_ref: &SpatialRef,
) -> Result<Layer<'a>, GeodatabaseError> {
    log::debug!(
        "Creating layer {} in {}",
        &schema.name,
        describe_spatial_ref(spatial_ref)
    );
    let options: Vec<&str> = schema.options.iter().map(|option| option.as_str()).collect();
    let layer_options = LayerOptions {
        name: &schema.name,
        srs: Some(spatial_ref),
        ty: OGRwkbGeometryType::wkbPoint,
        options: if options.is_empty() {
            None
        } else {
            Some(options.as_slice())
        },
    };
    dataset
        .create_layer(layer_options)
        .map_err(|source| GeodatabaseError::CreateLayer {
            name: schema.name.clone(),
            source,
        })
}

fn append_features(
    layer: &Layer,
    schema: &LayerSchema,
    spatial_ref: &SpatialRef,
    features: &[Feature],
) -> Result<(), GeodatabaseError> {
    let bar = ProgressBar::new(features.len() as u64);
    for (index, feature) in features.iter().enumerate() {
        // Rejected records never reach GDAL, so no partial feature is written.
        let values = feature.values_for(schema, index)?;

        // Each record gets its own geometry, nothing is shared between features.
        let mut geometry = gdal::vector::Geometry::empty(OGRwkbGeometryType::wkbPoint)?;
        geometry.set_point_2d(0, feature.geometry.x_y());
        geometry.set_spatial_ref(spatial_ref.clone());

        let mut gdal_feature = gdal::vector::Feature::new(layer.defn())?;
        for (field, value) in schema.fields.iter().zip(values.iter()) {
            match value {
                AttributeValue::String(value) => gdal_feature.set_field_string(&field.name, value),
                AttributeValue::Integer(value) => {
                    gdal_feature.set_field_integer(&field.name, *value)
                }
                AttributeValue::Real(value) => gdal_feature.set_field_double(&field.name, *value),
            }?;
        }
        gdal_feature.set_geometry(geometry)?;
        gdal_feature
            .create(layer)
            .map_err(|source| GeodatabaseError::AppendFeature {
                index,
                layer: schema.name.clone(),
                source,
            })?;
        bar.inc(1);
    }
    bar.finish_and_clear();
    Ok(())
}

fn sync_layer<L: LayerAccess>(layer: &L, stage: FlushStage) -> Result<(), GeodatabaseError> {
    let err = unsafe { gdal_sys::OGR_L_SyncToDisk(layer.c_layer()) };
    if err != gdal_sys::OGRErr::OGRERR_NONE {
        return Err(GeodatabaseError::Flush {
            stage,
            message: last_gdal_error_message(),
        });
    }
    Ok(())
}

fn sync_data_source(dataset: &Dataset) -> Result<(), GeodatabaseError> {
    for layer in dataset.layers() {
        sync_layer(&layer, FlushStage::DataSource)?;
    }
    Ok(())
}

fn flush_cache(dataset: &Dataset) -> Result<(), GeodatabaseError> {
    unsafe {
        gdal_sys::CPLErrorReset();
        gdal_sys::GDALFlushCache(dataset.c_dataset());
    }
    let last_error = unsafe { gdal_sys::CPLGetLastErrorType() };
    if last_error == gdal_sys::CPLErr::CE_Failure || last_error == gdal_sys::CPLErr::CE_Fatal {
        return Err(GeodatabaseError::Flush {
            stage: FlushStage::Cache,
            message: last_gdal_error_message(),
        });
    }
    Ok(())
}

/// A layer as read back from disk.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerContents {
    pub name: String,
    pub fields: Vec<FieldDefinition>,
    pub epsg_code: Option<EpsgCode>,
    pub features: Vec<Feature>,
}

/// Read every layer of the vector dataset at `filepath`. Only point layers with string, integer
/// and real fields are supported.
pub fn read_geodatabase(filepath: &Path) -> Result<Vec<LayerContents>, GeodatabaseError> {
    register_drivers();
    let open_options = DatasetOptions {
        open_flags: GdalOpenFlags::GDAL_OF_VECTOR,
        ..Default::default()
    };
    let dataset = Dataset::open_ex(filepath, open_options)?;
    let mut layers = Vec::new();
    for mut layer in dataset.layers() {
        layers.push(read_layer(&mut layer)?);
    }
    Ok(layers)
}

fn read_layer(layer: &mut Layer) -> Result<LayerContents, GeodatabaseError> {
    let name = layer.name();
    let fields = layer
        .defn()
        .fields()
        .map(|field| {
            let field_name = field.name();
            match FieldType::from_ogr_type(field.field_type()) {
                Some(field_type) => Ok(FieldDefinition {
                    name: field_name,
                    field_type,
                }),
                None => Err(GeodatabaseError::UnsupportedFieldType {
                    name: field_name,
                    ogr_type: field.field_type(),
                }),
            }
        })
        .collect::<Result<Vec<_>, _>>()?;
    let epsg_code = layer
        .defn()
        .geom_fields()
        .next()
        .and_then(|geom_field| geom_field.spatial_ref().ok())
        .and_then(|spatial_ref| identify_epsg_code(&spatial_ref));

    let mut features = Vec::new();
    for gdal_feature in layer.features() {
        let geometry = gdal_feature.geometry_by_index(0)?;
        let ogr_type = geometry.geometry_type();
        if ogr_type != OGRwkbGeometryType::wkbPoint {
            return Err(GeodatabaseError::UnexpectedGeometry {
                layer: name.clone(),
                ogr_type,
            });
        }
        let (x, y, _) = geometry.get_point(0);

        let mut attributes = HashMap::new();
        for (field_name, value) in gdal_feature.fields() {
            if let Some(value) = value {
                let value = AttributeValue::from_field_value(&field_name, value)?;
                attributes.insert(field_name, value);
            }
        }
        features.push(Feature {
            geometry: geo::Point::new(x, y),
            attributes,
        });
    }

    Ok(LayerContents {
        name,
        fields,
        epsg_code,
        features,
    })
}
