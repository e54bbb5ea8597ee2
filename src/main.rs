extern crate log;
pub mod crs;
pub mod errors;
pub mod geofile;
use crate::crs::crs_utils::{epsg_4326, SpatialRefId};
use crate::crs::reprojection::reproject_point;
use crate::geofile::feature::{AttributeValue, Feature};
use crate::geofile::gdal_geofile::{
    build_geodatabase, read_geodatabase, GdalDriverType, GeodatabaseSpec,
};
use crate::geofile::schema::{FieldDefinition, FieldType, LayerSchema};
use anyhow::anyhow;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::{fs::read_to_string, path::Path};

/// Build an ESRI file geodatabase with a point layer using GDAL.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build a dataset from a config file, or the demo contacts dataset if none is given.
    Build {
        /// Path to the input config file.
        #[arg(short, long)]
        config_filepath: Option<PathBuf>,
        /// Overrides the output path of the config. Anything at this path is deleted.
        #[arg(short, long)]
        output_path: Option<PathBuf>,
        /// Read the dataset back after writing and log its contents.
        #[arg(long)]
        verify: bool,
    },
    /// Reproject a single point.
    Reproject {
        #[arg(long, allow_negative_numbers = true)]
        x: f64,
        #[arg(long, allow_negative_numbers = true)]
        y: f64,
        /// EPSG code or well known name of the source CRS.
        #[arg(long, default_value = "WGS84")]
        from: SpatialRefId,
        /// EPSG code or well known name of the target CRS.
        #[arg(long)]
        to: SpatialRefId,
    },
}

/// Two contacts sharing the same location.
fn demo_spec(output_path: PathBuf) -> GeodatabaseSpec {
    let location = geo::Point::new(25.7837, 71.1710);
    let contact = |name: &str, email: &str| {
        Feature::from(location)
            .with_attribute("Name", AttributeValue::String(name.to_string()))
            .with_attribute("Email", AttributeValue::String(email.to_string()))
    };
    GeodatabaseSpec {
        output_path,
        driver: GdalDriverType::OpenFileGdb.name().to_string(),
        dataset_options: vec![],
        layer: LayerSchema {
            name: "contacts".to_string(),
            spatial_ref: epsg_4326(),
            fields: vec![
                FieldDefinition::new("Name", FieldType::String),
                FieldDefinition::new("Email", FieldType::String),
            ],
            options: vec![],
        },
        features: vec![
            contact("Bob", "bob@google.com"),
            contact("Alice", "alice@google.com"),
        ],
    }
}

fn load_spec(
    config_filepath: Option<PathBuf>,
    output_path: Option<PathBuf>,
) -> anyhow::Result<GeodatabaseSpec> {
    let mut spec = match config_filepath {
        Some(config_filepath) => {
            if !Path::new(&config_filepath).exists() {
                return Err(anyhow!("Config file {:?} not found", &config_filepath));
            }
            let config_contents = read_to_string(&config_filepath)?;
            serde_yaml::from_str(&config_contents)?
        }
        None => {
            log::info!("No config file given, building the demo dataset");
            demo_spec(std::env::current_dir()?.join("contacts.gdb"))
        }
    };
    if let Some(output_path) = output_path {
        spec.output_path = output_path;
    }
    Ok(spec)
}

fn try_main() -> anyhow::Result<()> {
    let args = Args::try_parse()?;

    match args.command {
        Command::Build {
            config_filepath,
            output_path,
            verify,
        } => {
            let spec = load_spec(config_filepath, output_path)?;
            let summary = build_geodatabase(&spec)?;
            if verify {
                for layer in read_geodatabase(&summary.output_path)? {
                    log::info!(
                        "Layer {} has {} features, fields {:?}, EPSG {:?}",
                        layer.name,
                        layer.features.len(),
                        layer.fields,
                        layer.epsg_code
                    );
                }
            }
            println!("Geodatabase written to {}", summary.output_path.display());
        }
        Command::Reproject { x, y, from, to } => {
            let (point, _) = reproject_point(geo::Point::new(x, y), &from, &to)?;
            println!("{} {}", point.x(), point.y());
        }
    }
    Ok(())
}

fn main() {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info")
    }
    env_logger::init();
    if let Err(e) = try_main() {
        eprintln!("Error: {:?}", e);
        std::process::exit(1)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use testdir::testdir;

    use crate::{
        crs::crs_utils::SpatialRefId,
        geofile::{feature::AttributeValue, gdal_geofile::GdalDriverType},
    };

    use super::{demo_spec, load_spec};

    #[test]
    fn test_demo_spec_features_match_schema() {
        let spec = demo_spec("contacts.gdb".into());
        assert_eq!(spec.driver, GdalDriverType::OpenFileGdb.name());
        assert_eq!(spec.features.len(), 2);
        for (index, feature) in spec.features.iter().enumerate() {
            feature.values_for(&spec.layer, index).unwrap();
        }
    }

    #[test]
    fn test_load_spec_from_config_file() {
        let dir = testdir!();
        let config_filepath = dir.join("contacts.yaml");
        fs::write(
            &config_filepath,
            r#"
output_path: contacts.gpkg
driver: GPKG
layer:
  name: people
  spatial_ref: WGS84
  fields:
    - { name: Name, type: string }
features:
  - point: [1.5, 2.5]
    attributes: { Name: Bob }
"#,
        )
        .unwrap();

        let spec = load_spec(Some(config_filepath), Some(dir.join("override.gpkg"))).unwrap();
        assert_eq!(spec.output_path, dir.join("override.gpkg"));
        assert_eq!(spec.driver, "GPKG");
        assert!(spec.dataset_options.is_empty());
        assert_eq!(spec.layer.name, "people");
        assert_eq!(spec.layer.spatial_ref, SpatialRefId::Name("WGS84".to_string()));
        assert_eq!(spec.features[0].geometry, geo::Point::new(1.5, 2.5));
        assert_eq!(
            spec.features[0].attributes["Name"],
            AttributeValue::String("Bob".to_string())
        );
    }

    #[test]
    fn test_load_spec_missing_config_fails() {
        let missing = testdir!().join("missing.yaml");
        assert!(load_spec(Some(missing), None).is_err());
    }

    #[test]
    fn test_bundled_config_parses() {
        let config_filepath = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("config")
            .join("contacts.yaml");
        let spec = load_spec(Some(config_filepath), None).unwrap();
        assert_eq!(spec.layer.spatial_ref, SpatialRefId::Epsg(4326));
        assert_eq!(spec.features.len(), 2);
    }
}
