use std::collections::HashMap;

use gdal::vector::FieldValue;
use serde::{Deserialize, Deserializer};

use crate::errors::GeodatabaseError;

use super::schema::{FieldType, LayerSchema};

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum AttributeValue {
    Integer(i32),
    Real(f64),
    String(String),
}

impl AttributeValue {
    /// Convert the value to what a field of `field_type` stores, or `None` if it does not fit.
    ///
    /// String fields only take strings. An unquoted YAML scalar such as `01234` or `1.10` is
    /// already a number by the time it gets here and could not be written back as typed.
    pub fn coerce_to(&self, field_type: FieldType) -> Option<AttributeValue> {
        match (field_type, self) {
            (FieldType::String, AttributeValue::String(_)) => Some(self.clone()),
            (FieldType::Integer, AttributeValue::Integer(_)) => Some(self.clone()),
            (FieldType::Real, AttributeValue::Real(_)) => Some(self.clone()),
            (FieldType::Real, AttributeValue::Integer(value)) => {
                Some(AttributeValue::Real(*value as f64))
            }
            _ => None,
        }
    }

    pub fn from_field_value(name: &str, value: FieldValue) -> Result<Self, GeodatabaseError> {
        match value {
            FieldValue::StringValue(value) => Ok(AttributeValue::String(value)),
            FieldValue::IntegerValue(value) => Ok(AttributeValue::Integer(value)),
            FieldValue::RealValue(value) => Ok(AttributeValue::Real(value)),
            FieldValue::Integer64Value(value) => i32::try_from(value)
                .map(AttributeValue::Integer)
                .map_err(|_| GeodatabaseError::FieldTypeMismatch {
                    name: name.to_string(),
                    expected: FieldType::Integer,
                }),
            other => Err(GeodatabaseError::UnsupportedFieldValue {
                name: name.to_string(),
                value: format!("{:?}", other),
            }),
        }
    }
}

/// One record of the point layer.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct Feature {
    #[serde(rename = "point", deserialize_with = "deserialize_point")]
    pub geometry: geo::Point,
    #[serde(default)]
    pub attributes: HashMap<String, AttributeValue>,
}

impl From<geo::Point> for Feature {
    fn from(value: geo::Point) -> Self {
        Self {
            geometry: value,
            attributes: HashMap::new(),
        }
    }
}

impl Feature {
    pub fn with_attribute(mut self, name: &str, value: AttributeValue) -> Self {
        self.attributes.insert(name.to_string(), value);
        self
    }

    /// Check the record against the layer schema and return its values in field declaration
    /// order, converted to the declared field types.
    pub fn values_for(
        &self,
        schema: &LayerSchema,
        index: usize,
    ) -> Result<Vec<AttributeValue>, GeodatabaseError> {
        if let Some(name) = self
            .attributes
            .keys()
            .find(|name| schema.field(name).is_none())
        {
            return Err(GeodatabaseError::UndeclaredField {
                name: name.clone(),
                layer: schema.name.clone(),
            });
        }
        schema
            .fields
            .iter()
            .map(|field| {
                let value = self.attributes.get(&field.name).ok_or_else(|| {
                    GeodatabaseError::MissingField {
                        index,
                        name: field.name.clone(),
                    }
                })?;
                value
                    .coerce_to(field.field_type)
                    .ok_or_else(|| GeodatabaseError::FieldTypeMismatch {
                        name: field.name.clone(),
                        expected: field.field_type,
                    })
            })
            .collect()
    }
}

fn deserialize_point<'de, D: Deserializer<'de>>(deserializer: D) -> Result<geo::Point, D::Error> {
    let [x, y] = <[f64; 2]>::deserialize(deserializer)?;
    Ok(geo::Point::new(x, y))
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use crate::{
        crs::crs_utils::SpatialRefId,
        errors::{ErrorKind, GeodatabaseError},
        geofile::schema::{FieldDefinition, FieldType, LayerSchema},
    };

    use super::{AttributeValue, Feature};

    fn contacts_schema() -> LayerSchema {
        LayerSchema {
            name: "contacts".to_string(),
            spatial_ref: SpatialRefId::Epsg(4326),
            fields: vec![
                FieldDefinition::new("Name", FieldType::String),
                FieldDefinition::new("Age", FieldType::Integer),
                FieldDefinition::new("Score", FieldType::Real),
            ],
            options: vec![],
        }
    }

    fn bob() -> Feature {
        Feature::from(geo::Point::new(25.7837, 71.1710))
            .with_attribute("Name", AttributeValue::String("Bob".to_string()))
            .with_attribute("Age", AttributeValue::Integer(42))
            .with_attribute("Score", AttributeValue::Integer(7))
    }

    #[test]
    fn test_values_follow_declaration_order() {
        let values = bob().values_for(&contacts_schema(), 0).unwrap();
        assert_eq!(
            values,
            vec![
                AttributeValue::String("Bob".to_string()),
                AttributeValue::Integer(42),
                AttributeValue::Real(7.0),
            ]
        );
    }

    #[test]
    fn test_undeclared_field_is_rejected() {
        let feature = bob().with_attribute("Phone", AttributeValue::String("555".to_string()));
        let err = feature.values_for(&contacts_schema(), 0).unwrap_err();
        assert!(matches!(err, GeodatabaseError::UndeclaredField { ref name, .. } if name == "Phone"));
        assert_eq!(err.kind(), ErrorKind::Schema);
    }

    #[test]
    fn test_field_names_are_matched_exactly() {
        let feature = Feature::from(geo::Point::new(0.0, 0.0))
            .with_attribute("name", AttributeValue::String("Bob".to_string()));
        let err = feature.values_for(&contacts_schema(), 0).unwrap_err();
        assert!(matches!(err, GeodatabaseError::UndeclaredField { .. }));
    }

    #[test]
    fn test_missing_field_is_rejected() {
        let mut feature = bob();
        feature.attributes.remove("Age");
        let err = feature.values_for(&contacts_schema(), 3).unwrap_err();
        assert!(matches!(err, GeodatabaseError::MissingField { index: 3, ref name } if name == "Age"));
    }

    #[rstest]
    #[case(FieldType::String, AttributeValue::String("01234".to_string()), Some(AttributeValue::String("01234".to_string())))]
    #[case(FieldType::String, AttributeValue::Integer(5), None)]
    #[case(FieldType::String, AttributeValue::Real(2.5), None)]
    #[case(FieldType::Integer, AttributeValue::Integer(5), Some(AttributeValue::Integer(5)))]
    #[case(FieldType::Integer, AttributeValue::Real(2.5), None)]
    #[case(FieldType::Integer, AttributeValue::String("5".to_string()), None)]
    #[case(FieldType::Real, AttributeValue::Integer(5), Some(AttributeValue::Real(5.0)))]
    #[case(FieldType::Real, AttributeValue::String("x".to_string()), None)]
    fn test_coerce_to(
        #[case] field_type: FieldType,
        #[case] value: AttributeValue,
        #[case] expected: Option<AttributeValue>,
    ) {
        assert_eq!(value.coerce_to(field_type), expected);
    }

    #[test]
    fn test_feature_from_yaml() {
        let feature: Feature = serde_yaml::from_str(
            r#"
point: [25.7837, 71.1710]
attributes: { Name: Bob, Email: bob@google.com, Age: 42, Score: 0.5 }
"#,
        )
        .unwrap();
        assert_eq!(feature.geometry, geo::Point::new(25.7837, 71.1710));
        assert_eq!(
            feature.attributes["Email"],
            AttributeValue::String("bob@google.com".to_string())
        );
        assert_eq!(feature.attributes["Age"], AttributeValue::Integer(42));
        assert_eq!(feature.attributes["Score"], AttributeValue::Real(0.5));
    }

    #[rstest]
    #[case("{ Name: Bob, Zip: 12345 }")]
    #[case("{ Name: Bob, Zip: 1.10 }")]
    fn test_unquoted_number_for_string_field_is_rejected(#[case] attributes: &str) {
        let schema = LayerSchema {
            fields: vec![
                FieldDefinition::new("Name", FieldType::String),
                FieldDefinition::new("Zip", FieldType::String),
            ],
            ..contacts_schema()
        };
        let feature: Feature =
            serde_yaml::from_str(&format!("{{ point: [0.0, 0.0], attributes: {} }}", attributes))
                .unwrap();

        let err = feature.values_for(&schema, 0).unwrap_err();
        assert!(matches!(err, GeodatabaseError::FieldTypeMismatch { ref name, .. } if name == "Zip"));
        assert_eq!(err.kind(), ErrorKind::Schema);
    }

    #[test]
    fn test_quoted_number_for_string_field_is_kept_verbatim() {
        let schema = LayerSchema {
            fields: vec![FieldDefinition::new("Zip", FieldType::String)],
            ..contacts_schema()
        };
        let feature: Feature =
            serde_yaml::from_str(r#"{ point: [0.0, 0.0], attributes: { Zip: "01234" } }"#).unwrap();

        let values = feature.values_for(&schema, 0).unwrap();
        assert_eq!(values, vec![AttributeValue::String("01234".to_string())]);
    }
}
