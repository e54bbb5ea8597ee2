use std::ffi::{CStr, CString};

use gdal::vector::{Layer, LayerAccess};

use crate::errors::GeodatabaseError;

use super::schema::FieldDefinition;

/// Owned OGR field definition handle, destroyed on drop.
///
/// The `gdal` crate only adds fields with approximate name matching enabled, which lets drivers
/// silently rename or truncate a column. Fields are created through `gdal-sys` instead so that a
/// name the driver cannot store exactly is an error.
struct OgrFieldDefn {
    c_field_defn: gdal_sys::OGRFieldDefnH,
    name: String,
}

impl OgrFieldDefn {
    fn new(definition: &FieldDefinition) -> Result<Self, GeodatabaseError> {
        let c_name =
            CString::new(definition.name.as_str()).map_err(|_| GeodatabaseError::InvalidFieldName {
                name: definition.name.clone(),
            })?;
        let c_field_defn =
            unsafe { gdal_sys::OGR_Fld_Create(c_name.as_ptr(), definition.field_type.ogr_type()) };
        if c_field_defn.is_null() {
            return Err(GeodatabaseError::CreateField {
                name: definition.name.clone(),
                message: last_gdal_error_message(),
            });
        }
        Ok(Self {
            c_field_defn,
            name: definition.name.clone(),
        })
    }

    fn add_to_layer(&self, layer: &Layer) -> Result<(), GeodatabaseError> {
        let approx_ok = 0;
        let err =
            unsafe { gdal_sys::OGR_L_CreateField(layer.c_layer(), self.c_field_defn, approx_ok) };
        if err != gdal_sys::OGRErr::OGRERR_NONE {
            return Err(GeodatabaseError::CreateField {
                name: self.name.clone(),
                message: last_gdal_error_message(),
            });
        }
        Ok(())
    }
}

impl Drop for OgrFieldDefn {
    fn drop(&mut self) {
        unsafe { gdal_sys::OGR_Fld_Destroy(self.c_field_defn) };
    }
}

/// Declare `fields` on `layer` in order, requiring the layer to keep every name as given.
pub fn create_fields(layer: &Layer, fields: &[FieldDefinition]) -> Result<(), GeodatabaseError> {
    for field in fields {
        log::debug!("Creating field {} of type {:?}", field.name, field.field_type);
        OgrFieldDefn::new(field)?.add_to_layer(layer)?;
    }

    let created_names: Vec<String> = layer.defn().fields().map(|field| field.name()).collect();
    check_created_names(fields, &created_names)
}

fn check_created_names(
    fields: &[FieldDefinition],
    created_names: &[String],
) -> Result<(), GeodatabaseError> {
    for (index, declared) in fields.iter().enumerate() {
        match created_names.get(index) {
            Some(created) if created == &declared.name => {}
            Some(created) => {
                return Err(GeodatabaseError::CreateField {
                    name: declared.name.clone(),
                    message: format!("the driver stored the field as '{}'", created),
                })
            }
            None => {
                return Err(GeodatabaseError::CreateField {
                    name: declared.name.clone(),
                    message: "the field is missing from the layer definition".to_string(),
                })
            }
        }
    }
    if created_names.len() > fields.len() {
        return Err(GeodatabaseError::CreateField {
            name: created_names[fields.len()].clone(),
            message: "the layer has a field that was not declared".to_string(),
        });
    }
    Ok(())
}

pub fn last_gdal_error_message() -> String {
    let message = unsafe { CStr::from_ptr(gdal_sys::CPLGetLastErrorMsg()) };
    let message = message.to_string_lossy().trim().to_string();
    if message.is_empty() {
        "unknown GDAL error".to_string()
    } else {
        message
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use crate::{
        errors::{ErrorKind, GeodatabaseError},
        geofile::schema::{FieldDefinition, FieldType},
    };

    use super::check_created_names;

    fn declared(names: &[&str]) -> Vec<FieldDefinition> {
        names
            .iter()
            .map(|name| FieldDefinition::new(name, FieldType::String))
            .collect()
    }

    fn created(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    #[test]
    fn test_created_names_match() {
        check_created_names(&declared(&["Name", "Email"]), &created(&["Name", "Email"])).unwrap();
    }

    #[rstest]
    #[case(&["Name", "Email"], &["Name", "Emai"], "Email")]
    #[case(&["Name", "Email"], &["Name"], "Email")]
    #[case(&["Name", "Email"], &[], "Name")]
    #[case(&["Name"], &["Name", "Extra"], "Extra")]
    fn test_created_names_mismatch(
        #[case] declared_names: &[&str],
        #[case] created_names: &[&str],
        #[case] expected_field: &str,
    ) {
        let err = check_created_names(&declared(declared_names), &created(created_names))
            .unwrap_err();
        assert!(
            matches!(err, GeodatabaseError::CreateField { ref name, .. } if name == expected_field)
        );
        assert_eq!(err.kind(), ErrorKind::Schema);
    }
}
