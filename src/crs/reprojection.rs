use gdal::{
    spatial_ref::{CoordTransform, SpatialRef},
    vector::{Geometry, OGRwkbGeometryType},
};

use crate::errors::GeodatabaseError;

use super::crs_utils::{describe_spatial_ref, SpatialRefId};

/// Transform `geometry` in place from `source` to `target`.
///
/// Any failure is fatal, there is no fallback to an untransformed geometry. A missing
/// transformation path and a failing transformation are reported as different errors.
pub fn reproject(
    geometry: &mut Geometry,
    source: &SpatialRef,
    target: &SpatialRef,
) -> Result<(), GeodatabaseError> {
    let transform =
        CoordTransform::new(source, target).map_err(|err| GeodatabaseError::NoTransformation {
            from: describe_spatial_ref(source),
            to: describe_spatial_ref(target),
            source: err,
        })?;
    geometry
        .transform_inplace(&transform)
        .map_err(|source| GeodatabaseError::ProjectionFailed { source })?;
    geometry.set_spatial_ref(target.clone());
    Ok(())
}

/// Reproject a single 2D point given as lon/lat or easting/northing.
pub fn reproject_point(
    point: geo::Point,
    source: &SpatialRefId,
    target: &SpatialRefId,
) -> Result<(geo::Point, SpatialRef), GeodatabaseError> {
    let source_ref = source.resolve()?;
    let target_ref = target.resolve()?;

    let mut geometry = Geometry::empty(OGRwkbGeometryType::wkbPoint)?;
    geometry.set_point_2d(0, point.x_y());
    geometry.set_spatial_ref(source_ref.clone());

    log::debug!("Reprojecting {:?} from {} to {}", point, source, target);
    reproject(&mut geometry, &source_ref, &target_ref)?;
    let (x, y, _) = geometry.get_point(0);
    let spatial_ref = geometry
        .spatial_ref()
        .ok_or_else(|| GeodatabaseError::MissingSpatialRef {
            geometry: format!("{:?}", point),
        })?;
    Ok((geo::Point::new(x, y), spatial_ref))
}
