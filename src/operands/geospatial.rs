//! Geospatial conditions.
//!
//! Every shape lives in one [`SpatialIndex`], keyed by the condition testing
//! it and bucketed by one-degree latitude bands. A lookup only considers the
//! shapes of the point's band, filters them on their bounding box, then runs
//! the exact test: planar containment for boxes and polygons, great-circle
//! distance for circles and annuli.

use crate::{
    condition::{Condition, Operand},
    document::{Document, GeoPoint},
    hash::ConditionId,
    predicates::Shape,
};
use geo::Intersects;
use geo_types::{coord, LineString, Polygon, Rect};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Mean earth radius, in meters.
const EARTH_RADIUS: f64 = 6_371_008.8;

#[derive(Debug)]
enum Region {
    Rect(Rect<f64>),
    Polygon(Polygon<f64>),
    Ring {
        center: GeoPoint,
        from: f64,
        to: f64,
    },
}

#[derive(Debug)]
struct IndexedShape {
    region: Region,
    bounds: Rect<f64>,
}

impl IndexedShape {
    fn new(shape: &Shape) -> Self {
        match shape {
            Shape::BoundingBox {
                top,
                left,
                bottom,
                right,
            } => {
                let rect = Rect::new(
                    coord! { x: *left, y: *bottom },
                    coord! { x: *right, y: *top },
                );
                Self {
                    region: Region::Rect(rect),
                    bounds: rect,
                }
            }
            Shape::Polygon { points } => {
                let exterior: LineString<f64> =
                    points.iter().map(|[lat, lon]| (*lon, *lat)).collect();
                let polygon = Polygon::new(exterior, vec![]);
                let bounds = polygon_bounds(points);
                Self {
                    region: Region::Polygon(polygon),
                    bounds,
                }
            }
            Shape::Circle { lat, lon, radius } => Self::ring(*lat, *lon, 0.0, *radius),
            Shape::Annulus { lat, lon, from, to } => Self::ring(*lat, *lon, *from, *to),
        }
    }

    fn ring(lat: f64, lon: f64, from: f64, to: f64) -> Self {
        let center = GeoPoint { lat, lon };
        Self {
            region: Region::Ring { center, from, to },
            bounds: distance_bounds(center, to),
        }
    }

    fn contains(&self, point: GeoPoint) -> bool {
        let location = coord! { x: point.lon, y: point.lat };
        if !self.bounds.intersects(&location) {
            return false;
        }
        match &self.region {
            Region::Rect(rect) => rect.intersects(&location),
            Region::Polygon(polygon) => polygon.intersects(&location),
            Region::Ring { center, from, to } => {
                let distance = haversine_distance(*center, point);
                *from <= distance && distance <= *to
            }
        }
    }

    fn bands(&self) -> std::ops::RangeInclusive<i32> {
        band(self.bounds.min().y)..=band(self.bounds.max().y)
    }
}

fn polygon_bounds(points: &[[f64; 2]]) -> Rect<f64> {
    let (mut min_lat, mut min_lon) = (f64::INFINITY, f64::INFINITY);
    let (mut max_lat, mut max_lon) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
    for [lat, lon] in points {
        min_lat = min_lat.min(*lat);
        max_lat = max_lat.max(*lat);
        min_lon = min_lon.min(*lon);
        max_lon = max_lon.max(*lon);
    }
    Rect::new(
        coord! { x: min_lon, y: min_lat },
        coord! { x: max_lon, y: max_lat },
    )
}

/// Conservative bounding box of every point within `distance` of `center`.
fn distance_bounds(center: GeoPoint, distance: f64) -> Rect<f64> {
    let delta_lat = (distance / EARTH_RADIUS).to_degrees();
    let min_lat = (center.lat - delta_lat).max(-90.0);
    let max_lat = (center.lat + delta_lat).min(90.0);
    let widest = center.lat.abs() + delta_lat;
    let (min_lon, max_lon) = if widest >= 90.0 {
        (-180.0, 180.0)
    } else {
        let delta_lon = (delta_lat / widest.to_radians().cos()).min(180.0);
        if center.lon - delta_lon < -180.0 || center.lon + delta_lon > 180.0 {
            (-180.0, 180.0)
        } else {
            (center.lon - delta_lon, center.lon + delta_lon)
        }
    };
    Rect::new(
        coord! { x: min_lon, y: min_lat },
        coord! { x: max_lon, y: max_lat },
    )
}

/// Great-circle distance in meters.
pub(crate) fn haversine_distance(from: GeoPoint, to: GeoPoint) -> f64 {
    let delta_lat = (to.lat - from.lat).to_radians();
    let delta_lon = (to.lon - from.lon).to_radians();
    let a = (delta_lat / 2.0).sin().powi(2)
        + from.lat.to_radians().cos() * to.lat.to_radians().cos() * (delta_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS * a.sqrt().atan2((1.0 - a).sqrt())
}

fn band(lat: f64) -> i32 {
    lat.floor() as i32
}

#[derive(Debug, Default)]
pub(crate) struct SpatialIndex {
    shapes: HashMap<ConditionId, IndexedShape>,
    bands: BTreeMap<i32, HashSet<ConditionId>>,
}

impl SpatialIndex {
    pub(crate) fn insert(&mut self, id: ConditionId, shape: &Shape) {
        let shape = IndexedShape::new(shape);
        for band in shape.bands() {
            self.bands.entry(band).or_default().insert(id);
        }
        self.shapes.insert(id, shape);
    }

    pub(crate) fn remove(&mut self, id: ConditionId) {
        let Some(shape) = self.shapes.remove(&id) else {
            unreachable!("removing an unindexed shape. This is a bug.");
        };
        for band in shape.bands() {
            if let Some(ids) = self.bands.get_mut(&band) {
                ids.remove(&id);
                if ids.is_empty() {
                    self.bands.remove(&band);
                }
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    /// Every indexed shape containing `point`.
    pub(crate) fn search(&self, point: GeoPoint) -> HashSet<ConditionId> {
        self.bands
            .get(&band(point.lat))
            .into_iter()
            .flatten()
            .filter(|id| self.shapes.get(*id).is_some_and(|shape| shape.contains(point)))
            .copied()
            .collect()
    }
}

/// `geospatial`/`notgeospatial`: field to the conditions whose shape is
/// tested against it.
#[derive(Debug, Default)]
pub(crate) struct GeospatialOperand {
    negated: bool,
    fields: HashMap<String, HashSet<ConditionId>>,
}

impl GeospatialOperand {
    pub(crate) fn new(negated: bool) -> Self {
        Self {
            negated,
            fields: HashMap::new(),
        }
    }

    pub(crate) fn insert(&mut self, condition: &Condition, spatial: &mut SpatialIndex) {
        spatial.insert(condition.id(), shape_of(condition));
        self.fields
            .entry(condition.field().to_owned())
            .or_default()
            .insert(condition.id());
    }

    pub(crate) fn remove(&mut self, condition: &Condition, spatial: &mut SpatialIndex) {
        let Some(ids) = self.fields.get_mut(condition.field()) else {
            unreachable!("removing an unindexed {} condition. This is a bug.", condition.keyword());
        };
        ids.remove(&condition.id());
        spatial.remove(condition.id());
        if ids.is_empty() {
            self.fields.remove(condition.field());
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub(crate) fn has_field(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub(crate) fn test(
        &self,
        document: &Document,
        spatial: &SpatialIndex,
        fired: &mut Vec<ConditionId>,
    ) {
        for (field, ids) in &self.fields {
            let hits = document
                .geopoint(field)
                .map(|point| spatial.search(point))
                .unwrap_or_default();
            fired.extend(ids.iter().filter(|id| hits.contains(*id) != self.negated));
        }
    }
}

fn shape_of(condition: &Condition) -> &Shape {
    match condition.operand() {
        Operand::Shape(shape) => shape,
        operand => unreachable!("geospatial index got a {operand:?} operand. This is a bug."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(lat: f64, lon: f64) -> GeoPoint {
        GeoPoint { lat, lon }
    }

    fn index(shapes: &[(u64, Shape)]) -> SpatialIndex {
        let mut index = SpatialIndex::default();
        for (id, shape) in shapes {
            index.insert(ConditionId::from(*id), shape);
        }
        index
    }

    fn search(index: &SpatialIndex, point: GeoPoint) -> Vec<u64> {
        let mut found: Vec<u64> = index.search(point).into_iter().map(u64::from).collect();
        found.sort_unstable();
        found
    }

    #[test]
    fn can_compute_great_circle_distances() {
        let paris = point(48.8566, 2.3522);
        let london = point(51.5074, -0.1278);

        let distance = haversine_distance(paris, london);

        assert!((distance - 343_550.0).abs() < 1_000.0, "got {distance}");
    }

    #[test]
    fn can_find_points_in_a_bounding_box() {
        let index = index(&[(
            1,
            Shape::BoundingBox {
                top: 44.0,
                left: 3.0,
                bottom: 43.0,
                right: 4.0,
            },
        )]);

        assert_eq!(vec![1], search(&index, point(43.5, 3.5)));
        assert_eq!(vec![1], search(&index, point(44.0, 4.0)));
        assert!(search(&index, point(45.0, 3.5)).is_empty());
    }

    #[test]
    fn can_find_points_in_a_circle_spanning_several_bands() {
        let index = index(&[(
            1,
            Shape::Circle {
                lat: 43.0,
                lon: 3.0,
                radius: 300_000.0,
            },
        )]);

        assert_eq!(vec![1], search(&index, point(45.0, 3.0)));
        assert!(search(&index, point(46.0, 3.0)).is_empty());
    }

    #[test]
    fn an_annulus_excludes_its_center() {
        let index = index(&[(
            1,
            Shape::Annulus {
                lat: 0.0,
                lon: 0.0,
                from: 10_000.0,
                to: 20_000.0,
            },
        )]);

        assert!(search(&index, point(0.0, 0.0)).is_empty());
        assert_eq!(vec![1], search(&index, point(0.135, 0.0)));
        assert!(search(&index, point(0.5, 0.0)).is_empty());
    }

    #[test]
    fn can_find_points_in_a_polygon() {
        let index = index(&[(
            1,
            Shape::Polygon {
                points: vec![[0.0, 0.0], [0.0, 10.0], [10.0, 0.0]],
            },
        )]);

        assert_eq!(vec![1], search(&index, point(2.0, 2.0)));
        assert!(search(&index, point(8.0, 8.0)).is_empty());
    }

    #[test]
    fn removing_a_shape_empties_its_bands() {
        let mut index = index(&[(
            1,
            Shape::Circle {
                lat: 43.0,
                lon: 3.0,
                radius: 300_000.0,
            },
        )]);

        index.remove(ConditionId::from(1));

        assert!(index.is_empty());
        assert!(index.bands.is_empty());
    }

    #[test]
    fn a_circle_around_a_pole_covers_every_longitude() {
        let index = index(&[(
            1,
            Shape::Circle {
                lat: 89.9,
                lon: 0.0,
                radius: 50_000.0,
            },
        )]);

        assert_eq!(vec![1], search(&index, point(89.9, 179.0)));
    }
}
