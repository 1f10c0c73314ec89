//! Polygon-membership filtering of candidate points.
//!
//! Membership is strict interior: a point lying exactly on a polygon edge or
//! vertex is outside. Polygons are indexed by bounding box so each point is
//! only tested against the few polygons whose envelope covers it.

use crate::error::{ProcessingError, Result};
use crate::utils::CoordKey;
use geo::{BoundingRect, Contains, MultiPolygon, Point, Polygon};
use rstar::primitives::{GeomWithData, Rectangle};
use rstar::{RTree, AABB};
use std::collections::HashSet;

type PolygonEnvelope = GeomWithData<Rectangle<[f64; 2]>, usize>;

pub struct Region {
    polygons: Vec<Polygon<f64>>,
    index: RTree<PolygonEnvelope>,
}

impl Region {
    pub fn new(polygons: Vec<Polygon<f64>>) -> Result<Self> {
        let envelopes: Vec<PolygonEnvelope> = polygons
            .iter()
            .enumerate()
            .filter_map(|(i, polygon)| {
                polygon.bounding_rect().map(|rect| {
                    let (min, max) = (rect.min(), rect.max());
                    GeomWithData::new(Rectangle::from_corners([min.x, min.y], [max.x, max.y]), i)
                })
            })
            .collect();

        if envelopes.is_empty() {
            return Err(ProcessingError::Config(
                "Region contains no polygon with a usable boundary".to_string(),
            ));
        }

        Ok(Self {
            polygons,
            index: RTree::bulk_load(envelopes),
        })
    }

    pub fn from_multi_polygon(multi: MultiPolygon<f64>) -> Result<Self> {
        Self::new(multi.0)
    }

    pub fn polygon_count(&self) -> usize {
        self.polygons.len()
    }

    /// Strict containment of a geographic point in any polygon of the region
    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        let point = Point::new(lon, lat);
        self.index
            .locate_in_envelope_intersecting(&AABB::from_point([lon, lat]))
            .any(|envelope| self.polygons[envelope.data].contains(&point))
    }

    /// Indices of the points inside the region, in input order, keeping
    /// only the first occurrence of each coordinate at `precision` decimals.
    pub fn retain_indices(&self, points: &[(f64, f64)], precision: u32) -> Vec<usize> {
        let mut seen = HashSet::with_capacity(points.len());
        points
            .iter()
            .enumerate()
            .filter(|(_, &(lon, lat))| self.contains(lon, lat))
            .filter(|(_, &(lon, lat))| seen.insert(CoordKey::new(lon, lat, precision)))
            .map(|(i, _)| i)
            .collect()
    }

    /// Ordered, deduplicated subsequence of the points inside the region
    pub fn filter_points(&self, points: &[(f64, f64)], precision: u32) -> Vec<(f64, f64)> {
        self.retain_indices(points, precision)
            .into_iter()
            .map(|i| points[i])
            .collect()
    }
}
