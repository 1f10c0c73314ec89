//! GeoJSON region boundaries.
//!
//! Accepts a bare Polygon or MultiPolygon geometry, a GeometryCollection,
//! a Feature or a FeatureCollection. Non-areal geometries are ignored.

use crate::error::{ProcessingError, Result};
use crate::processors::Region;
use geo::{Coord, LineString, Polygon};
use serde_json::Value;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::{debug, info};

pub fn read_region(path: &Path) -> Result<Region> {
    let file = File::open(path).map_err(|e| {
        ProcessingError::Config(format!("Cannot open region {}: {}", path.display(), e))
    })?;
    let document: Value = serde_json::from_reader(BufReader::new(file)).map_err(|e| {
        ProcessingError::Config(format!("Region {} is not valid JSON: {}", path.display(), e))
    })?;

    let polygons = parse_polygons(&document)?;
    if polygons.is_empty() {
        return Err(ProcessingError::Config(format!(
            "Region {} contains no polygon",
            path.display()
        )));
    }

    info!("Loaded {} polygon(s) from {}", polygons.len(), path.display());
    Region::new(polygons)
}

/// Every polygon of a GeoJSON document, in document order
pub fn parse_polygons(document: &Value) -> Result<Vec<Polygon<f64>>> {
    let mut polygons = Vec::new();
    collect(document, &mut polygons)?;
    Ok(polygons)
}

fn collect(node: &Value, polygons: &mut Vec<Polygon<f64>>) -> Result<()> {
    let kind = node.get("type").and_then(Value::as_str).unwrap_or_default();

    match kind {
        "FeatureCollection" => {
            for feature in array(node, "features")? {
                collect(feature, polygons)?;
            }
        }
        "Feature" => match node.get("geometry") {
            Some(Value::Null) | None => debug!("Skipping feature without geometry"),
            Some(geometry) => collect(geometry, polygons)?,
        },
        "GeometryCollection" => {
            for geometry in array(node, "geometries")? {
                collect(geometry, polygons)?;
            }
        }
        "Polygon" => polygons.push(polygon(node.get("coordinates"))?),
        "MultiPolygon" => {
            for part in array(node, "coordinates")? {
                polygons.push(polygon(Some(part))?);
            }
        }
        other => debug!("Ignoring GeoJSON object of type '{}'", other),
    }

    Ok(())
}

fn array<'v>(node: &'v Value, key: &str) -> Result<&'v Vec<Value>> {
    node.get(key)
        .and_then(Value::as_array)
        .ok_or_else(|| invalid(&format!("'{}' must be an array", key)))
}

fn polygon(rings: Option<&Value>) -> Result<Polygon<f64>> {
    let rings = rings
        .and_then(Value::as_array)
        .ok_or_else(|| invalid("polygon coordinates must be an array of rings"))?;

    let mut rings = rings.iter().map(ring);
    let exterior = rings
        .next()
        .ok_or_else(|| invalid("polygon has no exterior ring"))??;
    let interiors = rings.collect::<Result<Vec<_>>>()?;

    Ok(Polygon::new(exterior, interiors))
}

fn ring(value: &Value) -> Result<LineString<f64>> {
    let positions = value
        .as_array()
        .ok_or_else(|| invalid("ring must be an array of positions"))?;

    let coords = positions
        .iter()
        .map(|position| {
            let lon = position.get(0).and_then(Value::as_f64);
            let lat = position.get(1).and_then(Value::as_f64);
            match (lon, lat) {
                (Some(x), Some(y)) => Ok(Coord { x, y }),
                _ => Err(invalid("position must hold two numbers")),
            }
        })
        .collect::<Result<Vec<_>>>()?;

    if coords.len() < 3 {
        return Err(invalid("ring needs at least three positions"));
    }
    Ok(LineString::new(coords))
}

fn invalid(message: &str) -> ProcessingError {
    ProcessingError::Config(format!("Invalid GeoJSON region: {}", message))
}
