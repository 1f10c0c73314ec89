//! Conversion from the source grid systems to geographic WGS84 degrees.
//!
//! Only two systems are supported: plain longitude/latitude, and the NTF
//! Lambert II extended grid (EPSG:27572) used by the SAFRAN reanalysis, whose
//! coordinates are published in hectometres.

use crate::error::{ProcessingError, Result};
use serde::{Deserialize, Serialize};
use std::f64::consts::FRAC_PI_2;

/// Lambert II extended cone constant
const LAMBERT2_N: f64 = 0.728_968_627_4;
/// Lambert II extended projection constant (metres)
const LAMBERT2_C: f64 = 11_745_793.39;
/// False easting of the pole (metres)
const LAMBERT2_XS: f64 = 600_000.0;
/// Northing of the pole (metres), includes the extended false northing
const LAMBERT2_YS: f64 = 8_199_695.768;
/// Paris meridian east of Greenwich (radians, 2°20'14.025")
const PARIS_MERIDIAN: f64 = 0.040_792_344_33;

/// Clarke 1880 IGN ellipsoid (NTF)
const CLARKE_A: f64 = 6_378_249.2;
const CLARKE_E: f64 = 0.082_483_256_76;

/// WGS84 ellipsoid
const WGS84_A: f64 = 6_378_137.0;
const WGS84_E2: f64 = 0.006_694_379_990_14;

/// NTF to WGS84 geocentric translation (metres)
const NTF_TO_WGS84: [f64; 3] = [-168.0, -60.0, 320.0];

/// Hectometre grid units to metres
const HECTOMETRE: f64 = 100.0;

const ITERATION_EPSILON: f64 = 1e-11;
const MAX_ITERATIONS: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum CoordinateSystem {
    /// Longitude/latitude in WGS84 degrees
    #[default]
    Geographic,
    /// NTF Lambert II extended, coordinates in hectometres
    #[serde(alias = "lambert2")]
    #[value(alias = "lambert2")]
    LambertIiExtended,
}

impl CoordinateSystem {
    /// Convert a source coordinate pair to (longitude, latitude) in degrees
    pub fn to_geographic(&self, x: f64, y: f64) -> Result<(f64, f64)> {
        match self {
            CoordinateSystem::Geographic => Ok((x, y)),
            CoordinateSystem::LambertIiExtended => lambert2_extended_to_wgs84(x, y),
        }
    }
}

impl std::fmt::Display for CoordinateSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CoordinateSystem::Geographic => write!(f, "WGS84 lon/lat"),
            CoordinateSystem::LambertIiExtended => write!(f, "Lambert II extended (hm)"),
        }
    }
}

/// Lambert II extended hectometres to WGS84 (longitude, latitude) degrees
pub fn lambert2_extended_to_wgs84(x_hm: f64, y_hm: f64) -> Result<(f64, f64)> {
    if !x_hm.is_finite() || !y_hm.is_finite() {
        return Err(ProcessingError::Projection(format!(
            "Non-finite Lambert coordinate ({}, {})",
            x_hm, y_hm
        )));
    }

    let (lon_ntf, lat_ntf) = lambert_inverse(x_hm * HECTOMETRE, y_hm * HECTOMETRE)?;

    let [gx, gy, gz] = geographic_to_cartesian(lon_ntf, lat_ntf, CLARKE_A, CLARKE_E * CLARKE_E);
    let shifted = [
        gx + NTF_TO_WGS84[0],
        gy + NTF_TO_WGS84[1],
        gz + NTF_TO_WGS84[2],
    ];
    let (lon, lat) = cartesian_to_geographic(shifted, WGS84_A, WGS84_E2)?;

    Ok((lon.to_degrees(), lat.to_degrees()))
}

/// Inverse Lambert conformal conic on the NTF ellipsoid, radians out
fn lambert_inverse(x: f64, y: f64) -> Result<(f64, f64)> {
    let dx = x - LAMBERT2_XS;
    let dy = y - LAMBERT2_YS;

    let r = (dx * dx + dy * dy).sqrt();
    if r == 0.0 {
        return Err(ProcessingError::Projection(
            "Coordinate at the cone apex".to_string(),
        ));
    }

    let gamma = (dx / -dy).atan();
    let lon = PARIS_MERIDIAN + gamma / LAMBERT2_N;
    let isometric = -(r / LAMBERT2_C).abs().ln() / LAMBERT2_N;
    let lat = latitude_from_isometric(isometric, CLARKE_E)?;

    Ok((lon, lat))
}

fn latitude_from_isometric(isometric: f64, e: f64) -> Result<f64> {
    let exp_l = isometric.exp();
    let mut lat = 2.0 * exp_l.atan() - FRAC_PI_2;

    for _ in 0..MAX_ITERATIONS {
        let e_sin = e * lat.sin();
        let next = 2.0 * (((1.0 + e_sin) / (1.0 - e_sin)).powf(e / 2.0) * exp_l).atan() - FRAC_PI_2;
        if (next - lat).abs() < ITERATION_EPSILON {
            return Ok(next);
        }
        lat = next;
    }

    Err(ProcessingError::Projection(format!(
        "Latitude iteration did not converge for isometric latitude {}",
        isometric
    )))
}

fn geographic_to_cartesian(lon: f64, lat: f64, a: f64, e2: f64) -> [f64; 3] {
    let n = a / (1.0 - e2 * lat.sin().powi(2)).sqrt();
    [
        n * lat.cos() * lon.cos(),
        n * lat.cos() * lon.sin(),
        n * (1.0 - e2) * lat.sin(),
    ]
}

fn cartesian_to_geographic([x, y, z]: [f64; 3], a: f64, e2: f64) -> Result<(f64, f64)> {
    let lon = y.atan2(x);
    let p = (x * x + y * y).sqrt();
    let norm = (x * x + y * y + z * z).sqrt();

    let mut lat = (z / (p * (1.0 - a * e2 / norm))).atan();
    for _ in 0..MAX_ITERATIONS {
        let next =
            ((z / p) / (1.0 - (a * e2 * lat.cos()) / (p * (1.0 - e2 * lat.sin().powi(2)).sqrt())))
                .atan();
        if (next - lat).abs() < ITERATION_EPSILON {
            return Ok((lon, next));
        }
        lat = next;
    }

    Err(ProcessingError::Projection(
        "Geocentric latitude iteration did not converge".to_string(),
    ))
}

#[cfg(test)]
fn isometric_latitude(lat: f64, e: f64) -> f64 {
    use std::f64::consts::FRAC_PI_4;

    let e_sin = e * lat.sin();
    (FRAC_PI_4 + lat / 2.0).tan().ln() - (e / 2.0) * ((1.0 + e_sin) / (1.0 - e_sin)).ln()
}
