use crate::error::{ProcessingError, Result};
use crate::utils::constants::EARTH_RADIUS_KM;
use serde::{Deserialize, Serialize};

/// Integer key for a coordinate pair rounded to a fixed number of decimals.
///
/// Both the registry and the joiner build keys through this type, so two
/// coordinates that differ only by representation noise compare equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CoordKey(i64, i64);

impl CoordKey {
    pub fn new(x: f64, y: f64, precision: u32) -> Self {
        let scale = 10f64.powi(precision as i32);
        CoordKey((x * scale).round() as i64, (y * scale).round() as i64)
    }
}

/// Degrees:minutes:seconds to decimal degrees; a leading `-` negates the whole angle
///
/// # Examples
/// ```
/// use precip_processor::utils::dms_to_decimal;
///
/// let decimal = dms_to_decimal("48:51:24").unwrap();
/// assert!((decimal - 48.856667).abs() < 0.000001);
/// ```
pub fn dms_to_decimal(dms: &str) -> Result<f64> {
    let fields: Vec<f64> = dms
        .split(':')
        .map(|field| field.trim().parse::<f64>())
        .collect::<std::result::Result<_, _>>()
        .map_err(|_| ProcessingError::InvalidCoordinate(format!("Unreadable DMS angle '{}'", dms)))?;

    let [degrees, minutes, seconds] = fields[..] else {
        return Err(ProcessingError::InvalidCoordinate(format!(
            "DMS angle '{}' needs three fields (DD:MM:SS)",
            dms
        )));
    };

    let sexagesimal = 0.0..60.0;
    if !sexagesimal.contains(&minutes) || !sexagesimal.contains(&seconds) {
        return Err(ProcessingError::InvalidCoordinate(format!(
            "Minutes and seconds must be in [0, 60): '{}'",
            dms
        )));
    }

    let magnitude = degrees.abs() + minutes / 60.0 + seconds / 3600.0;
    Ok(if dms.trim_start().starts_with('-') {
        -magnitude
    } else {
        magnitude
    })
}

/// Parse a coordinate written in decimal degrees (point or comma separator) or DMS
pub fn parse_coordinate(raw: &str) -> Result<f64> {
    let trimmed = raw.trim();

    if trimmed.contains(':') {
        return dms_to_decimal(trimmed);
    }

    trimmed.replace(',', ".").parse::<f64>().map_err(|_| {
        ProcessingError::InvalidCoordinate(format!("Unreadable coordinate '{}'", raw))
    })
}

/// Check that a longitude/latitude pair lies on the globe
pub fn validate_geographic(lon: f64, lat: f64) -> Result<()> {
    if !(-90.0..=90.0).contains(&lat) {
        return Err(ProcessingError::InvalidCoordinate(format!(
            "Latitude {} is outside [-90, 90]",
            lat
        )));
    }

    if !(-180.0..=180.0).contains(&lon) {
        return Err(ProcessingError::InvalidCoordinate(format!(
            "Longitude {} is outside [-180, 180]",
            lon
        )));
    }

    Ok(())
}

/// Great-circle distance in kilometres between two latitude/longitude points
pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let (phi1, phi2) = (lat1.to_radians(), lat2.to_radians());
    let half_dphi = (phi2 - phi1) / 2.0;
    let half_dlambda = (lon2 - lon1).to_radians() / 2.0;

    let h = half_dphi.sin().powi(2) + phi1.cos() * phi2.cos() * half_dlambda.sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().min(1.0).asin()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coord_key_absorbs_representation_noise() {
        let a = CoordKey::new(2.352_000_000_1, 48.856_999_999_9, 3);
        let b = CoordKey::new(2.352, 48.857, 3);
        assert_eq!(a, b);

        let c = CoordKey::new(2.353, 48.857, 3);
        assert_ne!(a, c);
    }

    #[test]
    fn test_coord_key_precision_zero_for_grid_units() {
        assert_eq!(CoordKey::new(6000.0, 24000.0, 0), CoordKey::new(6000.2, 23999.8, 0));
    }

    #[test]
    fn test_dms_angles() {
        assert!((dms_to_decimal("43:36:00").unwrap() - 43.6).abs() < 1e-9);
        assert!((dms_to_decimal("-0:07:39").unwrap() - -0.1275).abs() < 0.0001);
        assert!(dms_to_decimal("43:36").is_err());
        assert!(dms_to_decimal("50:70:15").is_err());
    }

    #[test]
    fn test_parse_header_coordinates() {
        assert!((parse_coordinate("45,7833").unwrap() - 45.7833).abs() < 1e-9);
        assert!((parse_coordinate(" -0.1278 ").unwrap() - -0.1278).abs() < 1e-9);
        assert!((parse_coordinate("1:26:24").unwrap() - 1.44).abs() < 1e-9);
        assert!(parse_coordinate("north").is_err());
    }

    #[test]
    fn test_validate_geographic() {
        assert!(validate_geographic(2.35, 48.85).is_ok());
        assert!(validate_geographic(55.45, -20.88).is_ok()); // La Réunion
        assert!(validate_geographic(0.0, 91.0).is_err());
        assert!(validate_geographic(181.0, 0.0).is_err());
    }

    #[test]
    fn test_paris_lyon_distance() {
        // Paris to Lyon
        let distance = haversine_distance(48.8566, 2.3522, 45.7640, 4.8357);
        assert!((distance - 392.0).abs() < 10.0);
    }
}
