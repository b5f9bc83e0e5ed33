//! Coordinate validation and location equality.
//!
//! # Responsibility
//! - Reject coordinates that must never reach storage.
//! - Provide the single equality rule used by every backend for dedup.
//!
//! # Invariants
//! - Two pairs are the same location only when both axes differ by strictly
//!   less than `COORD_EPSILON`.
//! - Validation runs before any storage mutation.

use std::error::Error;
use std::fmt::{Display, Formatter};

/// Location equality threshold in degrees (about 1.1 cm at the equator).
pub const COORD_EPSILON: f64 = 0.000_000_1;

/// Maximum item name length, in characters.
pub const MAX_NAME_CHARS: usize = 255;

/// Validation failures for item names and coordinates.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    NilId,
    EmptyName,
    NameTooLong { chars: usize },
    NonFiniteCoordinate,
    LatitudeOutOfRange(f64),
    LongitudeOutOfRange(f64),
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NilId => write!(f, "id must not be the nil uuid"),
            Self::EmptyName => write!(f, "name cannot be empty or whitespace"),
            Self::NameTooLong { chars } => write!(
                f,
                "name too long ({chars} characters, max {MAX_NAME_CHARS})"
            ),
            Self::NonFiniteCoordinate => write!(f, "coordinates must be finite numbers"),
            Self::LatitudeOutOfRange(value) => {
                write!(f, "latitude {value} must be between -90 and 90")
            }
            Self::LongitudeOutOfRange(value) => {
                write!(f, "longitude {value} must be between -180 and 180")
            }
        }
    }
}

impl Error for ValidationError {}

/// Checks that both coordinates are finite and within WGS84 bounds.
pub fn validate_coordinates(latitude: f64, longitude: f64) -> Result<(), ValidationError> {
    if !latitude.is_finite() || !longitude.is_finite() {
        return Err(ValidationError::NonFiniteCoordinate);
    }
    if !(-90.0..=90.0).contains(&latitude) {
        return Err(ValidationError::LatitudeOutOfRange(latitude));
    }
    if !(-180.0..=180.0).contains(&longitude) {
        return Err(ValidationError::LongitudeOutOfRange(longitude));
    }
    Ok(())
}

/// Checks that a name is non-blank after trimming and at most 255 characters.
pub fn validate_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        return Err(ValidationError::EmptyName);
    }
    let chars = name.chars().count();
    if chars > MAX_NAME_CHARS {
        return Err(ValidationError::NameTooLong { chars });
    }
    Ok(())
}

/// Returns whether two coordinate pairs denote the same location.
pub fn coords_equal(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> bool {
    (lat1 - lat2).abs() < COORD_EPSILON && (lng1 - lng2).abs() < COORD_EPSILON
}

#[cfg(test)]
mod tests {
    use super::{coords_equal, validate_coordinates, validate_name, ValidationError};

    #[test]
    fn coords_equal_absorbs_sub_centimeter_jitter() {
        assert!(coords_equal(41.8781, -87.6298, 41.8781, -87.6298));
        assert!(coords_equal(41.8781, -87.6298, 41.878_100_05, -87.629_800_05));
    }

    #[test]
    fn coords_equal_keeps_real_movement() {
        assert!(!coords_equal(41.8781, -87.6298, 41.8782, -87.6298));
        assert!(!coords_equal(41.8781, -87.6298, 41.8781, -87.6297));
        assert!(!coords_equal(0.0, 0.0, 0.000_000_2, 0.0));
    }

    #[test]
    fn validate_coordinates_accepts_bounds() {
        validate_coordinates(90.0, 180.0).unwrap();
        validate_coordinates(-90.0, -180.0).unwrap();
        validate_coordinates(0.0, 0.0).unwrap();
    }

    #[test]
    fn validate_coordinates_rejects_nan_infinite_and_out_of_range() {
        assert_eq!(
            validate_coordinates(f64::NAN, 0.0),
            Err(ValidationError::NonFiniteCoordinate)
        );
        assert_eq!(
            validate_coordinates(0.0, f64::INFINITY),
            Err(ValidationError::NonFiniteCoordinate)
        );
        assert_eq!(
            validate_coordinates(90.5, 0.0),
            Err(ValidationError::LatitudeOutOfRange(90.5))
        );
        assert_eq!(
            validate_coordinates(0.0, -180.1),
            Err(ValidationError::LongitudeOutOfRange(-180.1))
        );
    }

    #[test]
    fn validate_name_checks_blank_and_length() {
        validate_name("harper").unwrap();
        assert_eq!(validate_name("   "), Err(ValidationError::EmptyName));
        assert_eq!(validate_name(""), Err(ValidationError::EmptyName));

        let long = "é".repeat(256);
        assert_eq!(
            validate_name(&long),
            Err(ValidationError::NameTooLong { chars: 256 })
        );
        validate_name(&"é".repeat(255)).unwrap();
    }
}
