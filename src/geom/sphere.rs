use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ParseError;

/// Arcseconds per degree.
pub const ARCSEC_PER_DEG: f64 = 3600.0;

/// Convert an angle in arcseconds to radians.
#[inline]
pub fn arcsec_to_rad(arcsec: f64) -> f64 {
    (arcsec / ARCSEC_PER_DEG).to_radians()
}

/// Convert an angle in radians to arcseconds.
#[inline]
pub fn rad_to_arcsec(rad: f64) -> f64 {
    rad.to_degrees() * ARCSEC_PER_DEG
}

/// A validated position on the celestial sphere, in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SkyPosition {
    ra_deg: f64,
    dec_deg: f64,
}

impl SkyPosition {
    /// Build a position, rejecting non-finite values, RA outside `[0, 360)`
    /// and Dec outside `[-90, 90]`.
    pub fn new(ra_deg: f64, dec_deg: f64) -> Result<Self, ParseError> {
        if !ra_deg.is_finite() {
            return Err(ParseError::NonFinite(ra_deg));
        }
        if !dec_deg.is_finite() {
            return Err(ParseError::NonFinite(dec_deg));
        }
        if !(0.0..360.0).contains(&ra_deg) {
            return Err(ParseError::OutOfRange {
                axis: "ra",
                value: ra_deg,
            });
        }
        if !(-90.0..=90.0).contains(&dec_deg) {
            return Err(ParseError::OutOfRange {
                axis: "dec",
                value: dec_deg,
            });
        }
        Ok(Self { ra_deg, dec_deg })
    }

    pub fn ra_deg(&self) -> f64 {
        self.ra_deg
    }

    pub fn dec_deg(&self) -> f64 {
        self.dec_deg
    }

    /// Unit vector `[x, y, z]` for this position.
    pub fn to_xyz(&self) -> [f64; 3] {
        radec_to_xyz(self.ra_deg.to_radians(), self.dec_deg.to_radians())
    }

    /// Great-circle separation to `other`, in arcseconds.
    pub fn separation_arcsec(&self, other: &SkyPosition) -> f64 {
        rad_to_arcsec(angular_distance(self.to_xyz(), other.to_xyz()))
    }
}

impl fmt::Display for SkyPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.7}, {:+.7})", self.ra_deg, self.dec_deg)
    }
}

/// Convert (RA, Dec) in radians to a unit vector `[x, y, z]`.
pub fn radec_to_xyz(ra: f64, dec: f64) -> [f64; 3] {
    let cos_dec = dec.cos();
    [cos_dec * ra.cos(), cos_dec * ra.sin(), dec.sin()]
}

/// Great-circle angular distance between two unit vectors, in radians.
///
/// Uses `atan2(|a x b|, a . b)`, which keeps full precision for the
/// sub-arcsecond separations where `acos` of the dot product degrades.
pub fn angular_distance(a: [f64; 3], b: [f64; 3]) -> f64 {
    let cx = a[1] * b[2] - a[2] * b[1];
    let cy = a[2] * b[0] - a[0] * b[2];
    let cz = a[0] * b[1] - a[1] * b[0];
    let cross = (cx * cx + cy * cy + cz * cz).sqrt();
    let dot = a[0] * b[0] + a[1] * b[1] + a[2] * b[2];
    cross.atan2(dot)
}

/// Squared chord length between two unit vectors separated by `theta` radians.
///
/// This is the squared L2 distance the KD-tree works in.
pub fn angle_to_chord_sq(theta: f64) -> f64 {
    let half = (theta.min(std::f64::consts::PI) / 2.0).sin();
    4.0 * half * half
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::{FRAC_PI_2, PI};

    const EPS: f64 = 1e-12;

    fn assert_close(a: f64, b: f64, tol: f64) {
        assert!(
            (a - b).abs() < tol,
            "expected {a} ~= {b} (diff = {})",
            (a - b).abs()
        );
    }

    fn assert_vec_close(a: [f64; 3], b: [f64; 3], tol: f64) {
        for i in 0..3 {
            assert_close(a[i], b[i], tol);
        }
    }

    #[test]
    fn rejects_invalid_positions() {
        assert!(SkyPosition::new(f64::NAN, 0.0).is_err());
        assert!(SkyPosition::new(10.0, f64::INFINITY).is_err());
        assert_eq!(
            SkyPosition::new(360.0, 0.0),
            Err(ParseError::OutOfRange {
                axis: "ra",
                value: 360.0
            })
        );
        assert!(SkyPosition::new(-0.5, 0.0).is_err());
        assert!(SkyPosition::new(0.0, 90.0001).is_err());
        assert!(SkyPosition::new(0.0, -90.0).is_ok());
        assert!(SkyPosition::new(359.999_999, 90.0).is_ok());
    }

    #[test]
    fn known_positions() {
        let p = |ra, dec| SkyPosition::new(ra, dec).unwrap().to_xyz();
        assert_vec_close(p(0.0, 0.0), [1.0, 0.0, 0.0], EPS);
        assert_vec_close(p(90.0, 0.0), [0.0, 1.0, 0.0], EPS);
        assert_vec_close(p(0.0, 90.0), [0.0, 0.0, 1.0], EPS);
        assert_vec_close(p(0.0, -90.0), [0.0, 0.0, -1.0], EPS);
    }

    #[test]
    fn angular_distance_known() {
        let a = radec_to_xyz(0.0, 0.0);
        let b = radec_to_xyz(FRAC_PI_2, 0.0);
        assert_close(angular_distance(a, b), FRAC_PI_2, EPS);
        assert_close(angular_distance(a, a), 0.0, EPS);

        let c = radec_to_xyz(PI, 0.0);
        assert_close(angular_distance(a, c), PI, EPS);

        let np = radec_to_xyz(0.0, FRAC_PI_2);
        let sp = radec_to_xyz(0.0, -FRAC_PI_2);
        assert_close(angular_distance(np, sp), PI, EPS);
    }

    #[test]
    fn separation_across_ra_wrap() {
        let a = SkyPosition::new(0.0001, 20.0).unwrap();
        let b = SkyPosition::new(359.9999, 20.0).unwrap();
        let sep = a.separation_arcsec(&b);
        // 0.0002 deg of RA at dec 20 is 0.72 * cos(20 deg) arcsec.
        assert_close(sep, 0.72 * 20.0_f64.to_radians().cos(), 1e-6);
    }

    #[test]
    fn separation_small_dec_offset() {
        let a = SkyPosition::new(10.0, 10.0).unwrap();
        let b = SkyPosition::new(10.0, 10.0001).unwrap();
        assert_close(a.separation_arcsec(&b), 0.36, 1e-7);
    }

    #[test]
    fn ra_degrees_shrink_toward_pole() {
        let a = SkyPosition::new(0.0, 89.0).unwrap();
        let b = SkyPosition::new(1.0, 89.0).unwrap();
        let sep = a.separation_arcsec(&b);
        assert!(sep < 0.02 * ARCSEC_PER_DEG, "sep = {sep}");
    }

    #[test]
    fn chord_matches_vector_distance() {
        let a = radec_to_xyz(0.3, 0.2);
        let b = radec_to_xyz(0.31, 0.17);
        let theta = angular_distance(a, b);
        let d_sq: f64 = (0..3).map(|i| (a[i] - b[i]).powi(2)).sum();
        assert_close(angle_to_chord_sq(theta), d_sq, 1e-15);
    }

    #[test]
    fn arcsec_conversions_roundtrip() {
        assert_close(rad_to_arcsec(arcsec_to_rad(45.0)), 45.0, 1e-9);
        assert_close(arcsec_to_rad(3600.0), 1.0_f64.to_radians(), EPS);
    }
}
