//! Parsing of catalog coordinate text into decimal degrees.
//!
//! Transient catalogs publish RA as hours-minutes-seconds and Dec as
//! degrees-arcminutes-arcseconds ("12:30:49.42", "+12:23:28.0"); X-ray
//! catalogs usually ship decimal degrees. Both end up as a [`SkyPosition`].

use serde::{Deserialize, Serialize};

use super::sphere::SkyPosition;
use crate::error::ParseError;

/// How a pair of coordinate fields is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoordinateFormat {
    /// Decimal degrees for both RA and Dec.
    #[default]
    Degrees,
    /// RA in hours, Dec in degrees, each as `a:b:c` or `a b c`.
    Sexagesimal,
}

/// Split off a leading sign and break the remainder into numeric fields.
///
/// Accepts `:`, whitespace and the `h m s d ° ' "` unit markers as
/// separators.
fn split_sexagesimal(input: &str) -> Result<(f64, Vec<f64>), ParseError> {
    let bad = |reason| ParseError::Sexagesimal {
        input: input.to_string(),
        reason,
    };

    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(ParseError::Missing);
    }

    let (sign, body) = match trimmed.as_bytes()[0] {
        b'-' => (-1.0, &trimmed[1..]),
        b'+' => (1.0, &trimmed[1..]),
        _ => (1.0, trimmed),
    };

    let fields: Vec<&str> = body
        .split(|c: char| c == ':' || c.is_whitespace() || "hmsd°'\"".contains(c))
        .filter(|f| !f.is_empty())
        .collect();

    if fields.is_empty() || fields.len() > 3 {
        return Err(bad("expected one to three fields"));
    }

    let mut values = Vec::with_capacity(fields.len());
    for field in &fields {
        if field.starts_with(['+', '-']) {
            return Err(bad("sign inside field"));
        }
        let v: f64 = field.parse().map_err(|_| bad("non-numeric field"))?;
        if !v.is_finite() {
            return Err(bad("non-finite field"));
        }
        values.push(v);
    }

    // Only the last field may carry a fractional part; minutes and seconds
    // must stay below 60.
    for (i, &v) in values.iter().enumerate() {
        if i + 1 < values.len() && v.fract() != 0.0 {
            return Err(bad("fractional leading field"));
        }
        if i > 0 && !(0.0..60.0).contains(&v) {
            return Err(bad("minutes or seconds outside [0, 60)"));
        }
    }

    Ok((sign, values))
}

fn combine(values: &[f64]) -> f64 {
    values
        .iter()
        .zip([1.0, 60.0, 3600.0])
        .map(|(v, scale)| v / scale)
        .sum()
}

/// Parse a right ascension written in hours (`hh:mm:ss.s`) to degrees.
pub fn parse_ra_hours(input: &str) -> Result<f64, ParseError> {
    let (sign, values) = split_sexagesimal(input)?;
    if sign < 0.0 {
        return Err(ParseError::Sexagesimal {
            input: input.to_string(),
            reason: "negative right ascension",
        });
    }
    let hours = combine(&values);
    if !(0.0..24.0).contains(&hours) {
        return Err(ParseError::OutOfRange {
            axis: "ra",
            value: hours * 15.0,
        });
    }
    Ok(hours * 15.0)
}

/// Parse a declination written in degrees (`±dd:mm:ss.s`) to degrees.
///
/// The sign applies to the whole value, so `-00:30:00` is `-0.5`.
pub fn parse_dec_degrees(input: &str) -> Result<f64, ParseError> {
    let (sign, values) = split_sexagesimal(input)?;
    let degrees = sign * combine(&values);
    if !(-90.0..=90.0).contains(&degrees) {
        return Err(ParseError::OutOfRange {
            axis: "dec",
            value: degrees,
        });
    }
    Ok(degrees)
}

/// Parse a decimal-degree field.
pub fn parse_degrees(input: &str) -> Result<f64, ParseError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(ParseError::Missing);
    }
    let v: f64 = trimmed
        .parse()
        .map_err(|_| ParseError::NotANumber(trimmed.to_string()))?;
    if !v.is_finite() {
        return Err(ParseError::NonFinite(v));
    }
    Ok(v)
}

/// Parse an RA/Dec text pair into a validated [`SkyPosition`].
pub fn parse_coordinate(
    ra: &str,
    dec: &str,
    format: CoordinateFormat,
) -> Result<SkyPosition, ParseError> {
    let (ra_deg, dec_deg) = match format {
        CoordinateFormat::Degrees => (parse_degrees(ra)?, parse_degrees(dec)?),
        CoordinateFormat::Sexagesimal => (parse_ra_hours(ra)?, parse_dec_degrees(dec)?),
    };
    SkyPosition::new(ra_deg, dec_deg)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: f64, b: f64, tol: f64) {
        assert!(
            (a - b).abs() < tol,
            "expected {a} ~= {b} (diff = {})",
            (a - b).abs()
        );
    }

    #[test]
    fn ra_colon_and_space_forms() {
        assert_close(parse_ra_hours("12:30:49.42").unwrap(), 187.705_916_666, 1e-8);
        assert_close(parse_ra_hours("12 30 49.42").unwrap(), 187.705_916_666, 1e-8);
        assert_close(parse_ra_hours("12h30m49.42s").unwrap(), 187.705_916_666, 1e-8);
        assert_close(parse_ra_hours("06").unwrap(), 90.0, 1e-12);
        assert_close(parse_ra_hours("0:0:0").unwrap(), 0.0, 1e-12);
    }

    #[test]
    fn dec_sign_covers_whole_value() {
        assert_close(parse_dec_degrees("+12:23:28.0").unwrap(), 12.391_111_1, 1e-6);
        assert_close(parse_dec_degrees("-00:30:00").unwrap(), -0.5, 1e-12);
        assert_close(parse_dec_degrees("-45 15 00").unwrap(), -45.25, 1e-12);
        assert_close(parse_dec_degrees("90:00:00").unwrap(), 90.0, 1e-12);
    }

    #[test]
    fn rejects_malformed_sexagesimal() {
        assert_eq!(parse_ra_hours(""), Err(ParseError::Missing));
        assert!(parse_ra_hours("24:00:00").is_err());
        assert!(parse_ra_hours("-01:00:00").is_err());
        assert!(parse_ra_hours("12:61:00").is_err());
        assert!(parse_ra_hours("12:30:60").is_err());
        assert!(parse_ra_hours("12.5:30:00").is_err());
        assert!(parse_ra_hours("ab:cd:ef").is_err());
        assert!(parse_ra_hours("1:2:3:4").is_err());
        assert!(parse_dec_degrees("+90:00:01").is_err());
        assert!(parse_dec_degrees("12:-3:00").is_err());
    }

    #[test]
    fn degrees_field() {
        assert_close(parse_degrees(" 187.25 ").unwrap(), 187.25, 1e-12);
        assert_eq!(parse_degrees("  "), Err(ParseError::Missing));
        assert!(matches!(parse_degrees("abc"), Err(ParseError::NotANumber(_))));
        assert!(matches!(parse_degrees("nan"), Err(ParseError::NonFinite(_))));
    }

    #[test]
    fn coordinate_pair_validates_range() {
        let p = parse_coordinate("12:00:00", "-30:00:00", CoordinateFormat::Sexagesimal).unwrap();
        assert_close(p.ra_deg(), 180.0, 1e-12);
        assert_close(p.dec_deg(), -30.0, 1e-12);

        assert!(parse_coordinate("400", "0", CoordinateFormat::Degrees).is_err());
        assert!(parse_coordinate("10", "", CoordinateFormat::Degrees).is_err());
    }
}
