// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Geohash encoding
//!
//! Encodes a coordinate by recursively bisecting the longitude and latitude
//! intervals, alternating axes and starting with longitude. Each bisection
//! yields one bit; five bits form one base-32 symbol.
//!
//! ```text
//! bit:    0    1    2    3    4  | 5    6 ...
//! axis:  lng  lat  lng  lat  lng | lat  lng ...
//!        └──────── symbol 0 ─────┘
//! ```
//!
//! A value equal to the midpoint always goes to the lower half. Because the
//! bit sequence for precision `p` is the first `5p` bits of the sequence for
//! any longer precision, shorter hashes are always prefixes of longer ones.
//! Proximity search depends on that.

use crate::error::{Result, ValidationError};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Geohash symbol alphabet (no `a`, `i`, `l`, `o`)
pub const BASE32: &[u8; 32] = b"0123456789bcdefghjkmnpqrstuvwxyz";

/// Longest supported hash. Twelve symbols is 60 bits, finer than f64 input noise.
pub const MAX_PRECISION: usize = 12;

/// Precision used for the point collection's sort keys
pub const POINT_PRECISION: usize = 6;

const BITS_PER_SYMBOL: usize = 5;

/// An encoded geohash
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Geohash(String);

impl Geohash {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Number of symbols
    pub fn precision(&self) -> usize {
        self.0.len()
    }

    /// First `len` symbols (the whole hash when `len` exceeds the precision)
    pub fn prefix(&self, len: usize) -> &str {
        // ASCII only, so byte slicing is safe
        &self.0[..len.min(self.0.len())]
    }

    /// True when `self` names a cell containing `other`'s cell
    pub fn contains(&self, other: &Geohash) -> bool {
        other.0.starts_with(&self.0)
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Geohash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Geohash {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Encode a coordinate at the given precision.
pub fn encode(latitude: f64, longitude: f64, precision: usize) -> Result<Geohash> {
    validate_precision(precision)?;
    if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
        return Err(ValidationError::LatitudeOutOfRange(latitude.to_string()));
    }
    if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
        return Err(ValidationError::LongitudeOutOfRange(longitude.to_string()));
    }

    Ok(bisect(precision, |axis, mid| match axis {
        Axis::Latitude => latitude > mid,
        Axis::Longitude => longitude > mid,
    }))
}

/// Encode exact decimal coordinates.
///
/// Each midpoint comparison is made against the decimal value itself, so a
/// coordinate a hair above a cell boundary lands in the upper cell even when
/// its nearest `f64` sits exactly on the boundary.
pub fn encode_decimal(latitude: Decimal, longitude: Decimal, precision: usize) -> Result<Geohash> {
    validate_precision(precision)?;
    if latitude < Decimal::from(-90) || latitude > Decimal::from(90) {
        return Err(ValidationError::LatitudeOutOfRange(latitude.to_string()));
    }
    if longitude < Decimal::from(-180) || longitude > Decimal::from(180) {
        return Err(ValidationError::LongitudeOutOfRange(longitude.to_string()));
    }

    let lat = latitude
        .to_f64()
        .ok_or_else(|| ValidationError::LatitudeOutOfRange(latitude.to_string()))?;
    let lng = longitude
        .to_f64()
        .ok_or_else(|| ValidationError::LongitudeOutOfRange(longitude.to_string()))?;

    Ok(bisect(precision, |axis, mid| match axis {
        Axis::Latitude => decimal_above(latitude, lat, mid),
        Axis::Longitude => decimal_above(longitude, lng, mid),
    }))
}

#[derive(Debug, Clone, Copy)]
enum Axis {
    Latitude,
    Longitude,
}

/// Interleave bisection bits into a hash. `above(axis, mid)` reports
/// whether the coordinate on `axis` lies strictly above `mid`.
fn bisect<F>(precision: usize, mut above: F) -> Geohash
where
    F: FnMut(Axis, f64) -> bool,
{
    let mut lat_interval = (-90.0_f64, 90.0_f64);
    let mut lng_interval = (-180.0_f64, 180.0_f64);
    let mut hash = String::with_capacity(precision);
    let mut even = true;
    let mut bit = 0;
    let mut symbol = 0usize;

    while hash.len() < precision {
        let (interval, axis) = if even {
            (&mut lng_interval, Axis::Longitude)
        } else {
            (&mut lat_interval, Axis::Latitude)
        };

        let mid = (interval.0 + interval.1) / 2.0;
        if above(axis, mid) {
            symbol |= 1 << (BITS_PER_SYMBOL - 1 - bit);
            interval.0 = mid;
        } else {
            interval.1 = mid;
        }

        even = !even;
        if bit < BITS_PER_SYMBOL - 1 {
            bit += 1;
        } else {
            hash.push(BASE32[symbol] as char);
            bit = 0;
            symbol = 0;
        }
    }

    Geohash(hash)
}

/// Midpoints are multiples of 2^-30 at every supported precision.
const MID_SHIFT: u32 = 30;

/// Exact `value > mid` for a decimal whose nearest float is `approx`.
///
/// With `value = m / 10^s` and `mid = p / 2^30` the test is
/// `m * 2^30 > p * 10^s`. That product only overflows when `mid` is far
/// from `value`, where the float comparison already gives the right answer.
fn decimal_above(value: Decimal, approx: f64, mid: f64) -> bool {
    // exact: mid is dyadic with at most 38 significant bits
    let scaled_mid = (mid * f64::from(1u32 << MID_SHIFT)) as i128;
    let lhs = value.mantissa().checked_mul(1i128 << MID_SHIFT);
    let rhs = 10i128
        .checked_pow(value.scale())
        .and_then(|pow| scaled_mid.checked_mul(pow));

    match (lhs, rhs) {
        (Some(lhs), Some(rhs)) => lhs > rhs,
        _ => approx > mid,
    }
}

/// Bounding box of a geohash cell
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellBounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl CellBounds {
    /// Inclusive containment check
    pub fn contains(&self, latitude: f64, longitude: f64) -> bool {
        (self.min_lat..=self.max_lat).contains(&latitude)
            && (self.min_lng..=self.max_lng).contains(&longitude)
    }

    pub fn center(&self) -> (f64, f64) {
        (
            (self.min_lat + self.max_lat) / 2.0,
            (self.min_lng + self.max_lng) / 2.0,
        )
    }
}

/// Decode a hash into the bounds of the cell it names.
pub fn decode_bounds(hash: &str) -> Result<CellBounds> {
    validate_precision(hash.len())?;

    let mut lat_interval = (-90.0_f64, 90.0_f64);
    let mut lng_interval = (-180.0_f64, 180.0_f64);
    let mut even = true;

    for c in hash.bytes() {
        let symbol = BASE32
            .iter()
            .position(|&b| b == c)
            .ok_or_else(|| {
                ValidationError::invalid("geohash", format!("'{}' is not a geohash symbol", c as char))
            })?;

        for bit in (0..BITS_PER_SYMBOL).rev() {
            let interval = if even {
                &mut lng_interval
            } else {
                &mut lat_interval
            };
            let mid = (interval.0 + interval.1) / 2.0;
            if symbol & (1 << bit) != 0 {
                interval.0 = mid;
            } else {
                interval.1 = mid;
            }
            even = !even;
        }
    }

    Ok(CellBounds {
        min_lat: lat_interval.0,
        max_lat: lat_interval.1,
        min_lng: lng_interval.0,
        max_lng: lng_interval.1,
    })
}

pub fn validate_precision(precision: usize) -> Result<()> {
    if precision == 0 || precision > MAX_PRECISION {
        return Err(ValidationError::InvalidPrecision {
            precision,
            max: MAX_PRECISION,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_known_hashes() {
        assert_eq!(encode(41.015, 29.0, 6).unwrap().as_str(), "sxk97f");
        assert_eq!(encode(41.015, 29.0, 12).unwrap().as_str(), "sxk97ft1sypm");
        assert_eq!(encode(57.64911, 10.40744, 11).unwrap().as_str(), "u4pruydqqvj");
        assert_eq!(encode(-33.8688, 151.2093, 6).unwrap().as_str(), "r3gx2f");
    }

    #[test]
    fn test_midpoint_goes_low() {
        // (0, 0) sits on both first midpoints: every bit is 0 for the
        // first two, then the upper half of each lower interval.
        assert_eq!(encode(0.0, 0.0, 6).unwrap().as_str(), "7zzzzz");
        assert_eq!(encode(0.001, 0.001, 6).unwrap().as_str(), "s00000");
        assert_eq!(encode(-90.0, -180.0, 6).unwrap().as_str(), "000000");
        assert_eq!(encode(90.0, 180.0, 6).unwrap().as_str(), "zzzzzz");
    }

    #[test]
    fn test_prefix_monotonic() {
        let full = encode(41.015, 29.0, MAX_PRECISION).unwrap();
        for p in 1..=MAX_PRECISION {
            let shorter = encode(41.015, 29.0, p).unwrap();
            assert_eq!(shorter.as_str(), full.prefix(p));
            assert!(shorter.contains(&full));
        }
    }

    #[test]
    fn test_decimal_matches_float() {
        let from_decimal = encode_decimal(dec!(41.015), dec!(29.0), 6).unwrap();
        assert_eq!(from_decimal, encode(41.015, 29.0, 6).unwrap());
    }

    #[test]
    fn test_decimal_just_above_boundary_goes_high() {
        // nearest f64 of this longitude is exactly 90.0, a first-symbol boundary
        let lng: Decimal = "90.000000000000000001".parse().unwrap();
        let hash = encode_decimal(Decimal::ZERO, lng, 6).unwrap();
        assert_ne!(hash, encode(0.0, 90.0, 6).unwrap());

        let cell = decode_bounds(hash.as_str()).unwrap();
        assert_eq!(cell.min_lng, 90.0);
        assert!(cell.max_lng > 90.0);

        let below: Decimal = "89.999999999999999999".parse().unwrap();
        let cell = decode_bounds(encode_decimal(Decimal::ZERO, below, 6).unwrap().as_str()).unwrap();
        assert_eq!(cell.max_lng, 90.0);

        // the exact boundary still goes low
        assert_eq!(
            encode_decimal(Decimal::ZERO, dec!(90), 12).unwrap(),
            encode(0.0, 90.0, 12).unwrap()
        );
    }

    #[test]
    fn test_decimal_deep_precision_boundary() {
        // 360 / 2^30 is compared against on the last longitude bit at precision 12
        let step = 360.0 / f64::from(1u32 << 30);
        let lng = dec!(0.000000335276126861572265625) + Decimal::new(1, 28);
        let hash = encode_decimal(Decimal::ZERO, lng, MAX_PRECISION).unwrap();
        let cell = decode_bounds(hash.as_str()).unwrap();
        assert_eq!(cell.min_lng, step);
        assert_ne!(hash, encode(0.0, step, MAX_PRECISION).unwrap());
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(matches!(
            encode(0.0, 0.0, 0),
            Err(ValidationError::InvalidPrecision { precision: 0, .. })
        ));
        assert!(matches!(
            encode(0.0, 0.0, 13),
            Err(ValidationError::InvalidPrecision { .. })
        ));
        assert!(matches!(
            encode(90.5, 0.0, 6),
            Err(ValidationError::LatitudeOutOfRange(_))
        ));
        assert!(matches!(
            encode(0.0, f64::NAN, 6),
            Err(ValidationError::LongitudeOutOfRange(_))
        ));
        assert!(matches!(
            encode_decimal(dec!(0), dec!(-180.01), 6),
            Err(ValidationError::LongitudeOutOfRange(_))
        ));
    }

    #[test]
    fn test_decode_bounds_contains_point() {
        let hash = encode(41.015, 29.0, 6).unwrap();
        let bounds = decode_bounds(hash.as_str()).unwrap();
        assert!(bounds.contains(41.015, 29.0));
        assert!(bounds.max_lat - bounds.min_lat < 0.01);

        assert!(decode_bounds("sxa").is_err());
    }
}
