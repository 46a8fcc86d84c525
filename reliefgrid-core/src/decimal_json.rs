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

//! JSON number helpers for `Decimal`
//!
//! Clients send and expect plain JSON numbers. Whole decimals are written as
//! integers, everything else as floats. Incoming floats are converted through
//! their shortest round-trip text, so `41.015` becomes exactly `41.015`.
//!
//! Use with `#[serde(with = "reliefgrid_core::decimal_json")]`.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::de::{self, Visitor};
use serde::{Deserializer, Serializer};
use std::fmt;
use std::str::FromStr;

pub fn serialize<S>(value: &Decimal, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    if value.fract().is_zero() {
        if let Some(whole) = value.to_i64() {
            return serializer.serialize_i64(whole);
        }
    }
    match value.to_f64() {
        Some(float) => serializer.serialize_f64(float),
        None => serializer.serialize_str(&value.to_string()),
    }
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
where
    D: Deserializer<'de>,
{
    deserializer.deserialize_any(DecimalVisitor)
}

/// Parse a decimal from client text (plain or scientific notation)
pub fn parse(text: &str) -> Option<Decimal> {
    let text = text.trim();
    Decimal::from_str(text)
        .or_else(|_| Decimal::from_scientific(text))
        .ok()
}

struct DecimalVisitor;

impl<'de> Visitor<'de> for DecimalVisitor {
    type Value = Decimal;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a number or a numeric string")
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Decimal, E> {
        Ok(Decimal::from(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Decimal, E> {
        Ok(Decimal::from(v))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Decimal, E> {
        if !v.is_finite() {
            return Err(E::custom("non-finite number"));
        }
        // f64 Display prints the shortest text that round-trips, never exponents
        Decimal::from_str(&v.to_string()).map_err(E::custom)
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Decimal, E> {
        parse(v).ok_or_else(|| E::custom(format!("invalid number '{}'", v)))
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize)]
    struct Wrapper {
        #[serde(with = "crate::decimal_json")]
        value: Decimal,
    }

    fn to_json(value: Decimal) -> String {
        serde_json::to_string(&Wrapper { value }).unwrap()
    }

    fn from_json(json: &str) -> Decimal {
        serde_json::from_str::<Wrapper>(json).unwrap().value
    }

    #[test]
    fn test_whole_values_serialize_as_integers() {
        assert_eq!(to_json(dec!(29.0)), r#"{"value":29}"#);
        assert_eq!(to_json(dec!(-180)), r#"{"value":-180}"#);
    }

    #[test]
    fn test_fractional_values_serialize_as_floats() {
        assert_eq!(to_json(dec!(41.015)), r#"{"value":41.015}"#);
    }

    #[test]
    fn test_deserialize_is_exact() {
        assert_eq!(from_json(r#"{"value":41.015}"#), dec!(41.015));
        assert_eq!(from_json(r#"{"value":29}"#), dec!(29));
        assert_eq!(from_json(r#"{"value":"36.2"}"#), dec!(36.2));
        assert!(serde_json::from_str::<Wrapper>(r#"{"value":"north"}"#).is_err());
    }
}
