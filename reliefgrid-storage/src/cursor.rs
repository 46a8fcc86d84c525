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

//! Opaque pagination cursor
//!
//! Callers see a URL-safe string. Inside it is the last key returned by the
//! previous page; the next page starts strictly after that key.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use reliefgrid_core::{ItemKey, ValidationError};
use serde::{Deserialize, Serialize};
use std::fmt;

const CURSOR_VERSION: u8 = 1;

#[derive(Serialize, Deserialize)]
struct CursorBody {
    v: u8,
    pk: String,
    sk: String,
}

/// Position in a partition scan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cursor(String);

impl Cursor {
    /// Cursor positioned after `key`
    pub(crate) fn after(key: &ItemKey) -> Self {
        let body = CursorBody {
            v: CURSOR_VERSION,
            pk: key.pk.clone(),
            sk: key.sk.clone(),
        };
        // serializing two strings and a byte cannot fail
        let json = serde_json::to_vec(&body).unwrap_or_default();
        Cursor(URL_SAFE_NO_PAD.encode(json))
    }

    /// Accept a token previously handed out by a scan
    pub fn parse(token: &str) -> Result<Self, ValidationError> {
        let cursor = Cursor(token.trim().to_string());
        cursor.position()?;
        Ok(cursor)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Last key seen, checked against the partition being scanned
    pub(crate) fn position_in(&self, partition: &str) -> Result<ItemKey, ValidationError> {
        let key = self.position()?;
        if key.pk != partition {
            return Err(ValidationError::InvalidCursor(format!(
                "cursor belongs to partition '{}', not '{}'",
                key.pk, partition
            )));
        }
        Ok(key)
    }

    fn position(&self) -> Result<ItemKey, ValidationError> {
        let bytes = URL_SAFE_NO_PAD
            .decode(&self.0)
            .map_err(|e| ValidationError::InvalidCursor(e.to_string()))?;
        let body: CursorBody = serde_json::from_slice(&bytes)
            .map_err(|e| ValidationError::InvalidCursor(e.to_string()))?;
        if body.v != CURSOR_VERSION {
            return Err(ValidationError::InvalidCursor(format!(
                "unsupported cursor version {}",
                body.v
            )));
        }
        Ok(ItemKey::new(body.pk, body.sk))
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_is_opaque_and_parseable() {
        let key = ItemKey::new("POINT", "sxk97f#e1");
        let cursor = Cursor::after(&key);
        assert!(!cursor.as_str().contains("sxk97f"));

        let parsed = Cursor::parse(cursor.as_str()).unwrap();
        assert_eq!(parsed.position_in("POINT").unwrap(), key);
    }

    #[test]
    fn test_rejects_garbage_and_foreign_partition() {
        assert!(Cursor::parse("not a cursor!").is_err());
        assert!(Cursor::parse("e30").is_err()); // "{}"

        let cursor = Cursor::after(&ItemKey::new("OTHER", "x"));
        assert!(matches!(
            cursor.position_in("POINT"),
            Err(ValidationError::InvalidCursor(_))
        ));
    }
}
