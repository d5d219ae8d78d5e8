//! Opaque pagination cursors
//!
//! High-fan-out queries (followers of a popular author, a user's feed) page
//! through results with a token the caller treats as opaque. The token is the
//! JSON of the last evaluated key, hex encoded.

use crate::error::StoreError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Opaque continuation token for paged queries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageCursor(String);

impl PageCursor {
    /// Encode a last-evaluated key into a token
    ///
    /// # Errors
    /// `StoreError::Cursor` when the key fails to serialize.
    pub fn encode<T: Serialize>(last_key: &T) -> Result<Self, StoreError> {
        let json = serde_json::to_vec(last_key).map_err(|e| StoreError::Cursor(e.to_string()))?;
        Ok(Self(hex::encode(json)))
    }

    /// Decode the token back into a last-evaluated key
    ///
    /// # Errors
    /// `StoreError::Cursor` for tokens that are not valid hex-encoded JSON.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, StoreError> {
        let json = hex::decode(&self.0).map_err(|e| StoreError::Cursor(e.to_string()))?;
        serde_json::from_slice(&json).map_err(|e| StoreError::Cursor(e.to_string()))
    }

    /// Token string form
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn cursor_roundtrip() {
        let key = ("user-1".to_string(), 42_i64);
        let cursor = PageCursor::encode(&key).unwrap();
        let decoded: (String, i64) = cursor.decode().unwrap();
        assert_eq!(decoded, key);
    }

    #[test]
    fn cursor_rejects_tampered_token() {
        let cursor = PageCursor("zz-not-hex".to_string());
        let result: Result<(String, i64), _> = cursor.decode();
        assert!(matches!(result, Err(StoreError::Cursor(_))));
    }
}
