//! Request extractors whose rejections use the JSON error envelope.

use axum::extract::{FromRequest, rejection::JsonRejection};
use serde::{Deserialize, Deserializer};

use crate::error::AppError;

/// `axum::Json` with rejections mapped to `AppError::BadRequest`.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

/// A listing ID sent either as a JSON string or a number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingRef(pub String);

impl ListingRef {
    /// Numeric form of the listing ID, if it has one.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        self.0.parse().ok()
    }
}

impl<'de> Deserialize<'de> for ListingRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(i64),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Text(s) => Self(s.trim().to_string()),
            Raw::Number(n) => Self(n.to_string()),
        })
    }
}

/// Deserialize an optional field, treating `null` and `""` as absent.
///
/// # Errors
///
/// Returns an error if the value is neither a string nor null.
pub fn blank_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct Body {
        listing: Option<ListingRef>,
        #[serde(default, deserialize_with = "blank_as_none")]
        name: Option<String>,
    }

    #[test]
    fn test_listing_ref_accepts_string_and_number() {
        let body: Body = serde_json::from_str(r#"{"listing": 123}"#).unwrap();
        assert_eq!(body.listing.unwrap().as_i64(), Some(123));

        let body: Body = serde_json::from_str(r#"{"listing": " 456 "}"#).unwrap();
        assert_eq!(body.listing, Some(ListingRef("456".to_string())));
    }

    #[test]
    fn test_blank_as_none() {
        let body: Body = serde_json::from_str(r#"{"listing": null, "name": "  "}"#).unwrap();
        assert!(body.listing.is_none());
        assert!(body.name.is_none());

        let body: Body = serde_json::from_str(r#"{"name": "x"}"#).unwrap();
        assert_eq!(body.name.as_deref(), Some("x"));
    }
}
