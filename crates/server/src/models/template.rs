//! Card template domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use scratchcard_core::TemplateId;

/// A background/sticker image pair and the Etsy listings it is used for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    pub id: TemplateId,
    /// Public URL of the card background image.
    pub background_url: String,
    /// Public URL of the scratch-off sticker image.
    pub sticker_url: String,
    /// Etsy listing IDs (as strings) assigned to this template. No duplicates.
    #[serde(rename = "productId")]
    pub product_ids: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Normalize a set of listing IDs: trimmed, non-empty, first occurrence wins.
#[must_use]
pub fn normalize_product_ids<I, S>(ids: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = Vec::new();
    for id in ids {
        let id = id.as_ref().trim();
        if !id.is_empty() && !out.iter().any(|existing| existing == id) {
            out.push(id.to_string());
        }
    }
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_product_ids_dedupes_and_trims() {
        let ids = normalize_product_ids(["123", " 456 ", "123", "", "  "]);
        assert_eq!(ids, vec!["123".to_string(), "456".to_string()]);
    }

    #[test]
    fn test_template_wire_names() {
        let template = Template {
            id: TemplateId::generate(),
            background_url: "https://cdn.example.com/bg.png".to_string(),
            sticker_url: "https://cdn.example.com/st.png".to_string(),
            product_ids: vec!["1001".to_string()],
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let json = serde_json::to_value(&template).unwrap();
        assert_eq!(json["backgroundUrl"], "https://cdn.example.com/bg.png");
        assert_eq!(json["stickerUrl"], "https://cdn.example.com/st.png");
        assert_eq!(json["productId"][0], "1001");
        assert!(json.get("productIds").is_none());
    }
}
