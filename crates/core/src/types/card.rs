//! Scratch card customization types.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Number of days a customer has to customize a card after it is issued.
pub const CUSTOMIZATION_WINDOW_DAYS: i64 = 30;

/// Compute the customization deadline for a card issued at `issued_at`.
#[must_use]
pub fn customization_deadline(issued_at: DateTime<Utc>) -> DateTime<Utc> {
    issued_at + Duration::days(CUSTOMIZATION_WINDOW_DAYS)
}

/// Styled text block shown on a card (the header or the body).
///
/// Every attribute is optional; the frontend falls back to its own defaults.
/// Field names are camelCase on the wire to match the frontend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_style: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_weight: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_alignment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_color: Option<String>,
}

/// Where a card is in its customization lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardState {
    /// Awaiting customization, deadline not yet passed.
    Open,
    /// Customized; the link has been used.
    Completed,
    /// Never customized and the deadline has passed.
    Expired,
}

impl CardState {
    /// Derive the state from the stored flags.
    ///
    /// A completed card stays completed after its deadline; only cards that
    /// were never customized expire.
    #[must_use]
    pub fn evaluate(complete: bool, last_date: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        if complete {
            Self::Completed
        } else if last_date < now {
            Self::Expired
        } else {
            Self::Open
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_deadline_is_thirty_days_out() {
        let now = Utc::now();
        assert_eq!(customization_deadline(now) - now, Duration::days(30));
    }

    #[test]
    fn test_state_completed_wins_over_deadline() {
        let now = Utc::now();
        let past = now - Duration::days(1);
        assert_eq!(CardState::evaluate(true, past, now), CardState::Completed);
    }

    #[test]
    fn test_state_expired_and_open() {
        let now = Utc::now();
        assert_eq!(
            CardState::evaluate(false, now - Duration::seconds(1), now),
            CardState::Expired
        );
        assert_eq!(
            CardState::evaluate(false, now + Duration::days(3), now),
            CardState::Open
        );
    }

    #[test]
    fn test_section_uses_camel_case() {
        let section = CardSection {
            text: Some("Happy birthday".to_owned()),
            font_size: Some("24px".to_owned()),
            text_alignment: Some("center".to_owned()),
            ..CardSection::default()
        };
        let json = serde_json::to_value(&section).unwrap();
        assert_eq!(json["fontSize"], "24px");
        assert_eq!(json["textAlignment"], "center");
        assert!(json.get("fontColor").is_none());
    }

    #[test]
    fn test_section_accepts_partial_payload() {
        let section: CardSection = serde_json::from_str(r##"{"fontColor":"#fff"}"##).unwrap();
        assert_eq!(section.font_color.as_deref(), Some("#fff"));
        assert!(section.text.is_none());
    }
}
