//! The notification event record.
//!
//! Every message on the account stream is a single JSON object:
//!
//! ```text
//! { "type": "sms_received", "title": "SMS", "message": "Code 482913",
//!   "data": {...}, "playSound": false, "timestamp": "2024-01-01T00:00:00Z" }
//! ```
//!
//! `type` is decoded into the closed [`NotificationKind`] enum. Tags this
//! build does not know land in [`NotificationKind::Unknown`] with the raw
//! string preserved, so newer servers never break older clients.
//!
//! Records are immutable once parsed and carry no identity field.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ─────────────────────────────────────────────────────────────────────────────
// NotificationKind
// ─────────────────────────────────────────────────────────────────────────────

/// The kind of account-state change a notification describes.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NotificationKind {
    /// An instant (PIX) payment was confirmed.
    PixPaymentConfirmed,
    /// The account balance changed.
    BalanceUpdated,
    /// An SMS arrived for one of the account's activations.
    SmsReceived,
    /// An activation expired without use.
    ActivationExpired,
    /// A balance recharge completed.
    RechargeCompleted,
    /// A mutating operation started on some device of the account.
    OperationStarted,
    /// A mutating operation finished successfully.
    OperationCompleted,
    /// A mutating operation failed.
    OperationFailed,
    /// Free-form message from an administrator.
    AdminNotification,
    /// A tag this build does not recognize.
    Unknown(String),
}

impl NotificationKind {
    /// Wire tag for this kind.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::PixPaymentConfirmed => "pix_payment_confirmed",
            Self::BalanceUpdated => "balance_updated",
            Self::SmsReceived => "sms_received",
            Self::ActivationExpired => "activation_expired",
            Self::RechargeCompleted => "recharge_completed",
            Self::OperationStarted => "operation_started",
            Self::OperationCompleted => "operation_completed",
            Self::OperationFailed => "operation_failed",
            Self::AdminNotification => "admin_notification",
            Self::Unknown(tag) => tag,
        }
    }

    /// Whether this kind marks the end of an operation (either outcome).
    #[must_use]
    pub fn ends_operation(&self) -> bool {
        matches!(self, Self::OperationCompleted | Self::OperationFailed)
    }

    /// Presentation hint for callers that surface notifications.
    #[must_use]
    pub fn severity(&self) -> Severity {
        match self {
            Self::PixPaymentConfirmed | Self::SmsReceived | Self::OperationCompleted => {
                Severity::Success
            }
            Self::BalanceUpdated => Severity::Info,
            Self::ActivationExpired => Severity::Warning,
            Self::OperationFailed => Severity::Error,
            // Admin messages are shown in the sidebar only.
            Self::AdminNotification => Severity::Silent,
            Self::RechargeCompleted | Self::OperationStarted | Self::Unknown(_) => {
                Severity::Neutral
            }
        }
    }
}

impl From<String> for NotificationKind {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "pix_payment_confirmed" => Self::PixPaymentConfirmed,
            "balance_updated" => Self::BalanceUpdated,
            "sms_received" => Self::SmsReceived,
            "activation_expired" => Self::ActivationExpired,
            "recharge_completed" => Self::RechargeCompleted,
            "operation_started" => Self::OperationStarted,
            "operation_completed" => Self::OperationCompleted,
            "operation_failed" => Self::OperationFailed,
            "admin_notification" => Self::AdminNotification,
            _ => Self::Unknown(tag),
        }
    }
}

impl From<NotificationKind> for String {
    fn from(kind: NotificationKind) -> Self {
        match kind {
            NotificationKind::Unknown(tag) => tag,
            other => other.as_str().to_owned(),
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How prominently a notification kind deserves to be surfaced.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Positive outcome.
    Success,
    /// Informational.
    Info,
    /// Needs attention.
    Warning,
    /// Failed outcome.
    Error,
    /// No distinct styling.
    Neutral,
    /// Should not be surfaced as a transient popup.
    Silent,
}

// ─────────────────────────────────────────────────────────────────────────────
// OperationKind
// ─────────────────────────────────────────────────────────────────────────────

/// The operation named in `data.operation` of operation lifecycle events.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum OperationKind {
    /// Buying a number / activation.
    Purchase,
    /// Cancelling an activation.
    Cancel,
    /// Any other operation name.
    Other(String),
}

impl From<String> for OperationKind {
    fn from(name: String) -> Self {
        match name.as_str() {
            "purchase" => Self::Purchase,
            "cancel" => Self::Cancel,
            _ => Self::Other(name),
        }
    }
}

impl From<OperationKind> for String {
    fn from(kind: OperationKind) -> Self {
        match kind {
            OperationKind::Purchase => "purchase".to_owned(),
            OperationKind::Cancel => "cancel".to_owned(),
            OperationKind::Other(name) => name,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Notification
// ─────────────────────────────────────────────────────────────────────────────

/// A single server-pushed notification.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    /// Event kind (`type` on the wire).
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    /// Short headline.
    pub title: String,
    /// Human-readable body.
    pub message: String,
    /// Kind-specific payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Whether the client should play the "money" sound.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub play_sound: Option<bool>,
    /// Server emission time, ISO-8601.
    pub timestamp: String,
}

impl Notification {
    /// Build a notification stamped with the current time.
    pub fn new(
        kind: NotificationKind,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            title: title.into(),
            message: message.into(),
            data: None,
            play_sound: None,
            timestamp: Utc::now().to_rfc3339(),
        }
    }

    /// Attach a `data` payload.
    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Parse the `timestamp` field as RFC 3339, if well-formed.
    #[must_use]
    pub fn timestamp_utc(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.timestamp)
            .ok()
            .map(|t| t.with_timezone(&Utc))
    }

    /// The operation named in `data.operation`, if any.
    #[must_use]
    pub fn operation(&self) -> Option<OperationKind> {
        self.data
            .as_ref()?
            .get("operation")?
            .as_str()
            .map(|name| OperationKind::from(name.to_owned()))
    }

    /// Whether the client should play a sound for this notification.
    #[must_use]
    pub fn plays_sound(&self) -> bool {
        self.play_sound.unwrap_or(false)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    // ── NotificationKind ─────────────────────────────────────────────────

    #[test]
    fn known_tags_parse_to_variants() {
        let cases = [
            ("pix_payment_confirmed", NotificationKind::PixPaymentConfirmed),
            ("balance_updated", NotificationKind::BalanceUpdated),
            ("sms_received", NotificationKind::SmsReceived),
            ("activation_expired", NotificationKind::ActivationExpired),
            ("recharge_completed", NotificationKind::RechargeCompleted),
            ("operation_started", NotificationKind::OperationStarted),
            ("operation_completed", NotificationKind::OperationCompleted),
            ("operation_failed", NotificationKind::OperationFailed),
            ("admin_notification", NotificationKind::AdminNotification),
        ];
        for (tag, expected) in cases {
            let kind: NotificationKind = serde_json::from_value(json!(tag)).unwrap();
            assert_eq!(kind, expected);
            assert_eq!(kind.as_str(), tag);
        }
    }

    #[test]
    fn unknown_tag_is_preserved() {
        let kind: NotificationKind = serde_json::from_value(json!("coupon_applied")).unwrap();
        assert_eq!(kind, NotificationKind::Unknown("coupon_applied".into()));
        assert_eq!(serde_json::to_value(&kind).unwrap(), json!("coupon_applied"));
    }

    #[test]
    fn ends_operation() {
        assert!(NotificationKind::OperationCompleted.ends_operation());
        assert!(NotificationKind::OperationFailed.ends_operation());
        assert!(!NotificationKind::OperationStarted.ends_operation());
    }

    #[test]
    fn severity_hints() {
        assert_eq!(NotificationKind::PixPaymentConfirmed.severity(), Severity::Success);
        assert_eq!(NotificationKind::BalanceUpdated.severity(), Severity::Info);
        assert_eq!(NotificationKind::ActivationExpired.severity(), Severity::Warning);
        assert_eq!(NotificationKind::OperationFailed.severity(), Severity::Error);
        assert_eq!(NotificationKind::AdminNotification.severity(), Severity::Silent);
        assert_eq!(
            NotificationKind::Unknown("x".into()).severity(),
            Severity::Neutral
        );
    }

    // ── Notification ─────────────────────────────────────────────────────

    #[test]
    fn parse_minimal_record() {
        let n: Notification = serde_json::from_value(json!({
            "type": "sms_received",
            "title": "SMS",
            "message": "Code 482913",
            "timestamp": "2024-01-01T00:00:00Z"
        }))
        .unwrap();
        assert_eq!(n.kind, NotificationKind::SmsReceived);
        assert_eq!(n.message, "Code 482913");
        assert!(n.data.is_none());
        assert!(!n.plays_sound());
        assert_eq!(n.timestamp_utc().unwrap().timestamp(), 1_704_067_200);
    }

    #[test]
    fn parse_full_record_camel_case() {
        let n: Notification = serde_json::from_value(json!({
            "type": "balance_updated",
            "title": "Saldo",
            "message": "+R$ 10,00",
            "data": {"balance": 1000},
            "playSound": true,
            "timestamp": "2024-01-01T00:00:00.000Z"
        }))
        .unwrap();
        assert!(n.plays_sound());
        assert_eq!(n.data.unwrap()["balance"], 1000);
    }

    #[test]
    fn serialize_uses_wire_names() {
        let n = Notification {
            kind: NotificationKind::RechargeCompleted,
            title: "t".into(),
            message: "m".into(),
            data: None,
            play_sound: Some(true),
            timestamp: "2024-01-01T00:00:00Z".into(),
        };
        let v = serde_json::to_value(&n).unwrap();
        assert_eq!(v["type"], "recharge_completed");
        assert_eq!(v["playSound"], true);
        assert!(v.get("data").is_none());
    }

    #[test]
    fn missing_title_is_rejected() {
        let result = serde_json::from_value::<Notification>(json!({
            "type": "sms_received",
            "message": "m",
            "timestamp": "2024-01-01T00:00:00Z"
        }));
        assert!(result.is_err());
    }

    #[test]
    fn bad_timestamp_is_kept_raw() {
        let n: Notification = serde_json::from_value(json!({
            "type": "sms_received", "title": "t", "message": "m", "timestamp": "yesterday"
        }))
        .unwrap();
        assert_eq!(n.timestamp, "yesterday");
        assert!(n.timestamp_utc().is_none());
    }

    // ── OperationKind ────────────────────────────────────────────────────

    #[test]
    fn operation_from_data() {
        let n: Notification = serde_json::from_value(json!({
            "type": "operation_started", "title": "t", "message": "m",
            "data": {"operation": "purchase"}, "timestamp": "2024-01-01T00:00:00Z"
        }))
        .unwrap();
        assert_eq!(n.operation(), Some(OperationKind::Purchase));
    }

    #[test]
    fn operation_other_and_missing() {
        let mut n: Notification = serde_json::from_value(json!({
            "type": "operation_started", "title": "t", "message": "m",
            "data": {"operation": "refund"}, "timestamp": "2024-01-01T00:00:00Z"
        }))
        .unwrap();
        assert_matches!(n.operation(), Some(OperationKind::Other(name)) if name == "refund");
        n.data = Some(json!({"unrelated": 1}));
        assert!(n.operation().is_none());
        n.data = None;
        assert!(n.operation().is_none());
    }
}
