//! Outcome-tagged response envelope.
//!
//! Every handler answers with an [`Envelope`]. The typed and untyped variants are
//! one struct: [`UntypedEnvelope`] fixes the payload type to [`NoPayload`], which has
//! no values, so an untyped envelope can never carry `ResponseData`.
//!
//! Wire shape (field names are part of the client contract):
//!
//! ```json
//! { "ResultType": 1, "Message": null, "ValidationMessages": null, "ResponseData": { } }
//! ```

use std::fmt;

use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};

use crate::error::UnknownOutcome;

/// Message carried by every validation-error envelope.
pub const VALIDATION_ERROR_MESSAGE: &str = "Response has validation errors";

const OUTCOME_LABELS: [&str; 6] = [
    "Success",
    "Error",
    "ValidationError",
    "Warning",
    "NotFound",
    "Empty",
];

/// Result kind of an [`Envelope`]. Serialized as its integer code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Outcome {
    Success = 1,
    Error = 2,
    ValidationError = 3,
    Warning = 4,
    NotFound = 5,
    Empty = 6,
}

impl Outcome {
    pub const ALL: [Outcome; 6] = [
        Outcome::Success,
        Outcome::Error,
        Outcome::ValidationError,
        Outcome::Warning,
        Outcome::NotFound,
        Outcome::Empty,
    ];

    /// Wire code of this outcome.
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Warning still counts as success: the request did what was asked.
    pub const fn is_successful(self) -> bool {
        matches!(self, Outcome::Success | Outcome::Warning)
    }

    pub const fn label(self) -> &'static str {
        OUTCOME_LABELS[self as usize - 1]
    }

    fn from_label(label: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|outcome| outcome.label().eq_ignore_ascii_case(label))
    }
}

impl TryFrom<u8> for Outcome {
    type Error = UnknownOutcome;

    fn try_from(code: u8) -> Result<Self, UnknownOutcome> {
        Self::ALL
            .into_iter()
            .find(|outcome| outcome.code() == code)
            .ok_or(UnknownOutcome(code))
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for Outcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.code())
    }
}

impl<'de> Deserialize<'de> for Outcome {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct OutcomeVisitor;

        impl Visitor<'_> for OutcomeVisitor {
            type Value = Outcome;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a result type code between 1 and 6 or its label")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Outcome, E> {
                u8::try_from(v)
                    .ok()
                    .and_then(|code| Outcome::try_from(code).ok())
                    .ok_or_else(|| E::invalid_value(de::Unexpected::Unsigned(v), &self))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Outcome, E> {
                match u64::try_from(v) {
                    Ok(code) => self.visit_u64(code),
                    Err(_) => Err(E::invalid_value(de::Unexpected::Signed(v), &self)),
                }
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Outcome, E> {
                Outcome::from_label(v).ok_or_else(|| E::unknown_variant(v, &OUTCOME_LABELS))
            }
        }

        deserializer.deserialize_any(OutcomeVisitor)
    }
}

/// How `not_found` tags its envelope.
///
/// `Legacy` keeps the wire contract existing clients see today (`ResultType = Error`);
/// `Distinct` uses the dedicated `NotFound` code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotFoundPolicy {
    #[default]
    Legacy,
    Distinct,
}

impl NotFoundPolicy {
    pub const fn outcome(self) -> Outcome {
        match self {
            NotFoundPolicy::Legacy => Outcome::Error,
            NotFoundPolicy::Distinct => Outcome::NotFound,
        }
    }
}

/// Payload type of the untyped envelope. It has no values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoPayload {}

impl Serialize for NoPayload {
    fn serialize<S: Serializer>(&self, _serializer: S) -> Result<S::Ok, S::Error> {
        match *self {}
    }
}

impl<'de> Deserialize<'de> for NoPayload {
    fn deserialize<D: Deserializer<'de>>(_deserializer: D) -> Result<Self, D::Error> {
        Err(de::Error::custom("an untyped envelope carries no ResponseData"))
    }
}

/// Envelope without a payload, used for pure status answers.
pub type UntypedEnvelope = Envelope<NoPayload>;

/// Immutable response wrapper. Construct it through the outcome constructors.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Envelope<T> {
    #[serde(rename = "ResultType")]
    outcome: Outcome,
    #[serde(rename = "Message")]
    message: Option<String>,
    #[serde(rename = "ValidationMessages")]
    validation_messages: Option<Vec<String>>,
    #[serde(rename = "ResponseData")]
    payload: Option<T>,
}

impl<T> Envelope<T> {
    const fn with_parts(
        outcome: Outcome,
        message: Option<String>,
        validation_messages: Option<Vec<String>>,
        payload: Option<T>,
    ) -> Self {
        Self {
            outcome,
            message,
            validation_messages,
            payload,
        }
    }

    pub fn success() -> Self {
        Self::with_parts(Outcome::Success, None, None, None)
    }

    pub fn success_with(payload: T) -> Self {
        Self::with_parts(Outcome::Success, None, None, Some(payload))
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self::with_parts(Outcome::Error, Some(message.into()), None, None)
    }

    /// Not-found answer tagged as `Error` on the wire, as existing clients expect.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::not_found_as(NotFoundPolicy::Legacy, message)
    }

    pub fn not_found_as(policy: NotFoundPolicy, message: impl Into<String>) -> Self {
        Self::with_parts(policy.outcome(), Some(message.into()), None, None)
    }

    /// Messages are kept exactly as given, including an empty list.
    pub fn validation_error(messages: Vec<String>) -> Self {
        Self::with_parts(
            Outcome::ValidationError,
            Some(VALIDATION_ERROR_MESSAGE.to_string()),
            Some(messages),
            None,
        )
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::with_parts(Outcome::Warning, Some(message.into()), None, None)
    }

    pub fn warning_with(message: impl Into<String>, payload: T) -> Self {
        Self::with_parts(Outcome::Warning, Some(message.into()), None, Some(payload))
    }

    pub fn empty() -> Self {
        Self::with_parts(Outcome::Empty, None, None, None)
    }

    pub fn outcome(&self) -> Outcome {
        self.outcome
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Field-level messages; empty unless the outcome is `ValidationError`.
    pub fn validation_messages(&self) -> &[String] {
        self.validation_messages.as_deref().unwrap_or_default()
    }

    pub fn payload(&self) -> Option<&T> {
        self.payload.as_ref()
    }

    pub fn into_payload(self) -> Option<T> {
        self.payload
    }

    pub fn is_successful(&self) -> bool {
        self.outcome.is_successful()
    }

    pub fn has_payload(&self) -> bool {
        self.payload.is_some()
    }

    /// Map the payload while keeping outcome and messages (domain -> DTO).
    pub fn map_payload<U>(self, f: impl FnOnce(T) -> U) -> Envelope<U> {
        Envelope {
            outcome: self.outcome,
            message: self.message,
            validation_messages: self.validation_messages,
            payload: self.payload.map(f),
        }
    }

    /// Drop the payload, keeping outcome and messages.
    pub fn into_untyped(self) -> UntypedEnvelope {
        Envelope {
            outcome: self.outcome,
            message: self.message,
            validation_messages: self.validation_messages,
            payload: None,
        }
    }

    fn from_wire(wire: WireEnvelope<T>) -> Result<Self, String> {
        let WireEnvelope {
            outcome,
            message,
            validation_messages,
            payload,
        } = wire;

        let validation_messages = match (outcome, validation_messages) {
            (Outcome::ValidationError, messages) => Some(messages.unwrap_or_default()),
            (_, None) => None,
            (other, Some(_)) => {
                return Err(format!("ValidationMessages present on a {other} envelope"));
            }
        };

        if payload.is_some() && !outcome.is_successful() {
            return Err(format!("ResponseData present on a {outcome} envelope"));
        }

        Ok(Self::with_parts(
            outcome,
            message,
            validation_messages,
            payload,
        ))
    }
}

#[derive(Deserialize)]
struct WireEnvelope<T> {
    #[serde(rename = "ResultType")]
    outcome: Outcome,
    #[serde(rename = "Message")]
    message: Option<String>,
    #[serde(rename = "ValidationMessages")]
    validation_messages: Option<Vec<String>>,
    #[serde(rename = "ResponseData")]
    payload: Option<T>,
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Envelope<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let wire = WireEnvelope::<T>::deserialize(deserializer)?;
        Envelope::from_wire(wire).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Wallet {
        id: u32,
        owner: String,
    }

    fn wallet() -> Wallet {
        Wallet {
            id: 7,
            owner: "ada".to_string(),
        }
    }

    #[test]
    fn successful_flag_follows_outcome() {
        assert!(Envelope::success_with(wallet()).is_successful());
        assert!(Envelope::warning_with("low balance", wallet()).is_successful());
        assert!(UntypedEnvelope::success().is_successful());
        assert!(UntypedEnvelope::warning("heads up").is_successful());

        assert!(!UntypedEnvelope::failed("boom").is_successful());
        assert!(!UntypedEnvelope::not_found("missing").is_successful());
        assert!(!UntypedEnvelope::validation_error(vec!["Required".into()]).is_successful());
        // Empty answers without content but is not counted as successful.
        assert!(!UntypedEnvelope::empty().is_successful());
    }

    #[test]
    fn payload_only_when_supplied() {
        assert!(Envelope::success_with(wallet()).has_payload());
        assert!(!Envelope::<Wallet>::success().has_payload());
        assert!(!Envelope::<Wallet>::warning("no data").has_payload());
        assert!(!UntypedEnvelope::success().has_payload());
        assert_eq!(
            Envelope::warning_with("stale", wallet()).into_payload(),
            Some(wallet())
        );
    }

    #[test]
    fn validation_error_keeps_messages_verbatim() {
        let messages = vec!["Required".to_string(), "Invalid format".to_string()];
        let env = UntypedEnvelope::validation_error(messages.clone());

        assert_eq!(env.outcome(), Outcome::ValidationError);
        assert_eq!(env.validation_messages(), messages.as_slice());
        assert_eq!(env.message(), Some(VALIDATION_ERROR_MESSAGE));

        let empty = UntypedEnvelope::validation_error(Vec::new());
        assert!(empty.validation_messages().is_empty());
        assert_eq!(empty.outcome(), Outcome::ValidationError);
    }

    #[test]
    fn non_validation_outcomes_have_no_field_messages() {
        assert!(UntypedEnvelope::failed("x").validation_messages().is_empty());
        assert!(UntypedEnvelope::warning("x").validation_messages().is_empty());
    }

    #[test]
    fn not_found_policy_selects_wire_tag() {
        let legacy = UntypedEnvelope::not_found("wallet 9 not found");
        assert_eq!(legacy.outcome(), Outcome::Error);
        assert_eq!(legacy.message(), Some("wallet 9 not found"));

        let distinct = UntypedEnvelope::not_found_as(NotFoundPolicy::Distinct, "gone");
        assert_eq!(distinct.outcome(), Outcome::NotFound);
        assert_eq!(distinct.message(), Some("gone"));
    }

    #[test]
    fn outcome_codes_are_stable() {
        let codes: Vec<u8> = Outcome::ALL.iter().map(|o| o.code()).collect();
        assert_eq!(codes, vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(Outcome::try_from(6), Ok(Outcome::Empty));
        assert_eq!(Outcome::try_from(0), Err(UnknownOutcome(0)));
        assert_eq!(Outcome::ValidationError.to_string(), "ValidationError");
    }

    #[test]
    fn serializes_with_contract_field_names() {
        let value = serde_json::to_value(Envelope::success_with(wallet())).unwrap();
        assert_eq!(
            value,
            json!({
                "ResultType": 1,
                "Message": null,
                "ValidationMessages": null,
                "ResponseData": { "id": 7, "owner": "ada" }
            })
        );
        assert!(value.get("Successful").is_none());

        let value =
            serde_json::to_value(UntypedEnvelope::validation_error(vec!["Required".into()]))
                .unwrap();
        assert_eq!(value["ResultType"], 3);
        assert_eq!(value["Message"], VALIDATION_ERROR_MESSAGE);
        assert_eq!(value["ValidationMessages"], json!(["Required"]));
        assert_eq!(value["ResponseData"], json!(null));
    }

    #[test]
    fn round_trips_every_outcome() {
        let typed = vec![
            Envelope::success_with(wallet()),
            Envelope::success(),
            Envelope::failed("boom"),
            Envelope::not_found("missing"),
            Envelope::not_found_as(NotFoundPolicy::Distinct, "missing"),
            Envelope::validation_error(vec!["Required".into(), "Too long".into()]),
            Envelope::warning("careful"),
            Envelope::warning_with("careful", wallet()),
            Envelope::empty(),
        ];
        for env in typed {
            let text = serde_json::to_string(&env).unwrap();
            let back: Envelope<Wallet> = serde_json::from_str(&text).unwrap();
            assert_eq!(back, env);
        }

        let untyped = UntypedEnvelope::validation_error(Vec::new());
        let text = serde_json::to_string(&untyped).unwrap();
        let back: UntypedEnvelope = serde_json::from_str(&text).unwrap();
        assert_eq!(back, untyped);
    }

    #[test]
    fn accepts_label_and_missing_optionals() {
        let env: UntypedEnvelope =
            serde_json::from_str(r#"{"ResultType":"warning","Message":"slow"}"#).unwrap();
        assert_eq!(env.outcome(), Outcome::Warning);
        assert_eq!(env.message(), Some("slow"));

        let env: UntypedEnvelope = serde_json::from_str(r#"{"ResultType":3}"#).unwrap();
        assert_eq!(env.outcome(), Outcome::ValidationError);
        assert!(env.validation_messages().is_empty());
    }

    #[test]
    fn rejects_documents_breaking_invariants() {
        let messages_on_error = r#"{"ResultType":2,"ValidationMessages":["x"]}"#;
        assert!(serde_json::from_str::<UntypedEnvelope>(messages_on_error).is_err());

        let payload_on_error = r#"{"ResultType":2,"ResponseData":{"id":1,"owner":"x"}}"#;
        assert!(serde_json::from_str::<Envelope<Wallet>>(payload_on_error).is_err());

        let payload_on_untyped = r#"{"ResultType":1,"ResponseData":{"id":1}}"#;
        assert!(serde_json::from_str::<UntypedEnvelope>(payload_on_untyped).is_err());

        assert!(serde_json::from_str::<UntypedEnvelope>(r#"{"ResultType":9}"#).is_err());
    }

    #[test]
    fn map_payload_preserves_outcome() {
        let env = Envelope::warning_with("partial", wallet()).map_payload(|w| w.owner);
        assert_eq!(env.outcome(), Outcome::Warning);
        assert_eq!(env.message(), Some("partial"));
        assert_eq!(env.payload().map(String::as_str), Some("ada"));

        let untyped = Envelope::success_with(wallet()).into_untyped();
        assert!(untyped.is_successful());
        assert!(!untyped.has_payload());
    }
}
