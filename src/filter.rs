//! Correlation filters for subscription routing.
//!
//! A [`CorrelationFilter`] is a set of optional field-equality
//! constraints. A field left `None` (or set to the empty string) is a
//! wildcard and imposes no constraint; a constrained field must equal the
//! message's corresponding property exactly, case-sensitively. A filter
//! with every field wildcarded is a legal catch-all.

use serde::{Deserialize, Serialize};

use crate::message::Message;

/// Field-equality constraints over a message's correlation properties.
///
/// Immutable once attached to a rule; evaluation is a pure function of
/// the filter and the message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, bon::Builder)]
#[builder(on(String, into))]
#[serde(default)]
pub struct CorrelationFilter {
    pub content_type: Option<String>,
    pub correlation_id: Option<String>,
    pub subject: Option<String>,
    pub message_id: Option<String>,
    pub reply_to: Option<String>,
    pub reply_to_session_id: Option<String>,
    pub session_id: Option<String>,
    pub send_to: Option<String>,
}

/// True when `expected` constrains nothing or equals `actual` exactly.
///
/// A constrained field never matches an absent message property.
fn field_matches(expected: Option<&str>, actual: Option<&str>) -> bool {
    match expected {
        None => true,
        Some("") => true,
        Some(want) => actual == Some(want),
    }
}

impl CorrelationFilter {
    /// Evaluate the filter against a message.
    ///
    /// Returns true iff every constrained field matches. Deterministic,
    /// no side effects; malformed or partial messages are handled by the
    /// same rules (absent properties fail constrained fields only).
    pub fn matches(&self, message: &Message) -> bool {
        field_matches(self.content_type.as_deref(), message.content_type.as_deref())
            && field_matches(
                self.correlation_id.as_deref(),
                message.correlation_id.as_deref(),
            )
            && field_matches(self.subject.as_deref(), message.subject.as_deref())
            && field_matches(self.message_id.as_deref(), Some(message.message_id.as_str()))
            && field_matches(self.reply_to.as_deref(), message.reply_to.as_deref())
            && field_matches(
                self.reply_to_session_id.as_deref(),
                message.reply_to_session_id.as_deref(),
            )
            && field_matches(self.session_id.as_deref(), message.session_id.as_deref())
            && field_matches(self.send_to.as_deref(), message.send_to.as_deref())
    }

    /// Whether every field is wildcarded.
    pub fn is_catch_all(&self) -> bool {
        let unconstrained = |f: &Option<String>| f.as_deref().is_none_or(str::is_empty);

        unconstrained(&self.content_type)
            && unconstrained(&self.correlation_id)
            && unconstrained(&self.subject)
            && unconstrained(&self.message_id)
            && unconstrained(&self.reply_to)
            && unconstrained(&self.reply_to_session_id)
            && unconstrained(&self.session_id)
            && unconstrained(&self.send_to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_field_match_ignores_other_properties() {
        let filter = CorrelationFilter::builder().correlation_id("id1").build();
        let message = Message::builder()
            .correlation_id("id1")
            .subject("x")
            .build();

        assert!(filter.matches(&message));
    }

    #[test]
    fn any_constrained_mismatch_fails() {
        let filter = CorrelationFilter::builder()
            .correlation_id("id1")
            .subject("subject1")
            .build();
        let message = Message::builder()
            .correlation_id("id1")
            .subject("other")
            .build();

        assert!(!filter.matches(&message));
    }

    #[test]
    fn catch_all_matches_everything() {
        let filter = CorrelationFilter::default();
        assert!(filter.is_catch_all());

        assert!(filter.matches(&Message::builder().build()));
        assert!(filter.matches(
            &Message::builder()
                .correlation_id("id1")
                .subject("s")
                .session_id("session1")
                .build()
        ));
    }

    #[test]
    fn empty_string_fields_are_wildcards() {
        let filter = CorrelationFilter::builder()
            .subject("")
            .correlation_id("id1")
            .build();
        let message = Message::builder()
            .correlation_id("id1")
            .subject("anything")
            .build();

        assert!(filter.matches(&message));
        assert!(!filter.is_catch_all());
    }

    #[test]
    fn comparison_is_case_sensitive() {
        let filter = CorrelationFilter::builder().subject("Subject1").build();

        assert!(filter.matches(&Message::builder().subject("Subject1").build()));
        assert!(!filter.matches(&Message::builder().subject("subject1").build()));
    }

    #[test]
    fn constrained_field_fails_absent_property() {
        let filter = CorrelationFilter::builder().session_id("session1").build();
        let message = Message::builder().correlation_id("id1").build();

        assert!(!filter.matches(&message));
    }

    #[test]
    fn message_id_constraint_compares_the_assigned_id() {
        let filter = CorrelationFilter::builder().message_id("msgid1").build();

        assert!(filter.matches(&Message::builder().message_id("msgid1").build()));
        assert!(!filter.matches(&Message::builder().message_id("msgid2").build()));
    }

    #[test]
    fn every_field_participates_in_matching() {
        // One (filter, matching message, mismatching message) triple per
        // filterable field.
        let cases: Vec<(CorrelationFilter, Message, Message)> = vec![
            (
                CorrelationFilter::builder().content_type("application/text").build(),
                Message::builder().content_type("application/text").build(),
                Message::builder().content_type("application/json").build(),
            ),
            (
                CorrelationFilter::builder().correlation_id("id1").build(),
                Message::builder().correlation_id("id1").build(),
                Message::builder().correlation_id("id2").build(),
            ),
            (
                CorrelationFilter::builder().subject("subject1").build(),
                Message::builder().subject("subject1").build(),
                Message::builder().subject("subject2").build(),
            ),
            (
                CorrelationFilter::builder().reply_to("someQueue").build(),
                Message::builder().reply_to("someQueue").build(),
                Message::builder().reply_to("otherQueue").build(),
            ),
            (
                CorrelationFilter::builder().reply_to_session_id("sessionId").build(),
                Message::builder().reply_to_session_id("sessionId").build(),
                Message::builder().reply_to_session_id("other").build(),
            ),
            (
                CorrelationFilter::builder().session_id("session1").build(),
                Message::builder().session_id("session1").build(),
                Message::builder().session_id("session2").build(),
            ),
            (
                CorrelationFilter::builder().send_to("xyz").build(),
                Message::builder().send_to("xyz").build(),
                Message::builder().send_to("abc").build(),
            ),
        ];

        for (filter, matching, mismatching) in cases {
            assert!(filter.matches(&matching), "expected match: {filter:?}");
            assert!(!filter.matches(&mismatching), "expected mismatch: {filter:?}");
        }
    }
}
