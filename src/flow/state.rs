// SPDX-License-Identifier: MIT

//! Immutable workflow state
//!
//! A [`WorkflowState`] is a value: every mutator is a `with_*` constructor
//! that returns a new snapshot, so a step can never modify the state its
//! caller holds. Serialization is deterministic (ordered field map), which
//! keeps repeated snapshots of an unchanged session byte-identical.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Who produced a message in the session log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Human,
    Assistant,
}

/// One entry in the append-only session log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn human(content: impl Into<String>) -> Self {
        Self {
            role: Role::Human,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Top-level stage of the master workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Phase1,
    Checkpoint,
    Phase2,
    Complete,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Phase1 => "phase1",
            Phase::Checkpoint => "checkpoint",
            Phase::Phase2 => "phase2",
            Phase::Complete => "complete",
        }
    }
}

/// Closed set of named state fields steps may read or write.
///
/// Each step declares which of these it consumes and produces; the test
/// suite checks that every pipeline only reads fields seeded or written
/// earlier.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    // Master workflow
    CompetitiveIntelligence,
    CreativeIntelligence,
    UserDecision,
    UserGuidance,
    CheckpointMessage,
    FinalSummary,
    Error,
    // Competitive-analysis pipeline
    RawDataPngUrl,
    RawDataJson,
    CepAnalysis,
    CepTables,
    KeyInsights,
    VisualizationPngUrl,
    VisualizationPdfUrl,
    PowerpointUrl,
    FinalReport,
    // Audience-strategy pipeline
    CompetitiveTables,
    CompetitiveDynamics,
    AudienceSegments,
    PriorityCeps,
    AudienceAttributes,
    StrategicTable,
    StrategicInsights,
    BelowThresholdAnalysis,
    FinalOutput,
}

/// Immutable snapshot of a session's progress
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowState {
    messages: Vec<Message>,
    fields: BTreeMap<Field, Value>,
    phase: Phase,
    step: Option<String>,
}

impl WorkflowState {
    /// Create an empty state, positioned at phase 1
    pub fn empty() -> Self {
        Self {
            messages: Vec::new(),
            fields: BTreeMap::new(),
            phase: Phase::Phase1,
            step: None,
        }
    }

    /// Create the initial state for a triggered session
    pub fn started(trigger: impl Into<String>) -> Self {
        Self::empty().with_message(Message::human(trigger))
    }

    /// New state with one field overwritten
    pub fn with_field(&self, field: Field, value: Value) -> Self {
        let mut next = self.clone();
        next.fields.insert(field, value);
        next
    }

    /// New state with one field set to a string value
    pub fn with_text(&self, field: Field, value: impl Into<String>) -> Self {
        self.with_field(field, Value::String(value.into()))
    }

    /// New state with a message appended to the log
    pub fn with_message(&self, message: Message) -> Self {
        let mut next = self.clone();
        next.messages.push(message);
        next
    }

    /// New state positioned at the given phase
    pub fn with_phase(&self, phase: Phase) -> Self {
        let mut next = self.clone();
        next.phase = phase;
        next
    }

    /// New state with the current-step cursor updated
    pub fn with_step(&self, step: impl Into<String>) -> Self {
        let mut next = self.clone();
        next.step = Some(step.into());
        next
    }

    /// New state with the error field set
    pub fn with_error(&self, message: impl Into<String>) -> Self {
        self.with_text(Field::Error, message)
    }

    pub fn field(&self, field: Field) -> Option<&Value> {
        self.fields.get(&field)
    }

    /// String content of a field, if it holds one
    pub fn text(&self, field: Field) -> Option<&str> {
        self.fields.get(&field).and_then(Value::as_str)
    }

    /// String content of a field, or "" when absent
    pub fn text_or_empty(&self, field: Field) -> &str {
        self.text(field).unwrap_or("")
    }

    pub fn error(&self) -> Option<&str> {
        self.text(Field::Error)
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Most recent externally supplied (human) message
    pub fn last_human_message(&self) -> Option<&Message> {
        self.messages.iter().rev().find(|m| m.role == Role::Human)
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn step(&self) -> Option<&str> {
        self.step.as_deref()
    }
}

impl Default for WorkflowState {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_with_field_leaves_original_untouched() {
        let base = WorkflowState::empty();
        let updated = base.with_text(Field::CepAnalysis, "analysis text");

        assert!(base.field(Field::CepAnalysis).is_none());
        assert_eq!(updated.text(Field::CepAnalysis), Some("analysis text"));
    }

    #[test]
    fn test_with_field_overwrites() {
        let state = WorkflowState::empty()
            .with_text(Field::FinalReport, "first")
            .with_text(Field::FinalReport, "second");

        assert_eq!(state.text(Field::FinalReport), Some("second"));
    }

    #[test]
    fn test_messages_are_append_only() {
        let state = WorkflowState::started("go")
            .with_message(Message::assistant("report"))
            .with_message(Message::human("proceed"));

        let roles: Vec<Role> = state.messages().iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::Human, Role::Assistant, Role::Human]);
    }

    #[test]
    fn test_last_human_message() {
        let state = WorkflowState::started("trigger")
            .with_message(Message::assistant("checkpoint"))
            .with_message(Message::human("focus on the Switch segment"));

        assert_eq!(
            state.last_human_message().map(|m| m.content.as_str()),
            Some("focus on the Switch segment")
        );
    }

    #[test]
    fn test_text_or_empty_for_absent_field() {
        let state = WorkflowState::empty();
        assert_eq!(state.text_or_empty(Field::UserGuidance), "");
    }

    #[test]
    fn test_non_string_field_has_no_text() {
        let state = WorkflowState::empty().with_field(Field::KeyInsights, json!(["a", "b"]));
        assert!(state.text(Field::KeyInsights).is_none());
        assert_eq!(state.field(Field::KeyInsights), Some(&json!(["a", "b"])));
    }

    #[test]
    fn test_serialization_is_deterministic() {
        let build = || {
            WorkflowState::started("go")
                .with_text(Field::CepTables, "| a | b |")
                .with_text(Field::CepAnalysis, "text")
                .with_phase(Phase::Checkpoint)
        };
        let a = serde_json::to_string(&build()).unwrap();
        let b = serde_json::to_string(&build()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_phase_round_trip() {
        let state = WorkflowState::empty().with_phase(Phase::Phase2);
        let json = serde_json::to_string(&state).unwrap();
        let back: WorkflowState = serde_json::from_str(&json).unwrap();
        assert_eq!(back.phase(), Phase::Phase2);
    }
}
