// SPDX-License-Identifier: MIT

//! Checkpoint decision classification
//!
//! Maps free-text external input to a closed [`Decision`]. Pure and total:
//! every input classifies to exactly one variant.

use crate::flow::{Field, WorkflowState};

/// What the human asked for at the checkpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Run phase 2 as planned
    Proceed,
    /// End the workflow after phase 1
    Stop,
    /// Run phase 2 with this text folded into its input
    Guidance(String),
}

const PROCEED_SIGNALS: [&str; 6] = ["proceed", "continue", "yes", "go ahead", "ok", "okay"];
const STOP_SIGNALS: [&str; 4] = ["stop", "no", "end", "halt"];

/// Classify external input into a [`Decision`].
///
/// The text is lower-cased and trimmed, then matched by substring against
/// the proceed vocabulary and, only if nothing matched, the stop vocabulary.
/// Proceed-before-stop is the documented tie-break for inputs containing
/// terms from both lists. Anything else is guidance, carried verbatim
/// (normalized) into phase 2.
pub fn classify(input: &str) -> Decision {
    let text = input.trim().to_lowercase();

    if PROCEED_SIGNALS.iter().any(|signal| text.contains(signal)) {
        Decision::Proceed
    } else if STOP_SIGNALS.iter().any(|signal| text.contains(signal)) {
        Decision::Stop
    } else {
        Decision::Guidance(text)
    }
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Proceed => "proceed",
            Decision::Stop => "stop",
            Decision::Guidance(_) => "guidance",
        }
    }

    /// Reconstruct the decision recorded in a state, if any
    pub fn from_state(state: &WorkflowState) -> Option<Decision> {
        match state.text(Field::UserDecision)? {
            "proceed" => Some(Decision::Proceed),
            "stop" => Some(Decision::Stop),
            "guidance" => Some(Decision::Guidance(
                state.text_or_empty(Field::UserGuidance).to_string(),
            )),
            _ => None,
        }
    }
}
