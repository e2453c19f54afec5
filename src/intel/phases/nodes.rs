// SPDX-License-Identifier: MIT

//! Master-graph nodes
//!
//! Thin adapters between the master workflow's state and the two
//! sub-pipelines, plus the checkpoint bookkeeping around the interrupt
//! point. Each sub-pipeline runs against its own fresh state; only the
//! declared fields cross the boundary.

use crate::flow::{BranchLabel, Field, FlowError, Message, Phase, Pipeline, Step, WorkflowState};
use crate::intel::decision::{classify, Decision};
use async_trait::async_trait;
use std::sync::Arc;

pub const PHASE1: &str = "phase1";
pub const PRESENT_CHECKPOINT: &str = "present_checkpoint";
pub const PROCESS_USER_INPUT: &str = "process_user_input";
pub const PHASE2: &str = "phase2";
pub const DELIVER_FINAL: &str = "deliver_final";

/// Runs the competitive-analysis pipeline and lifts its outputs into the
/// master state. Always advances to the checkpoint, error or not, so the
/// caller can see what happened.
pub struct RunPhase1 {
    pipeline: Arc<Pipeline>,
}

impl RunPhase1 {
    pub fn new(pipeline: Arc<Pipeline>) -> Self {
        Self { pipeline }
    }
}

#[async_trait]
impl Step for RunPhase1 {
    fn name(&self) -> &str {
        PHASE1
    }

    fn writes(&self) -> &[Field] {
        &[
            Field::CompetitiveIntelligence,
            Field::CepTables,
            Field::CepAnalysis,
            Field::Error,
        ]
    }

    async fn apply(&self, state: WorkflowState) -> Result<WorkflowState, FlowError> {
        let result = self.pipeline.run(WorkflowState::empty()).await;

        let report = result.text_or_empty(Field::FinalReport).to_string();
        let mut next = state
            .with_text(Field::CompetitiveIntelligence, report.clone())
            .with_text(
                Field::CepTables,
                result.text_or_empty(Field::CepTables),
            )
            .with_text(
                Field::CepAnalysis,
                result.text_or_empty(Field::CepAnalysis),
            )
            .with_message(Message::assistant(report))
            .with_phase(Phase::Checkpoint);

        if let Some(error) = result.error() {
            next = next.with_error(format!("Phase 1 failed: {}", error));
        }
        Ok(next)
    }
}

/// Formats the checkpoint message. The node itself does not suspend; the
/// engine suspends immediately before the next node.
pub fn present_checkpoint(state: WorkflowState) -> Result<WorkflowState, FlowError> {
    let message = format!(
        "# Phase 1 Complete: Competitive Intelligence Report\n\n\
{report}\n\n\
---\n\n\
## Checkpoint: Review and Confirm\n\n\
Before phase 2 (audience & creative strategy analysis) begins, please reply with:\n\
- \"proceed\" or \"continue\" to move to phase 2\n\
- \"stop\" to end here\n\
- any specific guidance you would like incorporated into the final synthesis",
        report = state.text_or_empty(Field::CompetitiveIntelligence),
    );

    Ok(state
        .with_text(Field::CheckpointMessage, message.clone())
        .with_message(Message::assistant(message)))
}

/// Classifies the most recent human message. Runs after resume.
pub fn process_user_input(state: WorkflowState) -> Result<WorkflowState, FlowError> {
    let input = state
        .last_human_message()
        .map(|m| m.content.clone())
        .unwrap_or_default();

    let decision = classify(&input);
    let next_phase = match decision {
        Decision::Stop => Phase::Complete,
        _ => Phase::Phase2,
    };

    let mut next = state.with_text(Field::UserDecision, decision.as_str());
    if let Decision::Guidance(text) = &decision {
        next = next.with_text(Field::UserGuidance, text.clone());
    }
    Ok(next.with_phase(next_phase))
}

/// Route after the checkpoint decision: stop finishes, anything else
/// (including no recorded decision) advances to phase 2.
pub fn route_after_checkpoint(state: &WorkflowState) -> BranchLabel {
    match Decision::from_state(state) {
        Some(Decision::Stop) => BranchLabel::Finish,
        _ => BranchLabel::Advance,
    }
}

/// Runs the audience-strategy pipeline with phase-1 byproducts (and any
/// guidance) as its seed.
pub struct RunPhase2 {
    pipeline: Arc<Pipeline>,
}

impl RunPhase2 {
    pub fn new(pipeline: Arc<Pipeline>) -> Self {
        Self { pipeline }
    }
}

#[async_trait]
impl Step for RunPhase2 {
    fn name(&self) -> &str {
        PHASE2
    }

    fn reads(&self) -> &[Field] {
        &[Field::CepTables, Field::CepAnalysis, Field::UserGuidance]
    }

    fn writes(&self) -> &[Field] {
        &[Field::CreativeIntelligence, Field::Error]
    }

    async fn apply(&self, state: WorkflowState) -> Result<WorkflowState, FlowError> {
        let mut dynamics = state.text_or_empty(Field::CepAnalysis).to_string();
        if let Some(guidance) = state.text(Field::UserGuidance) {
            dynamics.push_str(&format!("\n\nUser Guidance: {}", guidance));
        }

        let seed = WorkflowState::empty()
            .with_text(
                Field::CompetitiveTables,
                state.text_or_empty(Field::CepTables),
            )
            .with_text(Field::CompetitiveDynamics, dynamics);

        let result = self.pipeline.run(seed).await;

        let output = result.text_or_empty(Field::FinalOutput).to_string();
        let mut next = state
            .with_text(Field::CreativeIntelligence, output.clone())
            .with_message(Message::assistant(format!(
                "Phase 2 Complete:\n\n{}",
                output
            )))
            .with_phase(Phase::Complete);

        if let Some(error) = result.error() {
            next = next.with_error(format!("Phase 2 failed: {}", error));
        }
        Ok(next)
    }
}

/// Composes exactly one of three final messages from the decision and error
/// fields, and closes the session's phase.
pub fn deliver_final(state: WorkflowState) -> Result<WorkflowState, FlowError> {
    let message = if matches!(Decision::from_state(&state), Some(Decision::Stop)) {
        "## Workflow Stopped\n\n\
Phase 1 (competitive intelligence) has been completed.\n\
Phase 2 was not executed per your request.\n\n\
The competitive analysis is available above for your reference."
            .to_string()
    } else if let Some(error) = state.error() {
        format!(
            "## Workflow Error\n\n\
An error occurred during execution:\n{}\n\n\
Please retry the request or contact support if the issue persists.",
            error
        )
    } else {
        "## Strategic Intelligence Report Complete\n\n\
Both phases have been executed:\n\n\
- Phase 1: competitive intelligence report\n\
- Phase 2: audience-to-creative strategy analysis\n\n\
The complete phase 2 output has been delivered above."
            .to_string()
    };

    Ok(state
        .with_text(Field::FinalSummary, message.clone())
        .with_message(Message::assistant(message))
        .with_phase(Phase::Complete))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_present_checkpoint_embeds_report() {
        let state =
            WorkflowState::empty().with_text(Field::CompetitiveIntelligence, "THE REPORT");
        let out = present_checkpoint(state).unwrap();

        let message = out.text(Field::CheckpointMessage).unwrap();
        assert!(message.contains("THE REPORT"));
        assert!(message.contains("\"proceed\""));
        assert_eq!(out.messages().last().unwrap().content, message);
    }

    #[test]
    fn test_process_user_input_proceed() {
        let state = WorkflowState::started("go").with_message(Message::human("Proceed"));
        let out = process_user_input(state).unwrap();

        assert_eq!(out.text(Field::UserDecision), Some("proceed"));
        assert_eq!(out.phase(), Phase::Phase2);
        assert!(out.text(Field::UserGuidance).is_none());
    }

    #[test]
    fn test_process_user_input_stop() {
        let state = WorkflowState::started("go").with_message(Message::human("stop"));
        let out = process_user_input(state).unwrap();

        assert_eq!(out.text(Field::UserDecision), Some("stop"));
        assert_eq!(out.phase(), Phase::Complete);
    }

    #[test]
    fn test_process_user_input_guidance() {
        let state = WorkflowState::started("go")
            .with_message(Message::human("focus on the Switch segment"));
        let out = process_user_input(state).unwrap();

        assert_eq!(out.text(Field::UserDecision), Some("guidance"));
        assert_eq!(
            out.text(Field::UserGuidance),
            Some("focus on the switch segment")
        );
        assert_eq!(out.phase(), Phase::Phase2);
    }

    #[test]
    fn test_route_stop_finishes_everything_else_advances() {
        let stop = WorkflowState::empty().with_text(Field::UserDecision, "stop");
        assert_eq!(route_after_checkpoint(&stop), BranchLabel::Finish);

        let guidance = WorkflowState::empty()
            .with_text(Field::UserDecision, "guidance")
            .with_text(Field::UserGuidance, "emphasize gifting");
        assert_eq!(route_after_checkpoint(&guidance), BranchLabel::Advance);

        // Default when nothing was recorded
        assert_eq!(
            route_after_checkpoint(&WorkflowState::empty()),
            BranchLabel::Advance
        );
    }

    #[test]
    fn test_deliver_final_stopped() {
        let state = WorkflowState::empty().with_text(Field::UserDecision, "stop");
        let out = deliver_final(state).unwrap();
        assert!(out
            .text(Field::FinalSummary)
            .unwrap()
            .contains("Workflow Stopped"));
    }

    #[test]
    fn test_deliver_final_errored() {
        let state = WorkflowState::empty().with_error("Phase 1 failed: boom");
        let out = deliver_final(state).unwrap();
        let summary = out.text(Field::FinalSummary).unwrap();
        assert!(summary.contains("Workflow Error"));
        assert!(summary.contains("boom"));
    }

    #[test]
    fn test_deliver_final_complete() {
        let out = deliver_final(WorkflowState::empty()).unwrap();
        assert!(out
            .text(Field::FinalSummary)
            .unwrap()
            .contains("Report Complete"));
        assert_eq!(out.phase(), Phase::Complete);
    }

    #[test]
    fn test_stop_outranks_error_in_final_message() {
        // A stopped run that also carries an error reports the stop; the
        // error stays visible in the status error field.
        let state = WorkflowState::empty()
            .with_text(Field::UserDecision, "stop")
            .with_error("Phase 1 failed: boom");
        let out = deliver_final(state).unwrap();
        assert!(out
            .text(Field::FinalSummary)
            .unwrap()
            .contains("Workflow Stopped"));
    }
}
