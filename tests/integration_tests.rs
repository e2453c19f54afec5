//! End-to-end tests for the master workflow
//!
//! These drive the phase controller through trigger → checkpoint → resume
//! with mock executors standing in for the remote toolbox and chat services.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use stratflow_rs::flow::{FlowError, Phase, SessionStatus, SessionStore};
use stratflow_rs::intel::decision::{classify, Decision};
use stratflow_rs::intel::executor::TaskExecutor;
use stratflow_rs::intel::phases::{PhaseController, DEFAULT_TRIGGER};
use stratflow_rs::intel::pipelines::audience::{self, AudienceExecutors};
use stratflow_rs::intel::pipelines::competitive::{self, CompetitiveExecutors};

// ============================================================================
// Mock Components
// ============================================================================

type CallLog = Arc<Mutex<Vec<(String, String)>>>;

/// Mock executor that records its invocation (name and input) and returns a
/// fixed response
struct RecordingExecutor {
    name: String,
    response: String,
    calls: CallLog,
}

impl RecordingExecutor {
    fn new(name: &str, response: &str, calls: &CallLog) -> Arc<dyn TaskExecutor> {
        Arc::new(Self {
            name: name.to_string(),
            response: response.to_string(),
            calls: calls.clone(),
        })
    }
}

#[async_trait]
impl TaskExecutor for RecordingExecutor {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, input: &str) -> Result<String, FlowError> {
        self.calls
            .lock()
            .unwrap()
            .push((self.name.clone(), input.to_string()));
        Ok(self.response.clone())
    }
}

/// Mock executor that always fails
struct FailingExecutor {
    name: String,
}

impl FailingExecutor {
    fn new(name: &str) -> Arc<dyn TaskExecutor> {
        Arc::new(Self {
            name: name.to_string(),
        })
    }
}

#[async_trait]
impl TaskExecutor for FailingExecutor {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, _input: &str) -> Result<String, FlowError> {
        Err(FlowError::execution(&self.name, "injected failure"))
    }
}

fn competitive_executors(calls: &CallLog) -> CompetitiveExecutors {
    CompetitiveExecutors {
        data_merger: RecordingExecutor::new(
            "data_merger",
            r#"PNG Table URL: https://cdn.example.com/table.png
{"cep_data": [{"cep": "Movie Night", "brand_index": 130, "competitor_indices": {"Twix": 125}}]}"#,
            calls,
        ),
        cep_prioritizer: RecordingExecutor::new(
            "cep_prioritizer",
            "## Clusters\n\n| CEP | Cluster |\n| Movie Night | Winning |\n\nTwix leads gifting.",
            calls,
        ),
        insight_analyzer: RecordingExecutor::new(
            "insight_analyzer",
            r#"["A - one.", "B - two.", "C - three.", "D - four."]"#,
            calls,
        ),
        index_visualizer: RecordingExecutor::new(
            "index_visualizer",
            "https://cdn.example.com/scatter.png https://cdn.example.com/scatter.pdf",
            calls,
        ),
        slide_builder: RecordingExecutor::new(
            "slide_builder",
            "Slide ready: https://cdn.example.com/cep.pptx",
            calls,
        ),
    }
}

fn audience_executors(calls: &CallLog) -> AudienceExecutors {
    AudienceExecutors {
        cep_analyzer: RecordingExecutor::new(
            "audience_cep_analyzer",
            "| Segment | CEP |\n| SWITCH | Sharing Moment |",
            calls,
        ),
        data_extractor: RecordingExecutor::new(
            "audience_data_extractor",
            "SWITCH: deal-driven shoppers",
            calls,
        ),
        table_builder: RecordingExecutor::new(
            "build_strategic_table",
            "| Audience | CEP |\n| SWITCH | Sharing Moment |\n\nBelow Threshold CEPs: Feel Better",
            calls,
        ),
        insights_generator: RecordingExecutor::new(
            "generate_strategic_insights",
            "SWITCH responds to deals.",
            calls,
        ),
        slide_builder: RecordingExecutor::new(
            "audience_slide_builder",
            "Deck: https://cdn.example.com/audience.pptx",
            calls,
        ),
    }
}

/// Controller with recording executors; returns both phases' call logs
fn controller() -> (Arc<PhaseController>, CallLog, CallLog) {
    let phase1_calls: CallLog = Arc::new(Mutex::new(Vec::new()));
    let phase2_calls: CallLog = Arc::new(Mutex::new(Vec::new()));
    let controller = controller_with(
        competitive_executors(&phase1_calls),
        audience_executors(&phase2_calls),
    );
    (controller, phase1_calls, phase2_calls)
}

fn controller_with(
    phase1: CompetitiveExecutors,
    phase2: AudienceExecutors,
) -> Arc<PhaseController> {
    let store = Arc::new(SessionStore::new());
    Arc::new(
        PhaseController::new(
            competitive::pipeline(phase1).expect("phase 1 pipeline"),
            audience::pipeline(phase2).expect("phase 2 pipeline"),
            store,
        )
        .expect("controller"),
    )
}

// ============================================================================
// Session Identity
// ============================================================================

#[tokio::test]
async fn test_concurrent_triggers_mint_distinct_sessions() {
    let (controller, _, _) = controller();

    let mut handles = Vec::new();
    for _ in 0..16 {
        let controller = controller.clone();
        handles.push(tokio::spawn(async move {
            let id = PhaseController::mint_session_id();
            controller.trigger(&id, DEFAULT_TRIGGER).await.unwrap();
            id
        }));
    }

    let mut ids = Vec::new();
    for handle in handles {
        ids.push(handle.await.unwrap());
    }

    let mut deduped = ids.clone();
    deduped.sort();
    deduped.dedup();
    assert_eq!(deduped.len(), 16, "session ids must be distinct");
    assert_eq!(controller.list().await.len(), 16);
}

// ============================================================================
// Resume Preconditions
// ============================================================================

#[tokio::test]
async fn test_resume_unknown_session_is_not_found() {
    let (controller, _, _) = controller();
    let result = controller.resume("no-such-session", "proceed").await;
    assert!(matches!(result, Err(FlowError::State(_))));
}

#[tokio::test]
async fn test_resume_non_checkpoint_session_conflicts_and_preserves_state() {
    let (controller, _, _) = controller();
    let id = PhaseController::mint_session_id();

    controller.trigger(&id, DEFAULT_TRIGGER).await.unwrap();
    controller.resume(&id, "stop").await.unwrap();

    // Session is completed now; a second resume must be rejected...
    let before = serde_json::to_string(&controller.status(&id).await.unwrap()).unwrap();
    let result = controller.resume(&id, "proceed").await;
    assert!(matches!(result, Err(FlowError::Validation(_))));

    // ...and must not have touched the state.
    let after = serde_json::to_string(&controller.status(&id).await.unwrap()).unwrap();
    assert_eq!(before, after);
}

// ============================================================================
// Decision Classification
// ============================================================================

#[test]
fn test_decision_classification_is_pure_and_total() {
    assert_eq!(classify("proceed"), Decision::Proceed);
    assert_eq!(classify("Stop please"), Decision::Stop);
    assert_eq!(
        classify("focus on the Switch segment"),
        Decision::Guidance("focus on the switch segment".to_string())
    );
}

// ============================================================================
// End-to-End Runs
// ============================================================================

#[tokio::test]
async fn test_end_to_end_proceed_run() {
    let (controller, _, phase2_calls) = controller();
    let id = PhaseController::mint_session_id();

    controller.trigger(&id, DEFAULT_TRIGGER).await.unwrap();

    let snapshot = controller.status(&id).await.unwrap();
    assert_eq!(snapshot.status, SessionStatus::Checkpoint);
    assert_eq!(snapshot.current_phase, Phase::Checkpoint);
    let checkpoint_message = snapshot.checkpoint_message.unwrap();
    assert!(!checkpoint_message.is_empty());
    // The checkpoint embeds the phase-1 report
    assert!(checkpoint_message.contains("Competitive Analysis Report"));
    assert!(checkpoint_message.contains("| Movie Night | Winning |"));
    assert!(phase2_calls.lock().unwrap().is_empty());

    controller.resume(&id, "proceed").await.unwrap();

    let snapshot = controller.status(&id).await.unwrap();
    assert_eq!(snapshot.status, SessionStatus::Completed);
    assert_eq!(snapshot.current_phase, Phase::Complete);
    let phase2_output = snapshot.phase2_output.unwrap();
    assert!(phase2_output.contains("https://cdn.example.com/audience.pptx"));
    assert!(snapshot.error.is_none());

    // Phase-2 steps ran in declared order
    let order: Vec<String> = phase2_calls
        .lock()
        .unwrap()
        .iter()
        .map(|(name, _)| name.clone())
        .collect();
    assert_eq!(
        order,
        vec![
            "audience_cep_analyzer",
            "audience_data_extractor",
            "build_strategic_table",
            "generate_strategic_insights",
            "audience_slide_builder",
        ]
    );
}

#[tokio::test]
async fn test_end_to_end_stop_run() {
    let (controller, _, phase2_calls) = controller();
    let id = PhaseController::mint_session_id();

    controller.trigger(&id, DEFAULT_TRIGGER).await.unwrap();
    controller.resume(&id, "stop").await.unwrap();

    let snapshot = controller.status(&id).await.unwrap();
    assert_eq!(snapshot.status, SessionStatus::Completed);
    let phase2_output = snapshot.phase2_output.unwrap();
    assert!(phase2_output.contains("Phase 2 was not executed"));

    // No phase-2 step was ever invoked
    assert!(phase2_calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_guidance_is_forwarded_into_phase2_input() {
    let (controller, _, phase2_calls) = controller();
    let id = PhaseController::mint_session_id();

    controller.trigger(&id, DEFAULT_TRIGGER).await.unwrap();
    controller
        .resume(&id, "emphasize the gifting angle")
        .await
        .unwrap();

    let snapshot = controller.status(&id).await.unwrap();
    assert_eq!(snapshot.status, SessionStatus::Completed);

    let calls = phase2_calls.lock().unwrap();
    let (_, table_input) = calls
        .iter()
        .find(|(name, _)| name == "build_strategic_table")
        .expect("strategic table step ran");
    assert!(table_input.contains("User Guidance: emphasize the gifting angle"));
}

// ============================================================================
// Error Containment
// ============================================================================

#[tokio::test]
async fn test_phase1_failure_still_reaches_checkpoint_and_phase2() {
    // Inject a failure into each phase-1 step in turn; the master flow must
    // reach the checkpoint every time, and a subsequent proceed must still
    // attempt phase 2.
    for failing_slot in 0..5 {
        let phase1_calls: CallLog = Arc::new(Mutex::new(Vec::new()));
        let phase2_calls: CallLog = Arc::new(Mutex::new(Vec::new()));

        let mut execs = competitive_executors(&phase1_calls);
        match failing_slot {
            0 => execs.data_merger = FailingExecutor::new("data_merger"),
            1 => execs.cep_prioritizer = FailingExecutor::new("cep_prioritizer"),
            2 => execs.insight_analyzer = FailingExecutor::new("insight_analyzer"),
            3 => execs.index_visualizer = FailingExecutor::new("index_visualizer"),
            _ => execs.slide_builder = FailingExecutor::new("slide_builder"),
        }

        let controller = controller_with(execs, audience_executors(&phase2_calls));
        let id = PhaseController::mint_session_id();
        controller.trigger(&id, DEFAULT_TRIGGER).await.unwrap();

        let snapshot = controller.status(&id).await.unwrap();
        assert_eq!(
            snapshot.status,
            SessionStatus::Checkpoint,
            "failing slot {} must still reach the checkpoint",
            failing_slot
        );
        let report = snapshot.phase1_output.unwrap();
        assert!(
            report.contains("injected failure"),
            "failure report must carry the error text"
        );
        assert!(snapshot.error.unwrap().contains("Phase 1 failed"));

        controller.resume(&id, "proceed").await.unwrap();
        assert!(
            !phase2_calls.lock().unwrap().is_empty(),
            "phase 2 must still be attempted after a contained phase-1 failure"
        );

        let final_snapshot = controller.status(&id).await.unwrap();
        assert_eq!(final_snapshot.status, SessionStatus::Completed);
    }
}

// ============================================================================
// Snapshot Idempotence
// ============================================================================

#[tokio::test]
async fn test_status_queries_are_idempotent() {
    let (controller, _, _) = controller();
    let id = PhaseController::mint_session_id();

    controller.trigger(&id, DEFAULT_TRIGGER).await.unwrap();

    let first = serde_json::to_string(&controller.status(&id).await.unwrap()).unwrap();
    let second = serde_json::to_string(&controller.status(&id).await.unwrap()).unwrap();
    assert_eq!(first, second);
}
