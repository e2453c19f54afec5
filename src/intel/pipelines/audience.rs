// SPDX-License-Identifier: MIT

//! Audience-strategy pipeline (phase 2)
//!
//! audience_cep_analyzer → audience_data_extractor → build_strategic_table →
//! generate_strategic_insights → audience_slide_builder → compile, with a
//! fixed error terminal writing `final_output`.
//!
//! Seeded with `competitive_tables` and `competitive_dynamics` from phase 1
//! (checkpoint guidance, when given, is appended to the dynamics text by the
//! master workflow before the pipeline starts).

use crate::flow::{Field, FlowError, FnStep, GraphError, Pipeline, Step, WorkflowState};
use crate::intel::config::Config;
use crate::intel::executor::{ChatExecutor, TaskExecutor, TimedExecutor};
use crate::intel::extract;
use crate::intel::tools::{catalog, ToolInvoker};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

const TABLE_PROFILE: &str = "Build the strategic audience-CEP-creative markdown table \
(columns: Audience Segment, Key Attributes, Priority CEPs, Creative Ideas, Competitor Brands) \
from the provided audience and competitive data, naming the actual competitor brands per CEP. \
Close with a below-threshold CEP section listing the competitors beating the brand.";

const INSIGHTS_PROFILE: &str = "Generate strategic insights per audience segment from the \
provided table and data: audience overview, CEP strategy, creative opportunities, and \
implications, plus an overall summary highlighting below-threshold CEPs.";

/// The five delegating executors of the pipeline
pub struct AudienceExecutors {
    pub cep_analyzer: Arc<dyn TaskExecutor>,
    pub data_extractor: Arc<dyn TaskExecutor>,
    pub table_builder: Arc<dyn TaskExecutor>,
    pub insights_generator: Arc<dyn TaskExecutor>,
    pub slide_builder: Arc<dyn TaskExecutor>,
}

/// Identifies priority CEPs per audience segment
struct AudienceCepAnalyzer {
    exec: Arc<dyn TaskExecutor>,
}

#[async_trait]
impl Step for AudienceCepAnalyzer {
    fn name(&self) -> &str {
        "audience_cep_analyzer"
    }

    fn writes(&self) -> &[Field] {
        &[Field::AudienceSegments, Field::PriorityCeps]
    }

    async fn apply(&self, state: WorkflowState) -> Result<WorkflowState, FlowError> {
        let output = self.exec.execute("Analyze audience CEP priorities").await?;
        let priority_tables = extract::joined_table_blocks(&output);
        Ok(state
            .with_text(Field::AudienceSegments, output)
            .with_text(Field::PriorityCeps, priority_tables))
    }
}

/// Pulls attribute index reports for each audience
struct AudienceDataExtractor {
    exec: Arc<dyn TaskExecutor>,
}

#[async_trait]
impl Step for AudienceDataExtractor {
    fn name(&self) -> &str {
        "audience_data_extractor"
    }

    fn writes(&self) -> &[Field] {
        &[Field::AudienceAttributes]
    }

    async fn apply(&self, state: WorkflowState) -> Result<WorkflowState, FlowError> {
        let output = self.exec.execute("Use tool").await?;
        Ok(state.with_text(Field::AudienceAttributes, output))
    }
}

/// Builds the audience-CEP-creative table with per-CEP competitors
struct BuildStrategicTable {
    exec: Arc<dyn TaskExecutor>,
}

#[async_trait]
impl Step for BuildStrategicTable {
    fn name(&self) -> &str {
        "build_strategic_table"
    }

    fn reads(&self) -> &[Field] {
        &[
            Field::AudienceSegments,
            Field::PriorityCeps,
            Field::AudienceAttributes,
            Field::CompetitiveTables,
            Field::CompetitiveDynamics,
        ]
    }

    fn writes(&self) -> &[Field] {
        &[Field::StrategicTable, Field::BelowThresholdAnalysis]
    }

    async fn apply(&self, state: WorkflowState) -> Result<WorkflowState, FlowError> {
        let input = format!(
            "Build the strategic table using:\n\n\
AUDIENCE SEGMENTS & CEP PRIORITIES:\n{segments}\n{priorities}\n\n\
AUDIENCE ATTRIBUTES:\n{attributes}\n\n\
COMPETITIVE DATA FROM PHASE 1:\n{tables}\n\n\
DETAILED CEP ANALYSIS:\n{dynamics}",
            segments = state.text_or_empty(Field::AudienceSegments),
            priorities = state.text_or_empty(Field::PriorityCeps),
            attributes = state.text_or_empty(Field::AudienceAttributes),
            tables = state.text_or_empty(Field::CompetitiveTables),
            dynamics = state.text_or_empty(Field::CompetitiveDynamics),
        );
        let output = self.exec.execute(&input).await?;

        // The whole response stands in when no table block is marked.
        let table = extract::first_table_block(&output).unwrap_or_else(|| output.clone());
        let below = extract::below_threshold_section(&output).unwrap_or_default();
        Ok(state
            .with_text(Field::StrategicTable, table)
            .with_text(Field::BelowThresholdAnalysis, below))
    }
}

/// Narrates segment-level strategy from the table
struct GenerateStrategicInsights {
    exec: Arc<dyn TaskExecutor>,
}

#[async_trait]
impl Step for GenerateStrategicInsights {
    fn name(&self) -> &str {
        "generate_strategic_insights"
    }

    fn reads(&self) -> &[Field] {
        &[
            Field::StrategicTable,
            Field::BelowThresholdAnalysis,
            Field::AudienceSegments,
            Field::AudienceAttributes,
            Field::CompetitiveDynamics,
        ]
    }

    fn writes(&self) -> &[Field] {
        &[Field::StrategicInsights]
    }

    async fn apply(&self, state: WorkflowState) -> Result<WorkflowState, FlowError> {
        let input = format!(
            "Generate strategic insights based on:\n\n\
STRATEGIC TABLE:\n{table}\n\n\
BELOW THRESHOLD ANALYSIS:\n{below}\n\n\
AUDIENCE DATA:\n{segments}\n{attributes}\n\n\
COMPETITIVE CONTEXT:\n{dynamics}",
            table = state.text_or_empty(Field::StrategicTable),
            below = state.text_or_empty(Field::BelowThresholdAnalysis),
            segments = state.text_or_empty(Field::AudienceSegments),
            attributes = state.text_or_empty(Field::AudienceAttributes),
            dynamics = state.text_or_empty(Field::CompetitiveDynamics),
        );
        let output = self.exec.execute(&input).await?;
        Ok(state.with_text(Field::StrategicInsights, output))
    }
}

/// Turns the table into the strategy deck
struct AudienceSlideBuilder {
    exec: Arc<dyn TaskExecutor>,
}

#[async_trait]
impl Step for AudienceSlideBuilder {
    fn name(&self) -> &str {
        "audience_slide_builder"
    }

    fn reads(&self) -> &[Field] {
        &[
            Field::StrategicTable,
            Field::BelowThresholdAnalysis,
            Field::AudienceAttributes,
        ]
    }

    fn writes(&self) -> &[Field] {
        &[Field::PowerpointUrl]
    }

    async fn apply(&self, state: WorkflowState) -> Result<WorkflowState, FlowError> {
        let input = format!(
            "Create the presentation from this content:\n\n\
TABLE:\n{table}\n\n\
BELOW THRESHOLD ANALYSIS:\n{below}\n\n\
TARGET EXPLORATION:\n{attributes}",
            table = state.text_or_empty(Field::StrategicTable),
            below = state.text_or_empty(Field::BelowThresholdAnalysis),
            attributes = state.text_or_empty(Field::AudienceAttributes),
        );
        let output = self.exec.execute(&input).await?;

        Ok(state.with_text(
            Field::PowerpointUrl,
            extract::first_deck_url(&output).unwrap_or_default(),
        ))
    }
}

fn compile_output(state: WorkflowState) -> Result<WorkflowState, FlowError> {
    let output = format!(
        "# Audience-to-Creative Strategy Analysis\n\n\
## Overview\n\
Audience segments are mapped to their priority Category Entry Points with \
creative recommendations grounded in audience attributes and competitive \
dynamics.\n\n\
**Presentation:** {deck}\n\n\
---\n\n\
## Target Exploration: Audience Attributes\n\n\
{attributes}\n\n\
---\n\n\
## Strategic Audience-CEP-Creative Table\n\n\
{table}\n\n\
**Below-threshold CEPs requiring attention:**\n{below}\n\n\
---\n\n\
## Strategic Insights by Audience Segment\n\n\
{insights}",
        deck = state.text_or_empty(Field::PowerpointUrl),
        attributes = state.text_or_empty(Field::AudienceAttributes),
        table = state.text_or_empty(Field::StrategicTable),
        below = state.text_or_empty(Field::BelowThresholdAnalysis),
        insights = state.text_or_empty(Field::StrategicInsights),
    );

    Ok(state.with_text(Field::FinalOutput, output))
}

fn failure_output(state: WorkflowState) -> Result<WorkflowState, FlowError> {
    let message = format!(
        "Error occurred: {}",
        state.error().unwrap_or("unknown error")
    );
    Ok(state.with_text(Field::FinalOutput, message))
}

/// Assemble the pipeline around the given executors
pub fn pipeline(executors: AudienceExecutors) -> Result<Pipeline, GraphError> {
    let steps: Vec<Arc<dyn Step>> = vec![
        Arc::new(AudienceCepAnalyzer {
            exec: executors.cep_analyzer,
        }),
        Arc::new(AudienceDataExtractor {
            exec: executors.data_extractor,
        }),
        Arc::new(BuildStrategicTable {
            exec: executors.table_builder,
        }),
        Arc::new(GenerateStrategicInsights {
            exec: executors.insights_generator,
        }),
        Arc::new(AudienceSlideBuilder {
            exec: executors.slide_builder,
        }),
        Arc::new(FnStep::new(
            "compile",
            &[
                Field::PowerpointUrl,
                Field::AudienceAttributes,
                Field::StrategicTable,
                Field::BelowThresholdAnalysis,
                Field::StrategicInsights,
            ],
            &[Field::FinalOutput],
            compile_output,
        )),
    ];

    Pipeline::new(
        "audience_strategy",
        steps,
        Arc::new(FnStep::new(
            "error",
            &[Field::Error],
            &[Field::FinalOutput],
            failure_output,
        )),
    )
}

/// Production wiring: toolbox-backed and chat-backed executors under the
/// configured deadline
pub fn production_pipeline(
    config: &Config,
    primary: &Arc<ToolInvoker>,
    secondary: &Arc<ToolInvoker>,
) -> Result<Pipeline, FlowError> {
    let timeout = Duration::from_secs(config.step_timeout_secs);
    let timed = |exec: Arc<dyn TaskExecutor>| -> Arc<dyn TaskExecutor> {
        Arc::new(TimedExecutor::new(exec, timeout))
    };

    let executors = AudienceExecutors {
        cep_analyzer: timed(Arc::new(catalog::AudienceCepPriorities::new(
            primary.clone(),
        ))),
        data_extractor: timed(Arc::new(catalog::DemoAudiences::new(secondary.clone()))),
        table_builder: timed(Arc::new(ChatExecutor::new(
            "build_strategic_table",
            TABLE_PROFILE,
            config,
        )?)),
        insights_generator: timed(Arc::new(ChatExecutor::new(
            "generate_strategic_insights",
            INSIGHTS_PROFILE,
            config,
        )?)),
        slide_builder: timed(Arc::new(catalog::BuildAudienceSlides::new(primary.clone()))),
    };

    Ok(pipeline(executors)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intel::testing::{failing, fixed};

    fn executors() -> AudienceExecutors {
        AudienceExecutors {
            cep_analyzer: fixed(
                "audience_cep_analyzer",
                "Priorities:\n\n| Segment | CEP |\n| SWITCH | Sharing Moment |\n\nNarrative.",
            ),
            data_extractor: fixed("audience_data_extractor", "SWITCH: deal-driven, index 140"),
            table_builder: fixed(
                "build_strategic_table",
                "| Audience | CEP | Ideas |\n| SWITCH | Sharing Moment | BOGO |\n\nBelow Threshold CEPs:\n- Feel Better: Twix (142)",
            ),
            insights_generator: fixed("generate_strategic_insights", "SWITCH wants deals."),
            slide_builder: fixed(
                "audience_slide_builder",
                "Ready: https://cdn.example.com/audience.pptx",
            ),
        }
    }

    fn seeded_state() -> WorkflowState {
        WorkflowState::empty()
            .with_text(Field::CompetitiveTables, "| CEP | Index |")
            .with_text(Field::CompetitiveDynamics, "Twix leads gifting.")
    }

    #[tokio::test]
    async fn test_full_run_compiles_output() {
        let pipeline = pipeline(executors()).unwrap();
        let out = pipeline.run(seeded_state()).await;

        assert!(out.error().is_none());
        let output = out.text(Field::FinalOutput).unwrap();
        assert!(output.contains("https://cdn.example.com/audience.pptx"));
        assert!(output.contains("| SWITCH | Sharing Moment | BOGO |"));
        assert!(output.contains("Feel Better: Twix (142)"));
        assert!(output.contains("SWITCH wants deals."));
    }

    #[tokio::test]
    async fn test_below_threshold_section_extracted() {
        let pipeline = pipeline(executors()).unwrap();
        let out = pipeline.run(seeded_state()).await;

        let below = out.text(Field::BelowThresholdAnalysis).unwrap();
        assert!(below.starts_with("Below Threshold CEPs:"));
    }

    #[tokio::test]
    async fn test_failure_produces_failure_output() {
        let mut execs = executors();
        execs.table_builder = failing("build_strategic_table", "chat API error");

        let pipeline = pipeline(execs).unwrap();
        let out = pipeline.run(seeded_state()).await;

        let output = out.text(Field::FinalOutput).unwrap();
        assert!(output.starts_with("Error occurred:"));
        assert!(output.contains("chat API error"));
    }

    #[test]
    fn test_declared_reads_are_satisfied_in_order() {
        let pipeline = pipeline(executors()).unwrap();
        crate::intel::testing::assert_reads_satisfied(
            &pipeline,
            &[Field::CompetitiveTables, Field::CompetitiveDynamics],
        );
    }
}
