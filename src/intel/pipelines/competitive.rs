// SPDX-License-Identifier: MIT

//! Competitive-analysis pipeline (phase 1)
//!
//! data_merger → cep_prioritizer → insight_analyzer → index_visualizer →
//! slide_builder → compile, with a fixed error terminal that writes the
//! failure report into `final_report`.

use crate::flow::{Field, FlowError, FnStep, GraphError, Pipeline, Step, WorkflowState};
use crate::intel::config::Config;
use crate::intel::executor::{ChatExecutor, TaskExecutor, TimedExecutor};
use crate::intel::extract;
use crate::intel::tools::{catalog, ToolInvoker};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Instruction profile for the insight analyzer's chat executor
const INSIGHT_PROFILE: &str = "Read the provided CEP analysis and extract its four main points \
as a JSON array of strings, each formatted as \"TITLE - analysis\". One insight must cover the \
white-space opportunities. Keep each analysis under 150 characters.";

/// The five delegating executors of the pipeline, injected so tests can
/// substitute mocks
pub struct CompetitiveExecutors {
    pub data_merger: Arc<dyn TaskExecutor>,
    pub cep_prioritizer: Arc<dyn TaskExecutor>,
    pub insight_analyzer: Arc<dyn TaskExecutor>,
    pub index_visualizer: Arc<dyn TaskExecutor>,
    pub slide_builder: Arc<dyn TaskExecutor>,
}

/// Retrieves the merged brand index data
struct DataMerger {
    exec: Arc<dyn TaskExecutor>,
}

#[async_trait]
impl Step for DataMerger {
    fn name(&self) -> &str {
        "data_merger"
    }

    fn writes(&self) -> &[Field] {
        &[Field::RawDataPngUrl, Field::RawDataJson]
    }

    async fn apply(&self, state: WorkflowState) -> Result<WorkflowState, FlowError> {
        let output = self.exec.execute("Use tool").await?;
        Ok(state
            .with_text(
                Field::RawDataPngUrl,
                extract::first_png_url(&output).unwrap_or_default(),
            )
            .with_field(
                Field::RawDataJson,
                extract::first_json_object(&output).unwrap_or(Value::Null),
            ))
    }
}

/// Clusters the raw data and narrates the strategic analysis
struct CepPrioritizer {
    exec: Arc<dyn TaskExecutor>,
}

#[async_trait]
impl Step for CepPrioritizer {
    fn name(&self) -> &str {
        "cep_prioritizer"
    }

    fn reads(&self) -> &[Field] {
        &[Field::RawDataJson]
    }

    fn writes(&self) -> &[Field] {
        &[Field::CepAnalysis, Field::CepTables]
    }

    async fn apply(&self, state: WorkflowState) -> Result<WorkflowState, FlowError> {
        let raw = state.field(Field::RawDataJson).cloned().unwrap_or(Value::Null);
        let input = format!("Analyze this CEP data: {}", raw);
        let output = self.exec.execute(&input).await?;

        let tables = extract::joined_table_blocks(&output);
        Ok(state
            .with_text(Field::CepAnalysis, output)
            .with_text(Field::CepTables, tables))
    }
}

/// Distills the analysis into four key insights
struct InsightAnalyzer {
    exec: Arc<dyn TaskExecutor>,
}

#[async_trait]
impl Step for InsightAnalyzer {
    fn name(&self) -> &str {
        "insight_analyzer"
    }

    fn reads(&self) -> &[Field] {
        &[Field::CepAnalysis]
    }

    fn writes(&self) -> &[Field] {
        &[Field::KeyInsights]
    }

    async fn apply(&self, state: WorkflowState) -> Result<WorkflowState, FlowError> {
        let input = format!(
            "Create 4 key insights from this analysis:\n\n{}",
            state.text_or_empty(Field::CepAnalysis)
        );
        let output = self.exec.execute(&input).await?;

        let insights = extract::parse_insights(&output);
        Ok(state.with_field(Field::KeyInsights, Value::from(insights)))
    }
}

/// Produces the index scatter plot
struct IndexVisualizer {
    exec: Arc<dyn TaskExecutor>,
}

#[async_trait]
impl Step for IndexVisualizer {
    fn name(&self) -> &str {
        "index_visualizer"
    }

    fn writes(&self) -> &[Field] {
        &[Field::VisualizationPngUrl, Field::VisualizationPdfUrl]
    }

    async fn apply(&self, state: WorkflowState) -> Result<WorkflowState, FlowError> {
        let output = self.exec.execute("Use tool").await?;
        Ok(state
            .with_text(
                Field::VisualizationPngUrl,
                extract::first_png_url(&output).unwrap_or_default(),
            )
            .with_text(
                Field::VisualizationPdfUrl,
                extract::first_pdf_url(&output).unwrap_or_default(),
            ))
    }
}

/// Builds the analysis slide from the chart and insights
struct SlideBuilder {
    exec: Arc<dyn TaskExecutor>,
}

#[async_trait]
impl Step for SlideBuilder {
    fn name(&self) -> &str {
        "slide_builder"
    }

    fn reads(&self) -> &[Field] {
        &[Field::VisualizationPngUrl, Field::KeyInsights]
    }

    fn writes(&self) -> &[Field] {
        &[Field::PowerpointUrl]
    }

    async fn apply(&self, state: WorkflowState) -> Result<WorkflowState, FlowError> {
        let insights = state
            .field(Field::KeyInsights)
            .cloned()
            .unwrap_or(Value::Array(vec![]));
        let input = format!(
            "Create a slide with:\n\nurl: {}\ninsights:\n{}",
            state.text_or_empty(Field::VisualizationPngUrl),
            insights
        );
        let output = self.exec.execute(&input).await?;

        Ok(state.with_text(
            Field::PowerpointUrl,
            extract::first_deck_url(&output).unwrap_or_default(),
        ))
    }
}

fn insight_lines(state: &WorkflowState) -> String {
    state
        .field(Field::KeyInsights)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(|insight| format!("- {}", insight))
                .collect::<Vec<_>>()
                .join("\n")
        })
        .unwrap_or_default()
}

fn compile_report(state: WorkflowState) -> Result<WorkflowState, FlowError> {
    let report = format!(
        "# Competitive Analysis Report: Category Entry Points\n\n\
## Overview\n\
Brand performance has been analyzed across Category Entry Points against the \
competitor set, with CEPs clustered by relative performance.\n\n\
---\n\n\
## Visual Outputs\n\n\
**Analysis Slide (link):** {deck}\n\n\
**CEP Competitive Landscape Table (PNG):** {table_png}\n\n\
---\n\n\
## Strategic Analysis\n\n\
{analysis}\n\n\
---\n\n\
## Key Insights\n\n\
{insights}\n\n\
---\n\n\
## Deliverables Summary\n\n\
- Performance clusters: White Space, Winning, Underperforming, Parity\n\
- Strategic recommendations: invest, test, develop, monitor\n\
- Visual outputs: analysis slide and landscape table",
        deck = state.text_or_empty(Field::PowerpointUrl),
        table_png = state.text_or_empty(Field::RawDataPngUrl),
        analysis = state.text_or_empty(Field::CepAnalysis),
        insights = insight_lines(&state),
    );

    Ok(state.with_text(Field::FinalReport, report))
}

fn failure_report(state: WorkflowState) -> Result<WorkflowState, FlowError> {
    let message = format!(
        "Error occurred: {}",
        state.error().unwrap_or("unknown error")
    );
    Ok(state.with_text(Field::FinalReport, message))
}

/// Assemble the pipeline around the given executors
pub fn pipeline(executors: CompetitiveExecutors) -> Result<Pipeline, GraphError> {
    let steps: Vec<Arc<dyn Step>> = vec![
        Arc::new(DataMerger {
            exec: executors.data_merger,
        }),
        Arc::new(CepPrioritizer {
            exec: executors.cep_prioritizer,
        }),
        Arc::new(InsightAnalyzer {
            exec: executors.insight_analyzer,
        }),
        Arc::new(IndexVisualizer {
            exec: executors.index_visualizer,
        }),
        Arc::new(SlideBuilder {
            exec: executors.slide_builder,
        }),
        Arc::new(FnStep::new(
            "compile",
            &[
                Field::PowerpointUrl,
                Field::RawDataPngUrl,
                Field::CepAnalysis,
                Field::KeyInsights,
            ],
            &[Field::FinalReport],
            compile_report,
        )),
    ];

    Pipeline::new(
        "competitive_analysis",
        steps,
        Arc::new(FnStep::new(
            "error",
            &[Field::Error],
            &[Field::FinalReport],
            failure_report,
        )),
    )
}

/// Production wiring: toolbox-backed and chat-backed executors, each under
/// the configured deadline
pub fn production_pipeline(
    config: &Config,
    primary: &Arc<ToolInvoker>,
    secondary: &Arc<ToolInvoker>,
) -> Result<Pipeline, FlowError> {
    let timeout = Duration::from_secs(config.step_timeout_secs);
    let timed = |exec: Arc<dyn TaskExecutor>| -> Arc<dyn TaskExecutor> {
        Arc::new(TimedExecutor::new(exec, timeout))
    };

    let executors = CompetitiveExecutors {
        data_merger: timed(Arc::new(catalog::MergeBrandIndices::new(primary.clone()))),
        cep_prioritizer: timed(Arc::new(catalog::AnalyzeCepPerformance::new(
            primary.clone(),
        ))),
        insight_analyzer: timed(Arc::new(ChatExecutor::new(
            "insight_analyzer",
            INSIGHT_PROFILE,
            config,
        )?)),
        index_visualizer: timed(Arc::new(catalog::CreateIndexVisual::new(secondary.clone()))),
        slide_builder: timed(Arc::new(catalog::BuildCepSlide::new(primary.clone()))),
    };

    Ok(pipeline(executors)?)
}
