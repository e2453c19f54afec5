// SPDX-License-Identifier: MIT

//! Tool-backed task executors
//!
//! One executor per remote tool. Each parses the structured arguments it
//! needs out of the step's composed input (best-effort extraction), builds
//! the typed argument record, and returns the tool's text output. Input that
//! cannot be shaped into the record is a non-transient execution failure,
//! caught before the network call.

use crate::flow::FlowError;
use crate::intel::extract;
use crate::intel::executor::TaskExecutor;
use crate::intel::tools::args::{
    AnalyzeCepPerformanceArgs, AudienceCepPrioritiesArgs, BuildAudienceSlidesArgs,
    BuildCepSlideArgs, CepRecord, MergeBrandIndicesArgs,
};
use crate::intel::tools::ToolInvoker;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

/// Merges the per-brand CEP index reports into one comparison table
pub struct MergeBrandIndices {
    invoker: Arc<ToolInvoker>,
}

impl MergeBrandIndices {
    pub fn new(invoker: Arc<ToolInvoker>) -> Self {
        Self { invoker }
    }
}

#[async_trait]
impl TaskExecutor for MergeBrandIndices {
    fn name(&self) -> &str {
        "merge_brand_indices"
    }

    async fn execute(&self, _input: &str) -> Result<String, FlowError> {
        self.invoker
            .call_text("merge_brand_indices", MergeBrandIndicesArgs::default())
            .await
    }
}

/// Clusters CEPs into white-space / winning / underperforming / parity
pub struct AnalyzeCepPerformance {
    invoker: Arc<ToolInvoker>,
}

impl AnalyzeCepPerformance {
    pub fn new(invoker: Arc<ToolInvoker>) -> Self {
        Self { invoker }
    }

    fn records_from_input(input: &str) -> Result<Vec<CepRecord>, FlowError> {
        let data = extract::first_json_object(input)
            .map(|object| object.get("cep_data").cloned().unwrap_or(object))
            .or_else(|| extract::first_json_array(input))
            .ok_or_else(|| {
                FlowError::execution("analyze_cep_performance", "no CEP data found in input")
            })?;

        serde_json::from_value(data).map_err(|e| {
            FlowError::execution(
                "analyze_cep_performance",
                format!("malformed CEP data: {}", e),
            )
        })
    }
}

#[async_trait]
impl TaskExecutor for AnalyzeCepPerformance {
    fn name(&self) -> &str {
        "analyze_cep_performance"
    }

    async fn execute(&self, input: &str) -> Result<String, FlowError> {
        let args = AnalyzeCepPerformanceArgs {
            cep_data: Self::records_from_input(input)?,
            include_json_output: true,
        };
        self.invoker.call_text("analyze_cep_performance", args).await
    }
}

/// Renders the index scatter plot (PNG and PDF)
pub struct CreateIndexVisual {
    invoker: Arc<ToolInvoker>,
}

impl CreateIndexVisual {
    pub fn new(invoker: Arc<ToolInvoker>) -> Self {
        Self { invoker }
    }
}

#[async_trait]
impl TaskExecutor for CreateIndexVisual {
    fn name(&self) -> &str {
        "index_visual"
    }

    async fn execute(&self, _input: &str) -> Result<String, FlowError> {
        self.invoker.call_text("index_visual", json!({})).await
    }
}

/// Builds the CEP analysis slide from a chart URL and four insights
pub struct BuildCepSlide {
    invoker: Arc<ToolInvoker>,
}

impl BuildCepSlide {
    pub fn new(invoker: Arc<ToolInvoker>) -> Self {
        Self { invoker }
    }

    fn args_from_input(input: &str) -> Result<BuildCepSlideArgs, FlowError> {
        let chart_url = extract::first_png_url(input).ok_or_else(|| {
            FlowError::execution("build_cep_analysis_slide", "no chart image URL in input")
        })?;

        let insights = extract::parse_insights(input);
        if insights.len() != 4 {
            return Err(FlowError::execution(
                "build_cep_analysis_slide",
                format!("need exactly 4 insights, got {}", insights.len()),
            ));
        }

        // Entries without a "Title - Body" separator get a generic title.
        let insights = insights
            .into_iter()
            .enumerate()
            .map(|(i, insight)| {
                if insight.contains(" - ") {
                    insight
                } else {
                    format!("Key Insight {} - {}", i + 1, insight)
                }
            })
            .collect();

        Ok(BuildCepSlideArgs::new(chart_url, insights))
    }
}

#[async_trait]
impl TaskExecutor for BuildCepSlide {
    fn name(&self) -> &str {
        "build_cep_analysis_slide"
    }

    async fn execute(&self, input: &str) -> Result<String, FlowError> {
        let args = Self::args_from_input(input)?;
        self.invoker.call_text("build_cep_analysis_slide", args).await
    }
}

/// Identifies priority CEPs per audience segment
pub struct AudienceCepPriorities {
    invoker: Arc<ToolInvoker>,
}

impl AudienceCepPriorities {
    pub fn new(invoker: Arc<ToolInvoker>) -> Self {
        Self { invoker }
    }
}

#[async_trait]
impl TaskExecutor for AudienceCepPriorities {
    fn name(&self) -> &str {
        "analyze_audience_cep_priorities"
    }

    async fn execute(&self, _input: &str) -> Result<String, FlowError> {
        self.invoker
            .call_text(
                "analyze_audience_cep_priorities",
                AudienceCepPrioritiesArgs::default(),
            )
            .await
    }
}

/// Fetches attribute index reports for the grow / recruit / switch audiences
pub struct DemoAudiences {
    invoker: Arc<ToolInvoker>,
}

impl DemoAudiences {
    pub fn new(invoker: Arc<ToolInvoker>) -> Self {
        Self { invoker }
    }
}

#[async_trait]
impl TaskExecutor for DemoAudiences {
    fn name(&self) -> &str {
        "demo_audiences"
    }

    async fn execute(&self, _input: &str) -> Result<String, FlowError> {
        self.invoker.call_text("demo_audiences", json!({})).await
    }
}

/// Builds the audience strategy deck from a prepared slide payload
pub struct BuildAudienceSlides {
    invoker: Arc<ToolInvoker>,
}

impl BuildAudienceSlides {
    pub fn new(invoker: Arc<ToolInvoker>) -> Self {
        Self { invoker }
    }

    fn args_from_input(input: &str) -> Result<BuildAudienceSlidesArgs, FlowError> {
        let payload: Value = extract::first_json_object(input).ok_or_else(|| {
            FlowError::execution(
                "build_audience_strategy_slides",
                "no slide payload found in input",
            )
        })?;

        serde_json::from_value(payload).map_err(|e| {
            FlowError::execution(
                "build_audience_strategy_slides",
                format!("malformed slide payload: {}", e),
            )
        })
    }
}

#[async_trait]
impl TaskExecutor for BuildAudienceSlides {
    fn name(&self) -> &str {
        "build_audience_strategy_slides"
    }

    async fn execute(&self, input: &str) -> Result<String, FlowError> {
        let args = Self::args_from_input(input)?;
        self.invoker
            .call_text("build_audience_strategy_slides", args)
            .await
    }
}
