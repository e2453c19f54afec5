// SPDX-License-Identifier: MIT

//! Typed argument records for remote tool calls
//!
//! Every tool call crosses the wire as one of these records instead of an
//! untyped map, so shape errors are caught before the network call. The
//! derived JSON schemas are surfaced by the API for operators.

use schemars::{schema_for, JsonSchema};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One category entry point with the focal brand's index and each
/// competitor's index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CepRecord {
    pub cep: String,
    pub brand_index: i64,
    pub competitor_indices: BTreeMap<String, i64>,
}

/// Arguments for the brand-index merge tool
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct MergeBrandIndicesArgs {
    pub min_valid_brands: u32,
    pub include_json_output: bool,
    pub include_markdown_tables: bool,
    pub output_format: String,
    pub generate_png_table: bool,
}

impl Default for MergeBrandIndicesArgs {
    fn default() -> Self {
        Self {
            min_valid_brands: 1,
            include_json_output: true,
            include_markdown_tables: true,
            output_format: "simple".to_string(),
            generate_png_table: true,
        }
    }
}

/// Arguments for the CEP performance-clustering tool
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AnalyzeCepPerformanceArgs {
    pub cep_data: Vec<CepRecord>,
    pub include_json_output: bool,
}

/// Arguments for the CEP analysis slide tool
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct BuildCepSlideArgs {
    pub chart_image_url: String,
    pub insights: Vec<String>,
    pub slide_title: String,
    pub dark_theme: bool,
}

impl BuildCepSlideArgs {
    pub fn new(chart_image_url: String, insights: Vec<String>) -> Self {
        Self {
            chart_image_url,
            insights,
            slide_title: "CEP Analysis and Insights".to_string(),
            dark_theme: true,
        }
    }
}

/// Arguments for the audience CEP-priorities tool
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AudienceCepPrioritiesArgs {
    pub threshold: i64,
    pub include_json_output: bool,
}

impl Default for AudienceCepPrioritiesArgs {
    fn default() -> Self {
        Self {
            threshold: 120,
            include_json_output: true,
        }
    }
}

/// One audience segment of the strategy deck
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SegmentSlide {
    pub name: String,
    pub key_attributes: Vec<String>,
    pub ceps: Vec<CepSlide>,
}

/// One CEP row within a segment slide
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CepSlide {
    pub name: String,
    pub creative_ideas: Vec<String>,
    pub competitor_brands: Vec<String>,
}

/// The closing slide covering CEPs under the priority threshold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BelowThresholdSlide {
    pub title: String,
    pub ceps: Vec<BelowThresholdCep>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BelowThresholdCep {
    pub name: String,
    pub top_competitors: Vec<String>,
    pub target_explorations: Vec<TargetExploration>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TargetExploration {
    pub audience: String,
    pub rationale: String,
}

/// Arguments for the audience strategy deck tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BuildAudienceSlidesArgs {
    pub segments: Vec<SegmentSlide>,
    pub below_threshold_slide: BelowThresholdSlide,
    pub presentation_title: String,
}

/// JSON schemas of all tool argument records, keyed by tool name
pub fn schemas() -> BTreeMap<&'static str, schemars::schema::RootSchema> {
    BTreeMap::from([
        ("merge_brand_indices", schema_for!(MergeBrandIndicesArgs)),
        (
            "analyze_cep_performance",
            schema_for!(AnalyzeCepPerformanceArgs),
        ),
        ("build_cep_analysis_slide", schema_for!(BuildCepSlideArgs)),
        (
            "analyze_audience_cep_priorities",
            schema_for!(AudienceCepPrioritiesArgs),
        ),
        (
            "build_audience_strategy_slides",
            schema_for!(BuildAudienceSlidesArgs),
        ),
    ])
}
