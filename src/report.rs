//! JSON-ready view of a fusion result.
//!
//! Scores are rounded to three decimals, heatmaps become nested row arrays.

use serde::{Deserialize, Serialize};

use crate::engine::FusionResult;
use crate::metadata::MetadataSignal;

/// Round to three decimal places.
#[must_use]
pub fn round3(x: f32) -> f32 {
    (x * 1000.0).round() / 1000.0
}

/// Per-image analysis summary for transport and persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusionReport {
    /// AI-generation suspicion.
    pub ai_score: f32,
    /// Refined manipulation confidence.
    pub manipulation_score: f32,
    /// Manipulation score after area damping.
    pub effective_manipulation: f32,
    /// Mean suppressed manipulation activation.
    pub patch_score: f32,
    /// Metadata suspicion.
    pub metadata_score: f32,
    /// Explanation from the metadata analyzer.
    pub metadata_reason: String,
    /// Visual suspicion before the metadata boost.
    pub visual_suspicion: f32,
    /// Final suspicion; higher is more suspicious.
    pub fusion_score: f32,
    /// `1 - fusion_score`.
    pub authenticity: f32,
    /// Merged heatmap rows, values rounded to three decimals.
    pub fusion_heatmap: Vec<Vec<f32>>,
    /// One-line summary suitable for history listings.
    pub summary: String,
}

impl FusionReport {
    /// Build a report from an engine result and the metadata signal that fed it.
    #[must_use]
    pub fn new(result: &FusionResult, metadata: &MetadataSignal) -> Self {
        let s = &result.sample;
        let fusion_heatmap = result
            .fusion_heatmap
            .to_rows()
            .into_iter()
            .map(|row| row.into_iter().map(round3).collect())
            .collect();

        let mut report = Self {
            ai_score: round3(s.ai_score),
            manipulation_score: round3(s.manipulation_score),
            effective_manipulation: round3(result.effective_manipulation),
            patch_score: round3(s.patch_score),
            metadata_score: round3(s.metadata_score),
            metadata_reason: metadata.reason.clone(),
            visual_suspicion: round3(result.visual_suspicion),
            fusion_score: round3(result.fusion_score),
            authenticity: round3(result.authenticity()),
            fusion_heatmap,
            summary: String::new(),
        };
        report.summary = report.summary_line();
        report
    }

    /// `AI=…, manip=…, patch=…, meta=…, fusion=…` from the rounded scores.
    #[must_use]
    pub fn summary_line(&self) -> String {
        format!(
            "AI={:?}, manip={:?}, patch={:?}, meta={:?}, fusion={:?}",
            self.ai_score,
            self.manipulation_score,
            self.patch_score,
            self.metadata_score,
            self.fusion_score
        )
    }

    /// Pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`](crate::Error::Json) if serialization fails.
    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
