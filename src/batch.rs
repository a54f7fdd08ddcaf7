//! Request files in, reports out.
//!
//! A request is a JSON document carrying the detector outputs for one image:
//!
//! ```json
//! {
//!   "ai_score": 0.91,
//!   "ai_heatmap": [[0.0, 0.4], [0.9, 0.1]],
//!   "manipulation_mask": [[0.0, 0.0], [0.0, 0.0]],
//!   "face_regions": [{"x": 0, "y": 0, "width": 1, "height": 1}],
//!   "metadata": {"score": 0.0, "reason": "no EXIF"}
//! }
//! ```
//!
//! `suppression_mask` (nested rows) may be given instead of `face_regions`.

use std::path::{Path, PathBuf};

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::engine::{FusionEngine, FusionInput, FusionResult};
use crate::error::{Error, Result};
use crate::map::{Region, ScoreMap, SuppressionMask};
use crate::metadata::MetadataSignal;
use crate::refine::RefineScratch;
use crate::report::FusionReport;

/// Detector outputs for one image, as read from a request file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    /// AI-generation suspicion.
    pub ai_score: f32,
    /// AI explainer activation map, as rows.
    pub ai_heatmap: Vec<Vec<f32>>,
    /// Manipulation probability map, as rows.
    pub manipulation_mask: Vec<Vec<f32>>,
    /// Explicit suppression mask, as rows.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suppression_mask: Option<Vec<Vec<f32>>>,
    /// Regions to suppress, in manipulation-mask pixel coordinates.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub face_regions: Vec<Region>,
    /// Metadata suspicion and its explanation.
    #[serde(default)]
    pub metadata: MetadataSignal,
}

/// Owned maps built from an [`AnalysisRequest`].
#[derive(Debug, Clone)]
pub struct PreparedRequest {
    /// AI-generation suspicion.
    pub ai_score: f32,
    /// AI explainer activation map.
    pub ai_heatmap: ScoreMap,
    /// Manipulation probability map.
    pub manipulation_mask: ScoreMap,
    /// Suppression mask, if any.
    pub suppression: Option<SuppressionMask>,
    /// Metadata signal.
    pub metadata: MetadataSignal,
}

impl PreparedRequest {
    /// Borrowed engine input.
    #[must_use]
    pub fn input(&self) -> FusionInput<'_> {
        FusionInput {
            ai_score: self.ai_score,
            ai_heatmap: &self.ai_heatmap,
            manipulation_mask: &self.manipulation_mask,
            suppression: self.suppression.as_ref(),
            metadata_score: self.metadata.score,
        }
    }
}

impl AnalysisRequest {
    /// Parse a request from JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if the document is malformed.
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Validate the nested arrays and build owned maps.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for ragged or empty maps, or when both
    /// a suppression mask and face regions are given.
    pub fn prepare(&self) -> Result<PreparedRequest> {
        let ai_heatmap = ScoreMap::from_rows(&self.ai_heatmap)
            .map_err(|e| Error::InvalidInput(format!("ai_heatmap: {e}")))?;
        let manipulation_mask = ScoreMap::from_rows(&self.manipulation_mask)
            .map_err(|e| Error::InvalidInput(format!("manipulation_mask: {e}")))?;

        let suppression = match (&self.suppression_mask, self.face_regions.is_empty()) {
            (Some(_), false) => {
                return Err(Error::InvalidInput(
                    "give either suppression_mask or face_regions, not both".to_string(),
                ))
            }
            (Some(rows), true) => Some(SuppressionMask::new(
                ScoreMap::from_rows(rows)
                    .map_err(|e| Error::InvalidInput(format!("suppression_mask: {e}")))?,
            )),
            (None, false) => {
                let (w, h) = manipulation_mask.shape();
                Some(SuppressionMask::from_regions(w, h, &self.face_regions)?)
            }
            (None, true) => None,
        };

        Ok(PreparedRequest {
            ai_score: self.ai_score,
            ai_heatmap,
            manipulation_mask,
            suppression,
            metadata: self.metadata.clone(),
        })
    }
}

/// Result of processing a single request file.
#[derive(Debug)]
pub struct ProcessResult {
    /// Path of the request file.
    pub path: PathBuf,
    /// Whether a report was written.
    pub success: bool,
    /// Rounded fusion score, when fusion ran.
    pub fusion_score: Option<f32>,
    /// Human-readable status message.
    pub message: String,
}

/// Read, fuse and report one request file.
///
/// # Errors
///
/// Returns any read, parse, validation or fusion error.
pub fn analyze_file(
    engine: &FusionEngine,
    input: &Path,
    scratch: &mut RefineScratch,
) -> Result<(FusionResult, FusionReport)> {
    let text = std::fs::read_to_string(input)?;
    let request = AnalysisRequest::from_json(&text)?;
    let prepared = request.prepare()?;
    let result = engine.fuse_with_scratch(&prepared.input(), scratch)?;
    let report = FusionReport::new(&result, &prepared.metadata);
    Ok((result, report))
}

/// Process one request: write the JSON report to `output` and, if given,
/// the merged heatmap as a grayscale PNG to `heatmap`.
#[must_use]
pub fn process_file(
    engine: &FusionEngine,
    input: &Path,
    output: &Path,
    heatmap: Option<&Path>,
) -> ProcessResult {
    process_file_with_scratch(engine, input, output, heatmap, &mut RefineScratch::default())
}

fn process_file_with_scratch(
    engine: &FusionEngine,
    input: &Path,
    output: &Path,
    heatmap: Option<&Path>,
    scratch: &mut RefineScratch,
) -> ProcessResult {
    let mut result = ProcessResult {
        path: input.to_path_buf(),
        success: false,
        fusion_score: None,
        message: String::new(),
    };

    let (fusion, report) = match analyze_file(engine, input, scratch) {
        Ok(r) => r,
        Err(e) => {
            warn!("{}: {e}", input.display());
            result.message = format!("Failed to analyze: {e}");
            return result;
        }
    };
    result.fusion_score = Some(report.fusion_score);

    if let Err(e) = write_report(&report, output) {
        warn!("{}: {e}", input.display());
        result.message = format!("Failed to write report: {e}");
        return result;
    }

    if let Some(path) = heatmap {
        if let Err(e) = save_heatmap(&fusion.fusion_heatmap, path) {
            warn!("{}: {e}", input.display());
            result.message = format!("Failed to save heatmap: {e}");
            return result;
        }
    }

    info!("{}: {}", input.display(), report.summary);
    result.success = true;
    result.message = report.summary;
    result
}

/// Process every `*.json` request in `input_dir`.
///
/// Reports land in `output_dir` as `{stem}_report.json`; heatmaps, when
/// `heatmap_dir` is given, as `{stem}_heatmap.png`. Files are processed in
/// parallel when the `cli` feature is enabled (via rayon).
#[must_use]
pub fn process_directory(
    engine: &FusionEngine,
    input_dir: &Path,
    output_dir: &Path,
    heatmap_dir: Option<&Path>,
) -> Vec<ProcessResult> {
    let mut entries: Vec<PathBuf> = match std::fs::read_dir(input_dir) {
        Ok(rd) => rd
            .filter_map(std::result::Result::ok)
            .filter(|e| e.file_type().map(|ft| ft.is_file()).unwrap_or(false))
            .map(|e| e.path())
            .filter(|p| is_request_file(p))
            .collect(),
        Err(e) => {
            return vec![ProcessResult {
                path: input_dir.to_path_buf(),
                success: false,
                fusion_score: None,
                message: format!("Failed to read directory: {e}"),
            }];
        }
    };
    entries.sort();

    for dir in std::iter::once(output_dir).chain(heatmap_dir) {
        if let Err(e) = std::fs::create_dir_all(dir) {
            return vec![ProcessResult {
                path: dir.to_path_buf(),
                success: false,
                fusion_score: None,
                message: format!("Failed to create output directory: {e}"),
            }];
        }
    }

    let run = |input: &PathBuf, scratch: &mut RefineScratch| {
        let report = output_dir.join(report_file_name(input));
        let heatmap = heatmap_dir.map(|d| d.join(heatmap_file_name(input)));
        process_file_with_scratch(engine, input, &report, heatmap.as_deref(), scratch)
    };

    #[cfg(feature = "cli")]
    {
        use rayon::prelude::*;
        entries
            .par_iter()
            .map_init(RefineScratch::default, |scratch, input| run(input, scratch))
            .collect()
    }

    #[cfg(not(feature = "cli"))]
    {
        let mut scratch = RefineScratch::default();
        entries
            .iter()
            .map(|input| run(input, &mut scratch))
            .collect()
    }
}

/// Check if a file looks like a request (`.json` extension).
#[must_use]
pub fn is_request_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

fn stem(input: &Path) -> String {
    input
        .file_stem()
        .unwrap_or_default()
        .to_string_lossy()
        .into_owned()
}

fn report_file_name(input: &Path) -> String {
    format!("{}_report.json", stem(input))
}

fn heatmap_file_name(input: &Path) -> String {
    format!("{}_heatmap.png", stem(input))
}

/// Default report path next to the request.
///
/// Example: `"scan.json"` becomes `"scan_report.json"`.
#[must_use]
pub fn default_output_path(input: &Path) -> PathBuf {
    let parent = input.parent().unwrap_or(Path::new("."));
    parent.join(report_file_name(input))
}

/// Serialize `report` to `path`, creating parent directories.
///
/// # Errors
///
/// Returns [`Error::Io`] or [`Error::Json`] on failure.
pub fn write_report(report: &FusionReport, path: &Path) -> Result<()> {
    create_parent(path)?;
    std::fs::write(path, report.to_json()?)?;
    Ok(())
}

/// Save a heatmap as an 8-bit grayscale image; format follows the extension.
///
/// # Errors
///
/// Returns [`Error::Image`] if encoding fails or [`Error::Io`] if the
/// parent directory cannot be created.
pub fn save_heatmap(map: &ScoreMap, path: &Path) -> Result<()> {
    create_parent(path)?;
    map.to_luma().save(path)?;
    Ok(())
}

fn create_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}
