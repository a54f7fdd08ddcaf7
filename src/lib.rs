//! Fuse independent image-forensics signals into one authenticity risk.
//!
//! Three external detectors describe an image: an AI-generation classifier
//! (score + activation map), a manipulation segmenter (per-pixel probability
//! map, optionally with face regions to suppress) and an EXIF analyzer
//! (metadata suspicion score). This crate turns those into a single bounded
//! suspicion score and one merged heatmap.
//!
//! # Quick Start
//!
//! ```no_run
//! use authenticity_fusion::{FusionEngine, FusionInput, ScoreMap};
//!
//! let engine = FusionEngine::new();
//! let ai_heatmap = ScoreMap::filled(14, 14, 0.2).unwrap();
//! let manip_mask = ScoreMap::filled(512, 512, 0.0).unwrap();
//! let result = engine
//!     .fuse(&FusionInput {
//!         ai_score: 0.9,
//!         ai_heatmap: &ai_heatmap,
//!         manipulation_mask: &manip_mask,
//!         suppression: None,
//!         metadata_score: 0.0,
//!     })
//!     .unwrap();
//! println!("suspicion {:.3}", result.fusion_score);
//! ```
//!
//! # Pipeline
//!
//! 1. **Refine** the manipulation map: suppress, threshold, open, gate on area.
//! 2. **Combine** AI and area-damped manipulation scores with a noisy-OR.
//! 3. **Boost** by metadata, only above its threshold and capped.
//! 4. **Merge** the normalized heatmaps on the AI map's grid.
//!
//! Every step is a pure function of its inputs; an engine can be shared
//! across threads.

#![deny(missing_docs)]

pub mod batch;
pub mod combine;
pub mod config;
mod engine;
pub mod error;
pub mod heatmap;
pub mod map;
pub mod metadata;
pub mod morphology;
pub mod refine;
pub mod report;
pub mod resample;

pub use combine::{ScoreCombiner, VisualScore};
pub use config::FusionConfig;
pub use engine::{
    DetectionSample, FusionEngine, FusionInput, FusionResult, FusionStage, ScoreFusion,
};
pub use error::{Error, Result};
pub use heatmap::HeatmapAligner;
pub use map::{clip01, Region, ScoreMap, SuppressionMask};
pub use metadata::{MetadataBooster, MetadataSignal};
pub use refine::{MaskRefiner, RefineOutcome, Refinement};
pub use report::FusionReport;
