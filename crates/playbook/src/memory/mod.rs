//! Key point types and operations
//!
//! Defines the playbook data model together with tag matching, evaluation
//! scoring, merging and ranked retrieval.

pub mod merge;
pub mod quality;
pub mod retrieval;
pub mod scoring;
pub mod tags;
pub mod types;

pub use merge::{MergeEngine, MergeMode, MergePolicy, MergeReport};
pub use retrieval::{
    ContextRule, ContextRules, ContextWeights, Layer, RankedKeyPoint, Ranker, RankerConfig,
    Ranking, SelectionRequest,
};
pub use scoring::{RatingScale, RatingScheme, apply_evaluations};
pub use types::{
    CandidateKeyPoint, Evaluation, ExtractionResult, KeyPoint, Playbook, QualitySignals,
};
