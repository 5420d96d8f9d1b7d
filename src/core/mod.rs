pub mod delivery;
pub mod engine;
pub mod filter;
pub mod normalizer;
pub mod pipeline;
pub mod report;

pub use crate::domain::model::{
    DeliveryResult, ExtractResult, FilterCriterion, Judgment, Post, RawPostRecord, Report, RunSummary,
};
pub use crate::domain::ports::{Classifier, Mailer, Pipeline, PostSource, Storage};
pub use crate::utils::error::Result;
