pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliArgs;
pub use config::{AppConfig, LocalStorage};

pub use adapters::{OpenRouterClassifier, RedditSource, SmtpMailer};
pub use core::{
    delivery::{DeliveryCoordinator, MailConfig},
    engine::DigestEngine,
    filter::FilterEngine,
    normalizer::PostNormalizer,
    pipeline::{DigestPipeline, RunConfig},
    report::ReportRenderer,
};
pub use utils::error::{IdeaFilterError, Result};
