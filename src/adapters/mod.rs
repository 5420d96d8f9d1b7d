// Adapters 層：domain ports 的具體實作（Reddit、OpenRouter、SMTP）

pub mod openrouter;
pub mod reddit;
pub mod smtp;

pub use openrouter::{OpenRouterClassifier, OpenRouterSettings};
pub use reddit::{RedditSettings, RedditSource};
pub use smtp::{SmtpMailer, SmtpSettings};
