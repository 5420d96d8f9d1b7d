use crate::core::Storage;
use crate::utils::error::Result;
use std::path::Path;

#[derive(Debug, Clone)]
pub struct LocalStorage {
    base_path: String,
}

impl LocalStorage {
    pub fn new(base_path: String) -> Self {
        Self { base_path }
    }

    pub fn base_path(&self) -> &str {
        &self.base_path
    }
}

impl Storage for LocalStorage {
    async fn write_file(&self, path: &str, data: &[u8]) -> Result<String> {
        let full_path = Path::new(&self.base_path).join(path);

        if let Some(parent) = full_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        tokio::fs::write(&full_path, data).await?;
        Ok(full_path.to_string_lossy().into_owned())
    }
}

#[cfg(feature = "cli")]
pub use args::CliArgs;

#[cfg(feature = "cli")]
mod args {
    use clap::Parser;

    #[derive(Debug, Clone, Parser)]
    #[command(name = "idea-filter")]
    #[command(about = "Filters new subreddit posts with an LLM and emails an HTML report")]
    pub struct CliArgs {
        /// Path to TOML configuration file
        #[arg(short, long, default_value = "idea-filter.toml")]
        pub config: String,

        /// Enable verbose output
        #[arg(short, long)]
        pub verbose: bool,

        /// Emit logs as JSON lines
        #[arg(long)]
        pub json_logs: bool,

        /// Override the number of posts fetched per subreddit
        #[arg(long)]
        pub limit: Option<usize>,

        /// Override the report output directory
        #[arg(long)]
        pub output: Option<String>,

        /// Keep the report local even if mail is configured
        #[arg(long)]
        pub no_email: bool,

        /// Show what would be processed without calling any external service
        #[arg(long)]
        pub dry_run: bool,
    }
}
