use crate::core::Pipeline;
use crate::domain::model::RunSummary;
use crate::utils::error::Result;

pub struct DigestEngine<P: Pipeline> {
    pipeline: P,
}

impl<P: Pipeline> DigestEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self { pipeline }
    }

    pub async fn run(&self) -> Result<RunSummary> {
        tracing::info!("🚀 Starting idea filter run");

        // Extract
        let extracted = self.pipeline.extract().await?;
        tracing::info!(
            fetched = extracted.fetched,
            skipped = extracted.skipped,
            duplicates = extracted.duplicates,
            "Total posts collected: {}",
            extracted.posts.len()
        );
        if extracted.posts.is_empty() {
            tracing::warn!("No posts were collected. Check network access or Reddit API credentials");
        }

        // Transform
        let evaluated = extracted.posts.len();
        tracing::info!("🔎 Filtering {} posts...", evaluated);
        let report = self.pipeline.transform(extracted.posts).await?;
        let matched = report.match_count();
        tracing::info!("Posts that passed the filter: {}", matched);

        // Load
        let delivery = self.pipeline.load(report).await?;

        let summary = RunSummary {
            fetched: extracted.fetched,
            skipped: extracted.skipped,
            duplicates: extracted.duplicates,
            evaluated,
            matched,
            delivery,
        };

        tracing::info!(
            local_saved = summary.delivery.local_saved,
            email_sent = summary.delivery.email_sent,
            email_error = summary.delivery.email_error.as_deref().unwrap_or("-"),
            "🏁 Run finished: {} of {} posts matched",
            summary.matched,
            summary.evaluated
        );

        Ok(summary)
    }
}
