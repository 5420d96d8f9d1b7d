use crate::core::delivery::{DeliveryCoordinator, MailConfig};
use crate::core::filter::{FilterEngine, DEFAULT_MAX_BODY_CHARS};
use crate::core::normalizer::PostNormalizer;
use crate::core::report::{ReportRenderer, DEFAULT_EXCERPT_CHARS, DEFAULT_REPORT_TITLE};
use crate::domain::model::{DeliveryResult, ExtractResult, FilterCriterion, Post, Report};
use crate::domain::ports::{Classifier, Pipeline, PostSource, Storage};
use crate::utils::error::{IdeaFilterError, Result};
use crate::utils::validation::{self, Validate};
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// 單次執行所需的全部設定，於進入管道前一次給定
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub sources: Vec<String>,
    pub limit: usize,
    pub criterion: FilterCriterion,
    pub max_body_chars: usize,
    pub report_title: String,
    pub excerpt_chars: usize,
    pub mail: Option<MailConfig>,
    /// 固定報告時間（測試用）；未設定時使用執行當下的時間
    pub generated_at: Option<DateTime<Utc>>,
}

impl RunConfig {
    pub fn new(sources: Vec<String>, criterion: FilterCriterion) -> Self {
        Self {
            sources,
            limit: 10,
            criterion,
            max_body_chars: DEFAULT_MAX_BODY_CHARS,
            report_title: DEFAULT_REPORT_TITLE.to_string(),
            excerpt_chars: DEFAULT_EXCERPT_CHARS,
            mail: None,
            generated_at: None,
        }
    }
}

impl Validate for RunConfig {
    fn validate(&self) -> Result<()> {
        if self.sources.iter().all(|s| s.trim().is_empty()) {
            return Err(IdeaFilterError::ConfigValidationError {
                field: "sources.names".to_string(),
                message: "At least one subreddit must be configured".to_string(),
            });
        }
        if self.criterion.is_blank() {
            return Err(IdeaFilterError::ConfigValidationError {
                field: "filter.criterion".to_string(),
                message: "A filter criterion must be supplied".to_string(),
            });
        }
        validation::validate_positive_number("sources.limit", self.limit, 1)?;
        validation::validate_positive_number("filter.max_body_chars", self.max_body_chars, 1)?;
        Ok(())
    }
}

pub struct DigestPipeline<S: Storage> {
    source: Arc<dyn PostSource>,
    classifier: Arc<dyn Classifier>,
    delivery: DeliveryCoordinator<S>,
    config: RunConfig,
}

impl<S: Storage> DigestPipeline<S> {
    /// 設定錯誤在此直接回傳，管道不會開始執行
    pub fn new(
        source: Arc<dyn PostSource>,
        classifier: Arc<dyn Classifier>,
        delivery: DeliveryCoordinator<S>,
        config: RunConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            source,
            classifier,
            delivery,
            config,
        })
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }
}

#[async_trait::async_trait]
impl<S: Storage> Pipeline for DigestPipeline<S> {
    async fn extract(&self) -> Result<ExtractResult> {
        let mut batches = Vec::with_capacity(self.config.sources.len());
        let mut fetched = 0;

        for source_name in self.config.sources.iter().map(|s| s.trim()).filter(|s| !s.is_empty()) {
            tracing::info!("📥 Fetching posts from r/{}...", source_name);

            let records = match self.source.fetch(source_name, self.config.limit).await {
                Ok(records) => records,
                Err(e) => {
                    tracing::error!(
                        source = source_name,
                        error = %e,
                        "Failed to fetch posts, continuing with remaining sources"
                    );
                    continue;
                }
            };

            fetched += records.len();
            let batch = PostNormalizer::normalize(records, source_name);
            tracing::info!("Found {} posts in r/{}", batch.posts.len(), source_name);
            batches.push(batch);
        }

        let skipped: usize = batches.iter().map(|b| b.skipped).sum();
        let merged = PostNormalizer::merge(batches);

        Ok(ExtractResult {
            posts: merged.posts,
            fetched,
            skipped,
            duplicates: merged.duplicates,
        })
    }

    async fn transform(&self, posts: Vec<Post>) -> Result<Report> {
        let engine = FilterEngine::new(self.classifier.as_ref()).with_max_body_chars(self.config.max_body_chars);
        let matched = engine.filter(posts, &self.config.criterion).await;

        let renderer = ReportRenderer::new(self.config.report_title.clone(), self.config.excerpt_chars);
        let generated_at = self.config.generated_at.unwrap_or_else(Utc::now);
        Ok(renderer.render(matched, generated_at))
    }

    async fn load(&self, report: Report) -> Result<DeliveryResult> {
        Ok(self.delivery.deliver(&report, self.config.mail.as_ref()).await)
    }
}
