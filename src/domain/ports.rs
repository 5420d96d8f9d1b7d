use crate::domain::model::{DeliveryResult, ExtractResult, Post, RawPostRecord, Report};
use crate::utils::error::Result;
use async_trait::async_trait;

pub trait Storage: Send + Sync {
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<String>> + Send;
}

#[async_trait]
pub trait PostSource: Send + Sync {
    async fn fetch(&self, source_name: &str, limit: usize) -> Result<Vec<RawPostRecord>>;
}

/// 傳入完整提示詞，回傳模型的原始文字回應
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, prompt: &str) -> Result<String>;
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, recipient: &str, subject: &str, html_body: &str) -> Result<()>;
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    async fn extract(&self) -> Result<ExtractResult>;
    async fn transform(&self, posts: Vec<Post>) -> Result<Report>;
    async fn load(&self, report: Report) -> Result<DeliveryResult>;
}
