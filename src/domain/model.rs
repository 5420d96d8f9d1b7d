use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 來源回傳的原始貼文記錄，欄位未經驗證
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawPostRecord {
    pub data: HashMap<String, serde_json::Value>,
}

impl RawPostRecord {
    pub fn from_json(value: serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Object(obj) => Some(Self {
                data: obj.into_iter().collect(),
            }),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub title: String,
    pub body: String,
    pub url: String,
    pub source_name: String,
    pub author: String,
    pub created_at: DateTime<Utc>,
    pub score: i64,
    pub num_comments: u64,
}

/// 單一自然語言篩選條件，整個執行期間不變
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterCriterion(String);

impl FilterCriterion {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Judgment {
    pub post_id: String,
    pub matched: bool,
    pub rationale: Option<String>,
    /// 分類器的原始輸出，解析失敗時用於診斷
    pub raw_response: String,
}

#[derive(Debug, Clone)]
pub struct Report {
    pub generated_at: DateTime<Utc>,
    pub matched_posts: Vec<(Post, Judgment)>,
    pub html_body: String,
}

impl Report {
    pub fn match_count(&self) -> usize {
        self.matched_posts.len()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryResult {
    pub local_saved: bool,
    pub local_path: Option<String>,
    pub email_sent: bool,
    pub email_error: Option<String>,
}

/// 抽取階段的結果：合併後的貼文與正規化統計
#[derive(Debug, Clone, Default)]
pub struct ExtractResult {
    pub posts: Vec<Post>,
    pub fetched: usize,
    pub skipped: usize,
    pub duplicates: usize,
}

/// 一次執行的統計摘要
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub fetched: usize,
    pub skipped: usize,
    pub duplicates: usize,
    pub evaluated: usize,
    pub matched: usize,
    pub delivery: DeliveryResult,
}
