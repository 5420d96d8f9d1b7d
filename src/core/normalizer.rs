use crate::domain::model::{Post, RawPostRecord};
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;
use std::collections::{HashMap, HashSet};

const REDDIT_BASE_URL: &str = "https://www.reddit.com";
const DELETED_AUTHOR: &str = "[deleted]";

/// 單一來源的正規化結果
#[derive(Debug, Clone, Default)]
pub struct NormalizedBatch {
    pub source_name: String,
    pub posts: Vec<Post>,
    pub skipped: usize,
}

/// 多來源合併後的結果
#[derive(Debug, Clone, Default)]
pub struct MergeOutcome {
    pub posts: Vec<Post>,
    pub duplicates: usize,
}

pub struct PostNormalizer;

impl PostNormalizer {
    /// 將原始記錄轉為 `Post`；缺少 id、標題或時間戳的記錄會被略過並計數
    pub fn normalize(raw_records: Vec<RawPostRecord>, source_name: &str) -> NormalizedBatch {
        let total = raw_records.len();
        let posts: Vec<Post> = raw_records
            .iter()
            .filter_map(|record| Self::normalize_record(record, source_name))
            .collect();
        let skipped = total - posts.len();

        if skipped > 0 {
            tracing::warn!(
                source = source_name,
                skipped,
                total,
                "⚠️ Skipped records missing id, title or timestamp"
            );
        } else {
            tracing::debug!(source = source_name, total, "Normalized all records");
        }

        NormalizedBatch {
            source_name: source_name.to_string(),
            posts,
            skipped,
        }
    }

    /// 依來源順序串接；跨來源 id 衝突時以來源名稱限定，同來源重複則捨棄
    pub fn merge(batches: Vec<NormalizedBatch>) -> MergeOutcome {
        // 最終 id -> 所屬來源
        let mut seen: HashMap<String, String> = HashMap::new();
        // (來源, 原始 id)，用於判斷同來源重複
        let mut seen_raw: HashSet<(String, String)> = HashSet::new();
        let mut outcome = MergeOutcome::default();

        for batch in batches {
            for mut post in batch.posts {
                if !seen_raw.insert((post.source_name.clone(), post.id.clone())) {
                    tracing::debug!(
                        post_id = %post.id,
                        source = %post.source_name,
                        "Dropping duplicate post"
                    );
                    outcome.duplicates += 1;
                    continue;
                }

                if let Some(owner) = seen.get(&post.id) {
                    let qualified = Self::qualify_id(&post, &seen);
                    tracing::debug!(
                        post_id = %post.id,
                        source = %post.source_name,
                        other_source = %owner,
                        qualified_id = %qualified,
                        "Post id collides across sources, qualifying"
                    );
                    post.id = qualified;
                }

                seen.insert(post.id.clone(), post.source_name.clone());
                outcome.posts.push(post);
            }
        }

        outcome
    }

    fn qualify_id(post: &Post, seen: &HashMap<String, String>) -> String {
        let base = format!("{}:{}", post.source_name, post.id);
        if !seen.contains_key(&base) {
            return base;
        }
        (2..)
            .map(|n| format!("{}#{}", base, n))
            .find(|candidate| !seen.contains_key(candidate))
            .unwrap_or(base)
    }

    fn normalize_record(record: &RawPostRecord, source_name: &str) -> Option<Post> {
        let data = &record.data;
        let id = identifier(data.get("id"))?;
        let title = non_empty_str(data.get("title"))?;
        let created_at = timestamp(data.get("created_utc").or_else(|| data.get("created_at")))?;

        let url = match non_empty_str(data.get("permalink")) {
            Some(permalink) if permalink.starts_with('/') => {
                format!("{}{}", REDDIT_BASE_URL, permalink)
            }
            Some(permalink) => permalink,
            None => non_empty_str(data.get("url")).unwrap_or_default(),
        };

        Some(Post {
            id,
            title,
            body: data
                .get("selftext")
                .or_else(|| data.get("body"))
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            url,
            source_name: source_name.to_string(),
            author: non_empty_str(data.get("author")).unwrap_or_else(|| DELETED_AUTHOR.to_string()),
            created_at,
            score: data.get("score").and_then(Value::as_i64).unwrap_or(0),
            num_comments: data.get("num_comments").and_then(Value::as_u64).unwrap_or(0),
        })
    }
}

fn identifier(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn non_empty_str(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn timestamp(value: Option<&Value>) -> Option<DateTime<Utc>> {
    match value? {
        Value::Number(n) => {
            let secs = n.as_f64()?;
            if !secs.is_finite() {
                return None;
            }
            let whole = secs.trunc() as i64;
            let nanos = ((secs - secs.trunc()) * 1e9).round() as u32;
            Utc.timestamp_opt(whole, nanos.min(999_999_999)).single()
        }
        Value::String(s) => DateTime::parse_from_rfc3339(s.trim())
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        _ => None,
    }
}
