use crate::domain::model::{FilterCriterion, Judgment, Post};
use crate::domain::ports::Classifier;
use crate::utils::text::excerpt;
use serde::Deserialize;

pub const DEFAULT_MAX_BODY_CHARS: usize = 2000;
const EMPTY_BODY_PLACEHOLDER: &str = "[No content]";
const HEDGE_WORDS: &[&str] = &["yes", "no", "but", "however", "although", "though", "partially", "maybe"];

/// 分類器回應解析後的判定
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub matched: bool,
    pub rationale: Option<String>,
}

#[derive(Debug, Deserialize)]
struct JsonVerdict {
    matched: bool,
    #[serde(default)]
    rationale: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterStats {
    pub evaluated: usize,
    pub matched: usize,
    pub rejected: usize,
    pub unparseable: usize,
    pub failed: usize,
}

pub struct FilterEngine<'a> {
    classifier: &'a dyn Classifier,
    max_body_chars: usize,
}

impl<'a> FilterEngine<'a> {
    pub fn new(classifier: &'a dyn Classifier) -> Self {
        Self {
            classifier,
            max_body_chars: DEFAULT_MAX_BODY_CHARS,
        }
    }

    pub fn with_max_body_chars(mut self, max_body_chars: usize) -> Self {
        self.max_body_chars = max_body_chars;
        self
    }

    /// 只回傳符合條件的貼文，順序與輸入相同
    pub async fn filter(
        &self,
        posts: Vec<Post>,
        criterion: &FilterCriterion,
    ) -> Vec<(Post, Judgment)> {
        self.filter_with_stats(posts, criterion).await.0
    }

    pub async fn filter_with_stats(
        &self,
        posts: Vec<Post>,
        criterion: &FilterCriterion,
    ) -> (Vec<(Post, Judgment)>, FilterStats) {
        let mut stats = FilterStats::default();
        let mut matched = Vec::new();

        for post in posts {
            stats.evaluated += 1;
            let judgment = self.judge(&post, criterion, &mut stats).await;

            if judgment.matched {
                stats.matched += 1;
                tracing::info!(post_id = %post.id, source = %post.source_name, "✅ Accepted post: {}", post.title);
                matched.push((post, judgment));
            } else {
                tracing::debug!(post_id = %post.id, source = %post.source_name, "❌ Rejected post: {}", post.title);
            }
        }

        tracing::info!(
            evaluated = stats.evaluated,
            matched = stats.matched,
            rejected = stats.rejected,
            unparseable = stats.unparseable,
            failed = stats.failed,
            "🔎 Filtering finished"
        );

        (matched, stats)
    }

    async fn judge(&self, post: &Post, criterion: &FilterCriterion, stats: &mut FilterStats) -> Judgment {
        let prompt = self.build_prompt(post, criterion);

        let raw_response = match self.classifier.classify(&prompt).await {
            Ok(raw) => raw,
            Err(e) => {
                stats.failed += 1;
                tracing::warn!(
                    post_id = %post.id,
                    source = %post.source_name,
                    error = %e,
                    "Classifier call failed, treating post as not matched"
                );
                return Judgment {
                    post_id: post.id.clone(),
                    matched: false,
                    rationale: None,
                    raw_response: String::new(),
                };
            }
        };

        match parse_verdict(&raw_response) {
            Some(verdict) => {
                if !verdict.matched {
                    stats.rejected += 1;
                }
                Judgment {
                    post_id: post.id.clone(),
                    matched: verdict.matched,
                    rationale: verdict.rationale,
                    raw_response,
                }
            }
            None => {
                stats.unparseable += 1;
                tracing::warn!(
                    post_id = %post.id,
                    source = %post.source_name,
                    raw_response = %raw_response,
                    "Could not parse classifier response, treating post as not matched"
                );
                Judgment {
                    post_id: post.id.clone(),
                    matched: false,
                    rationale: None,
                    raw_response,
                }
            }
        }
    }

    pub fn build_prompt(&self, post: &Post, criterion: &FilterCriterion) -> String {
        let body = if post.body.trim().is_empty() {
            EMPTY_BODY_PLACEHOLDER.to_string()
        } else {
            excerpt(&post.body, self.max_body_chars)
        };

        format!(
            r#"{criterion}

Post details:
Title: {title}
Subreddit: r/{source}
Content: {body}

First, answer with just YES or NO.
Then, if YES, provide a one-sentence explanation of why this post matches the criteria.
Format your answer exactly like this example:
YES
This post describes a specific pain point that could be addressed with a SaaS solution.

Or if it doesn't match:
NO"#,
            criterion = criterion.as_str().trim(),
            title = post.title,
            source = post.source_name,
            body = body,
        )
    }
}

/// 解析分類器回應；無法明確判定時回傳 `None`
pub fn parse_verdict(raw: &str) -> Option<Verdict> {
    let text = raw.trim();
    if text.is_empty() {
        return None;
    }

    if let Some(verdict) = parse_json_verdict(text) {
        return Some(verdict);
    }

    let mut lines = text.lines().map(str::trim).skip_while(|l| l.is_empty());
    let first = lines.next()?;
    let cleaned = first.trim_start_matches(|c: char| !c.is_alphanumeric());
    let word_end = cleaned
        .find(|c: char| !c.is_alphabetic())
        .unwrap_or(cleaned.len());
    let (word, rest) = cleaned.split_at(word_end);

    let matched = match word.to_ascii_uppercase().as_str() {
        "YES" => true,
        "NO" => false,
        _ => return None,
    };

    // 判定字後只能接標點或 markdown 記號，例如 `YES/NO` 不算
    let separator_end = rest.find(|c: char| c.is_alphanumeric()).unwrap_or(rest.len());
    let (separator, same_line) = rest.split_at(separator_end);
    if !separator.chars().all(is_verdict_separator) {
        return None;
    }

    // 同一行出現相反判定或保留語氣時視為模稜兩可
    let same_line = same_line.trim();
    if same_line
        .split(|c: char| !c.is_alphanumeric())
        .any(|w| HEDGE_WORDS.contains(&w.to_ascii_lowercase().as_str()))
    {
        return None;
    }

    let mut rationale_parts = Vec::new();
    if !same_line.is_empty() {
        rationale_parts.push(same_line);
    }
    rationale_parts.extend(lines.filter(|l| !l.is_empty()));

    let rationale = rationale_parts.join(" ");
    Some(Verdict {
        matched,
        rationale: (!rationale.is_empty()).then_some(rationale),
    })
}

fn is_verdict_separator(c: char) -> bool {
    c.is_whitespace() || matches!(c, '.' | ',' | ':' | ';' | '!' | '-' | '–' | '—' | '*' | '_' | ')' | ']')
}

fn parse_json_verdict(text: &str) -> Option<Verdict> {
    let json_text = if text.starts_with("```json") {
        text.strip_prefix("```json")
            .and_then(|s| s.strip_suffix("```"))
            .unwrap_or(text)
            .trim()
    } else if text.starts_with("```") {
        text.strip_prefix("```")
            .and_then(|s| s.strip_suffix("```"))
            .unwrap_or(text)
            .trim()
    } else {
        text
    };

    if !json_text.starts_with('{') {
        return None;
    }

    let parsed: JsonVerdict = serde_json::from_str(json_text).ok()?;
    Some(Verdict {
        matched: parsed.matched,
        rationale: parsed
            .rationale
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::error::{IdeaFilterError, Result};
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use std::sync::Mutex;

    fn post(id: &str, title: &str) -> Post {
        Post {
            id: id.to_string(),
            title: title.to_string(),
            body: format!("Body of {}", title),
            url: format!("https://www.reddit.com/r/PropTech/comments/{}/", id),
            source_name: "PropTech".to_string(),
            author: "alice".to_string(),
            created_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
            score: 1,
            num_comments: 0,
        }
    }

    /// 依標題關鍵字回應，並記錄收到的提示詞
    struct KeywordClassifier {
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Classifier for KeywordClassifier {
        async fn classify(&self, prompt: &str) -> Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            if prompt.contains("Title: boom") {
                Err(IdeaFilterError::ClassifierError {
                    message: "connection reset".to_string(),
                })
            } else if prompt.contains("Title: wanted") {
                Ok("YES\nAsks for a tool that does not exist yet.".to_string())
            } else if prompt.contains("Title: garbage") {
                Ok("I am not sure what you mean".to_string())
            } else {
                Ok("NO".to_string())
            }
        }
    }

    struct StaticClassifier(&'static str);

    #[async_trait]
    impl Classifier for StaticClassifier {
        async fn classify(&self, _prompt: &str) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    #[test]
    fn test_parse_yes_with_rationale() {
        let verdict = parse_verdict("YES\nThis post asks for lead-generation software.").unwrap();
        assert!(verdict.matched);
        assert_eq!(
            verdict.rationale.as_deref(),
            Some("This post asks for lead-generation software.")
        );
    }

    #[test]
    fn test_parse_no() {
        let verdict = parse_verdict("NO").unwrap();
        assert!(!verdict.matched);
        assert_eq!(verdict.rationale, None);
    }

    #[test]
    fn test_parse_is_case_and_markup_insensitive() {
        assert!(parse_verdict("**Yes.** It matches.").unwrap().matched);
        assert_eq!(
            parse_verdict("yes, because it asks for a tool").unwrap().rationale.as_deref(),
            Some("because it asks for a tool")
        );
        assert!(!parse_verdict("\n\n  No.\n").unwrap().matched);
    }

    #[test]
    fn test_parse_bare_yes_has_no_rationale() {
        let verdict = parse_verdict("YES").unwrap();
        assert!(verdict.matched);
        assert_eq!(verdict.rationale, None);
    }

    #[test]
    fn test_parse_json_verdict() {
        let verdict =
            parse_verdict("```json\n{\"matched\": true, \"rationale\": \"Wants a CRM\"}\n```").unwrap();
        assert!(verdict.matched);
        assert_eq!(verdict.rationale.as_deref(), Some("Wants a CRM"));

        let verdict = parse_verdict(r#"{"matched": false}"#).unwrap();
        assert!(!verdict.matched);
    }

    #[test]
    fn test_parse_ambiguous_is_none() {
        assert_eq!(parse_verdict(""), None);
        assert_eq!(parse_verdict("Maybe"), None);
        assert_eq!(parse_verdict("Nothing to report"), None);
        assert_eq!(parse_verdict("Yesterday I saw this"), None);
        assert_eq!(parse_verdict(r#"{"matched": "perhaps"}"#), None);
    }

    #[test]
    fn test_parse_contradictory_first_line_is_none() {
        assert_eq!(parse_verdict("YES/NO"), None);
        assert_eq!(parse_verdict("Yes or no: NO"), None);
        assert_eq!(parse_verdict("Yes and no, it only partially matches."), None);
        assert_eq!(parse_verdict("Yes, but it does not match the criteria"), None);
        assert_eq!(parse_verdict("NO - well, maybe"), None);
    }

    #[test]
    fn test_parse_rationale_on_later_lines_is_not_checked_for_hedges() {
        let verdict = parse_verdict("YES\nThere is no existing tool for this.").unwrap();
        assert!(verdict.matched);
        assert_eq!(verdict.rationale.as_deref(), Some("There is no existing tool for this."));
    }

    #[tokio::test]
    async fn test_filter_excludes_contradictory_replies() {
        let classifier = StaticClassifier("Yes and no, it only partially matches.");
        let engine = FilterEngine::new(&classifier);
        let posts = vec![post("1", "anything")];

        let (matched, stats) = engine
            .filter_with_stats(posts, &FilterCriterion::new("criterion"))
            .await;

        assert!(matched.is_empty());
        assert_eq!(stats.unparseable, 1);
    }

    #[test]
    fn test_prompt_truncates_body() {
        let classifier = StaticClassifier("NO");
        let engine = FilterEngine::new(&classifier).with_max_body_chars(10);
        let mut p = post("1", "long");
        p.body = "x".repeat(50);

        let prompt = engine.build_prompt(&p, &FilterCriterion::new("Is it a startup idea?"));

        assert!(prompt.starts_with("Is it a startup idea?"));
        assert!(prompt.contains("Title: long"));
        assert!(prompt.contains("Subreddit: r/PropTech"));
        assert!(prompt.contains(&format!("Content: {}…", "x".repeat(10))));
        assert!(!prompt.contains(&"x".repeat(11)));
    }

    #[test]
    fn test_prompt_marks_empty_body() {
        let classifier = StaticClassifier("NO");
        let engine = FilterEngine::new(&classifier);
        let mut p = post("1", "empty");
        p.body = String::new();

        let prompt = engine.build_prompt(&p, &FilterCriterion::new("criterion"));
        assert!(prompt.contains("Content: [No content]"));
    }

    #[tokio::test]
    async fn test_filter_returns_only_matches_in_input_order() {
        let classifier = KeywordClassifier {
            prompts: Mutex::new(Vec::new()),
        };
        let engine = FilterEngine::new(&classifier);
        let posts = vec![
            post("1", "wanted one"),
            post("2", "boring"),
            post("3", "boom"),
            post("4", "garbage"),
            post("5", "wanted two"),
        ];

        let (matched, stats) = engine
            .filter_with_stats(posts, &FilterCriterion::new("criterion"))
            .await;

        let ids: Vec<_> = matched.iter().map(|(p, _)| p.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "5"]);
        assert!(matched.iter().all(|(_, j)| j.matched));
        assert!(matched.iter().all(|(p, j)| p.id == j.post_id));
        assert_eq!(
            stats,
            FilterStats {
                evaluated: 5,
                matched: 2,
                rejected: 1,
                unparseable: 1,
                failed: 1,
            }
        );
        // 每篇貼文各呼叫一次
        assert_eq!(classifier.prompts.lock().unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_filter_is_fail_closed_on_malformed_output() {
        let classifier = StaticClassifier("¯\\_(ツ)_/¯");
        let engine = FilterEngine::new(&classifier);
        let posts = (0..4).map(|i| post(&i.to_string(), "anything")).collect();

        let matched = engine.filter(posts, &FilterCriterion::new("criterion")).await;

        assert!(matched.is_empty());
    }

    #[tokio::test]
    async fn test_filter_keeps_raw_response_and_rationale() {
        let classifier = StaticClassifier("YES\nGreat fit.");
        let engine = FilterEngine::new(&classifier);

        let matched = engine
            .filter(vec![post("9", "anything")], &FilterCriterion::new("criterion"))
            .await;

        assert_eq!(matched.len(), 1);
        let judgment = &matched[0].1;
        assert_eq!(judgment.post_id, "9");
        assert_eq!(judgment.rationale.as_deref(), Some("Great fit."));
        assert_eq!(judgment.raw_response, "YES\nGreat fit.");
    }
}
