//! HTML 報告產生。
//!
//! 輸出只取決於符合的貼文與 `generated_at`，相同輸入產生相同位元組。

use crate::domain::model::{Judgment, Post, Report};
use crate::utils::text::{excerpt, html_escape};
use chrono::{DateTime, Utc};
use std::fmt::Write;
use url::Url;

pub const DEFAULT_EXCERPT_CHARS: usize = 300;
pub const DEFAULT_REPORT_TITLE: &str = "Reddit Idea Filter Report";
pub const NO_MATCHES_TEXT: &str = "No matches found";

const STYLE: &str = r#"
        body {
            font-family: Arial, sans-serif;
            line-height: 1.6;
            max-width: 800px;
            margin: 0 auto;
            padding: 20px;
            color: #333;
        }
        h1 {
            color: #ff4500;
            border-bottom: 2px solid #ff4500;
            padding-bottom: 10px;
        }
        .summary {
            margin: 20px 0;
            color: #666;
        }
        .post {
            margin-bottom: 30px;
            padding: 15px;
            border-radius: 5px;
            background-color: #f9f9f9;
            border-left: 4px solid #ff4500;
        }
        .meta {
            color: #787c7e;
            font-size: 0.9em;
        }
        .subreddit {
            color: #0079d3;
            font-weight: bold;
        }
        .title {
            font-size: 1.2em;
            margin: 5px 0;
        }
        .title a {
            color: #1a1a1b;
            text-decoration: none;
        }
        .title a:hover {
            text-decoration: underline;
        }
        .reason {
            margin-top: 10px;
            font-style: italic;
            color: #4a4a4a;
        }
        .excerpt {
            margin-top: 10px;
            color: #555;
            white-space: pre-wrap;
        }
        .empty {
            padding: 30px;
            text-align: center;
            color: #787c7e;
            background-color: #f9f9f9;
            border-radius: 5px;
        }
"#;

pub struct ReportRenderer {
    title: String,
    excerpt_chars: usize,
}

impl Default for ReportRenderer {
    fn default() -> Self {
        Self {
            title: DEFAULT_REPORT_TITLE.to_string(),
            excerpt_chars: DEFAULT_EXCERPT_CHARS,
        }
    }
}

impl ReportRenderer {
    pub fn new(title: impl Into<String>, excerpt_chars: usize) -> Self {
        Self {
            title: title.into(),
            excerpt_chars,
        }
    }

    /// 依分數遞減、再依建立時間遞減排序後產生報告
    pub fn render(&self, mut matched: Vec<(Post, Judgment)>, generated_at: DateTime<Utc>) -> Report {
        sort_for_display(&mut matched);
        let html_body = self.render_html(&matched, generated_at);

        Report {
            generated_at,
            matched_posts: matched,
            html_body,
        }
    }

    fn render_html(&self, matched: &[(Post, Judgment)], generated_at: DateTime<Utc>) -> String {
        let title = html_escape(&self.title);
        let count = matched.len();
        let noun = if count == 1 { "post" } else { "posts" };

        let mut cards = String::new();
        if matched.is_empty() {
            let _ = write!(
                cards,
                r#"
    <div class="empty">
        <p>{NO_MATCHES_TEXT}.</p>
        <p>No posts matched your filter criteria in this run.</p>
    </div>
"#
            );
        }
        for (post, judgment) in matched {
            self.write_card(&mut cards, post, judgment, generated_at);
        }

        format!(
            r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{title}</title>
    <style>{STYLE}    </style>
</head>
<body>
    <h1>{title}</h1>
    <p>Generated on: {timestamp}</p>
    <div class="summary">
        <p>Found {count} {noun} matching your filter criteria.</p>
    </div>
{cards}</body>
</html>
"#,
            timestamp = generated_at.format("%Y-%m-%d %H:%M:%S UTC"),
        )
    }

    fn write_card(&self, out: &mut String, post: &Post, judgment: &Judgment, generated_at: DateTime<Utc>) {
        let reason = judgment
            .rationale
            .as_deref()
            .map(|r| format!("\n        <div class=\"reason\">{}</div>", html_escape(r)))
            .unwrap_or_default();

        let body = excerpt(&post.body, self.excerpt_chars);
        let body_html = if body.is_empty() {
            String::new()
        } else {
            format!("\n        <div class=\"excerpt\">{}</div>", html_escape(&body))
        };

        let title = html_escape(&post.title);
        let title_html = match safe_link(&post.url) {
            Some(url) => format!("<a href=\"{}\" target=\"_blank\">{}</a>", html_escape(&url), title),
            None => title,
        };

        let _ = write!(
            out,
            r#"
    <div class="post">
        <div class="meta"><span class="subreddit">r/{source}</span> · u/{author} · {score} points · {comments} comments · {age} ago</div>
        <div class="title">{title_html}</div>{reason}{body_html}
    </div>
"#,
            source = html_escape(&post.source_name),
            author = html_escape(&post.author),
            score = post.score,
            comments = post.num_comments,
            age = age_label(post.created_at, generated_at),
        );
    }
}

/// 只允許 http/https 連結，其餘（`javascript:`、`data:` 等）不產生超連結
pub fn safe_link(raw: &str) -> Option<String> {
    let url = Url::parse(raw.trim()).ok()?;
    matches!(url.scheme(), "http" | "https").then(|| url.to_string())
}

pub fn sort_for_display(matched: &mut [(Post, Judgment)]) {
    matched.sort_by(|(a, _), (b, _)| {
        b.score
            .cmp(&a.score)
            .then_with(|| b.created_at.cmp(&a.created_at))
    });
}

/// 以產生時間為基準的相對時間，例如 `5m`、`3h`、`2d`
pub fn age_label(created_at: DateTime<Utc>, generated_at: DateTime<Utc>) -> String {
    let seconds = (generated_at - created_at).num_seconds().max(0);
    match seconds {
        s if s < 60 => format!("{}s", s),
        s if s < 3_600 => format!("{}m", s / 60),
        s if s < 86_400 => format!("{}h", s / 3_600),
        s => format!("{}d", s / 86_400),
    }
}
