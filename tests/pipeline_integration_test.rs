use anyhow::Result;
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use httpmock::prelude::*;
use idea_filter::adapters::{OpenRouterClassifier, RedditSource};
use idea_filter::core::Mailer;
use idea_filter::utils::validation::Validate;
use idea_filter::{AppConfig, DeliveryCoordinator, DigestEngine, DigestPipeline, IdeaFilterError, LocalStorage};
use serde_json::json;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

const REPORT_FILE: &str = "idea-filter-report-2024-05-02.html";

fn reddit_post(id: &str, title: &str, score: i64) -> serde_json::Value {
    json!({
        "kind": "t3",
        "data": {
            "id": id,
            "title": title,
            "selftext": format!("Body for {}", title),
            "author": "someone",
            "score": score,
            "num_comments": 2,
            "created_utc": 1_714_600_000.0,
            "permalink": format!("/r/x/comments/{}/", id),
            "subreddit": "x"
        }
    })
}

fn listing(children: Vec<serde_json::Value>) -> serde_json::Value {
    json!({"kind": "Listing", "data": {"children": children, "after": null}})
}

fn completion(content: &str) -> serde_json::Value {
    json!({"choices": [{"message": {"role": "assistant", "content": content}}]})
}

fn app_config(reddit: &MockServer, llm: &MockServer, output: &str, mail: &str) -> Result<AppConfig> {
    let content = format!(
        r#"
[sources]
names = ["PropTech", "EdTech"]
limit = 5

[filter]
criterion = "Does the post ask for software that could be the basis of a startup?"

[classifier]
endpoint = "{llm}"
api_key = "sk-test"
model = "test/model"

[reddit]
base_url = "{reddit}"
user_agent = "idea-filter-tests"

[report]
output_path = "{output}"
{mail}
"#,
        llm = llm.url("/api/v1/chat/completions"),
        reddit = reddit.base_url(),
        output = output.replace('\\', "/"),
        mail = mail,
    );
    let config = AppConfig::from_toml_str(&content)?;
    config.validate()?;
    Ok(config)
}

fn build_pipeline(config: &AppConfig, mailer: Option<Arc<dyn Mailer>>) -> Result<DigestPipeline<LocalStorage>> {
    let source = Arc::new(RedditSource::new(config.reddit_settings())?);
    let classifier = Arc::new(OpenRouterClassifier::new(config.classifier_settings()?)?);

    let mut delivery = DeliveryCoordinator::new(LocalStorage::new(config.output_path().to_string()));
    if let Some(mailer) = mailer {
        delivery = delivery.with_mailer(mailer);
    }

    let mut run = config.run_config();
    run.generated_at = Some(Utc.with_ymd_and_hms(2024, 5, 2, 8, 30, 0).unwrap());

    Ok(DigestPipeline::new(source, classifier, delivery, run)?)
}

fn mock_sources(reddit: &MockServer) {
    reddit.mock(|when, then| {
        when.method(GET).path("/r/PropTech/new.json").query_param("limit", "5");
        then.status(200).json_body(listing(vec![
            reddit_post("a1", "Need a CRM for landlords", 5),
            reddit_post("a2", "Anyone using AI for listing photos", 20),
            reddit_post("a3", "Check out my company", 50),
        ]));
    });
    reddit.mock(|when, then| {
        when.method(GET).path("/r/EdTech/new.json").query_param("limit", "5");
        then.status(200).json_body(listing(vec![
            // 與 PropTech 的貼文 id 相同
            reddit_post("a1", "Is there a tool to grade essays", 10),
            reddit_post("e2", "Flaky classifier post", 99),
            json!({"kind": "t3", "data": {"title": "Record without id", "created_utc": 1.0}}),
        ]));
    });
}

fn mock_classifier(llm: &MockServer) {
    for title in [
        "Need a CRM for landlords",
        "Anyone using AI for listing photos",
        "Is there a tool to grade essays",
    ] {
        llm.mock(|when, then| {
            when.method(POST)
                .path("/api/v1/chat/completions")
                .body_contains(format!("Title: {}", title));
            then.status(200)
                .json_body(completion("YES\nAsks for software that does not exist yet."));
        });
    }
    llm.mock(|when, then| {
        when.method(POST)
            .path("/api/v1/chat/completions")
            .body_contains("Title: Check out my company");
        then.status(200).json_body(completion("NO"));
    });
    llm.mock(|when, then| {
        when.method(POST)
            .path("/api/v1/chat/completions")
            .body_contains("Title: Flaky classifier post");
        then.status(500).body("upstream error");
    });
}

/// 測試完整流程：兩個來源、id 衝突、分類失敗與排序
#[tokio::test]
async fn test_end_to_end_local_only() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let output = temp_dir.path().to_str().unwrap().to_string();
    let reddit = MockServer::start();
    let llm = MockServer::start();
    mock_sources(&reddit);
    mock_classifier(&llm);

    let config = app_config(&reddit, &llm, &output, "")?;
    let summary = DigestEngine::new(build_pipeline(&config, None)?).run().await?;

    assert_eq!(summary.fetched, 6);
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.duplicates, 0);
    assert_eq!(summary.evaluated, 5);
    assert_eq!(summary.matched, 3);
    assert!(summary.delivery.local_saved);
    assert!(!summary.delivery.email_sent);
    assert_eq!(summary.delivery.email_error, None);

    let html = std::fs::read_to_string(temp_dir.path().join(REPORT_FILE))?;
    assert!(html.contains("Found 3 posts matching"));
    assert!(!html.contains("Check out my company"));
    assert!(!html.contains("Flaky classifier post"));

    // 依分數遞減排列：20、10、5
    let photos = html.find("Anyone using AI for listing photos").unwrap();
    let essays = html.find("Is there a tool to grade essays").unwrap();
    let crm = html.find("Need a CRM for landlords").unwrap();
    assert!(photos < essays && essays < crm);
    assert!(html.contains("r/EdTech"));
    assert!(html.contains("Asks for software that does not exist yet."));

    Ok(())
}

/// 測試同樣輸入兩次執行產生相同報告
#[tokio::test]
async fn test_rerun_produces_identical_report() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let output = temp_dir.path().to_str().unwrap().to_string();
    let reddit = MockServer::start();
    let llm = MockServer::start();
    mock_sources(&reddit);
    mock_classifier(&llm);

    let config = app_config(&reddit, &llm, &output, "")?;
    DigestEngine::new(build_pipeline(&config, None)?).run().await?;
    let first = std::fs::read_to_string(temp_dir.path().join(REPORT_FILE))?;
    DigestEngine::new(build_pipeline(&config, None)?).run().await?;
    let second = std::fs::read_to_string(temp_dir.path().join(REPORT_FILE))?;

    assert_eq!(first, second);
    Ok(())
}

/// 測試分類器永遠回傳無法解析的內容時，結果為空但流程完成
#[tokio::test]
async fn test_malformed_classifier_output_yields_empty_report() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let output = temp_dir.path().to_str().unwrap().to_string();
    let reddit = MockServer::start();
    let llm = MockServer::start();
    mock_sources(&reddit);
    llm.mock(|when, then| {
        when.method(POST).path("/api/v1/chat/completions");
        then.status(200).json_body(completion("I cannot decide."));
    });

    let config = app_config(&reddit, &llm, &output, "")?;
    let summary = DigestEngine::new(build_pipeline(&config, None)?).run().await?;

    assert_eq!(summary.matched, 0);
    assert!(summary.delivery.local_saved);
    let html = std::fs::read_to_string(temp_dir.path().join(REPORT_FILE))?;
    assert!(html.contains("No matches found"));
    Ok(())
}

/// 測試來源全部失敗時仍產生空報告
#[tokio::test]
async fn test_unreachable_sources_still_produce_report() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let output = temp_dir.path().to_str().unwrap().to_string();
    let reddit = MockServer::start();
    let llm = MockServer::start();
    reddit.mock(|when, then| {
        when.method(GET);
        then.status(503);
    });

    let config = app_config(&reddit, &llm, &output, "")?;
    let summary = DigestEngine::new(build_pipeline(&config, None)?).run().await?;

    assert_eq!(summary.fetched, 0);
    assert_eq!(summary.evaluated, 0);
    assert!(summary.delivery.local_saved);
    Ok(())
}

#[derive(Default)]
struct RecordingMailer {
    sent: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, recipient: &str, subject: &str, _html_body: &str) -> idea_filter::Result<()> {
        self.sent.lock().unwrap().push((recipient.to_string(), subject.to_string()));
        Ok(())
    }
}

struct BrokenMailer;

#[async_trait]
impl Mailer for BrokenMailer {
    async fn send(&self, _recipient: &str, _subject: &str, _html_body: &str) -> idea_filter::Result<()> {
        Err(IdeaFilterError::MailError {
            message: "connection refused".to_string(),
        })
    }
}

const MAIL_SECTION: &str = r#"
[mail]
recipient = "founder@example.com"
subject_prefix = "Idea digest"
"#;

/// 測試設定郵件時寄出一封含筆數與日期的信件
#[tokio::test]
async fn test_end_to_end_with_email() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let output = temp_dir.path().to_str().unwrap().to_string();
    let reddit = MockServer::start();
    let llm = MockServer::start();
    mock_sources(&reddit);
    mock_classifier(&llm);

    let mailer = Arc::new(RecordingMailer::default());
    let transport: Arc<dyn Mailer> = mailer.clone();
    let config = app_config(&reddit, &llm, &output, MAIL_SECTION)?;
    let summary = DigestEngine::new(build_pipeline(&config, Some(transport))?)
        .run()
        .await?;

    assert!(summary.delivery.local_saved);
    assert!(summary.delivery.email_sent);
    let sent = mailer.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, "founder@example.com");
    assert_eq!(sent[0].1, "Idea digest - 3 matches - 2024-05-02");
    Ok(())
}

/// 測試郵件失敗時只算部分失敗，本機檔案仍保存
#[tokio::test]
async fn test_mail_failure_keeps_local_copy() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let output = temp_dir.path().to_str().unwrap().to_string();
    let reddit = MockServer::start();
    let llm = MockServer::start();
    mock_sources(&reddit);
    mock_classifier(&llm);

    let config = app_config(&reddit, &llm, &output, MAIL_SECTION)?;
    let transport: Arc<dyn Mailer> = Arc::new(BrokenMailer);
    let summary = DigestEngine::new(build_pipeline(&config, Some(transport))?)
        .run()
        .await?;

    assert!(summary.delivery.local_saved);
    assert!(!summary.delivery.email_sent);
    assert!(summary.delivery.email_error.unwrap().contains("connection refused"));
    assert!(temp_dir.path().join(REPORT_FILE).exists());
    Ok(())
}
