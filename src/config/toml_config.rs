use crate::adapters::openrouter::OpenRouterSettings;
use crate::adapters::reddit::RedditSettings;
use crate::adapters::smtp::SmtpSettings;
use crate::core::delivery::{MailConfig, DEFAULT_SUBJECT_PREFIX};
use crate::core::filter::DEFAULT_MAX_BODY_CHARS;
use crate::core::pipeline::RunConfig;
use crate::core::report::{DEFAULT_EXCERPT_CHARS, DEFAULT_REPORT_TITLE};
use crate::domain::model::FilterCriterion;
use crate::utils::error::{IdeaFilterError, Result};
use crate::utils::validation::{self, Validate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const API_KEY_ENV_VAR: &str = "OPENROUTER_KEY";

const DEFAULT_LIMIT: usize = 10;
const MAX_LIMIT: usize = 100;
const DEFAULT_CLASSIFIER_ENDPOINT: &str = "https://openrouter.ai/api/v1/chat/completions";
const DEFAULT_MODEL: &str = "google/gemini-2.0-flash-001";
const DEFAULT_CLASSIFIER_TIMEOUT_SECS: u64 = 60;
const DEFAULT_REDDIT_BASE_URL: &str = "https://www.reddit.com";
const DEFAULT_REDDIT_OAUTH_BASE_URL: &str = "https://oauth.reddit.com";
const DEFAULT_REDDIT_AUTH_URL: &str = "https://www.reddit.com/api/v1/access_token";
const DEFAULT_USER_AGENT: &str = "rust:idea-filter:v0.1.0";
const DEFAULT_REDDIT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_OUTPUT_PATH: &str = "./reports";
const DEFAULT_SMTP_HOST: &str = "smtp.gmail.com";
const DEFAULT_SMTP_PORT: u16 = 587;
const DEFAULT_SMTP_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub sources: SourcesConfig,
    pub filter: FilterConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub reddit: RedditConfig,
    #[serde(default)]
    pub report: ReportConfig,
    pub mail: Option<MailSection>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcesConfig {
    pub names: Vec<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    pub criterion: String,
    pub max_body_chars: Option<usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClassifierConfig {
    pub endpoint: Option<String>,
    pub model: Option<String>,
    pub api_key: Option<String>,
    pub temperature: Option<f32>,
    pub timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RedditConfig {
    pub base_url: Option<String>,
    pub oauth_base_url: Option<String>,
    pub auth_url: Option<String>,
    pub user_agent: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub timeout_seconds: Option<u64>,
    pub request_delay_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportConfig {
    pub output_path: Option<String>,
    pub title: Option<String>,
    pub excerpt_chars: Option<usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MailSection {
    pub recipient: Option<String>,
    pub sender: Option<String>,
    pub smtp_host: Option<String>,
    pub smtp_port: Option<u16>,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
    pub subject_prefix: Option<String>,
    pub timeout_seconds: Option<u64>,
}

/// 空字串或未被替換的 `${VAR}` 視為未設定
fn resolved(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty() && !v.contains("${"))
}

impl AppConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(IdeaFilterError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| IdeaFilterError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${OPENROUTER_KEY})；找不到的變數保留原樣
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| IdeaFilterError::ConfigError {
            message: format!("invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn validate_config(&self) -> Result<()> {
        if self.sources.names.is_empty() {
            return Err(IdeaFilterError::ConfigValidationError {
                field: "sources.names".to_string(),
                message: "At least one subreddit must be configured".to_string(),
            });
        }
        for name in &self.sources.names {
            validation::validate_non_empty_string("sources.names", name)?;
        }
        validation::validate_range("sources.limit", self.limit(), 1, MAX_LIMIT)?;

        validation::validate_non_empty_string("filter.criterion", &self.filter.criterion)?;
        validation::validate_positive_number("filter.max_body_chars", self.max_body_chars(), 1)?;

        validation::validate_url("classifier.endpoint", self.classifier_endpoint())?;
        if self.classifier_api_key().is_none() {
            return Err(IdeaFilterError::ConfigValidationError {
                field: "classifier.api_key".to_string(),
                message: format!("Set classifier.api_key or the {} environment variable", API_KEY_ENV_VAR),
            });
        }

        let reddit = self.reddit_settings();
        validation::validate_url("reddit.base_url", &reddit.base_url)?;
        validation::validate_url("reddit.oauth_base_url", &reddit.oauth_base_url)?;
        validation::validate_url("reddit.auth_url", &reddit.auth_url)?;

        validation::validate_path("report.output_path", self.output_path())?;
        validation::validate_positive_number("report.excerpt_chars", self.excerpt_chars(), 1)?;

        if let Some(mail) = &self.mail {
            if let Some(recipient) = resolved(&mail.recipient) {
                validation::validate_email("mail.recipient", recipient)?;
                if let Some(sender) = resolved(&mail.sender) {
                    validation::validate_email("mail.sender", sender)?;
                }
                if let Some(host) = &mail.smtp_host {
                    validation::validate_non_empty_string("mail.smtp_host", host)?;
                }
            }
        }

        Ok(())
    }

    /// 轉為管道入口使用的執行設定
    pub fn run_config(&self) -> RunConfig {
        RunConfig {
            sources: self
                .sources
                .names
                .iter()
                .map(|name| name.trim().to_string())
                .collect(),
            limit: self.limit(),
            criterion: self.criterion(),
            max_body_chars: self.max_body_chars(),
            report_title: self.report_title().to_string(),
            excerpt_chars: self.excerpt_chars(),
            mail: self.mail_config(),
            generated_at: None,
        }
    }

    pub fn criterion(&self) -> FilterCriterion {
        FilterCriterion::new(self.filter.criterion.trim())
    }

    pub fn limit(&self) -> usize {
        self.sources.limit.unwrap_or(DEFAULT_LIMIT)
    }

    pub fn max_body_chars(&self) -> usize {
        self.filter.max_body_chars.unwrap_or(DEFAULT_MAX_BODY_CHARS)
    }

    pub fn output_path(&self) -> &str {
        self.report.output_path.as_deref().unwrap_or(DEFAULT_OUTPUT_PATH)
    }

    pub fn report_title(&self) -> &str {
        self.report.title.as_deref().unwrap_or(DEFAULT_REPORT_TITLE)
    }

    pub fn excerpt_chars(&self) -> usize {
        self.report.excerpt_chars.unwrap_or(DEFAULT_EXCERPT_CHARS)
    }

    pub fn classifier_endpoint(&self) -> &str {
        self.classifier
            .endpoint
            .as_deref()
            .unwrap_or(DEFAULT_CLASSIFIER_ENDPOINT)
    }

    /// 設定檔優先，其次為 `OPENROUTER_KEY` 環境變數
    pub fn classifier_api_key(&self) -> Option<String> {
        resolved(&self.classifier.api_key)
            .map(str::to_string)
            .or_else(|| std::env::var(API_KEY_ENV_VAR).ok().filter(|k| !k.trim().is_empty()))
    }

    pub fn classifier_settings(&self) -> Result<OpenRouterSettings> {
        let api_key = self
            .classifier_api_key()
            .ok_or_else(|| IdeaFilterError::ConfigValidationError {
                field: "classifier.api_key".to_string(),
                message: format!("Set classifier.api_key or the {} environment variable", API_KEY_ENV_VAR),
            })?;

        Ok(OpenRouterSettings {
            endpoint: self.classifier_endpoint().to_string(),
            model: self
                .classifier
                .model
                .clone()
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            api_key,
            temperature: self.classifier.temperature,
            timeout: Duration::from_secs(
                self.classifier
                    .timeout_seconds
                    .unwrap_or(DEFAULT_CLASSIFIER_TIMEOUT_SECS),
            ),
        })
    }

    pub fn reddit_settings(&self) -> RedditSettings {
        let r = &self.reddit;
        RedditSettings {
            base_url: r
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_REDDIT_BASE_URL.to_string()),
            oauth_base_url: r
                .oauth_base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_REDDIT_OAUTH_BASE_URL.to_string()),
            auth_url: r
                .auth_url
                .clone()
                .unwrap_or_else(|| DEFAULT_REDDIT_AUTH_URL.to_string()),
            user_agent: resolved(&r.user_agent)
                .unwrap_or(DEFAULT_USER_AGENT)
                .to_string(),
            client_id: resolved(&r.client_id).map(str::to_string),
            client_secret: resolved(&r.client_secret).map(str::to_string),
            timeout: Duration::from_secs(r.timeout_seconds.unwrap_or(DEFAULT_REDDIT_TIMEOUT_SECS)),
            request_delay: Duration::from_millis(r.request_delay_ms.unwrap_or(0)),
        }
    }

    /// 只有在收件人已設定時才寄信，否則僅保存本機報告
    pub fn mail_config(&self) -> Option<MailConfig> {
        let mail = self.mail.as_ref()?;
        let recipient = resolved(&mail.recipient)?;
        Some(MailConfig {
            recipient: recipient.to_string(),
            subject_prefix: mail
                .subject_prefix
                .clone()
                .unwrap_or_else(|| DEFAULT_SUBJECT_PREFIX.to_string()),
        })
    }

    pub fn smtp_settings(&self) -> Option<SmtpSettings> {
        let mail = self.mail.as_ref()?;
        resolved(&mail.recipient)?;

        let username = resolved(&mail.smtp_username).unwrap_or_default().to_string();
        let sender = resolved(&mail.sender)
            .map(str::to_string)
            .unwrap_or_else(|| username.clone());

        Some(SmtpSettings {
            host: mail
                .smtp_host
                .clone()
                .unwrap_or_else(|| DEFAULT_SMTP_HOST.to_string()),
            port: mail.smtp_port.unwrap_or(DEFAULT_SMTP_PORT),
            username,
            password: resolved(&mail.smtp_password).unwrap_or_default().to_string(),
            sender,
            timeout: Duration::from_secs(mail.timeout_seconds.unwrap_or(DEFAULT_SMTP_TIMEOUT_SECS)),
        })
    }

    /// 列出缺少的選用設定，對應功能會受限但不阻止執行
    pub fn missing_optional_settings(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        let reddit = &self.reddit;
        if resolved(&reddit.client_id).is_none() || resolved(&reddit.client_secret).is_none() {
            missing.push("reddit.client_id / reddit.client_secret (anonymous API will be used)");
        }
        match &self.mail {
            Some(mail) if resolved(&mail.recipient).is_some() => {
                if resolved(&mail.smtp_username).is_none() {
                    missing.push("mail.smtp_username");
                }
                if resolved(&mail.smtp_password).is_none() {
                    missing.push("mail.smtp_password");
                }
            }
            _ => missing.push("mail.recipient (email delivery disabled)"),
        }
        missing
    }
}

impl Validate for AppConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
