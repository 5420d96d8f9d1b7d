use crate::domain::model::{DeliveryResult, Report};
use crate::domain::ports::{Mailer, Storage};
use chrono::{DateTime, Utc};
use std::sync::Arc;

pub const DEFAULT_SUBJECT_PREFIX: &str = "Reddit Idea Filter Report";

/// 寄送報告所需的收件設定；SMTP 連線設定屬於 `Mailer` 實作
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailConfig {
    pub recipient: String,
    pub subject_prefix: String,
}

impl MailConfig {
    pub fn new(recipient: impl Into<String>) -> Self {
        Self {
            recipient: recipient.into(),
            subject_prefix: DEFAULT_SUBJECT_PREFIX.to_string(),
        }
    }
}

/// 同一天重新執行會覆寫前一份報告
pub fn report_file_name(generated_at: DateTime<Utc>) -> String {
    format!("idea-filter-report-{}.html", generated_at.format("%Y-%m-%d"))
}

pub fn email_subject(prefix: &str, report: &Report) -> String {
    let count = report.match_count();
    format!(
        "{} - {} {} - {}",
        prefix,
        count,
        if count == 1 { "match" } else { "matches" },
        report.generated_at.format("%Y-%m-%d")
    )
}

pub struct DeliveryCoordinator<S: Storage> {
    storage: S,
    mailer: Option<Arc<dyn Mailer>>,
}

impl<S: Storage> DeliveryCoordinator<S> {
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            mailer: None,
        }
    }

    pub fn with_mailer(mut self, mailer: Arc<dyn Mailer>) -> Self {
        self.mailer = Some(mailer);
        self
    }

    /// 先寫入本機檔案，再視設定寄出郵件；任何失敗都記錄在結果中而不中斷執行
    pub async fn deliver(&self, report: &Report, mail_config: Option<&MailConfig>) -> DeliveryResult {
        let mut result = DeliveryResult::default();

        let file_name = report_file_name(report.generated_at);
        match self
            .storage
            .write_file(&file_name, report.html_body.as_bytes())
            .await
        {
            Ok(path) => {
                tracing::info!(path = %path, "📁 Report saved locally");
                result.local_saved = true;
                result.local_path = Some(path);
            }
            Err(e) => {
                tracing::error!(file = %file_name, error = %e, "Failed to save report locally");
            }
        }

        let Some(mail_config) = mail_config else {
            tracing::info!("📭 Email not configured, report kept locally only");
            return result;
        };

        let Some(mailer) = &self.mailer else {
            tracing::warn!("Mail is configured but no mail transport is available");
            result.email_error = Some("no mail transport configured".to_string());
            return result;
        };

        let subject = email_subject(&mail_config.subject_prefix, report);
        match mailer
            .send(&mail_config.recipient, &subject, &report.html_body)
            .await
        {
            Ok(()) => {
                tracing::info!(recipient = %mail_config.recipient, subject = %subject, "📧 Email report sent");
                result.email_sent = true;
            }
            Err(e) => {
                tracing::error!(
                    recipient = %mail_config.recipient,
                    error = %e,
                    "Failed to send email report; the local copy is still available"
                );
                result.email_error = Some(e.to_string());
            }
        }

        result
    }
}
