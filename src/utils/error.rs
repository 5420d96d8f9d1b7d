use thiserror::Error;

#[derive(Error, Debug)]
pub enum IdeaFilterError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration validation failed for '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Source '{source_name}' failed: {message}")]
    SourceError { source_name: String, message: String },

    #[error("Classifier error: {message}")]
    ClassifierError { message: String },

    #[error("Mail delivery error: {message}")]
    MailError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Network,
    External,
    Storage,
    Data,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Medium,
    High,
    Critical,
}

impl IdeaFilterError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::ConfigError { .. }
            | Self::ConfigValidationError { .. }
            | Self::InvalidConfigValueError { .. } => ErrorCategory::Configuration,
            Self::HttpError(_) => ErrorCategory::Network,
            Self::SourceError { .. } | Self::ClassifierError { .. } | Self::MailError { .. } => {
                ErrorCategory::External
            }
            Self::IoError(_) => ErrorCategory::Storage,
            Self::SerializationError(_) => ErrorCategory::Data,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Configuration => ErrorSeverity::High,
            ErrorCategory::Network | ErrorCategory::External => ErrorSeverity::Medium,
            ErrorCategory::Data => ErrorSeverity::High,
            ErrorCategory::Storage => ErrorSeverity::Critical,
        }
    }

    /// 程序結束碼：外部服務問題為 2，設定或資料問題為 1，無法寫入輸出為 3
    pub fn exit_code(&self) -> i32 {
        match self.severity() {
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        }
    }

    pub fn recovery_suggestion(&self) -> String {
        match self {
            Self::ConfigError { .. } => {
                "Check the configuration file and the .env file next to it".to_string()
            }
            Self::ConfigValidationError { field, .. }
            | Self::InvalidConfigValueError { field, .. } => {
                format!("Fix the '{}' setting in the configuration file", field)
            }
            Self::HttpError(_) => "Check network connectivity and retry later".to_string(),
            Self::SourceError { source_name, .. } => format!(
                "Verify that '{}' exists and that the Reddit credentials are valid",
                source_name
            ),
            Self::ClassifierError { .. } => {
                "Verify OPENROUTER_KEY and the classifier model name".to_string()
            }
            Self::MailError { .. } => {
                "Verify the SMTP host, port and credentials in the [mail] section".to_string()
            }
            Self::IoError(_) => "Check that the output directory is writable".to_string(),
            Self::SerializationError(_) => {
                "Run again with --verbose and inspect the logged payload".to_string()
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Configuration => format!("Configuration problem: {}", self),
            ErrorCategory::Network => format!("Network problem: {}", self),
            ErrorCategory::External => format!("External service problem: {}", self),
            ErrorCategory::Storage => format!("Could not write output: {}", self),
            ErrorCategory::Data => format!("Unexpected data: {}", self),
        }
    }
}

pub type Result<T> = std::result::Result<T, IdeaFilterError>;
