use interfaces::SourceKind;

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub user_agent: String,
    pub timeout_seconds: u64,
    pub max_response_mb: usize,
    pub max_redirects: usize,
    /// Minimum spacing between two requests to the same host.
    pub min_request_interval_ms: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "Legislative-Tracker/1.0".to_string(),
            timeout_seconds: 30,
            max_response_mb: 10,
            max_redirects: 5,
            min_request_interval_ms: 250,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    #[error("Response from {url} exceeds limit: {size_mb}MB")]
    ResponseTooLarge { url: String, size_mb: usize },

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("State error: {0}")]
    State(#[from] interfaces::StateError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Feed parse error: {0}")]
    Parse(String),

    #[error("{source_kind} source failed: {reason}")]
    Source { source_kind: SourceKind, reason: String },
}

pub type Result<T> = std::result::Result<T, TrackerError>;
