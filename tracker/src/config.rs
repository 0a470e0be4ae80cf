use std::fmt;
use std::path::{Path, PathBuf};

use interfaces::{PriorityRules, MAX_WINDOW_DAYS};
use serde::Deserialize;
use tracing::info;

use crate::types::{FetchConfig, Result, TrackerError};

pub const DEFAULT_CONFIG_PATH: &str = "data/config.yaml";

/// Tracker configuration, read from YAML. Every section may be omitted.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub congress: CongressConfig,
    pub federal_register: FederalRegisterConfig,
    pub openfema: OpenFemaConfig,
    pub committees: CommitteesConfig,
    pub watchlist: WatchlistConfig,
    pub notifications: NotificationsConfig,
    pub state: StateConfig,
    pub digest: DigestConfig,
    pub fetch: FetchSettings,
    pub sources: SourceToggles,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CongressConfig {
    pub api_base: String,
    pub current_congress: u32,
    pub bill_limit: u32,
    pub title_keywords: Vec<String>,
    pub relevant_policy_areas: Vec<String>,
    pub relevant_subjects: Vec<String>,
    pub priority_keywords: PriorityRules,
}

impl Default for CongressConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.congress.gov/v3".to_string(),
            current_congress: 119,
            bill_limit: 250,
            title_keywords: Vec::new(),
            relevant_policy_areas: Vec::new(),
            relevant_subjects: Vec::new(),
            priority_keywords: PriorityRules::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AgencyConfig {
    pub slug: String,
    #[serde(default)]
    pub name: Option<String>,
}

impl AgencyConfig {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.slug)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FederalRegisterConfig {
    pub api_base: String,
    pub agencies: Vec<AgencyConfig>,
    pub document_types: Vec<String>,
    pub comment_warning_days: i64,
    pub per_page: u32,
}

impl Default for FederalRegisterConfig {
    fn default() -> Self {
        Self {
            api_base: "https://www.federalregister.gov/api/v1".to_string(),
            agencies: Vec::new(),
            document_types: vec!["Proposed Rule".to_string(), "Rule".to_string(), "Notice".to_string()],
            comment_warning_days: 7,
            per_page: 50,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OpenFemaConfig {
    pub api_base: String,
    pub incident_types: Vec<String>,
    pub days_back: i64,
    pub limit: u32,
}

impl Default for OpenFemaConfig {
    fn default() -> Self {
        let incident_types = [
            "Flood",
            "Severe Storm",
            "Hurricane",
            "Coastal Storm",
            "Severe Storm(s)",
            "Typhoon",
            "Dam/Levee Break",
            "Tornado",
            "Mud/Landslide",
        ];
        Self {
            api_base: "https://www.fema.gov/api/open/v2".to_string(),
            incident_types: incident_types.iter().map(|s| s.to_string()).collect(),
            days_back: 7,
            limit: 100,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrackedCommittee {
    pub code: String,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CommitteesConfig {
    pub tracked_committees: Vec<TrackedCommittee>,
    pub meetings_days_back: i64,
    pub meeting_list_limit: u32,
    pub rss_feeds: Vec<FeedConfig>,
}

impl Default for CommitteesConfig {
    fn default() -> Self {
        Self {
            tracked_committees: Vec::new(),
            meetings_days_back: 14,
            meeting_list_limit: 100,
            rss_feeds: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WatchlistConfig {
    pub path: PathBuf,
}

impl Default for WatchlistConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/watchlist.yaml"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmailProvider {
    #[default]
    Sendgrid,
    Smtp,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 587,
            username: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NotificationsConfig {
    pub provider: EmailProvider,
    pub email_recipients: Vec<String>,
    pub from_email: String,
    pub subject_prefix: String,
    pub sendgrid_api_base: Option<String>,
    pub smtp: SmtpConfig,
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            provider: EmailProvider::default(),
            email_recipients: Vec::new(),
            from_email: "noreply@example.com".to_string(),
            subject_prefix: "Legislative Tracker".to_string(),
            sendgrid_api_base: None,
            smtp: SmtpConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StateConfig {
    pub path: PathBuf,
    pub retention_days: i64,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/state.json"),
            retention_days: 90,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DigestConfig {
    pub output_dir: PathBuf,
    /// How far back a run looks even when the last check was more recent.
    pub days_back: i64,
}

impl Default for DigestConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("data/digests"),
            days_back: 7,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetchSettings {
    pub user_agent: String,
    pub timeout_seconds: u64,
    pub max_response_mb: usize,
    pub min_request_interval_ms: u64,
}

impl Default for FetchSettings {
    fn default() -> Self {
        let defaults = FetchConfig::default();
        Self {
            user_agent: defaults.user_agent,
            timeout_seconds: defaults.timeout_seconds,
            max_response_mb: defaults.max_response_mb,
            min_request_interval_ms: defaults.min_request_interval_ms,
        }
    }
}

impl From<&FetchSettings> for FetchConfig {
    fn from(settings: &FetchSettings) -> Self {
        Self {
            user_agent: settings.user_agent.clone(),
            timeout_seconds: settings.timeout_seconds,
            max_response_mb: settings.max_response_mb,
            min_request_interval_ms: settings.min_request_interval_ms,
            ..FetchConfig::default()
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SourceToggles {
    pub legislation: bool,
    pub federal_register: bool,
    pub disasters: bool,
    pub committee_meetings: bool,
    pub committee_feeds: bool,
    pub watchlist: bool,
}

impl Default for SourceToggles {
    fn default() -> Self {
        Self {
            legislation: true,
            federal_register: true,
            disasters: true,
            committee_meetings: true,
            committee_feeds: true,
            watchlist: true,
        }
    }
}

impl SourceToggles {
    pub fn needs_congress_api(&self) -> bool {
        self.legislation || self.committee_meetings || self.watchlist
    }
}

impl Config {
    /// Load from a YAML file. A missing or malformed file is an error.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| TrackerError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        let config = Self::from_yaml_str(&text)?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(text)?)
    }

    /// Checks that must pass before any source is contacted.
    pub fn validate(&self, credentials: &Credentials) -> Result<()> {
        if self.sources.needs_congress_api() && credentials.congress_api_key.is_none() {
            return Err(TrackerError::Config(
                "CONGRESS_API_KEY is not set but a Congress.gov source is enabled".to_string(),
            ));
        }
        let windows = [
            ("state.retention_days", self.state.retention_days),
            ("digest.days_back", self.digest.days_back),
            ("openfema.days_back", self.openfema.days_back),
            ("committees.meetings_days_back", self.committees.meetings_days_back),
        ];
        for (name, days) in windows {
            if !(0..=MAX_WINDOW_DAYS).contains(&days) {
                return Err(TrackerError::Config(format!(
                    "{name} must be between 0 and {MAX_WINDOW_DAYS}, got {days}"
                )));
            }
        }
        Ok(())
    }

    pub fn fetch_config(&self) -> FetchConfig {
        FetchConfig::from(&self.fetch)
    }
}

/// Secrets, read from the environment once at startup.
#[derive(Clone, Default)]
pub struct Credentials {
    pub congress_api_key: Option<String>,
    pub sendgrid_api_key: Option<String>,
    pub smtp_password: Option<String>,
}

impl Credentials {
    pub fn from_env() -> Self {
        let read = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());
        Self {
            congress_api_key: read("CONGRESS_API_KEY"),
            sendgrid_api_key: read("SENDGRID_API_KEY"),
            smtp_password: read("SMTP_PASSWORD"),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mask = |v: &Option<String>| if v.is_some() { "<set>" } else { "<unset>" };
        f.debug_struct("Credentials")
            .field("congress_api_key", &mask(&self.congress_api_key))
            .field("sendgrid_api_key", &mask(&self.sendgrid_api_key))
            .field("smtp_password", &mask(&self.smtp_password))
            .finish()
    }
}
