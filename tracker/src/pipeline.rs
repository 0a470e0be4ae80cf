use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use email_delivery::{comment_alert, digest_subject, DigestSender, EmailResult, OutgoingEmail, SendGridSender, SmtpSender, SmtpSettings};
use interfaces::{
    cleanup, normalize_batch, window_days, ChangeDetector, Digest, DigestAssembler, SourceKind, StateStore, TrackingStore,
    MAX_WINDOW_DAYS,
};
use tracing::{error, info, warn};

use crate::config::{Config, Credentials, EmailProvider, NotificationsConfig};
use crate::fetcher::Fetcher;
use crate::render::{render_markdown, save_digest};
use crate::sources::{CommitteeFeeds, CommitteeMeetings, CongressBills, CongressClient, FederalRegister, OpenFema, Watchlist};
use crate::traits::SourceFetcher;
use crate::types::{Result, TrackerError};

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub save_digest: bool,
    pub send_email: bool,
    /// Overrides the configured lookback.
    pub days_back: Option<i64>,
    /// Run start; `Utc::now()` when unset.
    pub now: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct SourceFailure {
    pub source_name: String,
    pub source_kind: SourceKind,
    pub error: String,
}

#[derive(Debug, Clone)]
pub struct DeliveryReport {
    pub digest: EmailResult,
    pub alert: Option<EmailResult>,
    pub marked_notified: usize,
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub since: DateTime<Utc>,
    pub records_fetched: usize,
    pub normalization_failures: usize,
    pub source_failures: Vec<SourceFailure>,
    pub expired: usize,
    pub digest: Digest,
    pub markdown: String,
    pub digest_path: Option<PathBuf>,
    /// Set when the digest file could not be written; delivery still ran.
    pub digest_error: Option<String>,
    pub delivery: Option<DeliveryReport>,
}

/// One polling run: fetch, classify, persist, then report.
///
/// State is saved before anything is delivered, so a digest never announces
/// changes that were not durably recorded.
pub struct Tracker {
    store: StateStore,
    sources: Vec<Box<dyn SourceFetcher>>,
    assembler: DigestAssembler,
    retention: Duration,
    days_back: i64,
    output_dir: PathBuf,
    title: String,
    sender: Option<Box<dyn DigestSender>>,
    notifications: NotificationsConfig,
}

impl Tracker {
    pub fn new(store: StateStore, assembler: DigestAssembler) -> Self {
        Self {
            store,
            sources: Vec::new(),
            assembler,
            retention: Duration::days(90),
            days_back: 7,
            output_dir: PathBuf::from("data/digests"),
            title: "Legislative Tracker".to_string(),
            sender: None,
            notifications: NotificationsConfig::default(),
        }
    }

    /// Wire every enabled source and the configured email transport.
    pub fn from_config(config: &Config, credentials: &Credentials) -> Result<Self> {
        config.validate(credentials)?;

        let fetcher = Arc::new(Fetcher::new(config.fetch_config())?);
        let assembler = DigestAssembler::new(config.congress.priority_keywords.clone())
            .with_comment_warning_days(config.federal_register.comment_warning_days);

        let mut tracker = Self::new(StateStore::new(&config.state.path), assembler)
            .with_retention_days(config.state.retention_days)
            .with_days_back(config.digest.days_back)
            .with_output_dir(&config.digest.output_dir)
            .with_title(&config.notifications.subject_prefix);

        let congress = credentials
            .congress_api_key
            .as_ref()
            .map(|key| CongressClient::new(fetcher.clone(), &config.congress.api_base, key.clone()));
        let toggles = &config.sources;

        // Watchlist first so its categories win when an id also turns up in search results.
        if let (true, Some(client)) = (toggles.watchlist, &congress) {
            tracker = tracker.with_source(Box::new(Watchlist::new(client.clone(), &config.watchlist.path)));
        }
        if let (true, Some(client)) = (toggles.legislation, &congress) {
            tracker = tracker.with_source(Box::new(CongressBills::new(client.clone(), config.congress.clone())));
        }
        if toggles.federal_register {
            tracker = tracker.with_source(Box::new(FederalRegister::new(fetcher.clone(), config.federal_register.clone())));
        }
        if let (true, Some(client)) = (toggles.committee_meetings, &congress) {
            tracker = tracker.with_source(Box::new(CommitteeMeetings::new(
                client.clone(),
                config.congress.current_congress,
                config.committees.clone(),
            )));
        }
        if toggles.committee_feeds {
            tracker = tracker.with_source(Box::new(CommitteeFeeds::new(fetcher.clone(), config.committees.rss_feeds.clone())));
        }
        if toggles.disasters {
            tracker = tracker.with_source(Box::new(OpenFema::new(fetcher.clone(), config.openfema.clone())));
        }

        if let Some(sender) = build_sender(&config.notifications, credentials) {
            tracker = tracker.with_sender(sender, config.notifications.clone());
        }

        Ok(tracker)
    }

    pub fn with_source(mut self, source: Box<dyn SourceFetcher>) -> Self {
        info!("Adding source: {}", source.source_name());
        self.sources.push(source);
        self
    }

    /// Counts outside `0..=MAX_WINDOW_DAYS` are clamped into range.
    pub fn with_retention_days(mut self, days: i64) -> Self {
        self.retention = Duration::days(days.clamp(0, MAX_WINDOW_DAYS));
        self
    }

    pub fn with_days_back(mut self, days: i64) -> Self {
        self.days_back = days;
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_sender(mut self, sender: Box<dyn DigestSender>, notifications: NotificationsConfig) -> Self {
        self.sender = Some(sender);
        self.notifications = notifications;
        self
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    pub async fn run(&self, options: RunOptions) -> Result<RunReport> {
        let started_at = options.now.unwrap_or_else(Utc::now);
        let days_back = options.days_back.unwrap_or(self.days_back);
        let lookback = window_days(days_back).ok_or_else(|| {
            TrackerError::Config(format!("days_back must be between 0 and {MAX_WINDOW_DAYS}, got {days_back}"))
        })?;

        // Load state; a corrupt file aborts the run before any fetch
        let mut store = self.store.load_at(started_at)?;
        let since = started_at
            .checked_sub_signed(lookback)
            .map_or(DateTime::<Utc>::MIN_UTC, |floor| store.last_check.min(floor));
        info!("Starting run at {} (looking back to {})", started_at, since);

        let mut records = Vec::new();
        let mut source_failures = Vec::new();
        // One failing source is recorded and skipped
        for source in &self.sources {
            let name = source.source_name();
            match source.fetch(since).await {
                Ok(mut batch) => {
                    info!("{}: {} records", name, batch.len());
                    records.append(&mut batch);
                }
                Err(e) => {
                    error!("Source {} failed: {}", name, e);
                    source_failures.push(SourceFailure {
                        source_name: name,
                        source_kind: source.source_kind(),
                        error: e.to_string(),
                    });
                }
            }
        }

        // Normalize and classify against what was seen before
        let normalized = normalize_batch(&records, started_at);
        if !normalized.failures.is_empty() {
            warn!("{} records could not be normalized", normalized.failures.len());
        }

        let classified = ChangeDetector::new().classify_batch(normalized.items, &mut store);

        let expired = cleanup(&mut store, self.retention, started_at);
        store.last_check = started_at;
        // Persist before any output leaves the process.
        self.store.save(&store)?;

        // Build the report
        let digest = self.assembler.assemble(&classified, started_at.date_naive());
        let markdown = render_markdown(&digest, &self.title);
        info!(
            "Digest: {} new, {} status changes, {} comment alerts",
            digest.total_new,
            digest.total_status_changes,
            digest.comment_alerts.len()
        );

        // A digest file that cannot be written is reported, not fatal
        let mut digest_error = None;
        let digest_path = if options.save_digest {
            match save_digest(&markdown, &self.output_dir, &digest) {
                Ok(path) => Some(path),
                Err(e) => {
                    error!("Could not save digest under {}: {}", self.output_dir.display(), e);
                    digest_error = Some(e.to_string());
                    None
                }
            }
        } else {
            None
        };

        // Deliver
        let delivery = if options.send_email {
            Some(self.deliver(&digest, &markdown, &mut store).await?)
        } else {
            None
        };

        Ok(RunReport {
            started_at,
            since,
            records_fetched: records.len(),
            normalization_failures: normalized.failures.len(),
            source_failures,
            expired,
            digest,
            markdown,
            digest_path,
            digest_error,
            delivery,
        })
    }

    /// Send the digest and any comment alert. Only a failed re-save is an `Err`.
    async fn deliver(&self, digest: &Digest, markdown: &str, store: &mut TrackingStore) -> Result<DeliveryReport> {
        let Some(sender) = &self.sender else {
            warn!("Email requested but no email transport is configured");
            return Ok(DeliveryReport {
                digest: EmailResult::failed("Email transport not configured"),
                alert: None,
                marked_notified: 0,
            });
        };
        let n = &self.notifications;

        let subject = digest_subject(&self.title, digest.date, digest.total_new, digest.total_status_changes);
        let email = OutgoingEmail::from_markdown(&n.from_email, n.email_recipients.clone(), subject, markdown);
        let digest_result = send_logged(sender.as_ref(), &email).await;

        let alert = match comment_alert(&self.title, &digest.comment_alerts) {
            Some((subject, body)) => {
                let email = OutgoingEmail::from_markdown(&n.from_email, n.email_recipients.clone(), subject, body);
                Some(send_logged(sender.as_ref(), &email).await)
            }
            None => None,
        };

        // Only a delivered digest marks its items notified
        let mut marked_notified = 0;
        if digest_result.success {
            marked_notified = store.mark_notified(digest.entries().map(|e| e.item.item_id.as_str()));
            if marked_notified > 0 {
                self.store.save(store)?;
            }
        }

        Ok(DeliveryReport {
            digest: digest_result,
            alert,
            marked_notified,
        })
    }
}

async fn send_logged(sender: &dyn DigestSender, email: &OutgoingEmail) -> EmailResult {
    match sender.send(email).await {
        Ok(result) => {
            if !result.success {
                error!("{} delivery failed: {}", sender.provider(), result.message);
            }
            result
        }
        Err(e) => {
            error!("{} delivery failed: {:#}", sender.provider(), e);
            EmailResult::failed(e.to_string())
        }
    }
}

fn build_sender(notifications: &NotificationsConfig, credentials: &Credentials) -> Option<Box<dyn DigestSender>> {
    match notifications.provider {
        EmailProvider::Sendgrid => {
            let key = credentials.sendgrid_api_key.as_ref()?;
            let mut sender = SendGridSender::new(key.clone());
            if let Some(base) = &notifications.sendgrid_api_base {
                sender = sender.with_base_url(base.clone());
            }
            Some(Box::new(sender))
        }
        EmailProvider::Smtp => Some(Box::new(SmtpSender::new(SmtpSettings {
            host: notifications.smtp.host.clone(),
            port: notifications.smtp.port,
            username: notifications.smtp.username.clone(),
            password: credentials.smtp_password.clone(),
        }))),
    }
}
