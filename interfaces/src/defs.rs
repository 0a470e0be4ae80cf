use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Where an item came from. The tag doubles as the namespace of its id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    Legislation,
    Regulation,
    Disaster,
    CommitteeMeeting,
    Watchlist,
}

impl SourceKind {
    pub const ALL: [SourceKind; 5] = [
        SourceKind::Watchlist,
        SourceKind::Legislation,
        SourceKind::Regulation,
        SourceKind::CommitteeMeeting,
        SourceKind::Disaster,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Legislation => "legislation",
            SourceKind::Regulation => "regulation",
            SourceKind::Disaster => "disaster",
            SourceKind::CommitteeMeeting => "committee-meeting",
            SourceKind::Watchlist => "watchlist",
        }
    }

    /// Heading used for this source's digest section.
    pub fn label(&self) -> &'static str {
        match self {
            SourceKind::Legislation => "Legislation",
            SourceKind::Regulation => "Federal Register",
            SourceKind::Disaster => "Disaster Declarations",
            SourceKind::CommitteeMeeting => "Committee Activity",
            SourceKind::Watchlist => "Priority Watchlist",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One normalized unit of external information.
///
/// `item_id` is the only identity key. `url`, `summary`, `category` and
/// `deadline` are carried for display and never take part in change detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub item_id: String,
    pub source: SourceKind,
    pub title: String,
    pub status: Option<String>,
    pub observed_at: DateTime<Utc>,
    pub url: Option<String>,
    pub summary: Option<String>,
    pub category: Option<String>,
    pub deadline: Option<NaiveDate>,
}

impl Item {
    pub fn new(item_id: impl Into<String>, source: SourceKind, title: impl Into<String>, observed_at: DateTime<Utc>) -> Self {
        Self {
            item_id: item_id.into(),
            source,
            title: title.into(),
            status: None,
            observed_at,
            url: None,
            summary: None,
            category: None,
            deadline: None,
        }
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_deadline(mut self, deadline: NaiveDate) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

/// Persisted memory of one item's observation history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeenRecord {
    pub item_id: String,
    pub source: SourceKind,
    pub title: String,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub last_status: Option<String>,
    #[serde(default)]
    pub notified: bool,
}

impl SeenRecord {
    pub fn first_observation(item: &Item) -> Self {
        Self {
            item_id: item.item_id.clone(),
            source: item.source,
            title: item.title.clone(),
            first_seen: item.observed_at,
            last_seen: item.observed_at,
            last_status: item.status.clone(),
            notified: false,
        }
    }
}

/// Everything that survives between runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackingStore {
    pub last_check: DateTime<Utc>,
    #[serde(default)]
    pub items: BTreeMap<String, SeenRecord>,
}

impl TrackingStore {
    pub fn empty(last_check: DateTime<Utc>) -> Self {
        Self {
            last_check,
            items: BTreeMap::new(),
        }
    }

    pub fn get(&self, item_id: &str) -> Option<&SeenRecord> {
        self.items.get(item_id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of tracked records per source namespace.
    pub fn count_by_source(&self) -> BTreeMap<SourceKind, usize> {
        let mut counts = BTreeMap::new();
        for record in self.items.values() {
            *counts.entry(record.source).or_insert(0) += 1;
        }
        counts
    }

    pub fn mark_notified<'a>(&mut self, item_ids: impl IntoIterator<Item = &'a str>) -> usize {
        let mut marked = 0;
        for item_id in item_ids {
            if let Some(record) = self.items.get_mut(item_id) {
                if !record.notified {
                    record.notified = true;
                    marked += 1;
                }
            }
        }
        marked
    }
}

/// The detector's verdict for one item against the current store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Classification {
    New,
    StatusChanged { from: Option<String>, to: String },
    Unchanged,
}

impl Classification {
    pub fn is_reportable(&self) -> bool {
        !matches!(self, Classification::Unchanged)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedItem {
    pub item: Item,
    pub classification: Classification,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Critical,
    High,
    Normal,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Critical => "critical",
            Priority::High => "high",
            Priority::Normal => "normal",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A source-native record as handed over by a fetcher.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    pub source: SourceKind,
    pub payload: serde_json::Value,
}

impl RawRecord {
    pub fn new(source: SourceKind, payload: serde_json::Value) -> Self {
        Self { source, payload }
    }
}
