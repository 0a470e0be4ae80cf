use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use interfaces::{RawRecord, SourceKind};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::sources::congress::CongressClient;
use crate::traits::SourceFetcher;
use crate::types::Result;

/// Hand-curated list of bills and regulatory actions to follow regardless of
/// keyword matches.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WatchlistFile {
    pub high_priority: Vec<WatchedBill>,
    pub funding_appropriations: Vec<WatchedBill>,
    pub other_notable: Vec<WatchedBill>,
    pub regulatory_comments: Vec<RegulatoryEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WatchedBill {
    /// `119-hr-2093` form.
    pub bill_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, alias = "nafsma_notes")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegulatoryEntry {
    pub name: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub federal_register_date: Option<String>,
    #[serde(default, alias = "nafsma_status")]
    pub status: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub comment_deadline: Option<String>,
    #[serde(default)]
    pub effective_date: Option<String>,
}

impl WatchlistFile {
    /// A missing file is an empty watchlist; a malformed one is an error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!("Watchlist file not found: {}", path.display());
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)?;
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(&text)?)
    }

    /// Bills paired with the label of the list they appear in.
    pub fn bills(&self) -> impl Iterator<Item = (&'static str, &WatchedBill)> {
        let high = self.high_priority.iter().map(|b| ("High Priority", b));
        let funding = self.funding_appropriations.iter().map(|b| ("Funding & Appropriations", b));
        let notable = self.other_notable.iter().map(|b| ("Other Notable", b));
        high.chain(funding).chain(notable)
    }
}

/// Split `119-hr-2093` into congress, type and number.
pub fn parse_bill_id(bill_id: &str) -> Option<(u64, String, String)> {
    let lowered = bill_id.trim().to_lowercase();
    let mut parts = lowered.split('-');
    let congress = parts.next()?.parse().ok()?;
    let bill_type = parts.next()?;
    let number = parts.next()?;
    if parts.next().is_some()
        || bill_type.is_empty()
        || !bill_type.chars().all(|c| c.is_ascii_alphabetic())
        || number.is_empty()
        || !number.chars().all(|c| c.is_ascii_digit())
    {
        return None;
    }
    Some((congress, bill_type.to_string(), number.to_string()))
}

pub struct Watchlist {
    client: CongressClient,
    path: PathBuf,
}

impl Watchlist {
    pub fn new(client: CongressClient, path: impl Into<PathBuf>) -> Self {
        Self {
            client,
            path: path.into(),
        }
    }

    async fn bill_record(&self, category: &str, bill: &WatchedBill) -> Option<RawRecord> {
        let Some((congress, bill_type, number)) = parse_bill_id(&bill.bill_id) else {
            warn!("Skipping invalid watchlist bill id: {}", bill.bill_id);
            return None;
        };

        let details = match self.client.bill_details(congress, &bill_type, &number).await {
            Ok(details) => details,
            Err(e) => {
                warn!("Failed to fetch status for {}: {}", bill.bill_id, e);
                None
            }
        };

        // Curated fields fill in or override the API payload
        let mut payload = details.unwrap_or_else(|| json!({}));
        let obj = payload.as_object_mut()?;
        if !obj.get("title").is_some_and(Value::is_string) && !bill.title.is_empty() {
            obj.insert("title".to_string(), json!(bill.title));
        }
        obj.insert("congress".to_string(), json!(congress));
        obj.insert("type".to_string(), json!(bill_type));
        obj.insert("number".to_string(), json!(number));
        obj.insert("category".to_string(), json!(category));
        if let Some(notes) = &bill.notes {
            obj.insert("notes".to_string(), json!(notes));
        }

        Some(RawRecord::new(SourceKind::Watchlist, payload))
    }
}

fn regulatory_record(entry: &RegulatoryEntry) -> RawRecord {
    RawRecord::new(
        SourceKind::Watchlist,
        json!({
            "kind": "regulatory",
            "name": entry.name,
            "url": entry.url,
            "federal_register_date": entry.federal_register_date,
            "status": entry.status,
            "notes": entry.notes,
            "comment_deadline": entry.comment_deadline,
            "effective_date": entry.effective_date,
        }),
    )
}

#[async_trait]
impl SourceFetcher for Watchlist {
    fn source_kind(&self) -> SourceKind {
        SourceKind::Watchlist
    }

    fn source_name(&self) -> String {
        format!("Watchlist ({})", self.path.display())
    }

    async fn fetch(&self, _since: DateTime<Utc>) -> Result<Vec<RawRecord>> {
        let watchlist = WatchlistFile::load(&self.path)?;

        let mut records = Vec::new();
        for (category, bill) in watchlist.bills() {
            if let Some(record) = self.bill_record(category, bill).await {
                records.push(record);
            }
        }
        let bill_count = records.len();
        records.extend(watchlist.regulatory_comments.iter().map(regulatory_record));

        info!(
            "Watchlist produced {} bills and {} regulatory entries",
            bill_count,
            records.len() - bill_count
        );
        Ok(records)
    }
}
