use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use feed_rs::parser;
use interfaces::{RawRecord, SourceKind};
use serde_json::json;
use tracing::{debug, error, info, warn};

use crate::config::FeedConfig;
use crate::fetcher::Fetcher;
use crate::traits::SourceFetcher;
use crate::types::{Result, TrackerError};

/// A feed entry reduced to the fields the tracker keeps.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedEntry {
    pub guid: String,
    pub title: String,
    pub link: Option<String>,
    pub published: Option<DateTime<Utc>>,
    pub description: Option<String>,
}

/// Parse RSS or Atom content, dropping entries that repeat a guid.
pub fn parse_feed(content: &str) -> Result<Vec<FeedEntry>> {
    let feed = parser::parse(content.as_bytes())
        .map_err(|e| TrackerError::Parse(format!("Failed to parse feed: {}", e)))?;

    let mut seen = HashSet::new();
    let mut entries = Vec::new();
    for entry in feed.entries {
        let link = entry.links.first().map(|l| l.href.clone());
        let guid = if !entry.id.is_empty() {
            entry.id.clone()
        } else if let Some(link) = &link {
            link.clone()
        } else {
            debug!("Skipping feed entry without id or link");
            continue;
        };
        if !seen.insert(guid.clone()) {
            debug!("Skipping duplicate entry with GUID: {}", guid);
            continue;
        }

        entries.push(FeedEntry {
            guid,
            title: entry.title.map(|t| t.content).unwrap_or_else(|| "Untitled".to_string()),
            link,
            published: entry.published.or(entry.updated),
            description: entry.summary.map(|s| s.content),
        });
    }
    Ok(entries)
}

fn matches_keywords(entry: &FeedEntry, keywords: &[String]) -> bool {
    let text = format!("{} {}", entry.title, entry.description.as_deref().unwrap_or("")).to_lowercase();
    keywords.iter().any(|k| text.contains(&k.to_lowercase()))
}

/// Committee press and hearing feeds.
pub struct CommitteeFeeds {
    fetcher: Arc<Fetcher>,
    feeds: Vec<FeedConfig>,
}

impl CommitteeFeeds {
    pub fn new(fetcher: Arc<Fetcher>, feeds: Vec<FeedConfig>) -> Self {
        Self { fetcher, feeds }
    }

    async fn fetch_feed(&self, feed: &FeedConfig) -> Result<Vec<RawRecord>> {
        // Fetch and parse
        let content = self.fetcher.get_text(&feed.url).await?;
        let entries = parse_feed(&content)?;
        let total = entries.len();

        let records: Vec<RawRecord> = entries
            .into_iter()
            // Keep entries matching the feed's keywords
            .filter(|e| feed.keywords.is_empty() || matches_keywords(e, &feed.keywords))
            .map(|e| {
                RawRecord::new(
                    SourceKind::CommitteeMeeting,
                    json!({
                        "kind": "rss",
                        "id": e.guid,
                        "title": e.title,
                        "link": e.link,
                        "published": e.published.map(|p| p.to_rfc3339()),
                        "description": e.description,
                        "feed": feed.name,
                    }),
                )
            })
            .collect();

        info!("Found {} of {} items from {}", records.len(), total, feed.name);
        Ok(records)
    }
}

#[async_trait]
impl SourceFetcher for CommitteeFeeds {
    fn source_kind(&self) -> SourceKind {
        SourceKind::CommitteeMeeting
    }

    fn source_name(&self) -> String {
        "Committee RSS feeds".to_string()
    }

    async fn fetch(&self, _since: DateTime<Utc>) -> Result<Vec<RawRecord>> {
        if self.feeds.is_empty() {
            warn!("No committee RSS feeds configured");
            return Ok(Vec::new());
        }

        let mut records = Vec::new();
        let mut failed = 0;
        for feed in &self.feeds {
            info!("Fetching RSS feed from {}...", feed.name);
            match self.fetch_feed(feed).await {
                Ok(mut batch) => records.append(&mut batch),
                Err(e) => {
                    error!("Error fetching RSS feed from {}: {}", feed.name, e);
                    failed += 1;
                }
            }
        }

        if failed == self.feeds.len() {
            return Err(TrackerError::Source {
                source_kind: SourceKind::CommitteeMeeting,
                reason: format!("all {} committee feeds failed", failed),
            });
        }
        Ok(records)
    }
}
