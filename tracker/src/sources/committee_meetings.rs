use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use interfaces::{RawRecord, SourceKind, MAX_WINDOW_DAYS};
use serde_json::Value;
use tracing::{info, warn};

use crate::config::CommitteesConfig;
use crate::sources::congress::CongressClient;
use crate::traits::SourceFetcher;
use crate::types::Result;

const CHAMBERS: [&str; 2] = ["house", "senate"];

/// Hearings and markups held by tracked committees, from Congress.gov.
pub struct CommitteeMeetings {
    client: CongressClient,
    congress: u32,
    config: CommitteesConfig,
}

impl CommitteeMeetings {
    pub fn new(client: CongressClient, congress: u32, config: CommitteesConfig) -> Self {
        Self { client, congress, config }
    }

    /// Name of the first tracked committee holding the meeting.
    fn tracked_committee<'a>(&self, tracked: &'a HashMap<String, String>, meeting: &Value) -> Option<&'a String> {
        meeting.get("committees")?.as_array()?.iter().find_map(|c| {
            let code = c.get("systemCode").and_then(Value::as_str)?.to_lowercase();
            tracked.get(&code)
        })
    }
}

#[async_trait]
impl SourceFetcher for CommitteeMeetings {
    fn source_kind(&self) -> SourceKind {
        SourceKind::CommitteeMeeting
    }

    fn source_name(&self) -> String {
        "Congress.gov committee meetings".to_string()
    }

    async fn fetch(&self, since: DateTime<Utc>) -> Result<Vec<RawRecord>> {
        if self.config.tracked_committees.is_empty() {
            warn!("No tracked committees configured");
            return Ok(Vec::new());
        }

        let tracked: HashMap<String, String> = self
            .config
            .tracked_committees
            .iter()
            .map(|c| (c.code.to_lowercase(), c.name.clone()))
            .collect();
        let cutoff = since
            .min(Utc::now() - Duration::days(self.config.meetings_days_back.clamp(0, MAX_WINDOW_DAYS)))
            .format("%Y-%m-%d")
            .to_string();

        let mut seen_ids = HashSet::new();
        let mut records = Vec::new();

        for chamber in CHAMBERS {
            // List meetings, then fetch details for each
            let listing = self
                .client
                .meeting_list(self.congress, chamber, self.config.meeting_list_limit)
                .await?;
            info!("Fetching details for {} {} meetings...", listing.len(), chamber);

            for entry in listing {
                let Some(event_id) = entry.get("eventId").and_then(scalar) else {
                    continue;
                };
                if !seen_ids.insert(event_id.clone()) {
                    continue;
                }

                let mut meeting = match self.client.meeting_details(self.congress, chamber, &event_id).await {
                    Ok(Some(meeting)) => meeting,
                    Ok(None) => continue,
                    Err(e) => {
                        warn!("Failed to fetch meeting {}: {}", event_id, e);
                        continue;
                    }
                };

                // Keep tracked committees inside the window
                let Some(committee) = self.tracked_committee(&tracked, &meeting).cloned() else {
                    continue;
                };
                let date = meeting.get("date").and_then(Value::as_str).unwrap_or("");
                if date.is_empty() || date.get(..10).unwrap_or(date) < cutoff.as_str() {
                    continue;
                }

                if let Some(obj) = meeting.as_object_mut() {
                    obj.insert("trackedCommittee".to_string(), Value::String(committee));
                }
                records.push(RawRecord::new(SourceKind::CommitteeMeeting, meeting));
            }
        }

        info!("Found {} meetings from tracked committees", records.len());
        Ok(records)
    }
}

fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
