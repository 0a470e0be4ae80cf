use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use interfaces::{RawRecord, SourceKind};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::CongressConfig;
use crate::fetcher::{query, Fetcher, Query};
use crate::traits::SourceFetcher;
use crate::types::{Result, TrackerError};

/// Thin Congress.gov v3 client shared by the bill, meeting and watchlist sources.
#[derive(Clone)]
pub struct CongressClient {
    fetcher: Arc<Fetcher>,
    api_base: String,
    api_key: String,
}

impl CongressClient {
    pub fn new(fetcher: Arc<Fetcher>, api_base: &str, api_key: impl Into<String>) -> Self {
        Self {
            fetcher,
            api_base: api_base.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    async fn request(&self, endpoint: &str, mut params: Query) -> Result<Value> {
        params.push(("api_key".to_string(), self.api_key.clone()));
        params.push(("format".to_string(), "json".to_string()));
        let url = format!("{}/{}", self.api_base, endpoint.trim_start_matches('/'));
        self.fetcher.get_json(&url, &params).await
    }

    /// Most recently updated bills of a congress, newest first.
    pub async fn recent_bills(&self, congress: u32, limit: u32, since: Option<DateTime<Utc>>) -> Result<Vec<Value>> {
        let mut params = query([("limit", limit.to_string()), ("sort", "updateDate desc".to_string())]);
        if let Some(since) = since {
            params.push(("fromDateTime".to_string(), since.format("%Y-%m-%dT%H:%M:%SZ").to_string()));
        }
        let data = self.request(&format!("bill/{}", congress), params).await?;
        Ok(take_array(data, "bills"))
    }

    pub async fn bill_details(&self, congress: u64, bill_type: &str, number: &str) -> Result<Option<Value>> {
        let endpoint = format!("bill/{}/{}/{}", congress, bill_type.to_lowercase(), number);
        let data = self.request(&endpoint, Vec::new()).await?;
        Ok(data.get("bill").filter(|b| b.is_object()).cloned())
    }

    pub async fn bill_subjects(&self, congress: u64, bill_type: &str, number: &str) -> Result<Value> {
        let endpoint = format!("bill/{}/{}/{}/subjects", congress, bill_type.to_lowercase(), number);
        let data = self.request(&endpoint, Vec::new()).await?;
        Ok(data.get("subjects").cloned().unwrap_or(Value::Null))
    }

    /// Full-text bill search, newest first, optionally restricted to one congress.
    ///
    /// When the search endpoint answers with an error status or finds nothing,
    /// the newest bills of `congress` are filtered by title instead.
    pub async fn search_bills(&self, text: &str, congress: Option<u32>, limit: usize) -> Result<Vec<Value>> {
        // Over-fetch when filtering by congress afterwards.
        let fetch_limit = if congress.is_some() { limit * 2 } else { limit };
        let params = query([
            ("query", text.to_string()),
            ("limit", fetch_limit.to_string()),
            ("offset", "0".to_string()),
            ("sort", "updateDate desc".to_string()),
        ]);

        let results = match self.request("bill", params).await {
            Ok(data) => take_array(data, "bills"),
            Err(TrackerError::Status { status, url }) => {
                warn!("Bill search unavailable ({} from {})", status, url);
                Vec::new()
            }
            Err(e) => return Err(e),
        };
        let found: Vec<Value> = results
            .into_iter()
            .filter(|bill| congress.map_or(true, |c| bill_key(bill).is_some_and(|(n, _, _)| n == u64::from(c))))
            .take(limit)
            .collect();

        match congress {
            Some(c) if found.is_empty() => {
                info!("Search returned nothing, filtering recent bills of Congress {} by title", c);
                self.search_titles(text, c, limit).await
            }
            _ => Ok(found),
        }
    }

    /// A bill matches when its title holds the whole phrase or every word of it.
    async fn search_titles(&self, text: &str, congress: u32, limit: usize) -> Result<Vec<Value>> {
        let phrase = text.trim().to_lowercase();
        let words: Vec<&str> = phrase.split_whitespace().collect();
        if words.is_empty() {
            return Ok(Vec::new());
        }

        let bills = self.recent_bills(congress, 250, None).await?;
        Ok(bills
            .into_iter()
            .filter(|bill| {
                let title = bill.get("title").and_then(Value::as_str).unwrap_or("").to_lowercase();
                title.contains(&phrase) || words.iter().all(|w| title.contains(w))
            })
            .take(limit)
            .collect())
    }

    pub async fn meeting_list(&self, congress: u32, chamber: &str, limit: u32) -> Result<Vec<Value>> {
        let endpoint = format!("committee-meeting/{}/{}", congress, chamber);
        let data = self.request(&endpoint, query([("limit", limit.to_string())])).await?;
        Ok(take_array(data, "committeeMeetings"))
    }

    pub async fn meeting_details(&self, congress: u32, chamber: &str, event_id: &str) -> Result<Option<Value>> {
        let endpoint = format!("committee-meeting/{}/{}/{}", congress, chamber, event_id);
        let data = self.request(&endpoint, Vec::new()).await?;
        Ok(data.get("committeeMeeting").filter(|m| m.is_object()).cloned())
    }
}

pub(crate) fn take_array(mut data: Value, key: &str) -> Vec<Value> {
    match data.get_mut(key).map(Value::take) {
        Some(Value::Array(items)) => items,
        _ => Vec::new(),
    }
}

/// Bills of the current congress matching configured title keywords and
/// policy areas or legislative subjects.
pub struct CongressBills {
    client: CongressClient,
    config: CongressConfig,
}

impl CongressBills {
    pub fn new(client: CongressClient, config: CongressConfig) -> Self {
        Self { client, config }
    }

    /// Run the two-pass relevance search. `since` narrows the listing to bills
    /// updated after that instant.
    pub async fn find_relevant_bills(&self, since: Option<DateTime<Utc>>) -> Result<Vec<Value>> {
        let congress = self.config.current_congress;
        info!("Fetching recent bills from Congress {}...", congress);
        let all_bills = self.client.recent_bills(congress, self.config.bill_limit, since).await?;
        info!("Fetched {} recent bills", all_bills.len());

        let candidates: Vec<Value> = if self.config.title_keywords.is_empty() {
            all_bills
        } else {
            let keywords = lowercase_all(&self.config.title_keywords);
            let matching: Vec<Value> = all_bills
                .into_iter()
                .filter(|bill| {
                    let title = bill.get("title").and_then(Value::as_str).unwrap_or("").to_lowercase();
                    keywords.iter().any(|k| title.contains(k))
                })
                .collect();
            info!("First-pass filter: {} bills match title keywords", matching.len());
            matching
        };

        if self.config.relevant_policy_areas.is_empty() && self.config.relevant_subjects.is_empty() {
            return Ok(candidates);
        }

        let policy_areas = lowercase_all(&self.config.relevant_policy_areas);
        let subjects = lowercase_all(&self.config.relevant_subjects);
        let mut relevant = Vec::new();

        for mut bill in candidates {
            let Some((congress, bill_type, number)) = bill_key(&bill) else {
                debug!("Skipping bill without congress/type/number");
                continue;
            };
            let subjects_data = match self.client.bill_subjects(congress, &bill_type, &number).await {
                Ok(data) => data,
                Err(e) => {
                    warn!("Could not fetch subjects for {}{}: {}", bill_type, number, e);
                    continue;
                }
            };

            let policy_area = subjects_data.get("policyArea").cloned().unwrap_or(Value::Null);
            let area_name = policy_area.get("name").and_then(Value::as_str).unwrap_or("").to_lowercase();
            let area_match = !area_name.is_empty() && policy_areas.iter().any(|p| area_name.contains(p));

            let subject_match = subjects_data
                .get("legislativeSubjects")
                .and_then(Value::as_array)
                .is_some_and(|list| {
                    list.iter().any(|s| {
                        let name = s.get("name").and_then(Value::as_str).unwrap_or("").to_lowercase();
                        subjects.iter().any(|rs| name.contains(rs))
                    })
                });

            if area_match || subject_match {
                if policy_area.is_object() {
                    if let Some(obj) = bill.as_object_mut() {
                        obj.insert("policyArea".to_string(), policy_area);
                    }
                }
                relevant.push(bill);
            }
        }

        info!("Second-pass filter: {} bills match relevant subjects", relevant.len());
        Ok(relevant)
    }
}

#[async_trait]
impl SourceFetcher for CongressBills {
    fn source_kind(&self) -> SourceKind {
        SourceKind::Legislation
    }

    fn source_name(&self) -> String {
        format!("Congress.gov bills ({}th Congress)", self.config.current_congress)
    }

    async fn fetch(&self, since: DateTime<Utc>) -> Result<Vec<RawRecord>> {
        let bills = self.find_relevant_bills(Some(since)).await?;
        Ok(bills
            .into_iter()
            .map(|bill| RawRecord::new(SourceKind::Legislation, bill))
            .collect())
    }
}

fn bill_key(bill: &Value) -> Option<(u64, String, String)> {
    let congress = match bill.get("congress")? {
        Value::Number(n) => n.as_u64()?,
        Value::String(s) => s.parse().ok()?,
        _ => return None,
    };
    let bill_type = bill.get("type")?.as_str()?.to_lowercase();
    let number = match bill.get("number")? {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        _ => return None,
    };
    Some((congress, bill_type, number))
}

fn lowercase_all(words: &[String]) -> Vec<String> {
    words.iter().map(|w| w.to_lowercase()).collect()
}
