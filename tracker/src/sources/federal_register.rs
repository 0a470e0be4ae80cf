use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use interfaces::{RawRecord, SourceKind};
use serde_json::Value;
use tracing::{error, info, warn};

use crate::config::FederalRegisterConfig;
use crate::fetcher::{query, Fetcher};
use crate::sources::congress::take_array;
use crate::traits::SourceFetcher;
use crate::types::{Result, TrackerError};

/// API code for a human-readable document type; unknown names pass through.
pub fn document_type_code(name: &str) -> &str {
    match name {
        "Rule" => "RULE",
        "Proposed Rule" => "PRORULE",
        "Notice" => "NOTICE",
        "Presidential Document" => "PRESDOCU",
        other => other,
    }
}

/// Recent Federal Register documents from the configured agencies.
pub struct FederalRegister {
    fetcher: Arc<Fetcher>,
    config: FederalRegisterConfig,
}

impl FederalRegister {
    pub fn new(fetcher: Arc<Fetcher>, config: FederalRegisterConfig) -> Self {
        Self { fetcher, config }
    }
}

#[async_trait]
impl SourceFetcher for FederalRegister {
    fn source_kind(&self) -> SourceKind {
        SourceKind::Regulation
    }

    fn source_name(&self) -> String {
        "Federal Register".to_string()
    }

    async fn fetch(&self, since: DateTime<Utc>) -> Result<Vec<RawRecord>> {
        if self.config.agencies.is_empty() {
            warn!("No agencies configured for Federal Register monitoring");
            return Ok(Vec::new());
        }

        let url = format!("{}/documents.json", self.config.api_base.trim_end_matches('/'));
        let mut seen = HashSet::new();
        let mut records = Vec::new();
        let mut failed = 0;

        for agency in &self.config.agencies {
            info!("Fetching Federal Register documents for {}...", agency.display_name());

            // One query per agency, filtered by document type and date
            let mut params = query([
                ("per_page", self.config.per_page.to_string()),
                ("page", "1".to_string()),
                ("order", "newest".to_string()),
                ("conditions[agencies][]", agency.slug.clone()),
            ]);
            for doc_type in &self.config.document_types {
                params.push(("conditions[type][]".to_string(), document_type_code(doc_type).to_string()));
            }
            params.push((
                "conditions[publication_date][gte]".to_string(),
                since.format("%Y-%m-%d").to_string(),
            ));

            let results = match self.fetcher.get_json(&url, &params).await {
                Ok(data) => take_array(data, "results"),
                Err(e) => {
                    error!("Error fetching documents for {}: {}", agency.display_name(), e);
                    failed += 1;
                    continue;
                }
            };
            info!("Found {} documents for {}", results.len(), agency.display_name());

            for doc in results {
                let number = doc.get("document_number").and_then(Value::as_str).map(str::to_string);
                // Records without a number go through so the normalizer can report them.
                if let Some(number) = number {
                    if !seen.insert(number) {
                        continue;
                    }
                }
                records.push(RawRecord::new(SourceKind::Regulation, doc));
            }
        }

        // Partial results are fine; all agencies failing is not
        if failed == self.config.agencies.len() {
            return Err(TrackerError::Source {
                source_kind: SourceKind::Regulation,
                reason: format!("all {} agency queries failed", failed),
            });
        }

        info!("Total unique Federal Register documents: {}", records.len());
        Ok(records)
    }
}
