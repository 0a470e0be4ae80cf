use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use interfaces::{RawRecord, SourceKind, MAX_WINDOW_DAYS};
use serde_json::Value;
use tracing::info;

use crate::config::OpenFemaConfig;
use crate::fetcher::{query, Fetcher};
use crate::sources::congress::take_array;
use crate::traits::SourceFetcher;
use crate::types::Result;

/// Disaster declarations of relevant incident types from OpenFEMA.
pub struct OpenFema {
    fetcher: Arc<Fetcher>,
    config: OpenFemaConfig,
}

impl OpenFema {
    pub fn new(fetcher: Arc<Fetcher>, config: OpenFemaConfig) -> Self {
        Self { fetcher, config }
    }
}

#[async_trait]
impl SourceFetcher for OpenFema {
    fn source_kind(&self) -> SourceKind {
        SourceKind::Disaster
    }

    fn source_name(&self) -> String {
        "OpenFEMA disaster declarations".to_string()
    }

    async fn fetch(&self, since: DateTime<Utc>) -> Result<Vec<RawRecord>> {
        let cutoff = since.min(Utc::now() - Duration::days(self.config.days_back.clamp(0, MAX_WINDOW_DAYS)));
        let url = format!(
            "{}/DisasterDeclarationsSummaries",
            self.config.api_base.trim_end_matches('/')
        );
        let params = query([
            ("$filter", format!("declarationDate ge '{}'", cutoff.format("%Y-%m-%d"))),
            ("$orderby", "declarationDate desc".to_string()),
            ("$top", self.config.limit.to_string()),
        ]);

        // Fetch recent declarations
        let declarations = take_array(self.fetcher.get_json(&url, &params).await?, "DisasterDeclarationsSummaries");
        let total = declarations.len();

        let mut seen = HashSet::new();
        let mut records = Vec::new();
        for declaration in declarations {
            // Filter by incident type
            let incident = declaration.get("incidentType").and_then(Value::as_str).unwrap_or("");
            if !self.config.incident_types.is_empty() && !self.config.incident_types.iter().any(|t| t == incident) {
                continue;
            }

            // One record per disaster, state and area
            let key = format!(
                "{}-{}-{}",
                declaration.get("disasterNumber").map(Value::to_string).unwrap_or_default(),
                declaration.get("state").and_then(Value::as_str).unwrap_or(""),
                declaration.get("designatedArea").and_then(Value::as_str).unwrap_or("")
            );
            if seen.insert(key) {
                records.push(RawRecord::new(SourceKind::Disaster, declaration));
            }
        }

        info!("Filtered {} declarations to {} relevant disasters", total, records.len());
        Ok(records)
    }
}
