use async_trait::async_trait;
use chrono::{DateTime, Utc};
use interfaces::{RawRecord, SourceKind};

use crate::types::Result;

/// One upstream data source polled once per run.
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    /// Namespace of the records this source produces.
    fn source_kind(&self) -> SourceKind;

    /// Human-readable name for logs and failure reports.
    fn source_name(&self) -> String;

    /// Fetch source-native records updated on or after `since`.
    ///
    /// Sub-request failures are logged and skipped inside the source. An
    /// `Err` means the source as a whole produced nothing usable.
    async fn fetch(&self, since: DateTime<Utc>) -> Result<Vec<RawRecord>>;
}
