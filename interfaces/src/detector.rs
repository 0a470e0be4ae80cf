use std::collections::HashSet;

use tracing::{debug, info};

use crate::defs::{Classification, ClassifiedItem, Item, SeenRecord, TrackingStore};

/// Classify one observation against the store and record it.
///
/// Status comparison is exact byte equality on the opaque status string.
/// Two spellings of the same upstream status count as a change; that is a
/// known limitation, not something to paper over here.
pub fn classify(item: &Item, store: &mut TrackingStore) -> Classification {
    let Some(record) = store.items.get_mut(&item.item_id) else {
        store.items.insert(item.item_id.clone(), SeenRecord::first_observation(item));
        return Classification::New;
    };

    if item.observed_at > record.last_seen {
        record.last_seen = item.observed_at;
    }
    record.title = item.title.clone();

    // An observation without a status keeps whatever we knew.
    let Some(observed) = &item.status else {
        return Classification::Unchanged;
    };
    if record.last_status.as_deref() == Some(observed.as_str()) {
        return Classification::Unchanged;
    }

    let from = record.last_status.replace(observed.clone());
    Classification::StatusChanged {
        from,
        to: observed.clone(),
    }
}

/// Per-run classifier that reports each item id at most once.
///
/// The first observation of an id in a run decides what the digest sees.
/// Later observations of the same id still update the store, so the last one
/// in fetch order determines the stored status.
#[derive(Debug, Default)]
pub struct ChangeDetector {
    seen_this_run: HashSet<String>,
}

impl ChangeDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `None` for a repeat of an id already classified in this run.
    pub fn observe(&mut self, item: Item, store: &mut TrackingStore) -> Option<ClassifiedItem> {
        let first_in_run = self.seen_this_run.insert(item.item_id.clone());
        let classification = classify(&item, store);

        if !first_in_run {
            debug!("Duplicate observation of {} in this run, not reported again", item.item_id);
            return None;
        }

        match &classification {
            Classification::New => info!("New item: {} ({})", item.item_id, item.source),
            Classification::StatusChanged { from, to } => info!(
                "Status change for {}: {} -> {}",
                item.item_id,
                from.as_deref().unwrap_or("none"),
                to
            ),
            Classification::Unchanged => debug!("Unchanged: {}", item.item_id),
        }

        Some(ClassifiedItem { item, classification })
    }

    pub fn classify_batch(&mut self, items: impl IntoIterator<Item = Item>, store: &mut TrackingStore) -> Vec<ClassifiedItem> {
        items
            .into_iter()
            .filter_map(|item| self.observe(item, store))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defs::SourceKind;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use pretty_assertions::assert_eq;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()
    }

    fn bill(status: Option<&str>, observed_at: DateTime<Utc>) -> Item {
        let item = Item::new("hr1-119", SourceKind::Legislation, "Flood Resilience Act", observed_at);
        match status {
            Some(status) => item.with_status(status),
            None => item,
        }
    }

    #[test]
    fn unseen_item_is_new_then_unchanged() {
        let mut store = TrackingStore::empty(t0());

        assert_eq!(classify(&bill(Some("introduced"), t0()), &mut store), Classification::New);
        let record = store.get("hr1-119").unwrap();
        assert_eq!(record.first_seen, record.last_seen);
        assert_eq!(record.last_status.as_deref(), Some("introduced"));
        assert!(!record.notified);

        let later = t0() + Duration::hours(24);
        assert_eq!(classify(&bill(Some("introduced"), later), &mut store), Classification::Unchanged);
        assert_eq!(store.get("hr1-119").unwrap().last_seen, later);
    }

    #[test]
    fn status_change_is_reported_once() {
        let mut store = TrackingStore::empty(t0());
        classify(&bill(Some("introduced"), t0()), &mut store);

        let day2 = t0() + Duration::days(1);
        assert_eq!(
            classify(&bill(Some("passed_house"), day2), &mut store),
            Classification::StatusChanged {
                from: Some("introduced".into()),
                to: "passed_house".into(),
            }
        );
        assert_eq!(store.get("hr1-119").unwrap().last_status.as_deref(), Some("passed_house"));

        let day3 = day2 + Duration::days(1);
        assert_eq!(classify(&bill(Some("passed_house"), day3), &mut store), Classification::Unchanged);
    }

    #[test]
    fn null_to_value_is_a_change_but_value_to_null_is_not() {
        let mut store = TrackingStore::empty(t0());
        classify(&bill(None, t0()), &mut store);

        assert_eq!(
            classify(&bill(Some("introduced"), t0()), &mut store),
            Classification::StatusChanged {
                from: None,
                to: "introduced".into(),
            }
        );
        assert_eq!(classify(&bill(None, t0()), &mut store), Classification::Unchanged);
        assert_eq!(store.get("hr1-119").unwrap().last_status.as_deref(), Some("introduced"));
    }

    #[test]
    fn both_null_is_unchanged() {
        let mut store = TrackingStore::empty(t0());
        classify(&bill(None, t0()), &mut store);
        assert_eq!(classify(&bill(None, t0()), &mut store), Classification::Unchanged);
    }

    #[test]
    fn status_comparison_is_exact() {
        let mut store = TrackingStore::empty(t0());
        classify(&bill(Some("Introduced"), t0()), &mut store);
        assert!(matches!(
            classify(&bill(Some("introduced"), t0()), &mut store),
            Classification::StatusChanged { .. }
        ));
    }

    #[test]
    fn first_seen_is_fixed_and_last_seen_never_regresses() {
        let mut store = TrackingStore::empty(t0());
        classify(&bill(Some("a"), t0()), &mut store);

        let mut observed = t0();
        for step in [3, 1, 7, 2] {
            observed += Duration::hours(step);
            let before = store.get("hr1-119").unwrap().last_seen;
            classify(&bill(Some("a"), observed), &mut store);
            let record = store.get("hr1-119").unwrap();
            assert_eq!(record.first_seen, t0());
            assert!(record.last_seen >= before);
            assert!(record.first_seen <= record.last_seen);
        }

        // An observation stamped in the past does not move last_seen back.
        let latest = store.get("hr1-119").unwrap().last_seen;
        classify(&bill(Some("a"), t0() - Duration::days(1)), &mut store);
        assert_eq!(store.get("hr1-119").unwrap().last_seen, latest);
    }

    #[test]
    fn duplicates_within_a_run_are_reported_once() {
        let mut store = TrackingStore::empty(t0());
        let mut detector = ChangeDetector::new();

        let results = detector.classify_batch(
            vec![bill(Some("introduced"), t0()), bill(Some("passed_house"), t0())],
            &mut store,
        );

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].classification, Classification::New);
        assert_eq!(results[0].item.status.as_deref(), Some("introduced"));
        // The last observation decides what is stored.
        assert_eq!(store.get("hr1-119").unwrap().last_status.as_deref(), Some("passed_house"));
    }

    #[test]
    fn batch_classification_is_idempotent_against_the_same_state() {
        let mut base = TrackingStore::empty(t0());
        classify(&bill(Some("introduced"), t0()), &mut base);

        let batch = vec![
            bill(Some("passed_house"), t0() + Duration::days(1)),
            Item::new("FR-2026-00001", SourceKind::Regulation, "Rule", t0()).with_status("Rule"),
        ];

        let mut first_store = base.clone();
        let first = ChangeDetector::new().classify_batch(batch.clone(), &mut first_store);
        let mut second_store = base.clone();
        let second = ChangeDetector::new().classify_batch(batch, &mut second_store);

        assert_eq!(first, second);
        assert_eq!(first_store, second_store);
    }
}
