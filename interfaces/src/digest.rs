use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::defs::{Classification, ClassifiedItem, Item, Priority, SourceKind};

/// Keyword lists that lift an item above normal priority.
///
/// Matching is a case-insensitive substring test, so "flood" also hits
/// "floodplain". That is accepted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriorityRules {
    #[serde(default)]
    pub critical: Vec<String>,
    #[serde(default)]
    pub high: Vec<String>,
}

impl PriorityRules {
    pub fn new(critical: Vec<String>, high: Vec<String>) -> Self {
        Self {
            critical: critical.into_iter().map(|k| k.to_lowercase()).collect(),
            high: high.into_iter().map(|k| k.to_lowercase()).collect(),
        }
    }

    pub fn priority_of(&self, item: &Item) -> Priority {
        let mut text = item.title.to_lowercase();
        if let Some(summary) = &item.summary {
            text.push(' ');
            text.push_str(&summary.to_lowercase());
        }

        let hit = |keywords: &[String]| {
            keywords
                .iter()
                .any(|k| !k.is_empty() && text.contains(&k.to_lowercase()))
        };

        if hit(&self.critical) {
            Priority::Critical
        } else if hit(&self.high) {
            Priority::High
        } else {
            Priority::Normal
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DigestEntry {
    pub item: Item,
    pub priority: Priority,
    pub classification: Classification,
}

/// New items and status changes for one source.
#[derive(Debug, Clone, PartialEq)]
pub struct CategorySection {
    pub source: SourceKind,
    pub critical: Vec<DigestEntry>,
    pub high: Vec<DigestEntry>,
    pub normal: Vec<DigestEntry>,
    pub status_changes: Vec<DigestEntry>,
}

impl CategorySection {
    fn new(source: SourceKind) -> Self {
        Self {
            source,
            critical: Vec::new(),
            high: Vec::new(),
            normal: Vec::new(),
            status_changes: Vec::new(),
        }
    }

    pub fn new_count(&self) -> usize {
        self.critical.len() + self.high.len() + self.normal.len()
    }

    pub fn is_empty(&self) -> bool {
        self.new_count() == 0 && self.status_changes.is_empty()
    }

    /// New entries, critical first.
    pub fn new_entries(&self) -> impl Iterator<Item = &DigestEntry> {
        self.critical.iter().chain(&self.high).chain(&self.normal)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CommentAlert {
    pub item: Item,
    pub deadline: NaiveDate,
    pub days_remaining: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Digest {
    pub date: NaiveDate,
    pub sections: Vec<CategorySection>,
    pub comment_alerts: Vec<CommentAlert>,
    pub total_new: usize,
    pub total_status_changes: usize,
}

impl Digest {
    pub fn has_updates(&self) -> bool {
        self.total_new > 0 || self.total_status_changes > 0
    }

    pub fn section(&self, source: SourceKind) -> Option<&CategorySection> {
        self.sections.iter().find(|s| s.source == source)
    }

    /// Every entry that appears in the digest body.
    pub fn entries(&self) -> impl Iterator<Item = &DigestEntry> {
        self.sections
            .iter()
            .flat_map(|s| s.new_entries().chain(&s.status_changes))
    }
}

pub struct DigestAssembler {
    rules: PriorityRules,
    comment_warning_days: i64,
}

impl DigestAssembler {
    pub fn new(rules: PriorityRules) -> Self {
        Self {
            rules,
            comment_warning_days: 14,
        }
    }

    pub fn with_comment_warning_days(mut self, days: i64) -> Self {
        self.comment_warning_days = days;
        self
    }

    /// Group the run's classified items into the digest for `date`.
    ///
    /// Unchanged items never reach a section but can still raise a comment
    /// alert when their deadline is close.
    pub fn assemble(&self, classified: &[ClassifiedItem], date: NaiveDate) -> Digest {
        let mut sections: Vec<CategorySection> = SourceKind::ALL.iter().map(|s| CategorySection::new(*s)).collect();
        let mut comment_alerts = Vec::new();

        for ClassifiedItem { item, classification } in classified {
            if let Some(deadline) = item.deadline {
                let days_remaining = (deadline - date).num_days();
                if (0..=self.comment_warning_days).contains(&days_remaining) {
                    comment_alerts.push(CommentAlert {
                        item: item.clone(),
                        deadline,
                        days_remaining,
                    });
                }
            }

            if !classification.is_reportable() {
                continue;
            }

            let Some(section) = sections.iter_mut().find(|s| s.source == item.source) else {
                continue;
            };
            let entry = DigestEntry {
                item: item.clone(),
                priority: self.rules.priority_of(item),
                classification: classification.clone(),
            };

            match (classification, entry.priority) {
                (Classification::StatusChanged { .. }, _) => section.status_changes.push(entry),
                (_, Priority::Critical) => section.critical.push(entry),
                (_, Priority::High) => section.high.push(entry),
                (_, Priority::Normal) => section.normal.push(entry),
            }
        }

        sections.retain(|s| !s.is_empty());
        comment_alerts.sort_by_key(|a| a.days_remaining);

        let total_new = sections.iter().map(CategorySection::new_count).sum();
        let total_status_changes = sections.iter().map(|s| s.status_changes.len()).sum();
        debug!(
            "Assembled digest for {}: {} new, {} changed, {} comment alerts",
            date,
            total_new,
            total_status_changes,
            comment_alerts.len()
        );

        Digest {
            date,
            sections,
            comment_alerts,
            total_new,
            total_status_changes,
        }
    }
}
