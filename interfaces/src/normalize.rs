use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;
use tracing::warn;

use crate::defs::{Item, RawRecord, SourceKind};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{source_kind} record: field `{field}` {reason}")]
pub struct NormalizationError {
    pub source_kind: SourceKind,
    pub field: String,
    pub reason: String,
}

impl NormalizationError {
    fn missing(source_kind: SourceKind, field: &str) -> Self {
        Self {
            source_kind,
            field: field.to_string(),
            reason: "is missing".to_string(),
        }
    }

    fn malformed(source_kind: SourceKind, field: &str, reason: impl Into<String>) -> Self {
        Self {
            source_kind,
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

/// Outcome of normalizing one batch: good items plus the records that failed.
#[derive(Debug, Default)]
pub struct BatchResult {
    pub items: Vec<Item>,
    pub failures: Vec<NormalizationError>,
}

/// Map one source-native record to an [`Item`].
pub fn normalize(record: &RawRecord, observed_at: DateTime<Utc>) -> Result<Item, NormalizationError> {
    let payload = &record.payload;
    if !payload.is_object() {
        return Err(NormalizationError::malformed(record.source, "$", "is not a JSON object"));
    }

    match record.source {
        SourceKind::Legislation => normalize_bill(SourceKind::Legislation, payload, observed_at),
        SourceKind::Regulation => normalize_document(payload, observed_at),
        SourceKind::Disaster => normalize_declaration(payload, observed_at),
        SourceKind::CommitteeMeeting => match kind_tag(payload) {
            Some("rss") => normalize_feed_entry(payload, observed_at),
            _ => normalize_meeting(payload, observed_at),
        },
        SourceKind::Watchlist => match kind_tag(payload) {
            Some("regulatory") => normalize_regulatory_entry(payload, observed_at),
            _ => normalize_bill(SourceKind::Watchlist, payload, observed_at),
        },
    }
}

/// Normalize every record, setting aside the ones that fail.
pub fn normalize_batch(records: &[RawRecord], observed_at: DateTime<Utc>) -> BatchResult {
    let mut result = BatchResult::default();
    for record in records {
        match normalize(record, observed_at) {
            Ok(item) => result.items.push(item),
            Err(e) => {
                warn!("Skipping record: {}", e);
                result.failures.push(e);
            }
        }
    }
    result
}

/// Congress.gov page for a bill, e.g. `https://www.congress.gov/bill/119th-congress/house-bill/1234`.
pub fn bill_url(congress: u64, bill_type: &str, number: &str) -> String {
    let bill_type = bill_type.to_lowercase();
    let slug = match bill_type.as_str() {
        "hr" => "house-bill",
        "s" => "senate-bill",
        "hjres" => "house-joint-resolution",
        "sjres" => "senate-joint-resolution",
        "hconres" => "house-concurrent-resolution",
        "sconres" => "senate-concurrent-resolution",
        "hres" => "house-resolution",
        "sres" => "senate-resolution",
        other => other,
    };
    format!("https://www.congress.gov/bill/{}th-congress/{}/{}", congress, slug, number)
}

/// Identity key for a bill: `hr1234-119`.
pub fn bill_id(congress: u64, bill_type: &str, number: &str) -> String {
    format!("{}{}-{}", bill_type.to_lowercase(), number, congress)
}

fn normalize_bill(source: SourceKind, payload: &Value, observed_at: DateTime<Utc>) -> Result<Item, NormalizationError> {
    let congress = payload
        .get("congress")
        .ok_or_else(|| NormalizationError::missing(source, "congress"))
        .and_then(|v| as_u64(v).ok_or_else(|| NormalizationError::malformed(source, "congress", "is not a number")))?;
    let bill_type = required_str(source, payload, "type")?;
    let number = payload
        .get("number")
        .and_then(scalar_string)
        .ok_or_else(|| NormalizationError::missing(source, "number"))?;

    let title = optional_str(payload, "title").unwrap_or("Untitled");
    let mut item = Item::new(bill_id(congress, bill_type, &number), source, title, observed_at)
        .with_url(bill_url(congress, bill_type, &number));

    if let Some(action) = payload.get("latestAction") {
        let text = optional_str(action, "text");
        let date = optional_str(action, "actionDate");
        item.status = match (date, text) {
            (Some(date), Some(text)) => Some(format!("{}: {}", date, text)),
            (None, Some(text)) => Some(text.to_string()),
            (Some(date), None) => Some(date.to_string()),
            (None, None) => None,
        };
    }

    match source {
        SourceKind::Watchlist => {
            if let Some(category) = optional_str(payload, "category") {
                item.category = Some(category.to_string());
            }
            if let Some(notes) = optional_str(payload, "notes") {
                item.summary = Some(notes.to_string());
            }
        }
        _ => {
            if let Some(area) = payload.pointer("/policyArea/name").and_then(Value::as_str) {
                item.category = Some(area.to_string());
            }
            if let Some(sponsor) = first_sponsor(payload) {
                item.summary = Some(format!("Sponsor: {}", sponsor));
            }
        }
    }

    Ok(item)
}

fn normalize_document(payload: &Value, observed_at: DateTime<Utc>) -> Result<Item, NormalizationError> {
    let source = SourceKind::Regulation;
    let number = required_str(source, payload, "document_number")?;
    let title = optional_str(payload, "title").unwrap_or("Untitled");

    let mut item = Item::new(format!("FR-{}", number), source, title, observed_at);
    item.status = optional_str(payload, "type").map(str::to_string);
    item.url = optional_str(payload, "html_url").map(str::to_string);
    item.summary = optional_str(payload, "abstract").map(str::to_string);

    let agencies: Vec<&str> = payload
        .get("agencies")
        .and_then(Value::as_array)
        .map(|agencies| {
            agencies
                .iter()
                .filter_map(|a| optional_str(a, "name").or_else(|| optional_str(a, "raw_name")))
                .collect()
        })
        .unwrap_or_default();
    if !agencies.is_empty() {
        item.category = Some(agencies.join(", "));
    }

    item.deadline = optional_date(source, payload, "comments_close_on")?;
    Ok(item)
}

fn normalize_declaration(payload: &Value, observed_at: DateTime<Utc>) -> Result<Item, NormalizationError> {
    let source = SourceKind::Disaster;
    let number = payload
        .get("disasterNumber")
        .ok_or_else(|| NormalizationError::missing(source, "disasterNumber"))
        .and_then(|v| as_u64(v).ok_or_else(|| NormalizationError::malformed(source, "disasterNumber", "is not a number")))?;
    let state = optional_str(payload, "state").unwrap_or("");
    let area = optional_str(payload, "designatedArea").unwrap_or("Statewide");
    let declaration_title = optional_str(payload, "declarationTitle").unwrap_or("Unknown");

    let title = if state.is_empty() {
        format!("{} ({})", declaration_title, area)
    } else {
        format!("{} ({}, {})", declaration_title, state, area)
    };
    let mut item = Item::new(format!("FEMA-{}-{}-{}", number, state, area), source, title, observed_at)
        .with_url(format!("https://www.fema.gov/disaster/{}", number));

    item.status = Some(match optional_str(payload, "incidentEndDate") {
        Some(end) => format!("closed {}", date_prefix(end)),
        None => "open".to_string(),
    });
    item.category = optional_str(payload, "incidentType").map(str::to_string);
    if let Some(declared) = optional_str(payload, "declarationDate") {
        item.summary = Some(format!("Declared {}", date_prefix(declared)));
    }
    Ok(item)
}

fn normalize_meeting(payload: &Value, observed_at: DateTime<Utc>) -> Result<Item, NormalizationError> {
    let source = SourceKind::CommitteeMeeting;
    let event_id = payload
        .get("eventId")
        .and_then(scalar_string)
        .ok_or_else(|| NormalizationError::missing(source, "eventId"))?;

    let title = optional_str(payload, "title")
        .or_else(|| optional_str(payload, "name"))
        .unwrap_or("Committee Meeting");
    let mut item = Item::new(format!("meeting-{}", event_id), source, title, observed_at);
    item.status = optional_str(payload, "meetingStatus").map(str::to_string);
    item.category = optional_str(payload, "trackedCommittee").map(str::to_string);

    let chamber = optional_str(payload, "chamber").unwrap_or("").to_lowercase();
    let congress = payload.get("congress").and_then(as_u64).unwrap_or(119);
    item.url = Some(format!(
        "https://www.congress.gov/event/{}th-congress/{}-event/{}",
        congress, chamber, event_id
    ));

    let meeting_type = optional_str(payload, "type").unwrap_or("Meeting");
    let mut summary = meeting_type.to_string();
    if let Some(date) = optional_str(payload, "date") {
        summary.push_str(&format!(" on {}", date_prefix(date)));
        if let Some(time) = date.get(11..16) {
            summary.push_str(&format!(" at {}", time));
        }
    }
    let location = [
        payload.pointer("/location/building").and_then(Value::as_str),
        payload.pointer("/location/room").and_then(Value::as_str),
    ]
    .into_iter()
    .flatten()
    .collect::<Vec<_>>()
    .join(" ");
    if !location.trim().is_empty() {
        summary.push_str(&format!(", {}", location.trim()));
    }
    item.summary = Some(summary);
    Ok(item)
}

fn normalize_feed_entry(payload: &Value, observed_at: DateTime<Utc>) -> Result<Item, NormalizationError> {
    let source = SourceKind::CommitteeMeeting;
    let id = required_str(source, payload, "id")?;
    let title = required_str(source, payload, "title")?;

    let mut item = Item::new(format!("rss-{}", id), source, title, observed_at);
    item.url = optional_str(payload, "link").map(str::to_string);
    item.summary = optional_str(payload, "description").map(str::to_string);
    item.category = optional_str(payload, "feed").map(str::to_string);
    Ok(item)
}

fn normalize_regulatory_entry(payload: &Value, observed_at: DateTime<Utc>) -> Result<Item, NormalizationError> {
    let source = SourceKind::Watchlist;
    let name = required_str(source, payload, "name")?;

    let mut item = Item::new(format!("watch-reg-{}", slug(name)), source, name, observed_at);
    item.status = optional_str(payload, "status").map(str::to_string);
    item.url = optional_str(payload, "url").map(str::to_string);
    item.category = Some("Regulatory".to_string());
    // Only a comment deadline drives alerts; an effective date is informational.
    item.deadline = optional_date(source, payload, "comment_deadline")?;
    let notes = optional_str(payload, "notes");
    item.summary = match optional_date(source, payload, "effective_date")? {
        Some(effective) => Some(match notes {
            Some(notes) => format!("{} (effective {})", notes, effective),
            None => format!("Effective {}", effective),
        }),
        None => notes.map(str::to_string),
    };
    Ok(item)
}

fn kind_tag(payload: &Value) -> Option<&str> {
    payload.get("kind").and_then(Value::as_str)
}

fn required_str<'a>(source: SourceKind, payload: &'a Value, field: &str) -> Result<&'a str, NormalizationError> {
    match payload.get(field) {
        None | Some(Value::Null) => Err(NormalizationError::missing(source, field)),
        Some(Value::String(s)) if s.trim().is_empty() => Err(NormalizationError::malformed(source, field, "is empty")),
        Some(Value::String(s)) => Ok(s),
        Some(_) => Err(NormalizationError::malformed(source, field, "is not a string")),
    }
}

fn optional_str<'a>(payload: &'a Value, field: &str) -> Option<&'a str> {
    payload
        .get(field)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn optional_date(source: SourceKind, payload: &Value, field: &str) -> Result<Option<NaiveDate>, NormalizationError> {
    match optional_str(payload, field) {
        None => Ok(None),
        Some(raw) => NaiveDate::parse_from_str(date_prefix(raw), "%Y-%m-%d")
            .map(Some)
            .map_err(|e| NormalizationError::malformed(source, field, format!("is not a date: {}", e))),
    }
}

/// Numbers arrive as JSON numbers from some endpoints and strings from others.
fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn date_prefix(raw: &str) -> &str {
    raw.get(..10).unwrap_or(raw)
}

fn first_sponsor(payload: &Value) -> Option<&str> {
    let sponsor = payload.get("sponsors")?.as_array()?.first()?;
    optional_str(sponsor, "fullName").or_else(|| optional_str(sponsor, "name"))
}

fn slug(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
        } else if !out.ends_with('-') && !out.is_empty() {
            out.push('-');
        }
    }
    out.trim_end_matches('-').to_string()
}
