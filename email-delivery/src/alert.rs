use chrono::NaiveDate;
use interfaces::CommentAlert;

/// Subject line for the daily digest.
pub fn digest_subject(prefix: &str, date: NaiveDate, new_items: usize, status_changes: usize) -> String {
    if new_items == 0 && status_changes == 0 {
        format!("{} Daily Digest - {} (no updates)", prefix, date.format("%Y-%m-%d"))
    } else {
        format!(
            "{} Daily Digest - {} ({} new, {} updated)",
            prefix,
            date.format("%Y-%m-%d"),
            new_items,
            status_changes
        )
    }
}

/// Subject and plain-text body for a closing comment period alert.
///
/// Returns `None` when there is nothing to alert on.
pub fn comment_alert(prefix: &str, alerts: &[CommentAlert]) -> Option<(String, String)> {
    if alerts.is_empty() {
        return None;
    }

    let mut lines = vec![
        format!("{} Comment Period Alert", prefix),
        "=".repeat(40),
        String::new(),
        format!("The following {} document(s) have comment periods closing soon:", alerts.len()),
        String::new(),
    ];

    for alert in alerts {
        let item = &alert.item;
        if alert.days_remaining <= 3 {
            lines.push(format!("[URGENT] {}", item.title));
        } else {
            lines.push(item.title.clone());
        }
        if let Some(category) = &item.category {
            lines.push(format!("  Agencies: {}", category));
        }
        lines.push(format!("  Document: {}", item.item_id));
        lines.push(format!(
            "  Comment Period Closes: {} ({} days)",
            alert.deadline.format("%Y-%m-%d"),
            alert.days_remaining
        ));
        if let Some(url) = &item.url {
            lines.push(format!("  URL: {}", url));
        }
        lines.push(String::new());
    }

    lines.push("---".to_string());
    lines.push(format!("Generated by {}", prefix));

    let subject = format!("{} Alert: {} Comment Period(s) Closing Soon", prefix, alerts.len());
    Some((subject, lines.join("\n")))
}
