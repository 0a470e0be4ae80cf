use std::fmt::Write;
use std::path::{Path, PathBuf};

use interfaces::{CategorySection, Classification, Digest, DigestEntry};
use tracing::info;

use crate::types::Result;

/// Render the digest as markdown for the file on disk and the email body.
pub fn render_markdown(digest: &Digest, title: &str) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = write_digest(&mut out, digest, title);
    out
}

fn write_digest(out: &mut String, digest: &Digest, title: &str) -> std::fmt::Result {
    writeln!(out, "# {} Daily Digest", title)?;
    writeln!(out, "**Date:** {}", digest.date.format("%B %d, %Y"))?;
    writeln!(out)?;
    writeln!(out, "## Summary")?;
    writeln!(out, "- **New items:** {}", digest.total_new)?;
    writeln!(out, "- **Status changes:** {}", digest.total_status_changes)?;
    writeln!(out, "- **Comment periods closing soon:** {}", digest.comment_alerts.len())?;
    writeln!(out)?;

    if !digest.comment_alerts.is_empty() {
        writeln!(out, "---")?;
        writeln!(out, "## Comment Periods Closing Soon")?;
        for alert in &digest.comment_alerts {
            writeln!(
                out,
                "- {} closes {} ({} days)",
                link(&alert.item.title, alert.item.url.as_deref()),
                alert.deadline.format("%Y-%m-%d"),
                alert.days_remaining
            )?;
        }
        writeln!(out)?;
    }

    if !digest.has_updates() {
        writeln!(out, "No new items or status changes since the last check.")?;
    }

    for section in &digest.sections {
        write_section(out, section)?;
    }

    writeln!(out, "---")?;
    writeln!(out, "Generated by {}", title)?;
    Ok(())
}

fn write_section(out: &mut String, section: &CategorySection) -> std::fmt::Result {
    writeln!(out, "---")?;
    writeln!(out, "## {}", section.source.label())?;

    for (heading, entries) in [
        ("Critical", &section.critical),
        ("High Priority", &section.high),
        ("New", &section.normal),
    ] {
        if entries.is_empty() {
            continue;
        }
        writeln!(out, "### {}", heading)?;
        for entry in entries {
            writeln!(out, "{}", new_line(entry))?;
        }
    }

    if !section.status_changes.is_empty() {
        writeln!(out, "### Status Changes")?;
        for entry in &section.status_changes {
            writeln!(out, "{}", change_line(entry))?;
        }
    }
    writeln!(out)
}

fn new_line(entry: &DigestEntry) -> String {
    let item = &entry.item;
    let mut line = format!("- {} `{}`", link(&item.title, item.url.as_deref()), item.item_id);
    if let Some(category) = &item.category {
        let _ = write!(line, " - {}", category);
    }
    if let Some(status) = &item.status {
        let _ = write!(line, " - {}", status);
    }
    if let Some(summary) = &item.summary {
        let _ = write!(line, " - {}", summary);
    }
    line
}

fn change_line(entry: &DigestEntry) -> String {
    let item = &entry.item;
    let (from, to) = match &entry.classification {
        Classification::StatusChanged { from, to } => (from.as_deref().unwrap_or("none"), to.as_str()),
        _ => ("none", item.status.as_deref().unwrap_or("none")),
    };
    format!(
        "- {} `{}`: {} -> **{}**",
        link(&item.title, item.url.as_deref()),
        item.item_id,
        from,
        to
    )
}

fn link(title: &str, url: Option<&str>) -> String {
    match url {
        Some(url) => format!("**[{}]({})**", title, url),
        None => format!("**{}**", title),
    }
}

/// Write `digest-YYYY-MM-DD.md` under `output_dir`.
pub fn save_digest(markdown: &str, output_dir: &Path, digest: &Digest) -> Result<PathBuf> {
    std::fs::create_dir_all(output_dir)?;
    let path = output_dir.join(format!("digest-{}.md", digest.date.format("%Y-%m-%d")));
    std::fs::write(&path, markdown)?;
    info!("Saved digest to {}", path.display());
    Ok(path)
}
