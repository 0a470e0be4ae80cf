use std::sync::OnceLock;

use regex::Regex;

/// Convert the digest's markdown subset into inline-styled HTML for mail clients.
///
/// Handles headers (`#`, `##`, `###`), `---` rules, `- ` list items, blank
/// lines and paragraphs. Anything else passes through as paragraph text.
pub fn markdown_to_html(markdown: &str) -> String {
    let mut html_lines = Vec::new();
    let mut in_list = false;

    for line in markdown.lines() {
        let trimmed = line.trim();
        let is_list_item = trimmed.starts_with("- ");

        if in_list && !is_list_item {
            html_lines.push("</ul>".to_string());
            in_list = false;
        }

        if let Some(text) = line.strip_prefix("# ") {
            html_lines.push(format!(
                r#"<h1 style="color: #2c5282; margin-top: 20px;">{}</h1>"#,
                convert_inline_markdown(text)
            ));
        } else if let Some(text) = line.strip_prefix("## ") {
            html_lines.push(format!(
                r#"<h2 style="color: #2d3748; margin-top: 18px; border-bottom: 1px solid #e2e8f0; padding-bottom: 5px;">{}</h2>"#,
                convert_inline_markdown(text)
            ));
        } else if let Some(text) = line.strip_prefix("### ") {
            html_lines.push(format!(
                r#"<h3 style="color: #4a5568; margin-top: 15px;">{}</h3>"#,
                convert_inline_markdown(text)
            ));
        } else if trimmed == "---" {
            html_lines.push(r#"<hr style="border: none; border-top: 1px solid #e2e8f0; margin: 20px 0;">"#.to_string());
        } else if is_list_item {
            if !in_list {
                html_lines.push(r#"<ul style="margin: 10px 0; padding-left: 20px;">"#.to_string());
                in_list = true;
            }
            html_lines.push(format!(
                r#"<li style="margin: 8px 0;">{}</li>"#,
                convert_inline_markdown(&trimmed[2..])
            ));
        } else if trimmed.is_empty() {
            html_lines.push("<br>".to_string());
        } else {
            html_lines.push(format!(
                r#"<p style="margin: 5px 0; color: #4a5568;">{}</p>"#,
                convert_inline_markdown(line)
            ));
        }
    }

    if in_list {
        html_lines.push("</ul>".to_string());
    }

    format!(
        concat!(
            r#"<div style="font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, 'Helvetica Neue', Arial, sans-serif; "#,
            r#"max-width: 700px; margin: 0 auto; padding: 20px; color: #2d3748;">"#,
            "\n{}\n</div>\n"
        ),
        html_lines.join("\n")
    )
}

/// `**bold**` and `[text](url)` to their HTML equivalents. Everything else
/// is escaped, so titles fetched from upstream render as text.
pub fn convert_inline_markdown(text: &str) -> String {
    let text = escape_html(text);
    static PATTERNS: OnceLock<Option<(Regex, Regex)>> = OnceLock::new();

    let patterns = PATTERNS.get_or_init(|| {
        let bold = Regex::new(r"\*\*(.+?)\*\*").ok()?;
        let link = Regex::new(r"\[([^\]]+)\]\(([^)]+)\)").ok()?;
        Some((bold, link))
    });
    let Some((bold, link)) = patterns else {
        return text;
    };

    let text = bold.replace_all(&text, "<strong>$1</strong>");
    link.replace_all(&text, r#"<a href="$2" style="color: #3182ce; text-decoration: none;">$1</a>"#)
        .into_owned()
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
