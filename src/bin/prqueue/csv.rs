use std::io::Write;

use anyhow::Result;
use chrono::{DateTime, Utc};
use prqueue::PullRequestSummary;

const HEADER: [&str; 5] = ["#", "Title", "Author", "Created", "Closed"];

/// Quotes a field when it contains a delimiter, quote or line break.
fn quote_field(field: &str) -> String {
    if field.contains([',', '"', '\r', '\n']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn format_date(date: Option<DateTime<Utc>>) -> String {
    date.map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

fn write_record<W: Write>(writer: &mut W, fields: &[String]) -> Result<()> {
    let line: Vec<String> = fields.iter().map(|f| quote_field(f)).collect();
    // RFC 4180 record terminator.
    write!(writer, "{}\r\n", line.join(","))?;
    Ok(())
}

/// Writes the pull request history as CSV.
pub fn write_csv<W: Write>(prs: &[PullRequestSummary], writer: &mut W) -> Result<()> {
    let header: Vec<String> = HEADER.iter().map(|h| h.to_string()).collect();
    write_record(writer, &header)?;

    for pr in prs {
        write_record(
            writer,
            &[
                pr.number.to_string(),
                pr.title.clone(),
                pr.author.clone(),
                format_date(pr.created_at),
                format_date(pr.closed_at),
            ],
        )?;
    }

    writer.flush()?;
    Ok(())
}
