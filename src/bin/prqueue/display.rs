use std::io::{self, IsTerminal, Write};

use anyhow::Result;
use chrono::{DateTime, Utc};
use prqueue::{CiState, QueueEntry, ReviewQueue};

use prqueue::query::plural;

const TABLE_HEADERS: &[&str] = &["", "REPO", "URL", "AUTHOR", "CI", "CREATED", "TITLE"];
const TITLE_COLUMN_INDEX: usize = TABLE_HEADERS.len() - 1;
const COLUMN_SEPARATOR: &str = "  ";
const TITLE_TRUNCATION_SUFFIX: &str = "...";
const MIN_TITLE_WIDTH_FOR_TRUNCATION: usize = 3;
const ATTENTION_MARKER: &str = "*";

fn format_relative_time(time: DateTime<Utc>) -> String {
    use chrono_humanize::HumanTime;
    HumanTime::from(time).to_string()
}

fn format_ci_state(state: Option<CiState>) -> String {
    state.map_or_else(|| "-".to_string(), |s| s.to_string())
}

fn display_width(s: &str) -> usize {
    s.chars().count()
}

fn terminal_width() -> usize {
    if io::stdout().is_terminal() {
        terminal_size::terminal_size()
            .map(|(w, _)| w.0 as usize)
            .unwrap_or(usize::MAX)
    } else {
        usize::MAX
    }
}

fn entry_to_table_row(entry: &QueueEntry) -> Vec<String> {
    let pr = &entry.pr;
    vec![
        if entry.needs_attention {
            ATTENTION_MARKER.to_string()
        } else {
            String::new()
        },
        pr.repo.clone(),
        pr.url.clone(),
        pr.author.clone(),
        format_ci_state(pr.ci_state),
        format_relative_time(pr.created_at),
        pr.title.clone(),
    ]
}

fn calculate_column_widths(headers: &[&str], rows: &[Vec<String>]) -> Vec<usize> {
    let mut widths: Vec<usize> = headers.iter().map(|h| display_width(h)).collect();

    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if i < widths.len() {
                widths[i] = widths[i].max(display_width(cell));
            }
        }
    }

    widths
}

fn apply_title_truncation(rows: &mut [Vec<String>], widths: &mut [usize], terminal_width: usize) {
    if terminal_width == usize::MAX {
        return;
    }

    let separator_width = COLUMN_SEPARATOR.len() * (widths.len() - 1);
    let non_title_width: usize =
        widths[..TITLE_COLUMN_INDEX].iter().sum::<usize>() + separator_width;

    if non_title_width >= terminal_width {
        return;
    }

    let available = terminal_width - non_title_width;
    if widths[TITLE_COLUMN_INDEX] <= available || available <= MIN_TITLE_WIDTH_FOR_TRUNCATION {
        return;
    }

    widths[TITLE_COLUMN_INDEX] = available;
    let keep = available - TITLE_TRUNCATION_SUFFIX.len();
    for row in rows {
        if let Some(title) = row.get_mut(TITLE_COLUMN_INDEX)
            && display_width(title) > available
        {
            let truncated: String = title.chars().take(keep).collect();
            *title = format!("{truncated}{TITLE_TRUNCATION_SUFFIX}");
        }
    }
}

fn write_padded<W: Write>(writer: &mut W, cell: &str, width: usize, last: bool) -> Result<()> {
    if last {
        // No trailing padding on the final column.
        write!(writer, "{cell}")?;
    } else {
        let padding = width.saturating_sub(display_width(cell));
        write!(writer, "{cell}{}{COLUMN_SEPARATOR}", " ".repeat(padding))?;
    }
    Ok(())
}

fn render_table<W: Write>(
    headers: &[&str],
    rows: &[Vec<String>],
    widths: &[usize],
    writer: &mut W,
) -> Result<()> {
    let last = widths.len() - 1;

    for (i, header) in headers.iter().enumerate() {
        write_padded(writer, header, widths[i], i == last)?;
    }
    writeln!(writer)?;

    for (i, &width) in widths.iter().enumerate() {
        write_padded(writer, &"-".repeat(width), width, i == last)?;
    }
    writeln!(writer)?;

    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            write_padded(writer, cell, widths[i], i == last)?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn display_queue_with_width<W: Write>(
    queue: &ReviewQueue,
    writer: &mut W,
    terminal_width: usize,
) -> Result<()> {
    if queue.is_empty() {
        writeln!(writer, "No open pull requests found.")?;
        return Ok(());
    }

    let mut rows: Vec<Vec<String>> = queue.entries.iter().map(entry_to_table_row).collect();
    let mut widths = calculate_column_widths(TABLE_HEADERS, &rows);
    apply_title_truncation(&mut rows, &mut widths, terminal_width);

    render_table(TABLE_HEADERS, &rows, &widths, writer)?;

    writeln!(writer)?;
    writeln!(
        writer,
        "Total: {} open PR{}",
        queue.len(),
        plural(queue.len())
    )?;
    Ok(())
}

/// Prints the queue as a text table, truncating titles to the terminal
/// width when stdout is a terminal.
pub fn display_queue_table<W: Write>(queue: &ReviewQueue, writer: &mut W) -> Result<()> {
    display_queue_with_width(queue, writer, terminal_width())
}
