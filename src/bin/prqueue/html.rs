use std::{
    collections::BTreeMap,
    fmt::Write as _,
    path::{Path, PathBuf},
    sync::LazyLock,
};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use prqueue::{CiState, Label, QueueEntry, ReviewQueue};
use regex::Regex;
use tracing::warn;

use prqueue::query::plural;

static HEX_COLOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9a-fA-F]{6}$").expect("valid hex color regex"));

const FALLBACK_LABEL_COLOR: &str = "d0d7de";

const SVG_COMMENT: &str = concat!(
    r#"<svg class="w-4 h-4" fill="none" stroke="currentColor" viewBox="0 0 24 24">"#,
    r#"<path stroke-linecap="round" stroke-linejoin="round" stroke-width="2" "#,
    r#"d="M8 12h.01M12 12h.01M16 12h.01M21 12c0 4.418-4.03 8-9 8a9.863 9.863 0 01-4.255-.949L3 20l1.395-3.72C3.512 15.042 3 13.574 3 12c0-4.418 4.03-8 9-8s9 3.582 9 8z"/>"#,
    "</svg>",
);

const SVG_REVIEW: &str = concat!(
    r#"<svg class="w-4 h-4" fill="none" stroke="currentColor" viewBox="0 0 24 24">"#,
    r#"<path stroke-linecap="round" stroke-linejoin="round" stroke-width="2" d="M15 12a3 3 0 11-6 0 3 3 0 016 0z"/>"#,
    r#"<path stroke-linecap="round" stroke-linejoin="round" stroke-width="2" "#,
    r#"d="M2.458 12C3.732 7.943 7.523 5 12 5c4.478 0 8.268 2.943 9.542 7-1.274 4.057-5.064 7-9.542 7-4.477 0-8.268-2.943-9.542-7z"/>"#,
    "</svg>",
);

const SVG_PULL_REQUEST: &str = concat!(
    r#"<svg class="w-5 h-5 shrink-0" viewBox="0 0 16 16" fill="currentColor">"#,
    r#"<path d="M1.5 3.25a2.25 2.25 0 1 1 3 2.122v5.256a2.251 2.251 0 1 1-1.5 0V5.372A2.25 2.25 0 0 1 1.5 3.25Zm5.677-.177L9.573.677A.25.25 0 0 1 10 .854V2.5h1A2.5 2.5 0 0 1 13.5 5v5.628a2.251 2.251 0 1 1-1.5 0V5a1 1 0 0 0-1-1h-1v1.646a.25.25 0 0 1-.427.177L7.177 3.427a.25.25 0 0 1 0-.354ZM3.75 2.5a.75.75 0 1 0 0 1.5.75.75 0 0 0 0-1.5Zm0 9.5a.75.75 0 1 0 0 1.5.75.75 0 0 0 0-1.5Zm8.25.75a.75.75 0 1 0 1.5 0 .75.75 0 0 0-1.5 0Z"/>"#,
    "</svg>",
);

/// Clicking any link in a row records the PR as seen in localStorage and
/// drops its attention border, also on later loads of the report.
const SEEN_SCRIPT: &str = r#"    <script>
      const KEY = "seen_prs";
      const seen = new Set(JSON.parse(localStorage.getItem(KEY) || "[]"));
      function markSeen(row) {
        row.classList.remove("border-l-blue-500");
        row.classList.add("border-l-transparent");
      }
      document.querySelectorAll(".pr-row").forEach(row => {
        const url = row.dataset.prUrl;
        if (seen.has(url)) markSeen(row);
        row.querySelectorAll("a").forEach(a => {
          a.addEventListener("click", () => {
            seen.add(url);
            localStorage.setItem(KEY, JSON.stringify([...seen]));
            markSeen(row);
          });
        });
      });
    </script>
"#;

pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

fn unit(count: i64, name: &str) -> String {
    let suffix = if count == 1 { "" } else { "s" };
    format!("{count} {name}{suffix} ago")
}

/// Coarse relative time used in the report, e.g. `3 days ago`.
pub fn time_ago(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let seconds = (now - then).num_seconds();
    if seconds < 60 {
        return "just now".to_string();
    }
    let minutes = seconds / 60;
    if minutes < 60 {
        return unit(minutes, "minute");
    }
    let hours = minutes / 60;
    if hours < 24 {
        return unit(hours, "hour");
    }
    unit(hours / 24, "day")
}

fn ci_icon(state: Option<CiState>) -> &'static str {
    match state {
        Some(CiState::Success) => {
            r#"<span class="text-green-600" title="Checks passing">&#10003;</span>"#
        }
        Some(CiState::Failure | CiState::Error) => {
            r#"<span class="text-red-600" title="Checks failing">&#10007;</span>"#
        }
        Some(CiState::Pending) => {
            r#"<span class="text-yellow-500" title="Checks pending">&#9679;</span>"#
        }
        _ => "",
    }
}

/// Text color for a label badge: white on dark backgrounds, near-black on
/// light ones.
pub fn label_text_color(hex: &str) -> &'static str {
    let channel = |i: usize| {
        hex.get(i..i + 2)
            .and_then(|h| u8::from_str_radix(h, 16).ok())
            .map_or(0.0, f64::from)
    };
    let luminance = (0.299 * channel(0) + 0.587 * channel(2) + 0.114 * channel(4)) / 255.0;
    if luminance < 0.6 { "#fff" } else { "#24292f" }
}

fn label_badge(label: &Label) -> String {
    let color = if HEX_COLOR.is_match(&label.color) {
        label.color.as_str()
    } else {
        FALLBACK_LABEL_COLOR
    };
    format!(
        r#"<span class="inline-block px-2 py-0.5 text-xs font-medium rounded-full mr-1" style="background-color:#{};color:{}">{}</span>"#,
        color,
        label_text_color(color),
        escape_html(&label.name)
    )
}

fn count_badge(count: u64, icon_svg: &str, title: &str) -> Option<String> {
    (count > 0).then(|| {
        format!(
            r#"<span class="inline-flex items-center gap-1 text-xs text-gray-500" title="{title}">{icon_svg} {count}</span>"#
        )
    })
}

fn render_repo_header(out: &mut String, org: &str, repo: &str) {
    let repo = escape_html(repo);
    let org = escape_html(org);
    let _ = write!(
        out,
        r#"      <div class="sticky top-0 flex items-center bg-gray-50/90 px-4 py-3 text-sm font-semibold text-gray-900 ring-1 ring-gray-900/10 backdrop-blur-sm dark:bg-gray-700/90 dark:text-gray-200 dark:ring-black/10">
        <a href="https://github.com/{org}/{repo}" class="hover:text-blue-600">{repo}</a>
      </div>
"#
    );
}

fn render_entry(out: &mut String, entry: &QueueEntry, now: DateTime<Utc>) {
    let pr = &entry.pr;
    let url = escape_html(&pr.url);
    let pr_color = if pr.is_draft {
        "text-gray-500"
    } else {
        "text-green-600"
    };
    let attention = if entry.needs_attention {
        "border-l-4 border-l-blue-500"
    } else {
        "border-l-4 border-l-transparent"
    };

    let labels: String = pr.labels.iter().map(label_badge).collect();
    let labels_html = if labels.is_empty() {
        String::new()
    } else {
        format!(r#"<div class="mt-1">{labels}</div>"#)
    };

    let counters: Vec<String> = [
        count_badge(pr.review_count, SVG_REVIEW, "Reviews"),
        count_badge(pr.comment_count, SVG_COMMENT, "Comments"),
    ]
    .into_iter()
    .flatten()
    .collect();
    let counters_html = if counters.is_empty() {
        String::new()
    } else {
        format!(
            r#"<div class="flex items-center gap-3">{}</div>"#,
            counters.join(" ")
        )
    };

    let _ = write!(
        out,
        r#"      <div class="pr-row flex items-start gap-3 px-4 py-3 border-b border-gray-200 hover:bg-gray-50 {attention}" data-pr-url="{url}">
        <div class="{pr_color} mt-0.5">{SVG_PULL_REQUEST}</div>
        <div class="flex-1 min-w-0">
          <div class="flex flex-wrap items-center gap-x-1">
            <a href="{url}" class="text-base font-semibold text-gray-900 hover:text-blue-600">{title}</a>
            {ci}
          </div>
          {labels_html}
          <div class="text-xs text-gray-500 mt-0.5">#{number} opened {ago} by {author}</div>
        </div>
        {counters_html}
      </div>
"#,
        title = escape_html(&pr.title),
        ci = ci_icon(pr.ci_state),
        number = pr.number,
        ago = time_ago(pr.created_at, now),
        author = escape_html(&pr.author),
    );
}

/// Groups entries by repository, ordering repositories case-insensitively
/// and keeping queue order within each one.
fn group_by_repo(entries: &[QueueEntry]) -> Vec<(&str, Vec<&QueueEntry>)> {
    let mut groups: BTreeMap<(String, &str), Vec<&QueueEntry>> = BTreeMap::new();
    for entry in entries {
        let repo = entry.pr.repo.as_str();
        groups
            .entry((repo.to_lowercase(), repo))
            .or_default()
            .push(entry);
    }
    groups
        .into_iter()
        .map(|((_, repo), entries)| (repo, entries))
        .collect()
}

/// Renders the queue as a standalone HTML page.
pub fn render_html(queue: &ReviewQueue, org: &str, now: DateTime<Utc>) -> String {
    let mut rows = String::new();
    for (repo, entries) in group_by_repo(&queue.entries) {
        render_repo_header(&mut rows, org, repo);
        for entry in entries {
            render_entry(&mut rows, entry, now);
        }
    }

    let empty_msg = if queue.is_empty() {
        r#"<p class="text-gray-500 mt-4">No open pull requests found.</p>"#
    } else {
        ""
    };

    let org = escape_html(org);
    let count = queue.len();
    let suffix = plural(count);

    format!(
        r#"<!doctype html>
<html>
  <head>
    <meta charset="UTF-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1.0" />
    <script src="https://cdn.jsdelivr.net/npm/@tailwindcss/browser@4"></script>
    <title>Open PRs – {org}</title>
  </head>
  <body class="bg-gray-50 p-8">
    <div class="max-w-5xl mx-auto">
      <h1 class="text-3xl font-bold mb-1">{org}</h1>
      <p class="text-gray-500 mb-6">{count} open pull request{suffix}</p>
      {empty_msg}
      <div class="bg-white rounded-lg shadow border border-gray-200">
{rows}      </div>
    </div>
{SEEN_SCRIPT}  </body>
</html>
"#
    )
}

pub fn report_path(org: &str) -> PathBuf {
    let file_name: String = format!("{org}_review_queue.html")
        .chars()
        .map(|c| if std::path::is_separator(c) { '_' } else { c })
        .collect();
    std::env::temp_dir().join(file_name)
}

/// Writes the HTML report for `org` into the temp directory and returns its
/// path.
pub fn write_report(queue: &ReviewQueue, org: &str) -> Result<PathBuf> {
    let path = report_path(org);
    std::fs::write(&path, render_html(queue, org, Utc::now()))
        .with_context(|| format!("Failed to write report to '{}'", path.display()))?;
    Ok(path)
}

fn opener_command(target: &str) -> std::process::Command {
    #[cfg(target_os = "macos")]
    {
        let mut cmd = std::process::Command::new("open");
        cmd.arg(target);
        cmd
    }
    #[cfg(target_os = "windows")]
    {
        let mut cmd = std::process::Command::new("cmd");
        cmd.args(["/C", "start", "", target]);
        cmd
    }
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        let mut cmd = std::process::Command::new("xdg-open");
        cmd.arg(target);
        cmd
    }
}

/// Opens the report in the default browser. Failures are only logged.
pub async fn open_in_browser(path: &Path) {
    let target = url::Url::from_file_path(path)
        .map(|u| u.to_string())
        .unwrap_or_else(|()| path.display().to_string());

    let status = tokio::process::Command::from(opener_command(&target))
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .await;

    match status {
        Ok(status) if status.success() => {}
        Ok(status) => warn!(%target, %status, "Browser opener exited unsuccessfully"),
        Err(e) => warn!(%target, error = %e, "Failed to launch browser"),
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};
    use prqueue::{PullRequest, classify};

    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 15, 12, 0, 0).unwrap()
    }

    fn pr(repo: &str, number: u64) -> PullRequest {
        PullRequest {
            repo: repo.to_string(),
            number,
            title: format!("Change {number}"),
            url: format!("https://github.com/OneBusAway/{repo}/pull/{number}"),
            created_at: now() - Duration::days(number as i64),
            is_draft: false,
            author: "bob".to_string(),
            labels: vec![],
            comment_count: 0,
            review_count: 1,
            requested_reviewers: vec![],
            reviews: vec![],
            last_commit_date: None,
            ci_state: None,
        }
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html(r#"<a href="x">Tom & Jerry's</a>"#),
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; Jerry&#x27;s&lt;/a&gt;"
        );
    }

    #[test]
    fn test_time_ago() {
        let n = now();
        assert_eq!(time_ago(n - Duration::seconds(59), n), "just now");
        assert_eq!(time_ago(n - Duration::seconds(60), n), "1 minute ago");
        assert_eq!(time_ago(n - Duration::minutes(59), n), "59 minutes ago");
        assert_eq!(time_ago(n - Duration::hours(1), n), "1 hour ago");
        assert_eq!(time_ago(n - Duration::hours(23), n), "23 hours ago");
        assert_eq!(time_ago(n - Duration::hours(24), n), "1 day ago");
        assert_eq!(time_ago(n - Duration::days(40), n), "40 days ago");
        // Clock skew puts timestamps in the future.
        assert_eq!(time_ago(n + Duration::minutes(5), n), "just now");
    }

    #[test]
    fn test_label_text_color() {
        assert_eq!(label_text_color("000000"), "#fff");
        assert_eq!(label_text_color("d73a4a"), "#fff");
        assert_eq!(label_text_color("ffffff"), "#24292f");
        assert_eq!(label_text_color("a2eeef"), "#24292f");
    }

    #[test]
    fn test_label_badge_falls_back_on_bad_color() {
        let badge = label_badge(&Label {
            name: "<script>".to_string(),
            color: "zzz".to_string(),
        });
        assert!(badge.contains("background-color:#d0d7de"));
        assert!(badge.contains("&lt;script&gt;"));
    }

    #[test]
    fn test_count_badge_hidden_when_zero() {
        assert!(count_badge(0, SVG_REVIEW, "Reviews").is_none());
        let badge = count_badge(4, SVG_COMMENT, "Comments").unwrap();
        assert!(badge.contains(r#"title="Comments""#));
        assert!(badge.ends_with(" 4</span>"));
    }

    #[test]
    fn test_ci_icon() {
        assert!(ci_icon(Some(CiState::Success)).contains("Checks passing"));
        assert!(ci_icon(Some(CiState::Error)).contains("Checks failing"));
        assert!(ci_icon(Some(CiState::Pending)).contains("Checks pending"));
        assert_eq!(ci_icon(Some(CiState::Expected)), "");
        assert_eq!(ci_icon(None), "");
    }

    #[test]
    fn test_render_empty() {
        let html = render_html(&classify(vec![], "alice"), "OneBusAway", now());
        assert!(html.contains("<title>Open PRs – OneBusAway</title>"));
        assert!(html.contains("0 open pull requests"));
        assert!(html.contains("No open pull requests found."));
        assert!(!html.contains("pr-row flex"));
    }

    #[test]
    fn test_render_groups_repos_case_insensitively() {
        let mut attention = pr("maglev", 2);
        attention.review_count = 0;
        attention.is_draft = true;
        attention.labels = vec![Label {
            name: "bug".to_string(),
            color: "d73a4a".to_string(),
        }];
        attention.ci_state = Some(CiState::Failure);

        let queue = classify(
            vec![pr("Zeta", 1), attention, pr("alpha", 3), pr("maglev", 4)],
            "alice",
        );
        let html = render_html(&queue, "OneBusAway", now());

        let alpha = html.find("OneBusAway/alpha\"").unwrap();
        let maglev = html.find("OneBusAway/maglev\"").unwrap();
        let zeta = html.find("OneBusAway/Zeta\"").unwrap();
        assert!(alpha < maglev && maglev < zeta);

        // Within a repository the queue order is kept: #2 needs attention.
        let pr2 = html.find("data-pr-url=\"https://github.com/OneBusAway/maglev/pull/2\"");
        let pr4 = html.find("data-pr-url=\"https://github.com/OneBusAway/maglev/pull/4\"");
        assert!(pr2.unwrap() < pr4.unwrap());

        assert_eq!(html.matches("border-l-blue-500\" data-pr-url").count(), 1);
        assert!(html.contains("#2 opened 2 days ago by bob"));
        assert!(html.contains("4 open pull requests"));
        assert!(html.contains("Checks failing"));
        assert!(html.contains("background-color:#d73a4a;color:#fff"));
        assert!(html.contains(r#"<div class="text-gray-500 mt-0.5">"#));
        assert!(html.contains("localStorage"));
    }

    #[test]
    fn test_render_single_pr_is_singular() {
        let html = render_html(&classify(vec![pr("maglev", 1)], "alice"), "OneBusAway", now());
        assert!(html.contains("1 open pull request</p>"));
    }

    #[test]
    fn test_report_path() {
        let path = report_path("OneBusAway");
        assert_eq!(path.parent(), Some(std::env::temp_dir().as_path()));
        assert_eq!(
            path.file_name().and_then(|n| n.to_str()),
            Some("OneBusAway_review_queue.html")
        );
    }
}
