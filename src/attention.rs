//! Review-priority classification.
//!
//! A pull request needs the viewer's attention when the viewer has a
//! pending review request on it, when nobody has reviewed it yet, or when
//! commits landed after the viewer's most recent review.

use crate::types::{PullRequest, QueueEntry, ReviewQueue};

pub fn needs_attention(pr: &PullRequest, viewer: &str) -> bool {
    if pr.is_review_requested_from(viewer) {
        return true;
    }

    if pr.review_count == 0 {
        return true;
    }

    match (pr.last_review_by(viewer), pr.last_commit_date) {
        (Some(reviewed_at), Some(committed_at)) => committed_at > reviewed_at,
        _ => false,
    }
}

/// Classifies `prs` for `viewer` and orders them: pull requests needing
/// attention first, oldest first within each group.
pub fn classify(prs: Vec<PullRequest>, viewer: &str) -> ReviewQueue {
    let mut entries: Vec<QueueEntry> = prs
        .into_iter()
        .map(|pr| QueueEntry {
            needs_attention: needs_attention(&pr, viewer),
            pr,
        })
        .collect();

    entries.sort_by_key(|entry| (!entry.needs_attention, entry.pr.created_at));

    ReviewQueue {
        viewer: viewer.to_string(),
        entries,
    }
}
