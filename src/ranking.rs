use std::collections::{HashMap, HashSet};

use anyhow::Context as _;
use chrono::{DateTime, Utc};
use serde::Serialize;
use url::Url;

use crate::document::{Anchor, Document};
use crate::screenshot::{ScreenshotLedger, ScreenshotRecord};
use crate::url_utils::{self, CanonicalUrl};
use crate::visits::{VisitLedger, VisitRecord};

/// A previously visited link found on the current page.
///
/// Recomputed on every pass and never persisted as a unit. `anchor_index`
/// points back at the anchor in document order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EligibleLink {
    pub url: CanonicalUrl,
    pub anchor_index: usize,
    pub visit_count: u64,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub last_visited_at: DateTime<Utc>,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub favicon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<String>,
}

/// Loads the ledgers once and ranks the document's anchors.
pub async fn rank(
    document: &dyn Document,
    visits: &VisitLedger,
    screenshots: &ScreenshotLedger,
    blacklist: &[String],
    display_limit: usize,
) -> anyhow::Result<Vec<EligibleLink>> {
    let visit_records = visits.get_all().await.context("read visit ledger")?;
    let screenshot_records = match screenshots.get_all().await {
        Ok(records) => records,
        Err(err) => {
            tracing::warn!(?err, "screenshot ledger unavailable; using gradients");
            HashMap::new()
        }
    };

    let links = rank_anchors(
        document,
        &visit_records,
        &screenshot_records,
        blacklist,
        display_limit,
    );
    tracing::debug!(count = links.len(), "ranked eligible links");
    Ok(links)
}

/// Filters, deduplicates and orders anchors by visit count, then by most
/// recent visit. Only links visited at least once survive.
pub fn rank_anchors(
    document: &dyn Document,
    visits: &HashMap<CanonicalUrl, VisitRecord>,
    screenshots: &HashMap<CanonicalUrl, ScreenshotRecord>,
    blacklist: &[String],
    display_limit: usize,
) -> Vec<EligibleLink> {
    let base_url = document.base_url();
    let mut seen = HashSet::new();
    let mut eligible = Vec::new();

    for anchor in document.anchors() {
        match evaluate_anchor(&anchor, base_url, &mut seen, visits, screenshots, blacklist) {
            Ok(Some(link)) => eligible.push(link),
            Ok(None) => {}
            Err(err) => {
                tracing::warn!(index = anchor.index, href = %anchor.href, ?err, "skipping anchor");
            }
        }
    }

    eligible.sort_by(|a, b| {
        b.visit_count
            .cmp(&a.visit_count)
            .then_with(|| b.last_visited_at.cmp(&a.last_visited_at))
    });
    eligible.truncate(display_limit);
    eligible
}

fn evaluate_anchor(
    anchor: &Anchor,
    base_url: &Url,
    seen: &mut HashSet<CanonicalUrl>,
    visits: &HashMap<CanonicalUrl, VisitRecord>,
    screenshots: &HashMap<CanonicalUrl, ScreenshotRecord>,
    blacklist: &[String],
) -> anyhow::Result<Option<EligibleLink>> {
    if !anchor.is_rendered() {
        return Ok(None);
    }

    let absolute = base_url
        .join(anchor.href.trim())
        .with_context(|| format!("resolve href {:?}", anchor.href))?;
    let absolute = absolute.as_str();
    if !url_utils::is_eligible_page(absolute) {
        return Ok(None);
    }

    let url = url_utils::normalize(absolute);
    if !seen.insert(url.clone()) {
        return Ok(None);
    }
    if url_utils::is_blacklisted(url.as_str(), blacklist) {
        return Ok(None);
    }

    let Some(record) = visits.get(&url).filter(|record| record.count > 0) else {
        return Ok(None);
    };

    Ok(Some(EligibleLink {
        title: anchor.display_title(absolute),
        favicon: url_utils::favicon_url(url.as_str()),
        screenshot: screenshots.get(&url).map(|shot| shot.data_url.clone()),
        anchor_index: anchor.index,
        visit_count: record.count,
        last_visited_at: record.last_visited_at,
        url,
    }))
}
