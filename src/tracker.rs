use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use url::Url;

use crate::url_utils::{self, CanonicalUrl};
use crate::visits::VisitLedger;

/// One element on the path from a click target up to the document root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementInfo {
    pub tag: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
}

impl ElementInfo {
    pub fn anchor(href: impl Into<String>) -> Self {
        Self {
            tag: "a".to_string(),
            href: Some(href.into()),
        }
    }

    pub fn element(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            href: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClickEvent {
    /// Target first, root last.
    pub path: Vec<ElementInfo>,
}

impl ClickEvent {
    pub fn on_anchor(href: impl Into<String>) -> Self {
        Self {
            path: vec![ElementInfo::anchor(href)],
        }
    }

    /// href of the nearest enclosing `<a>`, if it has a non-empty one.
    pub fn closest_anchor_href(&self) -> Option<&str> {
        let anchor = self
            .path
            .iter()
            .find(|element| element.tag.eq_ignore_ascii_case("a"))?;
        anchor
            .href
            .as_deref()
            .map(str::trim)
            .filter(|href| !href.is_empty())
    }
}

/// Records a visit for each distinct navigation intent. Repeat clicks on
/// the same canonical URL inside `debounce` count once.
pub struct ClickTracker {
    ledger: Arc<VisitLedger>,
    debounce: Duration,
    recent_clicks: Mutex<HashMap<CanonicalUrl, Instant>>,
}

impl ClickTracker {
    pub fn new(ledger: Arc<VisitLedger>, debounce: Duration) -> Self {
        Self {
            ledger,
            debounce,
            recent_clicks: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the URL whose count was incremented, or `None` when the click
    /// was ignored. Errors are logged here and never reach the host.
    pub async fn handle_click(&self, event: &ClickEvent, base_url: &Url) -> Option<CanonicalUrl> {
        let href = event.closest_anchor_href()?;
        let absolute = url_utils::to_absolute_url(href, base_url);
        if !url_utils::is_eligible_page(&absolute) {
            return None;
        }

        let url = url_utils::normalize(&absolute);
        if !self.try_mark_clicked(&url) {
            tracing::debug!(%url, "click debounced");
            return None;
        }

        match self.ledger.record_visit(&url).await {
            Ok(record) => {
                tracing::debug!(%url, count = record.count, "visit tracked");
                Some(url)
            }
            Err(err) => {
                tracing::warn!(%url, ?err, "failed to track visit");
                None
            }
        }
    }

    /// Check and mark in one critical section so concurrent handlers cannot
    /// both pass the debounce.
    fn try_mark_clicked(&self, url: &CanonicalUrl) -> bool {
        let now = Instant::now();
        let mut recent = self
            .recent_clicks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(last) = recent.get(url) {
            if now.duration_since(*last) < self.debounce {
                return false;
            }
        }
        recent.insert(url.clone(), now);
        true
    }

    /// Evicts entries older than twice the debounce window.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let max_age = self.debounce * 2;
        let mut recent = self
            .recent_clicks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let before = recent.len();
        recent.retain(|_, clicked_at| now.duration_since(*clicked_at) <= max_age);
        before - recent.len()
    }

    pub fn pending_debounce_entries(&self) -> usize {
        self.recent_clicks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Runs [`ClickTracker::sweep`] every `every` until the handle is aborted.
    pub fn spawn_sweeper(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let tracker = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let evicted = tracker.sweep();
                if evicted > 0 {
                    tracing::trace!(evicted, "swept debounce entries");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::CLICK_DEBOUNCE;
    use crate::storage::MemoryStore;
    use crate::url_utils::normalize;

    fn tracker() -> (Arc<VisitLedger>, Arc<ClickTracker>) {
        let ledger = Arc::new(VisitLedger::new(Arc::new(MemoryStore::new())));
        let tracker = Arc::new(ClickTracker::new(Arc::clone(&ledger), CLICK_DEBOUNCE));
        (ledger, tracker)
    }

    fn base() -> Url {
        Url::parse("https://site.test/section/").unwrap()
    }

    async fn count(ledger: &VisitLedger, url: &str) -> u64 {
        ledger
            .get(&normalize(url))
            .await
            .unwrap()
            .map(|record| record.count)
            .unwrap_or(0)
    }

    #[test]
    fn closest_anchor_walks_up_the_path() {
        let event = ClickEvent {
            path: vec![
                ElementInfo::element("span"),
                ElementInfo::element("img"),
                ElementInfo::anchor("/target"),
                ElementInfo::element("body"),
            ],
        };
        assert_eq!(event.closest_anchor_href(), Some("/target"));

        let no_anchor = ClickEvent {
            path: vec![ElementInfo::element("button"), ElementInfo::element("body")],
        };
        assert_eq!(no_anchor.closest_anchor_href(), None);

        let empty_href = ClickEvent {
            path: vec![ElementInfo::anchor("  ")],
        };
        assert_eq!(empty_href.closest_anchor_href(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn rapid_duplicate_clicks_count_once() {
        let (ledger, tracker) = tracker();
        let event = ClickEvent::on_anchor("page?utm_source=x");

        let first = tracker.handle_click(&event, &base()).await;
        assert_eq!(first.as_ref().map(CanonicalUrl::as_str), Some("https://site.test/section/page"));

        tokio::time::advance(Duration::from_millis(400)).await;
        assert!(tracker.handle_click(&event, &base()).await.is_none());
        assert_eq!(count(&ledger, "https://site.test/section/page").await, 1);

        tokio::time::advance(Duration::from_millis(1000)).await;
        assert!(tracker.handle_click(&event, &base()).await.is_some());
        assert_eq!(count(&ledger, "https://site.test/section/page").await, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn debounce_is_per_canonical_url() {
        let (ledger, tracker) = tracker();
        tracker
            .handle_click(&ClickEvent::on_anchor("https://a.test/x#one"), &base())
            .await
            .unwrap();
        tracker
            .handle_click(&ClickEvent::on_anchor("https://b.test/y"), &base())
            .await
            .unwrap();
        assert!(
            tracker
                .handle_click(&ClickEvent::on_anchor("https://a.test/x#two"), &base())
                .await
                .is_none()
        );

        assert_eq!(count(&ledger, "https://a.test/x").await, 1);
        assert_eq!(count(&ledger, "https://b.test/y").await, 1);
    }

    #[tokio::test]
    async fn ineligible_targets_are_ignored() {
        let (ledger, tracker) = tracker();
        for href in ["mailto:a@site.test", "/files/report.PDF", "/get?download=1"] {
            assert!(tracker.handle_click(&ClickEvent::on_anchor(href), &base()).await.is_none());
        }
        assert!(ledger.get_all().await.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn sweeper_evicts_stale_entries() {
        let (_, tracker) = tracker();
        tracker
            .handle_click(&ClickEvent::on_anchor("/a"), &base())
            .await
            .unwrap();
        assert_eq!(tracker.pending_debounce_entries(), 1);

        let sweeper = tracker.spawn_sweeper(Duration::from_millis(5000));
        tokio::time::sleep(Duration::from_millis(5100)).await;
        assert_eq!(tracker.pending_debounce_entries(), 0);
        sweeper.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_keeps_entries_within_twice_the_window() {
        let (_, tracker) = tracker();
        tracker
            .handle_click(&ClickEvent::on_anchor("/a"), &base())
            .await
            .unwrap();
        tokio::time::advance(Duration::from_millis(1500)).await;
        assert_eq!(tracker.sweep(), 0);
        tokio::time::advance(Duration::from_millis(600)).await;
        assert_eq!(tracker.sweep(), 1);
    }
}
