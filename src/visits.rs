use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::storage::{KeyValueStore, VISITS_KEY, get_json, set_json};
use crate::url_utils::CanonicalUrl;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitRecord {
    pub count: u64,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub last_visited_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VisitData {
    #[serde(default)]
    visit_counts_by_url: HashMap<CanonicalUrl, VisitRecord>,
}

/// Persisted visit counts keyed by canonical URL.
///
/// Every read-modify-write goes through `write_lock`, so concurrent
/// `record_visit` calls never lose an increment.
pub struct VisitLedger {
    store: Arc<dyn KeyValueStore>,
    write_lock: Mutex<()>,
}

impl VisitLedger {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            write_lock: Mutex::new(()),
        }
    }

    pub async fn record_visit(&self, url: &CanonicalUrl) -> anyhow::Result<VisitRecord> {
        self.record_visit_at(url, Utc::now()).await
    }

    pub async fn record_visit_at(
        &self,
        url: &CanonicalUrl,
        now: DateTime<Utc>,
    ) -> anyhow::Result<VisitRecord> {
        let _guard = self.write_lock.lock().await;
        let mut data = self.load().await?;

        let record = data
            .visit_counts_by_url
            .entry(url.clone())
            .and_modify(|record| {
                record.count = record.count.saturating_add(1);
                record.last_visited_at = now;
            })
            .or_insert(VisitRecord {
                count: 1,
                last_visited_at: now,
            });
        let record = *record;

        self.save(&data).await?;
        Ok(record)
    }

    pub async fn get(&self, url: &CanonicalUrl) -> anyhow::Result<Option<VisitRecord>> {
        let data = self.load().await?;
        Ok(data.visit_counts_by_url.get(url).copied())
    }

    pub async fn get_all(&self) -> anyhow::Result<HashMap<CanonicalUrl, VisitRecord>> {
        Ok(self.load().await?.visit_counts_by_url)
    }

    /// Drops records last visited before `now - max_age`. Returns how many went.
    pub async fn prune(&self, max_age: Duration) -> anyhow::Result<usize> {
        self.prune_at(max_age, Utc::now()).await
    }

    pub async fn prune_at(&self, max_age: Duration, now: DateTime<Utc>) -> anyhow::Result<usize> {
        let _guard = self.write_lock.lock().await;
        let mut data = self.load().await?;
        let cutoff = cutoff(now, max_age)?;

        let before = data.visit_counts_by_url.len();
        data.visit_counts_by_url
            .retain(|_, record| record.last_visited_at >= cutoff);
        let removed = before - data.visit_counts_by_url.len();

        self.save(&data).await?;
        tracing::debug!(removed, "pruned visit ledger");
        Ok(removed)
    }

    async fn load(&self) -> anyhow::Result<VisitData> {
        let data = get_json::<VisitData>(self.store.as_ref(), VISITS_KEY)
            .await
            .context("load visit ledger")?;
        Ok(data.unwrap_or_default())
    }

    async fn save(&self, data: &VisitData) -> anyhow::Result<()> {
        set_json(self.store.as_ref(), VISITS_KEY, data)
            .await
            .context("save visit ledger")
    }
}

pub(crate) fn cutoff(now: DateTime<Utc>, max_age: Duration) -> anyhow::Result<DateTime<Utc>> {
    let max_age = chrono::Duration::from_std(max_age).context("max age out of range")?;
    Ok(now
        .checked_sub_signed(max_age)
        .unwrap_or(DateTime::<Utc>::MIN_UTC))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use crate::url_utils::normalize;

    fn ledger() -> (Arc<MemoryStore>, VisitLedger) {
        let store = Arc::new(MemoryStore::new());
        let ledger = VisitLedger::new(store.clone());
        (store, ledger)
    }

    fn at(ms: i64) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(ms).unwrap()
    }

    #[tokio::test]
    async fn record_visit_creates_then_increments() {
        let (_, ledger) = ledger();
        let url = normalize("https://a.test/page");

        let first = ledger.record_visit_at(&url, at(1_000)).await.unwrap();
        assert_eq!(first.count, 1);
        let second = ledger.record_visit_at(&url, at(2_000)).await.unwrap();
        assert_eq!(second.count, 2);
        assert_eq!(second.last_visited_at, at(2_000));

        assert_eq!(ledger.get(&url).await.unwrap(), Some(second));
    }

    #[tokio::test]
    async fn stored_shape_uses_millisecond_timestamps() {
        let (store, ledger) = ledger();
        let url = normalize("https://a.test/page");
        ledger.record_visit_at(&url, at(1_700_000_000_000)).await.unwrap();

        let raw = store.get(VISITS_KEY).await.unwrap().unwrap();
        assert_eq!(
            raw,
            serde_json::json!({
                "visitCountsByUrl": {
                    "https://a.test/page": {"count": 1, "lastVisitedAt": 1_700_000_000_000_i64}
                }
            })
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_increments_are_not_lost() {
        let (_, ledger) = ledger();
        let ledger = Arc::new(ledger);
        let url = normalize("https://a.test/page");

        let mut handles = Vec::new();
        for _ in 0..25 {
            let ledger = Arc::clone(&ledger);
            let url = url.clone();
            handles.push(tokio::spawn(async move {
                ledger.record_visit(&url).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(ledger.get(&url).await.unwrap().unwrap().count, 25);
    }

    #[tokio::test]
    async fn prune_removes_only_stale_records() {
        let (_, ledger) = ledger();
        let old = normalize("https://old.test/");
        let fresh = normalize("https://fresh.test/");
        ledger.record_visit_at(&old, at(0)).await.unwrap();
        ledger.record_visit_at(&fresh, at(90_000)).await.unwrap();

        let removed = ledger
            .prune_at(Duration::from_secs(60), at(100_000))
            .await
            .unwrap();
        assert_eq!(removed, 1);

        let all = ledger.get_all().await.unwrap();
        assert!(all.contains_key(&fresh));
        assert!(!all.contains_key(&old));
    }
}
