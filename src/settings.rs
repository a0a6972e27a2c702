use anyhow::Context as _;
use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_DISABLED_DOMAINS, DEFAULT_DISPLAY_LIMIT, DEFAULT_MAX_PRELOAD, MAX_DISPLAY_LIMIT,
    MAX_PRELOAD, MIN_PRELOAD,
};
use crate::storage::{KeyValueStore, SETTINGS_KEY, get_json, set_json};

/// User-editable settings. Fields missing from a stored record are
/// backfilled from [`Settings::default`] on load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    pub max_preload_per_page: u8,
    pub disabled_domains: Vec<String>,
    pub blacklist: Vec<String>,
    pub display_limit: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_preload_per_page: DEFAULT_MAX_PRELOAD,
            disabled_domains: DEFAULT_DISABLED_DOMAINS
                .iter()
                .map(|d| (*d).to_string())
                .collect(),
            blacklist: Vec::new(),
            display_limit: DEFAULT_DISPLAY_LIMIT,
        }
    }
}

impl Settings {
    fn clamped(mut self) -> Self {
        self.max_preload_per_page = self.max_preload_per_page.clamp(MIN_PRELOAD, MAX_PRELOAD);
        self.display_limit = self.display_limit.clamp(1, MAX_DISPLAY_LIMIT);
        self
    }
}

pub async fn load(store: &dyn KeyValueStore) -> anyhow::Result<Settings> {
    match get_json::<Settings>(store, SETTINGS_KEY)
        .await
        .context("load settings")?
    {
        Some(stored) => Ok(stored.clamped()),
        None => {
            let defaults = Settings::default();
            set_json(store, SETTINGS_KEY, &defaults)
                .await
                .context("persist default settings")?;
            Ok(defaults)
        }
    }
}

pub async fn save(store: &dyn KeyValueStore, settings: &Settings) -> anyhow::Result<()> {
    let settings = settings.clone().clamped();
    set_json(store, SETTINGS_KEY, &settings)
        .await
        .context("save settings")
}

pub async fn reset(store: &dyn KeyValueStore) -> anyhow::Result<Settings> {
    let defaults = Settings::default();
    save(store, &defaults).await?;
    Ok(defaults)
}

pub async fn add_to_blacklist(store: &dyn KeyValueStore, entry: &str) -> anyhow::Result<Settings> {
    update(store, |settings| push_unique(&mut settings.blacklist, entry)).await
}

pub async fn remove_from_blacklist(
    store: &dyn KeyValueStore,
    entry: &str,
) -> anyhow::Result<Settings> {
    update(store, |settings| remove_all(&mut settings.blacklist, entry)).await
}

pub async fn add_disabled_domain(
    store: &dyn KeyValueStore,
    domain: &str,
) -> anyhow::Result<Settings> {
    update(store, |settings| {
        push_unique(&mut settings.disabled_domains, domain)
    })
    .await
}

pub async fn remove_disabled_domain(
    store: &dyn KeyValueStore,
    domain: &str,
) -> anyhow::Result<Settings> {
    update(store, |settings| {
        remove_all(&mut settings.disabled_domains, domain)
    })
    .await
}

pub async fn set_max_preload(store: &dyn KeyValueStore, max: u8) -> anyhow::Result<Settings> {
    update(store, |settings| {
        settings.max_preload_per_page = max;
        true
    })
    .await
}

async fn update<F>(store: &dyn KeyValueStore, apply: F) -> anyhow::Result<Settings>
where
    F: FnOnce(&mut Settings) -> bool,
{
    let mut settings = load(store).await?;
    if apply(&mut settings) {
        save(store, &settings).await?;
        settings = settings.clamped();
    }
    Ok(settings)
}

fn push_unique(list: &mut Vec<String>, entry: &str) -> bool {
    let entry = entry.trim();
    if entry.is_empty() || list.iter().any(|existing| existing == entry) {
        return false;
    }
    list.push(entry.to_owned());
    true
}

fn remove_all(list: &mut Vec<String>, entry: &str) -> bool {
    let before = list.len();
    list.retain(|existing| existing != entry.trim());
    list.len() != before
}
