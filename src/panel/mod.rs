//! Side panel state machine.
//!
//! Hidden → Visible/Idle → Visible/Previewing(i) → Visible/Idle, and back
//! to Hidden when the link set empties or the page is torn down. All
//! overlay mutation goes through an [`OverlaySurface`], so the machine is
//! testable without a live document.

pub mod events;
pub mod styles;
pub mod surface;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use serde::Serialize;

use crate::ranking::EligibleLink;
use crate::settings;
use crate::storage::KeyValueStore;
use crate::url_utils::CanonicalUrl;

pub use events::{ChannelEvents, NoopEvents, PanelEvent, PanelEvents};
pub use surface::{Card, CardBackground, MarkupSurface, OverlaySurface, PreviewNode};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PanelState {
    pub is_visible: bool,
    pub links: Vec<EligibleLink>,
    pub hovered_index: Option<usize>,
    pub preloaded_urls: HashSet<CanonicalUrl>,
}

pub struct Panel<S> {
    surface: S,
    state: PanelState,
    events: Arc<dyn PanelEvents>,
    store: Arc<dyn KeyValueStore>,
    transition: Duration,
    mounted_previews: HashSet<usize>,
}

impl<S: OverlaySurface> Panel<S> {
    pub fn new(
        surface: S,
        events: Arc<dyn PanelEvents>,
        store: Arc<dyn KeyValueStore>,
        transition: Duration,
    ) -> Self {
        Self {
            surface,
            state: PanelState::default(),
            events,
            store,
            transition,
            mounted_previews: HashSet::new(),
        }
    }

    pub fn state(&self) -> &PanelState {
        &self.state
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    /// Creates the overlay on first use and re-renders the full link set.
    /// Re-rendering drops any open preview.
    pub fn show(&mut self, links: Vec<EligibleLink>) {
        if !self.surface.has_style(styles::STYLE_ELEMENT_ID) {
            self.surface
                .inject_style(styles::STYLE_ELEMENT_ID, styles::PANEL_CSS);
        }
        if !self.surface.has_container() {
            self.surface.mount_container();
        }

        self.state.links = links;
        self.state.is_visible = true;
        self.render();
        tracing::debug!(links = self.state.links.len(), "panel shown");
    }

    /// Removes the overlay. Safe to call when already hidden.
    pub fn hide(&mut self) {
        if self.surface.has_container() {
            self.surface.remove_container();
        }
        self.state.is_visible = false;
        self.state.links.clear();
        self.state.hovered_index = None;
        self.mounted_previews.clear();
    }

    pub fn hover(&mut self, index: usize) {
        let Some(url) = self.state.links.get(index).map(|link| link.url.clone()) else {
            tracing::debug!(index, "hover on unknown card ignored");
            return;
        };

        self.state.hovered_index = Some(index);
        if self.mounted_previews.insert(index) {
            if let Err(err) = self.surface.mount_preview(index, &url) {
                tracing::warn!(%url, ?err, "preview unavailable; showing fallback");
                self.surface.show_preview_fallback(index, &url);
            }
        }
        self.surface.show_preview(Some(index));
        self.events.on_link_hovered(&url, index);
    }

    /// Ignored unless `index` is the card currently previewed, so a late
    /// unhover cannot close a newer preview.
    pub fn unhover(&mut self, index: usize) {
        if self.state.hovered_index != Some(index) {
            return;
        }
        self.state.hovered_index = None;
        self.surface.show_preview(None);
        self.events.on_link_unhovered();
    }

    /// Reports an embedded preview that failed after it was mounted.
    pub fn preview_failed(&mut self, index: usize) {
        let Some(link) = self.state.links.get(index) else {
            return;
        };
        tracing::warn!(url = %link.url, "preview refused to load; showing fallback");
        self.surface.show_preview_fallback(index, &link.url);
    }

    pub async fn blacklist_link(&mut self, url: &CanonicalUrl) -> anyhow::Result<()> {
        settings::add_to_blacklist(self.store.as_ref(), url.as_str())
            .await
            .with_context(|| format!("blacklist {url}"))?;

        self.state.links.retain(|link| &link.url != url);
        if self.state.links.is_empty() {
            self.hide();
        } else {
            self.render();
        }
        tracing::info!(%url, "link blacklisted");
        self.events.on_link_blacklisted(url);
        Ok(())
    }

    /// Plays the exit transition when an overlay is present, then hands the
    /// navigation to the host.
    pub async fn click_link(&mut self, url: &CanonicalUrl) {
        if let Some(transition) = self.begin_click() {
            tokio::time::sleep(transition).await;
        }
        self.finish_click(url);
    }

    /// Starts the exit transition. Returns how long to wait before
    /// [`Panel::finish_click`], or `None` when there is no overlay.
    pub fn begin_click(&mut self) -> Option<Duration> {
        self.surface
            .add_container_class(styles::TRANSITION_CLASS)
            .then_some(self.transition)
    }

    pub fn finish_click(&self, url: &CanonicalUrl) {
        self.events.on_link_clicked(url);
    }

    pub fn set_preloaded(&mut self, urls: HashSet<CanonicalUrl>) {
        if self.state.preloaded_urls == urls {
            return;
        }
        self.state.preloaded_urls = urls;
        if self.state.is_visible {
            self.render();
        }
    }

    fn render(&mut self) {
        let cards: Vec<Card> = self
            .state
            .links
            .iter()
            .enumerate()
            .map(|(index, link)| {
                let preloaded = self.state.preloaded_urls.contains(&link.url);
                Card::from_link(index, link, preloaded)
            })
            .collect();
        self.surface.render_cards(&cards);
        self.state.hovered_index = None;
        self.mounted_previews.clear();
    }
}
