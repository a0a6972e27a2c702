use serde::Serialize;
use tokio::sync::mpsc;

use crate::url_utils::CanonicalUrl;

/// Host callbacks invoked by the panel. Every method defaults to a no-op.
pub trait PanelEvents: Send + Sync {
    fn on_link_hovered(&self, _url: &CanonicalUrl, _index: usize) {}
    fn on_link_unhovered(&self) {}
    fn on_link_clicked(&self, _url: &CanonicalUrl) {}
    fn on_link_blacklisted(&self, _url: &CanonicalUrl) {}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopEvents;

impl PanelEvents for NoopEvents {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PanelEvent {
    Hovered { url: CanonicalUrl, index: usize },
    Unhovered,
    Clicked { url: CanonicalUrl },
    Blacklisted { url: CanonicalUrl },
}

/// Turns callbacks into a stream consumed by a single dispatcher.
#[derive(Debug, Clone)]
pub struct ChannelEvents {
    tx: mpsc::UnboundedSender<PanelEvent>,
}

impl ChannelEvents {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<PanelEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn send(&self, event: PanelEvent) {
        if self.tx.send(event).is_err() {
            tracing::debug!("panel event dropped; dispatcher is gone");
        }
    }
}

impl PanelEvents for ChannelEvents {
    fn on_link_hovered(&self, url: &CanonicalUrl, index: usize) {
        self.send(PanelEvent::Hovered {
            url: url.clone(),
            index,
        });
    }

    fn on_link_unhovered(&self) {
        self.send(PanelEvent::Unhovered);
    }

    fn on_link_clicked(&self, url: &CanonicalUrl) {
        self.send(PanelEvent::Clicked { url: url.clone() });
    }

    fn on_link_blacklisted(&self, url: &CanonicalUrl) {
        self.send(PanelEvent::Blacklisted { url: url.clone() });
    }
}
