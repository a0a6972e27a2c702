//! Page integration: one [`PageSession`] per loaded page.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use url::Url;

use crate::constants::{
    CLICK_DEBOUNCE, CLICK_SWEEP_INTERVAL, MUTATION_DEBOUNCE, NAVIGATION_TRANSITION,
    SCREENSHOT_SETTLE_DELAY,
};
use crate::document::{Document, MutationRecord, has_link_changes};
use crate::panel::{ChannelEvents, OverlaySurface, Panel, PanelEvent, PanelState};
use crate::preload::{HintSink, PreloadController};
use crate::ranking::{self, EligibleLink};
use crate::screenshot::{CaptureService, ScreenshotLedger, ScreenshotPipeline};
use crate::settings::{self, Settings};
use crate::storage::KeyValueStore;
use crate::tracker::{ClickEvent, ClickTracker};
use crate::url_utils::{self, CanonicalUrl};
use crate::visits::VisitLedger;

/// Performs the navigation the panel asks for.
pub trait Navigator: Send + Sync {
    fn navigate(&self, url: &CanonicalUrl);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionTimings {
    pub click_debounce: Duration,
    pub sweep_interval: Duration,
    pub mutation_debounce: Duration,
    pub transition: Duration,
    pub screenshot_settle: Duration,
}

impl Default for SessionTimings {
    fn default() -> Self {
        Self {
            click_debounce: CLICK_DEBOUNCE,
            sweep_interval: CLICK_SWEEP_INTERVAL,
            mutation_debounce: MUTATION_DEBOUNCE,
            transition: NAVIGATION_TRANSITION,
            screenshot_settle: SCREENSHOT_SETTLE_DELAY,
        }
    }
}

struct Shared<S, H> {
    store: Arc<dyn KeyValueStore>,
    visits: Arc<VisitLedger>,
    screenshots: Arc<ScreenshotLedger>,
    settings: Mutex<Settings>,
    document: Mutex<Arc<dyn Document>>,
    panel: Mutex<Panel<S>>,
    preload: Mutex<PreloadController<H>>,
}

impl<S, H> Shared<S, H>
where
    S: OverlaySurface + 'static,
    H: HintSink + 'static,
{
    /// Rank, then show or hide the panel, then warm up the top links.
    async fn analyze(&self) -> Vec<EligibleLink> {
        let settings = match settings::load(self.store.as_ref()).await {
            Ok(fresh) => {
                *self.settings.lock().await = fresh.clone();
                fresh
            }
            Err(err) => {
                tracing::warn!(?err, "failed to reload settings; using last known");
                self.settings.lock().await.clone()
            }
        };

        let document = Arc::clone(&*self.document.lock().await);
        let links = match ranking::rank(
            document.as_ref(),
            &self.visits,
            &self.screenshots,
            &settings.blacklist,
            settings.display_limit,
        )
        .await
        {
            Ok(links) => links,
            Err(err) => {
                tracing::warn!(?err, "failed to analyze page");
                return Vec::new();
            }
        };
        tracing::info!(count = links.len(), "eligible links found");

        let mut panel = self.panel.lock().await;
        if links.is_empty() {
            panel.hide();
            return links;
        }
        panel.show(links.clone());

        let preloaded = {
            let mut preload = self.preload.lock().await;
            preload.schedule(&links, usize::from(settings.max_preload_per_page));
            preload.preloaded_urls()
        };
        panel.set_preloaded(preloaded);
        links
    }
}

/// Everything running on behalf of one page. Dropping the session stops its
/// background tasks; [`PageSession::teardown`] also clears the overlay and
/// preload hints.
pub struct PageSession<S, H> {
    page_url: Url,
    shared: Arc<Shared<S, H>>,
    tracker: Arc<ClickTracker>,
    mutations: mpsc::UnboundedSender<()>,
    screenshot_settle: Duration,
    tasks: Vec<JoinHandle<()>>,
}

impl<S, H> PageSession<S, H>
where
    S: OverlaySurface + 'static,
    H: HintSink + 'static,
{
    /// Returns `None` when the page's domain is disabled.
    pub async fn start(
        document: Arc<dyn Document>,
        surface: S,
        sink: H,
        store: Arc<dyn KeyValueStore>,
        navigator: Arc<dyn Navigator>,
        timings: SessionTimings,
    ) -> Option<Self> {
        let page_url = document.page_url().clone();
        let settings = match settings::load(store.as_ref()).await {
            Ok(settings) => settings,
            Err(err) => {
                tracing::warn!(?err, "failed to load settings; using defaults");
                Settings::default()
            }
        };

        let hostname = page_url.host_str().unwrap_or_default();
        if url_utils::is_domain_disabled(hostname, &settings.disabled_domains) {
            tracing::info!(%hostname, "domain disabled, skipping");
            return None;
        }

        let visits = Arc::new(VisitLedger::new(Arc::clone(&store)));
        let screenshots = Arc::new(ScreenshotLedger::new(Arc::clone(&store)));
        let tracker = Arc::new(ClickTracker::new(
            Arc::clone(&visits),
            timings.click_debounce,
        ));

        let (events, event_rx) = ChannelEvents::new();
        let panel = Panel::new(
            surface,
            Arc::new(events),
            Arc::clone(&store),
            timings.transition,
        );

        let shared = Arc::new(Shared {
            store,
            visits,
            screenshots,
            settings: Mutex::new(settings),
            document: Mutex::new(document),
            panel: Mutex::new(panel),
            preload: Mutex::new(PreloadController::new(sink)),
        });

        let (mutations, mutation_rx) = mpsc::unbounded_channel();
        let tasks = vec![
            tracker.spawn_sweeper(timings.sweep_interval),
            tokio::spawn(dispatch_events(Arc::clone(&shared), event_rx, navigator)),
            tokio::spawn(watch_mutations(
                Arc::clone(&shared),
                mutation_rx,
                timings.mutation_debounce,
            )),
        ];

        tracing::debug!(%page_url, "page session started");
        Some(Self {
            page_url,
            shared,
            tracker,
            mutations,
            screenshot_settle: timings.screenshot_settle,
            tasks,
        })
    }

    pub fn page_url(&self) -> &Url {
        &self.page_url
    }

    pub async fn analyze_page(&self) -> Vec<EligibleLink> {
        self.shared.analyze().await
    }

    pub async fn handle_click(&self, event: &ClickEvent) -> Option<CanonicalUrl> {
        let base_url = self.shared.document.lock().await.base_url().clone();
        self.tracker.handle_click(event, &base_url).await
    }

    /// Replaces the snapshot future analyses run against.
    pub async fn set_document(&self, document: Arc<dyn Document>) {
        *self.shared.document.lock().await = document;
    }

    /// Queues a debounced re-analysis when the batch added links.
    pub fn observe_mutations(&self, records: &[MutationRecord]) {
        if !has_link_changes(records) {
            return;
        }
        if self.mutations.send(()).is_err() {
            tracing::debug!("mutation watcher is gone");
        }
    }

    /// Starts the settle-then-capture pipeline for the page itself.
    pub fn on_load(&mut self, capture: Arc<dyn CaptureService>) {
        let pipeline = ScreenshotPipeline::new(
            Arc::clone(&self.shared.screenshots),
            capture,
            self.screenshot_settle,
        );
        let page_url = self.page_url.to_string();
        self.tasks.push(tokio::spawn(async move {
            pipeline.capture_after_load(&page_url).await;
        }));
    }

    pub async fn hover_card(&self, index: usize) {
        self.shared.panel.lock().await.hover(index);
    }

    pub async fn unhover_card(&self, index: usize) {
        self.shared.panel.lock().await.unhover(index);
    }

    pub async fn preview_failed(&self, index: usize) {
        self.shared.panel.lock().await.preview_failed(index);
    }

    /// The panel stays unlocked during the transition so hover and
    /// re-analysis keep running.
    pub async fn click_card(&self, url: &CanonicalUrl) {
        let transition = self.shared.panel.lock().await.begin_click();
        if let Some(transition) = transition {
            tokio::time::sleep(transition).await;
        }
        self.shared.panel.lock().await.finish_click(url);
    }

    pub async fn blacklist_card(&self, url: &CanonicalUrl) -> anyhow::Result<()> {
        self.shared.panel.lock().await.blacklist_link(url).await
    }

    pub async fn panel_state(&self) -> PanelState {
        self.shared.panel.lock().await.state().clone()
    }

    /// Runs `f` against the overlay surface.
    pub async fn with_surface<R>(&self, f: impl FnOnce(&S) -> R) -> R {
        f(self.shared.panel.lock().await.surface())
    }

    pub async fn with_hint_sink<R>(&self, f: impl FnOnce(&H) -> R) -> R {
        f(self.shared.preload.lock().await.sink())
    }

    /// Stops background work, removes the overlay and every preload hint.
    pub async fn teardown(self) {
        for task in &self.tasks {
            task.abort();
        }
        self.shared.panel.lock().await.hide();
        self.shared.preload.lock().await.cleanup();
        tracing::debug!(page_url = %self.page_url, "page session torn down");
    }
}

impl<S, H> Drop for PageSession<S, H> {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

async fn dispatch_events<S, H>(
    shared: Arc<Shared<S, H>>,
    mut events: mpsc::UnboundedReceiver<PanelEvent>,
    navigator: Arc<dyn Navigator>,
) where
    S: OverlaySurface + 'static,
    H: HintSink + 'static,
{
    while let Some(event) = events.recv().await {
        match event {
            PanelEvent::Hovered { url, index } => {
                tracing::trace!(%url, index, "previewing link");
            }
            PanelEvent::Unhovered => tracing::trace!("preview closed"),
            PanelEvent::Clicked { url } => navigator.navigate(&url),
            PanelEvent::Blacklisted { url } => {
                tracing::debug!(%url, "re-analyzing after blacklist");
                shared.analyze().await;
            }
        }
    }
}

/// Trailing-edge debounce: re-analyze once the page has been quiet for
/// `debounce`.
async fn watch_mutations<S, H>(
    shared: Arc<Shared<S, H>>,
    mut signals: mpsc::UnboundedReceiver<()>,
    debounce: Duration,
) where
    S: OverlaySurface + 'static,
    H: HintSink + 'static,
{
    while signals.recv().await.is_some() {
        loop {
            tokio::select! {
                more = signals.recv() => {
                    if more.is_none() {
                        return;
                    }
                }
                _ = tokio::time::sleep(debounce) => break,
            }
        }
        shared.analyze().await;
    }
}
