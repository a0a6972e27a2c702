//! Command-line host: drives page sessions against HTML snapshots and a
//! directory-backed store.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use serde::Serialize;
use url::Url;

use crate::cli::{AnalyzeArgs, PruneArgs, ScreenshotArgs, SettingsCommand, VisitArgs};
use crate::document::HtmlDocument;
use crate::panel::MarkupSurface;
use crate::preload::MarkupHead;
use crate::ranking::EligibleLink;
use crate::screenshot::{FileCapture, ScreenshotLedger, ScreenshotPipeline};
use crate::session::{Navigator, PageSession, SessionTimings};
use crate::settings::{self, Settings};
use crate::storage::{KeyValueStore, LocalFsStore};
use crate::tracker::ClickEvent;
use crate::url_utils::CanonicalUrl;
use crate::visits::VisitLedger;

/// Navigation has nowhere to go from a terminal; requests are logged.
struct LoggingNavigator;

impl Navigator for LoggingNavigator {
    fn navigate(&self, url: &CanonicalUrl) {
        tracing::info!(%url, "navigation requested");
    }
}

#[derive(Debug, Serialize)]
pub struct AnalyzeReport {
    pub page_url: String,
    pub disabled: bool,
    pub links: Vec<EligibleLink>,
    pub preloaded: Vec<CanonicalUrl>,
    pub overlay_html: String,
    pub head_html: String,
}

fn open_store(store_dir: &Path) -> Arc<dyn KeyValueStore> {
    Arc::new(LocalFsStore::new(store_dir))
}

fn parse_page_url(raw: &str) -> anyhow::Result<Url> {
    let url = Url::parse(raw).context("parse --page-url")?;
    if url.scheme() != "http" && url.scheme() != "https" {
        anyhow::bail!("--page-url must be http/https: {url}");
    }
    Ok(url)
}

pub async fn analyze(store_dir: &Path, args: AnalyzeArgs) -> anyhow::Result<()> {
    let page_url = parse_page_url(&args.page_url)?;
    let html = tokio::fs::read_to_string(&args.html)
        .await
        .with_context(|| format!("read html snapshot: {}", args.html))?;
    let document = HtmlDocument::parse(&html, &page_url).context("parse html snapshot")?;

    let session = PageSession::start(
        Arc::new(document),
        MarkupSurface::new(),
        MarkupHead::new(args.speculation_rules),
        open_store(store_dir),
        Arc::new(LoggingNavigator),
        SessionTimings::default(),
    )
    .await;

    let report = match session {
        None => AnalyzeReport {
            page_url: page_url.to_string(),
            disabled: true,
            links: Vec::new(),
            preloaded: Vec::new(),
            overlay_html: String::new(),
            head_html: String::new(),
        },
        Some(session) => {
            let links = session.analyze_page().await;
            let mut preloaded: Vec<CanonicalUrl> =
                session.panel_state().await.preloaded_urls.into_iter().collect();
            preloaded.sort();
            let overlay_html = session
                .with_surface(|surface| {
                    let overlay = surface.to_html();
                    if overlay.is_empty() {
                        overlay
                    } else {
                        format!("{}{overlay}", surface.styles_html())
                    }
                })
                .await;
            let head_html = session.with_hint_sink(MarkupHead::to_html).await;
            session.teardown().await;

            AnalyzeReport {
                page_url: page_url.to_string(),
                disabled: false,
                links,
                preloaded,
                overlay_html,
                head_html,
            }
        }
    };

    let json = serde_json::to_string_pretty(&report).context("serialize analyze report")?;
    println!("{json}");
    Ok(())
}

pub async fn visit(store_dir: &Path, args: VisitArgs) -> anyhow::Result<()> {
    let page_url = parse_page_url(&args.page_url)?;
    let document = HtmlDocument::from_anchors(page_url, Vec::new());

    let session = PageSession::start(
        Arc::new(document),
        MarkupSurface::new(),
        MarkupHead::new(false),
        open_store(store_dir),
        Arc::new(LoggingNavigator),
        SessionTimings::default(),
    )
    .await;
    let Some(session) = session else {
        println!("skipped");
        return Ok(());
    };

    let tracked = session.handle_click(&ClickEvent::on_anchor(args.href)).await;
    session.teardown().await;
    match tracked {
        Some(url) => println!("{url}"),
        None => println!("skipped"),
    }
    Ok(())
}

pub async fn screenshot(store_dir: &Path, args: ScreenshotArgs) -> anyhow::Result<()> {
    let ledger = Arc::new(ScreenshotLedger::new(open_store(store_dir)));
    let pipeline = ScreenshotPipeline::new(
        ledger,
        Arc::new(FileCapture::new(&args.image)),
        Duration::from_millis(args.settle_ms),
    );

    let url = pipeline
        .capture_after_load(&args.url)
        .await
        .ok_or_else(|| anyhow::anyhow!("screenshot not captured for {}", args.url))?;
    println!("{url}");
    Ok(())
}

pub async fn prune(store_dir: &Path, args: PruneArgs) -> anyhow::Result<()> {
    let store = open_store(store_dir);
    let max_age = Duration::from_secs(args.max_age_days.saturating_mul(24 * 60 * 60));

    let visits = VisitLedger::new(Arc::clone(&store))
        .prune(max_age)
        .await
        .context("prune visits")?;
    let screenshots = ScreenshotLedger::new(store)
        .prune(max_age)
        .await
        .context("prune screenshots")?;

    tracing::info!(visits, screenshots, "pruned");
    println!("pruned {visits} visits, {screenshots} screenshots");
    Ok(())
}

pub async fn settings(store_dir: &Path, command: SettingsCommand) -> anyhow::Result<()> {
    let store = open_store(store_dir);
    let store = store.as_ref();

    let updated: Settings = match command {
        SettingsCommand::Show => settings::load(store).await?,
        SettingsCommand::Reset => settings::reset(store).await?,
        SettingsCommand::BlacklistAdd(args) => settings::add_to_blacklist(store, &args.entry).await?,
        SettingsCommand::BlacklistRemove(args) => {
            settings::remove_from_blacklist(store, &args.entry).await?
        }
        SettingsCommand::DisableDomain(args) => {
            settings::add_disabled_domain(store, &args.entry).await?
        }
        SettingsCommand::EnableDomain(args) => {
            settings::remove_disabled_domain(store, &args.entry).await?
        }
        SettingsCommand::MaxPreload(args) => settings::set_max_preload(store, args.value).await?,
    };

    let json = serde_json::to_string_pretty(&updated).context("serialize settings")?;
    println!("{json}");
    Ok(())
}
