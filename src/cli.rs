use clap::{Args, Parser, Subcommand};

use crate::constants::{MAX_PRELOAD, MIN_PRELOAD};

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    /// Store directory (default: `$LINKPEEK_STORE`, then `.linkpeek`).
    #[arg(long, global = true)]
    pub store: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Rank a page snapshot and print the panel and preload report as JSON.
    Analyze(AnalyzeArgs),
    /// Record a click on a link of a page.
    Visit(VisitArgs),
    /// Capture an image for a page and store it as its screenshot.
    Screenshot(ScreenshotArgs),
    /// Drop visits and screenshots older than the given age.
    Prune(PruneArgs),
    Settings {
        #[command(subcommand)]
        command: SettingsCommand,
    },
}

#[derive(Debug, Args)]
pub struct AnalyzeArgs {
    /// URL the snapshot was taken from.
    #[arg(long)]
    pub page_url: String,

    /// Path to the HTML snapshot.
    #[arg(long)]
    pub html: String,

    /// Treat the page as supporting speculation rules.
    #[arg(long)]
    pub speculation_rules: bool,
}

#[derive(Debug, Args)]
pub struct VisitArgs {
    /// URL of the page the click happened on.
    #[arg(long)]
    pub page_url: String,

    /// href of the clicked anchor, as written in the page.
    #[arg(long)]
    pub href: String,
}

#[derive(Debug, Args)]
pub struct ScreenshotArgs {
    /// Page the image belongs to.
    #[arg(long)]
    pub url: String,

    /// Image file (jpg, png, webp or gif).
    #[arg(long)]
    pub image: String,

    /// Delay before capturing.
    #[arg(long, default_value_t = 1000)]
    pub settle_ms: u64,
}

#[derive(Debug, Args)]
pub struct PruneArgs {
    #[arg(long, default_value_t = 90)]
    pub max_age_days: u64,
}

#[derive(Debug, Subcommand)]
pub enum SettingsCommand {
    Show,
    /// Restore default settings.
    Reset,
    /// Stop previewing a URL (`https://...`) or a domain pattern (`*.example.com`).
    BlacklistAdd(EntryArgs),
    BlacklistRemove(EntryArgs),
    /// Disable the panel on a domain pattern.
    DisableDomain(EntryArgs),
    EnableDomain(EntryArgs),
    /// Number of links to preload per page.
    MaxPreload(MaxPreloadArgs),
}

#[derive(Debug, Args)]
pub struct EntryArgs {
    pub entry: String,
}

#[derive(Debug, Args)]
pub struct MaxPreloadArgs {
    #[arg(value_parser = clap::value_parser!(u8).range(i64::from(MIN_PRELOAD)..=i64::from(MAX_PRELOAD)))]
    pub value: u8,
}
