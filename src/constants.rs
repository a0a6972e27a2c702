use std::time::Duration;

/// Domains with endless feeds where a "most visited" panel is noise.
pub const DEFAULT_DISABLED_DOMAINS: &[&str] = &[
    "youtube.com",
    "www.youtube.com",
    "m.youtube.com",
    "soundcloud.com",
    "www.soundcloud.com",
    "facebook.com",
    "www.facebook.com",
    "m.facebook.com",
    "tiktok.com",
    "www.tiktok.com",
    "instagram.com",
    "www.instagram.com",
    "leboncoin.fr",
    "www.leboncoin.fr",
    "twitter.com",
    "x.com",
    "www.twitter.com",
    "reddit.com",
    "www.reddit.com",
    "linkedin.com",
    "www.linkedin.com",
];

/// Path suffixes that point at files rather than pages.
pub const IGNORED_FILE_EXTENSIONS: &[&str] = &[
    // documents
    ".pdf", ".doc", ".docx", ".xls", ".xlsx", ".ppt", ".pptx", ".odt", ".ods", ".odp",
    // archives
    ".zip", ".rar", ".7z", ".tar", ".gz", ".bz2", ".xz",
    // executables
    ".exe", ".dmg", ".pkg", ".deb", ".rpm", ".msi", ".apk",
    // images
    ".jpg", ".jpeg", ".png", ".gif", ".bmp", ".svg", ".webp", ".ico", ".tiff", ".tif",
    // video
    ".mp4", ".avi", ".mkv", ".mov", ".wmv", ".flv", ".webm", ".m4v", ".mpg", ".mpeg",
    // audio
    ".mp3", ".wav", ".ogg", ".flac", ".aac", ".wma", ".m4a", ".opus",
    // disk images and the rest
    ".torrent", ".iso",
];

pub const IGNORED_URL_SCHEMES: &[&str] = &[
    "mailto:",
    "tel:",
    "sms:",
    "magnet:",
    "javascript:",
    "data:",
    "blob:",
    "about:",
    "chrome:",
    "chrome-extension:",
    "moz-extension:",
];

pub const TRACKING_PARAMS: &[&str] = &[
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_term",
    "utm_content",
    "fbclid",
    "gclid",
    "ref",
    "source",
];

pub const DEFAULT_DISPLAY_LIMIT: usize = 5;
pub const MAX_DISPLAY_LIMIT: usize = 20;

pub const DEFAULT_MAX_PRELOAD: u8 = 3;
pub const MIN_PRELOAD: u8 = 1;
pub const MAX_PRELOAD: u8 = 10;

pub const CLICK_DEBOUNCE: Duration = Duration::from_millis(1000);
pub const CLICK_SWEEP_INTERVAL: Duration = Duration::from_millis(5000);
pub const MUTATION_DEBOUNCE: Duration = Duration::from_millis(500);
pub const SCREENSHOT_SETTLE_DELAY: Duration = Duration::from_millis(1000);
pub const NAVIGATION_TRANSITION: Duration = Duration::from_millis(400);

pub const DEFAULT_VISIT_MAX_AGE: Duration = Duration::from_secs(90 * 24 * 60 * 60);
