use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::constants::{IGNORED_FILE_EXTENSIONS, IGNORED_URL_SCHEMES, TRACKING_PARAMS};

/// A URL with tracking parameters and fragment stripped.
///
/// This is the identity key shared by the visit ledger, the screenshot
/// ledger, the blacklist and the ranking pass. Strings that fail to parse
/// are carried through verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CanonicalUrl(String);

impl CanonicalUrl {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for CanonicalUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CanonicalUrl {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for CanonicalUrl {
    fn borrow(&self) -> &str {
        &self.0
    }
}

pub fn normalize(url: &str) -> CanonicalUrl {
    let Ok(mut parsed) = Url::parse(url) else {
        return CanonicalUrl(url.to_owned());
    };

    strip_tracking_params(&mut parsed);
    parsed.set_fragment(None);
    CanonicalUrl(parsed.into())
}

fn strip_tracking_params(url: &mut Url) {
    if url.query().is_none() {
        return;
    }

    let kept = url
        .query_pairs()
        .filter(|(key, _)| !TRACKING_PARAMS.contains(&key.as_ref()))
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect::<Vec<_>>();

    if kept.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(kept);
    }
}

/// Resolves `href` against `base`. Unresolvable input comes back unchanged.
pub fn to_absolute_url(href: &str, base: &Url) -> String {
    match base.join(href.trim()) {
        Ok(url) => url.into(),
        Err(_) => href.to_owned(),
    }
}

pub fn has_ignored_scheme(url: &str) -> bool {
    let lower = url.trim_start().to_ascii_lowercase();
    IGNORED_URL_SCHEMES
        .iter()
        .any(|scheme| lower.starts_with(scheme))
}

/// True when `url` is an http(s) page rather than a file, a download or a
/// non-navigational scheme.
pub fn is_eligible_page(url: &str) -> bool {
    let Ok(parsed) = Url::parse(url) else {
        return false;
    };

    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return false;
    }
    if has_ignored_scheme(url) {
        return false;
    }

    let path = parsed.path().to_ascii_lowercase();
    if IGNORED_FILE_EXTENSIONS
        .iter()
        .any(|ext| path.ends_with(ext))
    {
        return false;
    }

    !parsed
        .query_pairs()
        .any(|(key, _)| key.eq_ignore_ascii_case("download"))
}

/// `*.example.com` and `example.com` both match `example.com` itself and any
/// subdomain of it, never a sibling such as `notexample.com`.
pub fn matches_domain_pattern(hostname: &str, pattern: &str) -> bool {
    let hostname = hostname.trim().to_ascii_lowercase();
    let pattern = pattern.trim().to_ascii_lowercase();
    let domain = pattern.strip_prefix("*.").unwrap_or(&pattern);
    if domain.is_empty() || hostname.is_empty() {
        return false;
    }

    hostname == domain
        || hostname
            .strip_suffix(domain)
            .is_some_and(|rest| rest.ends_with('.'))
}

pub fn is_blacklisted(url: &str, blacklist: &[String]) -> bool {
    let Ok(parsed) = Url::parse(url) else {
        return false;
    };
    let hostname = parsed.host_str().unwrap_or_default();

    blacklist.iter().any(|entry| {
        if entry.contains("://") {
            normalize(url) == normalize(entry)
        } else {
            matches_domain_pattern(hostname, entry)
        }
    })
}

pub fn is_domain_disabled(hostname: &str, disabled_domains: &[String]) -> bool {
    disabled_domains
        .iter()
        .any(|pattern| matches_domain_pattern(hostname, pattern))
}

pub fn favicon_url(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let origin = parsed.origin();
    if !origin.is_tuple() {
        return None;
    }
    Some(format!("{}/favicon.ico", origin.ascii_serialization()))
}
