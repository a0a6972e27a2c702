use std::collections::{BTreeMap, HashSet};

use anyhow::Context as _;
use url::Url;

use crate::ranking::EligibleLink;
use crate::url_utils::CanonicalUrl;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HintElement {
    /// `<script type="speculationrules">` carrying a JSON rule set.
    SpeculationRules { json: String },
    /// `<link rel="prefetch" as="document">`.
    Prefetch { href: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HintId(u64);

/// Where hint elements are attached, normally the document head.
pub trait HintSink: Send {
    fn supports_speculation_rules(&self) -> bool;
    fn insert(&mut self, hint: HintElement) -> anyhow::Result<HintId>;
    fn remove(&mut self, id: HintId);
}

/// One inserted hint and the URLs it covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedHint {
    pub id: HintId,
    pub urls: Vec<CanonicalUrl>,
}

pub trait PreloadStrategy: Send + Sync {
    fn name(&self) -> &'static str;
    fn issue(
        &self,
        sink: &mut dyn HintSink,
        urls: &[CanonicalUrl],
    ) -> anyhow::Result<Vec<IssuedHint>>;
}

/// One prerender rule covering every URL.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpeculationRulesStrategy;

impl PreloadStrategy for SpeculationRulesStrategy {
    fn name(&self) -> &'static str {
        "speculation-rules"
    }

    fn issue(
        &self,
        sink: &mut dyn HintSink,
        urls: &[CanonicalUrl],
    ) -> anyhow::Result<Vec<IssuedHint>> {
        let rules = serde_json::json!({
            "prerender": [{ "urls": urls }],
        });
        let json = serde_json::to_string(&rules).context("serialize speculation rules")?;
        let id = sink
            .insert(HintElement::SpeculationRules { json })
            .context("insert speculation rules")?;
        Ok(vec![IssuedHint {
            id,
            urls: urls.to_vec(),
        }])
    }
}

/// One prefetch link per URL. A URL whose link cannot be built is logged
/// and skipped.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrefetchStrategy;

impl PreloadStrategy for PrefetchStrategy {
    fn name(&self) -> &'static str {
        "prefetch"
    }

    fn issue(
        &self,
        sink: &mut dyn HintSink,
        urls: &[CanonicalUrl],
    ) -> anyhow::Result<Vec<IssuedHint>> {
        let mut issued = Vec::with_capacity(urls.len());
        for url in urls {
            let hint = HintElement::Prefetch {
                href: url.to_string(),
            };
            match sink.insert(hint) {
                Ok(id) => issued.push(IssuedHint {
                    id,
                    urls: vec![url.clone()],
                }),
                Err(err) => tracing::warn!(%url, ?err, "failed to add prefetch hint"),
            }
        }
        Ok(issued)
    }
}

static SPECULATION_RULES: SpeculationRulesStrategy = SpeculationRulesStrategy;
static PREFETCH: PrefetchStrategy = PrefetchStrategy;

pub fn select_strategy(sink: &dyn HintSink) -> &'static dyn PreloadStrategy {
    if sink.supports_speculation_rules() {
        &SPECULATION_RULES
    } else {
        &PREFETCH
    }
}

/// Warms up the top ranked links, at most once per URL until
/// [`PreloadController::cleanup`].
pub struct PreloadController<H> {
    sink: H,
    scheduled: HashSet<CanonicalUrl>,
    issued: Vec<HintId>,
}

impl<H: HintSink> PreloadController<H> {
    pub fn new(sink: H) -> Self {
        Self {
            sink,
            scheduled: HashSet::new(),
            issued: Vec::new(),
        }
    }

    pub fn sink(&self) -> &H {
        &self.sink
    }

    /// Issues hints for the first `max_count` links not scheduled before.
    /// Returns the URLs newly scheduled by this call.
    pub fn schedule(&mut self, links: &[EligibleLink], max_count: usize) -> Vec<CanonicalUrl> {
        let mut fresh: Vec<CanonicalUrl> = Vec::new();
        for link in links.iter().take(max_count) {
            if !self.scheduled.contains(&link.url) && !fresh.contains(&link.url) {
                fresh.push(link.url.clone());
            }
        }
        if fresh.is_empty() {
            return fresh;
        }

        let strategy = select_strategy(&self.sink);
        let issued = match strategy.issue(&mut self.sink, &fresh) {
            Ok(issued) => issued,
            Err(err) => {
                tracing::warn!(
                    strategy = strategy.name(),
                    ?err,
                    "preload batch failed; falling back to prefetch"
                );
                match PREFETCH.issue(&mut self.sink, &fresh) {
                    Ok(issued) => issued,
                    Err(err) => {
                        tracing::warn!(?err, "prefetch fallback failed");
                        Vec::new()
                    }
                }
            }
        };

        let mut scheduled = Vec::new();
        for hint in issued {
            self.issued.push(hint.id);
            for url in hint.urls {
                if self.scheduled.insert(url.clone()) {
                    scheduled.push(url);
                }
            }
        }
        tracing::debug!(
            strategy = strategy.name(),
            count = scheduled.len(),
            "preloads scheduled"
        );
        scheduled
    }

    pub fn is_preloaded(&self, url: &CanonicalUrl) -> bool {
        self.scheduled.contains(url)
    }

    pub fn preloaded_urls(&self) -> HashSet<CanonicalUrl> {
        self.scheduled.clone()
    }

    /// Removes every hint element and forgets what was scheduled.
    pub fn cleanup(&mut self) {
        for id in self.issued.drain(..) {
            self.sink.remove(id);
        }
        self.scheduled.clear();
    }
}

/// In-memory document head.
#[derive(Debug, Default)]
pub struct MarkupHead {
    speculation_rules: bool,
    next_id: u64,
    elements: BTreeMap<HintId, HintElement>,
}

impl MarkupHead {
    pub fn new(speculation_rules: bool) -> Self {
        Self {
            speculation_rules,
            ..Self::default()
        }
    }

    pub fn elements(&self) -> impl Iterator<Item = &HintElement> {
        self.elements.values()
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn to_html(&self) -> String {
        self.elements
            .values()
            .map(|element| match element {
                HintElement::SpeculationRules { json } => {
                    format!("<script type=\"speculationrules\">{json}</script>")
                }
                HintElement::Prefetch { href } => format!(
                    "<link rel=\"prefetch\" href=\"{}\" as=\"document\">",
                    href.replace('&', "&amp;").replace('"', "&quot;")
                ),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl HintSink for MarkupHead {
    fn supports_speculation_rules(&self) -> bool {
        self.speculation_rules
    }

    fn insert(&mut self, hint: HintElement) -> anyhow::Result<HintId> {
        match &hint {
            HintElement::SpeculationRules { json } => {
                if !self.speculation_rules {
                    anyhow::bail!("speculation rules are not supported");
                }
                serde_json::from_str::<serde_json::Value>(json)
                    .context("parse speculation rules")?;
            }
            HintElement::Prefetch { href } => {
                Url::parse(href).with_context(|| format!("invalid prefetch href {href:?}"))?;
            }
        }
        let id = HintId(self.next_id);
        self.next_id += 1;
        self.elements.insert(id, hint);
        Ok(id)
    }

    fn remove(&mut self, id: HintId) {
        self.elements.remove(&id);
    }
}
