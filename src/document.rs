use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use url::Url;

/// How an anchor is painted, as far as a static snapshot can tell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Rendered,
    /// An ancestor is not rendered, so the anchor has no box.
    NoBox,
    DisplayNone,
    VisibilityHidden,
    Transparent,
}

/// Snapshot of one `<a href>` element. `index` is its position in document
/// order and stands in for the live element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Anchor {
    pub index: usize,
    pub href: String,
    pub title: Option<String>,
    pub text: String,
    pub visibility: Visibility,
}

impl Anchor {
    pub fn is_rendered(&self) -> bool {
        self.visibility == Visibility::Rendered
    }

    /// Title attribute, then visible text, then the resolved href.
    pub fn display_title(&self, absolute_href: &str) -> String {
        if let Some(title) = self.title.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            return title.to_owned();
        }
        if !self.text.is_empty() {
            return self.text.clone();
        }
        absolute_href.to_owned()
    }
}

pub trait Document: Send + Sync {
    /// Address the document was loaded from. Identifies the page itself.
    fn page_url(&self) -> &Url;
    /// Base for resolving relative hrefs; differs from
    /// [`Document::page_url`] when the page declares `<base href>`.
    fn base_url(&self) -> &Url;
    fn anchors(&self) -> Vec<Anchor>;
}

/// A document parsed from an HTML snapshot.
#[derive(Debug, Clone)]
pub struct HtmlDocument {
    page_url: Url,
    base_url: Url,
    anchors: Vec<Anchor>,
}

impl HtmlDocument {
    pub fn parse(html: &str, page_url: &Url) -> anyhow::Result<Self> {
        let document = Html::parse_document(html);
        let anchor_selector = selector("a[href]")?;
        let base_selector = selector("base[href]")?;

        let base_url = document
            .select(&base_selector)
            .next()
            .and_then(|base| base.value().attr("href"))
            .and_then(|href| page_url.join(href.trim()).ok())
            .unwrap_or_else(|| page_url.clone());

        let anchors = document
            .select(&anchor_selector)
            .enumerate()
            .map(|(index, element)| Anchor {
                index,
                href: element.value().attr("href").unwrap_or_default().to_owned(),
                title: element.value().attr("title").map(str::to_owned),
                text: element
                    .text()
                    .flat_map(str::split_whitespace)
                    .collect::<Vec<_>>()
                    .join(" "),
                visibility: visibility_of(element),
            })
            .collect();

        Ok(Self {
            page_url: page_url.clone(),
            base_url,
            anchors,
        })
    }

    /// A document whose hrefs resolve against its own URL.
    pub fn from_anchors(page_url: Url, anchors: Vec<Anchor>) -> Self {
        Self {
            base_url: page_url.clone(),
            page_url,
            anchors,
        }
    }
}

impl Document for HtmlDocument {
    fn page_url(&self) -> &Url {
        &self.page_url
    }

    fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn anchors(&self) -> Vec<Anchor> {
        self.anchors.clone()
    }
}

fn selector(css: &str) -> anyhow::Result<Selector> {
    Selector::parse(css).map_err(|err| anyhow::anyhow!("parse selector {css:?}: {err}"))
}

#[derive(Debug, Default)]
struct InlineStyle {
    display_none: bool,
    visibility: Option<bool>,
    transparent: bool,
}

impl InlineStyle {
    fn of(element: &scraper::node::Element) -> Self {
        let mut style = Self::default();
        let Some(raw) = element.attr("style") else {
            return style;
        };

        for declaration in raw.split(';') {
            let Some((property, value)) = declaration.split_once(':') else {
                continue;
            };
            let property = property.trim().to_ascii_lowercase();
            let value = value
                .trim()
                .trim_end_matches("!important")
                .trim()
                .to_ascii_lowercase();
            match property.as_str() {
                "display" => style.display_none = value == "none",
                "visibility" => style.visibility = Some(value == "visible"),
                "opacity" => style.transparent = is_zero_opacity(&value),
                _ => {}
            }
        }
        style
    }
}

fn is_zero_opacity(value: &str) -> bool {
    let number = value.strip_suffix('%').unwrap_or(value);
    number.parse::<f32>().is_ok_and(|n| n <= 0.0)
}

fn visibility_of(element: ElementRef<'_>) -> Visibility {
    let own = InlineStyle::of(element.value());

    // Nearest explicit `visibility` wins; it is inherited.
    let mut visible = own.visibility;
    for ancestor in element.ancestors().filter_map(ElementRef::wrap) {
        let value = ancestor.value();
        if matches!(value.name(), "head" | "template" | "noscript")
            || value.attr("hidden").is_some()
        {
            return Visibility::NoBox;
        }
        let style = InlineStyle::of(value);
        if style.display_none {
            return Visibility::NoBox;
        }
        if visible.is_none() {
            visible = style.visibility;
        }
    }

    if own.display_none || element.value().attr("hidden").is_some() {
        return Visibility::DisplayNone;
    }
    if visible == Some(false) {
        return Visibility::VisibilityHidden;
    }
    if own.transparent {
        return Visibility::Transparent;
    }
    Visibility::Rendered
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AddedNode {
    Element { tag: String, contains_anchor: bool },
    Text,
}

/// A `childList` mutation delivered by the host's observer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationRecord {
    pub added_nodes: Vec<AddedNode>,
}

impl MutationRecord {
    pub fn adds_links(&self) -> bool {
        self.added_nodes.iter().any(|node| match node {
            AddedNode::Element {
                tag,
                contains_anchor,
            } => tag.eq_ignore_ascii_case("a") || *contains_anchor,
            AddedNode::Text => false,
        })
    }
}

pub fn has_link_changes(records: &[MutationRecord]) -> bool {
    records.iter().any(MutationRecord::adds_links)
}
