use std::collections::{BTreeMap, HashSet};

use serde::Serialize;
use url::Url;

use crate::panel::styles::{CONTAINER_ID, PANEL_ID};
use crate::ranking::EligibleLink;
use crate::screenshot::{Gradient, gradient_for};
use crate::url_utils::CanonicalUrl;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CardBackground {
    Screenshot { data_url: String },
    Gradient(Gradient),
}

impl CardBackground {
    pub fn to_css(&self) -> String {
        match self {
            Self::Screenshot { data_url } => format!("background-image: url('{data_url}')"),
            Self::Gradient(gradient) => format!("background: {}", gradient.to_css()),
        }
    }
}

/// Render model of one interactive card, addressed by `index` and `url`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Card {
    pub index: usize,
    pub url: CanonicalUrl,
    pub title: String,
    pub visit_count: u64,
    pub favicon: Option<String>,
    pub background: CardBackground,
    pub preloaded: bool,
}

impl Card {
    pub fn from_link(index: usize, link: &EligibleLink, preloaded: bool) -> Self {
        let background = match &link.screenshot {
            Some(data_url) => CardBackground::Screenshot {
                data_url: data_url.clone(),
            },
            None => CardBackground::Gradient(gradient_for(link.url.as_str())),
        };
        Self {
            index,
            url: link.url.clone(),
            title: link.title.clone(),
            visit_count: link.visit_count,
            favicon: link.favicon.clone(),
            background,
            preloaded,
        }
    }
}

/// The on-page overlay. Implementations must tolerate calls in any order:
/// rendering or previewing without a container is a no-op or an error,
/// never a panic.
pub trait OverlaySurface: Send {
    fn has_style(&self, id: &str) -> bool;
    fn inject_style(&mut self, id: &str, css: &str);
    fn has_container(&self) -> bool;
    fn mount_container(&mut self);
    /// Replaces everything inside the container.
    fn render_cards(&mut self, cards: &[Card]);
    fn remove_container(&mut self);
    /// Creates the embedded frame for card `index`. Fails when the frame
    /// cannot be embedded.
    fn mount_preview(&mut self, index: usize, url: &CanonicalUrl) -> anyhow::Result<()>;
    /// Shows preview `index` and dims its card; `None` hides all previews.
    fn show_preview(&mut self, index: Option<usize>);
    fn show_preview_fallback(&mut self, index: usize, url: &CanonicalUrl);
    /// Returns false when there is no container to carry the class.
    fn add_container_class(&mut self, class: &str) -> bool;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreviewNode {
    Frame { url: CanonicalUrl },
    Fallback { url: CanonicalUrl },
}

#[derive(Debug, Default)]
struct ContainerNode {
    classes: Vec<String>,
    cards: Vec<Card>,
    previews: BTreeMap<usize, PreviewNode>,
    active_preview: Option<usize>,
}

/// In-memory overlay that can be serialized to HTML.
#[derive(Debug, Default)]
pub struct MarkupSurface {
    styles: BTreeMap<String, String>,
    style_injections: usize,
    container: Option<ContainerNode>,
    frame_blocked_hosts: HashSet<String>,
}

impl MarkupSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Frames for these hosts fail to mount, as cross-origin framing rules
    /// would make them.
    pub fn with_frame_blocked_hosts<I, S>(mut self, hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.frame_blocked_hosts = hosts.into_iter().map(Into::into).collect();
        self
    }

    pub fn style_injections(&self) -> usize {
        self.style_injections
    }

    pub fn cards(&self) -> &[Card] {
        self.container
            .as_ref()
            .map(|container| container.cards.as_slice())
            .unwrap_or_default()
    }

    pub fn preview(&self, index: usize) -> Option<&PreviewNode> {
        self.container.as_ref()?.previews.get(&index)
    }

    pub fn active_preview(&self) -> Option<usize> {
        self.container.as_ref()?.active_preview
    }

    pub fn container_classes(&self) -> &[String] {
        self.container
            .as_ref()
            .map(|container| container.classes.as_slice())
            .unwrap_or_default()
    }

    pub fn styles_html(&self) -> String {
        self.styles
            .iter()
            .map(|(id, css)| format!("<style id=\"{}\">{css}</style>", escape(id)))
            .collect()
    }

    pub fn to_html(&self) -> String {
        let Some(container) = &self.container else {
            return String::new();
        };

        let mut out = String::new();
        let class = container.classes.join(" ");
        if class.is_empty() {
            out.push_str(&format!("<div id=\"{CONTAINER_ID}\">"));
        } else {
            out.push_str(&format!("<div id=\"{CONTAINER_ID}\" class=\"{}\">", escape(&class)));
        }
        out.push_str(&format!("<div id=\"{PANEL_ID}\">"));

        out.push_str("<div class=\"linkpeek-cards\">");
        for card in &container.cards {
            let active = container.active_preview == Some(card.index);
            render_card(&mut out, card, active);
        }
        out.push_str("</div>");

        out.push_str("<div class=\"linkpeek-previews\">");
        for (index, preview) in &container.previews {
            let display = if container.active_preview == Some(*index) {
                "block"
            } else {
                "none"
            };
            render_preview(&mut out, *index, preview, display);
        }
        out.push_str("</div>");

        out.push_str("</div></div>");
        out
    }
}

impl OverlaySurface for MarkupSurface {
    fn has_style(&self, id: &str) -> bool {
        self.styles.contains_key(id)
    }

    fn inject_style(&mut self, id: &str, css: &str) {
        self.styles.insert(id.to_owned(), css.to_owned());
        self.style_injections += 1;
    }

    fn has_container(&self) -> bool {
        self.container.is_some()
    }

    fn mount_container(&mut self) {
        if self.container.is_none() {
            self.container = Some(ContainerNode::default());
        }
    }

    fn render_cards(&mut self, cards: &[Card]) {
        let Some(container) = self.container.as_mut() else {
            return;
        };
        container.cards = cards.to_vec();
        container.previews.clear();
        container.active_preview = None;
    }

    fn remove_container(&mut self) {
        self.container = None;
    }

    fn mount_preview(&mut self, index: usize, url: &CanonicalUrl) -> anyhow::Result<()> {
        let host = Url::parse(url.as_str())
            .ok()
            .and_then(|parsed| parsed.host_str().map(str::to_owned))
            .unwrap_or_default();
        let container = self
            .container
            .as_mut()
            .ok_or_else(|| anyhow::anyhow!("overlay container is not mounted"))?;
        if self.frame_blocked_hosts.contains(&host) {
            anyhow::bail!("{host} refuses to be framed");
        }
        container
            .previews
            .insert(index, PreviewNode::Frame { url: url.clone() });
        Ok(())
    }

    fn show_preview(&mut self, index: Option<usize>) {
        if let Some(container) = self.container.as_mut() {
            container.active_preview = index;
        }
    }

    fn show_preview_fallback(&mut self, index: usize, url: &CanonicalUrl) {
        if let Some(container) = self.container.as_mut() {
            container
                .previews
                .insert(index, PreviewNode::Fallback { url: url.clone() });
        }
    }

    fn add_container_class(&mut self, class: &str) -> bool {
        let Some(container) = self.container.as_mut() else {
            return false;
        };
        if !container.classes.iter().any(|existing| existing == class) {
            container.classes.push(class.to_owned());
        }
        true
    }
}

fn render_card(out: &mut String, card: &Card, active: bool) {
    let class = if active {
        "linkpeek-card linkpeek-card-active"
    } else {
        "linkpeek-card"
    };
    out.push_str(&format!(
        "<div class=\"{class}\" data-index=\"{}\" data-url=\"{}\" data-preloaded=\"{}\" style=\"{}\">",
        card.index,
        escape(card.url.as_str()),
        card.preloaded,
        escape(&card.background.to_css()),
    ));
    if let Some(favicon) = &card.favicon {
        out.push_str(&format!(
            "<img class=\"linkpeek-favicon\" src=\"{}\" alt=\"\">",
            escape(favicon)
        ));
    }
    out.push_str(&format!(
        "<div class=\"linkpeek-title\" title=\"{0}\">{0}</div>",
        escape(&card.title)
    ));
    let plural = if card.visit_count > 1 { "s" } else { "" };
    out.push_str(&format!(
        "<div class=\"linkpeek-visit-badge\" title=\"{0} visit{plural}\">{0}</div>",
        card.visit_count
    ));
    out.push_str(
        "<button class=\"linkpeek-blacklist-btn\" title=\"Stop previewing this link\">&times;</button>",
    );
    out.push_str("</div>");
}

fn render_preview(out: &mut String, index: usize, preview: &PreviewNode, display: &str) {
    match preview {
        PreviewNode::Frame { url } => out.push_str(&format!(
            "<div class=\"linkpeek-preview\" data-index=\"{index}\" data-url=\"{0}\" style=\"display: {display}\">\
             <iframe src=\"{0}\" sandbox=\"allow-same-origin allow-scripts allow-popups allow-forms\"></iframe>\
             </div>",
            escape(url.as_str())
        )),
        PreviewNode::Fallback { url } => out.push_str(&format!(
            "<div class=\"linkpeek-preview\" data-index=\"{index}\" data-url=\"{0}\" style=\"display: {display}\">\
             <div class=\"linkpeek-preview-fallback\"><div>Preview unavailable</div>\
             <button class=\"linkpeek-open-btn\" data-url=\"{0}\">Open link</button></div>\
             </div>",
            escape(url.as_str())
        )),
    }
}

fn escape(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use chrono::DateTime;

    use super::*;
    use crate::url_utils::normalize;

    fn link(url: &str, screenshot: Option<&str>) -> EligibleLink {
        EligibleLink {
            url: normalize(url),
            anchor_index: 0,
            visit_count: 2,
            last_visited_at: DateTime::from_timestamp_millis(0).unwrap(),
            title: "Docs <intro>".into(),
            favicon: Some("https://a.test/favicon.ico".into()),
            screenshot: screenshot.map(str::to_owned),
        }
    }

    #[test]
    fn card_background_prefers_screenshot() {
        let with_shot = Card::from_link(0, &link("https://a.test/", Some("data:image/png;base64,AA==")), false);
        assert_eq!(
            with_shot.background,
            CardBackground::Screenshot {
                data_url: "data:image/png;base64,AA==".into()
            }
        );

        let without = Card::from_link(1, &link("https://a.test/", None), true);
        assert_eq!(
            without.background,
            CardBackground::Gradient(gradient_for("https://a.test/"))
        );
    }

    #[test]
    fn rendering_without_container_is_a_no_op() {
        let mut surface = MarkupSurface::new();
        surface.render_cards(&[Card::from_link(0, &link("https://a.test/", None), false)]);
        surface.show_preview(Some(0));
        assert!(surface.cards().is_empty());
        assert!(!surface.add_container_class("x"));
        assert!(surface.mount_preview(0, &normalize("https://a.test/")).is_err());
        assert_eq!(surface.to_html(), "");
    }

    #[test]
    fn html_escapes_titles_and_marks_cards() {
        let mut surface = MarkupSurface::new();
        surface.mount_container();
        surface.render_cards(&[Card::from_link(0, &link("https://a.test/", None), true)]);
        let html = surface.to_html();
        assert!(html.contains("Docs &lt;intro&gt;"));
        assert!(html.contains("data-index=\"0\""));
        assert!(html.contains("data-url=\"https://a.test/\""));
        assert!(html.contains("data-preloaded=\"true\""));
        assert!(html.contains("2 visits"));
    }

    #[test]
    fn blocked_hosts_fail_to_mount() {
        let mut surface = MarkupSurface::new().with_frame_blocked_hosts(["bank.test"]);
        surface.mount_container();
        assert!(surface.mount_preview(0, &normalize("https://bank.test/")).is_err());
        assert!(surface.mount_preview(1, &normalize("https://a.test/")).is_ok());
    }
}
