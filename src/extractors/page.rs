use crate::extractors::selectors::trimmed_text;
use crate::urls;
use scraper::{ElementRef, Html, Selector};
use serde::Serialize;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Heading {
    /// 1 through 6
    pub level: u8,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ListKind {
    Ordered,
    Unordered,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListBlock {
    #[serde(rename = "type")]
    pub kind: ListKind,
    pub items: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Link {
    /// Absolute URL resolved against the page
    pub url: String,
    pub text: String,
    /// Origin differs from the page's origin
    pub is_external: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Image {
    pub src: String,
    pub alt: String,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Button {
    pub text: String,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Form {
    pub action: String,
    pub method: String,
}

/// Everything the built-in page profile extracts
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageContent {
    pub title: String,
    pub meta_description: String,
    pub headings: Vec<Heading>,
    pub paragraphs: Vec<String>,
    pub lists: Vec<ListBlock>,
    pub links: Vec<Link>,
    pub images: Vec<Image>,
    pub body_text: String,
}

/// What a script-driven application exposes after rendering
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractiveContent {
    pub title: String,
    /// Address the page ended up at
    pub page_url: String,
    pub content: String,
    pub links: Vec<Link>,
    pub buttons: Vec<Button>,
    pub forms: Vec<Form>,
}

fn selector(css: &'static str) -> Selector {
    Selector::parse(css).expect("static selector should be valid")
}

pub fn page_content(doc: &Html, base: &Url) -> PageContent {
    PageContent {
        title: title(doc),
        meta_description: meta_description(doc),
        headings: headings(doc),
        paragraphs: paragraphs(doc),
        lists: lists(doc),
        links: links(doc, base),
        images: images(doc, base),
        body_text: body_text(doc),
    }
}

pub fn interactive_content(doc: &Html, base: &Url) -> InteractiveContent {
    InteractiveContent {
        title: title(doc),
        page_url: base.to_string(),
        content: body_text(doc),
        links: links(doc, base),
        buttons: buttons(doc),
        forms: forms(doc, base),
    }
}

pub fn title(doc: &Html) -> String {
    doc.select(&selector("title"))
        .next()
        .map(trimmed_text)
        .unwrap_or_default()
}

pub fn meta_description(doc: &Html) -> String {
    doc.select(&selector(r#"meta[name="description"]"#))
        .next()
        .and_then(|el| el.value().attr("content"))
        .unwrap_or_default()
        .to_string()
}

pub fn headings(doc: &Html) -> Vec<Heading> {
    doc.select(&selector("h1, h2, h3, h4, h5, h6"))
        .filter_map(|el| {
            let level = el.value().name().strip_prefix('h')?.parse().ok()?;
            Some(Heading {
                level,
                text: trimmed_text(el),
            })
        })
        .collect()
}

pub fn paragraphs(doc: &Html) -> Vec<String> {
    doc.select(&selector("p"))
        .map(trimmed_text)
        .filter(|text| !text.is_empty())
        .collect()
}

pub fn lists(doc: &Html) -> Vec<ListBlock> {
    let item_selector = selector("li");
    doc.select(&selector("ol, ul"))
        .filter_map(|list| {
            let kind = if list.value().name() == "ol" {
                ListKind::Ordered
            } else {
                ListKind::Unordered
            };
            let items: Vec<String> = list
                .select(&item_selector)
                .map(trimmed_text)
                .filter(|text| !text.is_empty())
                .collect();
            if items.is_empty() {
                None
            } else {
                Some(ListBlock { kind, items })
            }
        })
        .collect()
}

/// Links with resolvable `href`s; malformed ones are skipped
pub fn links(doc: &Html, base: &Url) -> Vec<Link> {
    doc.select(&selector("a[href]"))
        .filter_map(|el| {
            let href = el.value().attr("href")?;
            let resolved = urls::resolve_against(href, base)?;
            let text = trimmed_text(el);
            Some(Link {
                is_external: urls::is_external(&resolved, base),
                url: resolved.to_string(),
                text: if text.is_empty() {
                    "No text".to_string()
                } else {
                    text
                },
            })
        })
        .collect()
}

pub fn images(doc: &Html, base: &Url) -> Vec<Image> {
    doc.select(&selector("img[src]"))
        .filter_map(|el| {
            let src = urls::resolve_against(el.value().attr("src")?, base)?;
            Some(Image {
                src: src.to_string(),
                alt: attr_or_empty(el, "alt"),
                title: attr_or_empty(el, "title"),
            })
        })
        .collect()
}

pub fn buttons(doc: &Html) -> Vec<Button> {
    doc.select(&selector("button"))
        .map(|el| Button {
            text: trimmed_text(el),
            kind: el
                .value()
                .attr("type")
                .map(str::to_ascii_lowercase)
                .unwrap_or_else(|| "submit".to_string()),
        })
        .collect()
}

/// Forms with their effective action and method, as a browser would submit them
pub fn forms(doc: &Html, base: &Url) -> Vec<Form> {
    doc.select(&selector("form"))
        .map(|el| {
            let action = el
                .value()
                .attr("action")
                .filter(|a| !a.trim().is_empty())
                .and_then(|a| urls::resolve_against(a, base))
                .unwrap_or_else(|| base.clone());
            let method = match el.value().attr("method").map(str::to_ascii_lowercase) {
                Some(m) if m == "post" || m == "dialog" => m,
                _ => "get".to_string(),
            };
            Form {
                action: action.to_string(),
                method,
            }
        })
        .collect()
}

/// All text under `<body>` with whitespace collapsed
pub fn body_text(doc: &Html) -> String {
    doc.select(&selector("body"))
        .flat_map(|n| n.text())
        .collect::<Vec<_>>()
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn attr_or_empty(el: ElementRef<'_>, name: &str) -> String {
    el.value().attr(name).unwrap_or_default().to_string()
}
