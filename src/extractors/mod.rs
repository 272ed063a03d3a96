pub mod page;
pub mod selectors;


use crate::error::ScrapeError;
use crate::options::{FetchMode, FetchOptions, WaitUntil};
use page::{Image, InteractiveContent, Link, PageContent};
use scraper::Html;
use selectors::SelectorMap;
use serde::Serialize;
use serde_json::{Map, Value};
use url::Url;

/// What to pull out of a fetched document
#[derive(Debug, Clone, Default, PartialEq)]
pub enum ExtractionProfile {
    /// Title, description, headings, paragraphs, lists, links, images and body text
    #[default]
    Page,
    /// Links only
    Links,
    /// Images only
    Images,
    /// Links, buttons and forms of a script-driven application
    Interactive,
    /// Caller-supplied selector map
    Selectors(SelectorMap),
}

impl ExtractionProfile {
    /// Adjust fetch options to what this profile needs.
    ///
    /// Rendering an interactive application waits for the network to go idle
    /// and gives the client-side code time to settle.
    pub fn tune(&self, options: &FetchOptions) -> FetchOptions {
        let mut options = options.clone();
        if matches!(self, ExtractionProfile::Interactive) && options.mode == FetchMode::Rendered {
            options.wait_until.get_or_insert(WaitUntil::NetworkIdle);
            options.wait_time_ms.get_or_insert(3_000);
            options.selector_timeout_ms.get_or_insert(15_000);
        }
        options
    }
}

/// Extracted fields, keyed per profile
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Extracted {
    Page(PageContent),
    Links { links: Vec<Link> },
    Images { images: Vec<Image> },
    Interactive(InteractiveContent),
    /// Nested under `data` so caller keys never collide with result fields
    Selected { data: Map<String, Value> },
}

/// Apply `profile` to a fetched document.
///
/// Missing elements come back as empty or null values. Only an empty
/// document is an error.
pub fn extract(
    html: &str,
    base: &Url,
    profile: &ExtractionProfile,
) -> Result<Extracted, ScrapeError> {
    if html.trim().is_empty() {
        return Err(ScrapeError::Extraction(format!(
            "no document returned for {}",
            base
        )));
    }

    let doc = Html::parse_document(html);
    let extracted = match profile {
        ExtractionProfile::Page => Extracted::Page(page::page_content(&doc, base)),
        ExtractionProfile::Links => Extracted::Links {
            links: page::links(&doc, base),
        },
        ExtractionProfile::Images => Extracted::Images {
            images: page::images(&doc, base),
        },
        ExtractionProfile::Interactive => {
            Extracted::Interactive(page::interactive_content(&doc, base))
        }
        ExtractionProfile::Selectors(map) => Extracted::Selected {
            data: selectors::extract(&doc, map),
        },
    };
    Ok(extracted)
}
