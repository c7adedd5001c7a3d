//! Cell, anchor and header/value extraction from listing and detail HTML.
//!
//! Everything here is synchronous: `scraper::Html` is not `Send`, so callers
//! parse, extract owned strings and drop the document before the next await.

use scraper::{ElementRef, Html, Selector};
use url::Url;

use super::fetcher::{DetailCells, FetchError};

const LISTING_CELLS: &str = "tbody td";
const LISTING_ANCHORS: &str = "tbody a";
const DETAIL_HEADERS: &str = "body th";
const DETAIL_VALUES: &str = "body td";

fn selector(css: &str) -> Result<Selector, FetchError> {
    Selector::parse(css).map_err(|e| FetchError::Unsupported(format!("bad selector {}: {}", css, e)))
}

fn element_text(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}

fn texts(document: &Html, css: &str) -> Result<Vec<String>, FetchError> {
    let sel = selector(css)?;
    Ok(document.select(&sel).map(element_text).collect())
}

/// Text of every `td` inside a `tbody`.
pub fn listing_cells(html: &str) -> Result<Vec<String>, FetchError> {
    texts(&Html::parse_document(html), LISTING_CELLS)
}

/// Hrefs of every anchor inside a `tbody`, resolved against `page_url`.
pub fn listing_anchors(html: &str, page_url: &str) -> Result<Vec<String>, FetchError> {
    let document = Html::parse_document(html);
    let sel = selector(LISTING_ANCHORS)?;
    let base = Url::parse(page_url).ok();

    Ok(document
        .select(&sel)
        .filter_map(|a| a.value().attr("href"))
        .map(|href| resolve(base.as_ref(), href))
        .collect())
}

/// Header (`th`) and value (`td`) cells of a detail page.
pub fn detail_cells(html: &str) -> Result<DetailCells, FetchError> {
    let document = Html::parse_document(html);
    Ok(DetailCells {
        headers: texts(&document, DETAIL_HEADERS)?,
        values: texts(&document, DETAIL_VALUES)?,
    })
}

fn resolve(base: Option<&Url>, href: &str) -> String {
    let href = href.trim();
    match base.and_then(|b| b.join(href).ok()) {
        Some(url) => url.to_string(),
        None => href.to_string(),
    }
}
