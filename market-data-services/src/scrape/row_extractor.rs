use std::collections::HashSet;

use market_core::{canonical_symbol, ChangeDirection, RawRow, Symbol};
use scraper::{ElementRef, Html, Selector};

use super::config::ScrapeConfig;
use super::normalizer::percent_token;
use crate::error::ExtractError;

/// Lifts listing rows out of a rendered document.
///
/// Every anchor whose link target contains the trade path is resolved to its
/// enclosing row. Several anchors (icon plus label) commonly share one row,
/// so rows are deduplicated by their node id in the parsed tree.
pub struct RowExtractor {
    link_selector: Selector,
}

impl RowExtractor {
    pub fn new(config: &ScrapeConfig) -> Result<Self, ExtractError> {
        let selector = config.link_selector();
        let link_selector =
            Selector::parse(&selector).map_err(|e| ExtractError::InvalidSelector {
                selector: selector.clone(),
                reason: e.to_string(),
            })?;
        Ok(Self { link_selector })
    }

    /// Collect up to `max_rows` distinct rows, then drop those without a
    /// symbol. An empty result is the caller's to report.
    pub fn extract(&self, html: &str, max_rows: usize) -> Vec<RawRow> {
        let document = Html::parse_document(html);
        let mut seen = HashSet::new();
        let mut rows = Vec::new();

        for anchor in document.select(&self.link_selector) {
            if rows.len() >= max_rows {
                break;
            }

            let row = resolve_row(anchor);
            if !seen.insert(row.id()) {
                continue;
            }

            let href = anchor.value().attr("href").unwrap_or_default();
            let mut symbol = symbol_from_href(href);
            if symbol.is_empty() {
                symbol = canonical_symbol(&anchor.text().collect::<String>());
            }

            rows.push(
                RawRow::new(symbol, flatten_text(row)).with_direction(direction_hint(row)),
            );
        }

        let collected = rows.len();
        rows.retain(|row| !row.symbol.is_empty());
        if rows.len() < collected {
            tracing::debug!("Dropped {} rows without a symbol", collected - rows.len());
        }
        rows
    }
}

/// Row-like container for an anchor: explicit `role="row"`, then a table row,
/// then the anchor's grandparent.
fn resolve_row(anchor: ElementRef<'_>) -> ElementRef<'_> {
    let lineage = || {
        std::iter::once(*anchor)
            .chain(anchor.ancestors())
            .filter_map(ElementRef::wrap)
    };

    lineage()
        .find(|el| el.value().attr("role") == Some("row"))
        .or_else(|| lineage().find(|el| el.value().name() == "tr"))
        .or_else(|| {
            anchor
                .parent()
                .and_then(|parent| parent.parent())
                .and_then(ElementRef::wrap)
        })
        .unwrap_or(anchor)
}

/// Symbol from a link such as `/en/trade/BTC_USDT?type=spot`.
pub fn symbol_from_href(href: &str) -> Symbol {
    let Some((_, after)) = href.split_once("/trade/") else {
        return Symbol::new();
    };
    let path = after.split(['?', '#']).next().unwrap_or_default();
    let segment = path.split('/').next().unwrap_or_default();
    canonical_symbol(segment)
}

/// Phrasing elements: their text runs straight into the surrounding text, so
/// `2.35<span>%</span>` reads as `2.35%`.
const INLINE_ELEMENTS: &[&str] = &[
    "a", "abbr", "b", "bdi", "bdo", "cite", "code", "data", "del", "dfn", "em", "font", "i",
    "img", "ins", "kbd", "label", "mark", "q", "s", "samp", "small", "span", "strong", "sub",
    "sup", "time", "u", "var", "wbr",
];

fn push_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            out.push_str(text);
        } else if let Some(child) = ElementRef::wrap(child) {
            let boundary = !INLINE_ELEMENTS.contains(&child.value().name());
            if boundary {
                out.push(' ');
            }
            push_text(child, out);
            if boundary {
                out.push(' ');
            }
        }
    }
}

/// The row's text content on one line with whitespace collapsed. Text nodes
/// are concatenated as written; only block and cell boundaries add a space,
/// so adjacent cells never fuse.
pub fn flatten_text(row: ElementRef<'_>) -> String {
    let mut raw = String::new();
    push_text(row, &mut raw);
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn holds_percent(el: ElementRef<'_>) -> bool {
    percent_token(&flatten_text(el)).is_some()
}

/// Markup direction of the row's change cell: the classes on the innermost
/// element holding a whole percent token, then on its ancestors up to the row.
fn direction_hint(row: ElementRef<'_>) -> Option<ChangeDirection> {
    let cell = row
        .descendants()
        .filter_map(ElementRef::wrap)
        .find(|el| {
            holds_percent(*el) && !el.children().filter_map(ElementRef::wrap).any(holds_percent)
        })?;

    std::iter::once(*cell)
        .chain(cell.ancestors())
        .filter_map(ElementRef::wrap)
        .take_while(|el| el.id() != row.id())
        .chain(std::iter::once(row))
        .find_map(|el| el.value().attr("class").and_then(ChangeDirection::from_class_list))
}
