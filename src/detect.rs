//! Decides whether a results page lists outstanding fines.
//!
//! The site's markup is not reliably structured, so detection runs an ordered
//! list of strategies over an HTML snapshot. Each strategy either decides or
//! passes; the first decision wins and the fallback is "no fines".

use crate::config::Detection;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use unicode_normalization::UnicodeNormalization;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FineVerdict {
    pub has_fine: bool,
    pub count: usize,
}

impl FineVerdict {
    pub const NONE: FineVerdict = FineVerdict {
        has_fine: false,
        count: 0,
    };

    pub fn found(count: usize) -> Self {
        Self {
            has_fine: true,
            count,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Decided(FineVerdict),
    Undecided,
}

#[derive(Debug, Error)]
pub enum DetectError {
    #[error("invalid selector `{selector}`: {message}")]
    Selector { selector: String, message: String },
}

pub(crate) fn selector(raw: &str) -> Result<Selector, DetectError> {
    Selector::parse(raw).map_err(|e| DetectError::Selector {
        selector: raw.to_string(),
        message: e.to_string(),
    })
}

/// A parsed page plus its normalized, lowercased source text.
pub struct PageSnapshot {
    pub document: Html,
    pub lowered: String,
}

impl PageSnapshot {
    pub fn parse(html: &str) -> Self {
        Self {
            document: Html::parse_document(html),
            lowered: html.nfc().collect::<String>().to_lowercase(),
        }
    }
}

pub trait DetectionStrategy: Send + Sync {
    fn name(&self) -> &'static str;
    fn evaluate(&self, page: &PageSnapshot) -> Decision;
}

/// Locates the fines table by id and counts body rows that carry real data.
pub struct ResultsTable {
    table: Selector,
    tbody: Selector,
    row: Selector,
    cell: Selector,
    no_result_phrases: Vec<String>,
    min_cells: usize,
}

impl ResultsTable {
    pub fn new(cfg: &Detection) -> Result<Self, DetectError> {
        Ok(Self {
            table: selector(&format!("#{}", cfg.table_id))?,
            tbody: selector("tbody")?,
            row: selector("tr")?,
            cell: selector("td")?,
            no_result_phrases: cfg.no_result_phrases.clone(),
            min_cells: cfg.min_cells,
        })
    }

    /// Body rows of the results table, or `None` when the table (or its body) is absent.
    pub fn data_rows<'a>(&self, document: &'a Html) -> Option<Vec<ElementRef<'a>>> {
        let table = document.select(&self.table).next()?;
        let tbody = table.select(&self.tbody).next()?;
        let rows = tbody
            .select(&self.row)
            .filter(|row| self.is_data_row(*row))
            .collect();
        Some(rows)
    }

    fn is_data_row(&self, row: ElementRef<'_>) -> bool {
        let text = row.text().collect::<String>();
        let text = text.trim().to_lowercase();
        if text.is_empty() {
            return false;
        }
        if self.no_result_phrases.iter().any(|p| text.contains(p.as_str())) {
            return false;
        }
        row.select(&self.cell).count() >= self.min_cells
    }

    pub fn cells(&self, row: ElementRef<'_>) -> Vec<String> {
        row.select(&self.cell)
            .map(|c| crate::util::collapse_whitespace(&c.text().collect::<String>()))
            .collect()
    }
}

impl DetectionStrategy for ResultsTable {
    fn name(&self) -> &'static str {
        "results_table"
    }

    fn evaluate(&self, page: &PageSnapshot) -> Decision {
        match self.data_rows(&page.document) {
            Some(rows) if !rows.is_empty() => Decision::Decided(FineVerdict::found(rows.len())),
            Some(_) => Decision::Decided(FineVerdict::NONE),
            None => Decision::Undecided,
        }
    }
}

/// Any element whose own text nodes carry a "no fines" message.
pub struct NegativeMessage {
    any: Selector,
    messages: Vec<String>,
}

impl NegativeMessage {
    pub fn new(messages: Vec<String>) -> Result<Self, DetectError> {
        Ok(Self {
            any: selector("*")?,
            messages,
        })
    }
}

impl DetectionStrategy for NegativeMessage {
    fn name(&self) -> &'static str {
        "negative_message"
    }

    fn evaluate(&self, page: &PageSnapshot) -> Decision {
        let hit = page.document.select(&self.any).any(|el| {
            el.children()
                .filter_map(|node| node.value().as_text())
                .any(|text| self.messages.iter().any(|m| text.contains(m.as_str())))
        });
        if hit {
            Decision::Decided(FineVerdict::NONE)
        } else {
            Decision::Undecided
        }
    }
}

/// Case-insensitive scan of the page source for phrases that rule fines out.
pub struct NegativePhrase {
    phrases: Vec<String>,
}

impl NegativePhrase {
    pub fn new(phrases: &[String]) -> Self {
        Self {
            phrases: lowered(phrases),
        }
    }
}

impl DetectionStrategy for NegativePhrase {
    fn name(&self) -> &'static str {
        "negative_phrase"
    }

    fn evaluate(&self, page: &PageSnapshot) -> Decision {
        match self.phrases.iter().find(|p| page.lowered.contains(p.as_str())) {
            Some(phrase) => {
                debug!(phrase = %phrase, "negative phrase matched");
                Decision::Decided(FineVerdict::NONE)
            }
            None => Decision::Undecided,
        }
    }
}

/// Loose indicators that the page lists fines. The count is a placeholder of one.
pub struct PositiveIndicator {
    phrases: Vec<String>,
}

impl PositiveIndicator {
    pub fn new(phrases: &[String]) -> Self {
        Self {
            phrases: lowered(phrases),
        }
    }
}

impl DetectionStrategy for PositiveIndicator {
    fn name(&self) -> &'static str {
        "positive_indicator"
    }

    fn evaluate(&self, page: &PageSnapshot) -> Decision {
        if self.phrases.iter().any(|p| page.lowered.contains(p.as_str())) {
            Decision::Decided(FineVerdict::found(1))
        } else {
            Decision::Undecided
        }
    }
}

fn lowered(phrases: &[String]) -> Vec<String> {
    phrases
        .iter()
        .map(|p| p.nfc().collect::<String>().to_lowercase())
        .collect()
}

pub struct FineDetector {
    strategies: Vec<Box<dyn DetectionStrategy>>,
}

impl FineDetector {
    pub fn new(strategies: Vec<Box<dyn DetectionStrategy>>) -> Self {
        Self { strategies }
    }

    pub fn from_config(cfg: &Detection) -> Result<Self, DetectError> {
        Ok(Self::new(vec![
            Box::new(ResultsTable::new(cfg)?),
            Box::new(NegativeMessage::new(cfg.negative_messages.clone())?),
            Box::new(NegativePhrase::new(&cfg.negative_phrases)),
            Box::new(PositiveIndicator::new(&cfg.positive_phrases)),
        ]))
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    pub fn detect(&self, html: &str) -> FineVerdict {
        let page = PageSnapshot::parse(html);
        self.detect_snapshot(&page)
    }

    pub fn detect_snapshot(&self, page: &PageSnapshot) -> FineVerdict {
        for strategy in &self.strategies {
            if let Decision::Decided(verdict) = strategy.evaluate(page) {
                debug!(strategy = strategy.name(), ?verdict, "fine detection decided");
                return verdict;
            }
        }
        debug!("no strategy decided; assuming no fines");
        FineVerdict::NONE
    }
}
