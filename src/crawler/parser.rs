//! Complaint list page parser
//!
//! This module turns the markup of one list page into:
//! - The total page count, read from the pager's "last" link
//! - The absolute URL of the next page, read from the pager's "next" link
//! - The complaint records in the listing table
//!
//! Parsing is pure: the same page always yields the same `PageResult`.
//! Malformed rows never surface as errors; they are skipped or extracted
//! with a fallback strategy.

use crate::crawler::fetcher::RawPage;
use crate::storage::Record;
use crate::url::{page_number_from_href, resolve_link};
use scraper::{ElementRef, Html, Selector};
use url::Url;

/// Body of the complaint listing table
const RECORD_TABLE_BODY: &str = "tbody#tb1";

/// Pager link to the last page
const LAST_PAGE_LINK: &str = "ul.yiiPager li.last a[href]";

/// Pager link to the next page; the pager keeps a hidden one on the final page
const NEXT_PAGE_LINK: &str = "ul.yiiPager li.next:not(.hidden) a[href]";

/// Rows with fewer cells are pager footers, ads or spacers
pub const MIN_COLUMNS: usize = 7;

/// Separates primary issue and subtype when the issue cell is flat text
pub const ISSUE_SEPARATOR: char = '\u{2014}';

/// Extracted information from one list page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageResult {
    /// Complaint records in page order
    pub records: Vec<Record>,

    /// Absolute URL of the next page, if the page links to one
    pub next_page_url: Option<Url>,

    /// Total page count, if the pager reveals it
    pub total_pages: Option<u32>,

    /// Table rows that were skipped for having too few cells
    pub skipped_rows: usize,
}

impl PageResult {
    pub fn has_next_page(&self) -> bool {
        self.next_page_url.is_some()
    }
}

/// Ways of splitting the issue cell into primary issue and subtype
///
/// Strategies are tried in the order of `IssueExtraction::PRIORITY`; the first
/// one that applies wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueExtraction {
    /// The cell holds two `div` elements: primary first, subtype second
    SubElements,

    /// The cell is flat text split once on `ISSUE_SEPARATOR`
    SeparatorSplit,
}

impl IssueExtraction {
    pub const PRIORITY: [IssueExtraction; 2] = [Self::SubElements, Self::SeparatorSplit];

    /// Applies this strategy to an issue cell
    ///
    /// Returns `None` when the cell does not have the shape this strategy
    /// needs. `SeparatorSplit` always applies.
    fn apply(&self, cell: ElementRef<'_>) -> Option<(String, String)> {
        match self {
            Self::SubElements => {
                let div_selector = Selector::parse("div").ok()?;
                let divs: Vec<ElementRef<'_>> = cell.select(&div_selector).collect();
                if divs.len() < 2 {
                    return None;
                }
                Some((element_text(divs[0]), element_text(divs[1])))
            }
            Self::SeparatorSplit => Some(split_issue_text(&element_text(cell))),
        }
    }
}

/// Issue cell contents after extraction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueFields {
    pub primary: String,
    pub subtype: String,
    pub strategy: IssueExtraction,
}

/// Parses a fetched page
///
/// # Arguments
///
/// * `page` - The fetched page; its URL is the base for relative pager links
///
/// # Example
///
/// ```
/// use tousu_crawler::crawler::{parse_page, RawPage};
/// use url::Url;
///
/// let page = RawPage {
///     url: Url::parse("https://example.com/list.html?page=1").unwrap(),
///     status: 200,
///     body: r#"<ul class="yiiPager"><li class="last"><a href="/list.html?page=715">Last</a></li></ul>"#.to_string(),
///     encoding: "utf-8".to_string(),
/// };
/// let result = parse_page(&page);
/// assert_eq!(result.total_pages, Some(715));
/// assert!(result.records.is_empty());
/// ```
pub fn parse_page(page: &RawPage) -> PageResult {
    parse_html(&page.body, &page.url)
}

/// Parses list page markup
///
/// # Arguments
///
/// * `html` - The page markup
/// * `page_url` - URL the markup was fetched from
pub fn parse_html(html: &str, page_url: &Url) -> PageResult {
    let document = Html::parse_document(html);

    let total_pages = extract_total_pages(&document, page_url);
    let next_page_url = extract_next_page_url(&document, page_url);
    let (records, skipped_rows) = extract_records(&document);

    PageResult {
        records,
        next_page_url,
        total_pages,
        skipped_rows,
    }
}

/// Reads the total page count from the pager's "last" link
fn extract_total_pages(document: &Html, page_url: &Url) -> Option<u32> {
    let selector = Selector::parse(LAST_PAGE_LINK).ok()?;

    document
        .select(&selector)
        .next()
        .and_then(|link| link.value().attr("href"))
        .and_then(|href| page_number_from_href(href, page_url))
}

/// Resolves the pager's "next" link against the page URL
fn extract_next_page_url(document: &Html, page_url: &Url) -> Option<Url> {
    let selector = Selector::parse(NEXT_PAGE_LINK).ok()?;

    document
        .select(&selector)
        .next()
        .and_then(|link| link.value().attr("href"))
        .and_then(|href| resolve_link(href, page_url))
}

/// Extracts all complaint records from the listing table
///
/// # Returns
///
/// The records in page order and the number of rows skipped as malformed
fn extract_records(document: &Html) -> (Vec<Record>, usize) {
    let (Ok(body_selector), Ok(row_selector), Ok(cell_selector)) = (
        Selector::parse(RECORD_TABLE_BODY),
        Selector::parse("tr"),
        Selector::parse("td"),
    ) else {
        return (Vec::new(), 0);
    };

    let Some(table_body) = document.select(&body_selector).next() else {
        tracing::debug!("No listing table found on page");
        return (Vec::new(), 0);
    };

    let mut records = Vec::new();
    let mut skipped_rows = 0;

    for row in table_body.select(&row_selector) {
        let cells: Vec<ElementRef<'_>> = row.select(&cell_selector).collect();
        if cells.len() < MIN_COLUMNS {
            tracing::trace!(
                "Skipping row with {} cells (need {})",
                cells.len(),
                MIN_COLUMNS
            );
            skipped_rows += 1;
            continue;
        }

        records.push(record_from_cells(&cells));
    }

    (records, skipped_rows)
}

/// Builds a record from the cells of one table row
///
/// Column layout: id, brand, series, model, summary, issue, date.
fn record_from_cells(cells: &[ElementRef<'_>]) -> Record {
    let issue = extract_issue(cells[5]);

    Record {
        id: extract_id(cells[0]),
        brand: element_text(cells[1]),
        series: element_text(cells[2]),
        model: element_text(cells[3]),
        summary: element_text(cells[4]),
        primary_issue: issue.primary,
        issue_subtype: issue.subtype,
        date: element_text(cells[6]),
    }
}

/// The id cell wraps the number in a `div` next to status badges
fn extract_id(cell: ElementRef<'_>) -> String {
    Selector::parse("div")
        .ok()
        .and_then(|selector| cell.select(&selector).next())
        .map(element_text)
        .unwrap_or_else(|| element_text(cell))
}

/// Splits the issue cell using the first strategy that applies
pub fn extract_issue(cell: ElementRef<'_>) -> IssueFields {
    for strategy in IssueExtraction::PRIORITY {
        if let Some((primary, subtype)) = strategy.apply(cell) {
            tracing::trace!("Issue cell extracted with {:?}", strategy);
            return IssueFields {
                primary,
                subtype,
                strategy,
            };
        }
    }

    // Not reached: SeparatorSplit always applies
    let (primary, subtype) = split_issue_text(&element_text(cell));
    IssueFields {
        primary,
        subtype,
        strategy: IssueExtraction::SeparatorSplit,
    }
}

/// Splits flat issue text once on `ISSUE_SEPARATOR`
///
/// # Examples
///
/// ```
/// use tousu_crawler::crawler::split_issue_text;
///
/// assert_eq!(
///     split_issue_text("刹车异响\u{2014}制动系统故障"),
///     ("刹车异响".to_string(), "制动系统故障".to_string())
/// );
/// assert_eq!(split_issue_text("异响"), ("异响".to_string(), String::new()));
/// ```
pub fn split_issue_text(text: &str) -> (String, String) {
    match text.split_once(ISSUE_SEPARATOR) {
        Some((primary, subtype)) => (primary.trim().to_string(), subtype.trim().to_string()),
        None => (text.trim().to_string(), String::new()),
    }
}

/// Flattened, cleaned text content of an element
fn element_text(element: ElementRef<'_>) -> String {
    clean_text(&element.text().collect::<String>())
}

/// Trims text and collapses each run of line breaks into a single space
///
/// # Examples
///
/// ```
/// use tousu_crawler::crawler::clean_text;
///
/// assert_eq!(clean_text("  车门\r\n异响 "), "车门 异响");
/// ```
pub fn clean_text(raw: &str) -> String {
    let mut cleaned = String::with_capacity(raw.len());
    let mut in_break = false;

    for c in raw.trim().chars() {
        if c == '\n' || c == '\r' {
            if !in_break {
                cleaned.push(' ');
                in_break = true;
            }
        } else {
            cleaned.push(c);
            in_break = false;
        }
    }

    cleaned
}
