//! Power Grid Company of Bangladesh daily generation report.
//!
//! The report is an HTML page with a two-level header; the lower level names
//! the columns (`Date`, `Generation(MW)`, `Demand(MW)`, `Loadshed`, ...).

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info};

use crate::{
    error::{GridcastError, Result},
    model::{REPORT_DATE_FORMAT, RawPowerRow},
};

use super::{ActualsSource, get_text};

const SOURCE_NAME: &str = "PGCB generation report";

const DATE_COL: &str = "Date";
const GENERATION_COL: &str = "Generation(MW)";
const DEMAND_COL: &str = "Demand(MW)";
const LOADSHED_COL: &str = "Loadshed";

/// Largest spans browsers honour.
const MAX_COLSPAN: usize = 1000;
const MAX_ROWSPAN: usize = 65534;

#[derive(Debug, Clone)]
pub struct PgcbProvider {
    base_url: String,
    http: Client,
}

impl PgcbProvider {
    pub fn new(base_url: String, http: Client) -> Self {
        Self { base_url, http }
    }
}

#[async_trait]
impl ActualsSource for PgcbProvider {
    async fn fetch_page(&self, page: u32) -> Result<Vec<RawPowerRow>> {
        debug!(page, "fetching generation report page");

        let body =
            get_text(&self.http, SOURCE_NAME, &self.base_url, &[("page", page.to_string())]).await?;

        let rows = parse_report(&body)?;
        info!(page, rows = rows.len(), "generation report fetched");
        Ok(rows)
    }
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| GridcastError::DataShape(format!("bad selector '{css}': {e}")))
}

fn cell_text(cell: ElementRef<'_>) -> String {
    cell.text().collect::<String>().split_whitespace().collect::<Vec<_>>().join(" ")
}

fn span(cell: ElementRef<'_>, attr: &str, max: usize) -> usize {
    cell.value()
        .attr(attr)
        .and_then(|v| v.trim().parse::<usize>().ok())
        .filter(|&n| n > 0)
        .map_or(1, |n| n.min(max))
}

/// Expand the header rows (honouring `colspan`/`rowspan`) and return the
/// label every column carries in the lowest header row.
fn column_labels(header_rows: &[Vec<ElementRef<'_>>]) -> Vec<String> {
    // Per column: (rows still covered by a rowspan, label).
    let mut carried: Vec<(usize, String)> = Vec::new();
    let mut labels = Vec::new();

    for cells in header_rows {
        let mut row: Vec<String> = Vec::new();
        let mut cells = cells.iter().peekable();
        let mut col = 0;

        while cells.peek().is_some() || col < carried.len() {
            if let Some((remaining, text)) = carried.get_mut(col).filter(|(r, _)| *r > 0) {
                *remaining -= 1;
                row.push(text.clone());
                col += 1;
                continue;
            }
            let Some(cell) = cells.next() else {
                row.push(String::new());
                col += 1;
                continue;
            };

            let text = cell_text(*cell);
            let rowspan = span(*cell, "rowspan", MAX_ROWSPAN);
            for _ in 0..span(*cell, "colspan", MAX_COLSPAN) {
                if carried.len() <= col {
                    carried.resize(col + 1, (0, String::new()));
                }
                carried[col] = (rowspan - 1, text.clone());
                row.push(text.clone());
                col += 1;
            }
        }
        labels = row;
    }

    labels
}

/// Positions of the columns we read within a report row.
struct Columns {
    date: usize,
    generation: usize,
    demand: usize,
    loadshed: usize,
}

impl Columns {
    fn read(&self, cells: &[String]) -> Option<RawPowerRow> {
        let get = |i: usize| cells.get(i).map(String::as_str);

        Some(RawPowerRow {
            date: NaiveDate::parse_from_str(get(self.date)?, REPORT_DATE_FORMAT).ok()?,
            generation_mw: parse_number(get(self.generation)?)?,
            demand_mw: parse_number(get(self.demand)?)?,
            loadshed_mw: parse_number(get(self.loadshed)?)?,
        })
    }
}

fn parse_number(text: &str) -> Option<f64> {
    text.replace(',', "").trim().parse().ok()
}

/// Extract every dated row from the first table on a report page.
///
/// Rows whose date or numbers cannot be read (totals, blanks) are skipped;
/// a page without the expected table or columns is a shape error.
pub fn parse_report(html: &str) -> Result<Vec<RawPowerRow>> {
    let doc = Html::parse_document(html);
    let table_sel = selector("table")?;
    let tr_sel = selector("tr")?;
    let th_sel = selector("th")?;
    let td_sel = selector("td, th")?;

    let table = doc
        .select(&table_sel)
        .next()
        .ok_or_else(|| GridcastError::DataShape(format!("{SOURCE_NAME}: page has no table")))?;

    let (header_rows, data_rows): (Vec<ElementRef<'_>>, Vec<ElementRef<'_>>) = table
        .select(&tr_sel)
        .partition(|tr| tr.select(&td_sel).all(|c| c.value().name() == "th"));

    let header_cells: Vec<Vec<ElementRef<'_>>> =
        header_rows.iter().map(|tr| tr.select(&th_sel).collect()).collect();
    let labels = column_labels(&header_cells);

    let index_of = |name: &str| {
        labels.iter().position(|l| l == name).ok_or_else(|| {
            GridcastError::DataShape(format!("{SOURCE_NAME}: missing column '{name}'"))
        })
    };
    let columns = Columns {
        date: index_of(DATE_COL)?,
        generation: index_of(GENERATION_COL)?,
        demand: index_of(DEMAND_COL)?,
        loadshed: index_of(LOADSHED_COL)?,
    };

    let rows = data_rows
        .iter()
        .filter_map(|tr| {
            let cells: Vec<String> = tr.select(&td_sel).map(cell_text).collect();
            let parsed = columns.read(&cells);
            if parsed.is_none() {
                debug!(?cells, "skipping unreadable report row");
            }
            parsed
        })
        .collect();

    Ok(rows)
}
