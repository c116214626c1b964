//! Bulk export of historical report pages, used to build training data.

use std::io::Write;

use tracing::{info, warn};

use crate::{
    error::{GridcastError, Result},
    provider::ActualsSource,
};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectSummary {
    pub pages_ok: u32,
    pub pages_failed: Vec<u32>,
    pub rows: usize,
}

/// Fetch report pages `start..=end` in order and write every row as CSV.
///
/// A page that fails to download or parse is logged and skipped so one bad
/// page does not lose a long scrape.
pub async fn collect_pages<W: Write>(
    source: &dyn ActualsSource,
    start: u32,
    end: u32,
    out: W,
) -> Result<CollectSummary> {
    let mut writer = csv::Writer::from_writer(out);
    let mut summary = CollectSummary::default();

    for page in start..=end {
        info!(page, "fetching page");

        let rows = match source.fetch_page(page).await {
            Ok(rows) => rows,
            Err(e) => {
                warn!(page, error = %e, "skipping page");
                summary.pages_failed.push(page);
                continue;
            }
        };

        for row in &rows {
            writer.serialize(row).map_err(csv_error)?;
        }
        summary.pages_ok += 1;
        summary.rows += rows.len();
    }

    writer.flush().map_err(|e| csv_error(e.into()))?;
    Ok(summary)
}

fn csv_error(e: csv::Error) -> GridcastError {
    GridcastError::persistence("<csv output>", e)
}
