//! Management reports.
//!
//! Thin read-only services over the query layer, plus the CSV rendering for
//! the PDI summary download. Date windows arrive as `YYYY-MM-DD` strings
//! from the query string and are validated here before any SQL runs.

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};

use crate::db::DbHandle;
use crate::models::{
    DailyMovementRow, OemInwardRow, PdiSummaryRow, StockAgingRow, TransferSummaryRow,
};
use crate::scope::BranchScope;

/// Optional reporting window, inclusive on both ends.
#[derive(Debug, Default, Clone, Copy)]
pub struct DateWindow {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl DateWindow {
    /// Parse the `from`/`to` query parameters. The error is a user-facing
    /// message for a 400 response.
    pub fn parse(from: Option<&str>, to: Option<&str>) -> Result<Self, String> {
        let from = from.map(parse_date).transpose()?;
        let to = to.map(parse_date).transpose()?;
        if let Some(f) = from
            && let Some(t) = to
            && f > t
        {
            return Err(format!("'from' date {} is after 'to' date {}", f, t));
        }
        Ok(Self { from, to })
    }

    fn bounds(&self) -> (Option<String>, Option<String>) {
        (
            self.from.map(|d| d.format("%Y-%m-%d").to_string()),
            self.to.map(|d| d.format("%Y-%m-%d").to_string()),
        )
    }
}

pub fn parse_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|_| format!("Invalid date '{}': expected YYYY-MM-DD", s))
}

pub async fn pdi_summary(
    db: &DbHandle,
    scope: &BranchScope,
    window: DateWindow,
) -> Result<Vec<PdiSummaryRow>> {
    let scope_ids = scope.ids();
    let (from, to) = window.bounds();
    db.call(move |db| db.pdi_summary(&scope_ids, from.as_deref(), to.as_deref()))
        .await
}

/// Render PDI summary rows with the fixed header the dealership's sheets
/// import against. The space after each comma is part of the contract.
pub fn render_pdi_summary_csv(rows: &[PdiSummaryRow]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record([
            "Branch",
            " Stock",
            " PDI Pending",
            " PDI In Progress",
            " PDI Completed",
            " Avg Time",
        ])
        .context("Failed to write CSV header")?;
    for row in rows {
        let avg = match row.avg_hours {
            Some(hours) => format!(" {:.1}", hours),
            None => String::new(),
        };
        writer
            .write_record([
                row.branch.clone(),
                format!(" {}", row.stock),
                format!(" {}", row.pdi_pending),
                format!(" {}", row.pdi_in_progress),
                format!(" {}", row.pdi_completed),
                avg,
            ])
            .context("Failed to write CSV row")?;
    }
    let bytes = writer.into_inner().context("Failed to flush CSV")?;
    String::from_utf8(bytes).context("CSV output was not UTF-8")
}

pub async fn stock_aging(db: &DbHandle, scope: &BranchScope) -> Result<Vec<StockAgingRow>> {
    let scope_ids = scope.ids();
    db.call(move |db| db.stock_aging(&scope_ids)).await
}

/// Sales and outward transfers per branch for one day. Defaults to today
/// (UTC, matching the ledger's clock).
pub async fn daily_movement(
    db: &DbHandle,
    scope: &BranchScope,
    date: Option<NaiveDate>,
) -> Result<Vec<DailyMovementRow>> {
    let scope_ids = scope.ids();
    let date = date
        .unwrap_or_else(|| Utc::now().date_naive())
        .format("%Y-%m-%d")
        .to_string();
    db.call(move |db| db.daily_movement(&scope_ids, &date)).await
}

pub async fn transfer_summary(
    db: &DbHandle,
    scope: &BranchScope,
    window: DateWindow,
) -> Result<Vec<TransferSummaryRow>> {
    let scope_ids = scope.ids();
    let (from, to) = window.bounds();
    db.call(move |db| db.transfer_summary(&scope_ids, from.as_deref(), to.as_deref()))
        .await
}

pub async fn oem_inward(
    db: &DbHandle,
    scope: &BranchScope,
    window: DateWindow,
) -> Result<Vec<OemInwardRow>> {
    let scope_ids = scope.ids();
    let (from, to) = window.bounds();
    db.call(move |db| db.oem_inward_summary(&scope_ids, from.as_deref(), to.as_deref()))
        .await
}
