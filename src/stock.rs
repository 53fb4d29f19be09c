//! Stock movement services: branch transfers and manual sales.
//!
//! These sit between the API handlers and the query layer. Eligibility is
//! judged per chassis (best effort), but everything a batch accepts lands
//! in a single transaction, so observers never see a half-written load.

use tracing::info;
use uuid::Uuid;

use crate::db::DbHandle;
use crate::errors::StockError;
use crate::models::{SaleOutcome, TransferOutcome};
use crate::scope::BranchScope;

/// Freshly generated transfer load number, e.g. `TRF-3FA85F642C1B`.
fn generate_load_number() -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("TRF-{}", id[..12].to_uppercase())
}

/// Dispatch a batch of chassis to another branch under one new load number.
///
/// Each unit must be In Stock at a branch inside the caller's scope;
/// ineligible units are reported back, not fatal. A batch where nothing
/// was eligible is an error so the caller never mistakes it for a dispatch.
pub async fn create_transfer(
    db: &DbHandle,
    scope: &BranchScope,
    chassis: Vec<String>,
    to_branch_id: i64,
    remarks: Option<String>,
) -> Result<TransferOutcome, StockError> {
    let destination = db
        .call(move |db| db.get_branch(to_branch_id))
        .await
        .map_err(StockError::Database)?;
    if destination.is_none() {
        return Err(StockError::BranchNotFound { id: to_branch_id });
    }

    let scope_ids = scope.ids();
    let load_number = generate_load_number();
    let outcome = {
        let load_number = load_number.clone();
        db.call(move |db| {
            db.create_transfer_batch(
                &chassis,
                to_branch_id,
                &scope_ids,
                &load_number,
                remarks.as_deref(),
            )
        })
        .await
        .map_err(StockError::Database)?
    };
    if outcome.accepted.is_empty() {
        return Err(StockError::EmptyBatch);
    }

    info!(
        load = %load_number,
        to_branch = to_branch_id,
        accepted = outcome.accepted.len(),
        skipped = outcome.skipped.len(),
        "Created transfer load"
    );
    Ok(outcome)
}

/// Book an in-transit load into `to_branch_id`.
///
/// Completes every pending outward row under the load number addressed to
/// that branch and lands the vehicles there. Receiving twice, or quoting a
/// load addressed elsewhere, finds nothing pending and is rejected.
pub async fn receive_load(
    db: &DbHandle,
    scope: &BranchScope,
    load_number: String,
    to_branch_id: i64,
) -> Result<usize, StockError> {
    if !scope.contains(to_branch_id) {
        return Err(StockError::BranchNotFound { id: to_branch_id });
    }

    let received = {
        let load_number = load_number.clone();
        db.call(move |db| db.receive_load(&load_number, to_branch_id))
            .await
            .map_err(StockError::Database)?
    };
    if received == 0 {
        return Err(StockError::NothingToReceive { load_number });
    }

    info!(load = %load_number, to_branch = to_branch_id, units = received, "Received transfer load");
    Ok(received)
}

/// Sell chassis directly, without a PDI workflow. Used for counter sales
/// and back-dated corrections.
pub async fn manual_sale(
    db: &DbHandle,
    scope: &BranchScope,
    chassis: Vec<String>,
    remarks: Option<String>,
) -> Result<SaleOutcome, StockError> {
    let scope_ids = scope.ids();
    let outcome = db
        .call(move |db| db.record_manual_sale(&chassis, &scope_ids, remarks.as_deref()))
        .await
        .map_err(StockError::Database)?;
    if outcome.sold.is_empty() {
        return Err(StockError::NothingSold);
    }

    info!(
        sold = outcome.sold.len(),
        rejected = outcome.rejected.len(),
        "Recorded manual sale"
    );
    Ok(outcome)
}
