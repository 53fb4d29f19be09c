//! Pre-delivery inspection (PDI) fulfilment.
//!
//! A sales record moves PDI Pending → PDI In Progress → PDI Complete.
//! Completion is the moment a physical vehicle is allotted to the customer:
//! the chassis must be In Stock, visible to the caller, and match what was
//! sold. Every check and the final allotment run under one database lock
//! acquisition, so a vehicle can never be promised to two records.

use anyhow::Context;
use tracing::info;

use crate::db::DbHandle;
use crate::errors::PdiError;
use crate::models::{
    FulfillmentStatus, NewSalesRecord, PdiBoard, Role, SalesRecord, VehicleStatus,
};
use crate::scope::BranchScope;

/// Domain errors raised inside a DB closure travel out through anyhow;
/// anything that fails to downcast is a genuine database failure.
fn to_pdi_error(e: anyhow::Error) -> PdiError {
    match e.downcast::<PdiError>() {
        Ok(domain) => domain,
        Err(other) => PdiError::Database(other),
    }
}

fn record_spec(record: &SalesRecord) -> String {
    if record.variant.is_empty() {
        format!("{} {}", record.model, record.color)
    } else {
        format!("{} {} {}", record.model, record.variant, record.color)
    }
}

pub async fn create_record(
    db: &DbHandle,
    scope: &BranchScope,
    default_branch_id: i64,
    req: NewSalesRecord,
) -> Result<SalesRecord, PdiError> {
    let branch_id = req.branch_id.unwrap_or(default_branch_id);
    if !scope.contains(branch_id) {
        return Err(PdiError::BranchNotFound { id: branch_id });
    }

    let record = db
        .call(move |db| {
            db.create_sales_record(
                req.customer_name.trim(),
                req.customer_phone.as_deref(),
                req.model.trim(),
                req.variant.trim(),
                req.color.trim(),
                branch_id,
            )
        })
        .await
        .map_err(to_pdi_error)?;
    info!(record = record.id, branch = branch_id, "Created sales record");
    Ok(record)
}

/// Hand a record to a mechanic. Re-assignment while work is still open is
/// allowed; a completed record is frozen.
pub async fn assign_mechanic(
    db: &DbHandle,
    scope: &BranchScope,
    record_id: i64,
    mechanic_id: i64,
) -> Result<SalesRecord, PdiError> {
    let scope_ids = scope.ids();
    let record = db
        .call(move |db| {
            let record = db
                .get_sales_record(record_id)?
                .ok_or(PdiError::RecordNotFound { id: record_id })?;
            if !scope_ids.contains(&record.branch_id) {
                return Err(PdiError::RecordNotFound { id: record_id }.into());
            }
            match record.fulfillment_status {
                FulfillmentStatus::PdiPending | FulfillmentStatus::PdiInProgress => {}
                other => {
                    return Err(PdiError::WrongStatus {
                        id: record_id,
                        status: other.to_string(),
                        expected: "PDI Pending or PDI In Progress".to_string(),
                    }
                    .into());
                }
            }
            let mechanic = db
                .get_user(mechanic_id)?
                .ok_or(PdiError::NotAMechanic { id: mechanic_id })?;
            if mechanic.role != Role::Mechanic {
                return Err(PdiError::NotAMechanic { id: mechanic_id }.into());
            }
            db.set_sales_mechanic(record_id, mechanic_id)
        })
        .await
        .map_err(to_pdi_error)?;
    info!(record = record_id, mechanic = mechanic_id, "Assigned mechanic");
    Ok(record)
}

/// Finish PDI by allotting a chassis to the record.
///
/// The vehicle must be In Stock within the caller's scope and agree with
/// the record on model and color; variant is checked only when the record
/// names one. Replaying a completion with the same chassis succeeds
/// without touching anything.
pub async fn complete_pdi(
    db: &DbHandle,
    scope: &BranchScope,
    record_id: i64,
    chassis_no: String,
) -> Result<SalesRecord, PdiError> {
    let scope_ids = scope.ids();
    let chassis = chassis_no.clone();
    let record = db
        .call(move |db| {
            let record = db
                .get_sales_record(record_id)?
                .ok_or(PdiError::RecordNotFound { id: record_id })?;
            if !scope_ids.contains(&record.branch_id) {
                return Err(PdiError::RecordNotFound { id: record_id }.into());
            }
            if record.fulfillment_status == FulfillmentStatus::PdiComplete {
                if record.chassis_no.as_deref() == Some(chassis.as_str()) {
                    return Ok(record);
                }
                return Err(PdiError::WrongStatus {
                    id: record_id,
                    status: FulfillmentStatus::PdiComplete.to_string(),
                    expected: "PDI Pending or PDI In Progress".to_string(),
                }
                .into());
            }

            let vehicle = db
                .get_vehicle_by_chassis(&chassis)?
                .ok_or_else(|| PdiError::VehicleNotFound {
                    chassis_no: chassis.clone(),
                })?;
            if !scope_ids.contains(&vehicle.branch_id) {
                return Err(PdiError::VehicleNotFound {
                    chassis_no: chassis.clone(),
                }
                .into());
            }
            match vehicle.status {
                VehicleStatus::InStock => {}
                VehicleStatus::Allotted => {
                    return Err(PdiError::AlreadyAllotted {
                        chassis_no: chassis.clone(),
                    }
                    .into());
                }
                _ => {
                    return Err(PdiError::VehicleNotInStock {
                        chassis_no: chassis.clone(),
                    }
                    .into());
                }
            }

            let model_ok = vehicle.model.eq_ignore_ascii_case(&record.model);
            let color_ok = vehicle.color.eq_ignore_ascii_case(&record.color);
            let variant_ok =
                record.variant.is_empty() || vehicle.variant.eq_ignore_ascii_case(&record.variant);
            if !(model_ok && color_ok && variant_ok) {
                return Err(PdiError::VehicleMismatch {
                    chassis_no: chassis.clone(),
                    expected: record_spec(&record),
                }
                .into());
            }

            db.allot_vehicle(record_id, &chassis)?;
            db.get_sales_record(record_id)?
                .context("Sales record not found after completion")
        })
        .await
        .map_err(to_pdi_error)?;
    info!(record = record_id, chassis = %chassis_no, "Completed PDI");
    Ok(record)
}

/// Everything the PDI screen shows: open work grouped by status, plus
/// completions from the last two days.
pub async fn board(db: &DbHandle, scope: &BranchScope) -> Result<PdiBoard, PdiError> {
    let scope_ids = scope.ids();
    db.call(move |db| {
        Ok(PdiBoard {
            pending: db.list_sales_records(&scope_ids, Some(&FulfillmentStatus::PdiPending))?,
            in_progress: db
                .list_sales_records(&scope_ids, Some(&FulfillmentStatus::PdiInProgress))?,
            recently_completed: db.recently_completed_records(&scope_ids)?,
        })
    })
    .await
    .map_err(to_pdi_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::OpsDb;
    use crate::models::NewVehicle;
    use crate::scope::resolve_scope;

    struct Fixture {
        db: DbHandle,
        branch_id: i64,
        other_branch_id: i64,
        mechanic_id: i64,
        back_office_id: i64,
        scope: BranchScope,
    }

    fn fixture() -> Fixture {
        let db = OpsDb::new_in_memory().unwrap();
        let branch = db.create_branch("Main", None).unwrap();
        let other = db.create_branch("Other", None).unwrap();
        let back_office = db
            .create_user("office", "9300000001", "h", &Role::BackOffice, branch.id)
            .unwrap();
        let mechanic = db
            .create_user("ravi", "9300000002", "h", &Role::Mechanic, branch.id)
            .unwrap();
        let scope = resolve_scope(&db, &back_office).unwrap();
        Fixture {
            db: DbHandle::new(db),
            branch_id: branch.id,
            other_branch_id: other.id,
            mechanic_id: mechanic.id,
            back_office_id: back_office.id,
            scope,
        }
    }

    fn seed_vehicle(fx: &Fixture, chassis: &str, model: &str, variant: &str, color: &str) {
        let db = fx.db.lock_sync().unwrap();
        db.create_vehicle(&NewVehicle {
            chassis_no: chassis.to_string(),
            engine_no: None,
            model: model.to_string(),
            variant: variant.to_string(),
            color: color.to_string(),
            status: VehicleStatus::InStock,
            branch_id: fx.branch_id,
            load_reference: None,
        })
        .unwrap();
    }

    fn new_record(model: &str, variant: &str, color: &str) -> NewSalesRecord {
        NewSalesRecord {
            customer_name: "Customer".to_string(),
            customer_phone: None,
            model: model.to_string(),
            variant: variant.to_string(),
            color: color.to_string(),
            branch_id: None,
        }
    }

    #[tokio::test]
    async fn test_create_defaults_to_callers_branch() {
        let fx = fixture();
        let record = create_record(&fx.db, &fx.scope, fx.branch_id, new_record("Activa", "DLX", "Red"))
            .await
            .unwrap();
        assert_eq!(record.branch_id, fx.branch_id);
        assert_eq!(record.fulfillment_status, FulfillmentStatus::PdiPending);
    }

    #[tokio::test]
    async fn test_create_outside_scope_is_rejected() {
        let fx = fixture();
        let mut req = new_record("Activa", "DLX", "Red");
        req.branch_id = Some(fx.other_branch_id);
        let err = create_record(&fx.db, &fx.scope, fx.branch_id, req)
            .await
            .unwrap_err();
        assert!(matches!(err, PdiError::BranchNotFound { .. }));
    }

    #[tokio::test]
    async fn test_assign_requires_mechanic_role() {
        let fx = fixture();
        let record = create_record(&fx.db, &fx.scope, fx.branch_id, new_record("Activa", "DLX", "Red"))
            .await
            .unwrap();

        let err = assign_mechanic(&fx.db, &fx.scope, record.id, fx.back_office_id)
            .await
            .unwrap_err();
        assert!(matches!(err, PdiError::NotAMechanic { .. }));

        let err = assign_mechanic(&fx.db, &fx.scope, record.id, 404)
            .await
            .unwrap_err();
        assert!(matches!(err, PdiError::NotAMechanic { id: 404 }));
    }

    #[tokio::test]
    async fn test_assign_flips_status_and_allows_reassignment() {
        let fx = fixture();
        let record = create_record(&fx.db, &fx.scope, fx.branch_id, new_record("Activa", "DLX", "Red"))
            .await
            .unwrap();

        let assigned = assign_mechanic(&fx.db, &fx.scope, record.id, fx.mechanic_id)
            .await
            .unwrap();
        assert_eq!(assigned.fulfillment_status, FulfillmentStatus::PdiInProgress);
        assert_eq!(assigned.mechanic_id, Some(fx.mechanic_id));

        // A second mechanic can take over while work is open.
        let second = {
            let db = fx.db.lock_sync().unwrap();
            db.create_user("second", "9300000003", "h", &Role::Mechanic, fx.branch_id)
                .unwrap()
        };
        let reassigned = assign_mechanic(&fx.db, &fx.scope, record.id, second.id)
            .await
            .unwrap();
        assert_eq!(reassigned.mechanic_id, Some(second.id));
    }

    #[tokio::test]
    async fn test_complete_allots_vehicle_and_freezes_record() {
        let fx = fixture();
        seed_vehicle(&fx, "CH1", "Activa", "DLX", "Red");
        let record = create_record(&fx.db, &fx.scope, fx.branch_id, new_record("Activa", "DLX", "Red"))
            .await
            .unwrap();

        let done = complete_pdi(&fx.db, &fx.scope, record.id, "CH1".to_string())
            .await
            .unwrap();
        assert_eq!(done.fulfillment_status, FulfillmentStatus::PdiComplete);
        assert_eq!(done.chassis_no.as_deref(), Some("CH1"));
        assert!(done.pdi_completed_at.is_some());

        let db = fx.db.lock_sync().unwrap();
        let vehicle = db.get_vehicle_by_chassis("CH1").unwrap().unwrap();
        assert_eq!(vehicle.status, VehicleStatus::Allotted);
        assert_eq!(vehicle.sale_id, Some(record.id));

        // Assignment after completion is frozen.
        drop(db);
        let err = assign_mechanic(&fx.db, &fx.scope, record.id, fx.mechanic_id)
            .await
            .unwrap_err();
        assert!(matches!(err, PdiError::WrongStatus { .. }));
    }

    #[tokio::test]
    async fn test_complete_is_idempotent_for_the_same_chassis() {
        let fx = fixture();
        seed_vehicle(&fx, "CH1", "Activa", "DLX", "Red");
        let record = create_record(&fx.db, &fx.scope, fx.branch_id, new_record("Activa", "DLX", "Red"))
            .await
            .unwrap();

        complete_pdi(&fx.db, &fx.scope, record.id, "CH1".to_string())
            .await
            .unwrap();
        let replay = complete_pdi(&fx.db, &fx.scope, record.id, "CH1".to_string())
            .await
            .unwrap();
        assert_eq!(replay.chassis_no.as_deref(), Some("CH1"));

        seed_vehicle(&fx, "CH2", "Activa", "DLX", "Red");
        let err = complete_pdi(&fx.db, &fx.scope, record.id, "CH2".to_string())
            .await
            .unwrap_err();
        assert!(matches!(err, PdiError::WrongStatus { .. }));
    }

    #[tokio::test]
    async fn test_complete_rejects_mismatched_vehicle() {
        let fx = fixture();
        seed_vehicle(&fx, "CH1", "Activa", "DLX", "Red");
        let record = create_record(&fx.db, &fx.scope, fx.branch_id, new_record("Dio", "STD", "Red"))
            .await
            .unwrap();

        let err = complete_pdi(&fx.db, &fx.scope, record.id, "CH1".to_string())
            .await
            .unwrap_err();
        match err {
            PdiError::VehicleMismatch { expected, .. } => {
                assert_eq!(expected, "Dio STD Red");
            }
            other => panic!("expected VehicleMismatch, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_record_without_variant_accepts_any_variant() {
        let fx = fixture();
        seed_vehicle(&fx, "CH1", "Activa", "H-Smart", "Red");
        let record = create_record(&fx.db, &fx.scope, fx.branch_id, new_record("activa", "", "red"))
            .await
            .unwrap();

        let done = complete_pdi(&fx.db, &fx.scope, record.id, "CH1".to_string())
            .await
            .unwrap();
        assert_eq!(done.fulfillment_status, FulfillmentStatus::PdiComplete);
    }

    #[tokio::test]
    async fn test_complete_rejects_ineligible_vehicles() {
        let fx = fixture();
        {
            let db = fx.db.lock_sync().unwrap();
            db.create_vehicle(&NewVehicle {
                chassis_no: "TRANSIT".to_string(),
                engine_no: None,
                model: "Activa".to_string(),
                variant: "DLX".to_string(),
                color: "Red".to_string(),
                status: VehicleStatus::InTransit,
                branch_id: fx.branch_id,
                load_reference: None,
            })
            .unwrap();
        }
        seed_vehicle(&fx, "TAKEN", "Activa", "DLX", "Red");

        let first = create_record(&fx.db, &fx.scope, fx.branch_id, new_record("Activa", "DLX", "Red"))
            .await
            .unwrap();
        let second = create_record(&fx.db, &fx.scope, fx.branch_id, new_record("Activa", "DLX", "Red"))
            .await
            .unwrap();

        let err = complete_pdi(&fx.db, &fx.scope, first.id, "TRANSIT".to_string())
            .await
            .unwrap_err();
        assert!(matches!(err, PdiError::VehicleNotInStock { .. }));

        complete_pdi(&fx.db, &fx.scope, first.id, "TAKEN".to_string())
            .await
            .unwrap();
        let err = complete_pdi(&fx.db, &fx.scope, second.id, "TAKEN".to_string())
            .await
            .unwrap_err();
        assert!(matches!(err, PdiError::AlreadyAllotted { .. }));

        let err = complete_pdi(&fx.db, &fx.scope, second.id, "GHOST".to_string())
            .await
            .unwrap_err();
        assert!(matches!(err, PdiError::VehicleNotFound { .. }));
    }

    #[tokio::test]
    async fn test_board_groups_records_by_status() {
        let fx = fixture();
        seed_vehicle(&fx, "CH1", "Activa", "DLX", "Red");
        let pending = create_record(&fx.db, &fx.scope, fx.branch_id, new_record("Dio", "", "Blue"))
            .await
            .unwrap();
        let working = create_record(&fx.db, &fx.scope, fx.branch_id, new_record("Activa", "", "Black"))
            .await
            .unwrap();
        assign_mechanic(&fx.db, &fx.scope, working.id, fx.mechanic_id)
            .await
            .unwrap();
        let finished = create_record(&fx.db, &fx.scope, fx.branch_id, new_record("Activa", "DLX", "Red"))
            .await
            .unwrap();
        complete_pdi(&fx.db, &fx.scope, finished.id, "CH1".to_string())
            .await
            .unwrap();

        let board = board(&fx.db, &fx.scope).await.unwrap();
        assert_eq!(board.pending.len(), 1);
        assert_eq!(board.pending[0].id, pending.id);
        assert_eq!(board.in_progress.len(), 1);
        assert_eq!(board.in_progress[0].id, working.id);
        assert_eq!(board.recently_completed.len(), 1);
        assert_eq!(board.recently_completed[0].id, finished.id);
    }
}
