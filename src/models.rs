use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Branch {
    pub id: i64,
    pub name: String,
    /// Head branch this branch reports to; `None` marks a head branch.
    pub head_branch_id: Option<i64>,
}

/// Lifecycle of a physical unit. Transitions are monotonic:
/// In Transit → In Stock → Allotted → Sold. The receive step moves a
/// transferred unit from In Transit back to In Stock at the destination.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum VehicleStatus {
    #[serde(rename = "In Transit")]
    InTransit,
    #[serde(rename = "In Stock")]
    InStock,
    Allotted,
    Sold,
}

impl VehicleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InTransit => "In Transit",
            Self::InStock => "In Stock",
            Self::Allotted => "Allotted",
            Self::Sold => "Sold",
        }
    }
}

impl std::fmt::Display for VehicleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VehicleStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "In Transit" => Ok(Self::InTransit),
            "In Stock" => Ok(Self::InStock),
            "Allotted" => Ok(Self::Allotted),
            "Sold" => Ok(Self::Sold),
            _ => Err(format!("Invalid vehicle status: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: i64,
    pub chassis_no: String,
    pub engine_no: Option<String>,
    pub model: String,
    pub variant: String,
    pub color: String,
    pub status: VehicleStatus,
    pub branch_id: i64,
    /// Batch the unit arrived in, set by manifest ingestion.
    pub load_reference: Option<String>,
    /// Sales record the unit is allotted to, set by PDI completion.
    pub sale_id: Option<i64>,
    pub created_at: String,
    pub updated_at: String,
}

/// Ledger entry kinds. INWARD_OEM marks factory arrivals from manifest
/// ingestion; plain INWARD is the receiving half of an inter-branch transfer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum TxnType {
    #[serde(rename = "INWARD")]
    Inward,
    #[serde(rename = "INWARD_OEM")]
    InwardOem,
    #[serde(rename = "OUTWARD_TRANSFER")]
    OutwardTransfer,
    #[serde(rename = "SALE")]
    Sale,
}

impl TxnType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inward => "INWARD",
            Self::InwardOem => "INWARD_OEM",
            Self::OutwardTransfer => "OUTWARD_TRANSFER",
            Self::Sale => "SALE",
        }
    }
}

impl std::fmt::Display for TxnType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TxnType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "INWARD" => Ok(Self::Inward),
            "INWARD_OEM" => Ok(Self::InwardOem),
            "OUTWARD_TRANSFER" => Ok(Self::OutwardTransfer),
            "SALE" => Ok(Self::Sale),
            _ => Err(format!("Invalid transaction type: {}", s)),
        }
    }
}

/// Reconciliation state of a ledger row. Only OUTWARD_TRANSFER rows ever
/// sit at Pending; the matching receive flips them to Completed exactly once.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum TxnStatus {
    Pending,
    Completed,
}

impl TxnStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Completed => "Completed",
        }
    }
}

impl std::fmt::Display for TxnStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TxnStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Completed" => Ok(Self::Completed),
            _ => Err(format!("Invalid transaction status: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryTransaction {
    pub id: i64,
    pub txn_date: String,
    pub txn_type: TxnType,
    pub from_branch_id: Option<i64>,
    pub to_branch_id: Option<i64>,
    /// Branch owning this ledger row.
    pub branch_id: i64,
    pub chassis_no: Option<String>,
    pub model: String,
    pub variant: String,
    pub color: String,
    pub quantity: i64,
    pub load_number: Option<String>,
    pub status: TxnStatus,
    pub remarks: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum FulfillmentStatus {
    #[serde(rename = "PDI Pending")]
    PdiPending,
    #[serde(rename = "PDI In Progress")]
    PdiInProgress,
    #[serde(rename = "PDI Complete")]
    PdiComplete,
}

impl FulfillmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PdiPending => "PDI Pending",
            Self::PdiInProgress => "PDI In Progress",
            Self::PdiComplete => "PDI Complete",
        }
    }
}

impl std::fmt::Display for FulfillmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FulfillmentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PDI Pending" => Ok(Self::PdiPending),
            "PDI In Progress" => Ok(Self::PdiInProgress),
            "PDI Complete" => Ok(Self::PdiComplete),
            _ => Err(format!("Invalid fulfillment status: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SalesRecord {
    pub id: i64,
    pub customer_name: String,
    pub customer_phone: Option<String>,
    pub model: String,
    pub variant: String,
    pub color: String,
    pub branch_id: i64,
    pub fulfillment_status: FulfillmentStatus,
    pub mechanic_id: Option<i64>,
    /// Chassis of the allotted unit, set when PDI completes.
    pub chassis_no: Option<String>,
    pub sale_date: String,
    pub pdi_completed_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Role {
    Owner,
    #[serde(rename = "Back Office")]
    BackOffice,
    #[serde(rename = "PDI")]
    Pdi,
    Mechanic,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Owner => "Owner",
            Self::BackOffice => "Back Office",
            Self::Pdi => "PDI",
            Self::Mechanic => "Mechanic",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Owner" => Ok(Self::Owner),
            "Back Office" => Ok(Self::BackOffice),
            "PDI" => Ok(Self::Pdi),
            "Mechanic" => Ok(Self::Mechanic),
            _ => Err(format!("Invalid role: {}", s)),
        }
    }
}

/// A user row without its password; credential checks happen in SQL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub phone_number: String,
    pub role: Role,
    pub branch_id: i64,
}

/// Input for a direct vehicle insert (demo seed, manual stock entry).
#[derive(Debug, Clone)]
pub struct NewVehicle {
    pub chassis_no: String,
    pub engine_no: Option<String>,
    pub model: String,
    pub variant: String,
    pub color: String,
    pub status: VehicleStatus,
    pub branch_id: i64,
    pub load_reference: Option<String>,
}

/// One decoded manifest unit, ready for import.
#[derive(Debug, Clone, PartialEq)]
pub struct IncomingVehicle {
    pub chassis_no: String,
    pub engine_no: Option<String>,
    pub model: String,
    pub variant: String,
    pub color: String,
}

// ── Batch operation outcomes ──────────────────────────────────────

/// A unit a batch operation could not act on, with the reason.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkippedUnit {
    pub chassis_no: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferOutcome {
    pub load_number: String,
    pub accepted: Vec<String>,
    pub skipped: Vec<SkippedUnit>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaleOutcome {
    pub sold: Vec<String>,
    pub rejected: Vec<SkippedUnit>,
}

// ── API view types ────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverviewCounts {
    pub in_transit: i64,
    pub in_stock: i64,
    pub pdi_pending: i64,
    pub pdi_in_progress: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResults {
    pub vehicles: Vec<Vehicle>,
    pub sales: Vec<SalesRecord>,
}

/// A vehicle with its full ledger history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VehicleDetail {
    pub vehicle: Vehicle,
    pub history: Vec<InventoryTransaction>,
}

/// Request to open a sales record. `branch_id` defaults to the caller's
/// own branch when omitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSalesRecord {
    pub customer_name: String,
    #[serde(default)]
    pub customer_phone: Option<String>,
    pub model: String,
    #[serde(default)]
    pub variant: String,
    pub color: String,
    #[serde(default)]
    pub branch_id: Option<i64>,
}

/// The PDI workbench: open records plus what just shipped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PdiBoard {
    pub pending: Vec<SalesRecord>,
    pub in_progress: Vec<SalesRecord>,
    pub recently_completed: Vec<SalesRecord>,
}

// ── Report rows ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PdiSummaryRow {
    pub branch: String,
    pub stock: i64,
    pub pdi_pending: i64,
    pub pdi_in_progress: i64,
    pub pdi_completed: i64,
    /// Mean hours from sale to PDI completion, one decimal; None when no
    /// completions fall in the window.
    pub avg_hours: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockAgingRow {
    pub branch: String,
    pub days_0_30: i64,
    pub days_31_60: i64,
    pub days_61_90: i64,
    pub days_over_90: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyMovementRow {
    pub branch: String,
    pub sales: i64,
    pub transfers_out: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferSummaryRow {
    pub to_branch: String,
    pub quantity: i64,
    /// Distinct "model variant" labels moved, comma separated.
    pub models: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OemInwardRow {
    pub model: String,
    pub variant: String,
    pub color: String,
    pub quantity: i64,
}
