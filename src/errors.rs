//! Typed error hierarchy for the showroom services.
//!
//! Four top-level enums cover the four subsystems:
//! - `StockError` — transfer, receive, and manual-sale failures
//! - `PdiError` — sales-record fulfilment failures
//! - `IngestError` — mailbox and manifest-import failures
//! - `AuthError` — login and session failures

use thiserror::Error;

/// Errors from the stock movement subsystem (transfers and sales).
#[derive(Debug, Error)]
pub enum StockError {
    #[error("Branch {id} not found")]
    BranchNotFound { id: i64 },

    #[error("No vehicles in the batch were eligible for transfer")]
    EmptyBatch,

    #[error("No vehicles in the batch were eligible for sale")]
    NothingSold,

    #[error("Nothing to receive for load {load_number} at this branch")]
    NothingToReceive { load_number: String },

    #[error("Database error: {0}")]
    Database(#[source] anyhow::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Errors from the PDI fulfilment subsystem.
#[derive(Debug, Error)]
pub enum PdiError {
    #[error("Sales record {id} not found")]
    RecordNotFound { id: i64 },

    #[error("Branch {id} not found")]
    BranchNotFound { id: i64 },

    #[error("Sales record {id} is '{status}', expected '{expected}'")]
    WrongStatus {
        id: i64,
        status: String,
        expected: String,
    },

    #[error("User {id} is not a mechanic")]
    NotAMechanic { id: i64 },

    #[error("Vehicle {chassis_no} not found")]
    VehicleNotFound { chassis_no: String },

    #[error("Vehicle {chassis_no} is not in stock")]
    VehicleNotInStock { chassis_no: String },

    #[error("Vehicle {chassis_no} does not match the record ({expected})")]
    VehicleMismatch {
        chassis_no: String,
        expected: String,
    },

    #[error("Vehicle {chassis_no} is already allotted to another sale")]
    AlreadyAllotted { chassis_no: String },

    #[error("Database error: {0}")]
    Database(#[source] anyhow::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Errors from the load-ingestion subsystem. Connection and authentication
/// failures abort a sync run; everything below that level is handled
/// per-message inside the pipeline and never surfaces here.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("No mailbox configured for branch '{branch}'")]
    NoMailbox { branch: String },

    #[error("Mailbox connection to {host} failed: {source}")]
    Connect {
        host: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Mailbox login failed for {user}")]
    Login { user: String },

    #[error("Mailbox fetch failed: {0}")]
    Fetch(#[source] anyhow::Error),

    #[error("Database error: {0}")]
    Database(#[source] anyhow::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Errors from login and session validation.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid phone number or password")]
    InvalidCredentials,

    #[error("Session expired or unknown")]
    SessionInvalid,

    #[error("Role '{role}' may not perform this action")]
    Forbidden { role: String },

    #[error("Database error: {0}")]
    Database(#[source] anyhow::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
