use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result};
use rusqlite::{Connection, params};

use crate::models::*;

/// Async-safe handle to the operations database.
///
/// Wraps `OpsDb` behind `Arc<Mutex>` and runs all access on tokio's blocking
/// thread pool via `spawn_blocking`, preventing synchronous SQLite I/O from
/// tying up async worker threads. Because every access holds the one mutex,
/// compound read-then-write sequences inside a single closure are serialised
/// against all other callers.
#[derive(Clone)]
pub struct DbHandle {
    inner: Arc<std::sync::Mutex<OpsDb>>,
}

impl DbHandle {
    pub fn new(db: OpsDb) -> Self {
        Self {
            inner: Arc::new(std::sync::Mutex::new(db)),
        }
    }

    /// Run a closure with access to the database on a blocking thread.
    /// All data passed into `f` must be owned (`'static`).
    pub async fn call<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&OpsDb) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let db = self.inner.clone();
        tokio::task::spawn_blocking(move || {
            let guard = db
                .lock()
                .map_err(|e| anyhow::anyhow!("DB lock poisoned: {}", e))?;
            f(&guard)
        })
        .await
        .context("DB task panicked")?
    }

    /// Acquire the database mutex synchronously. Used where a blocking
    /// context already exists: CLI commands, startup seeding, and tests.
    /// Must not be called from a hot async path.
    pub fn lock_sync(&self) -> Result<std::sync::MutexGuard<'_, OpsDb>> {
        self.inner
            .lock()
            .map_err(|e| anyhow::anyhow!("DB lock poisoned: {}", e))
    }
}

pub struct OpsDb {
    conn: Connection,
}

impl OpsDb {
    /// Open (or create) a SQLite database at the given path and run migrations.
    pub fn new(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).context("Failed to open SQLite database")?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Create an in-memory SQLite database (for testing).
    pub fn new_in_memory() -> Result<Self> {
        let conn =
            Connection::open_in_memory().context("Failed to open in-memory SQLite database")?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    fn init(&self) -> Result<()> {
        self.conn
            .execute_batch("PRAGMA foreign_keys = ON;")
            .context("Failed to enable foreign keys")?;
        self.run_migrations().context("Failed to run migrations")?;
        Ok(())
    }

    fn run_migrations(&self) -> Result<()> {
        self.conn
            .execute_batch(
                "
                CREATE TABLE IF NOT EXISTS branches (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL UNIQUE,
                    head_branch_id INTEGER REFERENCES branches(id)
                );

                CREATE TABLE IF NOT EXISTS users (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    username TEXT NOT NULL,
                    phone_number TEXT NOT NULL UNIQUE,
                    password TEXT NOT NULL,
                    role TEXT NOT NULL,
                    branch_id INTEGER NOT NULL REFERENCES branches(id)
                );

                CREATE TABLE IF NOT EXISTS sessions (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    token_hash TEXT NOT NULL UNIQUE,
                    created_at TEXT NOT NULL DEFAULT (datetime('now')),
                    expires_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS transactions (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    txn_date TEXT NOT NULL DEFAULT (date('now')),
                    txn_type TEXT NOT NULL,
                    from_branch_id INTEGER REFERENCES branches(id),
                    to_branch_id INTEGER REFERENCES branches(id),
                    branch_id INTEGER NOT NULL REFERENCES branches(id),
                    chassis_no TEXT,
                    model TEXT NOT NULL DEFAULT '',
                    variant TEXT NOT NULL DEFAULT '',
                    color TEXT NOT NULL DEFAULT '',
                    quantity INTEGER NOT NULL DEFAULT 1,
                    load_number TEXT,
                    status TEXT NOT NULL DEFAULT 'Completed'
                );

                CREATE TABLE IF NOT EXISTS sales (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    customer_name TEXT NOT NULL,
                    customer_phone TEXT,
                    model TEXT NOT NULL DEFAULT '',
                    variant TEXT NOT NULL DEFAULT '',
                    color TEXT NOT NULL DEFAULT '',
                    branch_id INTEGER NOT NULL REFERENCES branches(id),
                    fulfillment_status TEXT NOT NULL DEFAULT 'PDI Pending',
                    mechanic_id INTEGER REFERENCES users(id),
                    chassis_no TEXT,
                    sale_date TEXT NOT NULL DEFAULT (datetime('now')),
                    pdi_completed_at TEXT
                );

                CREATE TABLE IF NOT EXISTS vehicles (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    chassis_no TEXT NOT NULL UNIQUE,
                    engine_no TEXT,
                    model TEXT NOT NULL DEFAULT '',
                    variant TEXT NOT NULL DEFAULT '',
                    color TEXT NOT NULL DEFAULT '',
                    status TEXT NOT NULL DEFAULT 'In Stock',
                    branch_id INTEGER NOT NULL REFERENCES branches(id),
                    load_reference TEXT,
                    created_at TEXT NOT NULL DEFAULT (datetime('now')),
                    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
                );

                CREATE TABLE IF NOT EXISTS model_codes (
                    model_code TEXT NOT NULL,
                    variant_code TEXT NOT NULL,
                    model TEXT NOT NULL,
                    variant TEXT NOT NULL,
                    PRIMARY KEY (model_code, variant_code)
                );

                CREATE TABLE IF NOT EXISTS color_codes (
                    color_code TEXT PRIMARY KEY,
                    color TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_vehicles_branch_status ON vehicles(branch_id, status);
                CREATE INDEX IF NOT EXISTS idx_vehicles_load ON vehicles(load_reference);
                CREATE INDEX IF NOT EXISTS idx_txns_load ON transactions(load_number, to_branch_id, status);
                CREATE INDEX IF NOT EXISTS idx_txns_date ON transactions(txn_date);
                CREATE INDEX IF NOT EXISTS idx_sales_branch_status ON sales(branch_id, fulfillment_status);
                ",
            )
            .context("Failed to create tables")?;

        // Additive migrations (columns are nullable, safe to re-run).
        // We only ignore "duplicate column" errors — any other error is propagated.
        match self
            .conn
            .execute("ALTER TABLE vehicles ADD COLUMN sale_id INTEGER REFERENCES sales(id)", [])
        {
            Ok(_) => {}
            Err(e) if e.to_string().contains("duplicate column") => {}
            Err(e) => return Err(anyhow::anyhow!("Failed to add sale_id column: {}", e)),
        }
        match self
            .conn
            .execute("ALTER TABLE transactions ADD COLUMN remarks TEXT", [])
        {
            Ok(_) => {}
            Err(e) if e.to_string().contains("duplicate column") => {}
            Err(e) => return Err(anyhow::anyhow!("Failed to add remarks column: {}", e)),
        }

        Ok(())
    }

    // ── Branches ──────────────────────────────────────────────────────

    pub fn create_branch(&self, name: &str, head_branch_id: Option<i64>) -> Result<Branch> {
        self.conn
            .execute(
                "INSERT INTO branches (name, head_branch_id) VALUES (?1, ?2)",
                params![name, head_branch_id],
            )
            .context("Failed to insert branch")?;
        let id = self.conn.last_insert_rowid();
        self.get_branch(id)?
            .context("Branch not found after insert")
    }

    pub fn get_branch(&self, id: i64) -> Result<Option<Branch>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, head_branch_id FROM branches WHERE id = ?1")
            .context("Failed to prepare get_branch")?;
        let mut rows = stmt
            .query_map(params![id], |row| {
                Ok(Branch {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    head_branch_id: row.get(2)?,
                })
            })
            .context("Failed to query branch")?;
        match rows.next() {
            Some(row) => Ok(Some(row.context("Failed to read branch row")?)),
            None => Ok(None),
        }
    }

    pub fn get_branch_by_name(&self, name: &str) -> Result<Option<Branch>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, head_branch_id FROM branches WHERE name = ?1")
            .context("Failed to prepare get_branch_by_name")?;
        let mut rows = stmt
            .query_map(params![name], |row| {
                Ok(Branch {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    head_branch_id: row.get(2)?,
                })
            })
            .context("Failed to query branch by name")?;
        match rows.next() {
            Some(row) => Ok(Some(row.context("Failed to read branch row")?)),
            None => Ok(None),
        }
    }

    /// Ids of the branches reporting to the given head branch.
    pub fn sub_branch_ids(&self, head_branch_id: i64) -> Result<Vec<i64>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id FROM branches WHERE head_branch_id = ?1 ORDER BY id")
            .context("Failed to prepare sub_branch_ids")?;
        let rows = stmt
            .query_map(params![head_branch_id], |row| row.get(0))
            .context("Failed to query sub-branches")?;
        let mut ids = Vec::new();
        for row in rows {
            ids.push(row.context("Failed to read sub-branch row")?);
        }
        Ok(ids)
    }

    // ── Users & sessions ──────────────────────────────────────────────

    pub fn create_user(
        &self,
        username: &str,
        phone_number: &str,
        password_hash: &str,
        role: &Role,
        branch_id: i64,
    ) -> Result<User> {
        self.conn
            .execute(
                "INSERT INTO users (username, phone_number, password, role, branch_id)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![username, phone_number, password_hash, role.as_str(), branch_id],
            )
            .context("Failed to insert user")?;
        let id = self.conn.last_insert_rowid();
        self.get_user(id)?.context("User not found after insert")
    }

    pub fn get_user(&self, id: i64) -> Result<Option<User>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, username, phone_number, role, branch_id FROM users WHERE id = ?1",
            )
            .context("Failed to prepare get_user")?;
        let mut rows = stmt
            .query_map(params![id], |row| {
                Ok(UserRow {
                    id: row.get(0)?,
                    username: row.get(1)?,
                    phone_number: row.get(2)?,
                    role: row.get(3)?,
                    branch_id: row.get(4)?,
                })
            })
            .context("Failed to query user")?;
        match rows.next() {
            Some(row) => {
                let r = row.context("Failed to read user row")?;
                Ok(Some(r.into_user()?))
            }
            None => Ok(None),
        }
    }

    /// Check credentials against the stored password hash. Returns the user
    /// on a match, `None` otherwise (unknown number and wrong password are
    /// indistinguishable to the caller).
    pub fn verify_login(&self, phone_number: &str, password_hash: &str) -> Result<Option<User>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, username, phone_number, role, branch_id FROM users
                 WHERE phone_number = ?1 AND password = ?2",
            )
            .context("Failed to prepare verify_login")?;
        let mut rows = stmt
            .query_map(params![phone_number, password_hash], |row| {
                Ok(UserRow {
                    id: row.get(0)?,
                    username: row.get(1)?,
                    phone_number: row.get(2)?,
                    role: row.get(3)?,
                    branch_id: row.get(4)?,
                })
            })
            .context("Failed to query login")?;
        match rows.next() {
            Some(row) => {
                let r = row.context("Failed to read user row")?;
                Ok(Some(r.into_user()?))
            }
            None => Ok(None),
        }
    }

    pub fn create_session(&self, user_id: i64, token_hash: &str, expires_at: &str) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO sessions (user_id, token_hash, expires_at) VALUES (?1, ?2, ?3)",
                params![user_id, token_hash, expires_at],
            )
            .context("Failed to insert session")?;
        Ok(())
    }

    /// Resolve a token hash to its user, ignoring expired sessions.
    pub fn session_user(&self, token_hash: &str) -> Result<Option<User>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT u.id, u.username, u.phone_number, u.role, u.branch_id
                 FROM sessions s JOIN users u ON u.id = s.user_id
                 WHERE s.token_hash = ?1 AND s.expires_at > datetime('now')",
            )
            .context("Failed to prepare session_user")?;
        let mut rows = stmt
            .query_map(params![token_hash], |row| {
                Ok(UserRow {
                    id: row.get(0)?,
                    username: row.get(1)?,
                    phone_number: row.get(2)?,
                    role: row.get(3)?,
                    branch_id: row.get(4)?,
                })
            })
            .context("Failed to query session")?;
        match rows.next() {
            Some(row) => {
                let r = row.context("Failed to read session user row")?;
                Ok(Some(r.into_user()?))
            }
            None => Ok(None),
        }
    }

    pub fn delete_session(&self, token_hash: &str) -> Result<bool> {
        let changed = self
            .conn
            .execute("DELETE FROM sessions WHERE token_hash = ?1", params![token_hash])
            .context("Failed to delete session")?;
        Ok(changed > 0)
    }

    pub fn purge_expired_sessions(&self) -> Result<usize> {
        self.conn
            .execute("DELETE FROM sessions WHERE expires_at <= datetime('now')", [])
            .context("Failed to purge expired sessions")
    }

    // ── Vehicles ──────────────────────────────────────────────────────

    pub fn create_vehicle(&self, vehicle: &NewVehicle) -> Result<Vehicle> {
        self.conn
            .execute(
                "INSERT INTO vehicles (chassis_no, engine_no, model, variant, color, status, branch_id, load_reference)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    vehicle.chassis_no,
                    vehicle.engine_no,
                    vehicle.model,
                    vehicle.variant,
                    vehicle.color,
                    vehicle.status.as_str(),
                    vehicle.branch_id,
                    vehicle.load_reference,
                ],
            )
            .context("Failed to insert vehicle")?;
        self.get_vehicle_by_chassis(&vehicle.chassis_no)?
            .context("Vehicle not found after insert")
    }

    pub fn get_vehicle_by_chassis(&self, chassis_no: &str) -> Result<Option<Vehicle>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{} WHERE chassis_no = ?1", VEHICLE_SELECT))
            .context("Failed to prepare get_vehicle_by_chassis")?;
        let mut rows = stmt
            .query_map(params![chassis_no], vehicle_row)
            .context("Failed to query vehicle")?;
        match rows.next() {
            Some(row) => {
                let r = row.context("Failed to read vehicle row")?;
                Ok(Some(r.into_vehicle()?))
            }
            None => Ok(None),
        }
    }

    /// Vehicles within the given branches, newest first, optionally filtered
    /// by status. An empty branch list yields no rows.
    pub fn list_vehicles(
        &self,
        branch_ids: &[i64],
        status: Option<&VehicleStatus>,
    ) -> Result<Vec<Vehicle>> {
        if branch_ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut sql = format!(
            "{} WHERE branch_id IN ({})",
            VEHICLE_SELECT,
            id_list(branch_ids)
        );
        if status.is_some() {
            sql.push_str(" AND status = ?1");
        }
        sql.push_str(" ORDER BY id DESC");

        let mut stmt = self.conn.prepare(&sql).context("Failed to prepare list_vehicles")?;
        let mut raw = Vec::new();
        match status {
            Some(s) => {
                let rows = stmt
                    .query_map(params![s.as_str()], vehicle_row)
                    .context("Failed to query vehicles")?;
                for row in rows {
                    raw.push(row.context("Failed to read vehicle row")?);
                }
            }
            None => {
                let rows = stmt
                    .query_map([], vehicle_row)
                    .context("Failed to query vehicles")?;
                for row in rows {
                    raw.push(row.context("Failed to read vehicle row")?);
                }
            }
        }
        let mut vehicles = Vec::new();
        for r in raw {
            vehicles.push(r.into_vehicle()?);
        }
        Ok(vehicles)
    }

    /// Full ledger history for one chassis, oldest first.
    pub fn vehicle_history(&self, chassis_no: &str) -> Result<Vec<InventoryTransaction>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{} WHERE chassis_no = ?1 ORDER BY id", TXN_SELECT))
            .context("Failed to prepare vehicle_history")?;
        let rows = stmt
            .query_map(params![chassis_no], txn_row)
            .context("Failed to query vehicle history")?;
        let mut txns = Vec::new();
        for row in rows {
            let r = row.context("Failed to read transaction row")?;
            txns.push(r.into_transaction()?);
        }
        Ok(txns)
    }

    /// Whether any vehicle already carries this load reference. The
    /// ingestion dedup guard: a re-scanned manifest is skipped wholesale.
    pub fn load_reference_exists(&self, load_reference: &str) -> Result<bool> {
        let count: i64 = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM vehicles WHERE load_reference = ?1",
                params![load_reference],
                |row| row.get(0),
            )
            .context("Failed to check load reference")?;
        Ok(count > 0)
    }

    pub fn chassis_exists(&self, chassis_no: &str) -> Result<bool> {
        let count: i64 = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM vehicles WHERE chassis_no = ?1",
                params![chassis_no],
                |row| row.get(0),
            )
            .context("Failed to check chassis")?;
        Ok(count > 0)
    }

    // ── Manifest import ───────────────────────────────────────────────

    /// Insert one manifest's decoded units as In Transit stock, with an
    /// INWARD_OEM ledger row per distinct model/variant/color. Units whose
    /// chassis already exists are skipped (the load-level dedup guard is
    /// coarser than chassis granularity). Returns the number of vehicles
    /// added. All-or-nothing per manifest.
    pub fn import_manifest(
        &self,
        branch_id: i64,
        load_reference: &str,
        units: &[IncomingVehicle],
    ) -> Result<usize> {
        // Safety: DbHandle's Mutex already guarantees single-threaded access.
        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to begin transaction")?;

        let mut added = 0usize;
        let mut combos: BTreeMap<(String, String, String), i64> = BTreeMap::new();
        for unit in units {
            if self.chassis_exists(&unit.chassis_no)? {
                continue;
            }
            tx.execute(
                "INSERT INTO vehicles (chassis_no, engine_no, model, variant, color, status, branch_id, load_reference)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    unit.chassis_no,
                    unit.engine_no,
                    unit.model,
                    unit.variant,
                    unit.color,
                    VehicleStatus::InTransit.as_str(),
                    branch_id,
                    load_reference,
                ],
            )
            .context("Failed to insert manifest vehicle")?;
            added += 1;
            *combos
                .entry((unit.model.clone(), unit.variant.clone(), unit.color.clone()))
                .or_insert(0) += 1;
        }

        for ((model, variant, color), quantity) in &combos {
            insert_transaction(
                &tx,
                &NewTxn {
                    txn_type: TxnType::InwardOem,
                    from_branch_id: None,
                    to_branch_id: Some(branch_id),
                    branch_id,
                    chassis_no: None,
                    model,
                    variant,
                    color,
                    quantity: *quantity,
                    load_number: Some(load_reference),
                    status: TxnStatus::Completed,
                    remarks: None,
                },
            )?;
        }

        tx.commit().context("Failed to commit manifest import")?;
        Ok(added)
    }

    // ── Transfers & sales ─────────────────────────────────────────────

    /// Write one Pending OUTWARD_TRANSFER row per eligible chassis, all
    /// sharing `load_number`, and flip those vehicles to In Transit. A unit
    /// must exist, be In Stock, sit inside the caller's scope, and not
    /// already be at the destination; ineligible units are skipped with a
    /// reason. All accepted writes commit together.
    pub fn create_transfer_batch(
        &self,
        chassis: &[String],
        to_branch_id: i64,
        scope_ids: &[i64],
        load_number: &str,
        remarks: Option<&str>,
    ) -> Result<TransferOutcome> {
        // Safety: DbHandle's Mutex already guarantees single-threaded access.
        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to begin transaction")?;

        let mut accepted = Vec::new();
        let mut skipped = Vec::new();
        for chassis_no in chassis {
            let Some(vehicle) = self.get_vehicle_by_chassis(chassis_no)? else {
                skipped.push(SkippedUnit {
                    chassis_no: chassis_no.clone(),
                    reason: "not found".to_string(),
                });
                continue;
            };
            if !scope_ids.contains(&vehicle.branch_id) {
                skipped.push(SkippedUnit {
                    chassis_no: chassis_no.clone(),
                    reason: "outside your branch scope".to_string(),
                });
                continue;
            }
            if vehicle.status != VehicleStatus::InStock {
                skipped.push(SkippedUnit {
                    chassis_no: chassis_no.clone(),
                    reason: format!("not in stock (currently {})", vehicle.status),
                });
                continue;
            }
            if vehicle.branch_id == to_branch_id {
                skipped.push(SkippedUnit {
                    chassis_no: chassis_no.clone(),
                    reason: "already at the destination branch".to_string(),
                });
                continue;
            }

            insert_transaction(
                &tx,
                &NewTxn {
                    txn_type: TxnType::OutwardTransfer,
                    from_branch_id: Some(vehicle.branch_id),
                    to_branch_id: Some(to_branch_id),
                    branch_id: vehicle.branch_id,
                    chassis_no: Some(chassis_no),
                    model: &vehicle.model,
                    variant: &vehicle.variant,
                    color: &vehicle.color,
                    quantity: 1,
                    load_number: Some(load_number),
                    status: TxnStatus::Pending,
                    remarks,
                },
            )?;
            tx.execute(
                "UPDATE vehicles SET status = ?1, updated_at = datetime('now') WHERE chassis_no = ?2",
                params![VehicleStatus::InTransit.as_str(), chassis_no],
            )
            .context("Failed to mark vehicle in transit")?;
            accepted.push(chassis_no.clone());
        }

        tx.commit().context("Failed to commit transfer batch")?;
        Ok(TransferOutcome {
            load_number: load_number.to_string(),
            accepted,
            skipped,
        })
    }

    /// Complete every Pending OUTWARD_TRANSFER row addressed to
    /// `to_branch_id` under `load_number`: pair each with a Completed INWARD
    /// row, flip the outward row to Completed, and land the vehicle In Stock
    /// at the receiving branch. Returns the number of units received; 0 means
    /// nothing was pending (already received, or wrong branch). Re-receiving
    /// is a no-op because the selection filters on Pending.
    pub fn receive_load(&self, load_number: &str, to_branch_id: i64) -> Result<usize> {
        struct PendingRow {
            id: i64,
            chassis_no: Option<String>,
            from_branch_id: Option<i64>,
            model: String,
            variant: String,
            color: String,
            quantity: i64,
        }

        // Safety: DbHandle's Mutex already guarantees single-threaded access.
        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to begin transaction")?;

        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, chassis_no, from_branch_id, model, variant, color, quantity
                 FROM transactions
                 WHERE load_number = ?1 AND to_branch_id = ?2
                   AND txn_type = 'OUTWARD_TRANSFER' AND status = 'Pending'
                 ORDER BY id",
            )
            .context("Failed to prepare receive_load")?;
        let rows = stmt
            .query_map(params![load_number, to_branch_id], |row| {
                Ok(PendingRow {
                    id: row.get(0)?,
                    chassis_no: row.get(1)?,
                    from_branch_id: row.get(2)?,
                    model: row.get(3)?,
                    variant: row.get(4)?,
                    color: row.get(5)?,
                    quantity: row.get(6)?,
                })
            })
            .context("Failed to query pending transfers")?;
        let mut pending = Vec::new();
        for row in rows {
            pending.push(row.context("Failed to read pending transfer row")?);
        }
        drop(stmt);

        for row in &pending {
            insert_transaction(
                &tx,
                &NewTxn {
                    txn_type: TxnType::Inward,
                    from_branch_id: row.from_branch_id,
                    to_branch_id: Some(to_branch_id),
                    branch_id: to_branch_id,
                    chassis_no: row.chassis_no.as_deref(),
                    model: &row.model,
                    variant: &row.variant,
                    color: &row.color,
                    quantity: row.quantity,
                    load_number: Some(load_number),
                    status: TxnStatus::Completed,
                    remarks: None,
                },
            )?;
            tx.execute(
                "UPDATE transactions SET status = 'Completed' WHERE id = ?1",
                params![row.id],
            )
            .context("Failed to complete outward transaction")?;
            if let Some(chassis_no) = &row.chassis_no {
                tx.execute(
                    "UPDATE vehicles SET status = ?1, branch_id = ?2, updated_at = datetime('now')
                     WHERE chassis_no = ?3",
                    params![VehicleStatus::InStock.as_str(), to_branch_id, chassis_no],
                )
                .context("Failed to land vehicle at destination")?;
            }
        }

        tx.commit().context("Failed to commit receive")?;
        Ok(pending.len())
    }

    /// Best-effort manual sale: each eligible chassis flips to Sold with one
    /// SALE ledger row (quantity 1); ineligible chassis are rejected with a
    /// reason. Accepted writes commit together.
    pub fn record_manual_sale(
        &self,
        chassis: &[String],
        scope_ids: &[i64],
        remarks: Option<&str>,
    ) -> Result<SaleOutcome> {
        // Safety: DbHandle's Mutex already guarantees single-threaded access.
        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to begin transaction")?;

        let mut sold = Vec::new();
        let mut rejected = Vec::new();
        for chassis_no in chassis {
            let Some(vehicle) = self.get_vehicle_by_chassis(chassis_no)? else {
                rejected.push(SkippedUnit {
                    chassis_no: chassis_no.clone(),
                    reason: "not found".to_string(),
                });
                continue;
            };
            if !scope_ids.contains(&vehicle.branch_id) {
                rejected.push(SkippedUnit {
                    chassis_no: chassis_no.clone(),
                    reason: "outside your branch scope".to_string(),
                });
                continue;
            }
            if vehicle.status != VehicleStatus::InStock {
                rejected.push(SkippedUnit {
                    chassis_no: chassis_no.clone(),
                    reason: format!("not in stock (currently {})", vehicle.status),
                });
                continue;
            }

            tx.execute(
                "UPDATE vehicles SET status = ?1, updated_at = datetime('now') WHERE chassis_no = ?2",
                params![VehicleStatus::Sold.as_str(), chassis_no],
            )
            .context("Failed to mark vehicle sold")?;
            insert_transaction(
                &tx,
                &NewTxn {
                    txn_type: TxnType::Sale,
                    from_branch_id: Some(vehicle.branch_id),
                    to_branch_id: None,
                    branch_id: vehicle.branch_id,
                    chassis_no: Some(chassis_no),
                    model: &vehicle.model,
                    variant: &vehicle.variant,
                    color: &vehicle.color,
                    quantity: 1,
                    load_number: None,
                    status: TxnStatus::Completed,
                    remarks,
                },
            )?;
            sold.push(chassis_no.clone());
        }

        tx.commit().context("Failed to commit manual sale")?;
        Ok(SaleOutcome { sold, rejected })
    }

    // ── Sales records (PDI) ───────────────────────────────────────────

    pub fn create_sales_record(
        &self,
        customer_name: &str,
        customer_phone: Option<&str>,
        model: &str,
        variant: &str,
        color: &str,
        branch_id: i64,
    ) -> Result<SalesRecord> {
        self.conn
            .execute(
                "INSERT INTO sales (customer_name, customer_phone, model, variant, color, branch_id)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![customer_name, customer_phone, model, variant, color, branch_id],
            )
            .context("Failed to insert sales record")?;
        let id = self.conn.last_insert_rowid();
        self.get_sales_record(id)?
            .context("Sales record not found after insert")
    }

    pub fn get_sales_record(&self, id: i64) -> Result<Option<SalesRecord>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{} WHERE id = ?1", SALE_SELECT))
            .context("Failed to prepare get_sales_record")?;
        let mut rows = stmt
            .query_map(params![id], sale_row)
            .context("Failed to query sales record")?;
        match rows.next() {
            Some(row) => {
                let r = row.context("Failed to read sales row")?;
                Ok(Some(r.into_sales_record()?))
            }
            None => Ok(None),
        }
    }

    pub fn list_sales_records(
        &self,
        branch_ids: &[i64],
        status: Option<&FulfillmentStatus>,
    ) -> Result<Vec<SalesRecord>> {
        if branch_ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut sql = format!("{} WHERE branch_id IN ({})", SALE_SELECT, id_list(branch_ids));
        if status.is_some() {
            sql.push_str(" AND fulfillment_status = ?1");
        }
        sql.push_str(" ORDER BY id DESC");

        let mut stmt = self
            .conn
            .prepare(&sql)
            .context("Failed to prepare list_sales_records")?;
        let mut raw = Vec::new();
        match status {
            Some(s) => {
                let rows = stmt
                    .query_map(params![s.as_str()], sale_row)
                    .context("Failed to query sales records")?;
                for row in rows {
                    raw.push(row.context("Failed to read sales row")?);
                }
            }
            None => {
                let rows = stmt
                    .query_map([], sale_row)
                    .context("Failed to query sales records")?;
                for row in rows {
                    raw.push(row.context("Failed to read sales row")?);
                }
            }
        }
        let mut records = Vec::new();
        for r in raw {
            records.push(r.into_sales_record()?);
        }
        Ok(records)
    }

    /// Records whose PDI finished within the last two days, newest first.
    pub fn recently_completed_records(&self, branch_ids: &[i64]) -> Result<Vec<SalesRecord>> {
        if branch_ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "{} WHERE branch_id IN ({}) AND fulfillment_status = 'PDI Complete'
               AND pdi_completed_at >= datetime('now', '-2 days')
             ORDER BY pdi_completed_at DESC",
            SALE_SELECT,
            id_list(branch_ids)
        );
        let mut stmt = self
            .conn
            .prepare(&sql)
            .context("Failed to prepare recently_completed_records")?;
        let rows = stmt
            .query_map([], sale_row)
            .context("Failed to query recent completions")?;
        let mut records = Vec::new();
        for row in rows {
            let r = row.context("Failed to read sales row")?;
            records.push(r.into_sales_record()?);
        }
        Ok(records)
    }

    pub fn set_sales_mechanic(&self, id: i64, mechanic_id: i64) -> Result<SalesRecord> {
        self.conn
            .execute(
                "UPDATE sales SET mechanic_id = ?1, fulfillment_status = ?2 WHERE id = ?3",
                params![mechanic_id, FulfillmentStatus::PdiInProgress.as_str(), id],
            )
            .context("Failed to assign mechanic")?;
        self.get_sales_record(id)?
            .context("Sales record not found after assignment")
    }

    /// Allot a vehicle to a sales record: the vehicle flips to Allotted with
    /// `sale_id` linked, the record flips to PDI Complete with the chassis
    /// and completion time set. One transaction.
    pub fn allot_vehicle(&self, record_id: i64, chassis_no: &str) -> Result<()> {
        // Safety: DbHandle's Mutex already guarantees single-threaded access.
        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to begin transaction")?;
        tx.execute(
            "UPDATE vehicles SET status = ?1, sale_id = ?2, updated_at = datetime('now')
             WHERE chassis_no = ?3",
            params![VehicleStatus::Allotted.as_str(), record_id, chassis_no],
        )
        .context("Failed to allot vehicle")?;
        tx.execute(
            "UPDATE sales SET fulfillment_status = ?1, chassis_no = ?2,
                 pdi_completed_at = datetime('now')
             WHERE id = ?3",
            params![FulfillmentStatus::PdiComplete.as_str(), chassis_no, record_id],
        )
        .context("Failed to complete sales record")?;
        tx.commit().context("Failed to commit allotment")?;
        Ok(())
    }

    // ── Overview & search ─────────────────────────────────────────────

    pub fn overview_counts(&self, branch_ids: &[i64]) -> Result<OverviewCounts> {
        if branch_ids.is_empty() {
            return Ok(OverviewCounts {
                in_transit: 0,
                in_stock: 0,
                pdi_pending: 0,
                pdi_in_progress: 0,
            });
        }
        let ids = id_list(branch_ids);
        let vehicle_count = |status: &VehicleStatus| -> Result<i64> {
            self.conn
                .query_row(
                    &format!(
                        "SELECT COUNT(*) FROM vehicles WHERE status = ?1 AND branch_id IN ({})",
                        ids
                    ),
                    params![status.as_str()],
                    |row| row.get(0),
                )
                .context("Failed to count vehicles")
        };
        let sales_count = |status: &FulfillmentStatus| -> Result<i64> {
            self.conn
                .query_row(
                    &format!(
                        "SELECT COUNT(*) FROM sales WHERE fulfillment_status = ?1 AND branch_id IN ({})",
                        ids
                    ),
                    params![status.as_str()],
                    |row| row.get(0),
                )
                .context("Failed to count sales records")
        };
        Ok(OverviewCounts {
            in_transit: vehicle_count(&VehicleStatus::InTransit)?,
            in_stock: vehicle_count(&VehicleStatus::InStock)?,
            pdi_pending: sales_count(&FulfillmentStatus::PdiPending)?,
            pdi_in_progress: sales_count(&FulfillmentStatus::PdiInProgress)?,
        })
    }

    pub fn search_vehicles(&self, branch_ids: &[i64], q: &str, limit: i64) -> Result<Vec<Vehicle>> {
        if branch_ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "{} WHERE branch_id IN ({})
               AND (chassis_no LIKE '%' || ?1 || '%'
                    OR engine_no LIKE '%' || ?1 || '%'
                    OR model LIKE '%' || ?1 || '%')
             ORDER BY id DESC LIMIT ?2",
            VEHICLE_SELECT,
            id_list(branch_ids)
        );
        let mut stmt = self.conn.prepare(&sql).context("Failed to prepare search_vehicles")?;
        let rows = stmt
            .query_map(params![q, limit], vehicle_row)
            .context("Failed to search vehicles")?;
        let mut vehicles = Vec::new();
        for row in rows {
            let r = row.context("Failed to read vehicle row")?;
            vehicles.push(r.into_vehicle()?);
        }
        Ok(vehicles)
    }

    pub fn search_sales(&self, branch_ids: &[i64], q: &str, limit: i64) -> Result<Vec<SalesRecord>> {
        if branch_ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "{} WHERE branch_id IN ({})
               AND (customer_name LIKE '%' || ?1 || '%'
                    OR chassis_no LIKE '%' || ?1 || '%')
             ORDER BY id DESC LIMIT ?2",
            SALE_SELECT,
            id_list(branch_ids)
        );
        let mut stmt = self.conn.prepare(&sql).context("Failed to prepare search_sales")?;
        let rows = stmt
            .query_map(params![q, limit], sale_row)
            .context("Failed to search sales records")?;
        let mut records = Vec::new();
        for row in rows {
            let r = row.context("Failed to read sales row")?;
            records.push(r.into_sales_record()?);
        }
        Ok(records)
    }

    // ── Reports ───────────────────────────────────────────────────────

    /// Per-branch PDI summary. Completed counts and the average hours from
    /// sale to completion honour the optional date window; stock and open
    /// PDI counts are always current.
    pub fn pdi_summary(
        &self,
        branch_ids: &[i64],
        from: Option<&str>,
        to: Option<&str>,
    ) -> Result<Vec<PdiSummaryRow>> {
        let from = from.unwrap_or("0001-01-01");
        let to = to.unwrap_or("9999-12-31");
        let mut rows = Vec::new();
        for (branch_id, branch) in self.scope_branches(branch_ids)? {
            let stock: i64 = self
                .conn
                .query_row(
                    "SELECT COUNT(*) FROM vehicles WHERE branch_id = ?1 AND status = 'In Stock'",
                    params![branch_id],
                    |row| row.get(0),
                )
                .context("Failed to count stock")?;
            let count_status = |status: &str| -> Result<i64> {
                self.conn
                    .query_row(
                        "SELECT COUNT(*) FROM sales WHERE branch_id = ?1 AND fulfillment_status = ?2",
                        params![branch_id, status],
                        |row| row.get(0),
                    )
                    .context("Failed to count sales by status")
            };
            let (pdi_completed, avg_hours): (i64, Option<f64>) = self
                .conn
                .query_row(
                    "SELECT COUNT(*),
                            AVG((julianday(pdi_completed_at) - julianday(sale_date)) * 24.0)
                     FROM sales
                     WHERE branch_id = ?1 AND fulfillment_status = 'PDI Complete'
                       AND date(pdi_completed_at) BETWEEN ?2 AND ?3",
                    params![branch_id, from, to],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .context("Failed to aggregate completions")?;

            rows.push(PdiSummaryRow {
                branch,
                stock,
                pdi_pending: count_status(FulfillmentStatus::PdiPending.as_str())?,
                pdi_in_progress: count_status(FulfillmentStatus::PdiInProgress.as_str())?,
                pdi_completed,
                avg_hours: avg_hours.map(|h| (h * 10.0).round() / 10.0),
            });
        }
        Ok(rows)
    }

    /// In Stock vehicles bucketed by days since arrival, per branch.
    pub fn stock_aging(&self, branch_ids: &[i64]) -> Result<Vec<StockAgingRow>> {
        if branch_ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT b.name,
                    SUM(CASE WHEN julianday('now') - julianday(v.created_at) <= 30 THEN 1 ELSE 0 END),
                    SUM(CASE WHEN julianday('now') - julianday(v.created_at) > 30
                             AND julianday('now') - julianday(v.created_at) <= 60 THEN 1 ELSE 0 END),
                    SUM(CASE WHEN julianday('now') - julianday(v.created_at) > 60
                             AND julianday('now') - julianday(v.created_at) <= 90 THEN 1 ELSE 0 END),
                    SUM(CASE WHEN julianday('now') - julianday(v.created_at) > 90 THEN 1 ELSE 0 END)
             FROM vehicles v JOIN branches b ON b.id = v.branch_id
             WHERE v.status = 'In Stock' AND v.branch_id IN ({})
             GROUP BY b.name ORDER BY b.name",
            id_list(branch_ids)
        );
        let mut stmt = self.conn.prepare(&sql).context("Failed to prepare stock_aging")?;
        let rows = stmt
            .query_map([], |row| {
                Ok(StockAgingRow {
                    branch: row.get(0)?,
                    days_0_30: row.get(1)?,
                    days_31_60: row.get(2)?,
                    days_61_90: row.get(3)?,
                    days_over_90: row.get(4)?,
                })
            })
            .context("Failed to query stock aging")?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row.context("Failed to read stock aging row")?);
        }
        Ok(out)
    }

    /// Sale and outward-transfer counts per branch for one date.
    pub fn daily_movement(&self, branch_ids: &[i64], date: &str) -> Result<Vec<DailyMovementRow>> {
        if branch_ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT b.name,
                    SUM(CASE WHEN t.txn_type = 'SALE' THEN t.quantity ELSE 0 END),
                    SUM(CASE WHEN t.txn_type = 'OUTWARD_TRANSFER' THEN t.quantity ELSE 0 END)
             FROM transactions t JOIN branches b ON b.id = t.branch_id
             WHERE t.txn_date = ?1 AND t.branch_id IN ({})
             GROUP BY b.name ORDER BY b.name",
            id_list(branch_ids)
        );
        let mut stmt = self.conn.prepare(&sql).context("Failed to prepare daily_movement")?;
        let rows = stmt
            .query_map(params![date], |row| {
                Ok(DailyMovementRow {
                    branch: row.get(0)?,
                    sales: row.get(1)?,
                    transfers_out: row.get(2)?,
                })
            })
            .context("Failed to query daily movement")?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row.context("Failed to read daily movement row")?);
        }
        Ok(out)
    }

    /// Outward transfers in a date window grouped by destination branch.
    pub fn transfer_summary(
        &self,
        branch_ids: &[i64],
        from: Option<&str>,
        to: Option<&str>,
    ) -> Result<Vec<TransferSummaryRow>> {
        if branch_ids.is_empty() {
            return Ok(Vec::new());
        }
        let from = from.unwrap_or("0001-01-01");
        let to = to.unwrap_or("9999-12-31");
        let sql = format!(
            "SELECT b.name, SUM(t.quantity),
                    GROUP_CONCAT(DISTINCT t.model ||
                        CASE WHEN t.variant = '' THEN '' ELSE ' ' || t.variant END)
             FROM transactions t JOIN branches b ON b.id = t.to_branch_id
             WHERE t.txn_type = 'OUTWARD_TRANSFER' AND t.txn_date BETWEEN ?1 AND ?2
               AND t.branch_id IN ({})
             GROUP BY b.name ORDER BY b.name",
            id_list(branch_ids)
        );
        let mut stmt = self
            .conn
            .prepare(&sql)
            .context("Failed to prepare transfer_summary")?;
        let rows = stmt
            .query_map(params![from, to], |row| {
                Ok(TransferSummaryRow {
                    to_branch: row.get(0)?,
                    quantity: row.get(1)?,
                    models: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                })
            })
            .context("Failed to query transfer summary")?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row.context("Failed to read transfer summary row")?);
        }
        Ok(out)
    }

    /// Factory arrivals in a date window grouped by model/variant/color.
    pub fn oem_inward_summary(
        &self,
        branch_ids: &[i64],
        from: Option<&str>,
        to: Option<&str>,
    ) -> Result<Vec<OemInwardRow>> {
        if branch_ids.is_empty() {
            return Ok(Vec::new());
        }
        let from = from.unwrap_or("0001-01-01");
        let to = to.unwrap_or("9999-12-31");
        let sql = format!(
            "SELECT model, variant, color, SUM(quantity)
             FROM transactions
             WHERE txn_type = 'INWARD_OEM' AND txn_date BETWEEN ?1 AND ?2
               AND branch_id IN ({})
             GROUP BY model, variant, color ORDER BY model, variant, color",
            id_list(branch_ids)
        );
        let mut stmt = self
            .conn
            .prepare(&sql)
            .context("Failed to prepare oem_inward_summary")?;
        let rows = stmt
            .query_map(params![from, to], |row| {
                Ok(OemInwardRow {
                    model: row.get(0)?,
                    variant: row.get(1)?,
                    color: row.get(2)?,
                    quantity: row.get(3)?,
                })
            })
            .context("Failed to query OEM inward summary")?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row.context("Failed to read OEM inward row")?);
        }
        Ok(out)
    }

    fn scope_branches(&self, branch_ids: &[i64]) -> Result<Vec<(i64, String)>> {
        if branch_ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT id, name FROM branches WHERE id IN ({}) ORDER BY name",
            id_list(branch_ids)
        );
        let mut stmt = self.conn.prepare(&sql).context("Failed to prepare scope_branches")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
            .context("Failed to query scope branches")?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row.context("Failed to read branch row")?);
        }
        Ok(out)
    }

    // ── Code books ────────────────────────────────────────────────────

    pub fn upsert_model_code(
        &self,
        model_code: &str,
        variant_code: &str,
        model: &str,
        variant: &str,
    ) -> Result<()> {
        self.conn
            .execute(
                "INSERT OR REPLACE INTO model_codes (model_code, variant_code, model, variant)
                 VALUES (?1, ?2, ?3, ?4)",
                params![model_code, variant_code, model, variant],
            )
            .context("Failed to upsert model code")?;
        Ok(())
    }

    pub fn upsert_color_code(&self, color_code: &str, color: &str) -> Result<()> {
        self.conn
            .execute(
                "INSERT OR REPLACE INTO color_codes (color_code, color) VALUES (?1, ?2)",
                params![color_code, color],
            )
            .context("Failed to upsert color code")?;
        Ok(())
    }

    pub fn model_code_rows(&self) -> Result<Vec<(String, String, String, String)>> {
        let mut stmt = self
            .conn
            .prepare("SELECT model_code, variant_code, model, variant FROM model_codes")
            .context("Failed to prepare model_code_rows")?;
        let rows = stmt
            .query_map([], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
            })
            .context("Failed to query model codes")?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row.context("Failed to read model code row")?);
        }
        Ok(out)
    }

    pub fn color_code_rows(&self) -> Result<Vec<(String, String)>> {
        let mut stmt = self
            .conn
            .prepare("SELECT color_code, color FROM color_codes")
            .context("Failed to prepare color_code_rows")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
            .context("Failed to query color codes")?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row.context("Failed to read color code row")?);
        }
        Ok(out)
    }
}

// ── SQL helpers ───────────────────────────────────────────────────────

const VEHICLE_SELECT: &str = "SELECT id, chassis_no, engine_no, model, variant, color, status, \
     branch_id, load_reference, sale_id, created_at, updated_at FROM vehicles";

const TXN_SELECT: &str = "SELECT id, txn_date, txn_type, from_branch_id, to_branch_id, branch_id, \
     chassis_no, model, variant, color, quantity, load_number, status, remarks FROM transactions";

const SALE_SELECT: &str = "SELECT id, customer_name, customer_phone, model, variant, color, \
     branch_id, fulfillment_status, mechanic_id, chassis_no, sale_date, pdi_completed_at FROM sales";

/// Render ids for an SQL IN list. Callers pass numeric ids, never user text.
fn id_list(ids: &[i64]) -> String {
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

struct NewTxn<'a> {
    txn_type: TxnType,
    from_branch_id: Option<i64>,
    to_branch_id: Option<i64>,
    branch_id: i64,
    chassis_no: Option<&'a str>,
    model: &'a str,
    variant: &'a str,
    color: &'a str,
    quantity: i64,
    load_number: Option<&'a str>,
    status: TxnStatus,
    remarks: Option<&'a str>,
}

fn insert_transaction(conn: &Connection, txn: &NewTxn<'_>) -> Result<()> {
    conn.execute(
        "INSERT INTO transactions (txn_type, from_branch_id, to_branch_id, branch_id, chassis_no,
             model, variant, color, quantity, load_number, status, remarks)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            txn.txn_type.as_str(),
            txn.from_branch_id,
            txn.to_branch_id,
            txn.branch_id,
            txn.chassis_no,
            txn.model,
            txn.variant,
            txn.color,
            txn.quantity,
            txn.load_number,
            txn.status.as_str(),
            txn.remarks,
        ],
    )
    .context("Failed to insert transaction")?;
    Ok(())
}

// ── Row structs ───────────────────────────────────────────────────────

/// Intermediate row struct for vehicles.
struct VehicleRow {
    id: i64,
    chassis_no: String,
    engine_no: Option<String>,
    model: String,
    variant: String,
    color: String,
    status: String,
    branch_id: i64,
    load_reference: Option<String>,
    sale_id: Option<i64>,
    created_at: String,
    updated_at: String,
}

fn vehicle_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<VehicleRow> {
    Ok(VehicleRow {
        id: row.get(0)?,
        chassis_no: row.get(1)?,
        engine_no: row.get(2)?,
        model: row.get(3)?,
        variant: row.get(4)?,
        color: row.get(5)?,
        status: row.get(6)?,
        branch_id: row.get(7)?,
        load_reference: row.get(8)?,
        sale_id: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}

impl VehicleRow {
    fn into_vehicle(self) -> Result<Vehicle> {
        let status = VehicleStatus::from_str(&self.status)
            .map_err(|e| anyhow::anyhow!(e))
            .context("Failed to parse vehicle status")?;
        Ok(Vehicle {
            id: self.id,
            chassis_no: self.chassis_no,
            engine_no: self.engine_no,
            model: self.model,
            variant: self.variant,
            color: self.color,
            status,
            branch_id: self.branch_id,
            load_reference: self.load_reference,
            sale_id: self.sale_id,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Intermediate row struct for transactions.
struct TxnRow {
    id: i64,
    txn_date: String,
    txn_type: String,
    from_branch_id: Option<i64>,
    to_branch_id: Option<i64>,
    branch_id: i64,
    chassis_no: Option<String>,
    model: String,
    variant: String,
    color: String,
    quantity: i64,
    load_number: Option<String>,
    status: String,
    remarks: Option<String>,
}

fn txn_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<TxnRow> {
    Ok(TxnRow {
        id: row.get(0)?,
        txn_date: row.get(1)?,
        txn_type: row.get(2)?,
        from_branch_id: row.get(3)?,
        to_branch_id: row.get(4)?,
        branch_id: row.get(5)?,
        chassis_no: row.get(6)?,
        model: row.get(7)?,
        variant: row.get(8)?,
        color: row.get(9)?,
        quantity: row.get(10)?,
        load_number: row.get(11)?,
        status: row.get(12)?,
        remarks: row.get(13)?,
    })
}

impl TxnRow {
    fn into_transaction(self) -> Result<InventoryTransaction> {
        let txn_type = TxnType::from_str(&self.txn_type)
            .map_err(|e| anyhow::anyhow!(e))
            .context("Failed to parse transaction type")?;
        let status = TxnStatus::from_str(&self.status)
            .map_err(|e| anyhow::anyhow!(e))
            .context("Failed to parse transaction status")?;
        Ok(InventoryTransaction {
            id: self.id,
            txn_date: self.txn_date,
            txn_type,
            from_branch_id: self.from_branch_id,
            to_branch_id: self.to_branch_id,
            branch_id: self.branch_id,
            chassis_no: self.chassis_no,
            model: self.model,
            variant: self.variant,
            color: self.color,
            quantity: self.quantity,
            load_number: self.load_number,
            status,
            remarks: self.remarks,
        })
    }
}

/// Intermediate row struct for sales records.
struct SaleRow {
    id: i64,
    customer_name: String,
    customer_phone: Option<String>,
    model: String,
    variant: String,
    color: String,
    branch_id: i64,
    fulfillment_status: String,
    mechanic_id: Option<i64>,
    chassis_no: Option<String>,
    sale_date: String,
    pdi_completed_at: Option<String>,
}

fn sale_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<SaleRow> {
    Ok(SaleRow {
        id: row.get(0)?,
        customer_name: row.get(1)?,
        customer_phone: row.get(2)?,
        model: row.get(3)?,
        variant: row.get(4)?,
        color: row.get(5)?,
        branch_id: row.get(6)?,
        fulfillment_status: row.get(7)?,
        mechanic_id: row.get(8)?,
        chassis_no: row.get(9)?,
        sale_date: row.get(10)?,
        pdi_completed_at: row.get(11)?,
    })
}

impl SaleRow {
    fn into_sales_record(self) -> Result<SalesRecord> {
        let fulfillment_status = FulfillmentStatus::from_str(&self.fulfillment_status)
            .map_err(|e| anyhow::anyhow!(e))
            .context("Failed to parse fulfillment status")?;
        Ok(SalesRecord {
            id: self.id,
            customer_name: self.customer_name,
            customer_phone: self.customer_phone,
            model: self.model,
            variant: self.variant,
            color: self.color,
            branch_id: self.branch_id,
            fulfillment_status,
            mechanic_id: self.mechanic_id,
            chassis_no: self.chassis_no,
            sale_date: self.sale_date,
            pdi_completed_at: self.pdi_completed_at,
        })
    }
}

/// Intermediate row struct for users.
struct UserRow {
    id: i64,
    username: String,
    phone_number: String,
    role: String,
    branch_id: i64,
}

impl UserRow {
    fn into_user(self) -> Result<User> {
        let role = Role::from_str(&self.role)
            .map_err(|e| anyhow::anyhow!(e))
            .context("Failed to parse user role")?;
        Ok(User {
            id: self.id,
            username: self.username,
            phone_number: self.phone_number,
            role,
            branch_id: self.branch_id,
        })
    }
}
