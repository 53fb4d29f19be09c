//! Factory load ingestion.
//!
//! A sync run walks recent mail from the configured dispatch sender, finds
//! S08 manifest attachments, and imports each previously unseen load as
//! In Transit stock. Runs are idempotent: a load already present in the
//! vehicle master is skipped wholesale, so re-scanning the same mailbox is
//! always safe. One bad attachment never stops the run.

pub mod decoder;
pub mod mailbox;
pub mod manifest;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::db::DbHandle;
use crate::errors::IngestError;
use crate::models::IncomingVehicle;

use self::decoder::CodeBook;
use self::mailbox::Mailbox;
use self::manifest::{parse_manifest, peek_load_reference};

/// What one sync run did.
#[derive(Debug, Default, Serialize)]
pub struct IngestReport {
    /// Messages inspected.
    pub scanned: usize,
    /// Load references imported this run, in processing order.
    pub imported_loads: Vec<String>,
    /// Load references already in the vehicle master.
    pub skipped_loads: Vec<String>,
    pub vehicles_added: usize,
    /// Manifest lines dropped for missing a chassis or load reference.
    pub line_errors: usize,
}

/// Scan the mailbox and import new manifest loads for `branch_id`.
///
/// At most `scan_limit` messages are inspected and at most `manifest_cap`
/// manifests imported per run; the cap keeps a first sync against a full
/// mailbox from swallowing months of history in one transaction storm.
pub async fn run_sync(
    db: &DbHandle,
    mailbox: &dyn Mailbox,
    sender_filter: &str,
    scan_limit: usize,
    manifest_cap: usize,
    branch_id: i64,
) -> Result<IngestReport, IngestError> {
    let messages = mailbox.search_from(sender_filter, scan_limit).await?;
    let mut report = IngestReport {
        scanned: messages.len(),
        ..Default::default()
    };

    let book = db
        .call(|db| CodeBook::load(db))
        .await
        .map_err(IngestError::Database)?;

    for message in &messages {
        if report.imported_loads.len() >= manifest_cap {
            info!(cap = manifest_cap, "Manifest cap reached; stopping run");
            break;
        }

        // Only the first manifest attachment of a message counts; dispatch
        // mails carry one S08 file, anything after it is noise.
        let Some(attachment) = message.attachments.iter().find(|a| {
            let lower = a.filename.to_lowercase();
            lower.contains("s08") && lower.contains(".txt")
        }) else {
            debug!(uid = message.uid, "Message has no manifest attachment");
            continue;
        };

        let text = String::from_utf8_lossy(&attachment.data).into_owned();
        let Some(load_reference) = peek_load_reference(&text) else {
            debug!(
                uid = message.uid,
                filename = %attachment.filename,
                "Attachment has no vehicle records"
            );
            continue;
        };

        let known = {
            let load = load_reference.clone();
            db.call(move |db| db.load_reference_exists(&load))
                .await
                .map_err(IngestError::Database)?
        };
        if known {
            debug!(load = %load_reference, "Load already in the vehicle master");
            if !report.skipped_loads.contains(&load_reference) {
                report.skipped_loads.push(load_reference);
            }
            continue;
        }

        let parsed = parse_manifest(&text);
        report.line_errors += parsed.line_errors;
        let units: Vec<IncomingVehicle> =
            parsed.records.iter().map(|r| book.decode(r)).collect();

        let load = load_reference.clone();
        match db
            .call(move |db| db.import_manifest(branch_id, &load, &units))
            .await
        {
            Ok(added) => {
                info!(load = %load_reference, vehicles = added, "Imported manifest");
                report.vehicles_added += added;
                report.imported_loads.push(load_reference);
            }
            Err(e) => {
                warn!(load = %load_reference, error = %e, "Manifest import failed; continuing");
            }
        }
    }

    info!(
        scanned = report.scanned,
        imported = report.imported_loads.len(),
        skipped = report.skipped_loads.len(),
        vehicles = report.vehicles_added,
        line_errors = report.line_errors,
        "Mail sync finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::mailbox::{Attachment, MailMessage};
    use super::*;
    use crate::db::OpsDb;

    struct FakeMailbox {
        messages: Vec<MailMessage>,
    }

    #[async_trait::async_trait]
    impl Mailbox for FakeMailbox {
        async fn search_from(
            &self,
            _sender: &str,
            limit: usize,
        ) -> Result<Vec<MailMessage>, IngestError> {
            Ok(self.messages.iter().take(limit).cloned().collect())
        }
    }

    fn manifest_line(
        model: &str,
        variant: &str,
        color: &str,
        load: &str,
        chassis: &str,
        engine: &str,
    ) -> String {
        let mut line = vec![b' '; 186];
        line[25] = b'B';
        let mut place = |start: usize, value: &str| {
            line[start..start + value.len()].copy_from_slice(value.as_bytes());
        };
        place(27, model);
        place(38, variant);
        place(45, color);
        place(84, load);
        place(113, chassis);
        place(173, engine);
        String::from_utf8(line).unwrap()
    }

    fn message(uid: u32, filename: &str, body: &str) -> MailMessage {
        MailMessage {
            uid,
            attachments: vec![Attachment {
                filename: filename.to_string(),
                data: body.as_bytes().to_vec(),
            }],
        }
    }

    fn seed_handle() -> (DbHandle, i64) {
        let db = OpsDb::new_in_memory().unwrap();
        let branch = db.create_branch("Main", None).unwrap();
        db.upsert_model_code("M1", "V1", "Activa", "DLX").unwrap();
        db.upsert_color_code("C1", "Red").unwrap();
        (DbHandle::new(db), branch.id)
    }

    #[tokio::test]
    async fn test_sync_imports_and_decodes_a_new_load() {
        let (db, branch_id) = seed_handle();
        let body = format!(
            "{}\n{}\n{}\n",
            manifest_line("M1", "V1", "C1", "LOAD001", "CH1", "E1"),
            manifest_line("MX", "VX", "CX", "LOAD001", "CH2", "E2"),
            manifest_line("M1", "V1", "C1", "LOAD001", "", "E3"),
        );
        let mailbox = FakeMailbox {
            messages: vec![message(7, "S08_LOAD001.txt", &body)],
        };

        let report = run_sync(&db, &mailbox, "dispatch@factory.example", 30, 5, branch_id)
            .await
            .unwrap();
        assert_eq!(report.scanned, 1);
        assert_eq!(report.imported_loads, vec!["LOAD001".to_string()]);
        assert!(report.skipped_loads.is_empty());
        assert_eq!(report.vehicles_added, 2);
        assert_eq!(report.line_errors, 1);

        let decoded = db
            .call(|db| db.get_vehicle_by_chassis("CH1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(decoded.model, "Activa");
        assert_eq!(decoded.variant, "DLX");
        assert_eq!(decoded.color, "Red");
        assert_eq!(decoded.status, crate::models::VehicleStatus::InTransit);
        assert_eq!(decoded.load_reference.as_deref(), Some("LOAD001"));

        let raw = db
            .call(|db| db.get_vehicle_by_chassis("CH2"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(raw.model, "MX", "unknown codes pass through raw");
    }

    #[tokio::test]
    async fn test_sync_is_idempotent_per_load() {
        let (db, branch_id) = seed_handle();
        let body = manifest_line("M1", "V1", "C1", "LOAD001", "CH1", "E1");
        let mailbox = FakeMailbox {
            messages: vec![message(1, "s08_load001.txt", &body)],
        };

        run_sync(&db, &mailbox, "dispatch@factory.example", 30, 5, branch_id)
            .await
            .unwrap();
        let second = run_sync(&db, &mailbox, "dispatch@factory.example", 30, 5, branch_id)
            .await
            .unwrap();

        assert!(second.imported_loads.is_empty());
        assert_eq!(second.skipped_loads, vec!["LOAD001".to_string()]);
        assert_eq!(second.vehicles_added, 0);

        let all = db
            .call(move |db| db.list_vehicles(&[branch_id], None))
            .await
            .unwrap();
        assert_eq!(all.len(), 1);
    }

    #[tokio::test]
    async fn test_sync_stops_at_the_manifest_cap() {
        let (db, branch_id) = seed_handle();
        let messages = (1..=3)
            .map(|n| {
                let load = format!("LOAD00{}", n);
                let body = manifest_line("M1", "V1", "C1", &load, &format!("CH{}", n), "E");
                message(n as u32, &format!("S08_{}.txt", load), &body)
            })
            .collect();
        let mailbox = FakeMailbox { messages };

        let report = run_sync(&db, &mailbox, "dispatch@factory.example", 30, 2, branch_id)
            .await
            .unwrap();
        assert_eq!(report.scanned, 3);
        assert_eq!(
            report.imported_loads,
            vec!["LOAD001".to_string(), "LOAD002".to_string()]
        );
        assert!(
            report.skipped_loads.is_empty(),
            "loads past the cap are left for the next run, not marked skipped"
        );
    }

    #[tokio::test]
    async fn test_sync_ignores_non_manifest_attachments() {
        let (db, branch_id) = seed_handle();
        let body = manifest_line("M1", "V1", "C1", "LOAD001", "CH1", "E1");
        let mailbox = FakeMailbox {
            messages: vec![MailMessage {
                uid: 3,
                attachments: vec![
                    Attachment {
                        filename: "invoice.pdf".to_string(),
                        data: body.as_bytes().to_vec(),
                    },
                    Attachment {
                        filename: "S08_LOAD001.TXT".to_string(),
                        data: body.as_bytes().to_vec(),
                    },
                ],
            }],
        };

        let report = run_sync(&db, &mailbox, "dispatch@factory.example", 30, 5, branch_id)
            .await
            .unwrap();
        assert_eq!(
            report.imported_loads,
            vec!["LOAD001".to_string()],
            "filename match is case-insensitive and the pdf is ignored"
        );
        assert_eq!(report.vehicles_added, 1);
    }

    #[tokio::test]
    async fn test_only_first_manifest_attachment_per_message_counts() {
        let (db, branch_id) = seed_handle();
        let first = manifest_line("M1", "V1", "C1", "LOADA", "CH-A", "E1");
        let second = manifest_line("M1", "V1", "C1", "LOADB", "CH-B", "E2");
        let mailbox = FakeMailbox {
            messages: vec![MailMessage {
                uid: 11,
                attachments: vec![
                    Attachment {
                        filename: "S08_LOADA.txt".to_string(),
                        data: first.as_bytes().to_vec(),
                    },
                    Attachment {
                        filename: "S08_LOADB.txt".to_string(),
                        data: second.as_bytes().to_vec(),
                    },
                ],
            }],
        };

        let report = run_sync(&db, &mailbox, "dispatch@factory.example", 30, 5, branch_id)
            .await
            .unwrap();
        assert_eq!(report.imported_loads, vec!["LOADA".to_string()]);
        assert_eq!(report.vehicles_added, 1);

        let trailing = db
            .call(|db| db.get_vehicle_by_chassis("CH-B"))
            .await
            .unwrap();
        assert!(trailing.is_none(), "only the first manifest of a message is read");
    }

    #[tokio::test]
    async fn test_sync_skips_attachment_without_vehicle_records() {
        let (db, branch_id) = seed_handle();
        let mailbox = FakeMailbox {
            messages: vec![message(9, "s08_summary.txt", "TOTAL UNITS: 12\n")],
        };

        let report = run_sync(&db, &mailbox, "dispatch@factory.example", 30, 5, branch_id)
            .await
            .unwrap();
        assert_eq!(report.scanned, 1);
        assert!(report.imported_loads.is_empty());
        assert!(report.skipped_loads.is_empty());
        assert_eq!(report.line_errors, 0);
    }

    #[tokio::test]
    async fn test_scan_limit_bounds_the_mailbox_read() {
        let (db, branch_id) = seed_handle();
        let newest = manifest_line("M1", "V1", "C1", "LOAD009", "CH9", "E9");
        let older = manifest_line("M1", "V1", "C1", "LOAD008", "CH8", "E8");
        let mailbox = FakeMailbox {
            messages: vec![
                message(9, "s08_newest.txt", &newest),
                message(8, "s08_older.txt", &older),
            ],
        };

        let report = run_sync(&db, &mailbox, "dispatch@factory.example", 1, 5, branch_id)
            .await
            .unwrap();
        assert_eq!(report.scanned, 1);
        assert_eq!(report.imported_loads, vec!["LOAD009".to_string()]);
    }
}
