//! One-shot mailbox ingestion — `showroom sync`.

use anyhow::{Context, Result, bail};

use showroom::config::AppConfig;
use showroom::db::{DbHandle, OpsDb};
use showroom::ingest::{self, mailbox::ImapMailbox};

use super::super::Cli;

pub async fn cmd_sync(cli: &Cli, config: AppConfig, branch: &str) -> Result<()> {
    let Some(mailbox_cfg) = config.mailbox_for(branch) else {
        bail!(
            "No [[mailboxes]] entry for branch '{}' in showroom.toml",
            branch
        );
    };

    let db_path = cli.db.clone().unwrap_or_else(|| config.db_path());
    let db = DbHandle::new(OpsDb::new(&db_path)?);

    let name = branch.to_string();
    let branch_row = db
        .call(move |db| db.get_branch_by_name(&name))
        .await?
        .with_context(|| format!("Branch '{}' not found in the database", branch))?;

    let mailbox = ImapMailbox::new(
        &mailbox_cfg.host,
        mailbox_cfg.port,
        &mailbox_cfg.user,
        &mailbox_cfg.password,
    );

    println!("Syncing '{}' from {}...", branch, mailbox_cfg.host);
    let report = ingest::run_sync(
        &db,
        &mailbox,
        &mailbox_cfg.sender_filter,
        config.ingest.scan_limit,
        config.ingest.manifest_cap,
        branch_row.id,
    )
    .await?;

    println!();
    println!("Messages scanned:    {}", report.scanned);
    println!("Loads imported:      {}", report.imported_loads.len());
    for load in &report.imported_loads {
        println!("  + {}", load);
    }
    if !report.skipped_loads.is_empty() {
        println!("Loads already known: {}", report.skipped_loads.join(", "));
    }
    println!("Vehicles added:      {}", report.vehicles_added);
    if report.line_errors > 0 {
        println!("Malformed lines:     {}", report.line_errors);
    }

    Ok(())
}
