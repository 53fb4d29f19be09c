//! Database creation and demo seeding — `showroom init-db`.

use anyhow::{Context, Result, bail};

use showroom::auth;
use showroom::config::AppConfig;
use showroom::db::OpsDb;
use showroom::models::{NewVehicle, Role, VehicleStatus};

use super::super::Cli;

pub fn cmd_init_db(cli: &Cli, config: AppConfig, demo: bool) -> Result<()> {
    let db_path = cli.db.clone().unwrap_or_else(|| config.db_path());
    if let Some(parent) = db_path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).with_context(|| {
            format!("Failed to create database directory: {}", parent.display())
        })?;
    }

    let db = OpsDb::new(&db_path)?;
    println!("Database initialized at {}", db_path.display());

    if demo {
        seed_demo(&db)?;
    }

    Ok(())
}

fn seed_demo(db: &OpsDb) -> Result<()> {
    if db.get_branch_by_name("City Showroom")?.is_some() {
        bail!("Demo data already present; refusing to seed twice");
    }

    let city = db.create_branch("City Showroom", None)?;
    let north = db.create_branch("North Wing", Some(city.id))?;
    db.create_branch("East Service Point", Some(city.id))?;

    let password = auth::sha256_hex("demo1234");
    db.create_user("owner", "9000000001", &password, &Role::Owner, city.id)?;
    db.create_user("backoffice", "9000000002", &password, &Role::BackOffice, city.id)?;
    db.create_user("pdi", "9000000003", &password, &Role::Pdi, city.id)?;
    db.create_user("mechanic", "9000000004", &password, &Role::Mechanic, north.id)?;

    db.upsert_model_code("417", "SCV110", "Activa", "DLX")?;
    db.upsert_model_code("417", "SCV110D", "Activa", "DLX Disc")?;
    db.upsert_model_code("523", "CB125", "Shine", "Drum")?;
    db.upsert_color_code("PB-215M", "Pearl Black")?;
    db.upsert_color_code("RD-110", "Rebel Red")?;
    db.upsert_color_code("GY-310M", "Matte Grey")?;

    let stock = [
        ("MD625KF5XN9A00001", "JF50E70001", "Activa", "DLX", "Pearl Black"),
        ("MD625KF5XN9A00002", "JF50E70002", "Activa", "DLX", "Rebel Red"),
        ("MD625KF5XN9A00003", "JF50E70003", "Activa", "DLX Disc", "Matte Grey"),
        ("MD637HC4XN9B00001", "CB12E80001", "Shine", "Drum", "Pearl Black"),
    ];
    for (chassis, engine, model, variant, color) in stock {
        db.create_vehicle(&NewVehicle {
            chassis_no: chassis.to_string(),
            engine_no: Some(engine.to_string()),
            model: model.to_string(),
            variant: variant.to_string(),
            color: color.to_string(),
            status: VehicleStatus::InStock,
            branch_id: city.id,
            load_reference: Some("DEMO-LOAD-1".to_string()),
        })?;
    }

    println!("Seeded demo data:");
    println!("  Branches: City Showroom (head), North Wing, East Service Point");
    println!("  Users (password \"demo1234\"):");
    println!("    owner/9000000001  backoffice/9000000002");
    println!("    pdi/9000000003    mechanic/9000000004");
    println!("  Vehicles: {} in stock at City Showroom", stock.len());

    Ok(())
}
