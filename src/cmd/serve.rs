//! HTTP server command — `showroom serve`.

use anyhow::Result;

use showroom::config::AppConfig;
use showroom::server::{ServerConfig, start_server};

use super::super::Cli;

pub async fn cmd_serve(cli: &Cli, config: AppConfig, port: Option<u16>, dev: bool) -> Result<()> {
    let port = port.unwrap_or_else(|| config.port());
    let db_path = cli.db.clone().unwrap_or_else(|| config.db_path());

    start_server(ServerConfig {
        config,
        port,
        db_path,
        dev_mode: dev,
    })
    .await
}
