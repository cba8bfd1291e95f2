mod http_api;
mod http_ingestion;

pub use http_api::{build_api_server, start_api_server, ApiState, CACHE_CONTROL};
pub use http_ingestion::{build_ingestion_server, start_ingestion_server, IngestionState};

use std::net::IpAddr;

use crossbeam_channel::Receiver;
use rocket::config::{self, LogLevel};

use crate::chainhook::registration::register_inscription_feed_predicate;
use crate::chainhook::BlockIdentifier;
use crate::config::Config;
use crate::core::pipeline::{start_inscription_indexer, InscriptionIndexer};
use crate::db::{ledger::find_chain_tip, open_readonly_ordledger_db_conn};
use crate::utils::Context;

pub fn build_rocket_config(
    host: &str,
    port: u16,
    workers: usize,
    http_internals: bool,
) -> Result<rocket::Config, String> {
    let address = host
        .parse::<IpAddr>()
        .map_err(|e| format!("invalid listening address {}: {}", host, e))?;
    let log_level = match http_internals {
        true => LogLevel::Normal,
        false => LogLevel::Off,
    };

    let mut shutdown_config = config::Shutdown::default();
    shutdown_config.ctrlc = false;
    shutdown_config.grace = 1;
    shutdown_config.mercy = 1;

    Ok(rocket::Config {
        port,
        workers,
        address,
        keep_alive: 5,
        temp_dir: std::env::temp_dir().into(),
        log_level,
        cli_colors: false,
        shutdown: shutdown_config,
        ..rocket::Config::default()
    })
}

/// First block the chain-event forwarder should send: the block after the
/// tip when resuming, the configured or network default height otherwise.
pub fn resolve_start_block(config: &Config, tip: Option<&BlockIdentifier>) -> u64 {
    match tip {
        Some(tip) => tip.index + 1,
        None => config
            .chainhook_node
            .start_block
            .unwrap_or_else(|| config.first_inscription_height()),
    }
}

pub struct Service {
    pub config: Config,
    pub ctx: Context,
}

impl Service {
    pub fn new(config: Config, ctx: Context) -> Self {
        Self { config, ctx }
    }

    /// Starts the surfaces enabled by the run mode and blocks until
    /// `terminate_rx` fires.
    pub async fn run(&mut self, terminate_rx: Receiver<()>) -> Result<(), String> {
        let db_path = self.config.expected_db_path();
        let mut shutdowns = vec![];
        let mut controller = None;

        if self.config.is_ingestion_enabled() {
            let indexer = InscriptionIndexer::open(
                Some(&db_path),
                self.config.logs.ordinals_internals,
                &self.ctx,
            )?;
            let tip = indexer.chain_tip().map_err(|e| e.to_string())?;
            match tip {
                Some(ref tip) => try_info!(
                    self.ctx,
                    "Resuming from block #{} ({})",
                    tip.index,
                    tip.hash
                ),
                None => try_info!(self.ctx, "Ledger is empty, starting from scratch"),
            }
            let start_block = resolve_start_block(&self.config, tip.as_ref());

            let indexer_controller = start_inscription_indexer(indexer, &self.ctx)?;
            shutdowns.push(
                start_ingestion_server(
                    &self.config,
                    indexer_controller.commands_tx.clone(),
                    &self.ctx,
                )
                .await?,
            );
            controller = Some(indexer_controller);

            if self.config.should_register_predicate() {
                register_inscription_feed_predicate(&self.config, start_block, &self.ctx).await?;
            }
        } else {
            let conn = open_readonly_ordledger_db_conn(&db_path, &self.ctx)?;
            match find_chain_tip(&conn).map_err(|e| e.to_string())? {
                Some(tip) => try_info!(
                    self.ctx,
                    "Serving ledger at block #{} ({})",
                    tip.index,
                    tip.hash
                ),
                None => try_warn!(self.ctx, "Serving an empty ledger"),
            }
        }

        if self.config.is_read_api_enabled() {
            shutdowns.push(start_api_server(&self.config, &self.ctx).await?);
        }

        let _ = terminate_rx.recv();
        try_info!(self.ctx, "Shutting down");
        for shutdown in shutdowns.into_iter() {
            shutdown.notify();
        }
        // Waits for the unit of work in flight, if any.
        if let Some(controller) = controller {
            controller.terminate();
        }
        Ok(())
    }
}
