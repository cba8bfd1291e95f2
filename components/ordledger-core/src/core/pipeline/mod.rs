pub mod processors;

use std::{path::PathBuf, thread::JoinHandle};

use crossbeam_channel::{Receiver, Sender};
use rusqlite::Connection;

use crate::{
    chainhook::{BlockIdentifier, ChainhookPayload},
    core::protocol::inscription_parsing::{parse_chainhook_payload, BlockDirection, BlockEvent},
    db::{
        initialize_ordledger_db,
        ledger::{
            check_ledger_integrity, count_rows_in_block, delete_block, find_block_height_with_hash,
            find_chain_tip, insert_block,
        },
    },
    error::IndexerError,
    utils::Context,
};

use self::processors::inscription_indexing::process_block_operations;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum BlockOutcome {
    Applied {
        block_identifier: BlockIdentifier,
        reveals: u64,
        transfers: u64,
    },
    RolledBack {
        block_identifier: BlockIdentifier,
        reveals: u64,
        transfers: u64,
    },
    Skipped {
        block_identifier: BlockIdentifier,
        reason: String,
    },
}

/// Result of one payload: the blocks committed, in order, and the error that
/// stopped processing, if any.
#[derive(Debug, Default)]
pub struct PayloadReport {
    pub outcomes: Vec<BlockOutcome>,
    pub error: Option<IndexerError>,
}

impl PayloadReport {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Owns the single read-write connection to the ledger and turns block
/// events into committed units of work, one SQLite transaction per block.
pub struct InscriptionIndexer {
    db_conn: Connection,
    ctx: Context,
    inner_ctx: Context,
}

impl InscriptionIndexer {
    pub fn new(db_conn: Connection, ordinals_internals: bool, ctx: &Context) -> InscriptionIndexer {
        InscriptionIndexer {
            db_conn,
            ctx: ctx.clone(),
            inner_ctx: ctx.scoped(ordinals_internals),
        }
    }

    pub fn open(
        db_path: Option<&PathBuf>,
        ordinals_internals: bool,
        ctx: &Context,
    ) -> Result<InscriptionIndexer, String> {
        let db_conn = initialize_ordledger_db(db_path, ctx)?;
        Ok(InscriptionIndexer::new(db_conn, ordinals_internals, ctx))
    }

    pub fn db_conn(&self) -> &Connection {
        &self.db_conn
    }

    pub fn chain_tip(&self) -> Result<Option<BlockIdentifier>, IndexerError> {
        Ok(find_chain_tip(&self.db_conn)?)
    }

    pub fn check_integrity(&self) -> Result<Vec<String>, IndexerError> {
        Ok(check_ledger_integrity(&self.db_conn)?)
    }

    pub fn process_payload(&mut self, payload: &ChainhookPayload) -> PayloadReport {
        let mut report = PayloadReport::default();
        let events = match parse_chainhook_payload(payload) {
            Ok(events) => events,
            Err(e) => {
                try_warn!(self.ctx, "Rejecting payload: {}", e);
                report.error = Some(e);
                return report;
            }
        };
        for event in events.iter() {
            match self.process_block_event(event) {
                Ok(outcome) => report.outcomes.push(outcome),
                Err(e) => {
                    match e.is_retryable() {
                        true => try_warn!(
                            self.ctx,
                            "Unable to process block #{}: {}",
                            event.block_identifier.index,
                            e
                        ),
                        false => try_error!(
                            self.ctx,
                            "Unable to process block #{}: {}",
                            event.block_identifier.index,
                            e
                        ),
                    }
                    report.error = Some(e);
                    break;
                }
            }
        }
        report
    }

    pub fn process_block_event(&mut self, event: &BlockEvent) -> Result<BlockOutcome, IndexerError> {
        match event.direction {
            BlockDirection::Apply => self.apply_block(event),
            BlockDirection::Rollback => self.rollback_block(event),
        }
    }

    fn apply_block(&mut self, event: &BlockEvent) -> Result<BlockOutcome, IndexerError> {
        let block_identifier = &event.block_identifier;
        let db_tx = self.db_conn.transaction()?;

        if find_block_height_with_hash(&block_identifier.hash, &db_tx)?.is_some() {
            try_info!(
                self.ctx,
                "Block #{} ({}) already applied, skipping",
                block_identifier.index,
                block_identifier.hash
            );
            return Ok(BlockOutcome::Skipped {
                block_identifier: block_identifier.clone(),
                reason: "already applied".into(),
            });
        }
        if let Some(tip) = find_chain_tip(&db_tx)? {
            if block_identifier.index <= tip.index {
                return Err(IndexerError::OutOfSequence {
                    block_height: block_identifier.index,
                    block_hash: block_identifier.hash.clone(),
                    reason: format!("does not extend tip #{} ({})", tip.index, tip.hash),
                });
            }
            let parent = event.parent_block_identifier.as_ref();
            if let Some(parent) = parent.filter(|p| p.index == tip.index) {
                if parent.hash != tip.hash {
                    return Err(IndexerError::OutOfSequence {
                        block_height: block_identifier.index,
                        block_hash: block_identifier.hash.clone(),
                        reason: format!(
                            "builds on {} instead of tip #{} ({})",
                            parent.hash, tip.index, tip.hash
                        ),
                    });
                }
            }
        }

        insert_block(
            block_identifier,
            event
                .parent_block_identifier
                .as_ref()
                .map(|parent| parent.hash.as_str()),
            event.timestamp,
            &db_tx,
        )?;
        let activity = process_block_operations(event, &db_tx, &self.inner_ctx)?;
        db_tx.commit()?;

        try_info!(
            self.ctx,
            "Block #{} ({}) applied: {} inscriptions revealed ({} cursed), {} transfers",
            block_identifier.index,
            block_identifier.hash,
            activity.reveals,
            activity.cursed_reveals,
            activity.transfers
        );
        Ok(BlockOutcome::Applied {
            block_identifier: block_identifier.clone(),
            reveals: activity.reveals,
            transfers: activity.transfers,
        })
    }

    fn rollback_block(&mut self, event: &BlockEvent) -> Result<BlockOutcome, IndexerError> {
        let block_identifier = &event.block_identifier;
        let db_tx = self.db_conn.transaction()?;

        if find_block_height_with_hash(&block_identifier.hash, &db_tx)?.is_none() {
            try_info!(
                self.ctx,
                "Block #{} ({}) not applied, nothing to roll back",
                block_identifier.index,
                block_identifier.hash
            );
            return Ok(BlockOutcome::Skipped {
                block_identifier: block_identifier.clone(),
                reason: "not applied".into(),
            });
        }
        match find_chain_tip(&db_tx)? {
            Some(tip) if tip.hash == block_identifier.hash => {}
            tip => {
                return Err(IndexerError::OutOfSequence {
                    block_height: block_identifier.index,
                    block_hash: block_identifier.hash.clone(),
                    reason: match tip {
                        Some(tip) => format!("tip is #{} ({})", tip.index, tip.hash),
                        None => "ledger is empty".into(),
                    },
                })
            }
        }

        let activity = process_block_operations(event, &db_tx, &self.inner_ctx)?;
        delete_block(&block_identifier.hash, &db_tx)?;
        let footprint = count_rows_in_block(&block_identifier.hash, &db_tx)?;
        if footprint.inscriptions > 0 || footprint.locations > 0 {
            return Err(IndexerError::InvariantViolation(format!(
                "block #{} ({}) still owns {} inscriptions and {} locations after its rollback",
                block_identifier.index,
                block_identifier.hash,
                footprint.inscriptions,
                footprint.locations
            )));
        }
        db_tx.commit()?;

        try_info!(
            self.ctx,
            "Block #{} ({}) rolled back: {} reveals and {} transfers retracted",
            block_identifier.index,
            block_identifier.hash,
            activity.reveals,
            activity.transfers
        );
        Ok(BlockOutcome::RolledBack {
            block_identifier: block_identifier.clone(),
            reveals: activity.reveals,
            transfers: activity.transfers,
        })
    }
}

pub enum IndexerCommand {
    ProcessPayload(ChainhookPayload, Sender<PayloadReport>),
    Terminate,
}

pub struct IndexerController {
    pub commands_tx: Sender<IndexerCommand>,
    pub thread_handle: JoinHandle<()>,
}

/// Hands a payload to the writer thread and waits for its report.
pub fn submit_payload(
    commands_tx: &Sender<IndexerCommand>,
    payload: ChainhookPayload,
) -> Result<PayloadReport, String> {
    let (reply_tx, reply_rx) = crossbeam_channel::bounded(1);
    commands_tx
        .send(IndexerCommand::ProcessPayload(payload, reply_tx))
        .map_err(|_| "indexer is not running".to_string())?;
    reply_rx
        .recv()
        .map_err(|_| "indexer stopped before replying".to_string())
}

impl IndexerController {
    pub fn submit(&self, payload: ChainhookPayload) -> Result<PayloadReport, String> {
        submit_payload(&self.commands_tx, payload)
    }

    pub fn terminate(self) {
        let _ = self.commands_tx.send(IndexerCommand::Terminate);
        let _ = self.thread_handle.join();
    }
}

/// Moves the indexer onto its own thread: the only writer of the ledger.
/// Payloads are processed strictly in the order they are submitted.
pub fn start_inscription_indexer(
    mut indexer: InscriptionIndexer,
    ctx: &Context,
) -> Result<IndexerController, String> {
    let (commands_tx, commands_rx): (Sender<IndexerCommand>, Receiver<IndexerCommand>) =
        crossbeam_channel::unbounded();
    let ctx = ctx.clone();
    let thread_handle = hiro_system_kit::thread_named("Inscription indexer")
        .spawn(move || {
            while let Ok(command) = commands_rx.recv() {
                match command {
                    IndexerCommand::ProcessPayload(payload, reply_tx) => {
                        let report = indexer.process_payload(&payload);
                        let _ = reply_tx.send(report);
                    }
                    IndexerCommand::Terminate => break,
                }
            }
            try_info!(ctx, "Inscription indexer stopped");
        })
        .map_err(|e| format!("unable to spawn indexer thread: {}", e))?;
    Ok(IndexerController {
        commands_tx,
        thread_handle,
    })
}
