// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Pull replication of remote archive partitions.
//!
//! One coordinating loop walks every remote peer per tick: it harvests the
//! peer's finished poll, checks the returned rows for contiguity against the
//! last seq committed locally for that peer, commits them, and schedules the
//! poll for the block that holds the next missing seq. A tick never waits on
//! the network. It does wait on the store: a commit against a durable store
//! fsyncs, so [`ReplicationScheduler::run`] drives each tick on the blocking
//! pool rather than on an async worker.

use std::sync::Arc;
use std::time::{Duration, Instant};

use ledger_kernel::seq::{next_seq, resolve};
use ledger_kernel::types::id::PeerId;
use ledger_kernel::types::row::ArchiveRow;
use ledger_kernel::verify::verify_block;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::connection::{ConnectionSet, PeerConnection, PollOutcome, Reap};
use crate::errors::EngineError;
use crate::ledger::Ledger;
use crate::network::PeerTransport;
use crate::store::LedgerDb;

/// Counters of one scheduler pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    pub scheduled: usize,
    pub in_flight: usize,
    pub committed_rows: usize,
    pub data_errors: usize,
    pub suspended: usize,
}

struct Tracked<T: PeerTransport> {
    conn: Arc<PeerConnection<T>>,
    last_seq: Option<u64>,
    /// Id of the last poll whose outcome was acted on.
    handled: u64,
}

pub struct ReplicationScheduler<T: PeerTransport, D: LedgerDb> {
    ledger: Arc<Ledger<D>>,
    peers: Vec<Tracked<T>>,
}

impl<T: PeerTransport, D: LedgerDb> ReplicationScheduler<T, D> {
    /// Loads the last committed seq of every connected peer.
    pub fn new(ledger: Arc<Ledger<D>>, conns: &ConnectionSet<T>) -> Result<Self, EngineError> {
        let mut peers = Vec::with_capacity(conns.len());
        for conn in conns.iter() {
            let last_seq = ledger.last_seq(conn.id())?;
            tracing::info!("Replicating peer {} from seq {:?}", conn.id(), last_seq);
            peers.push(Tracked {
                conn: conn.clone(),
                last_seq,
                handled: 0,
            });
        }
        Ok(Self { ledger, peers })
    }

    pub fn last_seq(&self, peer: PeerId) -> Option<u64> {
        self.peers
            .iter()
            .find(|t| t.conn.id() == peer)
            .and_then(|t| t.last_seq)
    }

    /// One pass over all peers. Never waits on the network; store writes are
    /// synchronous. Needs a tokio runtime context to spawn polls.
    pub fn tick(&mut self) -> TickReport {
        let start = Instant::now();
        let mut report = TickReport::default();

        for tracked in &mut self.peers {
            match tracked.conn.try_reap() {
                Reap::InFlight => {
                    report.in_flight += 1;
                    continue;
                }
                Reap::Done {
                    poll,
                    block_id,
                    outcome,
                } if poll > tracked.handled => {
                    tracked.handled = poll;
                    handle_outcome(&self.ledger, tracked, block_id, outcome, &mut report);
                }
                Reap::Done { .. } | Reap::Idle => {}
            }

            if tracked.conn.status().is_suspended() {
                report.suspended += 1;
                continue;
            }

            let block_id = match next_seq(tracked.last_seq) {
                Ok(seq) => resolve(seq).block_id,
                Err(e) => {
                    tracked.conn.set_internal_error(format!("sequence space exhausted: {}", e));
                    report.suspended += 1;
                    continue;
                }
            };
            if tracked.conn.schedule_poll(block_id) {
                report.scheduled += 1;
            }
        }

        metrics::histogram!("ledger_tick_duration_seconds", start.elapsed().as_secs_f64());
        report
    }

    /// Ticks every `interval` until `shutdown` fires, then cancels all polls.
    /// Each tick runs under `spawn_blocking` so commits never stall the
    /// async workers.
    pub async fn run(mut self, interval: Duration, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!("Replication loop started for {} peers every {:?}", self.peers.len(), interval);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    let pass = tokio::task::spawn_blocking(move || {
                        let report = self.tick();
                        (self, report)
                    });
                    let (sched, report) = match pass.await {
                        Ok(done) => done,
                        Err(e) => {
                            tracing::error!("Replication tick failed: {}", e);
                            return;
                        }
                    };
                    self = sched;
                    if report.committed_rows > 0 || report.data_errors > 0 {
                        tracing::debug!("Replication tick: {:?}", report);
                    }
                }
            }
        }

        self.shutdown().await;
        tracing::info!("Replication loop stopped");
    }

    /// Cancels and awaits every outstanding poll.
    pub async fn shutdown(&self) {
        for tracked in &self.peers {
            tracked.conn.cancel_poll().await;
        }
    }
}

fn handle_outcome<T: PeerTransport, D: LedgerDb>(
    ledger: &Ledger<D>,
    tracked: &mut Tracked<T>,
    block_id: u64,
    outcome: PollOutcome,
    report: &mut TickReport,
) {
    let conn = &tracked.conn;
    match outcome {
        PollOutcome::Rows(rows) => {
            // Resent rows are checked against the local copy of the block.
            let resends = match (rows.first(), tracked.last_seq) {
                (Some(first), Some(last)) => first.seq <= last,
                _ => false,
            };
            let committed = if resends {
                match ledger.block(conn.id(), block_id) {
                    Ok(committed) => committed,
                    Err(e) => {
                        conn.set_internal_error(format!("reading block {} failed: {}", block_id, e));
                        return;
                    }
                }
            } else {
                Vec::new()
            };
            let fresh = match verify_block(conn.id(), block_id, tracked.last_seq, &committed, &rows) {
                Ok(fresh) => fresh,
                Err(e) => {
                    conn.set_data_error(format!("block {}: {}", block_id, e));
                    report.data_errors += 1;
                    return;
                }
            };
            commit(ledger, tracked, fresh, report);
        }
        PollOutcome::Malformed(msg) => {
            conn.set_data_error(format!("malformed poll response: {}", msg));
            report.data_errors += 1;
        }
        PollOutcome::TaskFailed(msg) => {
            conn.set_internal_error(format!("poll task failed: {}", msg));
        }
        PollOutcome::NoContent
        | PollOutcome::PeerFailure
        | PollOutcome::NetworkFailure(_)
        | PollOutcome::Other(_)
        | PollOutcome::Cancelled => {}
    }
}

fn commit<T: PeerTransport, D: LedgerDb>(
    ledger: &Ledger<D>,
    tracked: &mut Tracked<T>,
    rows: &[ArchiveRow],
    report: &mut TickReport,
) {
    let Some(last) = rows.last() else {
        return;
    };
    let peer = tracked.conn.id();
    match ledger.commit(peer, rows) {
        Ok(()) => {
            tracing::debug!("Committed {} rows of peer {} through seq {}", rows.len(), peer, last.seq);
            tracked.last_seq = Some(last.seq);
            report.committed_rows += rows.len();
        }
        Err(e) => tracked.conn.set_internal_error(format!("commit failed: {}", e)),
    }
}
