//! Batched-parallel import.
//!
//! The input is drained window by window. Each window is grouped into the
//! four buckets and executed in phases with a full barrier between them:
//! pre units strictly in order on one session, then vertex batches with up
//! to `workers` in flight, then edge batches the same way, then post units
//! strictly in order. Within a parallel phase batches carry no ordering at
//! all; a batch that fails with a transient error keeps its slot free,
//! backs off and is picked up again on a later dispatch pass.
//!
//! Every worker thread exclusively owns one session for its whole life.
//! Completion flows back through the readiness notifier, one token per
//! dispatched unit; the scheduler reads batch state only after receiving
//! the matching token.

use std::io::BufRead;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::client::{BoltSession, Connect};
use crate::error::{Result, UmbraError};
use crate::import::{ImportOptions, ImportSummary};
use crate::model::{Batch, BatchSet, Bucket, BACKOFF_FLOOR_MS};
use crate::parse::StatementStream;
use crate::runtime::{Notifier, ReadinessToken, ShutdownFlag};

struct WorkItem {
    set: Arc<BatchSet>,
    bucket: Bucket,
    pos: usize,
}

pub fn run<C, R>(
    connector: &C,
    input: R,
    options: &ImportOptions,
    shutdown: &ShutdownFlag,
) -> Result<ImportSummary>
where
    C: Connect,
    R: BufRead,
{
    options.validate()?;
    let started = Instant::now();
    let mut stream = StatementStream::new(input);
    let mut summary = ImportSummary::default();

    // The first window is collected before any session exists, so an empty
    // input never touches the database.
    let first = BatchSet::collect(&mut stream, options.batch_size, options.max_batches)?;
    let Some(first) = first else {
        summary.wall_time_ms = started.elapsed().as_millis() as u64;
        info!("input contained no statements");
        return Ok(summary);
    };

    thread::scope(|scope| -> Result<()> {
        let mut slots: Vec<Sender<WorkItem>> = Vec::with_capacity(options.workers);
        let notifier = Notifier::new();

        for slot in 0..options.workers {
            let (sender, receiver) = mpsc::channel();
            slots.push(sender);
            let notifier = notifier.clone();
            let shutdown = shutdown.clone();
            let max_attempts = options.max_attempts;
            scope.spawn(move || {
                worker_loop(slot, connector, receiver, notifier, shutdown, max_attempts)
            });
        }

        // Startup handshake: every slot reports its connection attempt
        // before any unit is dispatched. One refused connection aborts the
        // import while the batch set is still untouched.
        let mut fault = None;
        for _ in 0..options.workers {
            if let Some(err) = notifier.await_ready().fault {
                fault = Some(err);
            }
        }
        if let Some(err) = fault {
            return Err(err);
        }

        let mut window = Some(first);
        while let Some(set) = window {
            let set = Arc::new(set);
            for bucket in Bucket::ORDER {
                match bucket {
                    Bucket::Pre | Bucket::Post => {
                        run_serial_phase(&set, bucket, &slots, &notifier, shutdown)?
                    }
                    Bucket::Vertex | Bucket::Edge => {
                        run_parallel_phase(&set, bucket, &slots, &notifier, shutdown)?
                    }
                }
            }
            summary.statements_total += set.statement_count();
            summary.batches_executed += set.unit_count();
            summary.attempts_total += set.total_attempts();
            debug!(
                statements = set.statement_count(),
                units = set.unit_count(),
                "window drained"
            );
            window = BatchSet::collect(&mut stream, options.batch_size, options.max_batches)?;
        }
        Ok(())
    })?;

    summary.wall_time_ms = started.elapsed().as_millis() as u64;
    info!(
        statements = summary.statements_total,
        batches = summary.batches_executed,
        attempts = summary.attempts_total,
        wall_time_ms = summary.wall_time_ms,
        "batched import finished"
    );
    Ok(summary)
}

/// Pre and post units run one at a time on slot 0 and must commit in their
/// arrival order, so each unit is retried to completion before the next
/// one is dispatched.
fn run_serial_phase(
    set: &Arc<BatchSet>,
    bucket: Bucket,
    slots: &[Sender<WorkItem>],
    notifier: &Notifier,
    shutdown: &ShutdownFlag,
) -> Result<()> {
    let units = set.bucket(bucket);
    for pos in 0..units.len() {
        while !units[pos].is_executed() {
            if shutdown.is_set() {
                return Err(UmbraError::Canceled);
            }
            dispatch(&slots[0], set, bucket, pos)?;
            if let Some(err) = notifier.await_ready().fault {
                return Err(err);
            }
        }
    }
    Ok(())
}

/// Vertex and edge batches: dispatch every not-yet-executed batch, lowest
/// index first, up to one per slot; await exactly one token per dispatched
/// batch; rescan until the bucket is drained.
fn run_parallel_phase(
    set: &Arc<BatchSet>,
    bucket: Bucket,
    slots: &[Sender<WorkItem>],
    notifier: &Notifier,
    shutdown: &ShutdownFlag,
) -> Result<()> {
    let batches = set.bucket(bucket);
    loop {
        if shutdown.is_set() {
            return Err(UmbraError::Canceled);
        }
        let pending: Vec<usize> = batches
            .iter()
            .enumerate()
            .filter(|(_, batch)| !batch.is_executed())
            .map(|(pos, _)| pos)
            .collect();
        if pending.is_empty() {
            return Ok(());
        }

        let mut dispatched = 0;
        for (slot, pos) in slots.iter().zip(pending) {
            dispatch(slot, set, bucket, pos)?;
            dispatched += 1;
        }

        let mut fault = None;
        for _ in 0..dispatched {
            if let Some(err) = notifier.await_ready().fault {
                fault = Some(err);
            }
        }
        if let Some(err) = fault {
            return Err(err);
        }
    }
}

fn dispatch(
    slot: &Sender<WorkItem>,
    set: &Arc<BatchSet>,
    bucket: Bucket,
    pos: usize,
) -> Result<()> {
    slot.send(WorkItem {
        set: Arc::clone(set),
        bucket,
        pos,
    })
    .map_err(|_| UmbraError::Session("worker thread exited unexpectedly".into()))
}

fn worker_loop<C: Connect>(
    slot: usize,
    connector: &C,
    receiver: Receiver<WorkItem>,
    notifier: Notifier,
    shutdown: ShutdownFlag,
    max_attempts: Option<u64>,
) {
    let mut session = match connector.connect() {
        Ok(session) => {
            notifier.notify(ReadinessToken::ready(slot as u64));
            session
        }
        Err(err) => {
            warn!(slot, error = %err, "worker failed to connect");
            notifier.notify(ReadinessToken::fault(slot as u64, err));
            return;
        }
    };

    while let Ok(item) = receiver.recv() {
        let batch = &item.set.bucket(item.bucket)[item.pos];
        let mut fault = None;

        let backoff = batch.backoff_ms();
        if backoff > BACKOFF_FLOOR_MS {
            debug!(slot, batch = batch.index(), backoff_ms = backoff, "backing off");
            thread::sleep(Duration::from_millis(backoff));
        }

        match execute_unit(&mut session, batch, &shutdown) {
            Ok(()) => {
                batch.mark_executed();
                debug!(
                    slot,
                    batch = batch.index(),
                    bucket = item.bucket.as_str(),
                    statements = batch.statements().len(),
                    "batch committed"
                );
            }
            Err(UmbraError::Canceled) => {
                let _ = session.rollback();
                fault = Some(UmbraError::Canceled);
            }
            Err(err) => {
                let _ = session.rollback();
                let (attempts, backoff_ms) = batch.record_failure();
                debug!(
                    slot,
                    batch = batch.index(),
                    attempts,
                    backoff_ms,
                    error = %err,
                    "batch attempt failed"
                );
                if max_attempts.is_some_and(|cap| attempts >= cap) {
                    fault = Some(UmbraError::Query(format!(
                        "batch {} gave up after {} attempts: {}",
                        batch.index(),
                        attempts,
                        err
                    )));
                }
            }
        }

        // A session that went bad is replaced before the slot takes more
        // work. Failing to replace it is fatal for the whole import.
        if session.is_bad() {
            match connector.connect() {
                Ok(fresh) => {
                    info!(slot, "replaced bad session");
                    session = fresh;
                }
                Err(err) => {
                    warn!(slot, error = %err, "session replacement failed");
                    notifier.notify(ReadinessToken::fault(batch.index(), err));
                    return;
                }
            }
        }

        notifier.notify(ReadinessToken { unit: batch.index(), fault });
    }
}

/// One attempt at a unit: every statement in order inside a single
/// transaction. The caller rolls back on failure.
fn execute_unit<S: BoltSession>(
    session: &mut S,
    batch: &Batch,
    shutdown: &ShutdownFlag,
) -> Result<()> {
    for statement in batch.statements() {
        if shutdown.is_set() {
            return Err(UmbraError::Canceled);
        }
        session.run(&statement.text)?;
    }
    session.commit()
}
