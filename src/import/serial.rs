//! Serial import: one session, statements executed and committed in
//! arrival order. The first failed query aborts the import.

use std::io::BufRead;
use std::time::Instant;

use tracing::{debug, info};

use crate::client::{BoltSession, Connect};
use crate::error::{Result, UmbraError};
use crate::import::ImportSummary;
use crate::parse::StatementStream;
use crate::runtime::ShutdownFlag;

pub fn run<C, R>(connector: &C, input: R, shutdown: &ShutdownFlag) -> Result<ImportSummary>
where
    C: Connect,
    R: BufRead,
{
    let started = Instant::now();
    let mut session = connector.connect()?;
    let mut summary = ImportSummary::default();

    for statement in StatementStream::new(input) {
        let statement = statement?;
        if shutdown.is_set() {
            return Err(UmbraError::Canceled);
        }
        if let Err(err) = session.run(&statement.text).and_then(|_| session.commit()) {
            let _ = session.rollback();
            debug!(
                index = statement.index,
                line = statement.line_number,
                "failed statement: {}",
                statement.text
            );
            return Err(err);
        }
        summary.statements_total += 1;
        summary.batches_executed += 1;
    }

    summary.wall_time_ms = started.elapsed().as_millis() as u64;
    info!(
        statements = summary.statements_total,
        wall_time_ms = summary.wall_time_ms,
        "serial import finished"
    );
    Ok(summary)
}
