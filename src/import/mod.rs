//! Import execution modes and their reporting types.

pub mod batched;
pub mod parser;
pub mod serial;

use serde::Serialize;

use crate::error::{Result, UmbraError};

/// Knobs of the batched-parallel importer.
#[derive(Debug, Clone)]
pub struct ImportOptions {
    /// Statements per vertex/edge batch.
    pub batch_size: usize,
    /// Worker threads; also the cap on batches in flight.
    pub workers: usize,
    /// Batches buffered per import window. Together with `batch_size` this
    /// bounds how much of the input is held in memory.
    pub max_batches: usize,
    /// Optional cap on failed attempts per batch. `None` retries transient
    /// failures forever, which is the inherited default.
    pub max_attempts: Option<u64>,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            workers: 32,
            max_batches: 20,
            max_attempts: None,
        }
    }
}

impl ImportOptions {
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(UmbraError::Config("batch size must be at least 1".into()));
        }
        if self.workers == 0 {
            return Err(UmbraError::Config("worker count must be at least 1".into()));
        }
        if self.max_batches == 0 {
            return Err(UmbraError::Config(
                "window size must be at least 1 batch".into(),
            ));
        }
        if self.max_attempts == Some(0) {
            return Err(UmbraError::Config(
                "attempt cap must be at least 1 when set".into(),
            ));
        }
        Ok(())
    }
}

/// What an import did, for the end-of-run report.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportSummary {
    pub statements_total: u64,
    pub batches_executed: u64,
    /// Failed attempts that were retried. Zero on a conflict-free run.
    pub attempts_total: u64,
    pub wall_time_ms: u64,
}

impl ImportSummary {
    pub fn render_text(&self) -> String {
        format!(
            "{} statements in {} batches ({} failed attempts) in {} ms",
            self.statements_total, self.batches_executed, self.attempts_total, self.wall_time_ms
        )
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Per-bucket and per-clause tallies of a parser-only run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ParserReport {
    pub statements_total: u64,
    pub pre: u64,
    pub vertex: u64,
    pub edge: u64,
    pub post: u64,
    pub create: u64,
    #[serde(rename = "match")]
    pub match_: u64,
    pub merge: u64,
    pub create_index: u64,
    pub drop_index: u64,
    pub detach_delete: u64,
    pub remove: u64,
    pub storage_mode: u64,
}

impl ParserReport {
    pub fn render_text(&self) -> String {
        format!(
            "parsed {} statements: {} pre, {} vertex, {} edge, {} post",
            self.statements_total, self.pre, self.vertex, self.edge, self.post
        )
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
