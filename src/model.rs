use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crate::error::Result;

/// Floor and ceiling of the per-batch retry backoff, in milliseconds.
/// Chosen empirically in the original client: the schedule doubles on every
/// failure and recycles to the floor once a doubling crosses the ceiling,
/// so observable values stay within `1..=100`.
pub const BACKOFF_FLOOR_MS: u64 = 1;
pub const BACKOFF_CEILING_MS: u64 = 100;

/// Clause features recognized while a statement is tokenized. The flags are
/// the entire query understanding of the importer; everything else about the
/// statement text is opaque.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClauseFlags {
    pub has_create: bool,
    pub has_match: bool,
    pub has_merge: bool,
    pub has_create_index: bool,
    pub has_drop_index: bool,
    pub has_detach_delete: bool,
    pub has_remove: bool,
    pub has_storage_mode: bool,
}

/// Coarse statement classification driving ordering and parallelism.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bucket {
    /// Schema statements; run serially before everything else.
    Pre,
    /// Pure creates; safe to run in parallel with each other.
    Vertex,
    /// Creates that reference matched nodes; run after all vertices exist.
    Edge,
    /// Everything else; run serially last.
    Post,
}

impl Bucket {
    /// Phase order of the scheduler.
    pub const ORDER: [Bucket; 4] = [Bucket::Pre, Bucket::Vertex, Bucket::Edge, Bucket::Post];

    pub fn as_str(&self) -> &'static str {
        match self {
            Bucket::Pre => "pre",
            Bucket::Vertex => "vertex",
            Bucket::Edge => "edge",
            Bucket::Post => "post",
        }
    }
}

impl ClauseFlags {
    /// Total mapping from recognized clauses to a bucket. Unrecognized
    /// statements fall through to `Post`, which keeps classification
    /// infallible.
    pub fn bucket(&self) -> Bucket {
        if self.has_create_index || self.has_drop_index || self.has_storage_mode {
            Bucket::Pre
        } else if self.has_create
            && !self.has_match
            && !self.has_merge
            && !self.has_detach_delete
            && !self.has_remove
        {
            Bucket::Vertex
        } else if self.has_match && self.has_create {
            Bucket::Edge
        } else {
            Bucket::Post
        }
    }
}

/// One `;`-terminated query as produced by the tokenizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    /// 1-based source line the statement began on.
    pub line_number: u64,
    /// Position in the input stream, assigned during tokenization.
    pub index: u64,
    /// Statement text without the trailing `;`.
    pub text: String,
    pub clauses: ClauseFlags,
}

/// An ordered run of same-bucket statements executed inside one
/// transaction. The three mutable fields are atomics: they are written only
/// by the worker currently executing the batch and read by the scheduler
/// after it has received the batch's readiness token.
#[derive(Debug)]
pub struct Batch {
    capacity: usize,
    index: u64,
    statements: Vec<Statement>,
    is_executed: AtomicBool,
    attempts: AtomicU64,
    backoff_ms: AtomicU64,
}

impl Batch {
    pub fn new(capacity: usize, index: u64) -> Self {
        Self {
            capacity,
            index,
            statements: Vec::new(),
            is_executed: AtomicBool::new(false),
            attempts: AtomicU64::new(0),
            backoff_ms: AtomicU64::new(BACKOFF_FLOOR_MS),
        }
    }

    fn singleton(index: u64, statement: Statement) -> Self {
        let mut batch = Batch::new(1, index);
        batch.statements.push(statement);
        batch
    }

    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn statements(&self) -> &[Statement] {
        &self.statements
    }

    pub fn is_full(&self) -> bool {
        self.statements.len() >= self.capacity
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    fn push(&mut self, statement: Statement) {
        debug_assert!(!self.is_full());
        self.statements.push(statement);
    }

    pub fn is_executed(&self) -> bool {
        self.is_executed.load(Ordering::Acquire)
    }

    /// Marks the batch committed. Called at most once, by the worker that
    /// committed it; the batch is immutable afterwards.
    pub fn mark_executed(&self) {
        self.is_executed.store(true, Ordering::Release);
    }

    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::Acquire)
    }

    pub fn backoff_ms(&self) -> u64 {
        self.backoff_ms.load(Ordering::Acquire)
    }

    /// Advances the retry state after a failed attempt and returns the new
    /// `(attempts, backoff_ms)` pair.
    pub fn record_failure(&self) -> (u64, u64) {
        let attempts = self.attempts.fetch_add(1, Ordering::AcqRel) + 1;
        let mut next = self.backoff_ms.load(Ordering::Acquire).saturating_mul(2);
        if next > BACKOFF_CEILING_MS {
            next = BACKOFF_FLOOR_MS;
        }
        self.backoff_ms.store(next, Ordering::Release);
        (attempts, next)
    }
}

/// One import window: every unit of work collected from the input before
/// the scheduler drains it. Vertex and edge statements fill bounded
/// batches; pre and post statements become capacity-1 units so the whole
/// window shares one retry/readiness machinery.
#[derive(Debug, Default)]
pub struct BatchSet {
    pre: Vec<Batch>,
    vertex: Vec<Batch>,
    edge: Vec<Batch>,
    post: Vec<Batch>,
    statement_count: u64,
}

impl BatchSet {
    /// Collects the next window of at most `batch_size * max_batches`
    /// statements. Returns `Ok(None)` once the stream is exhausted.
    pub fn collect<I>(stream: &mut I, batch_size: usize, max_batches: usize) -> Result<Option<BatchSet>>
    where
        I: Iterator<Item = Result<Statement>>,
    {
        let window_budget = (batch_size as u64).saturating_mul(max_batches as u64);
        let mut set = BatchSet::default();
        let mut next_index = 0u64;
        let mut open_vertex: Option<Batch> = None;
        let mut open_edge: Option<Batch> = None;

        while set.statement_count < window_budget {
            let statement = match stream.next() {
                Some(statement) => statement?,
                None => break,
            };
            set.statement_count += 1;

            match statement.clauses.bucket() {
                Bucket::Pre => {
                    set.pre.push(Batch::singleton(next_index, statement));
                    next_index += 1;
                }
                Bucket::Post => {
                    set.post.push(Batch::singleton(next_index, statement));
                    next_index += 1;
                }
                Bucket::Vertex => {
                    Self::fill(&mut set.vertex, &mut open_vertex, &mut next_index, batch_size, statement);
                }
                Bucket::Edge => {
                    Self::fill(&mut set.edge, &mut open_edge, &mut next_index, batch_size, statement);
                }
            }
        }

        if let Some(batch) = open_vertex.take().filter(|b| !b.is_empty()) {
            set.vertex.push(batch);
        }
        if let Some(batch) = open_edge.take().filter(|b| !b.is_empty()) {
            set.edge.push(batch);
        }

        if set.statement_count == 0 {
            Ok(None)
        } else {
            Ok(Some(set))
        }
    }

    fn fill(
        sealed: &mut Vec<Batch>,
        open: &mut Option<Batch>,
        next_index: &mut u64,
        batch_size: usize,
        statement: Statement,
    ) {
        let batch = open.get_or_insert_with(|| {
            let batch = Batch::new(batch_size, *next_index);
            *next_index += 1;
            batch
        });
        batch.push(statement);
        if batch.is_full() {
            if let Some(full) = open.take() {
                sealed.push(full);
            }
        }
    }

    pub fn bucket(&self, bucket: Bucket) -> &[Batch] {
        match bucket {
            Bucket::Pre => &self.pre,
            Bucket::Vertex => &self.vertex,
            Bucket::Edge => &self.edge,
            Bucket::Post => &self.post,
        }
    }

    pub fn statement_count(&self) -> u64 {
        self.statement_count
    }

    /// Number of independently executable units in the window.
    pub fn unit_count(&self) -> u64 {
        (self.pre.len() + self.vertex.len() + self.edge.len() + self.post.len()) as u64
    }

    /// Total failed attempts across the window, read after it drained.
    pub fn total_attempts(&self) -> u64 {
        Bucket::ORDER
            .iter()
            .flat_map(|bucket| self.bucket(*bucket))
            .map(Batch::attempts)
            .sum()
    }
}
