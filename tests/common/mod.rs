#![allow(dead_code)]

//! Scripted stand-in for the database boundary. Failure plans are keyed by
//! statement text; the commit log, connect counters and the in-flight
//! high-water mark let tests observe what the importer actually did.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use umbra::client::{BoltSession, Connect};
use umbra::{Result, UmbraError};

#[derive(Clone, Copy)]
pub struct FailPlan {
    /// How many times the statement fails before it starts succeeding.
    pub failures: usize,
    /// Whether each failure also leaves the session bad.
    pub mark_bad: bool,
}

pub struct FakeDb {
    committed: Mutex<Vec<String>>,
    fail_plans: Mutex<HashMap<String, FailPlan>>,
    connect_attempts: AtomicUsize,
    connects: AtomicUsize,
    connect_limit: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    run_delay: Duration,
}

impl FakeDb {
    pub fn new() -> Arc<FakeDb> {
        Self::with_run_delay(Duration::ZERO)
    }

    /// A per-statement delay widens the window in which transactions
    /// overlap, making concurrency observable.
    pub fn with_run_delay(run_delay: Duration) -> Arc<FakeDb> {
        Arc::new(FakeDb {
            committed: Mutex::new(Vec::new()),
            fail_plans: Mutex::new(HashMap::new()),
            connect_attempts: AtomicUsize::new(0),
            connects: AtomicUsize::new(0),
            connect_limit: AtomicUsize::new(usize::MAX),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            run_delay,
        })
    }

    pub fn fail_query(&self, query: &str, plan: FailPlan) {
        self.fail_plans
            .lock()
            .unwrap()
            .insert(query.to_string(), plan);
    }

    /// Connects beyond `limit` successful ones are refused.
    pub fn refuse_connects_beyond(&self, limit: usize) {
        self.connect_limit.store(limit, Ordering::SeqCst);
    }

    pub fn committed(&self) -> Vec<String> {
        self.committed.lock().unwrap().clone()
    }

    pub fn connect_attempts(&self) -> usize {
        self.connect_attempts.load(Ordering::SeqCst)
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Position of `query` in the commit log.
    pub fn commit_position(&self, query: &str) -> Option<usize> {
        self.committed.lock().unwrap().iter().position(|q| q == query)
    }
}

pub struct FakeConnector(pub Arc<FakeDb>);

impl Connect for FakeConnector {
    type Session = FakeSession;

    fn connect(&self) -> Result<FakeSession> {
        self.0.connect_attempts.fetch_add(1, Ordering::SeqCst);
        if self.0.connects.load(Ordering::SeqCst) >= self.0.connect_limit.load(Ordering::SeqCst) {
            return Err(UmbraError::Connect("connection refused".into()));
        }
        self.0.connects.fetch_add(1, Ordering::SeqCst);
        Ok(FakeSession {
            db: Arc::clone(&self.0),
            staged: Vec::new(),
            bad: false,
            active: false,
        })
    }
}

pub struct FakeSession {
    db: Arc<FakeDb>,
    staged: Vec<String>,
    bad: bool,
    active: bool,
}

impl FakeSession {
    fn begin_unit(&mut self) {
        if !self.active {
            self.active = true;
            let now = self.db.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.db.max_in_flight.fetch_max(now, Ordering::SeqCst);
        }
    }

    fn end_unit(&mut self) {
        if self.active {
            self.active = false;
            self.db.in_flight.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

impl BoltSession for FakeSession {
    fn run(&mut self, query: &str) -> Result<()> {
        if self.bad {
            return Err(UmbraError::Query("session is defunct".into()));
        }
        self.begin_unit();
        if !self.db.run_delay.is_zero() {
            thread::sleep(self.db.run_delay);
        }
        let mut plans = self.db.fail_plans.lock().unwrap();
        if let Some(plan) = plans.get_mut(query) {
            if plan.failures > 0 {
                plan.failures -= 1;
                if plan.mark_bad {
                    self.bad = true;
                }
                return Err(UmbraError::Query(format!(
                    "serialization conflict: {query}"
                )));
            }
        }
        drop(plans);
        self.staged.push(query.to_string());
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        if self.bad {
            return Err(UmbraError::Query("session is defunct".into()));
        }
        self.db
            .committed
            .lock()
            .unwrap()
            .extend(self.staged.drain(..));
        self.end_unit();
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        self.staged.clear();
        self.end_unit();
        Ok(())
    }

    fn is_bad(&self) -> bool {
        self.bad
    }
}
