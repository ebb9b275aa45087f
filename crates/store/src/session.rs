//! Per-session step log
//!
//! Each session owns an append-only sequence of step records plus a
//! derived `by_tool` counter map used by the circuit breaker and by
//! clause evaluation. Sessions live in their own concurrency domain so
//! step recording never contends with index writes.
//!
//! Lock order: the session map's shard lock is released before the
//! per-session mutex is taken, and the store's state lock is never
//! acquired while a per-session mutex is held.

use crs_core::error::Result;
use crs_core::time::now_ms;
use crs_core::types::{StepActor, StepDecision, StepOutcome, StepRecord};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

/// One session's steps and derived counters
#[derive(Debug, Default)]
struct SessionSteps {
    steps: VecDeque<StepRecord>,
    by_tool: HashMap<String, u64>,
}

impl SessionSteps {
    fn decrement_tool(&mut self, tool: &str) {
        if let Some(count) = self.by_tool.get_mut(tool) {
            *count -= 1;
            if *count == 0 {
                self.by_tool.remove(tool);
            }
        }
    }
}

/// Session-keyed step logs with a FIFO bound per session
#[derive(Debug)]
pub struct SessionLog {
    sessions: DashMap<String, Arc<Mutex<SessionSteps>>>,
    max_steps: usize,
}

impl SessionLog {
    /// A log capping each session at `max_steps` records
    pub fn new(max_steps: usize) -> Self {
        SessionLog {
            sessions: DashMap::new(),
            max_steps,
        }
    }

    fn session(&self, session_id: &str) -> Arc<Mutex<SessionSteps>> {
        // Clone the Arc out so the map's shard lock is released before
        // the per-session mutex is taken.
        self.sessions
            .entry(session_id.to_string())
            .or_default()
            .clone()
    }

    /// Record a step.
    ///
    /// Auto-assigns `step_number` and `timestamp` when unset, validates,
    /// evicts the oldest step at capacity (adjusting `by_tool`), and
    /// stores a deep copy so the caller cannot mutate the stored record.
    /// Returns the record as stored.
    pub fn record(&self, mut step: StepRecord) -> Result<StepRecord> {
        // Session id is checked before any map entry is created
        if step.session_id.is_empty() {
            return Err(crs_core::error::Error::EmptySessionId);
        }

        let session = self.session(&step.session_id);
        let mut guard = session.lock();

        if guard.steps.len() >= self.max_steps {
            if let Some(evicted) = guard.steps.pop_front() {
                if evicted.decision == StepDecision::ExecuteTool && !evicted.tool.is_empty() {
                    guard.decrement_tool(&evicted.tool);
                }
            }
        }

        if step.step_number == 0 {
            step.step_number = guard.steps.len() as u64 + 1;
        }
        if step.timestamp == 0 {
            step.timestamp = now_ms();
        }
        step.validate()?;

        // Clone stores deep copies of tool_params and the effect lists
        let stored = step.clone();
        if stored.decision == StepDecision::ExecuteTool && !stored.tool.is_empty() {
            *guard.by_tool.entry(stored.tool.clone()).or_insert(0) += 1;
        }
        guard.steps.push_back(stored.clone());
        Ok(stored)
    }

    /// All steps for a session, oldest first
    pub fn history(&self, session_id: &str) -> Vec<StepRecord> {
        match self.sessions.get(session_id) {
            Some(session) => {
                let arc = session.clone();
                drop(session);
                let guard = arc.lock();
                guard.steps.iter().cloned().collect()
            }
            None => Vec::new(),
        }
    }

    /// The most recent step, if any
    pub fn last(&self, session_id: &str) -> Option<StepRecord> {
        let arc = self.sessions.get(session_id)?.clone();
        let guard = arc.lock();
        guard.steps.back().cloned()
    }

    /// The two most recent steps, newest first
    pub fn last_two(&self, session_id: &str) -> (Option<StepRecord>, Option<StepRecord>) {
        let arc = match self.sessions.get(session_id) {
            Some(session) => session.clone(),
            None => return (None, None),
        };
        let guard = arc.lock();
        let len = guard.steps.len();
        let last = guard.steps.back().cloned();
        let before_last = if len >= 2 {
            guard.steps.get(len - 2).cloned()
        } else {
            None
        };
        (last, before_last)
    }

    /// Number of `ExecuteTool` steps for `tool` in the session
    pub fn count_tool_executions(&self, session_id: &str, tool: &str) -> u64 {
        match self.sessions.get(session_id) {
            Some(session) => {
                let arc = session.clone();
                drop(session);
                let guard = arc.lock();
                guard.by_tool.get(tool).copied().unwrap_or(0)
            }
            None => 0,
        }
    }

    /// Steps taken by `actor`, oldest first
    pub fn by_actor(&self, session_id: &str, actor: StepActor) -> Vec<StepRecord> {
        self.history(session_id)
            .into_iter()
            .filter(|s| s.actor == actor)
            .collect()
    }

    /// Steps with `outcome`, oldest first
    pub fn by_outcome(&self, session_id: &str, outcome: StepOutcome) -> Vec<StepRecord> {
        self.history(session_id)
            .into_iter()
            .filter(|s| s.outcome == outcome)
            .collect()
    }

    /// Drop all steps for a session
    pub fn clear(&self, session_id: &str) {
        self.sessions.remove(session_id);
    }

    /// Number of sessions with at least one recorded step
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}
