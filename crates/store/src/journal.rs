//! Delta-history journal
//!
//! A single background worker owns a bounded ring of recently applied
//! deltas and serves range / by-node / by-generation / explain queries.
//! Clients never touch the worker's state directly:
//!
//! - Records are enqueued without blocking. When the record queue is
//!   full the record is DROPPED and a counter is bumped. The journal is
//!   best-effort; it must never slow a writer down.
//! - Queries carry a reply channel and honor the caller's cancellation
//!   while waiting to enqueue and while waiting for the answer.
//!
//! On overflow of the ring the oldest record is evicted from the id
//! order, the generation map, and every per-node posting list.

use crate::metrics;
use crs_core::context::Context;
use crs_core::error::{Error, Result};
use crs_core::limits::{QUERY_QUEUE_CAPACITY, RECORD_QUEUE_CAPACITY};
use crs_core::types::DeltaType;
use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// One journaled delta, as served by queries and exported as JSON
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeltaRecord {
    /// Stable id of the form `delta_{n}`
    pub id: String,
    /// Generation the apply produced
    pub generation: u64,
    /// When the delta was applied, milliseconds since the Unix epoch
    pub timestamp: i64,
    /// Kind of the applied delta
    pub delta_type: DeltaType,
    /// The delta as `{"type": ..., "data": ...}` JSON
    #[serde(rename = "delta_bytes")]
    pub delta_json: String,
    /// Human label for the producer
    pub source: String,
    /// Session the apply was bound to
    pub session_id: String,
    /// Caller-supplied annotations
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
    /// Node ids the delta touched
    pub affected_nodes: Vec<String>,
}

/// A record as handed to the journal; the worker assigns the id
#[derive(Debug, Clone)]
pub struct RecordPayload {
    /// Generation the apply produced
    pub generation: u64,
    /// When the delta was applied, milliseconds since the Unix epoch
    pub timestamp: i64,
    /// Kind of the applied delta
    pub delta_type: DeltaType,
    /// The delta as `{"type": ..., "data": ...}` JSON
    pub delta_json: String,
    /// Human label for the producer
    pub source: String,
    /// Session the apply was bound to
    pub session_id: String,
    /// Caller-supplied annotations
    pub metadata: BTreeMap<String, String>,
    /// Node ids the delta touched
    pub affected_nodes: Vec<String>,
}

#[derive(Debug, Clone)]
enum QueryKind {
    Range { from: u64, to: u64 },
    ByNode(String),
    ByGeneration(u64),
    Explain(String),
    Size,
    All,
}

impl QueryKind {
    fn label(&self) -> &'static str {
        match self {
            QueryKind::Range { .. } => "range",
            QueryKind::ByNode(_) => "by_node",
            QueryKind::ByGeneration(_) => "by_generation",
            QueryKind::Explain(_) => "explain",
            QueryKind::Size => "size",
            QueryKind::All => "all",
        }
    }

    fn span_name(&self) -> &'static str {
        match self {
            QueryKind::Range { .. } => "crs.DeltaHistory.GetRange",
            QueryKind::ByNode(_) => "crs.DeltaHistory.GetByNode",
            QueryKind::ByGeneration(_) => "crs.DeltaHistory.GetByGeneration",
            QueryKind::Explain(_) => "crs.DeltaHistory.Explain",
            QueryKind::Size => "crs.DeltaHistory.Size",
            QueryKind::All => "crs.DeltaHistory.All",
        }
    }
}

enum QueryReply {
    Records(Vec<DeltaRecord>),
    Record(Option<DeltaRecord>),
    Size(usize),
}

struct QueryRequest {
    kind: QueryKind,
    reply: mpsc::Sender<QueryReply>,
}

struct JournalQueue {
    records: VecDeque<RecordPayload>,
    queries: VecDeque<QueryRequest>,
    shutdown: bool,
}

struct JournalShared {
    queue: Mutex<JournalQueue>,
    work_ready: Condvar,
    closed: AtomicBool,
    dropped: AtomicU64,
    record_capacity: usize,
    query_capacity: usize,
    enable_metrics: bool,
}

/// Worker-owned journal state. Nothing outside the worker thread may
/// touch this.
struct WorkerState {
    records: HashMap<String, DeltaRecord>,
    ordered_ids: VecDeque<String>,
    by_node: HashMap<String, Vec<String>>,
    by_generation: HashMap<u64, String>,
    next_id: u64,
    max_records: usize,
    enable_metrics: bool,
}

impl WorkerState {
    fn insert(&mut self, payload: RecordPayload) {
        if self.records.len() >= self.max_records {
            self.evict_oldest();
        }

        let id = format!("delta_{}", self.next_id);
        self.next_id += 1;

        let record = DeltaRecord {
            id: id.clone(),
            generation: payload.generation,
            timestamp: payload.timestamp,
            delta_type: payload.delta_type,
            delta_json: payload.delta_json,
            source: payload.source,
            session_id: payload.session_id,
            metadata: payload.metadata,
            affected_nodes: payload.affected_nodes,
        };

        self.by_generation.insert(record.generation, id.clone());
        for node in &record.affected_nodes {
            self.by_node.entry(node.clone()).or_default().push(id.clone());
        }
        self.ordered_ids.push_back(id.clone());
        self.records.insert(id, record);

        if self.enable_metrics {
            metrics::DELTA_HISTORY_RECORDS_TOTAL.inc();
            metrics::DELTA_HISTORY_SIZE.set(self.records.len() as i64);
        }
    }

    fn evict_oldest(&mut self) {
        let oldest = match self.ordered_ids.pop_front() {
            Some(id) => id,
            None => return,
        };
        if let Some(record) = self.records.remove(&oldest) {
            self.by_generation.remove(&record.generation);
            for node in &record.affected_nodes {
                if let Some(ids) = self.by_node.get_mut(node) {
                    ids.retain(|id| id != &oldest);
                    if ids.is_empty() {
                        self.by_node.remove(node);
                    }
                }
            }
        }
    }

    fn answer(&self, kind: &QueryKind) -> QueryReply {
        match kind {
            QueryKind::Range { from, to } => QueryReply::Records(
                self.ordered_ids
                    .iter()
                    .filter_map(|id| self.records.get(id))
                    .filter(|r| r.generation > *from && r.generation <= *to)
                    .cloned()
                    .collect(),
            ),
            QueryKind::ByNode(node) | QueryKind::Explain(node) => QueryReply::Records(
                self.by_node
                    .get(node)
                    .map(|ids| {
                        ids.iter()
                            .filter_map(|id| self.records.get(id))
                            .cloned()
                            .collect()
                    })
                    .unwrap_or_default(),
            ),
            QueryKind::ByGeneration(generation) => QueryReply::Record(
                self.by_generation
                    .get(generation)
                    .and_then(|id| self.records.get(id))
                    .cloned(),
            ),
            QueryKind::Size => QueryReply::Size(self.records.len()),
            QueryKind::All => QueryReply::Records(
                self.ordered_ids
                    .iter()
                    .filter_map(|id| self.records.get(id))
                    .cloned()
                    .collect(),
            ),
        }
    }
}

/// Handle to the delta-history worker
pub struct DeltaHistory {
    shared: Arc<JournalShared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl DeltaHistory {
    /// Spawn a journal worker holding up to `max_records` records
    pub fn new(max_records: usize, enable_metrics: bool) -> Self {
        Self::with_capacities(
            max_records,
            RECORD_QUEUE_CAPACITY,
            QUERY_QUEUE_CAPACITY,
            enable_metrics,
        )
    }

    /// Spawn a worker with explicit queue capacities (tests)
    pub fn with_capacities(
        max_records: usize,
        record_capacity: usize,
        query_capacity: usize,
        enable_metrics: bool,
    ) -> Self {
        let shared = Arc::new(JournalShared {
            queue: Mutex::new(JournalQueue {
                records: VecDeque::new(),
                queries: VecDeque::new(),
                shutdown: false,
            }),
            work_ready: Condvar::new(),
            closed: AtomicBool::new(false),
            dropped: AtomicU64::new(0),
            record_capacity,
            query_capacity,
            enable_metrics,
        });

        let worker_shared = Arc::clone(&shared);
        let handle = std::thread::Builder::new()
            .name("crs-journal".to_string())
            .spawn(move || {
                let mut state = WorkerState {
                    records: HashMap::new(),
                    ordered_ids: VecDeque::new(),
                    by_node: HashMap::new(),
                    by_generation: HashMap::new(),
                    next_id: 0,
                    max_records,
                    enable_metrics,
                };
                loop {
                    let (records, queries, shutdown) = {
                        let mut queue = worker_shared.queue.lock();
                        while queue.records.is_empty()
                            && queue.queries.is_empty()
                            && !queue.shutdown
                        {
                            worker_shared.work_ready.wait(&mut queue);
                        }
                        let records: Vec<RecordPayload> = queue.records.drain(..).collect();
                        let queries: Vec<QueryRequest> = queue.queries.drain(..).collect();
                        (records, queries, queue.shutdown)
                    };

                    // Records first: a query enqueued after a record must
                    // observe it.
                    for payload in records {
                        state.insert(payload);
                    }
                    for query in queries {
                        // A dropped receiver means the client gave up; fine.
                        let _ = query.reply.send(state.answer(&query.kind));
                    }
                    if shutdown {
                        break;
                    }
                }
            })
            .expect("journal worker thread spawns");

        DeltaHistory {
            shared,
            worker: Mutex::new(Some(handle)),
        }
    }

    /// Enqueue a record without blocking.
    ///
    /// Returns false if the journal is closed or the queue was full; the
    /// record is dropped in both cases.
    pub fn record(&self, payload: RecordPayload) -> bool {
        if self.shared.closed.load(Ordering::SeqCst) {
            return false;
        }
        let mut queue = self.shared.queue.lock();
        if queue.shutdown {
            return false;
        }
        if queue.records.len() >= self.shared.record_capacity {
            drop(queue);
            self.shared.dropped.fetch_add(1, Ordering::SeqCst);
            if self.shared.enable_metrics {
                metrics::DELTA_HISTORY_CHANNEL_FULL_TOTAL.inc();
            }
            tracing::debug!("delta history record dropped: queue full");
            return false;
        }
        queue.records.push_back(payload);
        self.shared.work_ready.notify_one();
        true
    }

    /// Number of records dropped because the queue was full
    pub fn dropped_records(&self) -> u64 {
        self.shared.dropped.load(Ordering::SeqCst)
    }

    /// Records with `from < generation <= to`, oldest first
    pub fn get_range(&self, ctx: &Context, from: u64, to: u64) -> Result<Vec<DeltaRecord>> {
        match self.query(ctx, QueryKind::Range { from, to })? {
            QueryReply::Records(records) => Ok(records),
            _ => Err(Error::SerializationError("unexpected journal reply".into())),
        }
    }

    /// Records touching `node_id`, oldest first
    pub fn get_by_node(&self, ctx: &Context, node_id: &str) -> Result<Vec<DeltaRecord>> {
        match self.query(ctx, QueryKind::ByNode(node_id.to_string()))? {
            QueryReply::Records(records) => Ok(records),
            _ => Err(Error::SerializationError("unexpected journal reply".into())),
        }
    }

    /// The record that produced `generation`, if still retained
    pub fn get_by_generation(&self, ctx: &Context, generation: u64) -> Result<Option<DeltaRecord>> {
        match self.query(ctx, QueryKind::ByGeneration(generation))? {
            QueryReply::Record(record) => Ok(record),
            _ => Err(Error::SerializationError("unexpected journal reply".into())),
        }
    }

    /// Why a node is in its current state: its records in causal order
    pub fn explain(&self, ctx: &Context, node_id: &str) -> Result<Vec<DeltaRecord>> {
        match self.query(ctx, QueryKind::Explain(node_id.to_string()))? {
            QueryReply::Records(records) => Ok(records),
            _ => Err(Error::SerializationError("unexpected journal reply".into())),
        }
    }

    /// Number of retained records
    pub fn size(&self, ctx: &Context) -> Result<usize> {
        match self.query(ctx, QueryKind::Size)? {
            QueryReply::Size(size) => Ok(size),
            _ => Err(Error::SerializationError("unexpected journal reply".into())),
        }
    }

    /// Every retained record, oldest first
    pub fn all(&self, ctx: &Context) -> Result<Vec<DeltaRecord>> {
        match self.query(ctx, QueryKind::All)? {
            QueryReply::Records(records) => Ok(records),
            _ => Err(Error::SerializationError("unexpected journal reply".into())),
        }
    }

    fn query(&self, ctx: &Context, kind: QueryKind) -> Result<QueryReply> {
        if self.shared.closed.load(Ordering::SeqCst) {
            return Err(Error::DeltaHistoryClosed);
        }
        let span = tracing::debug_span!("journal_query", name = kind.span_name());
        let _guard = span.enter();
        let timer = std::time::Instant::now();
        let label = kind.label();

        let (tx, rx) = mpsc::channel();
        let mut request = Some(QueryRequest { kind, reply: tx });

        // Enqueue, honoring cancellation while the query queue is full
        loop {
            ctx.check()?;
            let mut queue = self.shared.queue.lock();
            if queue.shutdown {
                return Err(Error::DeltaHistoryClosed);
            }
            if queue.queries.len() < self.shared.query_capacity {
                queue
                    .queries
                    .push_back(request.take().expect("request enqueued once"));
                self.shared.work_ready.notify_one();
                break;
            }
            drop(queue);
            std::thread::sleep(Duration::from_millis(1));
        }

        // Await the reply, honoring cancellation
        let reply = loop {
            match rx.recv_timeout(Duration::from_millis(10)) {
                Ok(reply) => break reply,
                Err(mpsc::RecvTimeoutError::Timeout) => ctx.check()?,
                Err(mpsc::RecvTimeoutError::Disconnected) => {
                    return Err(Error::DeltaHistoryClosed)
                }
            }
        };

        if self.shared.enable_metrics {
            metrics::DELTA_HISTORY_QUERY_DURATION_SECONDS
                .with_label_values(&[label])
                .observe(timer.elapsed().as_secs_f64());
        }
        Ok(reply)
    }

    /// Stop the worker and wait for it to finish. Idempotent; queries
    /// after close return `DeltaHistoryClosed`.
    pub fn close(&self) {
        if self.shared.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        {
            let mut queue = self.shared.queue.lock();
            queue.shutdown = true;
        }
        self.shared.work_ready.notify_all();
        if let Some(handle) = self.worker.lock().take() {
            let _ = handle.join();
        }
    }
}

impl Drop for DeltaHistory {
    fn drop(&mut self) {
        self.close();
    }
}
