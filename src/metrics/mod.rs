//! Process-wide counters for space traffic.
//!
//! Counters are monotone and shared by every space in the process; the
//! per-cache numbers of the snapshot layer are kept separately.
use lazy_static::lazy_static;
use prometheus::Encoder;
use prometheus::IntCounter;
use prometheus::IntCounterVec;
use prometheus::Opts;
use prometheus::Registry;
use tracing::error;


lazy_static! {
    pub static ref REGISTRY: Registry = {
        let registry = Registry::new();
        register_custom_metrics(&registry);
        registry
    };

    pub static ref VALUES_INSERTED: IntCounter = IntCounter::new(
        "pathspace_values_inserted",
        "Values appended to node queues"
    )
    .expect("metric can not be created");

    pub static ref TASKS_INSERTED: IntCounter = IntCounter::new(
        "pathspace_tasks_inserted",
        "Callables placed as pending slots"
    )
    .expect("metric can not be created");

    pub static ref TAKES: IntCounter = IntCounter::new(
        "pathspace_takes",
        "Values removed by take"
    )
    .expect("metric can not be created");

    pub static ref BLOCK_TIMEOUTS: IntCounter = IntCounter::new(
        "pathspace_block_timeouts",
        "Blocking reads and takes that ran out of time"
    )
    .expect("metric can not be created");

    pub static ref TASK_FAILURES: IntCounter = IntCounter::new(
        "pathspace_task_failures",
        "Callables that panicked"
    )
    .expect("metric can not be created");

    pub static ref SNAPSHOT_LOOKUPS: IntCounterVec = IntCounterVec::new(
        Opts::new("pathspace_snapshot_lookups", "Snapshot cache lookups by outcome"),
        &["outcome"]
    )
    .expect("metric can not be created");
}

fn register_custom_metrics(registry: &Registry) {
    registry
        .register(Box::new(VALUES_INSERTED.clone()))
        .expect("collector can be registered");
    registry
        .register(Box::new(TASKS_INSERTED.clone()))
        .expect("collector can be registered");
    registry
        .register(Box::new(TAKES.clone()))
        .expect("collector can be registered");
    registry
        .register(Box::new(BLOCK_TIMEOUTS.clone()))
        .expect("collector can be registered");
    registry
        .register(Box::new(TASK_FAILURES.clone()))
        .expect("collector can be registered");
    registry
        .register(Box::new(SNAPSHOT_LOOKUPS.clone()))
        .expect("collector can be registered");
}

/// Renders every registered metric in the text exposition format
pub fn gather_text() -> String {
    let encoder = prometheus::TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&REGISTRY.gather(), &mut buffer) {
        error!("could not encode custom metrics: {}", e);
        return String::new();
    }
    match String::from_utf8(buffer) {
        Ok(text) => text,
        Err(e) => {
            error!("custom metrics could not be from_utf8'd: {}", e);
            String::new()
        }
    }
}
