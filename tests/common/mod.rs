use std::thread;
use std::time::Duration;
use std::time::Instant;

use pathspace::config::SpaceConfig;
use pathspace::config::TaskPoolConfig;
use pathspace::PathSpace;

/// Upper bound for anything a test waits on
pub const PATIENCE: Duration = Duration::from_secs(5);

pub fn space_with_workers(workers: usize) -> PathSpace {
    PathSpace::with_config(&SpaceConfig {
        task_pool: TaskPoolConfig {
            worker_threads: workers,
            ..Default::default()
        },
        ..Default::default()
    })
    .unwrap()
}

pub fn space() -> PathSpace {
    space_with_workers(4)
}

/// Polls `condition` until it holds or [`PATIENCE`] runs out
#[allow(dead_code)]
pub fn wait_for(
    what: &str,
    mut condition: impl FnMut() -> bool,
) {
    let deadline = Instant::now() + PATIENCE;
    while !condition() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        thread::sleep(Duration::from_millis(5));
    }
}
