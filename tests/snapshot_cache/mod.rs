use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use pathspace::config::SnapshotConfig;
use pathspace::snapshot::SnapshotCachedSpace;
use pathspace::snapshot::SnapshotOptions;
use pathspace::InOptions;
use pathspace::Space;
use pathspace::SpaceExt;

use crate::common::space;
use crate::common::wait_for;

fn manual_cache() -> SnapshotCachedSpace {
    SnapshotCachedSpace::with_options(
        Arc::new(space()),
        SnapshotOptions::enabled()
            .synchronous_rebuild()
            .rebuild_debounce(Duration::from_secs(60)),
    )
}

#[test]
fn dirty_isolation_and_promotion() {
    let cache = SnapshotCachedSpace::with_options(
        Arc::new(space()),
        SnapshotOptions::enabled()
            .synchronous_rebuild()
            .rebuild_debounce(Duration::from_secs(60))
            .max_dirty_roots(3),
    );
    cache.insert("/stable", "steady".to_string());
    cache.insert("/churn", 0i32);
    assert!(cache.rebuild_snapshot_now());

    cache.insert_with("/churn", 1i32, InOptions::default().replace_existing());
    assert_eq!(cache.read::<String>("/stable"), Ok("steady".to_string()));
    assert_eq!(cache.read::<i32>("/churn"), Ok(1));
    let metrics = cache.snapshot_metrics();
    assert_eq!((metrics.hits, metrics.misses), (1, 1));

    for i in 0..3 {
        cache.insert(&format!("/noise{i}"), i);
    }
    assert_eq!(cache.read::<String>("/stable"), Ok("steady".to_string()));
    let metrics = cache.snapshot_metrics();
    assert_eq!((metrics.hits, metrics.misses), (1, 2));
}

#[test]
fn writes_through_the_backing_space_are_invisible_until_rebuilt() {
    let backing = Arc::new(space());
    let cache = SnapshotCachedSpace::with_options(
        backing.clone(),
        SnapshotOptions::enabled()
            .synchronous_rebuild()
            .rebuild_debounce(Duration::from_secs(60)),
    );
    cache.insert("/config", 1i32);
    assert!(cache.rebuild_snapshot_now());

    backing.insert_with("/config", 2i32, InOptions::default().replace_existing());
    assert_eq!(cache.read::<i32>("/config"), Ok(1));

    assert!(cache.rebuild_snapshot_now());
    assert_eq!(cache.read::<i32>("/config"), Ok(2));
}

#[test]
fn readers_see_fresh_values_after_writers_finish() {
    let cache = Arc::new(SnapshotCachedSpace::with_config(
        Arc::new(space()),
        &SnapshotConfig {
            enabled: true,
            rebuild_debounce_ms: 1,
            ..Default::default()
        },
    ));
    cache.insert("/counter", 0u32);

    let done = Arc::new(AtomicBool::new(false));
    let readers: Vec<_> = (0..4)
        .map(|_| {
            let cache = Arc::clone(&cache);
            let done = Arc::clone(&done);
            thread::spawn(move || {
                let mut reads = 0u32;
                while !done.load(Ordering::SeqCst) {
                    let value = cache.read::<u32>("/counter").unwrap();
                    assert!(value < 500);
                    reads += 1;
                }
                reads
            })
        })
        .collect();

    for i in 1..500u32 {
        cache.insert_with("/counter", i, InOptions::default().replace_existing());
    }
    done.store(true, Ordering::SeqCst);
    for handle in readers {
        assert!(handle.join().unwrap() > 0);
    }

    assert_eq!(cache.read::<u32>("/counter"), Ok(499));
    wait_for("snapshot to settle", || cache.dirty_roots().is_empty());
    assert_eq!(cache.read::<u32>("/counter"), Ok(499));
    assert!(cache.snapshot_metrics().rebuilds >= 1);
}

#[test]
fn disabling_stops_serving_from_the_copy() {
    let cache = manual_cache();
    cache.insert("/a", 1i32);
    assert!(cache.rebuild_snapshot_now());
    assert_eq!(cache.read::<i32>("/a"), Ok(1));
    assert_eq!(cache.snapshot_metrics().hits, 1);

    cache.set_snapshot_options(SnapshotOptions::default());
    assert!(!cache.snapshot_enabled());
    assert_eq!(cache.read::<i32>("/a"), Ok(1));
    assert_eq!(cache.snapshot_metrics().hits, 0);
}

#[test]
fn cache_is_usable_as_a_trait_object() {
    let cache: Arc<dyn Space> = Arc::new(manual_cache());
    cache.insert("/dyn", 5i32);
    assert_eq!(cache.take::<i32>("/dyn"), Ok(5));
    cache.shutdown();
}
