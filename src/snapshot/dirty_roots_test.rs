use super::*;
use crate::path::Path;

fn p(text: &str) -> Path {
    Path::parse(text).unwrap()
}

#[test]
fn covered_paths_are_not_tracked_twice() {
    let mut roots = DirtyRoots::new(8);
    roots.mark(&p("/a"));
    roots.mark(&p("/a/b/c"));
    assert_eq!(roots.roots(), &[p("/a")]);
    assert!(roots.covers(&p("/a/b")));
    assert!(roots.covers(&p("/a")));
    assert!(!roots.covers(&p("/ab")));
    assert!(!roots.covers(&p("/b")));
}

#[test]
fn ancestor_absorbs_descendants() {
    let mut roots = DirtyRoots::new(8);
    roots.mark(&p("/a/x"));
    roots.mark(&p("/a/y"));
    roots.mark(&p("/b"));
    assert_eq!(roots.len(), 3);

    roots.mark(&p("/a"));
    assert_eq!(roots.roots(), &[p("/b"), p("/a")]);
}

#[test]
fn exceeding_cap_promotes_to_root() {
    let mut roots = DirtyRoots::new(2);
    roots.mark(&p("/a"));
    roots.mark(&p("/b"));
    assert!(!roots.is_fully_dirty());

    roots.mark(&p("/c"));
    assert!(roots.is_fully_dirty());
    assert_eq!(roots.roots(), &[Path::root()]);
    assert!(roots.covers(&p("/unrelated/deep")));
}

#[test]
fn patterns_mark_their_literal_prefix() {
    let mut roots = DirtyRoots::new(8);
    roots.mark(&p("/sensors/*/temp"));
    assert_eq!(roots.roots(), &[p("/sensors")]);
    assert!(roots.covers(&p("/sensors/kitchen/temp")));
    assert!(!roots.covers(&p("/actuators")));

    roots.mark(&p("/*/x"));
    assert!(roots.is_fully_dirty());
}

#[test]
fn zero_cap_is_clamped() {
    let mut roots = DirtyRoots::new(0);
    assert_eq!(roots.cap(), 1);
    roots.mark(&p("/a"));
    assert!(!roots.is_fully_dirty());
    roots.mark(&p("/b"));
    assert!(roots.is_fully_dirty());
}

#[test]
fn clear_empties_the_set() {
    let mut roots = DirtyRoots::new(4);
    roots.mark_all();
    assert!(!roots.is_empty());
    roots.clear();
    assert!(roots.is_empty());
    assert!(!roots.covers(&p("/a")));
}
