use pathspace::path::Path;
use pathspace::InOptions;
use pathspace::PathSpace;
use pathspace::Space;
use pathspace::SpaceError;
use pathspace::SpaceExt;

use crate::common::space;

fn paths(found: &[Path]) -> Vec<&str> {
    found.iter().map(Path::as_str).collect()
}

#[test]
fn enumeration_is_a_point_in_time_view() {
    let space = space();
    space.insert("/a", 1i32);
    space.insert("/b", 2i32);

    let matches = space.find("/*").unwrap();
    assert_eq!(paths(&matches), ["/a", "/b"]);

    space.insert("/c", 3i32);
    assert_eq!(paths(&matches), ["/a", "/b"]);
    assert_eq!(paths(&space.find("/*").unwrap()), ["/a", "/b", "/c"]);

    let all = space.read_all::<i32>("/*").unwrap();
    let values: Vec<i32> = all.into_iter().map(|(_, v)| v.unwrap()).collect();
    assert_eq!(values, [1, 2, 3]);
}

#[test]
fn broadcast_insert_reaches_every_existing_match() {
    let space = space();
    for room in ["kitchen", "hall", "attic"] {
        space.insert(&format!("/rooms/{room}/temp"), 20i32);
    }

    let ret = space.insert("/rooms/*/setpoint", 22i32);
    assert!(ret.is_ok());
    assert_eq!(ret.values_inserted, 3);
    for room in ["kitchen", "hall", "attic"] {
        assert_eq!(space.read::<i32>(&format!("/rooms/{room}/setpoint")), Ok(22));
    }

    let none = space.insert("/garages/*/door", true);
    assert_eq!(none.values_inserted, 0);
    assert!(none.is_ok());
    assert!(space.list_children("/").unwrap().iter().all(|c| c != "garages"));
}

#[test]
fn broadcast_partially_succeeds_across_mounts() {
    let space = space();
    let mounted = PathSpace::new().unwrap();
    space.insert("/hosts/local/up", true);
    assert_eq!(space.mount("/hosts/remote", mounted.clone()).spaces_inserted, 1);
    mounted.shutdown();

    let ret = space.insert_with("/hosts/*/inbox", 7i32, InOptions::default().replace_existing());
    assert_eq!(ret.values_inserted, 1);
    assert!(matches!(ret.errors.as_slice(), [SpaceError::InvalidPermissions(_)]));
    assert!(!ret.is_ok());
    assert_eq!(space.read::<i32>("/hosts/local/inbox"), Ok(7));
}

#[test]
fn multi_level_glob_finds_deep_matches() {
    let space = space();
    space.insert("/logs/app/error", "disk".to_string());
    space.insert("/logs/app/db/error", "timeout".to_string());
    space.insert("/logs/web/info", "ok".to_string());

    let found = space.find("/logs/**/error").unwrap();
    assert_eq!(paths(&found), ["/logs/app/error", "/logs/app/db/error"]);

    assert_eq!(space.take::<String>("/logs/**/error"), Ok("disk".to_string()));
    assert_eq!(space.take::<String>("/logs/**/error"), Ok("timeout".to_string()));
    assert!(matches!(
        space.take::<String>("/logs/**/error"),
        Err(SpaceError::NoObjectFound { .. })
    ));
}

#[test]
fn glob_remove_detaches_every_match() {
    let space = space();
    space.insert("/tmp/a/x", 1i32);
    space.insert("/tmp/a/y", 1i32);
    space.insert("/tmp/b", 1i32);
    space.insert("/keep", 1i32);

    assert_eq!(space.remove("/tmp/*"), Ok(3));
    assert_eq!(space.list_children("/tmp").unwrap(), Vec::<String>::new());
    assert_eq!(space.read::<i32>("/keep"), Ok(1));
}
