use std::collections::HashSet;
use std::sync::Arc;
use std::sync::Barrier;
use std::thread;

use pathspace::SpaceError;
use pathspace::SpaceExt;

use crate::common::space;
use crate::common::PATIENCE;

const PRODUCERS: u32 = 4;
const PER_PRODUCER: u32 = 250;

#[test]
fn producers_keep_their_own_order() {
    let space = space();
    let start = Arc::new(Barrier::new(PRODUCERS as usize));

    let producers: Vec<_> = (0..PRODUCERS)
        .map(|producer| {
            let space = space.clone();
            let start = Arc::clone(&start);
            thread::spawn(move || {
                start.wait();
                for seq in 0..PER_PRODUCER {
                    assert!(space.insert("/queue", (producer, seq)).is_ok());
                }
            })
        })
        .collect();

    let mut last_seen = vec![None; PRODUCERS as usize];
    for _ in 0..PRODUCERS * PER_PRODUCER {
        let (producer, seq): (u32, u32) = space.take_block("/queue", PATIENCE).unwrap();
        let last = &mut last_seen[producer as usize];
        if let Some(previous) = *last {
            assert!(seq > previous, "producer {producer} reordered: {previous} then {seq}");
        }
        *last = Some(seq);
    }

    for handle in producers {
        handle.join().unwrap();
    }
    assert!(last_seen.iter().all(|seq| *seq == Some(PER_PRODUCER - 1)));
    assert!(matches!(
        space.take::<(u32, u32)>("/queue"),
        Err(SpaceError::NoObjectFound { .. })
    ));
}

#[test]
fn each_value_is_taken_exactly_once() {
    const VALUES: u32 = 2_000;
    const CONSUMERS: usize = 8;

    let space = space();
    for i in 0..VALUES {
        space.insert("/work", i);
    }

    let start = Arc::new(Barrier::new(CONSUMERS));
    let consumers: Vec<_> = (0..CONSUMERS)
        .map(|_| {
            let space = space.clone();
            let start = Arc::clone(&start);
            thread::spawn(move || {
                start.wait();
                let mut taken = Vec::new();
                while let Ok(value) = space.take::<u32>("/work") {
                    taken.push(value);
                }
                taken
            })
        })
        .collect();

    let mut all = Vec::new();
    for handle in consumers {
        all.extend(handle.join().unwrap());
    }
    assert_eq!(all.len(), VALUES as usize);
    let unique: HashSet<u32> = all.into_iter().collect();
    assert_eq!(unique.len(), VALUES as usize);
}

#[test]
fn concurrent_reads_do_not_consume() {
    let space = space();
    space.insert("/shared", "hello".to_string());

    let readers: Vec<_> = (0..8)
        .map(|_| {
            let space = space.clone();
            thread::spawn(move || {
                for _ in 0..200 {
                    assert_eq!(space.read::<String>("/shared").unwrap(), "hello");
                }
            })
        })
        .collect();
    for handle in readers {
        handle.join().unwrap();
    }
    assert_eq!(space.take::<String>("/shared").unwrap(), "hello");
}

#[test]
fn blocked_takers_split_the_values() {
    const TAKERS: usize = 6;

    let space = space();
    let takers: Vec<_> = (0..TAKERS)
        .map(|_| {
            let space = space.clone();
            thread::spawn(move || space.take_block::<usize>("/inbox", PATIENCE))
        })
        .collect();

    for i in 0..TAKERS {
        space.insert("/inbox", i);
    }

    let mut got: Vec<usize> = takers
        .into_iter()
        .map(|handle| handle.join().unwrap().unwrap())
        .collect();
    got.sort_unstable();
    assert_eq!(got, (0..TAKERS).collect::<Vec<_>>());
}
