#![allow(missing_docs)]
#![cfg(not(feature = "loom"))]

use std::{
    sync::{
        Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
        mpsc,
    },
    thread,
    time::{Duration, Instant},
};
use vbarrier::{
    barrier::ValidationBarrier,
    dispatch::{JobOutcome, validate_all},
    job::{Announcement, ChannelAnnouncement, ChannelUpdate, LightningNode, NodeAnnouncement},
    signal::{Shutdown, Wake},
    types::{ShortChannelId, VERTEX_LEN, Vertex},
};

const SETTLE: Duration = Duration::from_millis(50);
const DEADLINE: Duration = Duration::from_secs(5);

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn vertex(byte: u8) -> Vertex {
    Vertex::from([byte; VERTEX_LEN])
}

fn scid(n: u64) -> ShortChannelId {
    ShortChannelId::from(n)
}

fn chan_ann(n: u64, a: u8, b: u8) -> ChannelAnnouncement {
    ChannelAnnouncement {
        short_channel_id: scid(n),
        node_id_1: vertex(a),
        node_id_2: vertex(b),
    }
}

fn chan_upd(n: u64) -> ChannelUpdate {
    ChannelUpdate {
        short_channel_id: scid(n),
    }
}

fn barrier(capacity: usize) -> ValidationBarrier {
    init_tracing();
    ValidationBarrier::new(capacity, Shutdown::new()).unwrap()
}

#[test]
fn concurrent_jobs_never_exceed_capacity_or_leak_slots() {
    const CAPACITY: usize = 4;
    let barrier = barrier(CAPACITY);
    let in_flight = AtomicUsize::new(0);
    let peak = AtomicUsize::new(0);

    thread::scope(|s| {
        for _ in 0..32 {
            s.spawn(|| {
                let permit = barrier.acquire().unwrap();
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(2));
                in_flight.fetch_sub(1, Ordering::SeqCst);
                permit.release();
            });
        }
    });

    assert!(peak.load(Ordering::SeqCst) <= CAPACITY);
    assert_eq!(barrier.snapshot().available_slots, CAPACITY);
}

#[test]
fn channel_update_waits_for_its_announcement() {
    // capacity=2; announcement A for channel 7, update B for channel 7
    // submitted before A finishes.
    let barrier = barrier(2);
    let released = AtomicBool::new(false);

    let a = barrier.begin(chan_ann(7, 1, 2)).unwrap();
    assert_eq!(a.wait(), Wake::Ready);
    let b = barrier.begin(chan_upd(7)).unwrap();
    assert_eq!(barrier.snapshot().available_slots, 0);

    thread::scope(|s| {
        let waiter = s.spawn(|| {
            let wake = b.wait();
            assert!(released.load(Ordering::SeqCst), "update started before release");
            wake
        });
        thread::sleep(SETTLE);
        assert!(!waiter.is_finished());

        released.store(true, Ordering::SeqCst);
        a.finish();
        assert_eq!(waiter.join().unwrap(), Wake::Signalled);
        assert_eq!(barrier.snapshot().available_slots, 1);
    });

    b.finish();
    assert_eq!(barrier.snapshot().available_slots, 2);
}

#[test]
fn node_announcement_without_channel_does_not_block() {
    let barrier = barrier(1);
    let started = Instant::now();
    let node = NodeAnnouncement { node_id: vertex(9) };
    assert_eq!(barrier.await_dependency(&node), Wake::Ready);
    assert!(started.elapsed() < SETTLE);
}

#[test]
fn one_release_unblocks_every_dependent() {
    let barrier = barrier(16);
    let announcement = barrier.begin(chan_ann(3, 1, 2)).unwrap();

    thread::scope(|s| {
        let (tx, rx) = mpsc::channel();
        let dependents = [
            Announcement::from(chan_upd(3)),
            Announcement::from(chan_upd(3)),
            Announcement::from(NodeAnnouncement { node_id: vertex(1) }),
            Announcement::from(LightningNode { pub_key: vertex(2) }),
            Announcement::from(NodeAnnouncement { node_id: vertex(2) }),
        ];
        for dependent in dependents {
            let ticket = barrier.begin(dependent).unwrap();
            let tx = tx.clone();
            s.spawn(move || tx.send(ticket.wait()).unwrap());
        }
        drop(tx);

        thread::sleep(SETTLE);
        assert!(rx.try_recv().is_err());

        announcement.finish();
        let wakes: Vec<_> = (0..5).map(|_| rx.recv_timeout(DEADLINE).unwrap()).collect();
        assert!(wakes.iter().all(|wake| *wake == Wake::Signalled));
    });

    assert_eq!(barrier.snapshot().available_slots, 16);
}

#[test]
fn duplicate_announcements_share_one_signal() {
    let barrier = barrier(4);
    let first = barrier.begin(chan_ann(11, 1, 2)).unwrap();
    let second = barrier.begin(chan_ann(11, 1, 2)).unwrap();
    assert_eq!(barrier.snapshot().pending_announcements, 1);

    let update = barrier.begin(chan_upd(11)).unwrap();
    thread::scope(|s| {
        let waiter = s.spawn(|| update.wait());
        thread::sleep(SETTLE);
        assert!(!waiter.is_finished());

        first.finish();
        assert_eq!(waiter.join().unwrap(), Wake::Signalled);
    });

    second.finish();
    update.finish();
    let snapshot = barrier.snapshot();
    assert_eq!(snapshot.pending_announcements, 0);
    assert_eq!(snapshot.channel_dependencies, 0);
    assert_eq!(snapshot.available_slots, 4);
}

#[test]
fn stale_duplicate_does_not_release_a_new_cycle() {
    // P1 and P2 announce channel 7 together; P3 announces it again after P1
    // released. P2 finishing late must leave P3's dependents blocked.
    let barrier = barrier(4);
    let p1 = barrier.begin(chan_ann(7, 1, 2)).unwrap();
    let p2 = barrier.begin(chan_ann(7, 1, 2)).unwrap();
    p1.finish();
    let p3 = barrier.begin(chan_ann(7, 1, 2)).unwrap();
    p2.finish();
    assert_eq!(barrier.snapshot().pending_announcements, 1);

    let released = AtomicBool::new(false);
    thread::scope(|s| {
        let waiter = s.spawn(|| {
            let wake = barrier.await_dependency(&chan_upd(7));
            assert!(released.load(Ordering::SeqCst), "update ran during P3");
            wake
        });
        thread::sleep(SETTLE);
        assert!(!waiter.is_finished());

        released.store(true, Ordering::SeqCst);
        p3.finish();
        assert_eq!(waiter.join().unwrap(), Wake::Signalled);
    });

    let snapshot = barrier.snapshot();
    assert_eq!(snapshot.pending_announcements, 0);
    assert_eq!(snapshot.channel_dependencies, 0);
    assert_eq!(snapshot.available_slots, 4);
}

#[test]
fn finished_dependent_does_not_unblock_its_sibling() {
    let barrier = barrier(4);
    let announcement = barrier.begin(chan_ann(21, 1, 2)).unwrap();
    let node = NodeAnnouncement { node_id: vertex(1) };

    // A sibling dependent that gave up early still cleans up after itself.
    barrier.release_dependency(&node);

    let sibling = barrier.begin(node).unwrap();
    thread::scope(|s| {
        let waiter = s.spawn(|| sibling.wait());
        thread::sleep(SETTLE);
        assert!(!waiter.is_finished());
        announcement.finish();
        assert_eq!(waiter.join().unwrap(), Wake::Signalled);
    });
}

#[test]
fn shutdown_drains_blocked_jobs() {
    let shutdown = Shutdown::new();
    let barrier = ValidationBarrier::new(2, shutdown.clone()).unwrap();
    let announcement = barrier.begin(chan_ann(5, 1, 2)).unwrap();
    let update = barrier.begin(chan_upd(5)).unwrap();
    assert_eq!(barrier.snapshot().available_slots, 0);

    thread::scope(|s| {
        let (tx, rx) = mpsc::channel();
        for _ in 0..3 {
            let tx = tx.clone();
            let barrier = &barrier;
            s.spawn(move || tx.send(Err(barrier.acquire().is_some())).unwrap());
        }
        let waiter_tx = tx.clone();
        let update = &update;
        s.spawn(move || waiter_tx.send(Ok(update.wait())).unwrap());
        drop(tx);

        thread::sleep(SETTLE);
        assert!(rx.try_recv().is_err());

        shutdown.trigger();
        for _ in 0..4 {
            match rx.recv_timeout(DEADLINE).unwrap() {
                Err(acquired) => assert!(!acquired),
                Ok(wake) => assert_eq!(wake, Wake::Shutdown),
            }
        }
    });

    drop(update);
    drop(announcement);
    assert!(barrier.acquire().is_none());
}

#[test]
fn panicking_job_releases_slot_and_dependents() {
    let barrier = barrier(1);
    let result = thread::scope(|s| {
        s.spawn(|| {
            let ticket = barrier.begin(chan_ann(9, 1, 2)).unwrap();
            if ticket.wait().may_proceed() {
                panic!("validation body failed");
            }
        })
        .join()
    });
    assert!(result.is_err());

    let snapshot = barrier.snapshot();
    assert_eq!(snapshot.available_slots, 1);
    assert_eq!(snapshot.pending_announcements, 0);
    assert_eq!(barrier.await_dependency(&chan_upd(9)), Wake::Ready);
}

#[test]
fn dispatcher_runs_updates_after_their_announcements() {
    #[derive(Debug, PartialEq)]
    enum Event {
        Announced(u64),
        Updated(u64),
    }

    let barrier = barrier(3);
    let log = Mutex::new(Vec::new());
    let jobs = (0..8_u64).flat_map(|n| {
        [
            Announcement::from(chan_ann(n, 1, 2)),
            Announcement::from(chan_upd(n)),
            Announcement::from(chan_upd(n)),
        ]
    });

    let outcomes = validate_all(&barrier, jobs, |job| match job {
        Announcement::ChannelAnnouncement(ann) => {
            thread::sleep(Duration::from_millis(5));
            log.lock()
                .unwrap()
                .push(Event::Announced(ann.short_channel_id.to_u64()));
        }
        Announcement::ChannelUpdate(upd) => {
            log.lock()
                .unwrap()
                .push(Event::Updated(upd.short_channel_id.to_u64()));
        }
        _ => unreachable!(),
    });

    assert_eq!(outcomes.len(), 24);
    assert!(outcomes.iter().all(|o| *o == JobOutcome::Completed(())));
    let log = log.into_inner().unwrap();
    for n in 0..8 {
        let announced = log.iter().position(|e| *e == Event::Announced(n)).unwrap();
        for (idx, event) in log.iter().enumerate() {
            if *event == Event::Updated(n) {
                assert!(idx > announced, "update of {n} ran before its announcement");
            }
        }
    }
    assert_eq!(barrier.snapshot().available_slots, 3);
}
