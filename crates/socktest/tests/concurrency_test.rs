use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use socktest::errno::{ECONNREFUSED, EMFILE};
use socktest::socket::{AF_INET, AF_INET6, IPPROTO_TCP, SOCK_DGRAM, SOCK_STREAM};
use socktest::sys::{SimSyscalls, SysOp};
use socktest::{Cookie, Errno, Filter, FilterType, Switch};

const THREADS: usize = 8;
const PER_THREAD: u64 = 200;

#[test]
fn concurrent_opens_are_all_counted() {
    let sw = Arc::new(Switch::new(SimSyscalls::new()));
    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let sw = Arc::clone(&sw);
            thread::spawn(move || {
                (0..PER_THREAD)
                    .map(|_| sw.socket(AF_INET, SOCK_STREAM, IPPROTO_TCP).unwrap())
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let mut fds: Vec<i32> = handles
        .into_iter()
        .flat_map(|h| h.join().unwrap())
        .collect();
    fds.sort_unstable();
    fds.dedup();

    let total = THREADS as u64 * PER_THREAD;
    assert_eq!(fds.len() as u64, total);
    assert_eq!(sw.sockets().len() as u64, total);
    let st = sw.stat(Cookie::new(AF_INET, SOCK_STREAM, IPPROTO_TCP)).unwrap();
    assert_eq!(st.opened, total);
    assert_eq!(st.open_failed, 0);
}

#[test]
fn concurrent_open_close_cycles_balance() {
    let sw = Arc::new(Switch::new(SimSyscalls::new()));
    let handles: Vec<_> = (0..THREADS)
        .map(|i| {
            let sw = Arc::clone(&sw);
            let family = if i % 2 == 0 { AF_INET } else { AF_INET6 };
            thread::spawn(move || {
                for _ in 0..PER_THREAD {
                    let fd = sw.socket(family, SOCK_DGRAM, 0).unwrap();
                    sw.close(fd).unwrap();
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    assert!(sw.sockets().is_empty());
    assert!(sw.syscalls().open_descriptors().is_empty());
    let half = THREADS as u64 / 2 * PER_THREAD;
    for family in [AF_INET, AF_INET6] {
        let st = sw.stat(Cookie::new(family, SOCK_DGRAM, 0)).unwrap();
        assert_eq!((st.opened, st.closed), (half, half));
    }
}

#[test]
fn filter_swaps_during_traffic_keep_counts_consistent() {
    let sw = Arc::new(Switch::new(SimSyscalls::new()));
    let stop = Arc::new(AtomicBool::new(false));

    let flipper = {
        let sw = Arc::clone(&sw);
        let stop = Arc::clone(&stop);
        thread::spawn(move || {
            let mut on = false;
            while !stop.load(Ordering::Relaxed) {
                on = !on;
                let filter = on.then(|| Filter::fail(Errno(EMFILE)));
                sw.set(FilterType::Socket, filter);
                thread::yield_now();
            }
        })
    };

    let workers: Vec<_> = (0..THREADS)
        .map(|_| {
            let sw = Arc::clone(&sw);
            thread::spawn(move || {
                let mut results = (0u64, 0u64);
                for _ in 0..PER_THREAD {
                    match sw.socket(AF_INET, SOCK_STREAM, 0) {
                        Ok(fd) => {
                            results.0 += 1;
                            sw.close(fd).unwrap();
                        }
                        Err(errno) => {
                            assert_eq!(errno, Errno(EMFILE));
                            results.1 += 1;
                        }
                    }
                }
                results
            })
        })
        .collect();

    let (ok, failed) = workers
        .into_iter()
        .map(|h| h.join().unwrap())
        .fold((0, 0), |acc, r| (acc.0 + r.0, acc.1 + r.1));
    stop.store(true, Ordering::Relaxed);
    flipper.join().unwrap();

    let st = sw.stat(Cookie::new(AF_INET, SOCK_STREAM, 0)).unwrap();
    assert_eq!(st.opened, ok);
    assert_eq!(st.open_failed, failed);
    assert_eq!(st.closed, ok);
    assert_eq!(sw.syscalls().calls(SysOp::Socket), ok);
}

#[test]
fn filters_run_without_holding_the_switch() {
    let sw = Arc::new(Switch::new(SimSyscalls::new()));
    let fd = sw.socket(AF_INET, SOCK_STREAM, 0).unwrap();

    let inner = Arc::clone(&sw);
    sw.set(
        FilterType::Connect,
        Filter::new(move |so| {
            // Re-entering the switch from a filter must not deadlock.
            assert_eq!(inner.sockets().len(), 1);
            assert!(inner.stat(so.cookie).is_some());
            Err(Errno(ECONNREFUSED))
        }),
    );

    let addr: SocketAddr = "127.0.0.1:1".parse().unwrap();
    assert_eq!(sw.connect(fd, &addr), Err(Errno(ECONNREFUSED)));
    sw.set(FilterType::Connect, None);
}

#[test]
fn snapshots_taken_under_load_are_well_formed() {
    let sw = Arc::new(Switch::new(SimSyscalls::new()));
    let stop = Arc::new(AtomicBool::new(false));

    let reader = {
        let sw = Arc::clone(&sw);
        let stop = Arc::clone(&stop);
        thread::spawn(move || {
            while !stop.load(Ordering::Relaxed) {
                for st in sw.stats() {
                    assert!(!st.cookie().is_zero());
                    assert!(st.closed <= st.opened);
                }
                assert!(sw.sockets().values().all(|so| !so.cookie.is_zero()));
            }
        })
    };

    let workers: Vec<_> = (0..THREADS)
        .map(|_| {
            let sw = Arc::clone(&sw);
            thread::spawn(move || {
                for _ in 0..PER_THREAD {
                    let fd = sw.socket(AF_INET6, SOCK_STREAM, IPPROTO_TCP).unwrap();
                    sw.close(fd).unwrap();
                }
            })
        })
        .collect();
    for h in workers {
        h.join().unwrap();
    }
    stop.store(true, Ordering::Relaxed);
    reader.join().unwrap();
}
