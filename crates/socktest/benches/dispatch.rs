use std::net::SocketAddr;

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use socktest::errno::ECONNREFUSED;
use socktest::socket::{AF_INET, IPPROTO_TCP, SO_ERROR, SOCK_STREAM, SOL_SOCKET};
use socktest::sys::SimSyscalls;
use socktest::{Errno, Filter, FilterType, Switch, Syscalls};

fn open_close<S: Syscalls>(sys: &S) {
    let fd = sys
        .socket(black_box(AF_INET), SOCK_STREAM, IPPROTO_TCP)
        .unwrap();
    sys.close(black_box(fd)).unwrap();
}

fn benchmark_dispatch_paths(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispatch_paths");

    let bare = SimSyscalls::new();
    group.bench_function(BenchmarkId::new("open_close", "bare"), |b| {
        b.iter(|| open_close(&bare));
    });

    let switch = Switch::new(SimSyscalls::new());
    group.bench_function(BenchmarkId::new("open_close", "switch"), |b| {
        b.iter(|| open_close(&switch));
    });

    let filtered = Switch::new(SimSyscalls::new());
    filtered.set(FilterType::Socket, Filter::then(|_| Ok(())));
    filtered.set(FilterType::Close, Filter::then(|_| Ok(())));
    group.bench_function(BenchmarkId::new("open_close", "switch_filtered"), |b| {
        b.iter(|| open_close(&filtered));
    });

    let fd = switch.socket(AF_INET, SOCK_STREAM, IPPROTO_TCP).unwrap();
    group.bench_function(BenchmarkId::new("so_error", "switch"), |b| {
        b.iter(|| black_box(switch.getsockopt_int(fd, SOL_SOCKET, SO_ERROR)));
    });

    let addr: SocketAddr = "127.0.0.1:9".parse().unwrap();
    switch.set(FilterType::Connect, Filter::fail(Errno(ECONNREFUSED)));
    group.bench_function(BenchmarkId::new("connect", "cancelled"), |b| {
        b.iter(|| black_box(switch.connect(fd, &addr)));
    });

    group.finish();
}

criterion_group!(benches, benchmark_dispatch_paths);
criterion_main!(benches);
