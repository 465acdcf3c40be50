use criterion::{black_box, criterion_group, criterion_main, Criterion};
use ahk::host::{self, SharedBuffer};
use ahk::Embedder;

fn make_script(calls: usize) -> String {
    let mut src = String::from("import ahk\n");
    for _ in 0..calls {
        src.push_str("ahk.callcmd('MsgBox')\n");
    }
    src
}

fn bench_calls(c: &mut Criterion) {
    let out = SharedBuffer::new();
    let mut emb = Embedder::new();
    host::register(&mut emb, out.clone()).expect("register");
    emb.start_interpreter().expect("start");

    let one = make_script(1);
    let many = make_script(1000);

    c.bench_function("callcmd x1", |b| {
        b.iter(|| {
            emb.run_script(black_box(&one)).expect("run");
            out.clear();
        })
    });

    c.bench_function("callcmd x1000", |b| {
        b.iter(|| {
            emb.run_script(black_box(&many)).expect("run");
            out.clear();
        })
    });

    emb.shutdown_interpreter();
}

fn bench_session(c: &mut Criterion) {
    c.bench_function("register+start+run+shutdown", |b| {
        b.iter(|| {
            let mut emb = Embedder::new();
            host::register(&mut emb, SharedBuffer::new()).expect("register");
            emb.run_once(black_box(host::DEFAULT_SCRIPT)).expect("run");
        })
    });
}

criterion_group!(benches, bench_calls, bench_session);
criterion_main!(benches);
