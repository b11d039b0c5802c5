#[macro_use]
extern crate criterion;
extern crate even6_binxml;

#[path = "../tests/builder.rs"]
mod builder;

use criterion::{Criterion, Throughput};
use even6_binxml::{BinXmlParser, ParserSettings, decode, render};

fn criterion_benchmark(c: &mut Criterion) {
    let event = builder::sample_event();
    let document = decode(&event).unwrap();

    let mut group = c.benchmark_group("sample_event");
    group.throughput(Throughput::Bytes(event.len() as u64));
    group.bench_function("decode", |b| {
        b.iter(|| criterion::black_box(decode(&event).unwrap()))
    });
    group.bench_function("render", |b| {
        b.iter(|| criterion::black_box(render(&document, true).unwrap()))
    });
    group.bench_function("decode and render", |b| {
        b.iter(|| criterion::black_box(even6_binxml::render_bytes(&event, true).unwrap()))
    });
    group.finish();

    let batch: Vec<Vec<u8>> = (0..1000).map(|_| event.clone()).collect();
    let parser = BinXmlParser::new().with_configuration(ParserSettings::new().num_threads(0));
    c.bench_function("render 1000 events", |b| {
        b.iter(|| {
            for r in parser.render_many(&batch) {
                criterion::black_box(r.unwrap());
            }
        })
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
