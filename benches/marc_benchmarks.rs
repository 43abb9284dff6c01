#![allow(missing_docs)]
//! Benchmarks for the MARC record engine.
//!
//! Records are generated in memory, so the suite needs no fixtures. Covers
//! building, assembling, parsing, and stream reading using Criterion.rs.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use marc_engine::{MarcReader, Record, SortOptions};
use std::io::Cursor;

/// Build a record of roughly catalog size, with fields added out of tag order.
fn build_record(serial: usize) -> Record {
    let mut record = Record::new();
    record.add_field(245).unwrap();
    record.add_subfield(b'a', format!("Title number {serial} /").as_bytes()).unwrap();
    record.add_subfield(b'c', b"edited by A. Person.").unwrap();
    record.add_field(1).unwrap();
    record.add_subfield(0, format!("ocm{serial:08}").as_bytes()).unwrap();
    record.add_field(8).unwrap();
    record.add_subfield(0, b"750101s1925    nyu           000 1 eng  ").unwrap();
    for topic in ["History", "Geography", "Description and travel"] {
        record.add_field(650).unwrap();
        record.add_subfield(b'a', b"United States").unwrap();
        record.add_subfield(b'x', topic.as_bytes()).unwrap();
    }
    record.add_field(100).unwrap();
    record.add_subfield(b'a', b"Person, A.").unwrap();
    record.add_subfield(b'd', b"1900-1980.").unwrap();
    record
}

fn stream_of(count: usize) -> Vec<u8> {
    (0..count)
        .flat_map(|serial| build_record(serial).to_bytes().unwrap())
        .collect()
}

/// Benchmark building one record field by field.
fn benchmark_build(c: &mut Criterion) {
    c.bench_function("build_record", |b| {
        b.iter(|| build_record(black_box(42)));
    });
}

/// Benchmark assembly with default (field) sorting and with subfield sorting.
fn benchmark_assemble(c: &mut Criterion) {
    let mut record = build_record(42);
    c.bench_function("assemble_record", |b| {
        b.iter(|| black_box(record.get_record().unwrap().len()));
    });

    let mut sorted = build_record(42);
    sorted
        .set_sort_options(SortOptions {
            sort_subfields: true,
            ..SortOptions::default()
        })
        .unwrap();
    c.bench_function("assemble_record_sorted_subfields", |b| {
        b.iter(|| black_box(sorted.get_record().unwrap().len()));
    });
}

/// Benchmark parsing into a reused record, then into fresh ones.
fn benchmark_parse(c: &mut Criterion) {
    let bytes = black_box(build_record(42).to_bytes().unwrap());
    let mut record = Record::new();
    c.bench_function("load_record_reused", |b| {
        b.iter(|| record.load_record(&bytes).unwrap());
    });
    c.bench_function("from_bytes", |b| {
        b.iter(|| Record::from_bytes(&bytes).unwrap());
    });
}

/// Benchmark reading 1,000 records with one field lookup each.
fn benchmark_read_1k(c: &mut Criterion) {
    let stream = black_box(stream_of(1_000));
    c.bench_function("read_1k_records_with_lookup", |b| {
        b.iter(|| {
            let mut reader = MarcReader::new(Cursor::new(&stream));
            let mut record = Record::new();
            let mut found = 0;
            while reader.read_into(&mut record).unwrap() {
                if record.get_field(650, -1).is_ok() && record.get_subfield(b'x', 0).is_ok() {
                    found += 1;
                }
            }
            found
        });
    });
}

criterion_group!(
    benches,
    benchmark_build,
    benchmark_assemble,
    benchmark_parse,
    benchmark_read_1k,
);
criterion_main!(benches);
