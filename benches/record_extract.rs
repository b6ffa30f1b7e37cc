// benches/record_extract.rs
use criterion::{Criterion, black_box, criterion_group, criterion_main};

use emr_scrape::core::html::Page;
use emr_scrape::specs::listing::extract_listing;
use emr_scrape::specs::patient::{extract_record, raw_inputs};

fn load(name: &str) -> String {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/");
    std::fs::read_to_string(format!("{path}{name}")).expect("read fixture")
}

fn bench_details(c: &mut Criterion) {
    let html = load("details.html");
    let page = Page::parse(&html);

    c.bench_function("parse_details", |b| b.iter(|| Page::parse(black_box(&html))));

    c.bench_function("extract_record", |b| {
        b.iter(|| {
            let (rec, _) = extract_record(black_box(page.document()));
            black_box(rec.populated())
        })
    });

    c.bench_function("raw_inputs", |b| b.iter(|| black_box(raw_inputs(page.document()).len())));
}

fn bench_listing(c: &mut Criterion) {
    let page = Page::parse(&load("listing.html"));
    c.bench_function("extract_listing", |b| {
        b.iter(|| black_box(extract_listing(black_box(&page)).patients().len()))
    });
}

criterion_group!(benches, bench_details, bench_listing);
criterion_main!(benches);
