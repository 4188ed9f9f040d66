//! Benchmarks for normalization and reassembly throughput.
//!
//! Run with: cargo bench
//!
//! Tables are synthetic: wrapped names every third row, mixed locales and
//! blank currencies to exercise forward fill.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use pdfholdings::config::{ColumnRole, ExtractionConfig, NumericLocale, TableConfig};
use pdfholdings::error::NumericField;
use pdfholdings::model::{DocumentId, RawRecord};
use pdfholdings::normalize::{FieldNormalizer, NumericParser};
use pdfholdings::reassemble::RecordReassembler;
use pdfholdings::{Anchor, FundRequest, LocatorConfig, MemoryDocument, MemoryPage};

fn columns() -> Vec<ColumnRole> {
    vec![
        ColumnRole::HoldingName,
        ColumnRole::Currency,
        ColumnRole::MarketValue,
        ColumnRole::NetAssets,
    ]
}

fn config() -> ExtractionConfig {
    ExtractionConfig::new("bench", TableConfig::new(vec![300.0, 360.0, 450.0], columns()))
        .with_locator(LocatorConfig::new().with_anchor(Anchor::literal("Portefeuille")))
}

/// Creates raw rows with a wrapped name every third holding.
fn create_rows(count: usize) -> Vec<RawRecord> {
    let mut rows = Vec::with_capacity(count * 2);
    for i in 0..count {
        if i % 3 == 0 {
            rows.push(RawRecord {
                holding_name: format!("Holding {} Long Name", i),
                page: 1,
                ..Default::default()
            });
        }
        rows.push(RawRecord {
            holding_name: format!("Part {}", i),
            currency: if i % 5 == 0 { "EUR".into() } else { String::new() },
            market_value: format!("{}.{:03},{:02}", i % 900 + 1, i % 1000, i % 100),
            net_assets: format!("0,{:02}", i % 100),
            page: 1 + (i / 40) as u32,
        });
    }
    rows
}

/// Benchmark the numeric rules on typical cells.
fn bench_numeric(c: &mut Criterion) {
    let parser = NumericParser::new(NumericLocale::comma_decimal());
    let cells = ["1.234.567,89", "(12,50)", "–", "0,52 %", "12\u{202F}000", "n/a"];

    c.bench_function("numeric_cells", |b| {
        b.iter(|| {
            for cell in cells {
                let _ = parser.parse(black_box(cell), NumericField::NetAssets);
            }
        });
    });
}

/// Benchmark reassembly and normalization at various sizes.
fn bench_normalize(c: &mut Criterion) {
    let mut group = c.benchmark_group("normalize");
    let config = config();
    let reassembler = RecordReassembler::new(columns());
    let normalizer = FieldNormalizer::new(&config);
    let id = DocumentId::new("bench.pdf");

    for count in [100, 1000, 5000].iter() {
        let rows = create_rows(*count);

        group.bench_function(format!("{}_rows", count), |b| {
            b.iter(|| {
                let reassembled = reassembler.reassemble(black_box(rows.clone()));
                normalizer.normalize(reassembled.records, &id, None)
            });
        });
    }

    group.finish();
}

/// Benchmark a full pipeline run over an in-memory page.
fn bench_pipeline(c: &mut Criterion) {
    let mut page = MemoryPage::new().line(&[(40.0, "Portefeuille Fund Alpha")]);
    for i in 0..50 {
        let name = format!("Holding {}", i);
        page = page.line(&[
            (40.0, name.as_str()),
            (310.0, "EUR"),
            (370.0, "1.000,00"),
            (470.0, "0,50"),
        ]);
    }
    let doc = MemoryDocument::new("bench.pdf").push_page(page);
    let config = config();
    let request = FundRequest::new("Fund Alpha");

    c.bench_function("pipeline_one_page", |b| {
        b.iter(|| pdfholdings::extract_fund(black_box(&doc), &request, &config));
    });
}

criterion_group!(benches, bench_numeric, bench_normalize, bench_pipeline);
criterion_main!(benches);
