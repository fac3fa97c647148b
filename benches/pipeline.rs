use std::{fs, io::Cursor, path::PathBuf};

use criterion::{BatchSize, BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use snp_matcher::{
    InputSource, Pipeline, PipelineConfig, ReferenceEntry, ReferenceTable, chunk::ChunkedRows,
    grouping::group_records,
};
use tempfile::tempdir;

fn create_reference(entries: usize) -> ReferenceTable {
    ReferenceTable::from_entries((0..entries).map(|i| {
        (
            format!("rs{}", i * 2),
            ReferenceEntry {
                phenotype: format!("Phenotype {}", i % 50),
                broken_geno: Some(String::from("A")),
                gene: None,
            },
        )
    }))
    .unwrap()
}

fn create_dtc_content(records: usize) -> String {
    let mut content = String::from("# This data file generated by 23andMe at: bench\n");
    for i in 1..=records {
        content.push_str(&format!("rs{0}\t1\t{0}\tAG\n", i));
    }
    content
}

fn bench_chunk_parsing(c: &mut Criterion) {
    let data = create_dtc_content(10_000).into_bytes();

    let mut group = c.benchmark_group("chunk_parsing");
    for chunk_size in [4 * 1024, 50 * 1024, 1024 * 1024] {
        group.bench_with_input(
            BenchmarkId::from_parameter(chunk_size),
            &chunk_size,
            |b, &chunk_size| {
                b.iter(|| {
                    let reader =
                        ChunkedRows::with_chunk_size(Cursor::new(&data), b'\t', chunk_size);
                    for batch in reader {
                        black_box(&batch);
                    }
                });
            },
        );
    }
    group.finish();
}

fn bench_match_pipeline(c: &mut Criterion) {
    let table = create_reference(5_000);
    let content = create_dtc_content(10_000);

    c.bench_function("match_buffered_10k", |b| {
        let pipeline = Pipeline::new(&table, PipelineConfig::default()).unwrap();
        b.iter_batched(
            || InputSource::from_text("genome.txt", content.clone()),
            |source| {
                let output = pipeline.start(source, None).unwrap().finish().unwrap();
                black_box(output.groups.record_count());
            },
            BatchSize::SmallInput,
        );
    });
}

fn bench_streamed_vcf(c: &mut Criterion) {
    let table = create_reference(5_000);
    let dir = tempdir().unwrap();
    let path: PathBuf = dir.path().join("large.vcf");
    let mut content = String::new();
    for i in 1..=10_000 {
        content.push_str(&format!("1\t{0}\trs{0}\tA\tG\n", i));
    }
    fs::write(&path, content).unwrap();
    let config = PipelineConfig {
        stream_threshold: 1,
        ..PipelineConfig::default()
    };

    c.bench_function("match_streamed_vcf_10k", |b| {
        let pipeline = Pipeline::new(&table, config).unwrap();
        b.iter(|| {
            let source = InputSource::open(&path, config.stream_threshold).unwrap();
            let output = pipeline.start(source, None).unwrap().finish().unwrap();
            black_box(output.stats);
        });
    });
}

fn bench_grouping(c: &mut Criterion) {
    let table = create_reference(5_000);
    let pipeline = Pipeline::new(&table, PipelineConfig::default()).unwrap();
    let output = pipeline
        .start(InputSource::from_text("genome.txt", create_dtc_content(10_000)), None)
        .unwrap()
        .finish()
        .unwrap();
    let records: Vec<_> = output
        .groups
        .iter()
        .flat_map(|group| group.records.iter().cloned())
        .collect();

    c.bench_function("group_by_phenotype_5k", |b| {
        b.iter_batched(
            || records.clone(),
            |records| black_box(group_records(records)),
            BatchSize::SmallInput,
        );
    });
}

criterion_group!(
    benches,
    bench_chunk_parsing,
    bench_match_pipeline,
    bench_streamed_vcf,
    bench_grouping
);
criterion_main!(benches);
