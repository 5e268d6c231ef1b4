//! 분류기/프레이머 벤치마크
//!
//! 수락, 마커 불일치, 심각도 필터링 경로의 분류 비용과 줄 프레이밍 처리량을 측정합니다.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use verdict_relay_core::config::DEFAULT_MARKER;
use verdict_relay_core::event::AllowList;
use verdict_relay_pipeline::classifier::extract_json_object;
use verdict_relay_pipeline::{EventClassifier, LineFramer, RawLine};

fn verdict_line(level: &str) -> String {
    format!(
        r#"<14>1 2024-05-01T10:00:00Z sandbox ptsb 4242 - - {DEFAULT_MARKER} {{"scan_id":"7c1d6a0e-52f3-4a8e-9b0b-2f4d1c9e8a11","created":1700000000.25,"entry_point_type":"MAIL","result":{{"state":"FULL","verdict":{{"threat_level":"{level}","threat":{{"classification":"TROJAN","family":"Emotet","platform":"WINDOWS"}}}}}}}}"#
    )
}

/// 마커 없는 일반 syslog 줄
const UNRELATED: &str =
    "<34>1 2024-01-15T12:00:00Z sandbox sshd 1234 - - Accepted publickey for deploy from 10.0.0.5";

fn bench_classify(c: &mut Criterion) {
    let classifier = EventClassifier::new(DEFAULT_MARKER, AllowList::from_mode("UNWANTED"));
    let dangerous = RawLine::new(verdict_line("DANGEROUS"), "bench");
    let unknown = RawLine::new(verdict_line("UNKNOWN"), "bench");
    let unrelated = RawLine::new(UNRELATED, "bench");

    let mut group = c.benchmark_group("classify");
    group.throughput(Throughput::Elements(1));

    group.bench_function("accepted", |b| {
        b.iter(|| classifier.classify(black_box(&dangerous)))
    });
    group.bench_function("severity_filtered", |b| {
        b.iter(|| classifier.classify(black_box(&unknown)))
    });
    group.bench_function("marker_mismatch", |b| {
        b.iter(|| classifier.classify(black_box(&unrelated)))
    });

    group.finish();
}

fn bench_extract_json(c: &mut Criterion) {
    let line = verdict_line("DANGEROUS");

    c.bench_function("extract_json_object", |b| {
        b.iter(|| extract_json_object(black_box(&line)))
    });
}

fn bench_framing(c: &mut Criterion) {
    let mut stream = Vec::new();
    for i in 0..1000 {
        let line = if i % 4 == 0 {
            verdict_line("DANGEROUS")
        } else {
            UNRELATED.to_owned()
        };
        stream.extend_from_slice(line.as_bytes());
        stream.push(b'\n');
    }

    let mut group = c.benchmark_group("framing");
    group.throughput(Throughput::Bytes(stream.len() as u64));

    for chunk_size in [512usize, 4096, 65536] {
        group.bench_with_input(
            BenchmarkId::new("chunk", chunk_size),
            &chunk_size,
            |b, &chunk_size| {
                b.iter(|| {
                    let mut framer = LineFramer::new(10_240, "bench");
                    let mut out = Vec::with_capacity(1000);
                    for chunk in stream.chunks(chunk_size) {
                        framer.feed(black_box(chunk), &mut out).unwrap();
                    }
                    out.len()
                })
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_classify, bench_extract_json, bench_framing);
criterion_main!(benches);
