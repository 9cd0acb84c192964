use criterion::{black_box, criterion_group, criterion_main, Criterion};
use vision_job_client::params::parse_region;
use vision_job_client::schema;
use vision_job_client::{DetectionType, JobParameters, KeyStyle, RequestBuilder};

/// Benchmark building and validating a request for every detection type
fn bench_build_requests(c: &mut Criterion) {
    let builder = RequestBuilder::default();
    let parameters: Vec<JobParameters> = schema::all()
        .iter()
        .map(|spec| JobParameters::defaults(spec.detection_type))
        .collect();

    c.bench_function("build_all_detection_types", |b| {
        b.iter(|| {
            for params in &parameters {
                let request = builder
                    .build_from_parameters(black_box(Some("abc123")), black_box(params))
                    .unwrap();
                black_box(request);
            }
        })
    });
}

/// Benchmark wire encoding in both key styles
fn bench_encode(c: &mut Criterion) {
    let request = RequestBuilder::default()
        .build_from_parameters(Some("abc123"), &JobParameters::defaults(DetectionType::Gather))
        .unwrap();

    c.bench_function("query_pairs_camel_case", |b| {
        b.iter(|| black_box(request.query_pairs(black_box(KeyStyle::CamelCase))))
    });

    c.bench_function("query_pairs_snake_case", |b| {
        b.iter(|| black_box(request.query_pairs(black_box(KeyStyle::SnakeCase))))
    });

    c.bench_function("json_body_snake_case", |b| {
        b.iter(|| black_box(request.json_body(black_box(KeyStyle::SnakeCase))))
    });
}

/// Benchmark region parsing from CLI text
fn bench_parse_region(c: &mut Criterion) {
    let text = "[(220,300),(700,300),(700,700),(200,700)]";

    c.bench_function("parse_region", |b| {
        b.iter(|| parse_region(black_box(text)))
    });
}

criterion_group!(
    benches,
    bench_build_requests,
    bench_encode,
    bench_parse_region
);

criterion_main!(benches);
