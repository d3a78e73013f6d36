use codec::content_types;
use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use serving::{CodecRegistry, HandlerService, backend::linear::LinearModel};

const N_FEATURES: usize = 16;

/// Three-class classifier over `N_FEATURES` inputs.
fn create_model() -> LinearModel {
    let coef: Vec<Vec<f64>> = (0..3)
        .map(|class| {
            (0..N_FEATURES)
                .map(|f| ((class * N_FEATURES + f) % 7) as f64 * 0.1 - 0.3)
                .collect()
        })
        .collect();
    let json = serde_json::json!({
        "estimator": "classifier",
        "coef": coef,
        "intercept": [0.1, -0.2, 0.05],
        "classes": [0, 1, 2],
    });
    LinearModel::from_json(&json.to_string()).unwrap()
}

fn create_json_payload(rows: usize) -> Vec<u8> {
    let data: Vec<Vec<f64>> = (0..rows)
        .map(|r| (0..N_FEATURES).map(|f| (r + f) as f64 * 0.5).collect())
        .collect();
    serde_json::to_vec(&data).unwrap()
}

fn create_csv_payload(rows: usize) -> Vec<u8> {
    (0..rows)
        .map(|r| {
            (0..N_FEATURES)
                .map(|f| format!("{}", (r + f) as f64 * 0.5))
                .collect::<Vec<_>>()
                .join(",")
        })
        .collect::<Vec<_>>()
        .join("\n")
        .into_bytes()
}

fn benchmark_transform(c: &mut Criterion) {
    let mut group = c.benchmark_group("transform");
    let handlers = HandlerService::new(CodecRegistry::with_defaults());
    let model = create_model();

    for rows in [1, 100, 1000] {
        let json = create_json_payload(rows);
        group.bench_with_input(BenchmarkId::new("json", rows), &json, |b, payload| {
            b.iter(|| {
                handlers
                    .transform(
                        black_box(&model),
                        black_box(payload),
                        content_types::JSON,
                        content_types::JSON,
                    )
                    .unwrap()
            });
        });

        let csv = create_csv_payload(rows);
        group.bench_with_input(BenchmarkId::new("csv", rows), &csv, |b, payload| {
            b.iter(|| {
                handlers
                    .transform(
                        black_box(&model),
                        black_box(payload),
                        content_types::CSV,
                        content_types::CSV,
                    )
                    .unwrap()
            });
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_transform);
criterion_main!(benches);
