use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use tier_sim::engine::run_simulation;
use tier_sim::models::{CallMode, SimConfig};

const CLIENTS: usize = 200;
const HORIZON: f64 = 500.0;

fn build_config(call_mode: CallMode) -> SimConfig {
    SimConfig {
        clients: CLIENTS,
        horizon: HORIZON,
        timeout: 20.0,
        call_mode,
        seed: Some(7),
        ..SimConfig::default()
    }
}

fn bench_engine(c: &mut Criterion) {
    let mut group = c.benchmark_group("engine");
    let size_label = format!("{}x{}", CLIENTS, HORIZON);

    for call_mode in [CallMode::Async, CallMode::Sync] {
        group.bench_with_input(
            BenchmarkId::new(call_mode.to_string(), &size_label),
            &call_mode,
            |b, call_mode: &CallMode| {
                b.iter_batched(
                    || build_config(*call_mode),
                    |config| {
                        let result = run_simulation(&config).expect("simulation should succeed");
                        black_box(result);
                    },
                    BatchSize::SmallInput,
                );
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_engine);
criterion_main!(benches);
