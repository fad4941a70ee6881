//! Noise & Render Benchmarks
//!
//! Performance benchmarks for loop generation and graph rendering.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::rngs::StdRng;
use rand::SeedableRng;

use lull::backend::OfflineBackend;
use lull::dsp::{NoiseColor, NoiseGenerator, PinkAlgorithm};
use lull::engine::SessionController;
use lull::preset::builtin_presets;

fn benchmark_noise_loops(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(1);

    for (name, color, pink) in [
        ("brown_5s_48k", NoiseColor::Brown, PinkAlgorithm::Kellett),
        ("pink_kellett_5s_48k", NoiseColor::Pink, PinkAlgorithm::Kellett),
        ("pink_legacy_5s_48k", NoiseColor::Pink, PinkAlgorithm::Legacy),
    ] {
        let generator = NoiseGenerator::new(pink, 0.25);
        c.bench_function(name, |b| {
            b.iter(|| {
                generator
                    .generate(black_box(color), 5.0, 48000, &mut rng)
                    .unwrap()
            })
        });
    }
}

fn benchmark_session_render(c: &mut Criterion) {
    let mut controller = SessionController::new(OfflineBackend::new(48000));
    controller.start(&builtin_presets()[0]).unwrap();

    c.bench_function("render_delta_1s", |b| {
        b.iter(|| controller.render(black_box(48000)).unwrap())
    });
}

criterion_group!(benches, benchmark_noise_loops, benchmark_session_render);
criterion_main!(benches);
