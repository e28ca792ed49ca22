use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use dcefit::pk::{KTRANS, PS, VE, VP};
use dcefit::prelude::models::*;
use dcefit::prelude::*;
use ndarray::Array1;
use std::hint::black_box;

/// Parker AIF sampled every 5 s over five minutes
fn parker_aif() -> Aif {
    Aif::parker(&Array1::linspace(0.0, 300.0, 61), 0.42, 30.0)
}

fn bench_enhancement_to_concentration(c: &mut Criterion) {
    let relaxation = LinearRelaxivity::default();
    let spgr = Spgr::default();
    let mut group = c.benchmark_group("enhancement_to_concentration");

    for size in [61, 500, 5000] {
        let concentration = Array1::linspace(0.0, 4.0, size);
        let enhancement = concentration_to_enhancement(&concentration, 1.0, 0.8, &relaxation, &spgr);
        group.bench_with_input(BenchmarkId::from_parameter(size), &enhancement, |b, e| {
            b.iter(|| {
                enhancement_to_concentration(
                    black_box(e),
                    1.0,
                    0.8,
                    &relaxation,
                    &spgr,
                    &RootOptions::default(),
                )
            });
        });
    }
    group.finish();
}

fn bench_fit_concentration(c: &mut Criterion) {
    let model = ExtendedTofts::new(parker_aif());
    let truth = PkParams::from([(VP, 0.03), (KTRANS, 0.15), (VE, 0.25)]);
    let observed = model
        .concentration(&model.params_to_vector(&truth).unwrap())
        .unwrap()
        .tissue;
    let options = FitOptions::default().with_parallel(false);

    c.bench_function("fit_concentration_extended_tofts", |b| {
        b.iter(|| fit_concentration(black_box(&observed), &model, None, None, &options));
    });
}

fn bench_fit_enhancement(c: &mut Criterion) {
    let config = DceConfig::default();
    let pk = Patlak::new(parker_aif());
    let mut group = c.benchmark_group("fit_enhancement_patlak");

    for (label, water_exchange) in [("fxl", WaterExchange::Fast), ("nxl", WaterExchange::No)] {
        let config = DceConfig {
            water_exchange,
            ..config.clone()
        };
        let model = config.enhancement_model(&pk);
        let observed = model
            .enhancement(&PkParams::from([(VP, 0.05), (PS, 0.01)]))
            .unwrap();
        group.bench_function(label, |b| {
            b.iter(|| fit_enhancement(black_box(&observed), &model, None, None, &config.fit));
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_enhancement_to_concentration,
    bench_fit_concentration,
    bench_fit_enhancement,
);
criterion_main!(benches);
