//! Benchmarks for Ephemeris::prolong on a small planetary system
//!
//!   cargo bench --bench ephemeris_prolong

use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use nalgebra::Vector3;

use gravis::{
    config::{EphemerisConfig, FixedStepIntegratorKind},
    geometry::DegreesOfFreedom,
    physics::{
        ephemeris::Ephemeris,
        massive_body::{MassiveBody, Oblateness},
    },
    time::Instant,
};

const SUN_MU: f64 = 1.32712440018e20;
const AU: f64 = 1.495978707e11;

/// The Sun, an oblate Jupiter and `planets` inner planets on circular orbits.
fn solar_system(planets: usize, integrator: FixedStepIntegratorKind) -> Ephemeris {
    let mut bodies = vec![MassiveBody::new(SUN_MU)];
    let mut state = vec![DegreesOfFreedom::default()];

    let jupiter_radius = 5.2 * AU;
    bodies.push(MassiveBody::oblate(
        1.26686534e17,
        Oblateness::new(Vector3::z(), 1.4736e-2, 7.1492e7).unwrap(),
    ));
    state.push(DegreesOfFreedom::new(
        Vector3::new(jupiter_radius, 0.0, 0.0),
        Vector3::new(0.0, (SUN_MU / jupiter_radius).sqrt(), 0.0),
    ));

    for i in 0..planets {
        let r = (0.4 + 0.3 * i as f64) * AU;
        let angle = i as f64;
        let speed = (SUN_MU / r).sqrt();
        bodies.push(MassiveBody::new(3.0e14 * (i + 1) as f64));
        state.push(DegreesOfFreedom::new(
            Vector3::new(r * angle.cos(), r * angle.sin(), 0.0),
            Vector3::new(-speed * angle.sin(), speed * angle.cos(), 0.0),
        ));
    }

    let config = EphemerisConfig {
        integrator,
        step: 3600.0,
        low_fitting_tolerance: 1.0,
        high_fitting_tolerance: 100.0,
    };
    Ephemeris::new(
        bodies,
        state,
        Instant::J2000,
        config.to_parameters().unwrap(),
    )
}

fn bench_prolong(c: &mut Criterion) {
    let mut group = c.benchmark_group("ephemeris_prolong/30_days");
    for planets in [2, 4, 8] {
        group.bench_with_input(BenchmarkId::from_parameter(planets), &planets, |b, &n| {
            b.iter_batched(
                || solar_system(n, FixedStepIntegratorKind::McLachlanAtela1992Order5Optimal),
                |mut ephemeris| {
                    ephemeris.prolong(black_box(Instant::from_days_since_j2000(30.0)));
                    black_box(ephemeris)
                },
                BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

fn bench_integrators(c: &mut Criterion) {
    let mut group = c.benchmark_group("ephemeris_prolong/integrator");
    for kind in [
        FixedStepIntegratorKind::Leapfrog,
        FixedStepIntegratorKind::McLachlanAtela1992Order4Optimal,
        FixedStepIntegratorKind::McLachlanAtela1992Order5Optimal,
    ] {
        group.bench_function(kind.to_string(), |b| {
            b.iter_batched(
                || solar_system(4, kind),
                |mut ephemeris| {
                    ephemeris.prolong(black_box(Instant::from_days_since_j2000(30.0)));
                    black_box(ephemeris)
                },
                BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

criterion_group!(benches, bench_prolong, bench_integrators);
criterion_main!(benches);
