use boxsim::core::{ExperimentSettings, Side, Simulator};
use boxsim::error::Error;

fn small_box() -> ExperimentSettings {
    ExperimentSettings::builder()
        .particle_count(40, 30)
        .box_size(20.0, 20.0)
        .barrier(9.0, 2.0)
        .hole(10.0, 4.0)
        .particle_radius(0.25)
        .initial_speed(2.0)
        .fps(10)
        .build()
}

/// Initial packing never overlaps, stays inside each half, and assigns ids by origin side.
#[test]
fn initial_packing_is_valid_across_seeds() -> boxsim::error::Result<()> {
    for seed in [0, 1, 42, -17, 5_553_535] {
        let settings = small_box().to_builder().seed(seed).build();
        settings.validate()?;
        let state = Simulator::new(settings.clone()).initial_distribution_seeded()?;
        let r = f64::from(settings.particle_radius());
        let ps = state.particles();
        assert_eq!(ps.len(), 70);
        assert_eq!(state.time(), 0);

        for (i, p) in ps.iter().enumerate() {
            assert!((p.speed() - 2.0).abs() < 1e-12);
            assert!(p.r[1] >= r && p.r[1] <= 20.0 - r);
            match p.origin() {
                Side::Left => assert!(p.r[0] >= r && p.r[0] <= settings.barrier_left() - r),
                Side::Right => {
                    assert!(p.r[0] >= settings.barrier_right() + r && p.r[0] <= 20.0 - r)
                }
            }
            for q in &ps[i + 1..] {
                assert!(!p.overlaps(q, r), "seed {seed}: {p} overlaps {q}");
            }
        }

        let left_ids: Vec<i32> = ps.iter().filter(|p| p.origin() == Side::Left).map(|p| p.id).collect();
        assert_eq!(left_ids, (0..40).map(|i| 2 * i).collect::<Vec<_>>());
    }
    Ok(())
}

/// The same seed reproduces the same initial distribution and the same evolution.
#[test]
fn runs_are_reproducible() -> boxsim::error::Result<()> {
    let sim = Simulator::new(small_box());
    let mut a = sim.initial_distribution_seeded()?;
    let mut b = sim.initial_distribution_seeded()?;
    for _ in 0..200 {
        a = sim.step_until(&a, u64::MAX);
        b = sim.step_until(&b, u64::MAX);
    }
    assert_eq!(a, b);
    Ok(())
}

/// Stepping keeps the particle count, ids and order, advances time strictly, and keeps
/// every center inside the box.
#[test]
fn stepping_preserves_identity_and_bounds() -> boxsim::error::Result<()> {
    let settings = small_box();
    let sim = Simulator::new(settings.clone());
    let r = f64::from(settings.particle_radius());
    let mut state = sim.initial_distribution_seeded()?;
    let ids: Vec<i32> = state.particles().iter().map(|p| p.id).collect();

    for _ in 0..2_000 {
        let next = sim.step_until(&state, u64::MAX);
        assert!(next.time() > state.time());
        state = next;
        let now: Vec<i32> = state.particles().iter().map(|p| p.id).collect();
        assert_eq!(now, ids);
        for p in state.particles() {
            assert!(p.is_finite());
            assert!(p.r[0] >= r - 1e-9 && p.r[0] <= 20.0 - r + 1e-9, "{p}");
            assert!(p.r[1] >= r - 1e-9 && p.r[1] <= 20.0 - r + 1e-9, "{p}");
        }
    }
    Ok(())
}

/// Without gravity or wall boosts, kinetic energy can only drop through inelastic collisions.
#[test]
fn energy_never_increases_without_boosts() -> boxsim::error::Result<()> {
    let settings = small_box()
        .to_builder()
        .g(0.0)
        .speed_delta(0.0, 0.0, 0.0)
        .speed_loss(0.1)
        .build();
    let sim = Simulator::new(settings);
    let mut state = sim.initial_distribution_seeded()?;
    let e0 = state.kinetic_energy();
    let mut prev = e0;

    for _ in 0..3_000 {
        state = sim.step_until(&state, u64::MAX);
        let e = state.kinetic_energy();
        assert!(e <= prev * (1.0 + 1e-12), "energy rose from {prev} to {e}");
        prev = e;
    }
    assert!(prev < e0, "collisions should have dissipated some energy");
    Ok(())
}

/// With lossless collisions and no boosts or gravity, energy is conserved.
#[test]
fn elastic_box_conserves_energy() -> boxsim::error::Result<()> {
    let settings = small_box()
        .to_builder()
        .g(0.0)
        .speed_delta(0.0, 0.0, 0.0)
        .speed_loss(0.0)
        .build();
    let sim = Simulator::new(settings);
    let mut state = sim.initial_distribution_seeded()?;
    let e0 = state.kinetic_energy();
    for _ in 0..3_000 {
        state = sim.step_until(&state, u64::MAX);
    }
    let rel = ((state.kinetic_energy() - e0) / e0).abs();
    assert!(rel < 1e-9, "relative energy drift {rel}");
    Ok(())
}

/// A side too crowded to pack reports which side failed and how far it got.
#[test]
fn crowded_side_fails_to_pack() {
    let settings = small_box().to_builder().particle_count(5, 5_000).build();
    let sim = Simulator::new(settings).with_packing_attempts(50_000);
    match sim.initial_distribution_seeded() {
        Err(Error::PackingFailure {
            side,
            placed,
            requested,
            attempts,
        }) => {
            assert_eq!(side, Side::Right);
            assert!(placed < requested);
            assert_eq!(requested, 5_000);
            assert_eq!(attempts, 50_000);
        }
        other => panic!("expected a packing failure, got {other:?}"),
    }
}
