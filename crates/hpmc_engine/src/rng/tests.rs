//! Unit tests for the keyed RNG module.
//!
//! This module contains tests verifying:
//! - Key reproducibility and stream separation
//! - Distribution properties (uniform range, normal and Poisson moments)
//! - Geometric samplers (ball, unit vector, orientation)
//! - Key sensitivity via property-based testing

use super::*;
use glam::DVec3;
use proptest::prelude::*;

/// Verifies that identical keys produce identical sequences.
#[test]
fn test_key_reproducibility() {
    let mut rng1 = KeyedRng::new(Stream::DepletantInsert, 12345, &[3, 1, 4, 1, 5]);
    let mut rng2 = KeyedRng::new(Stream::DepletantInsert, 12345, &[3, 1, 4, 1, 5]);
    assert_eq!(rng1.key(), rng2.key());

    for _ in 0..100 {
        assert_eq!(rng1.gen_uniform(), rng2.gen_uniform());
        assert_eq!(rng1.gen_normal(), rng2.gen_normal());
    }
}

/// Verifies that streams with the same ids do not collide.
#[test]
fn test_stream_separation() {
    let a = mix_key(Stream::DepletantCount, 1, &[10, 20]);
    let b = mix_key(Stream::DepletantCountTrial, 1, &[10, 20]);
    assert_ne!(a, b);

    let c = mix_key(Stream::DepletantCount, 2, &[10, 20]);
    assert_ne!(a, c);
}

/// Verifies that uniform values are in the correct range [0, 1).
#[test]
fn test_uniform_range() {
    let mut rng = KeyedRng::new(Stream::TrialMove, 42, &[0]);

    for _ in 0..10_000 {
        let value = rng.gen_uniform();
        assert!(value >= 0.0, "Uniform value {} is below 0", value);
        assert!(value < 1.0, "Uniform value {} is >= 1", value);
    }
}

/// Verifies the first draw of many keys is uniform on average.
#[test]
fn test_first_draw_across_keys() {
    let n = 20_000;
    let mean: f64 = (0..n)
        .map(|k| KeyedRng::new(Stream::UpdateOrder, 9, &[k, 0]).gen_uniform())
        .sum::<f64>()
        / n as f64;
    assert!((mean - 0.5).abs() < 0.01, "mean = {}", mean);
}

/// Verifies the normal sampler's first two moments.
#[test]
fn test_normal_moments() {
    let mut rng = KeyedRng::new(Stream::TrialMove, 7, &[1, 2]);
    let n = 50_000;
    let samples: Vec<f64> = (0..n).map(|_| rng.gen_normal()).collect();
    let mean = samples.iter().sum::<f64>() / n as f64;
    let var = samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n as f64;
    assert!(mean.abs() < 0.02, "mean = {}", mean);
    assert!((var - 1.0).abs() < 0.03, "variance = {}", var);
}

/// Verifies the Poisson sampler's mean and its degenerate branches.
#[test]
fn test_poisson() {
    let mut rng = KeyedRng::new(Stream::DepletantCount, 3, &[]);
    let n = 20_000;
    let total: u64 = (0..n).map(|_| rng.gen_poisson(4.0) as u64).sum();
    let mean = total as f64 / n as f64;
    assert!((mean - 4.0).abs() < 0.06, "mean = {}", mean);

    assert_eq!(rng.gen_poisson(0.0), 0);
    assert_eq!(rng.gen_poisson(-1.0), 0);
    assert_eq!(rng.gen_poisson(f64::NAN), 0);
}

/// Verifies ball samples stay inside the ball and in-plane for 2D.
#[test]
fn test_gen_in_ball() {
    let mut rng = KeyedRng::new(Stream::TrialMove, 11, &[]);
    for _ in 0..1_000 {
        let p = rng.gen_in_ball(0.3, 3);
        assert!(p.length() <= 0.3 + 1e-12);
        let q = rng.gen_in_ball(0.3, 2);
        assert_eq!(q.z, 0.0);
        assert!(q.length() <= 0.3 + 1e-12);
    }
}

/// Verifies unit vectors and orientations are normalised.
#[test]
fn test_unit_vector_and_orientation() {
    let mut rng = KeyedRng::new(Stream::DepletantInsert, 5, &[]);
    for _ in 0..1_000 {
        let v = rng.gen_unit_vector(3);
        assert!((v.length() - 1.0).abs() < 1e-12);
        let w = rng.gen_unit_vector(2);
        assert_eq!(w.z, 0.0);

        let q = rng.gen_orientation(3);
        assert!((q.length() - 1.0).abs() < 1e-12);
        let q2 = rng.gen_orientation(2);
        let rotated = q2 * DVec3::Z;
        assert!((rotated - DVec3::Z).length() < 1e-12);
    }
}

/// Verifies velocity bit patterns distinguish signed zeros.
#[test]
fn test_velocity_words() {
    let a = velocity_words(DVec3::new(0.0, 1.0, 2.0));
    let b = velocity_words(DVec3::new(-0.0, 1.0, 2.0));
    assert_ne!(a, b);
    assert_eq!(a[1], 1.0f64.to_bits());
}

proptest! {
    /// Changing any single id word changes the key.
    #[test]
    fn prop_key_sensitive_to_each_word(
        words in proptest::collection::vec(any::<u64>(), 1..6),
        idx in any::<prop::sample::Index>(),
        delta in 1u64..u64::MAX,
    ) {
        let i = idx.index(words.len());
        let mut changed = words.clone();
        changed[i] = changed[i].wrapping_add(delta);
        prop_assert_ne!(
            mix_key(Stream::TrialMove, 1, &words),
            mix_key(Stream::TrialMove, 1, &changed)
        );
    }
}
