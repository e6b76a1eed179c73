//! Property tests for the geometry layer.
//!
//! Exercises the invariants the update engine relies on:
//! - overlap tests are symmetric
//! - circumsphere diameters bound every orientation
//! - wrapping is idempotent and preserves minimum-image separations

use glam::{DQuat, DVec3};
use hpmc_core::shapes::{Cuboid, Shape, Sphere};
use hpmc_core::types::SimBox;
use proptest::prelude::*;

fn vec3(range: f64) -> impl Strategy<Value = DVec3> {
    (-range..range, -range..range, -range..range).prop_map(|(x, y, z)| DVec3::new(x, y, z))
}

fn quat() -> impl Strategy<Value = DQuat> {
    (vec3(1.0), 0.0..std::f64::consts::TAU).prop_filter_map("degenerate axis", |(axis, angle)| {
        (axis.length() > 1e-3).then(|| DQuat::from_axis_angle(axis.normalize(), angle))
    })
}

proptest! {
    #[test]
    fn prop_cuboid_overlap_symmetric(
        qa in quat(),
        qb in quat(),
        r in vec3(2.0),
        ea in vec3(1.0),
        eb in vec3(1.0),
    ) {
        let a = Cuboid::from_edges(ea.abs() + DVec3::splat(0.1));
        let b = Cuboid::from_edges(eb.abs() + DVec3::splat(0.1));
        prop_assert_eq!(a.overlaps(qa, &b, qb, r), b.overlaps(qb, &a, qa, -r));
    }

    #[test]
    fn prop_cuboid_respects_circumsphere(qa in quat(), qb in quat(), dir in vec3(1.0)) {
        prop_assume!(dir.length() > 1e-3);
        let a = Cuboid::from_edges(DVec3::new(1.0, 0.5, 0.25));
        let reach = a.circumsphere_diameter();
        let r = dir.normalize() * (reach * 1.0001);
        prop_assert!(!a.overlaps(qa, &a, qb, r));
    }

    #[test]
    fn prop_sphere_inside_cuboid_obb(pos in vec3(3.0), q in quat()) {
        let s = Sphere::new(1.3);
        let obb = s.obb(pos, q);
        prop_assert!((obb.volume(3) - 1.3f64.powi(3)).abs() < 1e-9);
        prop_assert_eq!(obb.center, pos);
    }

    #[test]
    fn prop_wrap_idempotent(p in vec3(50.0)) {
        let sim_box = SimBox::cubic(7.0);
        let once = sim_box.wrap(p);
        let twice = sim_box.wrap(once);
        prop_assert!((once - twice).length() < 1e-9);
        for axis in 0..3 {
            prop_assert!(once[axis] >= -3.5 && once[axis] < 3.5 + 1e-12);
        }
    }

    #[test]
    fn prop_wrap_preserves_min_image(a in vec3(20.0), b in vec3(20.0)) {
        let sim_box = SimBox::cubic(5.0);
        let d1 = sim_box.min_image(b - a);
        let d2 = sim_box.min_image(sim_box.wrap(b) - sim_box.wrap(a));
        prop_assert!((d1 - d2).length() < 1e-9);
    }
}
