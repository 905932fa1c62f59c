//! Small linear-algebra helpers layered on top of `glam`.

use glam::{DMat3, DVec3};

/// Numerical floor under which vectors and generalized masses count as degenerate.
pub const DEGENERATE_EPSILON: f64 = 1e-12;

/// Cross-product matrix `[r]×`, so that `skew(r) * v == r.cross(v)`.
pub fn skew(r: DVec3) -> DMat3 {
    DMat3::from_cols(
        DVec3::new(0.0, r.z, -r.y),
        DVec3::new(-r.z, 0.0, r.x),
        DVec3::new(r.y, -r.x, 0.0),
    )
}

/// Effective inverse mass of a rigid body seen at moment arm `r`.
pub fn mass_matrix(inverse_mass: f64, inverse_inertia: DMat3, r: DVec3) -> DMat3 {
    let cr = skew(r);
    DMat3::from_diagonal(DVec3::splat(inverse_mass)) - cr * inverse_inertia * cr
}

/// Impulse response matrix between a point mass and a rigid body.
///
/// Maps a positional error (per step) to the impulse that removes it:
/// `(1/dt) · (diag(node_inverse_mass) + K_body(r))⁻¹`. Returns the zero matrix
/// when the combined response is singular (both sides immovable).
pub fn impulse_matrix(
    dt: f64,
    node_inverse_mass: f64,
    body_inverse_mass: f64,
    body_inverse_inertia: DMat3,
    r: DVec3,
) -> DMat3 {
    let k = DMat3::from_diagonal(DVec3::splat(node_inverse_mass))
        + mass_matrix(body_inverse_mass, body_inverse_inertia, r);
    let det = k.determinant();
    if det.abs() < DEGENERATE_EPSILON || !det.is_finite() || dt <= 0.0 {
        return DMat3::ZERO;
    }
    k.inverse() * (1.0 / dt)
}

/// Unit vector along `v`, or `None` when `v` is too short to normalize.
pub fn try_direction(v: DVec3) -> Option<DVec3> {
    let len = v.length();
    if len <= DEGENERATE_EPSILON || !len.is_finite() {
        None
    } else {
        Some(v / len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn skew_matches_cross_product() {
        let r = DVec3::new(1.0, -2.0, 0.5);
        let v = DVec3::new(0.3, 4.0, -1.0);
        assert_relative_eq!(skew(r) * v, r.cross(v), epsilon = 1e-12);
    }

    #[test]
    fn impulse_matrix_against_static_body_is_node_mass_over_dt() {
        let m = impulse_matrix(0.5, 0.25, 0.0, DMat3::ZERO, DVec3::new(1.0, 2.0, 3.0));
        assert_relative_eq!(m, DMat3::from_diagonal(DVec3::splat(8.0)), epsilon = 1e-12);
    }

    #[test]
    fn impulse_matrix_is_zero_when_both_sides_are_immovable() {
        let m = impulse_matrix(0.1, 0.0, 0.0, DMat3::ZERO, DVec3::X);
        assert_eq!(m, DMat3::ZERO);
    }
}
