// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The escape-time evaluator.  Given a point on the complex plane,
//! count how many times `z = z * z + c` can be applied before `z`
//! leaves the circle of radius two, up to a limit.

use num::Complex;

/// Returns the number of iterations, in `[0, limit]`, before the orbit
/// of `c` escapes.  The orbit starts at `c` itself, so a point that is
/// already outside the radius-two circle reports zero, and a point
/// that never escapes reports `limit`.
#[inline]
pub fn iterations_at_point(c: Complex<f64>, limit: usize) -> usize {
    let mut z = c;
    let mut count = 0;
    while count < limit && z.norm_sqr() <= 4.0 {
        z = z * z + c;
        count += 1;
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escaped_points_report_zero() {
        assert_eq!(iterations_at_point(Complex::new(3.0, 3.0), 1000), 0);
        assert_eq!(iterations_at_point(Complex::new(-2.5, 0.0), 1000), 0);
    }

    #[test]
    fn origin_never_escapes() {
        assert_eq!(iterations_at_point(Complex::new(0.0, 0.0), 1), 1);
        assert_eq!(iterations_at_point(Complex::new(0.0, 0.0), 100_000), 100_000);
    }

    #[test]
    fn cardioid_and_bulb_points_hit_the_limit() {
        assert_eq!(iterations_at_point(Complex::new(-1.0, 0.0), 5000), 5000);
        assert_eq!(iterations_at_point(Complex::new(0.25, 0.0), 500), 500);
    }

    #[test]
    fn boundary_point_escapes_after_a_few_steps() {
        // 1 -> 2 -> 5: the second step leaves the circle.
        assert_eq!(iterations_at_point(Complex::new(1.0, 0.0), 100), 2);
    }
}
