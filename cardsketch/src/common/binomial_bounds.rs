// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

//! Confidence bounds for theta sketch estimates.
//!
//! With `n` retained entries and sampling threshold `theta`, the retained
//! count is binomially distributed over the unknown number of distinct
//! inputs. The bounds below invert the Gaussian approximation of that
//! binomial in closed form, which stays stable down to very small `n`.

use crate::common::NumStdDev;
use crate::error::Error;

/// Returns the approximate lower bound of the number of distinct inputs.
///
/// `theta` must be in (0, 1]. The result never goes below `num_retained`,
/// since every retained entry is a distinct input.
pub(crate) fn lower_bound(
    num_retained: u64,
    theta: f64,
    num_std_dev: NumStdDev,
) -> Result<f64, Error> {
    check_theta(theta)?;
    if theta == 1.0 {
        return Ok(num_retained as f64);
    }

    let n = num_retained as f64;
    let z = num_std_dev.as_u8() as f64;
    let s = (1.0 - theta).sqrt();

    // Solve n <= N*theta + z*sqrt(N*theta*(1-theta)) for N.
    let x = ((z * z * s * s + 4.0 * n).sqrt() - z * s) / 2.0;
    Ok((x * x / theta).max(n))
}

/// Returns the approximate upper bound of the number of distinct inputs.
///
/// `theta` must be in (0, 1]. A sketch that is logically empty has seen no
/// inputs at all, so its upper bound is zero; a non-empty sketch with no
/// retained entries may still have screened arbitrarily many inputs and
/// gets a bound from the no-success probability.
pub(crate) fn upper_bound(
    num_retained: u64,
    theta: f64,
    num_std_dev: NumStdDev,
    is_empty: bool,
) -> Result<f64, Error> {
    check_theta(theta)?;
    if is_empty {
        return Ok(0.0);
    }
    if theta == 1.0 {
        return Ok(num_retained as f64);
    }

    let n = num_retained as f64;
    let z = num_std_dev.as_u8() as f64;
    let s = (1.0 - theta).sqrt();

    if num_retained == 0 {
        // Largest N whose chance of retaining nothing is still above the
        // tail probability: (1-theta)^N >= delta.
        let delta = num_std_dev.tail_probability();
        return Ok(delta.ln() / (1.0 - theta).ln());
    }

    // Solve n >= N*theta - z*sqrt(N*theta*(1-theta)) for N.
    let x = ((z * z * s * s + 4.0 * n).sqrt() + z * s) / 2.0;
    Ok(x * x / theta)
}

fn check_theta(theta: f64) -> Result<(), Error> {
    if !(theta > 0.0 && theta <= 1.0) {
        return Err(
            Error::invalid_argument("theta must be in (0, 1]").with_context("theta", theta)
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_mode_bounds_collapse() {
        let lb = lower_bound(100, 1.0, NumStdDev::Two).unwrap();
        let ub = upper_bound(100, 1.0, NumStdDev::Two, false).unwrap();
        assert_eq!(lb, 100.0);
        assert_eq!(ub, 100.0);
    }

    #[test]
    fn test_bounds_bracket_estimate() {
        let theta = 0.25;
        let n = 1000u64;
        let estimate = n as f64 / theta;
        for nsd in [NumStdDev::One, NumStdDev::Two, NumStdDev::Three] {
            let lb = lower_bound(n, theta, nsd).unwrap();
            let ub = upper_bound(n, theta, nsd, false).unwrap();
            assert!(lb <= estimate, "lb {lb} > estimate {estimate}");
            assert!(ub >= estimate, "ub {ub} < estimate {estimate}");
        }
    }

    #[test]
    fn test_wider_interval_with_more_std_devs() {
        let theta = 0.1;
        let n = 500u64;
        let lb1 = lower_bound(n, theta, NumStdDev::One).unwrap();
        let lb3 = lower_bound(n, theta, NumStdDev::Three).unwrap();
        let ub1 = upper_bound(n, theta, NumStdDev::One, false).unwrap();
        let ub3 = upper_bound(n, theta, NumStdDev::Three, false).unwrap();
        assert!(lb3 <= lb1);
        assert!(ub3 >= ub1);
    }

    #[test]
    fn test_lower_bound_clamped_to_retained() {
        // With very few retained entries the Gaussian inversion could fall
        // below the retained count, but the count itself is a hard floor.
        let lb = lower_bound(2, 0.001, NumStdDev::Three).unwrap();
        assert!(lb >= 2.0);
    }

    #[test]
    fn test_zero_retained() {
        assert_eq!(lower_bound(0, 0.5, NumStdDev::Two).unwrap(), 0.0);
        assert_eq!(upper_bound(0, 0.5, NumStdDev::Two, true).unwrap(), 0.0);
        let ub = upper_bound(0, 0.5, NumStdDev::Two, false).unwrap();
        assert!(ub > 0.0);
    }

    #[test]
    fn test_invalid_theta() {
        assert!(lower_bound(10, 0.0, NumStdDev::One).is_err());
        assert!(upper_bound(10, 1.5, NumStdDev::One, false).is_err());
        assert!(lower_bound(10, f64::NAN, NumStdDev::One).is_err());
    }
}
