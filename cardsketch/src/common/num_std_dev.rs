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

//! Confidence level selector for estimate bounds.

/// Width of the confidence interval requested from `lower_bound` /
/// `upper_bound`, expressed as a number of standard deviations from the
/// estimate.
///
/// The usual choice is [`NumStdDev::Two`]: the true count then falls
/// inside the returned interval about 95% of the time.
///
/// # Examples
///
/// ```
/// use cardsketch::common::NumStdDev;
/// use cardsketch::theta::ThetaSketch;
///
/// let mut sketch = ThetaSketch::builder().lg_k(10).build();
/// for i in 0..50_000 {
///     sketch.update(i);
/// }
/// let narrow = sketch.upper_bound(NumStdDev::One) - sketch.lower_bound(NumStdDev::One);
/// let wide = sketch.upper_bound(NumStdDev::Three) - sketch.lower_bound(NumStdDev::Three);
/// assert!(narrow < wide);
/// ```
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumStdDev {
    /// One standard deviation, roughly a 68% interval
    One = 1,
    /// Two standard deviations, roughly a 95% interval
    Two = 2,
    /// Three standard deviations, roughly a 99.7% interval
    Three = 3,
}

impl NumStdDev {
    /// One-sided Gaussian tail probability at this distance from the mean,
    /// `0.5 * (1 + erf(-n / sqrt(2)))`. This is the chance that the true
    /// value falls beyond one end of the interval.
    pub const fn tail_probability(&self) -> f64 {
        #[allow(clippy::excessive_precision)]
        match self {
            NumStdDev::One => 0.1586553191586026479,
            NumStdDev::Two => 0.0227502618904135701,
            NumStdDev::Three => 0.0013498126861731796,
        }
    }

    /// Returns the number of standard deviations as an `u8`.
    pub const fn as_u8(&self) -> u8 {
        *self as u8
    }
}
