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

//! Hash table growth policy.

/// Growth step for a theta sketch's internal hash table.
///
/// A sketch configured with a factor above `X1` allocates its table well
/// below the nominal size and multiplies the capacity by this factor each
/// time the load threshold is crossed, until the table reaches its
/// maximum. Aggressive factors reach the final size in fewer rehash
/// passes; modest ones keep short-lived sketches small.
///
/// `X1` opts out of growth entirely: the table is allocated at full size
/// up front and never rehashes.
///
/// # Examples
///
/// ```
/// # use cardsketch::common::ResizeFactor;
/// let factor = ResizeFactor::X4;
/// assert_eq!(factor.value(), 4);
/// assert_eq!(factor.lg_value(), 2);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeFactor {
    /// No growth; the table starts at full size.
    X1,
    /// Double the table on each growth step.
    X2,
    /// Quadruple the table on each growth step.
    X4,
    /// Grow the table eightfold on each growth step.
    X8,
}

impl ResizeFactor {
    /// Log base 2 of the growth factor, the number of table doublings one
    /// growth step performs.
    pub fn lg_value(self) -> u8 {
        match self {
            ResizeFactor::X1 => 0,
            ResizeFactor::X2 => 1,
            ResizeFactor::X4 => 2,
            ResizeFactor::X8 => 3,
        }
    }

    /// The growth factor itself.
    pub fn value(self) -> usize {
        1 << self.lg_value()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_is_two_to_the_lg_value() {
        for factor in [
            ResizeFactor::X1,
            ResizeFactor::X2,
            ResizeFactor::X4,
            ResizeFactor::X8,
        ] {
            assert_eq!(factor.value(), 1 << factor.lg_value());
        }
    }

    #[test]
    fn test_factors_are_ordered() {
        assert!(ResizeFactor::X1.value() < ResizeFactor::X2.value());
        assert!(ResizeFactor::X2.value() < ResizeFactor::X4.value());
        assert!(ResizeFactor::X4.value() < ResizeFactor::X8.value());
    }
}
