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

//! Storage states of an HLL sketch.

use crate::common::NumStdDev;
use crate::hll::HllType;
use crate::hll::array4::Array4;
use crate::hll::array6::Array6;
use crate::hll::array8::Array8;
use crate::hll::container::Container;
use crate::hll::hash_set::HashSet;
use crate::hll::list::List;

/// Current storage of an HLL sketch.
///
/// The coupon modes remember the register encoding they will promote
/// into; once in an array mode the storage itself determines the
/// encoding.
///
/// Configuration-independent read paths dispatch here; updates and
/// serialization stay with the sketch, which owns the promotion rules
/// and `lg_k`.
#[derive(Debug, Clone, PartialEq)]
pub enum Mode {
    List { log: List, target: HllType },
    Set { coupons: HashSet, target: HllType },
    Array4(Array4),
    Array6(Array6),
    Array8(Array8),
}

impl Mode {
    /// The register encoding this storage targets (or already uses).
    pub fn target_type(&self) -> HllType {
        match self {
            Mode::List { target, .. } | Mode::Set { target, .. } => *target,
            Mode::Array4(_) => HllType::Hll4,
            Mode::Array6(_) => HllType::Hll6,
            Mode::Array8(_) => HllType::Hll8,
        }
    }

    /// The coupon store, while still in a small-cardinality mode.
    pub fn coupons(&self) -> Option<&Container> {
        match self {
            Mode::List { log, .. } => Some(log.container()),
            Mode::Set { coupons, .. } => Some(coupons.container()),
            _ => None,
        }
    }

    /// Whether no value has been observed yet.
    pub fn is_empty(&self) -> bool {
        if let Some(store) = self.coupons() {
            return store.is_empty();
        }
        match self {
            Mode::Array4(arr) => arr.is_empty(),
            Mode::Array6(arr) => arr.is_empty(),
            Mode::Array8(arr) => arr.is_empty(),
            Mode::List { .. } | Mode::Set { .. } => unreachable!(),
        }
    }

    /// Cardinality estimate of the current storage.
    pub fn estimate(&self) -> f64 {
        if let Some(store) = self.coupons() {
            return store.estimate();
        }
        match self {
            Mode::Array4(arr) => arr.estimate(),
            Mode::Array6(arr) => arr.estimate(),
            Mode::Array8(arr) => arr.estimate(),
            Mode::List { .. } | Mode::Set { .. } => unreachable!(),
        }
    }

    /// Upper confidence bound of the current storage's estimate.
    pub fn upper_bound(&self, num_std_dev: NumStdDev) -> f64 {
        if let Some(store) = self.coupons() {
            return store.upper_bound(num_std_dev);
        }
        match self {
            Mode::Array4(arr) => arr.upper_bound(num_std_dev),
            Mode::Array6(arr) => arr.upper_bound(num_std_dev),
            Mode::Array8(arr) => arr.upper_bound(num_std_dev),
            Mode::List { .. } | Mode::Set { .. } => unreachable!(),
        }
    }

    /// Lower confidence bound of the current storage's estimate.
    pub fn lower_bound(&self, num_std_dev: NumStdDev) -> f64 {
        if let Some(store) = self.coupons() {
            return store.lower_bound(num_std_dev);
        }
        match self {
            Mode::Array4(arr) => arr.lower_bound(num_std_dev),
            Mode::Array6(arr) => arr.lower_bound(num_std_dev),
            Mode::Array8(arr) => arr.lower_bound(num_std_dev),
            Mode::List { .. } | Mode::Set { .. } => unreachable!(),
        }
    }
}
