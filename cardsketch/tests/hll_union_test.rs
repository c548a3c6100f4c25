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

use cardsketch::common::NumStdDev;
use cardsketch::hll::HllSketch;
use cardsketch::hll::HllType;
use cardsketch::hll::HllUnion;
use googletest::assert_that;
use googletest::prelude::ge;
use googletest::prelude::le;
use googletest::prelude::near;

fn sketch_with_range(lg_k: u8, hll_type: HllType, start: u64, count: u64) -> HllSketch {
    let mut sketch = HllSketch::new(lg_k, hll_type);
    for i in 0..count {
        sketch.update(start + i);
    }
    sketch
}

#[test]
fn test_empty_union() {
    let union = HllUnion::new(12);
    assert!(union.is_empty());
    assert_eq!(union.estimate(), 0.0);
    assert_eq!(union.lg_max_k(), 12);
}

#[test]
fn test_union_of_two_small_sketches() {
    let mut left = HllSketch::new(10, HllType::Hll8);
    let mut right = HllSketch::new(10, HllType::Hll8);
    left.update("apple");
    left.update("banana");
    right.update("banana");
    right.update("cherry");

    let mut union = HllUnion::new(10);
    union.update(&left);
    union.update(&right);

    assert_that!(union.estimate(), near(3.0, 0.1));
}

#[test]
fn test_union_of_disjoint_streams() {
    let a = sketch_with_range(12, HllType::Hll8, 0, 20_000);
    let b = sketch_with_range(12, HllType::Hll8, 20_000, 20_000);

    let mut union = HllUnion::new(12);
    union.update(&a);
    union.update(&b);

    let estimate = union.estimate();
    assert_that!(estimate, near(40_000.0, 40_000.0 * 0.05));
    assert_that!(union.lower_bound(NumStdDev::Two), le(40_000.0));
    assert_that!(union.upper_bound(NumStdDev::Two), ge(40_000.0));
}

#[test]
fn test_union_is_idempotent() {
    let a = sketch_with_range(11, HllType::Hll8, 0, 30_000);

    // Once an input has been merged, merging it again changes nothing
    let mut twice = HllUnion::new(11);
    twice.update(&a);
    twice.update(&a);

    let mut thrice = HllUnion::new(11);
    thrice.update(&a);
    thrice.update(&a);
    thrice.update(&a);

    assert_eq!(twice.estimate(), thrice.estimate());
    assert_eq!(
        twice.get_result(HllType::Hll8).serialize(),
        thrice.get_result(HllType::Hll8).serialize()
    );
}

#[test]
fn test_union_is_commutative() {
    let a = sketch_with_range(11, HllType::Hll8, 0, 10_000);
    let b = sketch_with_range(11, HllType::Hll8, 5_000, 10_000);

    let mut ab = HllUnion::new(11);
    ab.update(&a);
    ab.update(&b);

    let mut ba = HllUnion::new(11);
    ba.update(&b);
    ba.update(&a);

    assert_eq!(
        ab.get_result(HllType::Hll8).serialize(),
        ba.get_result(HllType::Hll8).serialize()
    );
}

#[test]
fn test_union_mixes_modes() {
    // List-mode, set-mode, and array-mode inputs combine into one estimate
    let tiny = sketch_with_range(12, HllType::Hll8, 0, 5);
    let medium = sketch_with_range(12, HllType::Hll8, 100, 300);
    let large = sketch_with_range(12, HllType::Hll8, 10_000, 50_000);

    let mut union = HllUnion::new(12);
    union.update(&tiny);
    union.update(&medium);
    union.update(&large);

    assert_that!(union.estimate(), near(50_305.0, 50_305.0 * 0.05));
}

#[test]
fn test_union_mixes_target_types() {
    let h4 = sketch_with_range(11, HllType::Hll4, 0, 20_000);
    let h6 = sketch_with_range(11, HllType::Hll6, 10_000, 20_000);
    let h8 = sketch_with_range(11, HllType::Hll8, 20_000, 20_000);

    let mut union = HllUnion::new(11);
    union.update(&h4);
    union.update(&h6);
    union.update(&h8);

    assert_that!(union.estimate(), near(40_000.0, 40_000.0 * 0.06));
}

#[test]
fn test_union_downsamples_finer_sketches() {
    // Inputs at higher precision fold onto the union's lg_max_k
    let fine = sketch_with_range(14, HllType::Hll8, 0, 50_000);

    let mut union = HllUnion::new(10);
    union.update(&fine);

    assert_eq!(union.lg_k(), 10);
    assert_that!(union.estimate(), near(50_000.0, 50_000.0 * 0.10));
}

#[test]
fn test_union_downsizes_gadget_for_coarser_input() {
    let fine = sketch_with_range(12, HllType::Hll8, 0, 20_000);
    let coarse = sketch_with_range(9, HllType::Hll8, 10_000, 20_000);

    let mut union = HllUnion::new(12);
    union.update(&fine);
    assert_eq!(union.lg_k(), 12);

    union.update(&coarse);
    assert_eq!(union.lg_k(), 9);
    assert_that!(union.estimate(), near(30_000.0, 30_000.0 * 0.12));
}

#[test]
fn test_get_result_in_every_encoding() {
    let a = sketch_with_range(11, HllType::Hll8, 0, 25_000);
    let b = sketch_with_range(11, HllType::Hll8, 10_000, 25_000);

    let mut union = HllUnion::new(11);
    union.update(&a);
    union.update(&b);

    let h8 = union.get_result(HllType::Hll8);
    let h6 = union.get_result(HllType::Hll6);
    let h4 = union.get_result(HllType::Hll4);

    assert_eq!(h8.target_type(), HllType::Hll8);
    assert_eq!(h6.target_type(), HllType::Hll6);
    assert_eq!(h4.target_type(), HllType::Hll4);

    // Conversion replays the same registers, so estimates stay close even
    // though the converted sketches re-derive their estimator state
    let reference = h8.estimate();
    assert_that!(h6.estimate(), near(reference, reference * 0.05));
    assert_that!(h4.estimate(), near(reference, reference * 0.05));
}

#[test]
fn test_update_value_feeds_gadget_directly() {
    let mut union = HllUnion::new(12);
    for i in 0..1000 {
        union.update_value(i);
    }
    assert_that!(union.estimate(), near(1000.0, 50.0));
}

#[test]
fn test_reset() {
    let mut union = HllUnion::new(12);
    union.update(&sketch_with_range(12, HllType::Hll8, 0, 1000));
    assert!(!union.is_empty());

    union.reset();
    assert!(union.is_empty());
    assert_eq!(union.estimate(), 0.0);
}

#[test]
fn test_merged_result_round_trips() {
    let a = sketch_with_range(11, HllType::Hll8, 0, 10_000);
    let b = sketch_with_range(11, HllType::Hll8, 5_000, 10_000);

    let mut union = HllUnion::new(11);
    union.update(&a);
    union.update(&b);

    let result = union.get_result(HllType::Hll8);
    let restored = HllSketch::deserialize(&result.serialize()).unwrap();
    assert_eq!(result.estimate(), restored.estimate());
}

#[test]
#[should_panic(expected = "different hash seeds")]
fn test_union_rejects_other_seeds() {
    let mut other = HllSketch::new_with_seed(12, HllType::Hll8, 99);
    other.update("x");

    let mut union = HllUnion::new(12);
    union.update(&other);
}
