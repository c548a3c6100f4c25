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

use cardsketch::theta::CompactThetaSketch;
use cardsketch::theta::ThetaIntersection;
use cardsketch::theta::ThetaSketch;

fn sketch_with_range(start: u64, count: u64) -> ThetaSketch {
    let mut sketch = ThetaSketch::builder().build();
    for i in 0..count {
        sketch.update(start + i);
    }
    sketch
}

#[test]
fn test_has_result_state_machine() {
    let mut a = ThetaSketch::builder().build();
    a.update("x");

    let mut i = ThetaIntersection::new_with_default_seed();
    assert!(!i.has_result());
    i.update(&a).unwrap();
    assert!(i.has_result());
    assert!(i.result().estimate() >= 1.0);
}

#[test]
fn test_result_before_update_panics() {
    let i = ThetaIntersection::new(123);
    let result = std::panic::catch_unwind(|| {
        let _ = i.result();
    });
    assert!(result.is_err());
}

#[test]
fn test_update_accepts_compact_sketch() {
    let mut a = ThetaSketch::builder().build();
    a.update("x");
    a.update("y");

    let mut b = ThetaSketch::builder().build();
    b.update("y");
    b.update("z");

    let mut i = ThetaIntersection::new_with_default_seed();
    i.update(&a.compact(true)).unwrap();
    i.update(&b).unwrap();

    let r = i.result();
    assert_eq!(r.estimate(), 1.0);
    assert!(r.is_ordered());

    let mut c = ThetaSketch::builder().build();
    c.update("a");
    c.update("b");
    c.update("c");

    i.update(&c.compact(false)).unwrap();

    let r = i.result_with_ordered(false);
    assert_eq!(r.estimate(), 0.0);
    assert!(!r.is_ordered());
}

#[test]
fn test_seed_mismatch_behaviour_for_empty_sketch() {
    let empty_other_seed = ThetaSketch::builder().seed(2).build();
    let mut i = ThetaIntersection::new(1);

    i.update(&empty_other_seed).unwrap();
    assert!(i.has_result());
    let r = i.result();
    assert!(r.is_empty());
}

#[test]
fn test_seed_mismatch_behaviour() {
    let mut one_other_seed = ThetaSketch::builder().seed(2).build();
    one_other_seed.update("value");
    let mut i = ThetaIntersection::new(1);

    assert!(i.update(&one_other_seed).is_err());
}

#[test]
fn test_intersection_with_empty_is_terminally_empty() {
    // Intersecting anything with the empty set gives the empty set
    let empty = ThetaSketch::builder().build();
    let non_empty = sketch_with_range(1, 1000);

    let mut i = ThetaIntersection::new_with_default_seed();
    i.update(&non_empty).unwrap();
    i.update(&empty).unwrap();

    let r = i.result();
    assert!(r.is_empty());
    assert_eq!(r.estimate(), 0.0);
    assert_eq!(r.num_retained(), 0);

    // Later inputs cannot resurrect it
    i.update(&non_empty).unwrap();
    let r = i.result();
    assert!(r.is_empty());
}

#[test]
fn test_empty_sampled_peer_still_lowers_theta() {
    // An empty sketch built with p < 1 carries a theta below the maximum;
    // the intersection must adopt it even though the result goes empty
    let s = sketch_with_range(0, 1000);
    let sampled_empty = ThetaSketch::builder().sampling_probability(0.25).build();
    assert!(sampled_empty.is_empty());
    assert!(sampled_empty.theta() < 1.0);

    let mut i = ThetaIntersection::new_with_default_seed();
    i.update(&s).unwrap();
    i.update(&sampled_empty).unwrap();

    let r = i.result();
    assert!(r.is_empty());
    assert_eq!(r.num_retained(), 0);
    assert_eq!(r.estimate(), 0.0);
    assert_eq!(r.theta64(), sampled_empty.theta64());
}

#[test]
fn test_empty_update_twice() {
    let empty = ThetaSketch::builder().build();
    let mut i = ThetaIntersection::new_with_default_seed();

    i.update(&empty).unwrap();
    let r1 = i.result();
    assert_eq!(r1.num_retained(), 0);
    assert!(r1.is_empty());
    assert!(!r1.is_estimation_mode());
    assert_eq!(r1.estimate(), 0.0);

    i.update(&empty).unwrap();
    let r2 = i.result();
    assert_eq!(r2.num_retained(), 0);
    assert!(r2.is_empty());
    assert!(!r2.is_estimation_mode());
    assert_eq!(r2.estimate(), 0.0);
}

#[test]
fn test_non_empty_no_retained_keys() {
    let mut s = ThetaSketch::builder().sampling_probability(0.001).build();
    s.update(1u64);

    let mut i = ThetaIntersection::new_with_default_seed();
    i.update(&s).unwrap();
    let r1 = i.result();
    assert_eq!(r1.num_retained(), 0);
    assert!(!r1.is_empty());
    assert!(r1.is_estimation_mode());
    assert!((r1.theta() - 0.001).abs() < 1e-6);
    assert_eq!(r1.estimate(), 0.0);

    i.update(&s).unwrap();
    let r2 = i.result();
    assert_eq!(r2.num_retained(), 0);
    assert!(!r2.is_empty());
    assert!(r2.is_estimation_mode());
    assert_eq!(r2.estimate(), 0.0);
}

#[test]
fn test_exact_half_overlap_unordered() {
    let s1 = sketch_with_range(0, 1000);
    let s2 = sketch_with_range(500, 1000);

    let mut i = ThetaIntersection::new_with_default_seed();
    i.update(&s1).unwrap();
    i.update(&s2).unwrap();
    let r = i.result();

    assert!(!r.is_empty());
    assert!(!r.is_estimation_mode());
    assert_eq!(r.estimate(), 500.0);
    assert_eq!(r.num_retained(), 500);
}

#[test]
fn test_exact_half_overlap_ordered() {
    let s1 = sketch_with_range(0, 1000);
    let s2 = sketch_with_range(500, 1000);

    let mut i = ThetaIntersection::new_with_default_seed();
    i.update(&s1.compact(true)).unwrap();
    i.update(&s2.compact(true)).unwrap();
    let r = i.result();

    assert!(!r.is_empty());
    assert!(!r.is_estimation_mode());
    assert_eq!(r.estimate(), 500.0);
    assert_eq!(r.num_retained(), 500);
}

#[test]
fn test_exact_disjoint() {
    let s1 = sketch_with_range(0, 1000);
    let s2 = sketch_with_range(1000, 1000);

    let mut i = ThetaIntersection::new_with_default_seed();
    i.update(&s1).unwrap();
    i.update(&s2).unwrap();
    let r = i.result();

    // Disjoint exact inputs produce the empty set
    assert!(r.is_empty());
    assert!(!r.is_estimation_mode());
    assert_eq!(r.estimate(), 0.0);
}

#[test]
fn test_estimation_half_overlap() {
    let s1 = sketch_with_range(0, 10_000);
    let s2 = sketch_with_range(5000, 10_000);

    let mut i = ThetaIntersection::new_with_default_seed();
    i.update(&s1).unwrap();
    i.update(&s2).unwrap();
    let r = i.result();

    assert!(!r.is_empty());
    assert!(r.is_estimation_mode());
    assert!((r.estimate() - 5000.0).abs() <= 5000.0 * 0.02);
}

#[test]
fn test_estimation_half_overlap_deserialized_compact() {
    let s1 = sketch_with_range(0, 10_000);
    let s2 = sketch_with_range(5000, 10_000);
    let c1 = CompactThetaSketch::deserialize(&s1.compact(true).serialize()).unwrap();
    let c2 = CompactThetaSketch::deserialize(&s2.compact(true).serialize()).unwrap();

    let mut i = ThetaIntersection::new_with_default_seed();
    i.update(&c1).unwrap();
    i.update(&c2).unwrap();
    let r = i.result();

    assert!(!r.is_empty());
    assert!(r.is_estimation_mode());
    assert!((r.estimate() - 5000.0).abs() <= 5000.0 * 0.02);
}

#[test]
fn test_estimation_disjoint_is_degenerate_but_not_empty() {
    let s1 = sketch_with_range(0, 10_000);
    let s2 = sketch_with_range(10_000, 10_000);

    let mut i = ThetaIntersection::new_with_default_seed();
    i.update(&s1).unwrap();
    i.update(&s2).unwrap();
    let r = i.result();

    // Theta stayed below one, so "no survivors" is not proof of emptiness
    assert!(!r.is_empty());
    assert!(r.is_estimation_mode());
    assert_eq!(r.estimate(), 0.0);
}

#[test]
fn test_intersection_is_commutative() {
    let s1 = sketch_with_range(0, 10_000);
    let s2 = sketch_with_range(5000, 10_000);

    let mut i12 = ThetaIntersection::new_with_default_seed();
    i12.update(&s1).unwrap();
    i12.update(&s2).unwrap();

    let mut i21 = ThetaIntersection::new_with_default_seed();
    i21.update(&s2).unwrap();
    i21.update(&s1).unwrap();

    let r12 = i12.result();
    let r21 = i21.result();
    assert_eq!(r12.theta64(), r21.theta64());
    assert_eq!(
        r12.iter().collect::<Vec<_>>(),
        r21.iter().collect::<Vec<_>>()
    );
}

#[test]
fn test_intersection_is_associative() {
    let s1 = sketch_with_range(0, 10_000);
    let s2 = sketch_with_range(3000, 10_000);
    let s3 = sketch_with_range(6000, 10_000);

    // ((s1 ∩ s2) ∩ s3)
    let mut left = ThetaIntersection::new_with_default_seed();
    left.update(&s1).unwrap();
    left.update(&s2).unwrap();
    let left_result = left.result();
    let mut left_outer = ThetaIntersection::new_with_default_seed();
    left_outer.update(&left_result).unwrap();
    left_outer.update(&s3).unwrap();

    // (s1 ∩ (s2 ∩ s3))
    let mut right = ThetaIntersection::new_with_default_seed();
    right.update(&s2).unwrap();
    right.update(&s3).unwrap();
    let right_result = right.result();
    let mut right_outer = ThetaIntersection::new_with_default_seed();
    right_outer.update(&s1).unwrap();
    right_outer.update(&right_result).unwrap();

    let rl = left_outer.result();
    let rr = right_outer.result();
    assert_eq!(rl.theta64(), rr.theta64());
    assert_eq!(rl.iter().collect::<Vec<_>>(), rr.iter().collect::<Vec<_>>());
}

#[test]
fn test_result_theta_is_minimum_of_inputs() {
    let s1 = sketch_with_range(0, 50_000);
    let s2 = sketch_with_range(0, 1000);

    let mut i = ThetaIntersection::new_with_default_seed();
    i.update(&s1).unwrap();
    i.update(&s2).unwrap();

    let r = i.result();
    assert_eq!(r.theta64(), s1.theta64().min(s2.theta64()));
}

#[test]
fn test_intersection_idempotent_on_identical_input() {
    let s = sketch_with_range(0, 10_000);

    let mut i = ThetaIntersection::new_with_default_seed();
    i.update(&s).unwrap();
    let first = i.result();
    i.update(&s).unwrap();
    let second = i.result();

    assert_eq!(first.theta64(), second.theta64());
    assert_eq!(
        first.iter().collect::<Vec<_>>(),
        second.iter().collect::<Vec<_>>()
    );
}
