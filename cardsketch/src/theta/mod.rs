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

//! Theta sketch implementation for distinct counting with set operations.
//!
//! A theta sketch retains a uniform sample of the hashed input below a
//! moving threshold ("theta") in an open-addressed hash table. Because the
//! retained set is a deterministic function of the hashes and the
//! threshold, sketches built with the same seed can be combined with set
//! semantics:
//!
//! - [`ThetaSketch::merge`] implements union;
//! - [`ThetaIntersection`] implements successive intersection;
//! - [`ThetaSketch::compact`] freezes a sketch into the compact,
//!   bit-exact wire form [`CompactThetaSketch`] for exchange across
//!   process boundaries.
//!
//! Both the mutable and compact forms implement [`ThetaSketchView`], the
//! read seam used by the set operations, so serialized peers participate
//! in merges and intersections without being converted back to updatable
//! form.
//!
//! # Usage
//!
//! ```
//! use cardsketch::theta::ThetaIntersection;
//! use cardsketch::theta::ThetaSketch;
//!
//! let mut a = ThetaSketch::builder().build();
//! let mut b = ThetaSketch::builder().build();
//! for i in 0..1000 {
//!     a.update(i);
//!     b.update(i + 500);
//! }
//!
//! let mut intersection = ThetaIntersection::new_with_default_seed();
//! intersection.update(&a).unwrap();
//! intersection.update(&b.compact(true)).unwrap();
//! assert_eq!(intersection.result().estimate(), 500.0);
//! ```

mod compact;
mod hash_table;
mod intersection;
mod serialization;
mod sketch;

pub use self::compact::CompactThetaSketch;
pub use self::intersection::ThetaIntersection;
pub use self::sketch::ThetaSketch;
pub use self::sketch::ThetaSketchBuilder;

/// Read-only view of a theta sketch, implemented by both the updatable and
/// the compact forms.
///
/// Set operations accept any view, so a freshly-built sketch and a
/// deserialized compact image are interchangeable as inputs.
pub trait ThetaSketchView {
    /// Whether the source set is logically empty.
    fn is_empty(&self) -> bool;

    /// Whether the retained entries are sorted ascending.
    fn is_ordered(&self) -> bool;

    /// The sampling threshold as a raw 64-bit value.
    fn theta64(&self) -> u64;

    /// Number of retained entries.
    fn num_retained(&self) -> usize;

    /// The 16-bit digest of the hash seed, for compatibility checks.
    fn seed_hash(&self) -> u16;

    /// Iterates over the retained entries.
    fn iter(&self) -> impl Iterator<Item = u64> + '_;
}
