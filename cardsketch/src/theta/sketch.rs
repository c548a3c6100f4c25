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

//! Mutable theta sketch.

use std::hash::Hash;

use crate::common::NumStdDev;
use crate::common::ResizeFactor;
use crate::common::binomial_bounds;
use crate::common::canonical_double;
use crate::error::Error;
use crate::hash::DEFAULT_UPDATE_SEED;
use crate::theta::CompactThetaSketch;
use crate::theta::ThetaSketchView;
use crate::theta::hash_table::DEFAULT_LG_K;
use crate::theta::hash_table::MAX_LG_K;
use crate::theta::hash_table::MAX_THETA;
use crate::theta::hash_table::MIN_LG_K;
use crate::theta::hash_table::ThetaHashTable;
use crate::theta::serialization::offset;

/// Mutable theta sketch, built up from a stream of input values.
#[derive(Debug)]
pub struct ThetaSketch {
    table: ThetaHashTable,
}

impl ThetaSketch {
    /// Starts configuring a new sketch.
    ///
    /// # Examples
    ///
    /// ```
    /// # use cardsketch::theta::ThetaSketch;
    /// let sketch = ThetaSketch::builder().lg_k(12).build();
    /// assert_eq!(sketch.lg_k(), 12);
    /// ```
    pub fn builder() -> ThetaSketchBuilder {
        ThetaSketchBuilder::default()
    }

    /// Feeds one hashable value into the sketch.
    ///
    /// For `f32`/`f64` values use `update_f32`/`update_f64` instead, which
    /// canonicalize before hashing.
    ///
    /// # Examples
    ///
    /// ```
    /// # use cardsketch::theta::ThetaSketch;
    /// let mut sketch = ThetaSketch::builder().build();
    /// sketch.update("apple");
    /// assert!(sketch.estimate() >= 1.0);
    /// ```
    pub fn update<T: Hash>(&mut self, value: T) {
        self.table.try_insert(value);
    }

    /// Feeds one `f64` into the sketch.
    ///
    /// Signed zero and NaN are canonicalized first so equal values always
    /// land on the same hash.
    pub fn update_f64(&mut self, value: f64) {
        self.update(canonical_double(value));
    }

    /// Feeds one `f32` into the sketch.
    pub fn update_f32(&mut self, value: f32) {
        self.update_f64(value as f64);
    }

    /// Estimated number of distinct inputs.
    ///
    /// # Examples
    ///
    /// ```
    /// # use cardsketch::theta::ThetaSketch;
    /// # let mut sketch = ThetaSketch::builder().build();
    /// # sketch.update("apple");
    /// assert!(sketch.estimate() >= 1.0);
    /// ```
    pub fn estimate(&self) -> f64 {
        if self.is_empty() {
            return 0.0;
        }
        self.num_retained() as f64 / self.theta()
    }

    /// Theta as a fraction of the hash space, in (0, 1].
    pub fn theta(&self) -> f64 {
        self.table.theta() as f64 / MAX_THETA as f64
    }

    /// Theta as the raw 64-bit sampling threshold.
    pub fn theta64(&self) -> u64 {
        self.table.theta()
    }

    /// Whether the sketch has seen no input at all.
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Whether the estimate carries sampling error (theta below maximum).
    pub fn is_estimation_mode(&self) -> bool {
        self.table.theta() < MAX_THETA
    }

    /// Number of retained hash entries.
    pub fn num_retained(&self) -> usize {
        self.table.num_retained()
    }

    /// The configured log2 of the nominal entry count.
    pub fn lg_k(&self) -> u8 {
        self.table.lg_nom_size()
    }

    /// Trims the retained set down to the nominal size k.
    ///
    /// Returns `&mut self` for chaining into [`Self::compact`].
    pub fn trim(&mut self) -> &mut Self {
        self.table.trim();
        self
    }

    /// Discards all state, returning the sketch to its built state.
    pub fn reset(&mut self) {
        self.table.reset();
    }

    /// Iterates over the retained hash entries.
    pub fn iter(&self) -> impl Iterator<Item = u64> + '_ {
        self.table.iter()
    }

    /// Folds another sketch into this one (set union).
    ///
    /// The peer may be an updatable sketch or a deserialized compact
    /// image; an ordered compact peer is scanned with an early stop at the
    /// first entry past theta.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` when the peer was built with a different
    /// hash seed.
    ///
    /// # Examples
    ///
    /// ```
    /// # use cardsketch::theta::ThetaSketch;
    /// let mut a = ThetaSketch::builder().build();
    /// let mut b = ThetaSketch::builder().build();
    /// a.update("x");
    /// b.update("y");
    /// a.merge(&b).unwrap();
    /// assert_eq!(a.estimate(), 2.0);
    /// ```
    pub fn merge<S: ThetaSketchView>(&mut self, other: &S) -> Result<(), Error> {
        if other.is_empty() {
            return Ok(());
        }
        if other.seed_hash() != self.table.seed_hash() {
            return Err(Error::invalid_argument("sketch seeds differ")
                .with_context("own_seed_hash", self.table.seed_hash())
                .with_context("peer_seed_hash", other.seed_hash()));
        }

        self.table.set_empty(false);
        // A smaller peer theta invalidates own entries at or above it.
        self.table.shrink_theta(other.theta64());

        let theta = self.table.theta();
        if other.is_ordered() {
            for hash in other.iter().take_while(|&hash| hash < theta) {
                self.table.try_insert_hash(hash);
            }
        } else {
            for hash in other.iter().filter(|&hash| hash < theta) {
                self.table.try_insert_hash(hash);
            }
        }
        Ok(())
    }

    /// Lower confidence bound at the given number of standard deviations.
    ///
    /// # Examples
    ///
    /// ```
    /// use cardsketch::common::NumStdDev;
    /// use cardsketch::theta::ThetaSketch;
    ///
    /// let mut sketch = ThetaSketch::builder().lg_k(12).build();
    /// for i in 0..10000 {
    ///     sketch.update(i);
    /// }
    ///
    /// let estimate = sketch.estimate();
    /// assert!(sketch.lower_bound(NumStdDev::Two) <= estimate);
    /// assert!(estimate <= sketch.upper_bound(NumStdDev::Two));
    /// ```
    pub fn lower_bound(&self, num_std_dev: NumStdDev) -> f64 {
        if !self.is_estimation_mode() {
            return self.num_retained() as f64;
        }
        // The builder guarantees sampling_probability > 0, so theta stays
        // positive and the bound computation cannot fail
        binomial_bounds::lower_bound(self.num_retained() as u64, self.theta(), num_std_dev)
            .expect("theta should always be valid")
    }

    /// Upper confidence bound at the given number of standard deviations.
    pub fn upper_bound(&self, num_std_dev: NumStdDev) -> f64 {
        if !self.is_estimation_mode() {
            return self.num_retained() as f64;
        }
        // The builder guarantees sampling_probability > 0, so theta stays
        // positive and the bound computation cannot fail
        binomial_bounds::upper_bound(
            self.num_retained() as u64,
            self.theta(),
            num_std_dev,
            self.is_empty(),
        )
        .expect("theta should always be valid")
    }

    /// Copies the retained entries out into an immutable compact sketch.
    ///
    /// # Examples
    ///
    /// ```
    /// # use cardsketch::theta::ThetaSketch;
    /// let mut sketch = ThetaSketch::builder().build();
    /// sketch.update("apple");
    /// let compact = sketch.compact(true);
    /// assert!(compact.is_ordered());
    /// assert_eq!(compact.estimate(), sketch.estimate());
    /// ```
    pub fn compact(&self, ordered: bool) -> CompactThetaSketch {
        let mut entries: Vec<u64> = self.iter().collect();
        if ordered {
            entries.sort_unstable();
        }
        CompactThetaSketch::from_parts(
            entries,
            self.table.theta(),
            self.table.seed_hash(),
            ordered,
            self.is_empty(),
        )
    }

    /// Serializes the sketch into the compact wire image.
    ///
    /// The image carries this sketch's `lg_k` so that
    /// [`deserialize`](Self::deserialize) can rebuild an updatable sketch
    /// of the same configuration.
    pub fn serialize(&self) -> Vec<u8> {
        self.compact(true).serialize_with_lg_k(self.lg_k())
    }

    /// Rebuilds an updatable sketch from a compact image.
    ///
    /// Validates against the default seed. For sketches created with a
    /// different seed, use
    /// [`deserialize_with_seed`](Self::deserialize_with_seed).
    ///
    /// # Examples
    ///
    /// ```
    /// # use cardsketch::theta::ThetaSketch;
    /// let mut sketch = ThetaSketch::builder().build();
    /// sketch.update("apple");
    /// let bytes = sketch.serialize();
    /// let restored = ThetaSketch::deserialize(&bytes).unwrap();
    /// assert_eq!(sketch.estimate(), restored.estimate());
    /// ```
    pub fn deserialize(bytes: &[u8]) -> Result<Self, Error> {
        Self::deserialize_with_seed(bytes, DEFAULT_UPDATE_SEED)
    }

    /// Rebuilds an updatable sketch from a compact image, validating
    /// against the given seed.
    ///
    /// # Errors
    ///
    /// Fails when the image is malformed, the seed hash does not match,
    /// or the image carries no usable `lg_k` (images produced by
    /// [`CompactThetaSketch::serialize`] do not; deserialize those with
    /// [`CompactThetaSketch::deserialize`] instead).
    pub fn deserialize_with_seed(bytes: &[u8], seed: u64) -> Result<Self, Error> {
        let compact = CompactThetaSketch::deserialize_with_seed(bytes, seed)?;

        let lg_k = bytes[offset::LG_K];
        if !(MIN_LG_K..=MAX_LG_K).contains(&lg_k) {
            return Err(Error::deserial(format!(
                "lg_k {lg_k} is out of range [{MIN_LG_K}, {MAX_LG_K}]"
            )));
        }

        let is_empty = compact.is_empty();
        let theta = compact.theta64();
        let entries: Vec<u64> = compact.iter().collect();
        let mut table = ThetaHashTable::from_entries(lg_k, seed, theta, entries);
        table.set_empty(is_empty);
        Ok(ThetaSketch { table })
    }
}

impl ThetaSketchView for ThetaSketch {
    fn is_empty(&self) -> bool {
        self.is_empty()
    }

    fn is_ordered(&self) -> bool {
        false
    }

    fn theta64(&self) -> u64 {
        self.theta64()
    }

    fn num_retained(&self) -> usize {
        self.num_retained()
    }

    fn seed_hash(&self) -> u16 {
        self.table.seed_hash()
    }

    fn iter(&self) -> impl Iterator<Item = u64> + '_ {
        self.table.iter()
    }
}

/// Configuration for [`ThetaSketch`].
#[derive(Debug)]
pub struct ThetaSketchBuilder {
    lg_k: u8,
    resize_factor: ResizeFactor,
    sampling_probability: f32,
    seed: u64,
}

impl Default for ThetaSketchBuilder {
    fn default() -> Self {
        Self {
            lg_k: DEFAULT_LG_K,
            resize_factor: ResizeFactor::X8,
            sampling_probability: 1.0,
            seed: DEFAULT_UPDATE_SEED,
        }
    }
}

impl ThetaSketchBuilder {
    /// Sets the log2 of the nominal entry count k.
    ///
    /// # Panics
    ///
    /// If lg_k is not in range [4, 26]
    ///
    /// # Examples
    ///
    /// ```
    /// # use cardsketch::theta::ThetaSketch;
    /// let sketch = ThetaSketch::builder().lg_k(12).build();
    /// assert_eq!(sketch.lg_k(), 12);
    /// ```
    pub fn lg_k(mut self, lg_k: u8) -> Self {
        assert!(
            lg_k >= MIN_LG_K && lg_k <= MAX_LG_K,
            "lg_k must be in [{MIN_LG_K}, {MAX_LG_K}], got {lg_k}"
        );
        self.lg_k = lg_k;
        self
    }

    /// Sets the hash table growth step.
    pub fn resize_factor(mut self, factor: ResizeFactor) -> Self {
        self.resize_factor = factor;
        self
    }

    /// Sets the up-front sampling probability p.
    ///
    /// The sketch starts with `theta = p`, so only a `p` fraction of the
    /// hashed inputs is ever retained. Must be positive so theta stays
    /// valid for bound calculations.
    ///
    /// # Panics
    ///
    /// Panics if p is not in range (0.0, 1.0]
    ///
    /// # Examples
    ///
    /// ```
    /// # use cardsketch::theta::ThetaSketch;
    /// let _sketch = ThetaSketch::builder().sampling_probability(0.5).build();
    /// ```
    pub fn sampling_probability(mut self, probability: f32) -> Self {
        assert!(
            probability > 0.0 && probability <= 1.0,
            "sampling_probability must be in (0.0, 1.0], got {probability}"
        );
        self.sampling_probability = probability;
        self
    }

    /// Sets the hash seed.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Builds the configured sketch.
    pub fn build(self) -> ThetaSketch {
        ThetaSketch {
            table: ThetaHashTable::new(
                self.lg_k,
                self.resize_factor,
                self.sampling_probability,
                self.seed,
            ),
        }
    }
}
