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

//! Compact theta sketch and its codec.
//!
//! The compact form is the immutable, serialized shape of a theta sketch:
//! just the threshold, the retained hashes, and the seed digest needed for
//! compatibility checks. Its byte image is bit-exact across producers, so
//! sketches travel between processes.

use byteorder::ByteOrder;
use byteorder::LE;

use crate::codec::Family;
use crate::codec::SketchBytes;
use crate::common::NumStdDev;
use crate::common::binomial_bounds;
use crate::error::Error;
use crate::hash::DEFAULT_UPDATE_SEED;
use crate::hash::compute_seed_hash;
use crate::theta::ThetaSketchView;
use crate::theta::hash_table::MAX_THETA;
use crate::theta::serialization::BYTES_PER_ENTRY;
use crate::theta::serialization::SERIAL_VERSION;
use crate::theta::serialization::flag;
use crate::theta::serialization::offset;
use crate::theta::serialization::pre_longs;

/// One of the four byte-image shapes a compact sketch can take.
///
/// The writer always emits the smallest shape that represents the sketch;
/// the reader recognizes the shape from the preamble length and flags.
enum Form {
    Empty,
    SingleEntry,
    Exact,
    Estimation,
}

/// Fields shared by every preamble, read before shape dispatch.
struct Preamble {
    pre_longs: u8,
    flags: u8,
    seed_hash: u16,
}

/// A compact, immutable theta sketch.
///
/// Unlike [`ThetaSketch`](super::ThetaSketch) it cannot take updates, but
/// it estimates and participates in merges and intersections through
/// [`ThetaSketchView`].
///
/// # Example
///
/// ```
/// use cardsketch::theta::CompactThetaSketch;
/// use cardsketch::theta::ThetaSketch;
///
/// let mut sketch = ThetaSketch::builder().build();
/// sketch.update("apple");
/// sketch.update("banana");
///
/// let compact = sketch.compact(true);
/// let bytes = compact.serialize();
///
/// let restored = CompactThetaSketch::deserialize(&bytes).unwrap();
/// assert_eq!(compact.estimate(), restored.estimate());
/// ```
#[derive(Debug, Clone)]
pub struct CompactThetaSketch {
    theta: u64,
    entries: Vec<u64>,
    seed_hash: u16,
    is_ordered: bool,
    is_empty: bool,
}

impl CompactThetaSketch {
    pub(crate) fn from_parts(
        entries: Vec<u64>,
        theta: u64,
        seed_hash: u16,
        is_ordered: bool,
        is_empty: bool,
    ) -> Self {
        Self {
            theta,
            entries,
            seed_hash,
            is_ordered,
            is_empty,
        }
    }

    /// Whether the source set was logically empty.
    pub fn is_empty(&self) -> bool {
        self.is_empty
    }

    /// Whether the retained entries are sorted ascending.
    pub fn is_ordered(&self) -> bool {
        self.is_ordered
    }

    /// Estimated number of distinct inputs.
    pub fn estimate(&self) -> f64 {
        if self.is_empty {
            return 0.0;
        }
        self.entries.len() as f64 / self.theta()
    }

    /// Theta as a fraction of the hash space, in (0, 1].
    pub fn theta(&self) -> f64 {
        self.theta as f64 / MAX_THETA as f64
    }

    /// Theta as the raw 64-bit sampling threshold.
    pub fn theta64(&self) -> u64 {
        self.theta
    }

    /// Whether the estimate carries sampling error (theta below maximum).
    pub fn is_estimation_mode(&self) -> bool {
        self.theta < MAX_THETA
    }

    /// Number of retained entries.
    pub fn num_retained(&self) -> usize {
        self.entries.len()
    }

    /// Iterates over the retained hash entries.
    pub fn iter(&self) -> impl Iterator<Item = u64> + '_ {
        self.entries.iter().copied()
    }

    /// 16-bit digest of the hash seed this sketch was built with.
    pub fn seed_hash(&self) -> u16 {
        self.seed_hash
    }

    /// Lower confidence bound at the given number of standard deviations.
    pub fn lower_bound(&self, num_std_dev: NumStdDev) -> f64 {
        if self.is_empty {
            return 0.0;
        }
        if !self.is_estimation_mode() {
            return self.num_retained() as f64;
        }
        binomial_bounds::lower_bound(self.num_retained() as u64, self.theta(), num_std_dev)
            .expect("theta should always be valid")
    }

    /// Upper confidence bound at the given number of standard deviations.
    pub fn upper_bound(&self, num_std_dev: NumStdDev) -> f64 {
        if self.is_empty {
            return 0.0;
        }
        if !self.is_estimation_mode() {
            return self.num_retained() as f64;
        }
        binomial_bounds::upper_bound(
            self.num_retained() as u64,
            self.theta(),
            num_std_dev,
            self.is_empty,
        )
        .expect("theta should always be valid")
    }

    fn form(&self) -> Form {
        if self.is_empty {
            Form::Empty
        } else if self.is_estimation_mode() {
            Form::Estimation
        } else if self.entries.len() == 1 {
            Form::SingleEntry
        } else {
            Form::Exact
        }
    }

    /// Serializes the sketch into its smallest byte image.
    pub fn serialize(&self) -> Vec<u8> {
        self.serialize_with_lg_k(0)
    }

    /// Serializes with an `lg_k` hint at byte 3, letting an updatable
    /// sketch be rebuilt from the image. A hint of 0 means "unknown".
    pub(crate) fn serialize_with_lg_k(&self, lg_k: u8) -> Vec<u8> {
        let form = self.form();
        let (longs, form_flag) = match form {
            Form::Empty => (pre_longs::MINIMAL, flag::EMPTY),
            Form::SingleEntry => (pre_longs::MINIMAL, flag::SINGLE_ITEM),
            Form::Exact => (pre_longs::EXACT, 0),
            Form::Estimation => (pre_longs::ESTIMATION, 0),
        };
        let ordered_flag = if self.is_ordered { flag::ORDERED } else { 0 };

        let mut bytes = SketchBytes::with_capacity(
            longs as usize * 8 + self.entries.len() * BYTES_PER_ENTRY,
        );
        bytes.write_u8(longs);
        bytes.write_u8(SERIAL_VERSION);
        bytes.write_u8(Family::THETA.id);
        bytes.write_u8(lg_k);
        bytes.write_u8(0);
        bytes.write_u8(flag::READ_ONLY | flag::COMPACT | form_flag | ordered_flag);
        bytes.write_u16_le(self.seed_hash);

        match form {
            Form::Empty => {}
            Form::SingleEntry => bytes.write_u64_le(self.entries[0]),
            Form::Exact | Form::Estimation => {
                bytes.write_u32_le(self.entries.len() as u32);
                bytes.write_u32_le(0); // padding
                if matches!(form, Form::Estimation) {
                    bytes.write_u64_le(self.theta);
                }
                let mut entry_bytes = vec![0u8; self.entries.len() * BYTES_PER_ENTRY];
                LE::write_u64_into(&self.entries, &mut entry_bytes);
                bytes.write(&entry_bytes);
            }
        }

        bytes.into_bytes()
    }

    /// Deserializes a compact image, validating against the default seed.
    pub fn deserialize(bytes: &[u8]) -> Result<Self, Error> {
        Self::deserialize_with_seed(bytes, DEFAULT_UPDATE_SEED)
    }

    /// Deserializes a compact image, validating against the given seed.
    ///
    /// # Errors
    ///
    /// Returns `InvalidData` when the buffer is shorter than it declares,
    /// the serial version or sketch type is wrong, the preamble length is
    /// out of range, or the seed hash does not match the given seed.
    pub fn deserialize_with_seed(bytes: &[u8], seed: u64) -> Result<Self, Error> {
        let preamble = read_preamble(bytes)?;

        if preamble.flags & flag::EMPTY != 0 {
            return Ok(Self {
                theta: MAX_THETA,
                entries: Vec::new(),
                seed_hash: preamble.seed_hash,
                is_ordered: true,
                is_empty: true,
            });
        }

        let expected_seed_hash = compute_seed_hash(seed);
        if preamble.seed_hash != expected_seed_hash {
            return Err(Error::deserial(format!(
                "seed hash mismatch: expected {expected_seed_hash}, got {}",
                preamble.seed_hash
            )));
        }

        let (theta, entries) = match preamble.pre_longs {
            1 => {
                // Non-empty one-long form: exactly one entry at byte 8.
                require_len(bytes, 16)?;
                (MAX_THETA, vec![LE::read_u64(&bytes[offset::SINGLE_ENTRY..])])
            }
            2 => {
                require_len(bytes, 16)?;
                let count = LE::read_u32(&bytes[offset::COUNT..]) as usize;
                (MAX_THETA, read_entries(bytes, 16, count)?)
            }
            3 => {
                require_len(bytes, 24)?;
                let count = LE::read_u32(&bytes[offset::COUNT..]) as usize;
                let theta = LE::read_u64(&bytes[offset::THETA..]);
                (theta, read_entries(bytes, 24, count)?)
            }
            other => {
                return Err(Error::deserial(format!(
                    "preamble longs must be 1, 2, or 3, got {other}"
                )));
            }
        };

        Ok(Self {
            theta,
            entries,
            seed_hash: preamble.seed_hash,
            is_ordered: preamble.flags & flag::ORDERED != 0,
            is_empty: false,
        })
    }
}

fn read_preamble(bytes: &[u8]) -> Result<Preamble, Error> {
    require_len(bytes, 8)?;
    if bytes[offset::SER_VER] != SERIAL_VERSION {
        return Err(Error::unsupported_serial_version(
            SERIAL_VERSION,
            bytes[offset::SER_VER],
        ));
    }
    Family::THETA.validate_id(bytes[offset::SKETCH_TYPE])?;
    Ok(Preamble {
        pre_longs: bytes[offset::PRE_LONGS],
        flags: bytes[offset::FLAGS],
        seed_hash: LE::read_u16(&bytes[offset::SEED_HASH..]),
    })
}

fn require_len(bytes: &[u8], at_least: usize) -> Result<(), Error> {
    if bytes.len() < at_least {
        return Err(Error::insufficient_data(format!(
            "at least {at_least} bytes expected, actual {}",
            bytes.len()
        )));
    }
    Ok(())
}

fn read_entries(bytes: &[u8], start: usize, count: usize) -> Result<Vec<u64>, Error> {
    let end = start + count * BYTES_PER_ENTRY;
    if bytes.len() < end {
        return Err(Error::insufficient_data(format!(
            "{end} bytes expected, actual {}",
            bytes.len()
        ))
        .with_context("num_entries", count));
    }
    let mut entries = vec![0u64; count];
    LE::read_u64_into(&bytes[start..end], &mut entries);
    Ok(entries)
}

impl ThetaSketchView for CompactThetaSketch {
    fn is_empty(&self) -> bool {
        self.is_empty
    }

    fn is_ordered(&self) -> bool {
        self.is_ordered
    }

    fn theta64(&self) -> u64 {
        self.theta
    }

    fn num_retained(&self) -> usize {
        self.entries.len()
    }

    fn seed_hash(&self) -> u16 {
        self.seed_hash
    }

    fn iter(&self) -> impl Iterator<Item = u64> + '_ {
        self.entries.iter().copied()
    }
}
