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

use crate::error::Error;
use crate::hash::DEFAULT_UPDATE_SEED;
use crate::hash::compute_seed_hash;
use crate::theta::CompactThetaSketch;
use crate::theta::ThetaSketchView;
use crate::theta::hash_table::MAX_THETA;

/// Running intersection of every input seen so far.
///
/// The entries are kept sorted ascending, which makes membership tests a
/// binary search and result compaction a copy. Every entry is non-zero
/// and below `theta`.
#[derive(Debug)]
struct RetainedSet {
    theta: u64,
    entries: Vec<u64>,
    is_empty: bool,
}

/// Progress of the operator.
#[derive(Debug)]
enum State {
    /// No input yet; the operator stands for the universe set.
    Universe,
    /// At least one input narrowed the universe down to this set.
    Narrowed(RetainedSet),
}

/// Stateful intersection operator for theta sketches.
///
/// The operator starts out representing the universe set: the first
/// [`update`](Self::update) adopts the incoming sketch's entry set, and
/// every later update reduces the current set to the overlap. Before the
/// first update the result is undefined; use
/// [`has_result`](Self::has_result) to check.
///
/// Under a fixed seed the operation is commutative, associative, and
/// idempotent, and the result's theta is the minimum of all inputs'
/// thetas.
#[derive(Debug)]
pub struct ThetaIntersection {
    seed_hash: u16,
    state: State,
}

impl ThetaIntersection {
    /// Creates an intersection operator for sketches built with `seed`.
    pub fn new(seed: u64) -> Self {
        Self {
            seed_hash: compute_seed_hash(seed),
            state: State::Universe,
        }
    }

    /// Creates an intersection operator for the default seed.
    pub fn new_with_default_seed() -> Self {
        Self::new(DEFAULT_UPDATE_SEED)
    }

    /// Narrows the intersection by one more sketch.
    ///
    /// The peer may be an updatable sketch or a deserialized compact
    /// image. An empty-and-exact input makes the intersection terminally
    /// empty.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` when a non-empty peer carries a foreign
    /// seed hash, or when the peer's entry stream is inconsistent with its
    /// declared count (duplicates, zero or out-of-range entries, too few
    /// or too many entries walked).
    pub fn update<S: ThetaSketchView>(&mut self, sketch: &S) -> Result<(), Error> {
        // A terminally empty intersection absorbs every further input.
        if let State::Narrowed(set) = &self.state {
            if set.is_empty {
                return Ok(());
            }
        }

        // Empty peers skip the seed check: their entry sets are vacuous,
        // so no foreign hashes can leak in.
        if !sketch.is_empty() && sketch.seed_hash() != self.seed_hash {
            return Err(Error::invalid_argument("sketch seeds differ")
                .with_context("own_seed_hash", self.seed_hash)
                .with_context("peer_seed_hash", sketch.seed_hash()));
        }

        // Theta and emptiness combine independently of the entry walk: an
        // empty peer can still carry a sampled theta below the current one.
        let (theta_so_far, empty_so_far) = match &self.state {
            State::Universe => (MAX_THETA, false),
            State::Narrowed(set) => (set.theta, set.is_empty),
        };
        let theta = theta_so_far.min(sketch.theta64());
        let is_empty = empty_so_far || sketch.is_empty();

        let narrowed = match &self.state {
            State::Universe => {
                if sketch.num_retained() == 0 {
                    RetainedSet {
                        theta,
                        entries: Vec::new(),
                        is_empty,
                    }
                } else {
                    RetainedSet {
                        theta,
                        entries: adopted_entries(sketch, theta)?,
                        is_empty,
                    }
                }
            }
            State::Narrowed(set) if set.entries.is_empty() || sketch.num_retained() == 0 => {
                // Either side without entries leaves nothing to keep; the
                // tightened theta and emptiness are still adopted.
                RetainedSet {
                    theta,
                    entries: Vec::new(),
                    is_empty,
                }
            }
            State::Narrowed(set) => {
                let survivors = surviving_entries(set, sketch, theta)?;
                let drained_to_nothing = survivors.is_empty() && theta == MAX_THETA;
                RetainedSet {
                    theta,
                    entries: survivors,
                    is_empty: is_empty || drained_to_nothing,
                }
            }
        };
        self.state = State::Narrowed(narrowed);
        Ok(())
    }

    /// Whether at least one update has been applied.
    pub fn has_result(&self) -> bool {
        matches!(self.state, State::Narrowed(_))
    }

    /// The intersection so far, as an ordered compact sketch.
    ///
    /// # Panics
    ///
    /// Panics if called before the first [`update`](Self::update).
    pub fn result(&self) -> CompactThetaSketch {
        self.result_with_ordered(true)
    }

    /// The intersection so far, as a compact sketch.
    ///
    /// # Panics
    ///
    /// Panics if called before the first [`update`](Self::update).
    pub fn result_with_ordered(&self, ordered: bool) -> CompactThetaSketch {
        let State::Narrowed(set) = &self.state else {
            panic!("ThetaIntersection::result() called before first update()");
        };
        CompactThetaSketch::from_parts(
            set.entries.clone(),
            set.theta,
            self.seed_hash,
            ordered,
            set.is_empty,
        )
    }
}

/// Takes over the first input's entry set, screening for corruption:
/// every entry must be non-zero, below `theta`, and distinct, and the
/// stream must match the declared count.
fn adopted_entries<S: ThetaSketchView>(sketch: &S, theta: u64) -> Result<Vec<u64>, Error> {
    let mut entries = Vec::with_capacity(sketch.num_retained());
    for entry in sketch.iter() {
        if entry == 0 || entry >= theta {
            return Err(corrupt_peer("entry outside the valid hash range"));
        }
        entries.push(entry);
    }
    if entries.len() != sketch.num_retained() {
        return Err(corrupt_peer("entry stream shorter than the declared count"));
    }
    entries.sort_unstable();
    reject_duplicates(&entries)?;
    Ok(entries)
}

/// Walks the peer's entries and keeps those already present in `set`.
///
/// For an ordered peer the walk stops at the first entry past theta; an
/// unordered peer must deliver exactly its declared count.
fn surviving_entries<S: ThetaSketchView>(
    set: &RetainedSet,
    sketch: &S,
    theta: u64,
) -> Result<Vec<u64>, Error> {
    let mut walked = 0usize;
    let mut survivors = Vec::new();
    for entry in sketch.iter() {
        if entry >= theta {
            if sketch.is_ordered() {
                break;
            }
            walked += 1;
            continue;
        }
        if entry == 0 {
            return Err(corrupt_peer("entry outside the valid hash range"));
        }
        walked += 1;
        if set.entries.binary_search(&entry).is_ok() {
            survivors.push(entry);
        }
    }

    if walked > sketch.num_retained() {
        return Err(corrupt_peer("more entries walked than declared"));
    }
    if !sketch.is_ordered() && walked < sketch.num_retained() {
        return Err(corrupt_peer("fewer entries walked than declared"));
    }

    survivors.sort_unstable();
    reject_duplicates(&survivors)?;
    Ok(survivors)
}

fn reject_duplicates(sorted: &[u64]) -> Result<(), Error> {
    if sorted.windows(2).any(|pair| pair[0] == pair[1]) {
        return Err(corrupt_peer("duplicate entries"));
    }
    Ok(())
}

fn corrupt_peer(what: &str) -> Error {
    Error::invalid_argument(format!("input sketch is inconsistent: {what}"))
}
