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

//! Keyed 128-bit hashing shared by all sketch families.

mod murmurhash;

pub use self::murmurhash::MurmurHash3X64128;

/// Default hash seed used by all sketches unless configured otherwise.
///
/// Sketches only merge with sketches built from the same seed, so this
/// constant is part of the wire-level contract between producers.
pub const DEFAULT_UPDATE_SEED: u64 = 9001;

/// Derives the 16-bit seed hash written into serialized sketches.
///
/// Peers compare seed hashes to detect incompatible seeds without learning
/// the seed itself. The digest is the low 16 bits of hashing the
/// little-endian seed bytes with seed 0.
pub fn compute_seed_hash(seed: u64) -> u16 {
    use std::hash::Hasher;

    let mut hasher = MurmurHash3X64128::with_seed(0);
    hasher.write(&seed.to_le_bytes());
    let (h1, _) = hasher.finish128();
    (h1 & 0xFFFF) as u16
}
