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

//! Wire layout of the compact theta image.
//!
//! The image is little-endian. Its first 8 bytes are always present:
//!
//! ```text
//! byte 0        preamble length in longs (1, 2, or 3)
//! byte 1        serial version (3)
//! byte 2        sketch type (the theta family id, 3)
//! byte 3        lg_k hint (0 when unknown)
//! byte 4        reserved
//! byte 5        flags
//! bytes 6..8    seed hash (u16)
//! ```
//!
//! One preamble long holds an empty sketch or, with the single-item flag,
//! exactly one entry at byte 8. Two longs add the entry count; three longs
//! add theta for estimation mode. Entries follow the preamble.

/// Serial version written by this crate and required on read.
pub const SERIAL_VERSION: u8 = 3;

/// Bytes occupied by one retained entry.
pub const BYTES_PER_ENTRY: usize = 8;

/// Byte offsets of the preamble fields.
pub mod offset {
    pub const PRE_LONGS: usize = 0;
    pub const SER_VER: usize = 1;
    pub const SKETCH_TYPE: usize = 2;
    pub const LG_K: usize = 3;
    pub const FLAGS: usize = 5;
    pub const SEED_HASH: usize = 6;
    /// Entry count (u32) when the preamble has two or more longs.
    pub const COUNT: usize = 8;
    /// The lone entry of the single-item form.
    pub const SINGLE_ENTRY: usize = 8;
    /// Theta (u64), present only with three preamble longs.
    pub const THETA: usize = 16;
}

/// Preamble length in longs, by sketch form.
pub mod pre_longs {
    /// Empty or single-entry image.
    pub const MINIMAL: u8 = 1;
    /// Exact mode: count plus entries.
    pub const EXACT: u8 = 2;
    /// Estimation mode: count, theta, entries.
    pub const ESTIMATION: u8 = 3;
}

/// Bits of the flags byte.
pub mod flag {
    /// Never written; the format is little-endian.
    #[allow(dead_code)]
    pub const BIG_ENDIAN: u8 = 1;
    pub const READ_ONLY: u8 = 1 << 1;
    pub const EMPTY: u8 = 1 << 2;
    pub const COMPACT: u8 = 1 << 3;
    pub const ORDERED: u8 = 1 << 4;
    pub const SINGLE_ITEM: u8 = 1 << 5;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_bits_are_distinct() {
        let bits = [
            flag::BIG_ENDIAN,
            flag::READ_ONLY,
            flag::EMPTY,
            flag::COMPACT,
            flag::ORDERED,
            flag::SINGLE_ITEM,
        ];
        let mut seen = 0u8;
        for bit in bits {
            assert_eq!(bit.count_ones(), 1);
            assert_eq!(seen & bit, 0);
            seen |= bit;
        }
    }

    #[test]
    fn test_preamble_lengths_cover_all_forms() {
        assert_eq!(pre_longs::MINIMAL, 1);
        assert_eq!(pre_longs::EXACT, 2);
        assert_eq!(pre_longs::ESTIMATION, 3);
        assert_eq!(offset::THETA, pre_longs::EXACT as usize * 8);
    }
}
