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

use std::io;

/// Position-tracking reader over a serialized sketch image.
///
/// Reads past the end surface as `io::Error`, which the codecs map to
/// truncation errors.
pub(crate) struct SketchSlice<'a> {
    bytes: &'a [u8],
    at: usize,
}

impl SketchSlice<'_> {
    /// Wraps the given byte slice, positioned at its start.
    pub fn new(bytes: &[u8]) -> SketchSlice<'_> {
        SketchSlice { bytes, at: 0 }
    }

    /// Skips `n` bytes without reading them.
    pub fn advance(&mut self, n: usize) {
        self.at = self.at.saturating_add(n);
    }

    /// Reads the next `N` bytes as a fixed array.
    fn read_array<const N: usize>(&mut self) -> io::Result<[u8; N]> {
        let end = self.at.checked_add(N).filter(|&end| end <= self.bytes.len());
        let Some(end) = end else {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "sketch image ended mid-field",
            ));
        };
        let mut field = [0u8; N];
        field.copy_from_slice(&self.bytes[self.at..end]);
        self.at = end;
        Ok(field)
    }

    /// Reads the next four bytes as a little-endian u32.
    pub fn read_u32_le(&mut self) -> io::Result<u32> {
        Ok(u32::from_le_bytes(self.read_array()?))
    }
}
