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

/// A simple wrapper around a `Vec<u8>` that provides methods for writing
/// sketch fields in wire order.
pub(crate) struct SketchBytes {
    bytes: Vec<u8>,
}

impl SketchBytes {
    /// An empty writer with room for at least `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            bytes: Vec::with_capacity(capacity),
        }
    }

    /// Hands back the accumulated image.
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Appends a raw byte slice.
    pub fn write(&mut self, buf: &[u8]) {
        self.bytes.extend_from_slice(buf);
    }

    /// Appends a single byte.
    pub fn write_u8(&mut self, n: u8) {
        self.bytes.push(n);
    }

    /// Appends a u16 in little-endian byte order.
    pub fn write_u16_le(&mut self, n: u16) {
        self.write(&n.to_le_bytes());
    }

    /// Appends a u32 in little-endian byte order.
    pub fn write_u32_le(&mut self, n: u32) {
        self.write(&n.to_le_bytes());
    }

    /// Appends a u64 in little-endian byte order.
    pub fn write_u64_le(&mut self, n: u64) {
        self.write(&n.to_le_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_produces_wire_order() {
        let mut bytes = SketchBytes::with_capacity(32);
        bytes.write_u8(3);
        bytes.write_u16_le(0x1234);
        bytes.write_u32_le(42);
        bytes.write_u64_le(1 << 62);
        bytes.write(&[0xAA, 0xBB]);
        let buf = bytes.into_bytes();

        assert_eq!(buf[0], 3);
        assert_eq!(u16::from_le_bytes([buf[1], buf[2]]), 0x1234);
        assert_eq!(u32::from_le_bytes([buf[3], buf[4], buf[5], buf[6]]), 42);
        assert_eq!(buf[7..15], (1u64 << 62).to_le_bytes());
        assert_eq!(&buf[15..], &[0xAA, 0xBB]);
    }
}
