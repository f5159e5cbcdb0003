// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Mock expander bus for testing
//!
//! Records every acknowledged register write and can be told to fail the next
//! few transactions, which is enough to exercise a driver's retry and
//! rollback paths without hardware.

use crate::{traits::ExpanderBus, ResponseCode};

/// Number of writes the log keeps; later writes are not recorded.
pub const WRITE_LOG_DEPTH: usize = 64;

pub struct MockBus {
    /// Acknowledged writes as `(address, value)`, oldest first
    writes: heapless::Vec<(u8, u8), WRITE_LOG_DEPTH>,
    /// Last value written to or preset for each 7-bit address
    registers: [u8; 128],
    /// Number of upcoming transactions that will fail
    failures: u8,
    failure: ResponseCode,
    /// Transactions attempted, including failed ones
    transaction_count: u32,
}

impl MockBus {
    pub fn new() -> Self {
        Self {
            writes: heapless::Vec::new(),
            registers: [0; 128],
            failures: 0,
            failure: ResponseCode::NoDevice,
            transaction_count: 0,
        }
    }

    pub fn writes(&self) -> &[(u8, u8)] {
        &self.writes
    }

    pub fn last_write(&self) -> Option<(u8, u8)> {
        self.writes.last().copied()
    }

    /// Forgets logged writes; register contents are kept.
    pub fn clear_writes(&mut self) {
        self.writes.clear();
    }

    /// Makes the next `count` transactions fail with `code`.
    pub fn fail_next(&mut self, count: u8, code: ResponseCode) {
        self.failures = count;
        self.failure = code;
    }

    /// Presets the value returned when `addr` is read.
    pub fn set_register(&mut self, addr: u8, value: u8) {
        self.registers[usize::from(addr & 0x7f)] = value;
    }

    pub fn register(&self, addr: u8) -> u8 {
        self.registers[usize::from(addr & 0x7f)]
    }

    pub fn transaction_count(&self) -> u32 {
        self.transaction_count
    }

    fn begin(&mut self) -> Result<(), ResponseCode> {
        self.transaction_count = self.transaction_count.wrapping_add(1);
        if self.failures > 0 {
            self.failures -= 1;
            return Err(self.failure);
        }
        Ok(())
    }
}

impl Default for MockBus {
    fn default() -> Self {
        Self::new()
    }
}

impl ExpanderBus for MockBus {
    type Error = ResponseCode;

    fn write_register(&mut self, addr: u8, value: u8) -> Result<(), Self::Error> {
        self.begin()?;
        self.set_register(addr, value);
        let _ = self.writes.push((addr, value));
        Ok(())
    }

    fn read_register(&mut self, addr: u8) -> Result<u8, Self::Error> {
        self.begin()?;
        Ok(self.register(addr))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_records_writes() {
        let mut bus = MockBus::new();
        bus.write_register(0x38, 0x08).unwrap();
        bus.write_register(0x23, 0x01).unwrap();

        assert_eq!(bus.writes(), &[(0x38, 0x08), (0x23, 0x01)]);
        assert_eq!(bus.last_write(), Some((0x23, 0x01)));
        assert_eq!(bus.read_register(0x38), Ok(0x08));
        assert_eq!(bus.transaction_count(), 3);
    }

    #[test]
    fn test_mock_failure_injection() {
        let mut bus = MockBus::new();
        bus.fail_next(2, ResponseCode::ArbitrationLost);

        assert_eq!(bus.write_register(0x38, 1), Err(ResponseCode::ArbitrationLost));
        assert_eq!(bus.read_register(0x26), Err(ResponseCode::ArbitrationLost));
        assert_eq!(bus.write_register(0x38, 1), Ok(()));

        // Failed writes never reach the register or the log.
        assert_eq!(bus.writes(), &[(0x38, 1)]);
        assert_eq!(bus.transaction_count(), 3);
    }
}
