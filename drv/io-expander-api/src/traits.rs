// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Bus transport abstraction for expander drivers

use crate::ResponseCode;
use embedded_hal::i2c::{Error as _, ErrorKind, I2c};
use spin::Mutex;

/// Register-level transport to an expander chip
///
/// Expanders in this family address each register as its own I2C device
/// address, so a transaction is a single byte written to or read from an
/// address. Each call is one complete bus transaction; timeouts are the
/// transport's responsibility.
///
/// Implementations report failures with their own error type, which must
/// convert into the [`ResponseCode`] taxonomy so drivers can classify it.
pub trait ExpanderBus {
    /// Transport-specific error type that can be converted to ResponseCode
    type Error: Into<ResponseCode>;

    /// Write one byte to the register at `addr`.
    ///
    /// # Errors
    ///
    /// Fails if the device does not acknowledge, the bus times out, or
    /// arbitration is lost.
    fn write_register(&mut self, addr: u8, value: u8) -> Result<(), Self::Error>;

    /// Read one byte from the register at `addr`.
    ///
    /// Output-only drivers never call this; it is part of the contract for
    /// input-capable variants.
    fn read_register(&mut self, addr: u8) -> Result<u8, Self::Error>;
}

impl<B: ExpanderBus + ?Sized> ExpanderBus for &mut B {
    type Error = B::Error;

    fn write_register(&mut self, addr: u8, value: u8) -> Result<(), Self::Error> {
        (**self).write_register(addr, value)
    }

    fn read_register(&mut self, addr: u8) -> Result<u8, Self::Error> {
        (**self).read_register(addr)
    }
}

/// Handle onto a bus shared by several drivers
///
/// The bus is locked for exactly one transaction and released when the call
/// returns, whatever its outcome.
pub struct SharedBus<'a, B> {
    bus: &'a Mutex<B>,
}

impl<'a, B> SharedBus<'a, B> {
    pub fn new(bus: &'a Mutex<B>) -> Self {
        Self { bus }
    }
}

impl<B> Clone for SharedBus<'_, B> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<B> Copy for SharedBus<'_, B> {}

impl<B: ExpanderBus> ExpanderBus for SharedBus<'_, B> {
    type Error = B::Error;

    fn write_register(&mut self, addr: u8, value: u8) -> Result<(), Self::Error> {
        self.bus.lock().write_register(addr, value)
    }

    fn read_register(&mut self, addr: u8) -> Result<u8, Self::Error> {
        self.bus.lock().read_register(addr)
    }
}

/// Adapter from an `embedded-hal` I2C master to an [`ExpanderBus`]
pub struct HalBus<I> {
    i2c: I,
}

impl<I: I2c> HalBus<I> {
    pub fn new(i2c: I) -> Self {
        Self { i2c }
    }

    /// Releases the underlying I2C master.
    pub fn free(self) -> I {
        self.i2c
    }
}

fn classify(kind: ErrorKind) -> ResponseCode {
    match kind {
        ErrorKind::NoAcknowledge(_) => ResponseCode::NoDevice,
        ErrorKind::ArbitrationLoss => ResponseCode::ArbitrationLost,
        _ => ResponseCode::BusError,
    }
}

impl<I: I2c> ExpanderBus for HalBus<I> {
    type Error = ResponseCode;

    fn write_register(&mut self, addr: u8, value: u8) -> Result<(), Self::Error> {
        self.i2c
            .write(addr, &[value])
            .map_err(|e| classify(e.kind()))
    }

    fn read_register(&mut self, addr: u8) -> Result<u8, Self::Error> {
        let mut buf = [0u8];
        self.i2c
            .read(addr, &mut buf)
            .map_err(|e| classify(e.kind()))?;
        Ok(buf[0])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockBus;
    use embedded_hal::i2c::NoAcknowledgeSource;
    use embedded_hal_mock::eh1::i2c::{Mock, Transaction};

    #[test]
    fn hal_bus_single_byte_transactions() {
        let expectations = [
            Transaction::write(0x38, vec![0b1010_0101]),
            Transaction::read(0x26, vec![0x3c]),
        ];
        let mut i2c = Mock::new(&expectations);

        let mut bus = HalBus::new(i2c.clone());
        bus.write_register(0x38, 0b1010_0101).unwrap();
        assert_eq!(bus.read_register(0x26), Ok(0x3c));

        i2c.done();
    }

    #[test]
    fn hal_bus_maps_nack() {
        let expectations = [Transaction::write(0x24, vec![0x01])
            .with_error(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address))];
        let mut i2c = Mock::new(&expectations);

        let mut bus = HalBus::new(i2c.clone());
        assert_eq!(
            bus.write_register(0x24, 0x01),
            Err(ResponseCode::NoDevice)
        );

        i2c.done();
    }

    #[test]
    fn classify_error_kinds() {
        assert_eq!(classify(ErrorKind::ArbitrationLoss), ResponseCode::ArbitrationLost);
        assert_eq!(classify(ErrorKind::Bus), ResponseCode::BusError);
        assert_eq!(classify(ErrorKind::Overrun), ResponseCode::BusError);
    }

    #[test]
    fn shared_bus_handles_use_one_bus() {
        let bus = Mutex::new(MockBus::new());

        let mut a = SharedBus::new(&bus);
        let mut b = a;
        a.write_register(0x38, 0x01).unwrap();
        b.write_register(0x23, 0x02).unwrap();

        // Both handles released the lock after their transaction.
        assert!(!bus.is_locked());
        assert_eq!(bus.lock().writes(), &[(0x38, 0x01), (0x23, 0x02)]);
    }

    #[test]
    fn shared_bus_releases_lock_on_failure() {
        let bus = Mutex::new(MockBus::new());
        bus.lock().fail_next(1, ResponseCode::BusTimeout);

        let mut handle = SharedBus::new(&bus);
        assert_eq!(
            handle.write_register(0x38, 0xff),
            Err(ResponseCode::BusTimeout)
        );
        assert!(!bus.is_locked());

        handle.write_register(0x38, 0xff).unwrap();
        assert_eq!(bus.lock().writes(), &[(0x38, 0xff)]);
    }
}
