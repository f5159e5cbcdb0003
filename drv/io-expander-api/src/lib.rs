// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Common types for I2C I/O-expander drivers
//!
//! This crate holds everything a caller needs to describe an expander and its
//! pins without depending on a particular chip driver: the response codes
//! returned by every operation, the validated configuration records, and the
//! [`ExpanderBus`] transport trait the drivers are generic over.
//!
//! It works on both the host and embedded systems, so it can be used in
//! host-side tests.
//!
//! # Configuration records
//!
//! Configuration arrives already parsed from an outer layer. The records here
//! re-check what a driver relies on:
//!
//! - [`PinCount`] only admits 4, 8 or 16 pins
//! - [`PinConfig::validate`] rejects pin numbers past the configured count and
//!   any mode other than output
//! - [`RegisterMap::validate`] rejects reserved or 10-bit addresses

#![cfg_attr(not(test), no_std)]

use bitflags::bitflags;
use num_derive::FromPrimitive;
use num_traits::FromPrimitive as _;

pub mod traits;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use traits::{ExpanderBus, HalBus, SharedBus};

/// The response code returned by expander operations. Codes are grouped into
/// configuration errors, transport errors and lifecycle errors; see
/// [`ResponseCode::is_configuration`] and [`ResponseCode::is_transport`].
#[derive(Copy, Clone, Debug, FromPrimitive, Eq, PartialEq)]
#[repr(u32)]
pub enum ResponseCode {
    /// Pin count is not one the chip family supports
    BadPinCount = 1,
    /// Pin number is out of range for the configured pin count
    BadPin,
    /// Requested pin mode is not supported by the chip
    BadMode,
    /// Register address is not a usable 7-bit address
    BadAddress,
    /// Device has not completed setup
    NotReady,
    /// Device failed setup and is out of service
    DeviceFailed,
    /// Addressed device did not acknowledge
    NoDevice,
    /// Bus transaction timed out
    BusTimeout,
    /// Bus arbitration was lost to another master
    ArbitrationLost,
    /// I2C bus error
    BusError,
}

impl ResponseCode {
    /// Returns `true` for errors raised while binding configuration.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            ResponseCode::BadPinCount
                | ResponseCode::BadPin
                | ResponseCode::BadMode
                | ResponseCode::BadAddress
        )
    }

    /// Returns `true` for errors reported by the bus transport.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            ResponseCode::NoDevice
                | ResponseCode::BusTimeout
                | ResponseCode::ArbitrationLost
                | ResponseCode::BusError
        )
    }
}

impl From<ResponseCode> for u32 {
    fn from(code: ResponseCode) -> Self {
        code as u32
    }
}

impl embedded_hal::digital::Error for ResponseCode {
    fn kind(&self) -> embedded_hal::digital::ErrorKind {
        embedded_hal::digital::ErrorKind::Other
    }
}

///
/// Number of pins an expander exposes. The discriminant is the pin count
/// itself, so `PinCount::Sixteen as u8 == 16`.
///
#[derive(Copy, Clone, Debug, Default, FromPrimitive, Eq, PartialEq)]
#[repr(u8)]
pub enum PinCount {
    Four = 4,
    #[default]
    Eight = 8,
    Sixteen = 16,
}

impl PinCount {
    /// Number of pins.
    pub fn pins(self) -> u8 {
        self as u8
    }

    /// Number of output register bytes needed to hold every pin.
    pub fn banks(self) -> usize {
        (self.pins() as usize).div_ceil(8)
    }

    /// Mask of the bits that correspond to real pins.
    pub fn mask(self) -> u16 {
        match self {
            PinCount::Four => 0x000f,
            PinCount::Eight => 0x00ff,
            PinCount::Sixteen => 0xffff,
        }
    }

    /// Returns `true` if `pin` exists on an expander of this size.
    pub fn contains(self, pin: u8) -> bool {
        pin < self.pins()
    }
}

impl TryFrom<u8> for PinCount {
    type Error = ResponseCode;

    fn try_from(pins: u8) -> Result<Self, Self::Error> {
        PinCount::from_u8(pins).ok_or(ResponseCode::BadPinCount)
    }
}

bitflags! {
    /// Capabilities requested for a pin, following the host framework's
    /// GPIO flag set.
    #[derive(Copy, Clone, Debug, Eq, PartialEq)]
    pub struct PinFlags: u8 {
        const INPUT = 1 << 0;
        const OUTPUT = 1 << 1;
        const OPEN_DRAIN = 1 << 2;
        const PULLUP = 1 << 3;
        const PULLDOWN = 1 << 4;
    }
}

impl PinFlags {
    /// Checks that the flags request plain output and nothing else.
    pub fn check_output_only(self) -> Result<(), ResponseCode> {
        if self == PinFlags::OUTPUT {
            Ok(())
        } else {
            Err(ResponseCode::BadMode)
        }
    }
}

/// I2C addresses used to reach the expander's registers.
///
/// Chips in this family decode the register from the I2C address rather than
/// from a register byte, so each register is its own bus address.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct RegisterMap {
    /// System parameter register; also the family's documented device
    /// address.
    pub config: u8,
    /// Output register for each bank of eight pins.
    pub output: [u8; MAX_BANKS],
}

/// Largest number of output register bytes any supported pin count needs.
pub const MAX_BANKS: usize = 2;

impl Default for RegisterMap {
    fn default() -> Self {
        Self {
            config: 0x24,
            output: [0x38, 0x23],
        }
    }
}

impl RegisterMap {
    /// Checks that every register address is a 7-bit, non-reserved address.
    pub fn validate(&self) -> Result<(), ResponseCode> {
        let usable = |addr: u8| matches!(addr, 0x08..=0x77);

        if usable(self.config) && self.output.iter().all(|&a| usable(a)) {
            Ok(())
        } else {
            Err(ResponseCode::BadAddress)
        }
    }
}

/// Component-level configuration handed over by the configuration layer.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct ExpanderConfig {
    pub pin_count: PinCount,
    pub registers: RegisterMap,
    /// Output levels written during setup, one bit per pin. Bits past the
    /// pin count are ignored.
    pub initial_output: u16,
}

impl ExpanderConfig {
    pub fn new(pin_count: PinCount) -> Self {
        Self {
            pin_count,
            ..Default::default()
        }
    }
}

/// Per-pin configuration handed over by the configuration layer.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct PinConfig {
    pub number: u8,
    pub inverted: bool,
    pub flags: PinFlags,
}

impl PinConfig {
    /// A non-inverted output pin.
    pub fn output(number: u8) -> Self {
        Self {
            number,
            inverted: false,
            flags: PinFlags::OUTPUT,
        }
    }

    pub fn with_inverted(self, inverted: bool) -> Self {
        Self { inverted, ..self }
    }

    /// Checks the pin against an expander with `pin_count` pins.
    pub fn validate(&self, pin_count: PinCount) -> Result<(), ResponseCode> {
        if !pin_count.contains(self.number) {
            return Err(ResponseCode::BadPin);
        }
        self.flags.check_output_only()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_traits::FromPrimitive;

    #[test]
    fn pin_count_accepts_supported_sizes() {
        assert_eq!(PinCount::try_from(4), Ok(PinCount::Four));
        assert_eq!(PinCount::try_from(8), Ok(PinCount::Eight));
        assert_eq!(PinCount::try_from(16), Ok(PinCount::Sixteen));

        for bad in [0, 1, 7, 12, 32, 255] {
            assert_eq!(PinCount::try_from(bad), Err(ResponseCode::BadPinCount));
        }
    }

    #[test]
    fn pin_count_banks() {
        assert_eq!(PinCount::Four.banks(), 1);
        assert_eq!(PinCount::Eight.banks(), 1);
        assert_eq!(PinCount::Sixteen.banks(), 2);
        assert!(PinCount::Sixteen.banks() <= MAX_BANKS);
    }

    #[test]
    fn pin_config_rejects_out_of_range_pins() {
        for count in [PinCount::Four, PinCount::Eight, PinCount::Sixteen] {
            for pin in 0..count.pins() {
                assert_eq!(PinConfig::output(pin).validate(count), Ok(()));
            }
            for pin in count.pins()..=32 {
                assert_eq!(
                    PinConfig::output(pin).validate(count),
                    Err(ResponseCode::BadPin)
                );
            }
        }
    }

    #[test]
    fn pin_config_rejects_non_output_modes() {
        let modes = [
            PinFlags::INPUT,
            PinFlags::INPUT | PinFlags::PULLUP,
            PinFlags::OUTPUT | PinFlags::OPEN_DRAIN,
            PinFlags::OUTPUT | PinFlags::INPUT,
            PinFlags::empty(),
        ];
        for flags in modes {
            let config = PinConfig {
                number: 0,
                inverted: false,
                flags,
            };
            assert_eq!(
                config.validate(PinCount::Eight),
                Err(ResponseCode::BadMode)
            );
        }
    }

    #[test]
    fn register_map_validation() {
        assert_eq!(RegisterMap::default().validate(), Ok(()));

        let general_call = RegisterMap {
            config: 0x00,
            ..Default::default()
        };
        assert_eq!(general_call.validate(), Err(ResponseCode::BadAddress));

        let ten_bit = RegisterMap {
            output: [0x38, 0x7c],
            ..Default::default()
        };
        assert_eq!(ten_bit.validate(), Err(ResponseCode::BadAddress));
    }

    #[test]
    fn response_code_classes() {
        assert!(ResponseCode::BadPin.is_configuration());
        assert!(!ResponseCode::BadPin.is_transport());
        assert!(ResponseCode::NoDevice.is_transport());
        assert!(!ResponseCode::NotReady.is_transport());
        assert!(!ResponseCode::NotReady.is_configuration());
    }

    #[test]
    fn response_code_round_trips_through_u32() {
        let raw: u32 = ResponseCode::BusTimeout.into();
        assert_eq!(ResponseCode::from_u32(raw), Some(ResponseCode::BusTimeout));
        assert_eq!(ResponseCode::from_u32(0), None);
    }
}
