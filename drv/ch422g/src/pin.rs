// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Single-pin view of a CH422G

use core::fmt;

use crate::Ch422g;
use drv_io_expander_api::{traits::ExpanderBus, PinConfig, PinFlags, ResponseCode};
use embedded_hal::digital::{ErrorType, OutputPin, StatefulOutputPin};

/// One output pin of a [`Ch422g`]
///
/// The pin holds no state of its own beyond its configuration; levels live in
/// the parent's shadow. Inversion is applied on the way in and on the way
/// out, so callers always see logical levels.
pub struct Ch422gPin<'a, B> {
    parent: &'a Ch422g<B>,
    pin: u8,
    inverted: bool,
    flags: PinFlags,
}

impl<'a, B: ExpanderBus> Ch422gPin<'a, B> {
    /// Binds `config` to `parent`.
    ///
    /// # Errors
    ///
    /// `BadPin` if the pin number is past the parent's pin count, `BadMode`
    /// if anything other than output is requested.
    pub fn new(parent: &'a Ch422g<B>, config: PinConfig) -> Result<Self, ResponseCode> {
        config.validate(parent.pin_count())?;
        Ok(Self {
            parent,
            pin: config.number,
            inverted: config.inverted,
            flags: config.flags,
        })
    }

    pub fn set_pin(&mut self, pin: u8) -> Result<(), ResponseCode> {
        if !self.parent.pin_count().contains(pin) {
            return Err(ResponseCode::BadPin);
        }
        self.pin = pin;
        Ok(())
    }

    pub fn set_inverted(&mut self, inverted: bool) {
        self.inverted = inverted;
    }

    /// Only plain output is accepted; on error the previous flags are kept.
    pub fn set_flags(&mut self, flags: PinFlags) -> Result<(), ResponseCode> {
        flags.check_output_only()?;
        self.flags = flags;
        Ok(())
    }

    pub fn pin(&self) -> u8 {
        self.pin
    }

    pub fn is_inverted(&self) -> bool {
        self.inverted
    }

    pub fn flags(&self) -> PinFlags {
        self.flags
    }

    pub fn digital_write(&self, value: bool) -> Result<(), ResponseCode> {
        self.parent.digital_write(self.pin, value != self.inverted)
    }

    pub fn digital_read(&self) -> Result<bool, ResponseCode> {
        Ok(self.parent.digital_read(self.pin)? != self.inverted)
    }
}

impl<B> fmt::Display for Ch422gPin<'_, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} via CH422G", self.pin)
    }
}

impl<B: ExpanderBus> ErrorType for Ch422gPin<'_, B> {
    type Error = ResponseCode;
}

impl<B: ExpanderBus> OutputPin for Ch422gPin<'_, B> {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.digital_write(false)
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.digital_write(true)
    }
}

impl<B: ExpanderBus> StatefulOutputPin for Ch422gPin<'_, B> {
    fn is_set_high(&mut self) -> Result<bool, Self::Error> {
        self.digital_read()
    }

    fn is_set_low(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.digital_read()?)
    }
}
