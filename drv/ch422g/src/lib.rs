// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Driver core for the CH422G I/O expander
//!
//! The CH422G is an I2C-attached GPIO extender. Its registers are not
//! addressed by a register byte; instead each register answers on its own
//! I2C address, so every transaction is a single byte to or from an address:
//!
//! - `0x24`: system parameter register (output enable for the IO bank)
//! - `0x38`: IO0..IO7 output levels
//! - `0x23`: open-drain OC outputs, used here as the second bank of a 16-pin
//!   configuration
//!
//! The output registers cannot be read back, so [`Ch422g`] keeps a shadow of
//! every output bank. Pin writes are read-modify-write cycles on that shadow
//! followed by one write of the whole bank, and pin reads are answered from
//! the shadow without touching the bus.
//!
//! Pins are handed out as [`Ch422gPin`] handles that borrow the component, so
//! the component always outlives its pins.
//!
//! # Failure handling
//!
//! Every transaction is retried once. If the retry fails too, the error is
//! returned and the shadow keeps its previous value. A failed [`Ch422g::setup`]
//! takes the device out of service; everything else on the bus is unaffected.

#![cfg_attr(not(test), no_std)]

use core::fmt;

use drv_io_expander_api::{
    traits::ExpanderBus, ExpanderConfig, PinConfig, PinCount, RegisterMap, ResponseCode,
    MAX_BANKS,
};
use heapless::HistoryBuffer;
use spin::Mutex;

mod pin;

pub use pin::Ch422gPin;

/// System parameter bit enabling the IO bank as outputs
const FLAG_IO_ENABLE_OUTPUT: u8 = 1 << 0;

/// Additional attempts made after a failed transaction
const RETRIES: u32 = 1;

/// Depth of the event history kept by each device
pub const TRACE_DEPTH: usize = 16;

/// Driver events kept for debugging
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Trace {
    Setup { pins: u8 },
    SetupFailed(ResponseCode),
    Write { addr: u8, value: u8 },
    Retry { addr: u8, code: ResponseCode },
    WriteFailed { addr: u8, code: ResponseCode },
}

/// Running totals of bus activity
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct Counters {
    /// Acknowledged register writes
    pub writes: u32,
    /// Transactions repeated after a failure
    pub retries: u32,
    /// Transactions that failed after the retry
    pub failures: u32,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum DeviceState {
    Uninitialized,
    Ready,
    /// Setup failed; the device stays out of service
    Failed,
}

struct Inner<B> {
    bus: B,
    shadow: [u8; MAX_BANKS],
    state: DeviceState,
    trace: HistoryBuffer<Trace, TRACE_DEPTH>,
    counters: Counters,
}

impl<B: ExpanderBus> Inner<B> {
    fn record(&mut self, entry: Trace) {
        self.trace.write(entry);
    }

    fn check_ready(&self) -> Result<(), ResponseCode> {
        match self.state {
            DeviceState::Ready => Ok(()),
            DeviceState::Uninitialized => Err(ResponseCode::NotReady),
            DeviceState::Failed => Err(ResponseCode::DeviceFailed),
        }
    }

    fn transmit(&mut self, addr: u8, value: u8) -> Result<(), ResponseCode> {
        let mut attempt = 0;
        loop {
            match self.bus.write_register(addr, value) {
                Ok(()) => {
                    self.counters.writes = self.counters.writes.wrapping_add(1);
                    self.record(Trace::Write { addr, value });
                    return Ok(());
                }
                Err(e) => {
                    let code = e.into();
                    if attempt < RETRIES {
                        attempt += 1;
                        self.counters.retries = self.counters.retries.wrapping_add(1);
                        self.record(Trace::Retry { addr, code });
                        continue;
                    }
                    self.counters.failures = self.counters.failures.wrapping_add(1);
                    self.record(Trace::WriteFailed { addr, code });
                    return Err(code);
                }
            }
        }
    }

    fn program(&mut self, registers: &RegisterMap, banks: usize) -> Result<(), ResponseCode> {
        self.transmit(registers.config, FLAG_IO_ENABLE_OUTPUT)?;
        for bank in 0..banks {
            self.transmit(registers.output[bank], self.shadow[bank])?;
        }
        Ok(())
    }
}

/// A CH422G expander and its output shadow
pub struct Ch422g<B> {
    config: ExpanderConfig,
    inner: Mutex<Inner<B>>,
}

impl<B: ExpanderBus> Ch422g<B> {
    /// Creates the component. No bus traffic happens until [`Ch422g::setup`].
    ///
    /// # Errors
    ///
    /// Returns `BadAddress` if the register map holds a reserved address.
    pub fn new(bus: B, config: ExpanderConfig) -> Result<Self, ResponseCode> {
        config.registers.validate()?;

        let initial = config.initial_output & config.pin_count.mask();
        Ok(Self {
            config,
            inner: Mutex::new(Inner {
                bus,
                shadow: initial.to_le_bytes(),
                state: DeviceState::Uninitialized,
                trace: HistoryBuffer::new(),
                counters: Counters::default(),
            }),
        })
    }

    /// Changes the number of pins. Only possible while no pin is bound.
    ///
    /// A ready device goes back to `Uninitialized`, so the next
    /// [`Ch422g::setup`] programs every bank of the new size. A failed device
    /// stays failed.
    pub fn set_pin_count(&mut self, pin_count: PinCount) {
        self.config.pin_count = pin_count;

        let inner = self.inner.get_mut();
        let shadow = u16::from_le_bytes(inner.shadow) & pin_count.mask();
        inner.shadow = shadow.to_le_bytes();
        if inner.state == DeviceState::Ready {
            inner.state = DeviceState::Uninitialized;
        }
    }

    pub fn pin_count(&self) -> PinCount {
        self.config.pin_count
    }

    pub fn config(&self) -> &ExpanderConfig {
        &self.config
    }

    /// Enables the outputs and writes the initial shadow to every bank.
    ///
    /// Calling this on a ready device does nothing. If the chip does not
    /// acknowledge, the device is marked failed and every later operation
    /// returns `DeviceFailed`.
    pub fn setup(&self) -> Result<(), ResponseCode> {
        let mut inner = self.inner.lock();
        match inner.state {
            DeviceState::Ready => return Ok(()),
            DeviceState::Failed => return Err(ResponseCode::DeviceFailed),
            DeviceState::Uninitialized => {}
        }

        let pin_count = self.config.pin_count;
        match inner.program(&self.config.registers, pin_count.banks()) {
            Ok(()) => {
                inner.state = DeviceState::Ready;
                inner.record(Trace::Setup {
                    pins: pin_count.pins(),
                });
                Ok(())
            }
            Err(code) => {
                inner.state = DeviceState::Failed;
                inner.record(Trace::SetupFailed(code));
                Err(code)
            }
        }
    }

    /// Binds a pin to this expander.
    pub fn pin(&self, config: PinConfig) -> Result<Ch422gPin<'_, B>, ResponseCode> {
        Ch422gPin::new(self, config)
    }

    /// Sets the output level of `pin` and writes its bank to the chip.
    ///
    /// The shadow only changes once the chip has acknowledged the write.
    ///
    /// # Panics
    ///
    /// Panics if `pin` is not below the configured pin count.
    pub fn digital_write(&self, pin: u8, value: bool) -> Result<(), ResponseCode> {
        let (bank, mask) = self.locate(pin);

        let mut inner = self.inner.lock();
        inner.check_ready()?;

        let current = inner.shadow[bank];
        let next = if value { current | mask } else { current & !mask };
        inner.transmit(self.config.registers.output[bank], next)?;
        inner.shadow[bank] = next;
        Ok(())
    }

    /// Returns the last level written to `pin`.
    ///
    /// # Panics
    ///
    /// Panics if `pin` is not below the configured pin count.
    pub fn digital_read(&self, pin: u8) -> Result<bool, ResponseCode> {
        let (bank, mask) = self.locate(pin);

        let inner = self.inner.lock();
        inner.check_ready()?;
        Ok(inner.shadow[bank] & mask != 0)
    }

    fn locate(&self, pin: u8) -> (usize, u8) {
        assert!(
            self.config.pin_count.contains(pin),
            "pin {} out of range for a {}-pin expander",
            pin,
            self.config.pin_count.pins(),
        );
        (usize::from(pin / 8), 1 << (pin % 8))
    }

    /// Output shadow of all banks, bank 0 in the low byte.
    pub fn shadow(&self) -> u16 {
        u16::from_le_bytes(self.inner.lock().shadow)
    }

    pub fn state(&self) -> DeviceState {
        self.inner.lock().state
    }

    pub fn is_failed(&self) -> bool {
        self.state() == DeviceState::Failed
    }

    pub fn counters(&self) -> Counters {
        self.inner.lock().counters
    }

    pub fn last_trace(&self) -> Option<Trace> {
        self.inner.lock().trace.recent().copied()
    }

    /// Visits the recorded events, oldest first.
    ///
    /// The history is copied out before `f` runs, so `f` may call back into
    /// the device.
    pub fn for_each_trace(&self, mut f: impl FnMut(&Trace)) {
        let mut entries: heapless::Vec<Trace, TRACE_DEPTH> = heapless::Vec::new();
        entries.extend(self.inner.lock().trace.oldest_ordered().copied());
        for entry in &entries {
            f(entry);
        }
    }

    /// Releases the bus.
    pub fn free(self) -> B {
        self.inner.into_inner().bus
    }
}

/// Renders the configuration, and whether the chip stopped answering.
impl<B> fmt::Display for Ch422g<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CH422G at {:#04x}: {} I/O pins",
            self.config.registers.config,
            self.config.pin_count.pins(),
        )?;
        if self.inner.lock().state == DeviceState::Failed {
            f.write_str(", communication failed")?;
        }
        Ok(())
    }
}
