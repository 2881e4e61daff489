//! Chip-select bracketed byte exchange over an `embedded-hal` SPI bus.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use embedded_hal::spi::SpiBus;

use crate::error::Error;

/// SPI bus command bytes, sent as the first byte of every transaction.
pub mod commands {
    pub const DATA_WRITE: u8 = 0x01;
    pub const STATUS_READ: u8 = 0x02;
    pub const DATA_READ: u8 = 0x03;
}

/// Bit 0 of the status byte.
pub const STATUS_READY: u8 = 0x01;

/// Monotonic millisecond time source for bounded polling.
pub trait Clock {
    /// Milliseconds since an arbitrary fixed origin.
    fn now_ms(&self) -> u64;
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now_ms(&self) -> u64 {
        (**self).now_ms()
    }
}

/// `Clock` backed by `std::time::Instant`.
#[cfg(feature = "std")]
#[derive(Debug, Clone, Copy)]
pub struct StdClock {
    origin: std::time::Instant,
}

#[cfg(feature = "std")]
impl StdClock {
    pub fn new() -> Self {
        Self {
            origin: std::time::Instant::now(),
        }
    }
}

#[cfg(feature = "std")]
impl Default for StdClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "std")]
impl Clock for StdClock {
    fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }
}

/// Exclusive owner of the SPI bus, the NSS pin and a delay provider.
pub struct BusLink<SPI, CS, D> {
    spi: SPI,
    cs: CS,
    delay: D,
    settle_delay_ms: u32,
    reverse_bits: bool,
}

impl<SPI, CS, D> BusLink<SPI, CS, D>
where
    SPI: SpiBus,
    CS: OutputPin,
    D: DelayNs,
{
    pub fn new(spi: SPI, cs: CS, delay: D) -> Self {
        Self {
            spi,
            cs,
            delay,
            settle_delay_ms: 2,
            reverse_bits: false,
        }
    }

    /// Delay after asserting NSS before data transactions.
    pub fn with_settle_delay(mut self, ms: u32) -> Self {
        self.settle_delay_ms = ms;
        self
    }

    /// Reverse the bit order of every byte in software.
    ///
    /// Needed on peripherals that only shift MSB first.
    pub fn with_reversed_bits(mut self, reverse: bool) -> Self {
        self.reverse_bits = reverse;
        self
    }

    pub fn delay_ms(&mut self, ms: u32) {
        self.delay.delay_ms(ms);
    }

    /// Drive NSS high without a transaction.
    pub fn deselect(&mut self) -> Result<(), Error> {
        self.cs.set_high().map_err(Error::pin)
    }

    /// Run `f` with NSS asserted.
    ///
    /// NSS is deasserted on every path, including when `f` fails. When `f`
    /// fails its error wins over any error from releasing the line.
    pub fn transaction<T, F>(&mut self, settle: bool, f: F) -> Result<T, Error>
    where
        F: FnOnce(&mut Transfer<'_, SPI>) -> Result<T, Error>,
    {
        self.cs.set_low().map_err(Error::pin)?;
        if settle && self.settle_delay_ms > 0 {
            self.delay.delay_ms(self.settle_delay_ms);
        }

        let mut transfer = Transfer {
            spi: &mut self.spi,
            reverse_bits: self.reverse_bits,
        };
        let result = f(&mut transfer);
        let flushed = self.spi.flush().map_err(Error::spi);
        let released = self.cs.set_high().map_err(Error::pin);

        let value = result?;
        flushed?;
        released?;
        Ok(value)
    }

    /// Give back the owned peripherals.
    pub fn release(self) -> (SPI, CS, D) {
        (self.spi, self.cs, self.delay)
    }
}

/// Byte access inside an open transaction.
pub struct Transfer<'a, SPI> {
    spi: &'a mut SPI,
    reverse_bits: bool,
}

impl<SPI: SpiBus> Transfer<'_, SPI> {
    fn wire(&self, byte: u8) -> u8 {
        if self.reverse_bits {
            byte.reverse_bits()
        } else {
            byte
        }
    }

    pub fn write(&mut self, bytes: &[u8]) -> Result<(), Error> {
        if self.reverse_bits {
            for &byte in bytes {
                self.write_byte(byte)?;
            }
            Ok(())
        } else {
            self.spi.write(bytes).map_err(Error::spi)
        }
    }

    pub fn write_byte(&mut self, byte: u8) -> Result<(), Error> {
        let out = [self.wire(byte)];
        self.spi.write(&out).map_err(Error::spi)
    }

    /// Clock in one byte while shifting out `0x00`.
    pub fn read_byte(&mut self) -> Result<u8, Error> {
        let mut buf = [0u8; 1];
        self.spi.transfer_in_place(&mut buf).map_err(Error::spi)?;
        Ok(self.wire(buf[0]))
    }

    pub fn read(&mut self, buf: &mut [u8]) -> Result<(), Error> {
        buf.fill(0);
        self.spi.transfer_in_place(buf).map_err(Error::spi)?;
        if self.reverse_bits {
            for byte in buf.iter_mut() {
                *byte = byte.reverse_bits();
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{ManualClock, SimDelay, SimulatedPn532};

    #[test]
    fn transaction_releases_nss_when_closure_fails() {
        let sim = SimulatedPn532::new();
        let clock = ManualClock::new();
        let mut bus = BusLink::new(sim.spi(), sim.cs(), SimDelay::new(&clock));

        let result: Result<(), Error> = bus.transaction(true, |_| Err(Error::HandshakeMismatch));

        assert_eq!(result, Err(Error::HandshakeMismatch));
        assert!(sim.cs_is_high());
    }

    #[test]
    fn settle_delay_applies_only_to_data_transactions() {
        let sim = SimulatedPn532::new();
        let clock = ManualClock::new();
        let mut bus = BusLink::new(sim.spi(), sim.cs(), SimDelay::new(&clock)).with_settle_delay(2);

        bus.transaction(false, |t| t.write_byte(commands::STATUS_READ))
            .unwrap();
        assert_eq!(clock.now_ms(), 0);

        bus.transaction(true, |t| t.write_byte(commands::DATA_READ))
            .unwrap();
        assert_eq!(clock.now_ms(), 2);
    }

    #[test]
    fn reversed_bits_round_trip_through_device() {
        let sim = SimulatedPn532::new().with_reversed_bits(true);
        sim.set_status_script(&[true]);
        let clock = ManualClock::new();
        let mut bus = BusLink::new(sim.spi(), sim.cs(), SimDelay::new(&clock)).with_reversed_bits(true);

        let status = bus
            .transaction(false, |t| {
                t.write_byte(commands::STATUS_READ)?;
                t.read_byte()
            })
            .unwrap();

        assert_eq!(status & STATUS_READY, STATUS_READY);
    }
}
