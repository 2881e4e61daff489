//! ACK frame handshake.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use embedded_hal::spi::SpiBus;
use log::trace;

use crate::bus::{commands, BusLink, Clock};
use crate::error::Error;
use crate::frame::ACK_FRAME;
use crate::ready::wait_ready;

/// Outcome of reading the ACK frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ack {
    Received,
    /// Bytes were read but differ from the ACK pattern.
    Mismatch([u8; 6]),
    /// The PN532 never became ready.
    NotReady,
}

impl Ack {
    pub fn is_received(&self) -> bool {
        matches!(self, Ack::Received)
    }
}

/// Wait for ready, then read 6 bytes and compare them to the ACK frame.
///
/// A single differing byte fails the whole handshake.
pub fn read_ack<SPI, CS, D, C>(
    bus: &mut BusLink<SPI, CS, D>,
    clock: &C,
    timeout_ms: u32,
    poll_interval_ms: u32,
) -> Result<Ack, Error>
where
    SPI: SpiBus,
    CS: OutputPin,
    D: DelayNs,
    C: Clock,
{
    if !wait_ready(bus, clock, timeout_ms, poll_interval_ms)? {
        return Ok(Ack::NotReady);
    }

    let mut frame = [0u8; ACK_FRAME.len()];
    bus.transaction(true, |t| {
        t.write_byte(commands::DATA_READ)?;
        t.read(&mut frame)
    })?;
    trace!("PN532 ACK {:02X?}", frame);

    if frame == ACK_FRAME {
        Ok(Ack::Received)
    } else {
        Ok(Ack::Mismatch(frame))
    }
}

/// `true` only when the exact ACK frame was read within `timeout_ms`.
pub fn await_ack<SPI, CS, D, C>(
    bus: &mut BusLink<SPI, CS, D>,
    clock: &C,
    timeout_ms: u32,
    poll_interval_ms: u32,
) -> Result<bool, Error>
where
    SPI: SpiBus,
    CS: OutputPin,
    D: DelayNs,
    C: Clock,
{
    Ok(read_ack(bus, clock, timeout_ms, poll_interval_ms)?.is_received())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{ManualClock, SimDelay, SimulatedPn532};

    fn ack_for(bytes: &[u8]) -> Ack {
        let sim = SimulatedPn532::new();
        sim.queue_read(bytes);
        let clock = ManualClock::new();
        let mut bus = BusLink::new(sim.spi(), sim.cs(), SimDelay::new(&clock));
        let ack = read_ack(&mut bus, &clock, 10, 10).unwrap();
        assert!(sim.cs_is_high());
        ack
    }

    #[test]
    fn exact_pattern_is_accepted() {
        assert_eq!(ack_for(&[0x00, 0x00, 0xFF, 0x00, 0xFF, 0x00]), Ack::Received);
    }

    #[test]
    fn any_deviation_is_rejected() {
        let bad = [0x00, 0x00, 0xFE, 0x00, 0xFF, 0x00];
        assert_eq!(ack_for(&bad), Ack::Mismatch(bad));

        for i in 0..ACK_FRAME.len() {
            let mut frame = ACK_FRAME;
            frame[i] ^= 0x80;
            assert!(!ack_for(&frame).is_received(), "byte {} flipped", i);
        }
    }

    #[test]
    fn not_ready_is_reported_without_reading() {
        let sim = SimulatedPn532::new();
        sim.set_status_script(&[false]);
        let clock = ManualClock::new();
        let mut bus = BusLink::new(sim.spi(), sim.cs(), SimDelay::new(&clock));

        assert_eq!(await_ack(&mut bus, &clock, 10, 10), Ok(false));
        assert_eq!(sim.data_reads(), 0);
    }
}
