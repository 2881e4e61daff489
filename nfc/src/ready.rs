//! Status polling.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use embedded_hal::spi::SpiBus;

use crate::bus::{commands, BusLink, Clock, STATUS_READY};
use crate::error::Error;

/// Read the status byte once.
pub fn is_ready<SPI, CS, D>(bus: &mut BusLink<SPI, CS, D>) -> Result<bool, Error>
where
    SPI: SpiBus,
    CS: OutputPin,
    D: DelayNs,
{
    let status = bus.transaction(false, |t| {
        t.write_byte(commands::STATUS_READ)?;
        t.read_byte()
    })?;
    Ok(status & STATUS_READY != 0)
}

/// Poll until the PN532 reports ready.
///
/// `Ok(false)` means `timeout_ms` elapsed first. Errors are bus faults only.
pub fn wait_ready<SPI, CS, D, C>(
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
    let start = clock.now_ms();
    while !is_ready(bus)? {
        if clock.now_ms().saturating_sub(start) > u64::from(timeout_ms) {
            return Ok(false);
        }
        bus.delay_ms(poll_interval_ms);
    }
    Ok(true)
}
