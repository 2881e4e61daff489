//! Command frame encoding.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use embedded_hal::spi::SpiBus;
use heapless::Vec;
use log::trace;

use crate::bus::{commands, BusLink};
use crate::error::Error;
use crate::frame::{
    data_checksum, length_checksum, Direction, MAX_FRAME_LEN, MAX_PAYLOAD_LEN, POSTAMBLE,
    PREAMBLE, START_CODE,
};

/// A complete frame, at most one maximum-size frame long.
pub type FrameBuf = Vec<u8, MAX_FRAME_LEN>;

fn frame_len(payload: &[u8]) -> Result<u8, Error> {
    if payload.len() > MAX_PAYLOAD_LEN {
        return Err(Error::BufferTooSmall {
            needed: payload.len(),
            capacity: MAX_PAYLOAD_LEN,
        });
    }
    // TFI + data
    Ok(payload.len() as u8 + 1)
}

fn header(direction: Direction, len: u8) -> [u8; 6] {
    [
        PREAMBLE,
        START_CODE[0],
        START_CODE[1],
        len,
        length_checksum(len),
        direction.byte(),
    ]
}

/// Build a complete frame carrying `payload`.
pub fn encode(direction: Direction, payload: &[u8]) -> Result<FrameBuf, Error> {
    let len = frame_len(payload)?;
    let mut frame = FrameBuf::new();
    // capacity is checked by frame_len
    let _ = frame.extend_from_slice(&header(direction, len));
    let _ = frame.extend_from_slice(payload);
    let _ = frame.push(data_checksum(direction, payload));
    let _ = frame.push(POSTAMBLE);
    Ok(frame)
}

/// Write `command` to the PN532 as a host frame.
///
/// Fire and forget: the ACK is read separately.
pub fn send_command<SPI, CS, D>(bus: &mut BusLink<SPI, CS, D>, command: &[u8]) -> Result<(), Error>
where
    SPI: SpiBus,
    CS: OutputPin,
    D: DelayNs,
{
    let direction = Direction::HostToDevice;
    let len = frame_len(command)?;
    let trailer = [data_checksum(direction, command), POSTAMBLE];
    trace!("PN532 <- {:02X?}", command);

    bus.transaction(true, |t| {
        t.write_byte(commands::DATA_WRITE)?;
        t.write(&header(direction, len))?;
        t.write(command)?;
        t.write(&trailer)
    })
}
