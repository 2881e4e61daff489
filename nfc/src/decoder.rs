//! Response frame decoding.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use embedded_hal::spi::SpiBus;
use log::{debug, trace};

use crate::bus::{commands, BusLink, Clock};
use crate::error::{ChecksumField, Error};
use crate::frame::{wrapping_sum, Direction, PREAMBLE, START_CODE};
use crate::ready::wait_ready;

/// How a frame is read off a byte source.
#[derive(Debug, Clone, Copy)]
pub struct FrameRules {
    /// TFI the frame must carry.
    pub direction: Direction,
    /// Verify `00 00 FF` instead of skipping it.
    pub strict_framing: bool,
}

impl FrameRules {
    pub const fn response(strict_framing: bool) -> Self {
        Self {
            direction: Direction::DeviceToHost,
            strict_framing,
        }
    }
}

/// Read one frame from `next` and copy its data into `buf`.
///
/// Returns the number of data bytes (TFI excluded). `buf.len()` is the
/// maximum accepted data length. Bytes are pulled strictly in wire order and
/// nothing is read past the first failing check.
pub fn read_frame<F>(mut next: F, buf: &mut [u8], rules: FrameRules) -> Result<usize, Error>
where
    F: FnMut() -> Result<u8, Error>,
{
    let skipped = [next()?, next()?, next()?];
    if rules.strict_framing && skipped != [PREAMBLE, START_CODE[0], START_CODE[1]] {
        return Err(Error::InvalidStartCode(skipped));
    }

    let len = next()?;
    let lcs = next()?;
    if len.wrapping_add(lcs) != 0 {
        return Err(Error::ChecksumMismatch(ChecksumField::Length));
    }

    let tfi = next()?;
    // LEN 0 carries no TFI at all
    if len == 0 || tfi != rules.direction.byte() {
        return Err(Error::UnexpectedDirection(tfi));
    }

    let data_len = usize::from(len - 1);
    if data_len > buf.len() {
        return Err(Error::BufferTooSmall {
            needed: data_len,
            capacity: buf.len(),
        });
    }

    for slot in buf[..data_len].iter_mut() {
        *slot = next()?;
    }
    let checksum = wrapping_sum(tfi, &buf[..data_len]);

    let dcs = next()?;
    if checksum.wrapping_add(dcs) != 0 {
        return Err(Error::ChecksumMismatch(ChecksumField::Data));
    }

    // postamble
    next()?;
    Ok(data_len)
}

/// Decode a frame held in memory.
pub fn decode(bytes: &[u8], buf: &mut [u8], rules: FrameRules) -> Result<usize, Error> {
    let mut iter = bytes.iter().copied();
    read_frame(
        || {
            iter.next().ok_or(Error::Truncated {
                needed: bytes.len() + 1,
                len: bytes.len(),
            })
        },
        buf,
        rules,
    )
}

/// Wait for the PN532 to become ready and read a response frame into `buf`.
pub fn receive<SPI, CS, D, C>(
    bus: &mut BusLink<SPI, CS, D>,
    clock: &C,
    buf: &mut [u8],
    timeout_ms: u32,
    poll_interval_ms: u32,
    strict_framing: bool,
) -> Result<usize, Error>
where
    SPI: SpiBus,
    CS: OutputPin,
    D: DelayNs,
    C: Clock,
{
    if !wait_ready(bus, clock, timeout_ms, poll_interval_ms)? {
        debug!("PN532 response not ready after {} ms", timeout_ms);
        return Err(Error::Timeout(timeout_ms));
    }

    let len = bus.transaction(true, |t| {
        t.write_byte(commands::DATA_READ)?;
        read_frame(|| t.read_byte(), buf, FrameRules::response(strict_framing))
    })?;
    trace!("PN532 -> {:02X?}", &buf[..len]);
    Ok(len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::encode;
    use crate::sim::{ManualClock, SimDelay, SimulatedPn532};
    use proptest::prelude::*;

    const LENIENT: FrameRules = FrameRules::response(false);

    fn response_frame(payload: &[u8]) -> std::vec::Vec<u8> {
        encode(Direction::DeviceToHost, payload).unwrap().to_vec()
    }

    #[test]
    fn decodes_firmware_response() {
        let frame = [
            0x00, 0x00, 0xFF, 0x06, 0xFA, 0xD5, 0x03, 0x32, 0x01, 0x06, 0x07, 0xE8, 0x00,
        ];
        let mut buf = [0u8; 12];
        let len = decode(&frame, &mut buf, LENIENT).unwrap();
        assert_eq!(&buf[..len], &[0x03, 0x32, 0x01, 0x06, 0x07]);
    }

    #[test]
    fn rejects_host_direction() {
        let frame = encode(Direction::HostToDevice, &[0x03, 0x32]).unwrap();
        let mut buf = [0u8; 12];
        assert_eq!(
            decode(&frame, &mut buf, LENIENT),
            Err(Error::UnexpectedDirection(0xD4))
        );
    }

    #[test]
    fn rejects_payload_larger_than_buffer() {
        let frame = response_frame(&[0x4B; 9]);
        let mut buf = [0u8; 8];
        assert_eq!(
            decode(&frame, &mut buf, LENIENT),
            Err(Error::BufferTooSmall {
                needed: 9,
                capacity: 8
            })
        );
    }

    #[test]
    fn zero_length_frame_is_desynchronized() {
        let frame = [0x00, 0x00, 0xFF, 0x00, 0x00, 0xD5, 0x2B, 0x00];
        let mut buf = [0u8; 8];
        assert_eq!(
            decode(&frame, &mut buf, LENIENT),
            Err(Error::UnexpectedDirection(0xD5))
        );
    }

    #[test]
    fn start_code_is_ignored_unless_strict() {
        let mut frame = response_frame(&[0x15]);
        frame[2] = 0xFE;
        let mut buf = [0u8; 8];

        assert_eq!(decode(&frame, &mut buf, LENIENT), Ok(1));
        assert_eq!(
            decode(&frame, &mut buf, FrameRules::response(true)),
            Err(Error::InvalidStartCode([0x00, 0x00, 0xFE]))
        );
    }

    #[test]
    fn receive_times_out_without_ready() {
        let sim = SimulatedPn532::new();
        sim.set_status_script(&[false]);
        let clock = ManualClock::new();
        let mut bus = BusLink::new(sim.spi(), sim.cs(), SimDelay::new(&clock));
        let mut buf = [0u8; 8];

        let result = receive(&mut bus, &clock, &mut buf, 50, 10, false);

        assert_eq!(result, Err(Error::Timeout(50)));
        assert!(sim.cs_is_high());
    }

    #[test]
    fn receive_releases_nss_on_checksum_failure() {
        let sim = SimulatedPn532::new();
        let mut frame = response_frame(&[0x15]);
        frame[7] ^= 0x01;
        sim.queue_read(&frame);
        let clock = ManualClock::new();
        let mut bus = BusLink::new(sim.spi(), sim.cs(), SimDelay::new(&clock));
        let mut buf = [0u8; 8];

        let result = receive(&mut bus, &clock, &mut buf, 1000, 10, false);

        assert_eq!(result, Err(Error::ChecksumMismatch(ChecksumField::Data)));
        assert!(sim.cs_is_high());
    }

    proptest! {
        #[test]
        fn loopback_returns_device_payload(payload in prop::collection::vec(any::<u8>(), 1..=40)) {
            let frame = response_frame(&payload);
            let mut buf = [0u8; 64];
            let len = decode(&frame, &mut buf, LENIENT).unwrap();
            prop_assert_eq!(&buf[..len], payload.as_slice());
        }

        #[test]
        fn single_bit_flip_is_rejected(
            payload in prop::collection::vec(any::<u8>(), 1..=16),
            field in 0usize..4,
            bit in 0u8..8,
            pick in any::<prop::sample::Index>(),
        ) {
            let mut frame = response_frame(&payload);
            // LEN, LCS, one data byte, DCS
            let index = match field {
                0 => 3,
                1 => 4,
                2 => 6 + pick.index(payload.len()),
                _ => 6 + payload.len(),
            };
            frame[index] ^= 1 << bit;

            let mut buf = [0u8; 64];
            let result = decode(&frame, &mut buf, LENIENT);
            prop_assert!(
                matches!(result, Err(Error::ChecksumMismatch(_))),
                "flip at {} bit {} gave {:?}", index, bit, result
            );
        }
    }
}
