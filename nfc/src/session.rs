//! PN532 command session.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use embedded_hal::spi::SpiBus;
use log::{debug, info, warn};

use crate::ack::{read_ack, Ack};
use crate::bus::{BusLink, Clock};
use crate::config::{AckPolicy, Config};
use crate::decoder::receive;
use crate::encoder::send_command;
use crate::error::Error;
use crate::ready::wait_ready;
use crate::target::{CardType, FirmwareVersion, PassiveTarget};

/// PN532 command codes
pub mod commands {
    pub const GET_FIRMWARE_VERSION: u8 = 0x02;
    pub const SAM_CONFIGURATION: u8 = 0x14;
    pub const IN_LIST_PASSIVE_TARGET: u8 = 0x4A;
}

/// SAMConfiguration parameters
pub mod sam {
    /// Normal mode, the SAM is not used
    pub const MODE_NORMAL: u8 = 0x01;
    /// Virtual card timeout in units of 50 ms (20 x 50 ms = 1 s)
    pub const TIMEOUT_1S: u8 = 0x14;
    /// Drive the P70_IRQ pin
    pub const USE_IRQ: u8 = 0x01;
}

// Response buffer sizes per command
const FIRMWARE_VERSION_BUF: usize = 12;
const SAM_CONFIGURATION_BUF: usize = 8;
const IN_LIST_PASSIVE_TARGET_BUF: usize = 20;

/// A PN532 on an exclusively owned SPI bus.
///
/// One command/response cycle runs at a time; every operation takes
/// `&mut self` and blocks until it completes or times out.
pub struct Pn532<SPI, CS, D, C> {
    bus: BusLink<SPI, CS, D>,
    clock: C,
    config: Config,
}

impl<SPI, CS, D, C> Pn532<SPI, CS, D, C>
where
    SPI: SpiBus,
    CS: OutputPin,
    D: DelayNs,
    C: Clock,
{
    pub fn new(spi: SPI, cs: CS, delay: D, clock: C, config: Config) -> Self {
        let bus = BusLink::new(spi, cs, delay)
            .with_settle_delay(config.settle_delay_ms)
            .with_reversed_bits(config.reverse_bits);
        Self { bus, clock, config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Deassert NSS and give the chip time to start.
    pub fn init(&mut self) -> Result<(), Error> {
        self.bus.deselect()?;
        self.bus.delay_ms(100);
        Ok(())
    }

    /// Poll the status byte until ready or `timeout_ms` elapses.
    pub fn wait_ready(&mut self, timeout_ms: u32) -> Result<bool, Error> {
        wait_ready(
            &mut self.bus,
            &self.clock,
            timeout_ms,
            self.config.poll_interval_ms,
        )
    }

    /// Send a command frame without waiting for anything.
    pub fn write_command(&mut self, command: &[u8]) -> Result<(), Error> {
        send_command(&mut self.bus, command)
    }

    /// Read the ACK frame, `true` only on an exact match.
    pub fn await_ack(&mut self, timeout_ms: u32) -> Result<bool, Error> {
        Ok(self.read_ack(timeout_ms)?.is_received())
    }

    fn read_ack(&mut self, timeout_ms: u32) -> Result<Ack, Error> {
        read_ack(
            &mut self.bus,
            &self.clock,
            timeout_ms,
            self.config.poll_interval_ms,
        )
    }

    /// Read a response frame into `buf`, returning the data length.
    pub fn read_response(&mut self, buf: &mut [u8], timeout_ms: u32) -> Result<usize, Error> {
        receive(
            &mut self.bus,
            &self.clock,
            buf,
            timeout_ms,
            self.config.poll_interval_ms,
            self.config.strict_framing,
        )
    }

    /// Send `command`, check the ACK according to the policy, read the response.
    pub fn exchange(&mut self, command: &[u8], buf: &mut [u8]) -> Result<usize, Error> {
        self.write_command(command)?;

        let ack_timeout_ms = self.config.ack_timeout_ms;
        match self.read_ack(ack_timeout_ms)? {
            Ack::Received => {}
            Ack::NotReady if self.config.ack_policy == AckPolicy::Strict => {
                return Err(Error::Timeout(ack_timeout_ms));
            }
            Ack::Mismatch(_) if self.config.ack_policy == AckPolicy::Strict => {
                return Err(Error::HandshakeMismatch);
            }
            other => warn!(
                "PN532 ACK missing for command 0x{:02X} ({:?}), reading response anyway",
                command.first().copied().unwrap_or_default(),
                other
            ),
        }

        let timeout_ms = self.config.response_timeout_ms;
        self.read_response(buf, timeout_ms)
    }

    /// GetFirmwareVersion, typed.
    pub fn firmware_version(&mut self) -> Result<FirmwareVersion, Error> {
        let mut buf = [0u8; FIRMWARE_VERSION_BUF];
        let len = self.exchange(&[commands::GET_FIRMWARE_VERSION], &mut buf)?;
        let version = FirmwareVersion::from_payload(&buf[..len])?;
        info!(
            "PN5{:02X} firmware {}.{} (support 0x{:02X})",
            version.ic, version.version, version.revision, version.support
        );
        Ok(version)
    }

    /// GetFirmwareVersion packed as `IC Ver Rev Support`, 0 on any failure.
    pub fn query_firmware_version(&mut self) -> u32 {
        match self.firmware_version() {
            Ok(version) => version.as_u32(),
            Err(e) => {
                warn!("PN532 firmware version query failed: {}", e);
                0
            }
        }
    }

    /// SAMConfiguration: normal mode, 1 s timeout, IRQ enabled.
    pub fn configure_security_module(&mut self) -> Result<(), Error> {
        let command = [
            commands::SAM_CONFIGURATION,
            sam::MODE_NORMAL,
            sam::TIMEOUT_1S,
            sam::USE_IRQ,
        ];
        let mut buf = [0u8; SAM_CONFIGURATION_BUF];
        self.exchange(&command, &mut buf)?;
        debug!("PN532 SAM configured");
        Ok(())
    }

    /// InListPassiveTarget for at most one target.
    ///
    /// `Ok(None)` when the PN532 answered but reported no single target.
    pub fn enumerate_passive_target(
        &mut self,
        card_type: CardType,
    ) -> Result<Option<PassiveTarget>, Error> {
        let command = [commands::IN_LIST_PASSIVE_TARGET, 0x01, card_type.byte()];
        let mut buf = [0u8; IN_LIST_PASSIVE_TARGET_BUF];
        let len = self.exchange(&command, &mut buf)?;

        let target = PassiveTarget::from_payload(&buf[..len], commands::IN_LIST_PASSIVE_TARGET + 1)?;
        match &target {
            Some(t) => debug!("PN532 target {} ({:?})", t.uid_hex(), t.kind()),
            None => debug!("PN532 no target in {:02X?}", &buf[..len]),
        }
        Ok(target)
    }

    /// Give back the owned peripherals and clock.
    pub fn release(self) -> (SPI, CS, D, C) {
        let (spi, cs, delay) = self.bus.release();
        (spi, cs, delay, self.clock)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{ManualClock, SimDelay, SimulatedPn532, SimCs, SimSpi};

    type TestPn532 = Pn532<SimSpi, SimCs, SimDelay, ManualClock>;

    fn session(sim: &SimulatedPn532, config: Config) -> TestPn532 {
        let clock = ManualClock::new();
        Pn532::new(sim.spi(), sim.cs(), SimDelay::new(&clock), clock, config)
    }

    #[test]
    fn strict_policy_surfaces_bad_ack() {
        let sim = SimulatedPn532::new();
        sim.corrupt_next_ack([0x00, 0x00, 0xFE, 0x00, 0xFF, 0x00]);
        let mut pn532 = session(&sim, Config::strict());

        assert_eq!(pn532.firmware_version(), Err(Error::HandshakeMismatch));
        assert!(sim.cs_is_high());
    }

    #[test]
    fn lenient_policy_reads_response_after_bad_ack() {
        let sim = SimulatedPn532::new();
        sim.corrupt_next_ack([0x00, 0x00, 0xFE, 0x00, 0xFF, 0x00]);
        let mut pn532 = session(&sim, Config::default());

        assert_eq!(pn532.query_firmware_version(), 0x3201_0607);
    }

    #[test]
    fn strict_policy_times_out_without_ack() {
        let sim = SimulatedPn532::new().with_ack_delay_polls(10);
        let mut pn532 = session(&sim, Config::strict());

        assert_eq!(
            pn532.configure_security_module(),
            Err(Error::Timeout(Config::DEFAULT_ACK_TIMEOUT_MS))
        );
    }

    #[test]
    fn lenient_policy_reads_response_when_ack_never_arrives() {
        // no ACK, and the answer only becomes ready after the ACK window
        let sim = SimulatedPn532::new().with_response_delay_polls(5);
        sim.drop_next_ack();
        let mut pn532 = session(&sim, Config::default());

        assert_eq!(pn532.firmware_version().map(|v| v.as_u32()), Ok(0x3201_0607));
        assert_eq!(sim.data_reads(), 1);
        assert!(sim.cs_is_high());
    }

    #[test]
    fn strict_policy_gives_up_when_ack_never_arrives() {
        let sim = SimulatedPn532::new().with_response_delay_polls(5);
        sim.drop_next_ack();
        let mut pn532 = session(&sim, Config::strict());

        assert_eq!(
            pn532.firmware_version(),
            Err(Error::Timeout(Config::DEFAULT_ACK_TIMEOUT_MS))
        );
        assert_eq!(sim.data_reads(), 0);
    }

    #[test]
    fn sam_configuration_sends_normal_mode() {
        let sim = SimulatedPn532::new();
        let mut pn532 = session(&sim, Config::default());

        pn532.configure_security_module().unwrap();

        assert_eq!(
            sim.last_command().as_deref(),
            Some(&[0x14, 0x01, 0x14, 0x01][..])
        );
    }

    #[test]
    fn release_returns_peripherals() {
        let sim = SimulatedPn532::new();
        let mut pn532 = session(&sim, Config::default());
        pn532.init().unwrap();
        let (_spi, _cs, _delay, clock) = pn532.release();
        assert_eq!(clock.now_ms(), 100);
    }
}
