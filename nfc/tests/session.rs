//! End-to-end command exchanges against the simulated PN532.

use petfeeder_nfc::sim::{ManualClock, SimCard, SimCs, SimDelay, SimSpi, SimulatedPn532};
use petfeeder_nfc::{CardType, ChecksumField, Clock, Config, Error, Pn532, TagKind};

type TestPn532 = Pn532<SimSpi, SimCs, SimDelay, ManualClock>;

fn session(sim: &SimulatedPn532) -> (TestPn532, ManualClock) {
    session_with(sim, Config::default())
}

fn session_with(sim: &SimulatedPn532, config: Config) -> (TestPn532, ManualClock) {
    let clock = ManualClock::new();
    let pn532 = Pn532::new(sim.spi(), sim.cs(), SimDelay::new(&clock), clock.clone(), config);
    (pn532, clock)
}

#[test]
fn firmware_version_from_device_frame() {
    let sim = SimulatedPn532::new();
    // D5 03 32 01 06 07
    sim.set_next_payload(&[0x03, 0x32, 0x01, 0x06, 0x07]);
    let (mut pn532, _) = session(&sim);

    assert_eq!(pn532.query_firmware_version(), 0x3201_0607);
    assert_eq!(sim.last_command().as_deref(), Some(&[0x02][..]));
    assert!(sim.cs_is_high());
}

#[test]
fn firmware_version_is_zero_on_decode_failure() {
    let sim = SimulatedPn532::new();
    sim.set_next_frame(&[0x00, 0x00, 0xFF, 0x06, 0xFA, 0xD5, 0x03, 0x32, 0x01, 0x06, 0x07, 0xE9, 0x00]);
    let (mut pn532, _) = session(&sim);

    assert_eq!(pn532.query_firmware_version(), 0);
    assert!(sim.cs_is_high());
}

#[test]
fn typed_firmware_version_reports_checksum_failure() {
    let sim = SimulatedPn532::new();
    sim.set_next_frame(&[0x00, 0x00, 0xFF, 0x06, 0xFB, 0xD5, 0x03, 0x32, 0x01, 0x06, 0x07, 0xE8, 0x00]);
    let (mut pn532, _) = session(&sim);

    assert_eq!(
        pn532.firmware_version(),
        Err(Error::ChecksumMismatch(ChecksumField::Length))
    );
}

#[test]
fn enumerates_single_ntag() {
    let sim = SimulatedPn532::new().with_card(SimCard::ntag(&[0x04, 0x9A, 0x3C, 0x7F]));
    let (mut pn532, _) = session(&sim);

    let target = pn532
        .enumerate_passive_target(CardType::Iso14443a)
        .unwrap()
        .expect("target");

    assert_eq!(target.uid.as_slice(), &[0x04, 0x9A, 0x3C, 0x7F]);
    assert_eq!(target.uid_len(), 4);
    assert_eq!(target.kind(), TagKind::Ntag);
    assert_eq!(sim.last_command().as_deref(), Some(&[0x4A, 0x01, 0x00][..]));
}

#[test]
fn enumeration_with_literal_response_payload() {
    let sim = SimulatedPn532::new();
    // D5 4B 01 01 00 44 00 04 04 9A 3C 7F
    sim.set_next_payload(&[0x4B, 0x01, 0x01, 0x00, 0x44, 0x00, 0x04, 0x04, 0x9A, 0x3C, 0x7F]);
    let (mut pn532, _) = session(&sim);

    let target = pn532.enumerate_passive_target(CardType::Iso14443a).unwrap();
    assert_eq!(target.map(|t| t.uid_hex()).as_deref(), Some("049A3C7F"));
}

#[test]
fn zero_targets_is_no_target() {
    let sim = SimulatedPn532::new();
    sim.set_next_payload(&[0x4B, 0x00]);
    let (mut pn532, _) = session(&sim);

    assert_eq!(pn532.enumerate_passive_target(CardType::Iso14443a), Ok(None));
}

#[test]
fn wrong_response_code_is_no_target() {
    let sim = SimulatedPn532::new();
    sim.set_next_payload(&[0x4C, 0x01, 0x01, 0x00, 0x44, 0x00, 0x04, 0x04, 0x9A, 0x3C, 0x7F]);
    let (mut pn532, _) = session(&sim);

    assert_eq!(pn532.enumerate_passive_target(CardType::Iso14443a), Ok(None));
}

#[test]
fn response_timeout_is_reported() {
    let sim = SimulatedPn532::new().with_response_delay_polls(1000);
    let (mut pn532, clock) = session(&sim);

    assert_eq!(pn532.configure_security_module(), Err(Error::Timeout(1000)));
    assert!(clock.now_ms() > 1000);
    assert!(sim.cs_is_high());
}

#[test]
fn slow_response_within_timeout_succeeds() {
    let sim = SimulatedPn532::new()
        .with_ack_delay_polls(1)
        .with_response_delay_polls(20);
    let (mut pn532, _) = session(&sim);

    assert_eq!(pn532.configure_security_module(), Ok(()));
}

#[test]
fn host_direction_in_response_is_rejected() {
    let sim = SimulatedPn532::new();
    sim.set_next_frame(&[0x00, 0x00, 0xFF, 0x02, 0xFE, 0xD4, 0x15, 0x17, 0x00]);
    let (mut pn532, _) = session(&sim);

    assert_eq!(
        pn532.configure_security_module(),
        Err(Error::UnexpectedDirection(0xD4))
    );
}

#[test]
fn strict_framing_rejects_misaligned_start() {
    let sim = SimulatedPn532::new();
    sim.set_next_frame(&[0x01, 0x00, 0xFF, 0x02, 0xFE, 0xD5, 0x15, 0x16, 0x00]);
    let (mut pn532, _) = session_with(&sim, Config::strict());

    assert_eq!(
        pn532.configure_security_module(),
        Err(Error::InvalidStartCode([0x01, 0x00, 0xFF]))
    );
}

#[test]
fn bus_fault_leaves_nss_released() {
    let sim = SimulatedPn532::new();
    let (mut pn532, _) = session(&sim);
    sim.fail_next_transfer();

    let result = pn532.configure_security_module();

    assert!(matches!(result, Err(e) if e.is_bus_fault()));
    assert!(sim.cs_is_high());
    // the bus is still usable afterwards
    assert_eq!(pn532.configure_security_module(), Ok(()));
}

#[test]
fn reversed_bit_order_end_to_end() {
    let sim = SimulatedPn532::new()
        .with_reversed_bits(true)
        .with_card(SimCard::mifare_classic_1k(&[0xDE, 0xAD, 0xBE, 0xEF]));
    let config = Config {
        reverse_bits: true,
        ..Config::default()
    };
    let (mut pn532, _) = session_with(&sim, config);

    let target = pn532
        .enumerate_passive_target(CardType::Iso14443a)
        .unwrap()
        .expect("target");
    assert_eq!(target.kind(), TagKind::MifareClassic1K);
    assert_eq!(target.uid_hex().as_str(), "DEADBEEF");
}
