//! Pet feeder desktop simulator
//!
//! Runs the device loop against a simulated PN532 on the host: the reader
//! driver, the authorization client and the stepper all run unchanged, only
//! the SPI bus and the motor pins are fake.
//!
//! # Usage
//! ```bash
//! # Against a running server (PETFEEDER_SERVER_URL, default http://127.0.0.1:5000)
//! cargo run -p petfeeder-simulator
//!
//! # No server: the simulated card is the only authorized one
//! cargo run -p petfeeder-simulator -- --offline --card 049A3C7F --iterations 12
//! ```

use std::time::Duration;

use anyhow::{bail, Context};
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{ErrorType, OutputPin};
use log::{debug, info, warn};
use petfeeder::{
    Authorizer, Feeder, FeederConfig, HttpAuthorizer, NfcReader, Outcome, StaticAuthorizer,
    Stepper,
};
use petfeeder_nfc::sim::{SimCard, SimulatedPn532};
use petfeeder_nfc::{Config, Pn532, StdClock};

const STRANGER_UID: [u8; 7] = [0x04, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66];

struct Args {
    offline: bool,
    card: Vec<u8>,
    iterations: usize,
}

fn parse_args() -> anyhow::Result<Args> {
    let mut args = Args {
        offline: false,
        card: vec![0x04, 0x9A, 0x3C, 0x7F],
        iterations: 20,
    };

    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--offline" => args.offline = true,
            "--card" => {
                let hex = it.next().context("--card needs a hex UID")?;
                args.card = parse_uid(&hex)?;
            }
            "--iterations" | "-n" => {
                let n = it.next().context("--iterations needs a number")?;
                args.iterations = n.parse().with_context(|| format!("bad iteration count {:?}", n))?;
            }
            other => bail!("unknown argument {:?}", other),
        }
    }
    Ok(args)
}

fn parse_uid(hex: &str) -> anyhow::Result<Vec<u8>> {
    if hex.is_empty() || hex.len() % 2 != 0 || hex.len() > 14 {
        bail!("UID must be 1 to 7 bytes of hex, got {:?}", hex);
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&hex[i..i + 2], 16).with_context(|| format!("bad hex in {:?}", hex)))
        .collect()
}

/// Motor coil that only logs.
struct LogPin(usize);

impl ErrorType for LogPin {
    type Error = core::convert::Infallible;
}

impl OutputPin for LogPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        log::trace!("IN{} high", self.0 + 1);
        Ok(())
    }
}

struct SleepDelay;

impl DelayNs for SleepDelay {
    fn delay_ns(&mut self, ns: u32) {
        std::thread::sleep(Duration::from_nanos(u64::from(ns)));
    }
}

/// A pet walking up, resting on the reader, leaving, then a stranger.
fn field_script(pet: &SimCard) -> Vec<Option<SimCard>> {
    vec![
        None,
        Some(pet.clone()),
        Some(pet.clone()),
        Some(pet.clone()),
        None,
        Some(SimCard::mifare_classic_1k(&STRANGER_UID)),
        None,
    ]
}

fn run<A: Authorizer>(args: &Args, config: &FeederConfig, authorizer: A) -> anyhow::Result<()> {
    let pet = SimCard::ntag(&args.card);
    let sim = SimulatedPn532::new();
    for _ in 0..args.iterations.div_ceil(7) {
        sim.script_cards(field_script(&pet));
    }

    let pn532 = Pn532::new(sim.spi(), sim.cs(), SleepDelay, StdClock::new(), Config::default());
    let mut reader = NfcReader::new(pn532);
    let version = reader.start().context("PN532 did not start")?;
    debug!("Firmware word {:#010X}", version.as_u32());

    let coils = [0, 1, 2, 3].map(LogPin);
    let stepper = Stepper::new(coils, SleepDelay, config.step_interval_ms)?;
    let mut feeder = Feeder::from_config(reader, authorizer, stepper, config);

    for i in 0..args.iterations {
        match feeder.poll() {
            Ok(Outcome::Idle) => debug!("[{}] no tag", i),
            Ok(Outcome::Repeat(uid)) => debug!("[{}] {} still on reader", i, uid),
            Ok(Outcome::Denied { uid, .. }) => info!("[{}] {} denied", i, uid),
            Ok(Outcome::Dispensed { uid, duration, .. }) => {
                info!("[{}] {} fed for {:?}", i, uid, duration)
            }
            Err(e) => warn!("[{}] poll failed: {}", i, e),
        }
        std::thread::sleep(config.poll_interval);
    }

    info!("Motor at half step {}", feeder.actuator().position());
    Ok(())
}

fn main() -> anyhow::Result<()> {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = parse_args()?;
    let config = FeederConfig::from_env()?;
    let card_hex = petfeeder_nfc::target::uid_hex(&args.card);

    info!("Pet feeder simulator, card {}", card_hex);

    if args.offline {
        info!("Offline mode: only {} is authorized", card_hex);
        let authorizer = StaticAuthorizer::new().allow(&card_hex, "Simulated pet", None);
        run(&args, &config, authorizer)
    } else {
        info!("Authorizing against {}", config.server_url);
        let authorizer = HttpAuthorizer::new(&config.server_url, config.request_timeout)?;
        run(&args, &config, authorizer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uid_argument_parsing() {
        assert_eq!(parse_uid("049a3C7f").unwrap(), vec![0x04, 0x9A, 0x3C, 0x7F]);
        assert!(parse_uid("049").is_err());
        assert!(parse_uid("zz").is_err());
        assert!(parse_uid("0102030405060708").is_err());
    }

    #[test]
    fn offline_run_feeds_the_simulated_pet() {
        let args = Args {
            offline: true,
            card: vec![0x04, 0x9A, 0x3C, 0x7F],
            iterations: 7,
        };
        let config = FeederConfig {
            poll_interval: Duration::ZERO,
            dispense: petfeeder::DispenseLimits {
                min_ms: 4,
                max_ms: 4,
                default_ms: 4,
            },
            step_interval_ms: 1,
            ..FeederConfig::default()
        };
        let authorizer = StaticAuthorizer::new().allow("049A3C7F", "Simulated pet", None);
        run(&args, &config, authorizer).unwrap();
    }
}
