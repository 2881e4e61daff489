//! Pet feeder firmware for ESP32
//!
//! Hardware:
//! - PN532 on SPI2: SCK GPIO18, MISO GPIO19, MOSI GPIO23, SS GPIO5
//! - 28BYJ-48 stepper via ULN2003: IN1..IN4 on GPIO25, GPIO26, GPIO27, GPIO14

mod http_client;
mod wifi_init;

use std::time::Duration;

use esp_idf_hal::delay::FreeRtos;
use esp_idf_hal::gpio::{AnyOutputPin, Output, OutputPin as _, PinDriver};
use esp_idf_hal::peripherals::Peripherals;
use esp_idf_hal::spi::config::{BitOrder, Config as SpiConfig};
use esp_idf_hal::spi::{SpiBusDriver, SpiDriver, SpiDriverConfig};
use esp_idf_hal::units::FromValueType;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use esp_idf_svc::systime::EspSystemTime;
use log::{error, info, warn};
use petfeeder::{DispenseLimits, Feeder, NfcReader, Outcome, Stepper};
use petfeeder_nfc::{Clock, Config, Pn532};

use crate::http_client::EspAuthorizer;

/// Authorization server
const SERVER_URL: &str = "http://192.168.1.10:5000";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);
const POLL_INTERVAL_MS: u32 = 250;
const REPEAT_WINDOW: Duration = Duration::from_secs(10);
const STEP_INTERVAL_MS: u32 = 2;

/// Milliseconds since boot from the ESP-IDF high resolution timer.
struct EspClock;

impl Clock for EspClock {
    fn now_ms(&self) -> u64 {
        EspSystemTime.now().as_millis() as u64
    }
}

fn coil(pin: AnyOutputPin) -> anyhow::Result<PinDriver<'static, AnyOutputPin, Output>> {
    let mut driver = PinDriver::output(pin)?;
    driver.set_low()?;
    Ok(driver)
}

fn main() -> anyhow::Result<()> {
    esp_idf_svc::sys::link_patches();
    esp_idf_svc::log::EspLogger::initialize_default();

    info!("Pet feeder starting");

    let peripherals = Peripherals::take()?;
    let pins = peripherals.pins;

    if !wifi_init::is_configured() {
        warn!("WiFi credentials are placeholders, connection will fail");
    }
    let sysloop = EspSystemEventLoop::take()?;
    let nvs = EspDefaultNvsPartition::take().ok();
    let _wifi = wifi_init::connect_wifi(peripherals.modem, sysloop, nvs)?;

    // PN532 talks LSB first, SPI mode 0, at most 5 MHz
    let spi = SpiDriver::new(
        peripherals.spi2,
        pins.gpio18,
        pins.gpio23,
        Some(pins.gpio19),
        &SpiDriverConfig::new(),
    )?;
    let spi_config = SpiConfig::new()
        .baudrate(1.MHz().into())
        .data_mode(embedded_hal::spi::MODE_0)
        .bit_order(BitOrder::LsbFirst);
    let bus = SpiBusDriver::new(spi, &spi_config)?;
    let cs = PinDriver::output(pins.gpio5)?;

    let pn532 = Pn532::new(bus, cs, FreeRtos, EspClock, Config::default());
    let mut reader = NfcReader::new(pn532);
    let version = loop {
        match reader.start() {
            Ok(version) => break version,
            Err(e) => {
                error!("PN532 not responding: {}", e);
                FreeRtos::delay_ms(1000);
            }
        }
    };
    info!("PN532 ready, firmware word {:#010X}", version.as_u32());

    let coils = [
        coil(pins.gpio25.downgrade_output())?,
        coil(pins.gpio26.downgrade_output())?,
        coil(pins.gpio27.downgrade_output())?,
        coil(pins.gpio14.downgrade_output())?,
    ];
    let stepper = Stepper::new(coils, FreeRtos, STEP_INTERVAL_MS)?;

    let authorizer = EspAuthorizer::new(SERVER_URL, REQUEST_TIMEOUT)?;
    let mut feeder = Feeder::new(reader, authorizer, stepper, DispenseLimits::default(), REPEAT_WINDOW);

    info!("Waiting for tags");
    loop {
        match feeder.poll() {
            Ok(Outcome::Dispensed { uid, duration, .. }) => info!("Fed {} for {:?}", uid, duration),
            Ok(Outcome::Denied { uid, .. }) => info!("Refused {}", uid),
            Ok(Outcome::Idle | Outcome::Repeat(_)) => {}
            Err(e) => warn!("Feeder poll failed: {}", e),
        }
        FreeRtos::delay_ms(POLL_INTERVAL_MS);
    }
}
