//! WiFi initialization using esp-idf-svc
//!
//! Joins the configured network, retrying a few times before giving up.

use esp_idf_hal::delay::FreeRtos;
use esp_idf_hal::modem::Modem;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use esp_idf_svc::wifi::{AuthMethod, BlockingWifi, ClientConfiguration, Configuration, EspWifi};
use log::{info, warn};

/// WiFi credentials - hardcoded for development
const WIFI_SSID: &str = "YOUR_WIFI_SSID";
const WIFI_PASSWORD: &str = "YOUR_WIFI_PASSWORD";

/// Connection attempts before giving up
const MAX_RETRIES: u32 = 5;
const RETRY_DELAY_MS: u32 = 2000;

/// Connect to WiFi and wait for an address.
///
/// The returned handle must stay alive for the connection to persist.
pub fn connect_wifi(
    modem: Modem,
    sysloop: EspSystemEventLoop,
    nvs: Option<EspDefaultNvsPartition>,
) -> anyhow::Result<BlockingWifi<EspWifi<'static>>> {
    info!("Initializing WiFi...");

    let esp_wifi = EspWifi::new(modem, sysloop.clone(), nvs)?;
    let mut wifi = BlockingWifi::wrap(esp_wifi, sysloop)?;

    let wifi_configuration = Configuration::Client(ClientConfiguration {
        ssid: WIFI_SSID
            .try_into()
            .map_err(|_| anyhow::anyhow!("SSID too long"))?,
        bssid: None,
        auth_method: AuthMethod::WPA2Personal,
        password: WIFI_PASSWORD
            .try_into()
            .map_err(|_| anyhow::anyhow!("WiFi password too long"))?,
        channel: None,
        ..Default::default()
    });

    wifi.set_configuration(&wifi_configuration)?;

    info!("Starting WiFi...");
    wifi.start()?;

    let mut attempt = 1;
    loop {
        info!("Connecting to WiFi: {} (attempt {}/{})", WIFI_SSID, attempt, MAX_RETRIES);
        match wifi.connect() {
            Ok(()) => break,
            Err(e) if attempt < MAX_RETRIES => {
                warn!("WiFi connection failed: {:?}", e);
                attempt += 1;
                FreeRtos::delay_ms(RETRY_DELAY_MS);
            }
            Err(e) => {
                warn!("WiFi connection failed: {:?}", e);
                return Err(anyhow::anyhow!("WiFi connection failed after {} attempts", MAX_RETRIES));
            }
        }
    }

    info!("Waiting for DHCP...");
    wifi.wait_netif_up()?;

    let ip_info = wifi.wifi().sta_netif().get_ip_info()?;
    info!("WiFi connected!");
    info!("  IP address: {}", ip_info.ip);
    info!("  Gateway:    {}", ip_info.subnet.gateway);

    Ok(wifi)
}

/// Check if WiFi credentials are configured
pub fn is_configured() -> bool {
    !WIFI_SSID.is_empty() && WIFI_SSID != "YOUR_WIFI_SSID"
}
