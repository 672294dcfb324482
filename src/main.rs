#[cfg(target_os = "espidf")]
use esp_idf_sys as _;

#[cfg(not(target_os = "espidf"))]
fn main() {
    eprintln!("load-guardian runs on ESP32 only; build with --target xtensa-esp32-espidf");
    std::process::exit(1);
}

#[cfg(target_os = "espidf")]
fn main() -> anyhow::Result<()> {
    use std::thread;
    use std::time::Duration;

    esp_idf_svc::log::EspLogger::initialize_default();

    let _handle = thread::Builder::new()
        .name("app".into())
        .stack_size(28 * 1024)
        .spawn(|| {
            if let Err(e) = device::app() {
                log::error!("app() failed: {e:?}");
            }
        })?;

    loop { thread::sleep(Duration::from_secs(60)); }
}

#[cfg(target_os = "espidf")]
mod device {
    use std::sync::{Arc, Mutex};
    use std::thread;
    use std::time::Instant;

    use anyhow::{anyhow, Context, Result};
    use esp_idf_svc::eventloop::EspSystemEventLoop;
    use esp_idf_svc::nvs::EspDefaultNvsPartition;
    use esp_idf_svc::wifi::{BlockingWifi, ClientConfiguration, Configuration as WifiCfg, EspWifi};

    use load_guardian::config::{self, Config};
    use load_guardian::control::Monitor;
    use load_guardian::net::{self, LinkEvent, LinkStatus, LinkWatch};
    use load_guardian::{hw, web};

    pub fn app() -> Result<()> {
        let cfg = Config::from_toml_str(config::CALIBRATION_TOML)?;
        log::info!(
            "calibration: divider={} vref={} res={} sens={} V/A offset={} V threshold={} W",
            cfg.divider_ratio,
            cfg.adc_reference_v,
            cfg.adc_resolution,
            cfg.current_sensitivity_v_per_a,
            cfg.zero_current_offset_v,
            cfg.power_threshold_w
        );

        let peripherals = esp_idf_hal::peripherals::Peripherals::take()?;

        // HW zuerst: Relais ist AUS, bevor WiFi irgendwas blockiert
        let (voltage_in, current_in, relay) = hw::init_hw(peripherals.pins, peripherals.adc1)?;
        let mut monitor = Monitor::new(voltage_in, current_in, relay, cfg.clone())?;
        let shared = Arc::new(Mutex::new(monitor.reading().clone()));

        let sysloop = EspSystemEventLoop::take()?;
        let nvs = EspDefaultNvsPartition::take()?;
        let mut esp_wifi = EspWifi::new(peripherals.modem, sysloop.clone(), Some(nvs))?;
        let mut wifi = BlockingWifi::wrap(&mut esp_wifi, sysloop)?;

        wifi.set_configuration(&WifiCfg::Client(ClientConfiguration {
            ssid: config::WIFI_SSID
                .try_into()
                .map_err(|_| anyhow!("WiFi SSID too long"))?,
            password: config::WIFI_PASS
                .try_into()
                .map_err(|_| anyhow!("WiFi password too long"))?,
            ..Default::default()
        }))?;
        wifi.start()?;

        let link = match net::connect_with_retry(cfg.retry_policy(), |_| {
            wifi.connect()?;
            wifi.wait_netif_up()
        }) {
            Ok((n, ())) => {
                let ip_info = wifi.wifi().sta_netif().get_ip_info()?;
                log::info!("WiFi connected after {n} attempt(s). IP: {}", ip_info.ip);
                LinkStatus::Online
            }
            Err(e) => {
                log::error!("{e:#}; running offline, status page disabled");
                LinkStatus::Offline
            }
        };

        let _server = match link {
            LinkStatus::Online => Some(
                web::start_web(
                    shared.clone(),
                    cfg.power_threshold_w,
                    cfg.loop_period().as_secs().max(1),
                )
                .context("starting status page")?,
            ),
            LinkStatus::Offline => None,
        };

        let mut link_watch = LinkWatch::new(cfg.retry_policy().delay);

        loop {
            match monitor.tick() {
                Ok(reading) => {
                    let reading = reading.clone();
                    log::info!("{reading}  state={:?}", monitor.load_state());
                    match shared.lock() {
                        Ok(mut s) => *s = reading,
                        Err(_) => log::warn!("snapshot lock poisoned, page shows stale values"),
                    }
                }
                Err(e) => log::warn!("tick failed, keeping last reading: {e:#}"),
            }

            // Reconnect nur anstoßen, nie darauf warten: der Tick darf nicht blockieren
            if link == LinkStatus::Online {
                let up = wifi.is_up().unwrap_or(false);
                match link_watch.poll(up, Instant::now()) {
                    LinkEvent::Reconnect => match wifi.wifi_mut().connect() {
                        Ok(()) => log::warn!("WiFi down, reconnect started"),
                        Err(e) => log::warn!("WiFi reconnect request failed: {e}"),
                    },
                    LinkEvent::Restored => {
                        if let Ok(info) = wifi.wifi().sta_netif().get_ip_info() {
                            log::warn!("WiFi reconnected. IP: {}", info.ip);
                        } else {
                            log::warn!("WiFi reconnected.");
                        }
                    }
                    LinkEvent::Up | LinkEvent::Waiting => {}
                }
            }

            thread::sleep(monitor.config().loop_period());
        }
    }
}
