use std::fmt;
use std::time::Duration;

use anyhow::{ensure, Context, Result};
use serde::Deserialize;

use crate::net::RetryPolicy;

// WiFi-Credentials werden aus credentials.toml geladen (build.rs → $OUT_DIR/credentials.rs)
pub use crate::credentials::{WIFI_PASS, WIFI_SSID};

/// Calibration file embedded by build.rs, parsed at startup.
pub const CALIBRATION_TOML: &str = include_str!(concat!(env!("OUT_DIR"), "/calibration.toml"));

/*** Kalibrierung & Timing ***/

/// Everything the control loop needs to turn raw samples into decisions.
///
/// `zero_current_offset_v` has no default: it is measured per sensor with
/// the load disconnected and must come from `calibration.toml`.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Resistive divider in front of the voltage ADC input.
    #[serde(default = "default_divider_ratio")]
    pub divider_ratio: f32,
    #[serde(default = "default_adc_reference_v")]
    pub adc_reference_v: f32,
    /// Full-scale raw ADC value (4095 for 12 bit).
    #[serde(default = "default_adc_resolution")]
    pub adc_resolution: u16,
    #[serde(default = "default_current_sensitivity")]
    pub current_sensitivity_v_per_a: f32,
    pub zero_current_offset_v: f32,
    #[serde(default = "default_power_threshold_w")]
    pub power_threshold_w: f32,

    #[serde(default = "default_current_samples")]
    pub current_samples: usize,
    #[serde(default = "default_current_sample_interval_ms")]
    pub current_sample_interval_ms: u64,
    #[serde(default = "default_loop_period_ms")]
    pub loop_period_ms: u64,

    #[serde(default = "default_wifi_connect_attempts")]
    pub wifi_connect_attempts: u32,
    #[serde(default = "default_wifi_retry_delay_ms")]
    pub wifi_retry_delay_ms: u64,
    #[serde(default = "default_wifi_connect_timeout_ms")]
    pub wifi_connect_timeout_ms: u64,
}

fn default_divider_ratio() -> f32 { 5.0 }
fn default_adc_reference_v() -> f32 { 3.3 }
fn default_adc_resolution() -> u16 { 4095 }
fn default_current_sensitivity() -> f32 { 0.185 } // ACS712-05B
fn default_power_threshold_w() -> f32 { 10.0 }
fn default_current_samples() -> usize { 20 }
fn default_current_sample_interval_ms() -> u64 { 10 }
fn default_loop_period_ms() -> u64 { 5_000 }
fn default_wifi_connect_attempts() -> u32 { 10 }
fn default_wifi_retry_delay_ms() -> u64 { 2_000 }
fn default_wifi_connect_timeout_ms() -> u64 { 60_000 }

impl Config {
    /// Defaults for everything except the measured zero-current offset.
    pub fn new(zero_current_offset_v: f32) -> Self {
        Self {
            divider_ratio: default_divider_ratio(),
            adc_reference_v: default_adc_reference_v(),
            adc_resolution: default_adc_resolution(),
            current_sensitivity_v_per_a: default_current_sensitivity(),
            zero_current_offset_v,
            power_threshold_w: default_power_threshold_w(),
            current_samples: default_current_samples(),
            current_sample_interval_ms: default_current_sample_interval_ms(),
            loop_period_ms: default_loop_period_ms(),
            wifi_connect_attempts: default_wifi_connect_attempts(),
            wifi_retry_delay_ms: default_wifi_retry_delay_ms(),
            wifi_connect_timeout_ms: default_wifi_connect_timeout_ms(),
        }
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let cfg: Config = toml::from_str(raw).context("invalid calibration.toml")?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Rejects values that would make the conversions meaningless.
    /// Sensor readings themselves are never validated.
    pub fn validate(&self) -> Result<()> {
        ensure!(self.adc_resolution > 0, "adc_resolution must be > 0");
        ensure!(
            self.current_sensitivity_v_per_a != 0.0,
            "current_sensitivity_v_per_a must not be 0"
        );
        ensure!(self.current_samples > 0, "current_samples must be > 0");
        ensure!(self.wifi_connect_attempts > 0, "wifi_connect_attempts must be > 0");
        Ok(())
    }

    pub fn current_sample_interval(&self) -> Duration {
        Duration::from_millis(self.current_sample_interval_ms)
    }

    pub fn loop_period(&self) -> Duration {
        Duration::from_millis(self.loop_period_ms)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            attempts: self.wifi_connect_attempts,
            delay: Duration::from_millis(self.wifi_retry_delay_ms),
            timeout: Duration::from_millis(self.wifi_connect_timeout_ms),
        }
    }
}

/*** App-Model ***/

/// Last measurement, overwritten every tick.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Reading {
    pub voltage: f32,
    pub current: f32,
    /// Always `voltage * current` of the same tick
    pub power: f32,
    /// Mirrors the relay pin: true iff driven high
    pub load_connected: bool,
}

impl Reading {
    pub fn new(voltage: f32, current: f32, load_connected: bool) -> Self {
        Self {
            voltage,
            current,
            power: voltage * current,
            load_connected,
        }
    }
}

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "V={:.2} V  I={:.3} A  P={:.2} W  load={}",
            self.voltage,
            self.current,
            self.power,
            if self.load_connected { "ON" } else { "OFF" }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_zero_offset_is_required() {
        let cfg = Config::from_toml_str("zero_current_offset_v = 1.5").unwrap();
        assert_eq!(cfg, Config::new(1.5));
        assert_eq!(cfg.loop_period(), Duration::from_secs(5));
        assert_eq!(cfg.current_samples, 20);
    }

    #[test]
    fn missing_zero_offset_is_rejected() {
        let err = Config::from_toml_str("power_threshold_w = 12.0").unwrap_err();
        assert!(format!("{err:#}").contains("zero_current_offset_v"));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(Config::from_toml_str("zero_current_offset_v = 1.6\nthreshold = 3").is_err());
    }

    #[test]
    fn overrides_are_applied() {
        let cfg = Config::from_toml_str(
            "zero_current_offset_v = 2.5\ndivider_ratio = 4.0\npower_threshold_w = 25.5\nloop_period_ms = 1000",
        )
        .unwrap();
        assert_eq!(cfg.divider_ratio, 4.0);
        assert_eq!(cfg.power_threshold_w, 25.5);
        assert_eq!(cfg.loop_period(), Duration::from_secs(1));
    }

    #[test]
    fn degenerate_values_fail_validation() {
        assert!(Config::from_toml_str("zero_current_offset_v = 1.6\nadc_resolution = 0").is_err());
        assert!(Config::from_toml_str("zero_current_offset_v = 1.6\ncurrent_samples = 0").is_err());
        assert!(Config::from_toml_str(
            "zero_current_offset_v = 1.6\ncurrent_sensitivity_v_per_a = 0.0"
        )
        .is_err());
    }

    #[test]
    fn reading_derives_power() {
        let r = Reading::new(12.0, 1.5, true);
        assert_eq!(r.power, 18.0);
        assert_eq!(r.to_string(), "V=12.00 V  I=1.500 A  P=18.00 W  load=ON");
        assert_eq!(Reading::default().to_string(), "V=0.00 V  I=0.000 A  P=0.00 W  load=OFF");
    }
}
