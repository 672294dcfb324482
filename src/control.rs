use anyhow::{Context, Result};

use crate::config::{Config, Reading};
use crate::hw::{AnalogInput, RelayOutput};
use crate::sensor;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadState {
    Connected,
    Disconnected,
}

/// Switches the relay on the threshold boundary, using the pin's current
/// level as the state. Returns the transition taken, if any.
///
/// No hysteresis: power hovering around the threshold toggles the relay on
/// every call.
pub fn apply_threshold(
    relay: &mut impl RelayOutput,
    power: f32,
    threshold: f32,
) -> Result<Option<LoadState>> {
    let high = relay.is_set_high();
    if power >= threshold && !high {
        relay.set_high()?;
        Ok(Some(LoadState::Connected))
    } else if power < threshold && high {
        relay.set_low()?;
        Ok(Some(LoadState::Disconnected))
    } else {
        Ok(None)
    }
}

/// Owns the sensors, the relay and the last reading.
pub struct Monitor<V, C, R> {
    voltage_in: V,
    current_in: C,
    relay: R,
    cfg: Config,
    reading: Reading,
}

impl<V, C, R> Monitor<V, C, R>
where
    V: AnalogInput,
    C: AnalogInput,
    R: RelayOutput,
{
    /// Relais beim Start immer AUS
    pub fn new(voltage_in: V, current_in: C, mut relay: R, cfg: Config) -> Result<Self> {
        relay.set_low().context("forcing relay off")?;
        Ok(Self {
            voltage_in,
            current_in,
            relay,
            cfg,
            reading: Reading::default(),
        })
    }

    /// One acquisition + decision cycle. On error the previous reading and
    /// the relay are left untouched.
    pub fn tick(&mut self) -> Result<&Reading> {
        let voltage = sensor::read_voltage(&mut self.voltage_in, &self.cfg)
            .context("reading voltage channel")?;
        let current = sensor::read_current(&mut self.current_in, &self.cfg)
            .context("reading current channel")?;
        let power = voltage * current;

        match apply_threshold(&mut self.relay, power, self.cfg.power_threshold_w)? {
            Some(LoadState::Connected) => {
                log::info!("load connected ({power:.2} W >= {:.2} W)", self.cfg.power_threshold_w)
            }
            Some(LoadState::Disconnected) => {
                log::info!("load shed ({power:.2} W < {:.2} W)", self.cfg.power_threshold_w)
            }
            None => {}
        }

        self.reading = Reading::new(voltage, current, self.relay.is_set_high());
        Ok(&self.reading)
    }

    pub fn reading(&self) -> &Reading {
        &self.reading
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    pub fn load_state(&self) -> LoadState {
        if self.relay.is_set_high() {
            LoadState::Connected
        } else {
            LoadState::Disconnected
        }
    }
}
