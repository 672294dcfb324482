use anyhow::Result;

/// One analog channel, returning raw ADC counts.
pub trait AnalogInput {
    fn read_raw(&mut self) -> Result<u16>;
}

/// The relay output. `is_set_high` reports the level last driven, not a
/// measurement of the contact.
pub trait RelayOutput {
    fn set_high(&mut self) -> Result<()>;
    fn set_low(&mut self) -> Result<()>;
    fn is_set_high(&self) -> bool;
}

#[cfg(target_os = "espidf")]
pub use esp::{init_hw, AdcInput, CurrentInput, Relay, VoltageInput};

///  - Spannung: GPIO34 (ADC1_CH6)
///  - Strom:    GPIO35 (ADC1_CH7)
///  - Relais:   GPIO33
#[cfg(target_os = "espidf")]
mod esp {
    use std::sync::Arc;

    use anyhow::Result;
    use esp_idf_hal::adc::attenuation::DB_11;
    use esp_idf_hal::adc::oneshot::config::AdcChannelConfig;
    use esp_idf_hal::adc::oneshot::{AdcChannelDriver, AdcDriver};
    use esp_idf_hal::adc::{ADCPin, ADC1};
    use esp_idf_hal::gpio::{Gpio33, Gpio34, Gpio35, Output, OutputPin, PinDriver, Pins};

    use super::{AnalogInput, RelayOutput};

    type SharedAdc = Arc<AdcDriver<'static, ADC1>>;

    pub struct AdcInput<P: ADCPin<Adc = ADC1>> {
        chan: AdcChannelDriver<'static, P, SharedAdc>,
    }

    pub type VoltageInput = AdcInput<Gpio34>;
    pub type CurrentInput = AdcInput<Gpio35>;
    pub type Relay = PinDriver<'static, Gpio33, Output>;

    impl<P: ADCPin<Adc = ADC1>> AnalogInput for AdcInput<P> {
        fn read_raw(&mut self) -> Result<u16> {
            Ok(self.chan.read_raw()?)
        }
    }

    impl<'d, T: OutputPin> RelayOutput for PinDriver<'d, T, Output> {
        fn set_high(&mut self) -> Result<()> {
            PinDriver::set_high(self)?;
            Ok(())
        }

        fn set_low(&mut self) -> Result<()> {
            PinDriver::set_low(self)?;
            Ok(())
        }

        fn is_set_high(&self) -> bool {
            PinDriver::is_set_high(self)
        }
    }

    pub fn init_hw(pins: Pins, adc1: ADC1) -> Result<(VoltageInput, CurrentInput, Relay)> {
        // Rohwerte, 11 dB → ~0..3.3 V Messbereich
        let adc: SharedAdc = Arc::new(AdcDriver::new(adc1)?);
        let cfg = AdcChannelConfig {
            attenuation: DB_11,
            ..Default::default()
        };
        let voltage = AdcInput {
            chan: AdcChannelDriver::new(adc.clone(), pins.gpio34, &cfg)?,
        };
        let current = AdcInput {
            chan: AdcChannelDriver::new(adc, pins.gpio35, &cfg)?,
        };

        let mut relay = PinDriver::output(pins.gpio33)?;
        relay.set_low()?;

        Ok((voltage, current, relay))
    }
}
