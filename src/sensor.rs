use anyhow::Result;
use std::thread;

use crate::config::Config;
use crate::hw::AnalogInput;

/// raw / resolution * Vref * Teiler. Kein Clamping.
pub fn voltage_from_raw(raw: u16, cfg: &Config) -> f32 {
    raw as f32 / cfg.adc_resolution as f32 * cfg.adc_reference_v * cfg.divider_ratio
}

/// Averaged raw counts -> amperes. Only the magnitude is kept.
pub fn current_from_raw_average(avg_raw: f32, cfg: &Config) -> f32 {
    let sense_v = avg_raw / cfg.adc_resolution as f32 * cfg.adc_reference_v;
    ((sense_v - cfg.zero_current_offset_v) / cfg.current_sensitivity_v_per_a).abs()
}

pub fn read_voltage(input: &mut impl AnalogInput, cfg: &Config) -> Result<f32> {
    Ok(voltage_from_raw(input.read_raw()?, cfg))
}

/// `current_samples` reads with a short pause in between, then averaged.
pub fn read_current(input: &mut impl AnalogInput, cfg: &Config) -> Result<f32> {
    let n = cfg.current_samples.max(1);
    let mut acc: u64 = 0;
    for i in 0..n {
        acc += input.read_raw()? as u64;
        if i + 1 < n {
            thread::sleep(cfg.current_sample_interval());
        }
    }
    Ok(current_from_raw_average((acc as f64 / n as f64) as f32, cfg))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hw::fake::FakeAdc;

    fn cfg() -> Config {
        Config {
            current_sample_interval_ms: 0,
            ..Config::new(1.65)
        }
    }

    #[test]
    fn voltage_is_zero_at_zero() {
        assert_eq!(voltage_from_raw(0, &cfg()), 0.0);
    }

    #[test]
    fn voltage_is_monotonic() {
        let cfg = cfg();
        let mut prev = voltage_from_raw(0, &cfg);
        for raw in 1..=cfg.adc_resolution {
            let v = voltage_from_raw(raw, &cfg);
            assert!(v > prev, "not increasing at raw={raw}");
            prev = v;
        }
        assert!((prev - 3.3 * 5.0).abs() < 1e-4);
    }

    #[test]
    fn voltage_matches_divider_example() {
        let cfg = Config { divider_ratio: 4.0, ..cfg() };
        let v = voltage_from_raw(2048, &cfg);
        assert!((v - 3.3 * 4.0 * (2048.0 / 4095.0)).abs() < 1e-4);
        assert!((v - 6.6016).abs() < 1e-3);
    }

    #[test]
    fn out_of_range_samples_are_not_clamped() {
        let cfg = cfg();
        assert!(voltage_from_raw(u16::MAX, &cfg) > 3.3 * 5.0);
    }

    #[test]
    fn zero_offset_average_gives_zero_current() {
        // 2048/4096 * 4.096 = 2.048 V exactly
        let cfg = Config {
            adc_resolution: 4096,
            adc_reference_v: 4.096,
            ..Config::new(2.048)
        };
        let mut adc = FakeAdc::sequence([2000, 2096, 2048, 2048]);
        let cfg = Config { current_samples: 4, current_sample_interval_ms: 0, ..cfg };
        assert_eq!(read_current(&mut adc, &cfg).unwrap(), 0.0);
        assert_eq!(adc.reads, 4);
    }

    #[test]
    fn current_sign_is_discarded() {
        let cfg = cfg();
        let above = current_from_raw_average(2482.0, &cfg);
        let below = current_from_raw_average(1613.0, &cfg);
        assert!(above > 0.0);
        assert!(below > 0.0);
        // 1 A at 0.185 V/A
        let one_amp_raw = (1.65 + 0.185) / 3.3 * 4095.0;
        assert!((current_from_raw_average(one_amp_raw, &cfg) - 1.0).abs() < 1e-3);
    }

    #[test]
    fn current_reads_configured_sample_count() {
        let cfg = cfg();
        let mut adc = FakeAdc::constant(2048);
        read_current(&mut adc, &cfg).unwrap();
        assert_eq!(adc.reads, 20);
    }

    #[test]
    fn long_averaging_window_does_not_overflow() {
        let cfg = Config { current_samples: 70_000, ..cfg() };
        cfg.validate().unwrap();
        let mut adc = FakeAdc::constant(u16::MAX);
        let i = read_current(&mut adc, &cfg).unwrap();
        let expected = current_from_raw_average(u16::MAX as f32, &cfg);
        assert!((i - expected).abs() < 1e-3);
        assert_eq!(adc.reads, 70_000);
    }

    #[test]
    fn failed_read_propagates() {
        let mut adc = FakeAdc::constant(100);
        adc.fail = true;
        assert!(read_voltage(&mut adc, &cfg()).is_err());
        assert!(read_current(&mut adc, &cfg()).is_err());
    }
}
