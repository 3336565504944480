//! Conversion latency, in milliseconds
//!
//! ADC1 figures are the datasheet's first-conversion and steady-state
//! periods. ADC2 has no published first-conversion figure; it is taken as
//! three conversion periods.

use super::{Adc1DataRate, Adc2DataRate, DataRate, Error, FilterMode};

const ADC2_INITIAL_PERIODS: f64 = 3.0;

/// First-conversion delay after `START1`: SINC1, SINC2, SINC3, SINC4, FIR
fn adc1_initial_row(rate: Adc1DataRate) -> [Option<f64>; 5] {
    use Adc1DataRate::*;
    match rate {
        Sps2p5 => [Some(400.4), Some(800.4), Some(1200.4), Some(1600.4), Some(402.2)],
        Sps5 => [Some(200.4), Some(400.4), Some(600.4), Some(800.4), Some(202.2)],
        Sps10 => [Some(100.4), Some(200.4), Some(300.4), Some(400.4), Some(102.2)],
        Sps16p6 => [Some(60.43), Some(120.4), Some(180.4), Some(240.4), Some(62.22)],
        Sps20 => [Some(50.43), Some(100.4), Some(150.4), Some(200.4), Some(52.22)],
        Sps50 => [Some(20.43), Some(40.43), Some(60.43), Some(80.43), None],
        Sps60 => [Some(17.09), Some(33.76), Some(50.43), Some(67.09), None],
        Sps100 => [Some(10.43), Some(20.43), Some(30.43), Some(40.43), None],
        Sps400 => [Some(2.925), Some(5.425), Some(7.925), Some(10.43), None],
        Sps1200 => [Some(1.258), Some(2.091), Some(2.925), Some(3.758), None],
        Sps2400 => [Some(0.8415), Some(1.258), Some(1.675), Some(2.091), None],
        Sps4800 => [Some(0.6332), Some(0.8415), Some(1.05), Some(1.258), None],
        Sps7200 => [Some(0.5637), Some(0.7026), Some(0.8415), Some(0.9804), None],
        Sps14400 => [Some(0.4943), Some(0.5637), Some(0.6332), Some(0.7026), None],
        Sps19200 => [Some(0.4769), Some(0.529), Some(0.5811), Some(0.6332), None],
        Sps38400 => [Some(0.4509), Some(0.4769), Some(0.5029), Some(0.529), None],
    }
}

fn adc1_continuous(rate: Adc1DataRate) -> f64 {
    use Adc1DataRate::*;
    match rate {
        Sps2p5 => 400.0,
        Sps5 => 200.0,
        Sps10 => 100.0,
        Sps16p6 => 60.0,
        Sps20 => 50.0,
        Sps50 => 20.0,
        Sps60 => 16.67,
        Sps100 => 10.0,
        Sps400 => 2.5,
        Sps1200 => 0.8333,
        Sps2400 => 0.4167,
        Sps4800 => 0.2083,
        Sps7200 => 0.1389,
        Sps14400 => 0.06944,
        Sps19200 => 0.05208,
        Sps38400 => 0.02604,
    }
}

fn adc2_continuous(rate: Adc2DataRate) -> f64 {
    match rate {
        Adc2DataRate::Sps10 => 121.0,
        Adc2DataRate::Sps100 => 31.2,
        Adc2DataRate::Sps400 => 8.71,
        Adc2DataRate::Sps800 => 4.97,
    }
}

/// Time from a start command until the first conversion is available
///
/// `filter` only affects ADC1.
pub fn initial_delay_ms(rate: DataRate, filter: FilterMode) -> Result<f64, Error> {
    match rate {
        DataRate::Adc1(adc1_rate) => {
            let column = match filter {
                FilterMode::Sinc1 => 0,
                FilterMode::Sinc2 => 1,
                FilterMode::Sinc3 => 2,
                FilterMode::Sinc4 => 3,
                FilterMode::Fir => 4,
            };
            adc1_initial_row(adc1_rate)[column]
                .ok_or(Error::ConversionTiming { rate, filter })
        }
        DataRate::Adc2(adc2_rate) =>
            Ok(ADC2_INITIAL_PERIODS * adc2_continuous(adc2_rate)),
    }
}

/// Period between conversions once the filter has settled
pub fn continuous_delay_ms(rate: DataRate) -> f64 {
    match rate {
        DataRate::Adc1(rate) => adc1_continuous(rate),
        DataRate::Adc2(rate) => adc2_continuous(rate),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ads1263::{Property, Setting};

    #[test]
    fn adc1_initial_delay() {
        assert_eq!(
            initial_delay_ms(DataRate::Adc1(Adc1DataRate::Sps2p5), FilterMode::Sinc1),
            Ok(400.4)
        );
        assert_eq!(
            initial_delay_ms(DataRate::Adc1(Adc1DataRate::Sps20), FilterMode::Fir),
            Ok(52.22)
        );
        assert_eq!(
            initial_delay_ms(DataRate::Adc1(Adc1DataRate::Sps38400), FilterMode::Sinc4),
            Ok(0.529)
        );
    }

    #[test]
    fn adc1_continuous_delay_ignores_filter() {
        assert_eq!(continuous_delay_ms(DataRate::Adc1(Adc1DataRate::Sps20)), 50.0);
        assert_eq!(continuous_delay_ms(DataRate::Adc1(Adc1DataRate::Sps60)), 16.67);
    }

    #[test]
    fn adc2_initial_delay_is_three_periods() {
        let rate = DataRate::Adc2(Adc2DataRate::Sps10);
        assert_eq!(continuous_delay_ms(rate), 121.0);
        assert_eq!(initial_delay_ms(rate, FilterMode::Sinc4), Ok(363.0));
    }

    #[test]
    fn fir_is_unspecified_above_20_sps() {
        let rate = DataRate::Adc1(Adc1DataRate::Sps50);
        assert_eq!(
            initial_delay_ms(rate, FilterMode::Fir),
            Err(Error::ConversionTiming { rate, filter: FilterMode::Fir })
        );
    }

    #[test]
    fn initial_delay_exceeds_conversion_period() {
        let filters = [
            FilterMode::Sinc1, FilterMode::Sinc2, FilterMode::Sinc3, FilterMode::Sinc4,
        ];
        let rates = Property::Adc1DataRate.descriptor().variants.iter()
            .filter_map(|variant| match variant.value.setting {
                Setting::DataRate(rate) => Some(rate),
                _ => None,
            });
        for rate in rates {
            for &filter in filters.iter() {
                let initial = initial_delay_ms(rate, filter).unwrap();
                assert!(initial > continuous_delay_ms(rate), "{} {}", rate, filter);
            }
        }
    }
}
