//! Typed view of the device derived from a [`RegisterMap`]

use core::fmt;

use super::*;

/// IDAC excitation shared by both RTD attachments
pub const RTD_COMMON: ConfigureOptions = ConfigureOptions {
    idac_1_mux: Some(IdacMux::Ain8),
    idac_2_mux: Some(IdacMux::Ain5),
    idac_1_mag: Some(IdacMag::Ua500),
    idac_2_mag: Some(IdacMag::Ua500),
    ..ConfigureOptions::EMPTY
};

pub const RTD_ADC1: ConfigureOptions = ConfigureOptions {
    adc_1_mux_p: Some(Channel::Ain6),
    adc_1_mux_n: Some(Channel::Ain7),
    ref_mux_p: Some(RefMuxPositive::ExternalAin4),
    ref_mux_n: Some(RefMuxNegative::ExternalAin5),
    adc_2_ref_mux: Some(Adc2RefMux::Internal2V5),
    ..ConfigureOptions::EMPTY
};

pub const RTD_ADC2: ConfigureOptions = ConfigureOptions {
    adc_2_mux_p: Some(Channel::Ain6),
    adc_2_mux_n: Some(Channel::Ain7),
    adc_2_ref_mux: Some(Adc2RefMux::Ain4Ain5),
    ref_mux_p: Some(RefMuxPositive::Internal2V5),
    ref_mux_n: Some(RefMuxNegative::Internal2V5),
    ..ConfigureOptions::EMPTY
};

pub const RTD_OFF: ConfigureOptions = ConfigureOptions {
    idac_1_mux: Some(IdacMux::NoConnection),
    idac_2_mux: Some(IdacMux::NoConnection),
    idac_1_mag: Some(IdacMag::Off),
    idac_2_mag: Some(IdacMag::Off),
    ref_mux_p: Some(RefMuxPositive::Internal2V5),
    ref_mux_n: Some(RefMuxNegative::Internal2V5),
    adc_2_ref_mux: Some(Adc2RefMux::Internal2V5),
    ..ConfigureOptions::EMPTY
};

/// The ADC-specific half of the RTD-on template
pub fn rtd_template(adc: AdcNum) -> &'static ConfigureOptions {
    match adc {
        AdcNum::Adc1 => &RTD_ADC1,
        AdcNum::Adc2 => &RTD_ADC2,
    }
}

/// Full register settings of RTD attached to `adc`
pub fn rtd_on(adc: AdcNum) -> ConfigureOptions {
    RTD_COMMON.merge(rtd_template(adc))
}

/// Properties that only `set_rtd` may change while RTD is on `adc`
pub fn rtd_reserved_properties(adc: AdcNum) -> Vec<Property> {
    rtd_on(adc).entries().into_iter()
        .map(|(property, _)| property)
        .collect()
}

/// Does every populated field of `template` match the register contents?
pub fn template_matches(map: &RegisterMap, template: &ConfigureOptions) -> Result<bool, Error> {
    for (property, setting) in template.entries() {
        if decode(property.descriptor(), map)?.setting != setting {
            return Ok(false);
        }
    }
    Ok(true)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RtdMode {
    On,
    Off,
    /// Neither template matches exactly
    Undefined,
}

impl fmt::Display for RtdMode {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        fmt.write_str(match self {
            RtdMode::On => "on",
            RtdMode::Off => "off",
            RtdMode::Undefined => "undefined",
        })
    }
}

/// Compare against both RTD-on candidates, then against RTD-off
pub fn infer_rtd(map: &RegisterMap) -> Result<(RtdMode, Option<AdcNum>), Error> {
    let mut matching = Vec::new();
    for &adc in [AdcNum::Adc1, AdcNum::Adc2].iter() {
        if template_matches(map, &rtd_on(adc))? {
            matching.push(adc);
        }
    }
    if let [adc] = matching[..] {
        return Ok((RtdMode::On, Some(adc)));
    }
    if template_matches(map, &RTD_OFF)? {
        return Ok((RtdMode::Off, None));
    }
    Ok((RtdMode::Undefined, None))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConverterState {
    pub conversion_mode: ConversionMode,
    pub data_rate: DataRate,
    pub mux_p: Channel,
    pub mux_n: Channel,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AdcState {
    pub adc_1: ConverterState,
    pub adc_2: ConverterState,
    pub filter_mode: FilterMode,
    pub status_byte_mode: StatusByte,
    pub checksum_mode: ChecksumMode,
    pub rtd_adc: Option<AdcNum>,
    pub rtd_mode: RtdMode,
}

impl AdcState {
    pub fn from_registers(map: &RegisterMap) -> Result<Self, Error> {
        let adc_1 = ConverterState {
            conversion_mode: decode_as(Property::ConversionMode, map)?,
            data_rate: decode_as(Property::Adc1DataRate, map)?,
            mux_p: decode_as(Property::Adc1MuxP, map)?,
            mux_n: decode_as(Property::Adc1MuxN, map)?,
        };
        let adc_2 = ConverterState {
            conversion_mode: ConversionMode::Continuous,
            data_rate: decode_as(Property::Adc2DataRate, map)?,
            mux_p: decode_as(Property::Adc2MuxP, map)?,
            mux_n: decode_as(Property::Adc2MuxN, map)?,
        };
        let (rtd_mode, rtd_adc) = infer_rtd(map)?;
        Ok(AdcState {
            adc_1,
            adc_2,
            filter_mode: decode_as(Property::Filter, map)?,
            status_byte_mode: decode_as(Property::StatusByte, map)?,
            checksum_mode: decode_as(Property::Checksum, map)?,
            rtd_adc,
            rtd_mode,
        })
    }

    pub fn converter(&self, adc: AdcNum) -> &ConverterState {
        match adc {
            AdcNum::Adc1 => &self.adc_1,
            AdcNum::Adc2 => &self.adc_2,
        }
    }

    /// RTD attached to some ADC. `Undefined` does not count.
    pub fn rtd_enabled(&self) -> bool {
        self.rtd_mode == RtdMode::On
    }

    /// Shape of the conversion frame `adc` returns in this state
    pub fn frame_layout(&self, adc: AdcNum) -> voltage::FrameLayout {
        voltage::FrameLayout::new(adc, self.status_byte_mode, self.checksum_mode)
    }
}

impl fmt::Display for AdcState {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        for &adc in [AdcNum::Adc1, AdcNum::Adc2].iter() {
            let converter = self.converter(adc);
            writeln!(fmt, "{}: {:?} {} {}-{}", adc,
                     converter.conversion_mode, converter.data_rate,
                     converter.mux_p, converter.mux_n)?;
        }
        writeln!(fmt, "filter: {}", self.filter_mode)?;
        writeln!(fmt, "status byte: {:?}, checksum: {}", self.status_byte_mode, self.checksum_mode)?;
        match self.rtd_adc {
            Some(adc) => write!(fmt, "RTD: {} on {}", self.rtd_mode, adc),
            None => write!(fmt, "RTD: {}", self.rtd_mode),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn configured(options: &ConfigureOptions) -> RegisterMap {
        let mut map = RegisterMap::reset_values();
        let opcodes = options.entries().into_iter()
            .map(|(property, setting)| encode(property.descriptor(), setting).unwrap())
            .collect::<Vec<_>>();
        map.apply_all(&opcodes).unwrap();
        map
    }

    #[test]
    fn reset_state() {
        let state = AdcState::from_registers(&RegisterMap::reset_values()).unwrap();
        assert_eq!(state.adc_1, ConverterState {
            conversion_mode: ConversionMode::Continuous,
            data_rate: DataRate::Adc1(Adc1DataRate::Sps20),
            mux_p: Channel::Ain0,
            mux_n: Channel::Ain1,
        });
        assert_eq!(state.adc_2.data_rate, DataRate::Adc2(Adc2DataRate::Sps10));
        assert_eq!(state.filter_mode, FilterMode::Fir);
        assert_eq!(state.status_byte_mode, StatusByte::On);
        assert_eq!(state.checksum_mode, ChecksumMode::Checksum);
        assert_eq!(state.rtd_mode, RtdMode::Off);
        assert_eq!(state.rtd_adc, None);
        assert!(!state.rtd_enabled());
    }

    #[test]
    fn pulse_mode_applies_to_adc1_only() {
        let map = configured(&ConfigureOptions {
            conversion_mode: Some(ConversionMode::Pulse),
            ..ConfigureOptions::EMPTY
        });
        let state = AdcState::from_registers(&map).unwrap();
        assert_eq!(state.adc_1.conversion_mode, ConversionMode::Pulse);
        assert_eq!(state.adc_2.conversion_mode, ConversionMode::Continuous);
    }

    #[test]
    fn rtd_on_either_adc_is_inferred() {
        for &adc in [AdcNum::Adc1, AdcNum::Adc2].iter() {
            let map = configured(&RTD_OFF.merge(&rtd_on(adc)));
            let state = AdcState::from_registers(&map).unwrap();
            assert_eq!(state.rtd_mode, RtdMode::On);
            assert_eq!(state.rtd_adc, Some(adc));
            assert!(state.rtd_enabled());
        }
    }

    #[test]
    fn partial_rtd_state_is_undefined() {
        let map = configured(&RTD_COMMON);
        let state = AdcState::from_registers(&map).unwrap();
        assert_eq!(state.rtd_mode, RtdMode::Undefined);
        assert_eq!(state.rtd_adc, None);
        assert!(!state.rtd_enabled());
    }

    #[test]
    fn rtd_reserved_properties_of_adc2() {
        let reserved = rtd_reserved_properties(AdcNum::Adc2);
        assert!(reserved.contains(&Property::Adc2MuxP));
        assert!(reserved.contains(&Property::Adc2RefMux));
        assert!(reserved.contains(&Property::Idac1Mag));
        assert!(!reserved.contains(&Property::Adc1MuxP));
        assert!(!reserved.contains(&Property::Filter));
    }

    #[test]
    fn corrupted_register_is_surfaced() {
        let mut map = RegisterMap::reset_values();
        map.apply(&OpCode::new(0xE0, Register::Mode1, 0xE0)).unwrap();
        assert_eq!(
            AdcState::from_registers(&map),
            Err(Error::UnknownPropertyValue { property: "filter mode", bits: 0xE0 })
        );
    }
}
