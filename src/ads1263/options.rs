use super::*;

/// A set of configuration changes. Only populated fields are applied.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ConfigureOptions {
    pub adc_1_mux_p: Option<Channel>,
    pub adc_1_mux_n: Option<Channel>,
    pub adc_2_mux_p: Option<Channel>,
    pub adc_2_mux_n: Option<Channel>,
    pub adc_1_data_rate: Option<Adc1DataRate>,
    pub adc_2_data_rate: Option<Adc2DataRate>,
    pub pga_mode: Option<PgaMode>,
    pub filter_mode: Option<FilterMode>,
    pub conversion_mode: Option<ConversionMode>,
    pub checksum_mode: Option<ChecksumMode>,
    pub status_byte: Option<StatusByte>,
    /// Clear `POWER.RESET` so that a later device reset can be detected
    pub reset_clear: bool,
    pub idac_1_mux: Option<IdacMux>,
    pub idac_2_mux: Option<IdacMux>,
    pub idac_1_mag: Option<IdacMag>,
    pub idac_2_mag: Option<IdacMag>,
    pub ref_mux_p: Option<RefMuxPositive>,
    pub ref_mux_n: Option<RefMuxNegative>,
    pub adc_2_ref_mux: Option<Adc2RefMux>,
}

impl ConfigureOptions {
    pub const EMPTY: ConfigureOptions = ConfigureOptions {
        adc_1_mux_p: None,
        adc_1_mux_n: None,
        adc_2_mux_p: None,
        adc_2_mux_n: None,
        adc_1_data_rate: None,
        adc_2_data_rate: None,
        pga_mode: None,
        filter_mode: None,
        conversion_mode: None,
        checksum_mode: None,
        status_byte: None,
        reset_clear: false,
        idac_1_mux: None,
        idac_2_mux: None,
        idac_1_mag: None,
        idac_2_mag: None,
        ref_mux_p: None,
        ref_mux_n: None,
        adc_2_ref_mux: None,
    };

    /// Mux assignment for one ADC
    pub fn mux(adc: AdcNum, mux_p: Channel, mux_n: Channel) -> Self {
        let mut options = ConfigureOptions::default();
        options.set_mux(adc, Some(mux_p), Some(mux_n));
        options
    }

    pub fn set_mux(&mut self, adc: AdcNum, mux_p: Option<Channel>, mux_n: Option<Channel>) {
        match adc {
            AdcNum::Adc1 => {
                self.adc_1_mux_p = mux_p;
                self.adc_1_mux_n = mux_n;
            }
            AdcNum::Adc2 => {
                self.adc_2_mux_p = mux_p;
                self.adc_2_mux_n = mux_n;
            }
        }
    }

    pub fn mux_request(&self, adc: AdcNum) -> (Option<Channel>, Option<Channel>) {
        match adc {
            AdcNum::Adc1 => (self.adc_1_mux_p, self.adc_1_mux_n),
            AdcNum::Adc2 => (self.adc_2_mux_p, self.adc_2_mux_n),
        }
    }

    /// The requested mux endpoints of both ADCs
    pub fn channels(&self) -> Vec<Channel> {
        [self.adc_1_mux_p, self.adc_1_mux_n, self.adc_2_mux_p, self.adc_2_mux_n]
            .iter()
            .filter_map(|channel| *channel)
            .collect()
    }

    /// Every populated field as a property/setting pair
    pub fn entries(&self) -> Vec<(Property, Setting)> {
        let reset_clear = if self.reset_clear { Some(ResetFlag::Clear) } else { None };
        let entries: [(Property, Option<Setting>); 19] = [
            (Property::Adc1MuxP, self.adc_1_mux_p.map(Setting::from)),
            (Property::Adc1MuxN, self.adc_1_mux_n.map(Setting::from)),
            (Property::Adc2MuxP, self.adc_2_mux_p.map(Setting::from)),
            (Property::Adc2MuxN, self.adc_2_mux_n.map(Setting::from)),
            (Property::Adc1DataRate, self.adc_1_data_rate.map(Setting::from)),
            (Property::Adc2DataRate, self.adc_2_data_rate.map(Setting::from)),
            (Property::PgaMode, self.pga_mode.map(Setting::from)),
            (Property::Filter, self.filter_mode.map(Setting::from)),
            (Property::ConversionMode, self.conversion_mode.map(Setting::from)),
            (Property::Checksum, self.checksum_mode.map(Setting::from)),
            (Property::StatusByte, self.status_byte.map(Setting::from)),
            (Property::ResetFlag, reset_clear.map(Setting::from)),
            (Property::Idac1Mux, self.idac_1_mux.map(Setting::from)),
            (Property::Idac2Mux, self.idac_2_mux.map(Setting::from)),
            (Property::Idac1Mag, self.idac_1_mag.map(Setting::from)),
            (Property::Idac2Mag, self.idac_2_mag.map(Setting::from)),
            (Property::RefMuxP, self.ref_mux_p.map(Setting::from)),
            (Property::RefMuxN, self.ref_mux_n.map(Setting::from)),
            (Property::Adc2RefMux, self.adc_2_ref_mux.map(Setting::from)),
        ];
        entries.iter()
            .filter_map(|&(property, setting)| setting.map(|setting| (property, setting)))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    /// Fields populated in `other` replace those of `self`
    pub fn merge(&self, other: &ConfigureOptions) -> ConfigureOptions {
        ConfigureOptions {
            adc_1_mux_p: other.adc_1_mux_p.or(self.adc_1_mux_p),
            adc_1_mux_n: other.adc_1_mux_n.or(self.adc_1_mux_n),
            adc_2_mux_p: other.adc_2_mux_p.or(self.adc_2_mux_p),
            adc_2_mux_n: other.adc_2_mux_n.or(self.adc_2_mux_n),
            adc_1_data_rate: other.adc_1_data_rate.or(self.adc_1_data_rate),
            adc_2_data_rate: other.adc_2_data_rate.or(self.adc_2_data_rate),
            pga_mode: other.pga_mode.or(self.pga_mode),
            filter_mode: other.filter_mode.or(self.filter_mode),
            conversion_mode: other.conversion_mode.or(self.conversion_mode),
            checksum_mode: other.checksum_mode.or(self.checksum_mode),
            status_byte: other.status_byte.or(self.status_byte),
            reset_clear: other.reset_clear || self.reset_clear,
            idac_1_mux: other.idac_1_mux.or(self.idac_1_mux),
            idac_2_mux: other.idac_2_mux.or(self.idac_2_mux),
            idac_1_mag: other.idac_1_mag.or(self.idac_1_mag),
            idac_2_mag: other.idac_2_mag.or(self.idac_2_mag),
            ref_mux_p: other.ref_mux_p.or(self.ref_mux_p),
            ref_mux_n: other.ref_mux_n.or(self.ref_mux_n),
            adc_2_ref_mux: other.adc_2_ref_mux.or(self.adc_2_ref_mux),
        }
    }
}
