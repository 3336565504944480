//! Declarative mapping between register bits and configuration settings
//!
//! Every configurable concept has one static [`PropertyDescriptor`]. Both
//! [`decode`] and [`encode`] walk the same variant table, so a setting read
//! from the device always encodes back to the bits it was read from.

use core::convert::TryFrom;
use core::fmt;

use super::*;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ConversionMode {
    Continuous = 0,
    Pulse = 1,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Adc1DataRate {
    Sps2p5 = 0x0,
    Sps5 = 0x1,
    Sps10 = 0x2,
    Sps16p6 = 0x3,
    Sps20 = 0x4,
    Sps50 = 0x5,
    Sps60 = 0x6,
    Sps100 = 0x7,
    Sps400 = 0x8,
    Sps1200 = 0x9,
    Sps2400 = 0xA,
    Sps4800 = 0xB,
    Sps7200 = 0xC,
    Sps14400 = 0xD,
    Sps19200 = 0xE,
    Sps38400 = 0xF,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Adc2DataRate {
    Sps10 = 0b00,
    Sps100 = 0b01,
    Sps400 = 0b10,
    Sps800 = 0b11,
}

/// A data rate together with the converter it belongs to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DataRate {
    Adc1(Adc1DataRate),
    Adc2(Adc2DataRate),
}

impl DataRate {
    pub fn adc(&self) -> AdcNum {
        match self {
            DataRate::Adc1(_) => AdcNum::Adc1,
            DataRate::Adc2(_) => AdcNum::Adc2,
        }
    }
}

impl fmt::Display for DataRate {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        let descriptor = match self {
            DataRate::Adc1(_) => Property::Adc1DataRate.descriptor(),
            DataRate::Adc2(_) => Property::Adc2DataRate.descriptor(),
        };
        let setting = Setting::from(*self);
        match descriptor.variants.iter().find(|variant| variant.value.setting == setting) {
            Some(variant) => write!(fmt, "{} {}", self.adc(), variant.value.display),
            None => write!(fmt, "{:?}", self),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FilterMode {
    Sinc1 = 0b000,
    Sinc2 = 0b001,
    Sinc3 = 0b010,
    Sinc4 = 0b011,
    Fir = 0b100,
}

impl fmt::Display for FilterMode {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        fmt.write_str(match self {
            FilterMode::Sinc1 => "SINC1",
            FilterMode::Sinc2 => "SINC2",
            FilterMode::Sinc3 => "SINC3",
            FilterMode::Sinc4 => "SINC4",
            FilterMode::Fir => "FIR",
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum StatusByte {
    Off = 0,
    On = 1,
}

/// IDAC output pin
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum IdacMux {
    Ain0 = 0x0,
    Ain1 = 0x1,
    Ain2 = 0x2,
    Ain3 = 0x3,
    Ain4 = 0x4,
    Ain5 = 0x5,
    Ain6 = 0x6,
    Ain7 = 0x7,
    Ain8 = 0x8,
    Ain9 = 0x9,
    AinCom = 0xA,
    NoConnection = 0xB,
}

/// IDAC current
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum IdacMag {
    Off = 0x0,
    Ua50 = 0x1,
    Ua100 = 0x2,
    Ua250 = 0x3,
    Ua500 = 0x4,
    Ua750 = 0x5,
    Ua1000 = 0x6,
    Ua1500 = 0x7,
    Ua2000 = 0x8,
    Ua2500 = 0x9,
    Ua3000 = 0xA,
}

/// ADC1 positive reference input
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum RefMuxPositive {
    Internal2V5 = 0b000,
    ExternalAin0 = 0b001,
    ExternalAin2 = 0b010,
    ExternalAin4 = 0b011,
    InternalAvdd = 0b100,
}

/// ADC1 negative reference input
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum RefMuxNegative {
    Internal2V5 = 0b000,
    ExternalAin1 = 0b001,
    ExternalAin3 = 0b010,
    ExternalAin5 = 0b011,
    InternalAvss = 0b100,
}

/// ADC2 reference input pair
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Adc2RefMux {
    Internal2V5 = 0b000,
    Ain0Ain1 = 0b001,
    Ain2Ain3 = 0b010,
    Ain4Ain5 = 0b011,
    AvddAvss = 0b100,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PgaMode {
    Enabled = 0,
    Bypassed = 1,
}

/// `POWER.RESET`, set by the device after a reset
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ResetFlag {
    Clear = 0,
    Set = 1,
}

/// A decoded setting, tagged with its kind
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Setting {
    ConversionMode(ConversionMode),
    DataRate(DataRate),
    Channel(Channel),
    Filter(FilterMode),
    Checksum(ChecksumMode),
    StatusByte(StatusByte),
    IdacMux(IdacMux),
    IdacMag(IdacMag),
    RefPositive(RefMuxPositive),
    RefNegative(RefMuxNegative),
    Adc2Ref(Adc2RefMux),
    Pga(PgaMode),
    Reset(ResetFlag),
}

macro_rules! impl_setting {
    ($Type: ty, $Variant: ident) => {
        impl From<$Type> for Setting {
            fn from(value: $Type) -> Self {
                Setting::$Variant(value)
            }
        }

        impl TryFrom<Setting> for $Type {
            type Error = Setting;
            fn try_from(setting: Setting) -> Result<Self, Setting> {
                match setting {
                    Setting::$Variant(value) => Ok(value),
                    other => Err(other),
                }
            }
        }
    };
}

impl_setting!(ConversionMode, ConversionMode);
impl_setting!(DataRate, DataRate);
impl_setting!(Channel, Channel);
impl_setting!(FilterMode, Filter);
impl_setting!(ChecksumMode, Checksum);
impl_setting!(StatusByte, StatusByte);
impl_setting!(IdacMux, IdacMux);
impl_setting!(IdacMag, IdacMag);
impl_setting!(RefMuxPositive, RefPositive);
impl_setting!(RefMuxNegative, RefNegative);
impl_setting!(Adc2RefMux, Adc2Ref);
impl_setting!(PgaMode, Pga);
impl_setting!(ResetFlag, Reset);

impl From<Adc1DataRate> for Setting {
    fn from(rate: Adc1DataRate) -> Self {
        Setting::DataRate(DataRate::Adc1(rate))
    }
}

impl From<Adc2DataRate> for Setting {
    fn from(rate: Adc2DataRate) -> Self {
        Setting::DataRate(DataRate::Adc2(rate))
    }
}

/// A user-facing value paired with the setting it stands for
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SemanticValue {
    pub display: &'static str,
    pub setting: Setting,
}

#[derive(Debug)]
pub struct Variant {
    /// Raw bits, already shifted into place under the descriptor mask
    pub bits: u8,
    pub value: SemanticValue,
}

#[derive(Debug)]
pub struct PropertyDescriptor {
    pub name: &'static str,
    pub address: Register,
    pub mask: u8,
    pub variants: &'static [Variant],
}

const fn adc1_rate(rate: Adc1DataRate) -> Setting {
    Setting::DataRate(DataRate::Adc1(rate))
}

const fn adc2_rate(rate: Adc2DataRate) -> Setting {
    Setting::DataRate(DataRate::Adc2(rate))
}

macro_rules! variants {
    ($shift: expr, $wrap: expr, [$($value: expr => $display: expr),* $(,)?]) => {
        &[$(Variant {
            bits: ($value as u8) << $shift,
            value: SemanticValue {
                display: $display,
                setting: $wrap($value),
            },
        }),*]
    };
}

macro_rules! channel_variants {
    ($shift: expr) => {
        variants!($shift, Setting::Channel, [
            Channel::Ain0 => "AIN0",
            Channel::Ain1 => "AIN1",
            Channel::Ain2 => "AIN2",
            Channel::Ain3 => "AIN3",
            Channel::Ain4 => "AIN4",
            Channel::Ain5 => "AIN5",
            Channel::Ain6 => "AIN6",
            Channel::Ain7 => "AIN7",
            Channel::Ain8 => "AIN8",
            Channel::Ain9 => "AIN9",
            Channel::AinCom => "AINCOM",
            Channel::TemperatureSensor => "temperature sensor monitor",
            Channel::AnalogSupply => "analog power supply monitor",
            Channel::DigitalSupply => "digital power supply monitor",
            Channel::Tdac => "TDAC test signal",
            Channel::Float => "float",
        ])
    };
}

macro_rules! idac_mux_variants {
    ($shift: expr) => {
        variants!($shift, Setting::IdacMux, [
            IdacMux::Ain0 => "AIN0",
            IdacMux::Ain1 => "AIN1",
            IdacMux::Ain2 => "AIN2",
            IdacMux::Ain3 => "AIN3",
            IdacMux::Ain4 => "AIN4",
            IdacMux::Ain5 => "AIN5",
            IdacMux::Ain6 => "AIN6",
            IdacMux::Ain7 => "AIN7",
            IdacMux::Ain8 => "AIN8",
            IdacMux::Ain9 => "AIN9",
            IdacMux::AinCom => "AINCOM",
            IdacMux::NoConnection => "no connection",
        ])
    };
}

// Datasheet IDACMAG encoding, one raw pattern per magnitude. Whether the
// board reads back 100 uA and above as off awaits hardware confirmation.
macro_rules! idac_mag_variants {
    ($shift: expr) => {
        variants!($shift, Setting::IdacMag, [
            IdacMag::Off => "off",
            IdacMag::Ua50 => "50 uA",
            IdacMag::Ua100 => "100 uA",
            IdacMag::Ua250 => "250 uA",
            IdacMag::Ua500 => "500 uA",
            IdacMag::Ua750 => "750 uA",
            IdacMag::Ua1000 => "1000 uA",
            IdacMag::Ua1500 => "1500 uA",
            IdacMag::Ua2000 => "2000 uA",
            IdacMag::Ua2500 => "2500 uA",
            IdacMag::Ua3000 => "3000 uA",
        ])
    };
}

pub static CONVERSION_MODE: PropertyDescriptor = PropertyDescriptor {
    name: "conversion mode",
    address: Register::Mode0,
    mask: 0b0100_0000,
    variants: variants!(6, Setting::ConversionMode, [
        ConversionMode::Continuous => "continuous",
        ConversionMode::Pulse => "pulse",
    ]),
};

pub static ADC1_DATA_RATE: PropertyDescriptor = PropertyDescriptor {
    name: "ADC1 data rate",
    address: Register::Mode2,
    mask: 0b0000_1111,
    variants: variants!(0, adc1_rate, [
        Adc1DataRate::Sps2p5 => "2.5 SPS",
        Adc1DataRate::Sps5 => "5 SPS",
        Adc1DataRate::Sps10 => "10 SPS",
        Adc1DataRate::Sps16p6 => "16.6 SPS",
        Adc1DataRate::Sps20 => "20 SPS",
        Adc1DataRate::Sps50 => "50 SPS",
        Adc1DataRate::Sps60 => "60 SPS",
        Adc1DataRate::Sps100 => "100 SPS",
        Adc1DataRate::Sps400 => "400 SPS",
        Adc1DataRate::Sps1200 => "1200 SPS",
        Adc1DataRate::Sps2400 => "2400 SPS",
        Adc1DataRate::Sps4800 => "4800 SPS",
        Adc1DataRate::Sps7200 => "7200 SPS",
        Adc1DataRate::Sps14400 => "14400 SPS",
        Adc1DataRate::Sps19200 => "19200 SPS",
        Adc1DataRate::Sps38400 => "38400 SPS",
    ]),
};

pub static ADC2_DATA_RATE: PropertyDescriptor = PropertyDescriptor {
    name: "ADC2 data rate",
    address: Register::Adc2Cfg,
    mask: 0b1100_0000,
    variants: variants!(6, adc2_rate, [
        Adc2DataRate::Sps10 => "10 SPS",
        Adc2DataRate::Sps100 => "100 SPS",
        Adc2DataRate::Sps400 => "400 SPS",
        Adc2DataRate::Sps800 => "800 SPS",
    ]),
};

pub static ADC1_MUX_P: PropertyDescriptor = PropertyDescriptor {
    name: "ADC1 mux positive",
    address: Register::InpMux,
    mask: 0b1111_0000,
    variants: channel_variants!(4),
};

pub static ADC1_MUX_N: PropertyDescriptor = PropertyDescriptor {
    name: "ADC1 mux negative",
    address: Register::InpMux,
    mask: 0b0000_1111,
    variants: channel_variants!(0),
};

pub static ADC2_MUX_P: PropertyDescriptor = PropertyDescriptor {
    name: "ADC2 mux positive",
    address: Register::Adc2Mux,
    mask: 0b1111_0000,
    variants: channel_variants!(4),
};

pub static ADC2_MUX_N: PropertyDescriptor = PropertyDescriptor {
    name: "ADC2 mux negative",
    address: Register::Adc2Mux,
    mask: 0b0000_1111,
    variants: channel_variants!(0),
};

pub static FILTER_MODE: PropertyDescriptor = PropertyDescriptor {
    name: "filter mode",
    address: Register::Mode1,
    mask: 0b1110_0000,
    variants: variants!(5, Setting::Filter, [
        FilterMode::Sinc1 => "SINC1",
        FilterMode::Sinc2 => "SINC2",
        FilterMode::Sinc3 => "SINC3",
        FilterMode::Sinc4 => "SINC4",
        FilterMode::Fir => "FIR",
    ]),
};

pub static CHECKSUM_MODE: PropertyDescriptor = PropertyDescriptor {
    name: "checksum mode",
    address: Register::Interface,
    mask: 0b0000_0011,
    variants: variants!(0, Setting::Checksum, [
        ChecksumMode::Off => "off",
        ChecksumMode::Checksum => "checksum",
        ChecksumMode::Crc => "CRC",
    ]),
};

pub static STATUS_BYTE: PropertyDescriptor = PropertyDescriptor {
    name: "status byte",
    address: Register::Interface,
    mask: 0b0000_0100,
    variants: variants!(2, Setting::StatusByte, [
        StatusByte::Off => "off",
        StatusByte::On => "on",
    ]),
};

pub static IDAC1_MUX: PropertyDescriptor = PropertyDescriptor {
    name: "IDAC1 mux",
    address: Register::IdacMux,
    mask: 0b0000_1111,
    variants: idac_mux_variants!(0),
};

pub static IDAC2_MUX: PropertyDescriptor = PropertyDescriptor {
    name: "IDAC2 mux",
    address: Register::IdacMux,
    mask: 0b1111_0000,
    variants: idac_mux_variants!(4),
};

pub static IDAC1_MAG: PropertyDescriptor = PropertyDescriptor {
    name: "IDAC1 magnitude",
    address: Register::IdacMag,
    mask: 0b0000_1111,
    variants: idac_mag_variants!(0),
};

pub static IDAC2_MAG: PropertyDescriptor = PropertyDescriptor {
    name: "IDAC2 magnitude",
    address: Register::IdacMag,
    mask: 0b1111_0000,
    variants: idac_mag_variants!(4),
};

pub static REF_MUX_P: PropertyDescriptor = PropertyDescriptor {
    name: "reference mux positive",
    address: Register::RefMux,
    mask: 0b0011_1000,
    variants: variants!(3, Setting::RefPositive, [
        RefMuxPositive::Internal2V5 => "internal 2.5 V",
        RefMuxPositive::ExternalAin0 => "external AIN0",
        RefMuxPositive::ExternalAin2 => "external AIN2",
        RefMuxPositive::ExternalAin4 => "external AIN4",
        RefMuxPositive::InternalAvdd => "internal AVDD",
    ]),
};

pub static REF_MUX_N: PropertyDescriptor = PropertyDescriptor {
    name: "reference mux negative",
    address: Register::RefMux,
    mask: 0b0000_0111,
    variants: variants!(0, Setting::RefNegative, [
        RefMuxNegative::Internal2V5 => "internal 2.5 V",
        RefMuxNegative::ExternalAin1 => "external AIN1",
        RefMuxNegative::ExternalAin3 => "external AIN3",
        RefMuxNegative::ExternalAin5 => "external AIN5",
        RefMuxNegative::InternalAvss => "internal AVSS",
    ]),
};

pub static ADC2_REF_MUX: PropertyDescriptor = PropertyDescriptor {
    name: "ADC2 reference mux",
    address: Register::Adc2Cfg,
    mask: 0b0011_1000,
    variants: variants!(3, Setting::Adc2Ref, [
        Adc2RefMux::Internal2V5 => "internal 2.5 V",
        Adc2RefMux::Ain0Ain1 => "external AIN0/AIN1",
        Adc2RefMux::Ain2Ain3 => "external AIN2/AIN3",
        Adc2RefMux::Ain4Ain5 => "external AIN4/AIN5",
        Adc2RefMux::AvddAvss => "internal AVDD/AVSS",
    ]),
};

pub static PGA_MODE: PropertyDescriptor = PropertyDescriptor {
    name: "PGA mode",
    address: Register::Mode2,
    mask: 0b1000_0000,
    variants: variants!(7, Setting::Pga, [
        PgaMode::Enabled => "enabled",
        PgaMode::Bypassed => "bypassed",
    ]),
};

pub static RESET_FLAG: PropertyDescriptor = PropertyDescriptor {
    name: "reset flag",
    address: Register::Power,
    mask: 0b0001_0000,
    variants: variants!(4, Setting::Reset, [
        ResetFlag::Clear => "clear",
        ResetFlag::Set => "set",
    ]),
};

/// Names every configurable concept
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Property {
    ConversionMode,
    Adc1DataRate,
    Adc2DataRate,
    Adc1MuxP,
    Adc1MuxN,
    Adc2MuxP,
    Adc2MuxN,
    Filter,
    Checksum,
    StatusByte,
    Idac1Mux,
    Idac2Mux,
    Idac1Mag,
    Idac2Mag,
    RefMuxP,
    RefMuxN,
    Adc2RefMux,
    PgaMode,
    ResetFlag,
}

impl Property {
    pub const ALL: [Property; 19] = [
        Property::ConversionMode,
        Property::Adc1DataRate,
        Property::Adc2DataRate,
        Property::Adc1MuxP,
        Property::Adc1MuxN,
        Property::Adc2MuxP,
        Property::Adc2MuxN,
        Property::Filter,
        Property::Checksum,
        Property::StatusByte,
        Property::Idac1Mux,
        Property::Idac2Mux,
        Property::Idac1Mag,
        Property::Idac2Mag,
        Property::RefMuxP,
        Property::RefMuxN,
        Property::Adc2RefMux,
        Property::PgaMode,
        Property::ResetFlag,
    ];

    pub fn descriptor(self) -> &'static PropertyDescriptor {
        match self {
            Property::ConversionMode => &CONVERSION_MODE,
            Property::Adc1DataRate => &ADC1_DATA_RATE,
            Property::Adc2DataRate => &ADC2_DATA_RATE,
            Property::Adc1MuxP => &ADC1_MUX_P,
            Property::Adc1MuxN => &ADC1_MUX_N,
            Property::Adc2MuxP => &ADC2_MUX_P,
            Property::Adc2MuxN => &ADC2_MUX_N,
            Property::Filter => &FILTER_MODE,
            Property::Checksum => &CHECKSUM_MODE,
            Property::StatusByte => &STATUS_BYTE,
            Property::Idac1Mux => &IDAC1_MUX,
            Property::Idac2Mux => &IDAC2_MUX,
            Property::Idac1Mag => &IDAC1_MAG,
            Property::Idac2Mag => &IDAC2_MAG,
            Property::RefMuxP => &REF_MUX_P,
            Property::RefMuxN => &REF_MUX_N,
            Property::Adc2RefMux => &ADC2_REF_MUX,
            Property::PgaMode => &PGA_MODE,
            Property::ResetFlag => &RESET_FLAG,
        }
    }

    pub fn name(self) -> &'static str {
        self.descriptor().name
    }

    /// Multiplexer assignments are resolved separately from the other properties
    pub fn is_mux(self) -> bool {
        match self {
            Property::Adc1MuxP | Property::Adc1MuxN |
            Property::Adc2MuxP | Property::Adc2MuxN => true,
            _ => false,
        }
    }
}

/// Look up the masked register bits in the descriptor's variant table
pub fn decode(descriptor: &PropertyDescriptor, map: &RegisterMap) -> Result<SemanticValue, Error> {
    let bits = map.get(descriptor.address) & descriptor.mask;
    descriptor.variants.iter()
        .find(|variant| variant.bits == bits)
        .map(|variant| variant.value)
        .ok_or(Error::UnknownPropertyValue { property: descriptor.name, bits })
}

/// The opcode that writes `setting` into the descriptor's bits
pub fn encode(descriptor: &PropertyDescriptor, setting: Setting) -> Result<OpCode, Error> {
    descriptor.variants.iter()
        .find(|variant| variant.value.setting == setting)
        .map(|variant| OpCode::new(variant.bits, descriptor.address, descriptor.mask))
        .ok_or(Error::UnsupportedSetting { property: descriptor.name, setting })
}

/// [`decode`] into the concrete setting type
pub fn decode_as<T: TryFrom<Setting>>(property: Property, map: &RegisterMap) -> Result<T, Error> {
    let value = decode(property.descriptor(), map)?;
    T::try_from(value.setting)
        .map_err(|_| Error::UnsupportedSetting { property: property.name(), setting: value.setting })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn map_with(reg: Register, value: u8) -> RegisterMap {
        let mut map = RegisterMap::reset_values();
        map.apply(&OpCode::new(value, reg, 0xFF)).unwrap();
        map
    }

    #[test]
    fn variants_fit_their_masks() {
        for property in Property::ALL.iter() {
            let descriptor = property.descriptor();
            for variant in descriptor.variants {
                assert_eq!(variant.bits & !descriptor.mask, 0, "{}: {:?}", descriptor.name, variant);
            }
        }
    }

    #[test]
    fn variant_bits_and_settings_are_unique() {
        for property in Property::ALL.iter() {
            let variants = property.descriptor().variants;
            for (i, a) in variants.iter().enumerate() {
                for b in &variants[i + 1..] {
                    assert_ne!(a.bits, b.bits);
                    assert_ne!(a.value.setting, b.value.setting);
                }
            }
        }
    }

    #[test]
    fn reset_values_decode() {
        let map = RegisterMap::reset_values();
        for property in Property::ALL.iter() {
            assert!(decode(property.descriptor(), &map).is_ok(), "{:?}", property);
        }
        assert_eq!(decode_as::<FilterMode>(Property::Filter, &map), Ok(FilterMode::Fir));
        assert_eq!(
            decode_as::<DataRate>(Property::Adc1DataRate, &map),
            Ok(DataRate::Adc1(Adc1DataRate::Sps20))
        );
        assert_eq!(decode_as::<Channel>(Property::Adc1MuxP, &map), Ok(Channel::Ain0));
        assert_eq!(decode_as::<Channel>(Property::Adc1MuxN, &map), Ok(Channel::Ain1));
        assert_eq!(decode_as::<IdacMux>(Property::Idac2Mux, &map), Ok(IdacMux::NoConnection));
        assert_eq!(decode_as::<ResetFlag>(Property::ResetFlag, &map), Ok(ResetFlag::Set));
    }

    #[test]
    fn reserved_filter_bits_are_reported() {
        let map = map_with(Register::Mode1, 0b1110_0000);
        assert_eq!(
            decode(&FILTER_MODE, &map),
            Err(Error::UnknownPropertyValue { property: "filter mode", bits: 0b1110_0000 })
        );
    }

    #[test]
    fn reserved_idac_magnitude_is_reported() {
        let map = map_with(Register::IdacMag, 0xB0);
        assert!(decode(&IDAC2_MAG, &map).is_err());
        assert_eq!(decode_as::<IdacMag>(Property::Idac1Mag, &map), Ok(IdacMag::Off));
    }

    #[test]
    fn idac_magnitudes_decode_distinctly() {
        let map = map_with(Register::IdacMag, 0x43);
        assert_eq!(decode_as::<IdacMag>(Property::Idac1Mag, &map), Ok(IdacMag::Ua250));
        assert_eq!(decode_as::<IdacMag>(Property::Idac2Mag, &map), Ok(IdacMag::Ua500));
    }

    #[test]
    fn encode_uses_descriptor_position() {
        assert_eq!(
            encode(&ADC2_MUX_P, Channel::Ain3.into()),
            Ok(OpCode::new(0x30, Register::Adc2Mux, 0xF0))
        );
        assert_eq!(
            encode(&REF_MUX_P, RefMuxPositive::ExternalAin4.into()),
            Ok(OpCode::new(0b0001_1000, Register::RefMux, 0b0011_1000))
        );
        assert_eq!(
            encode(&CONVERSION_MODE, ConversionMode::Pulse.into()),
            Ok(OpCode::new(0x40, Register::Mode0, 0x40))
        );
    }

    #[test]
    fn encode_rejects_foreign_setting() {
        assert_eq!(
            encode(&FILTER_MODE, Adc2DataRate::Sps10.into()),
            Err(Error::UnsupportedSetting {
                property: "filter mode",
                setting: Setting::DataRate(DataRate::Adc2(Adc2DataRate::Sps10)),
            })
        );
    }

    #[test]
    fn data_rate_display() {
        assert_eq!(DataRate::Adc1(Adc1DataRate::Sps16p6).to_string(), "ADC1 16.6 SPS");
        assert_eq!(DataRate::Adc2(Adc2DataRate::Sps800).to_string(), "ADC2 800 SPS");
    }

    fn property_and_variant() -> impl Strategy<Value = (Property, usize)> {
        (0..Property::ALL.len()).prop_flat_map(|i| {
            let property = Property::ALL[i];
            (Just(property), 0..property.descriptor().variants.len())
        })
    }

    proptest! {
        #[test]
        fn decode_then_encode_round_trips(
            (property, index) in property_and_variant(),
            background in any::<u8>(),
        ) {
            let descriptor = property.descriptor();
            let bits = descriptor.variants[index].bits;
            let map = map_with(descriptor.address, (background & !descriptor.mask) | bits);
            let value = decode(descriptor, &map).unwrap();
            let opcode = encode(descriptor, value.setting).unwrap();
            prop_assert_eq!(opcode.value, map.get(descriptor.address) & descriptor.mask);
            prop_assert_eq!(opcode.mask, descriptor.mask);
            prop_assert_eq!(opcode.address, descriptor.address);
        }
    }
}
