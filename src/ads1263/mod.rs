//! ADS1263 register/configuration engine
//!
//! [Manual](https://www.ti.com/lit/ds/symlink/ads1263.pdf)

mod regs;
pub use regs::*;
mod checksum;
pub use checksum::*;
mod property;
pub use property::*;
pub mod mux;
mod state;
pub use state::*;
pub mod timing;
pub mod voltage;
pub use voltage::{CalibKey, CalibParam, CalibrationTable, DiffPair, InputMode};
mod options;
pub use options::*;
mod adc;
pub use adc::*;

use core::fmt;

/// Multiplexer inputs, as encoded in the `INPMUX`/`ADC2MUX` nibbles
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Channel {
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
    TemperatureSensor = 0xB,
    AnalogSupply = 0xC,
    DigitalSupply = 0xD,
    Tdac = 0xE,
    Float = 0xF,
}

impl Channel {
    /// Inputs shared by both converters without conflict
    pub fn is_shared(self) -> bool {
        match self {
            Channel::Float | Channel::AinCom => true,
            _ => false,
        }
    }

    /// Inputs wired to the RTD front-end
    pub fn is_rtd_reserved(self) -> bool {
        match self {
            Channel::Ain5 | Channel::Ain6 | Channel::Ain7 | Channel::Ain8 => true,
            _ => false,
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        fmt.write_str(match self {
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
            Channel::TemperatureSensor => "temperature sensor",
            Channel::AnalogSupply => "analog supply",
            Channel::DigitalSupply => "digital supply",
            Channel::Tdac => "TDAC",
            Channel::Float => "float",
        })
    }
}

/// The two converters of the ADS1263
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AdcNum {
    /// 32-bit main converter
    Adc1,
    /// 24-bit auxiliary converter, always free-running
    Adc2,
}

impl AdcNum {
    pub fn other(self) -> Self {
        match self {
            AdcNum::Adc1 => AdcNum::Adc2,
            AdcNum::Adc2 => AdcNum::Adc1,
        }
    }

    /// Data bytes in a conversion result
    pub fn data_bytes(self) -> usize {
        match self {
            AdcNum::Adc1 => 4,
            AdcNum::Adc2 => 3,
        }
    }

    pub fn start_command(self) -> Command {
        match self {
            AdcNum::Adc1 => Command::Start1,
            AdcNum::Adc2 => Command::Start2,
        }
    }

    pub fn stop_command(self) -> Command {
        match self {
            AdcNum::Adc1 => Command::Stop1,
            AdcNum::Adc2 => Command::Stop2,
        }
    }

    pub fn read_command(self) -> Command {
        match self {
            AdcNum::Adc1 => Command::ReadData1,
            AdcNum::Adc2 => Command::ReadData2,
        }
    }
}

impl fmt::Display for AdcNum {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        fmt.write_str(match self {
            AdcNum::Adc1 => "ADC1",
            AdcNum::Adc2 => "ADC2",
        })
    }
}

/// Everything that can go wrong inside the engine, independent of the bus
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("opcode value {value:#04x} sets bits outside mask {mask:#04x} of {register:?}")]
    OpCodeMask { register: Register, value: u8, mask: u8 },
    #[error("{property}: bits {bits:#04x} do not match any known setting")]
    UnknownPropertyValue { property: &'static str, bits: u8 },
    #[error("{property}: {setting:?} is not a valid setting")]
    UnsupportedSetting { property: &'static str, setting: Setting },
    #[error("{property} is reserved while RTD is enabled")]
    RtdEnabled { property: &'static str },
    #[error("RTD is not enabled")]
    RtdDisabled,
    #[error("{channel} is assigned more than once")]
    ChannelMapping { channel: Channel },
    #[error("{channel} is not available while RTD is enabled")]
    ChannelNotAvailable { channel: Channel },
    #[error("{mux_p}/{mux_n} is not a supported differential pair")]
    InvalidDifferentialPair { mux_p: Channel, mux_n: Channel },
    #[error("no calibration exists for a floating channel")]
    FloatingChannel,
    #[error("no calibration parameters for {0:?}")]
    MissingCalibration(CalibKey),
    #[error("{adc} mux negative may only be set together with mux positive")]
    MuxNegativeWithoutPositive { adc: AdcNum },
    #[error("{register:?} read back {actual:#04x}, expected {expected:#04x}")]
    RegisterUpdate { register: Register, expected: u8, actual: u8 },
    #[error("checksum mismatch: calculated {expected:#04x}, received {received:#04x}")]
    ChecksumMismatch { expected: u8, received: u8 },
    #[error("expected {expected} bytes, got {actual}")]
    FrameLength { expected: usize, actual: usize },
    #[error("ADC1 must be in continuous conversion mode")]
    ContinuousMode,
    #[error("no conversion delay is specified for {rate} with {filter} filter")]
    ConversionTiming { rate: DataRate, filter: FilterMode },
}

/// Errors from an [`Adc`] operation
#[derive(Debug, thiserror::Error)]
pub enum AdcError<SPI> {
    #[error("SPI transfer failed: {0:?}")]
    SPI(SPI),
    #[error(transparent)]
    Device(#[from] Error),
}
