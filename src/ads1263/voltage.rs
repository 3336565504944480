//! Conversion codes to calibrated voltage and temperature

use std::collections::HashMap;
use byteorder::{BigEndian, ByteOrder};

use super::{AdcNum, Channel, Checksum, ChecksumMode, Error, Status, StatusByte};

/// Front-end divider, ohms
pub const DIVIDER_R1: f64 = 19_100.0;
pub const DIVIDER_R2: f64 = 4_990.0;
pub const REFERENCE_VOLTAGE: f64 = 2.5;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputMode {
    /// Measured against `AINCOM`
    SingleEnded,
    Differential,
}

impl InputMode {
    pub fn from_mux_n(mux_n: Channel) -> Self {
        match mux_n {
            Channel::AinCom => InputMode::SingleEnded,
            _ => InputMode::Differential,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CalibParam {
    pub gain: f64,
    pub offset: f64,
}

impl CalibParam {
    pub const UNITY: CalibParam = CalibParam { gain: 1.0, offset: 0.0 };

    pub fn apply(&self, value: f64) -> f64 {
        value * self.gain + self.offset
    }
}

impl Default for CalibParam {
    fn default() -> Self {
        CalibParam::UNITY
    }
}

/// The supported differential input pairs
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DiffPair {
    Ain0Ain1,
    Ain2Ain3,
    Ain4Ain5,
    Ain6Ain7,
}

impl DiffPair {
    pub const ALL: [DiffPair; 4] = [
        DiffPair::Ain0Ain1,
        DiffPair::Ain2Ain3,
        DiffPair::Ain4Ain5,
        DiffPair::Ain6Ain7,
    ];

    pub fn channels(self) -> (Channel, Channel) {
        match self {
            DiffPair::Ain0Ain1 => (Channel::Ain0, Channel::Ain1),
            DiffPair::Ain2Ain3 => (Channel::Ain2, Channel::Ain3),
            DiffPair::Ain4Ain5 => (Channel::Ain4, Channel::Ain5),
            DiffPair::Ain6Ain7 => (Channel::Ain6, Channel::Ain7),
        }
    }

    pub fn from_channels(mux_p: Channel, mux_n: Channel) -> Result<Self, Error> {
        DiffPair::ALL.iter()
            .cloned()
            .find(|pair| pair.channels() == (mux_p, mux_n))
            .ok_or(Error::InvalidDifferentialPair { mux_p, mux_n })
    }
}

/// Identifies one set of calibration parameters
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CalibKey {
    Channel(Channel),
    Diff(DiffPair),
    Rtd,
}

/// Gain and offset per input, read from the board EEPROM by the caller
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CalibrationTable {
    params: HashMap<CalibKey, CalibParam>,
}

impl CalibrationTable {
    pub fn new() -> Self {
        CalibrationTable::default()
    }

    /// Gain 1, offset 0 for every single-ended input, pair and the RTD
    pub fn unity() -> Self {
        let channels = [
            Channel::Ain0, Channel::Ain1, Channel::Ain2, Channel::Ain3, Channel::Ain4,
            Channel::Ain5, Channel::Ain6, Channel::Ain7, Channel::Ain8, Channel::Ain9,
        ];
        let keys = channels.iter().map(|&channel| CalibKey::Channel(channel))
            .chain(DiffPair::ALL.iter().map(|&pair| CalibKey::Diff(pair)))
            .chain(Some(CalibKey::Rtd));
        let mut table = CalibrationTable::new();
        for key in keys {
            table.insert(key, CalibParam::UNITY);
        }
        table
    }

    pub fn insert(&mut self, key: CalibKey, param: CalibParam) -> Option<CalibParam> {
        self.params.insert(key, param)
    }

    pub fn lookup(&self, key: CalibKey) -> Result<CalibParam, Error> {
        self.params.get(&key)
            .cloned()
            .ok_or(Error::MissingCalibration(key))
    }
}

/// Which calibration entry a mux assignment uses
pub fn calibration_key(mux_p: Channel, mux_n: Channel) -> Result<CalibKey, Error> {
    if mux_p == Channel::Float || mux_n == Channel::Float {
        return Err(Error::FloatingChannel);
    }
    match InputMode::from_mux_n(mux_n) {
        InputMode::SingleEnded => Ok(CalibKey::Channel(mux_p)),
        InputMode::Differential => DiffPair::from_channels(mux_p, mux_n).map(CalibKey::Diff),
    }
}

pub fn select_calibration(table: &CalibrationTable, mux_p: Channel, mux_n: Channel) -> Result<CalibParam, Error> {
    table.lookup(calibration_key(mux_p, mux_n)?)
}

/// Reference and front-end divider of the board inputs
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VoltageScale {
    pub reference_voltage: f64,
    /// Terminal voltage per ADC input volt
    pub step_up_ratio: f64,
}

impl VoltageScale {
    pub fn from_divider(reference_voltage: f64, r1: f64, r2: f64) -> Self {
        VoltageScale {
            reference_voltage,
            step_up_ratio: (r1 + r2) / r2,
        }
    }
}

impl Default for VoltageScale {
    fn default() -> Self {
        VoltageScale::from_divider(REFERENCE_VOLTAGE, DIVIDER_R1, DIVIDER_R2)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RtdSensor {
    /// Ohms
    pub reference_resistance: f64,
    /// Ohms at 0 °C
    pub nominal_resistance: f64,
    /// Ohms per °C
    pub resistance_per_degree: f64,
}

impl Default for RtdSensor {
    /// PT100 against the on-board reference resistor
    fn default() -> Self {
        RtdSensor {
            reference_resistance: 1326.2,
            nominal_resistance: 100.0,
            resistance_per_degree: 0.385,
        }
    }
}

fn read_code(raw: &[u8], num_data_bytes: usize) -> Result<u64, Error> {
    if num_data_bytes == 0 || num_data_bytes > 4 || raw.len() < num_data_bytes {
        return Err(Error::FrameLength { expected: num_data_bytes, actual: raw.len() });
    }
    Ok(BigEndian::read_uint(&raw[..num_data_bytes], num_data_bytes))
}

/// Sign-extend a `bits`-wide conversion code
fn signed_code(code: u64, bits: u32, mode: InputMode) -> i64 {
    let sign = 1u64 << (bits - 1);
    match mode {
        InputMode::Differential => {
            if code & sign != 0 {
                code as i64 - (1i64 << bits)
            } else {
                code as i64
            }
        }
        InputMode::SingleEnded => {
            // Offset around the per-converter upper limit
            let upper_limit = sign as i64;
            let magnitude = (code & (sign - 1)) as i64;
            if code & sign != 0 {
                magnitude - upper_limit
            } else {
                magnitude
            }
        }
    }
}

/// ADC input voltage of a signed code
fn input_voltage(code: i64, reference_voltage: f64, bits: u32) -> f64 {
    code as f64 * (reference_voltage / (1u64 << (bits - 1)) as f64)
}

/// Terminal voltage of the first `num_data_bytes` of `raw`
pub fn decode_voltage(
    raw: &[u8],
    num_data_bytes: usize,
    calib: CalibParam,
    mode: InputMode,
    scale: &VoltageScale,
) -> Result<f64, Error> {
    let bits = 8 * num_data_bytes as u32;
    let code = signed_code(read_code(raw, num_data_bytes)?, bits, mode);
    let v_in = input_voltage(code, scale.reference_voltage, bits);
    Ok(calib.apply(v_in * scale.step_up_ratio))
}

/// Ratiometric RTD reading to °C
pub fn decode_rtd_temperature(
    raw: &[u8],
    sensor: &RtdSensor,
    adc: AdcNum,
    calib: CalibParam,
) -> Result<f64, Error> {
    let code = read_code(raw, adc.data_bytes())?;
    let full_scale = match adc {
        AdcNum::Adc1 => (1u64 << 30) as f64,
        AdcNum::Adc2 => (1u64 << 22) as f64,
    };
    let resistance = code as f64 / full_scale * sensor.reference_resistance;
    let temperature = (resistance - sensor.nominal_resistance) / sensor.resistance_per_degree;
    Ok(calib.apply(temperature))
}

/// Byte layout of a conversion read, after the `RDATA` command byte
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameLayout {
    pub status_byte: bool,
    pub data_bytes: usize,
    pub checksum: ChecksumMode,
}

impl FrameLayout {
    pub fn new(adc: AdcNum, status_byte: StatusByte, checksum: ChecksumMode) -> Self {
        FrameLayout {
            status_byte: status_byte == StatusByte::On,
            data_bytes: adc.data_bytes(),
            checksum,
        }
    }

    pub fn len(&self) -> usize {
        let status = if self.status_byte { 1 } else { 0 };
        let check = if self.checksum == ChecksumMode::Off { 0 } else { 1 };
        status + self.data_bytes + check
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Frame<'a> {
    pub status: Option<Status>,
    pub data: &'a [u8],
    pub check: Option<u8>,
}

/// Split `bytes` per `layout` and verify the check byte over the data bytes
pub fn parse_frame(layout: FrameLayout, bytes: &[u8]) -> Result<Frame<'_>, Error> {
    if bytes.len() != layout.len() {
        return Err(Error::FrameLength { expected: layout.len(), actual: bytes.len() });
    }
    let (status, rest) = if layout.status_byte {
        (Some(Status(bytes[0])), &bytes[1..])
    } else {
        (None, bytes)
    };
    let (data, check) = rest.split_at(layout.data_bytes);
    let check = check.first().cloned();
    Checksum::new(layout.checksum).verify(data, check)?;
    Ok(Frame { status, data, check })
}
