use core::fmt;
use embedded_hal::blocking::delay::DelayUs;
use embedded_hal::blocking::spi::Transfer;
use embedded_hal::digital::v2::OutputPin;
use nom::{
    IResult,
    branch::alt,
    bytes::complete::{tag, take_while1},
    character::complete::char,
    combinator::{map, map_opt, opt, value},
    sequence::{pair, preceded},
    multi::fold_many1,
    error::ErrorKind,
};

use crate::ads1263::{
    Adc, AdcError, AdcNum, AdcState, Adc1DataRate, Adc2DataRate, Adc2RefMux, Channel,
    ChecksumMode, ConfigureOptions, ConversionMode, FilterMode, IdacMag, IdacMux, PgaMode,
    RefMuxNegative, RefMuxPositive, StatusByte,
};

#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("parser: {0:?}")]
    Parser(ErrorKind),
    #[error("incomplete input")]
    Incomplete,
    #[error("unexpected input: {0:#04x}")]
    UnexpectedInput(u8),
}

impl<'t> From<nom::Err<nom::error::Error<&'t [u8]>>> for Error {
    fn from(e: nom::Err<nom::error::Error<&'t [u8]>>) -> Self {
        match e {
            nom::Err::Incomplete(_) =>
                Error::Incomplete,
            nom::Err::Error(e) =>
                Error::Parser(e.code),
            nom::Err::Failure(e) =>
                Error::Parser(e.code),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Configure(ConfigureOptions),
    /// Attach the RTD to a converter, or detach it with `None`
    Rtd(Option<AdcNum>),
    Start(AdcNum),
    Stop(AdcNum),
    Read(AdcNum),
    Sample,
    Temperature,
    Reset,
    Show,
}

fn whitespace(input: &[u8]) -> IResult<&[u8], ()> {
    fold_many1(char(' '), || (), |(), _| ())(input)
}

fn word(input: &[u8]) -> IResult<&[u8], &[u8]> {
    take_while1(|c: u8| c != b' ')(input)
}

fn unknown(input: &[u8]) -> nom::Err<nom::error::Error<&[u8]>> {
    nom::Err::Error(nom::error::Error::new(input, ErrorKind::Tag))
}

fn channel_name(name: &[u8]) -> Option<Channel> {
    Some(match name {
        b"ain0" => Channel::Ain0,
        b"ain1" => Channel::Ain1,
        b"ain2" => Channel::Ain2,
        b"ain3" => Channel::Ain3,
        b"ain4" => Channel::Ain4,
        b"ain5" => Channel::Ain5,
        b"ain6" => Channel::Ain6,
        b"ain7" => Channel::Ain7,
        b"ain8" => Channel::Ain8,
        b"ain9" => Channel::Ain9,
        b"aincom" => Channel::AinCom,
        b"temp" => Channel::TemperatureSensor,
        b"avdd" => Channel::AnalogSupply,
        b"dvdd" => Channel::DigitalSupply,
        b"tdac" => Channel::Tdac,
        b"float" => Channel::Float,
        _ => return None,
    })
}

fn adc1_rate(rate: &[u8]) -> Option<Adc1DataRate> {
    Some(match rate {
        b"2.5" => Adc1DataRate::Sps2p5,
        b"5" => Adc1DataRate::Sps5,
        b"10" => Adc1DataRate::Sps10,
        b"16.6" => Adc1DataRate::Sps16p6,
        b"20" => Adc1DataRate::Sps20,
        b"50" => Adc1DataRate::Sps50,
        b"60" => Adc1DataRate::Sps60,
        b"100" => Adc1DataRate::Sps100,
        b"400" => Adc1DataRate::Sps400,
        b"1200" => Adc1DataRate::Sps1200,
        b"2400" => Adc1DataRate::Sps2400,
        b"4800" => Adc1DataRate::Sps4800,
        b"7200" => Adc1DataRate::Sps7200,
        b"14400" => Adc1DataRate::Sps14400,
        b"19200" => Adc1DataRate::Sps19200,
        b"38400" => Adc1DataRate::Sps38400,
        _ => return None,
    })
}

fn adc2_rate(rate: &[u8]) -> Option<Adc2DataRate> {
    Some(match rate {
        b"10" => Adc2DataRate::Sps10,
        b"100" => Adc2DataRate::Sps100,
        b"400" => Adc2DataRate::Sps400,
        b"800" => Adc2DataRate::Sps800,
        _ => return None,
    })
}

fn idac_mux_name(name: &[u8]) -> Option<IdacMux> {
    Some(match name {
        b"ain0" => IdacMux::Ain0,
        b"ain1" => IdacMux::Ain1,
        b"ain2" => IdacMux::Ain2,
        b"ain3" => IdacMux::Ain3,
        b"ain4" => IdacMux::Ain4,
        b"ain5" => IdacMux::Ain5,
        b"ain6" => IdacMux::Ain6,
        b"ain7" => IdacMux::Ain7,
        b"ain8" => IdacMux::Ain8,
        b"ain9" => IdacMux::Ain9,
        b"aincom" => IdacMux::AinCom,
        b"none" => IdacMux::NoConnection,
        _ => return None,
    })
}

/// Current in microamps
fn idac_mag_name(name: &[u8]) -> Option<IdacMag> {
    Some(match name {
        b"off" => IdacMag::Off,
        b"50" => IdacMag::Ua50,
        b"100" => IdacMag::Ua100,
        b"250" => IdacMag::Ua250,
        b"500" => IdacMag::Ua500,
        b"750" => IdacMag::Ua750,
        b"1000" => IdacMag::Ua1000,
        b"1500" => IdacMag::Ua1500,
        b"2000" => IdacMag::Ua2000,
        b"2500" => IdacMag::Ua2500,
        b"3000" => IdacMag::Ua3000,
        _ => return None,
    })
}

fn channel(input: &[u8]) -> IResult<&[u8], Channel> {
    map_opt(word, channel_name)(input)
}

fn adc_num(input: &[u8]) -> IResult<&[u8], AdcNum> {
    alt((value(AdcNum::Adc1, tag("adc1")),
         value(AdcNum::Adc2, tag("adc2"))
    ))(input)
}

/// `adc1 mux ain1 aincom`, `adc2 mux ain3`, `adc1 rate 20`, `adc2 ref ain4ain5`
fn adc_setting(input: &[u8]) -> IResult<&[u8], Command> {
    let (input, adc) = adc_num(input)?;
    let (input, _) = whitespace(input)?;
    let (input, setting) = word(input)?;
    let (input, _) = whitespace(input)?;
    let mut options = ConfigureOptions::default();
    let input = match (adc, setting) {
        (_, b"mux") => {
            let (input, mux_p) = channel(input)?;
            let (input, mux_n) = opt(preceded(whitespace, channel))(input)?;
            options.set_mux(adc, Some(mux_p), mux_n);
            input
        }
        (AdcNum::Adc1, b"rate") => {
            let (input, rate) = map_opt(word, adc1_rate)(input)?;
            options.adc_1_data_rate = Some(rate);
            input
        }
        (AdcNum::Adc2, b"rate") => {
            let (input, rate) = map_opt(word, adc2_rate)(input)?;
            options.adc_2_data_rate = Some(rate);
            input
        }
        (AdcNum::Adc2, b"ref") => {
            let (input, reference) =
                alt((value(Adc2RefMux::Internal2V5, tag("internal")),
                     value(Adc2RefMux::Ain0Ain1, tag("ain0ain1")),
                     value(Adc2RefMux::Ain2Ain3, tag("ain2ain3")),
                     value(Adc2RefMux::Ain4Ain5, tag("ain4ain5")),
                     value(Adc2RefMux::AvddAvss, tag("supply"))
                ))(input)?;
            options.adc_2_ref_mux = Some(reference);
            input
        }
        _ => return Err(unknown(setting)),
    };
    Ok((input, Command::Configure(options)))
}

/// `ref ain0ain1`: ADC1 reference pair
fn reference(input: &[u8]) -> IResult<&[u8], Command> {
    let (input, _) = pair(tag("ref"), whitespace)(input)?;
    let (input, (ref_mux_p, ref_mux_n)) =
        alt((value((RefMuxPositive::Internal2V5, RefMuxNegative::Internal2V5), tag("internal")),
             value((RefMuxPositive::ExternalAin0, RefMuxNegative::ExternalAin1), tag("ain0ain1")),
             value((RefMuxPositive::ExternalAin2, RefMuxNegative::ExternalAin3), tag("ain2ain3")),
             value((RefMuxPositive::ExternalAin4, RefMuxNegative::ExternalAin5), tag("ain4ain5")),
             value((RefMuxPositive::InternalAvdd, RefMuxNegative::InternalAvss), tag("supply"))
        ))(input)?;
    Ok((input, Command::Configure(ConfigureOptions {
        ref_mux_p: Some(ref_mux_p),
        ref_mux_n: Some(ref_mux_n),
        ..ConfigureOptions::EMPTY
    })))
}

/// `idac1 mux ain8`, `idac2 mag 500`
fn idac(input: &[u8]) -> IResult<&[u8], Command> {
    let (input, idac) = alt((value(1, tag("idac1")), value(2, tag("idac2"))))(input)?;
    let (input, _) = whitespace(input)?;
    let (input, setting) = word(input)?;
    let (input, _) = whitespace(input)?;
    let mut options = ConfigureOptions::default();
    let input = match (idac, setting) {
        (1, b"mux") => {
            let (input, mux) = map_opt(word, idac_mux_name)(input)?;
            options.idac_1_mux = Some(mux);
            input
        }
        (2, b"mux") => {
            let (input, mux) = map_opt(word, idac_mux_name)(input)?;
            options.idac_2_mux = Some(mux);
            input
        }
        (1, b"mag") => {
            let (input, mag) = map_opt(word, idac_mag_name)(input)?;
            options.idac_1_mag = Some(mag);
            input
        }
        (2, b"mag") => {
            let (input, mag) = map_opt(word, idac_mag_name)(input)?;
            options.idac_2_mag = Some(mag);
            input
        }
        _ => return Err(unknown(setting)),
    };
    Ok((input, Command::Configure(options)))
}

fn filter(input: &[u8]) -> IResult<&[u8], ConfigureOptions> {
    let (input, _) = pair(tag("filter"), whitespace)(input)?;
    let (input, filter_mode) =
        alt((value(FilterMode::Sinc1, tag("sinc1")),
             value(FilterMode::Sinc2, tag("sinc2")),
             value(FilterMode::Sinc3, tag("sinc3")),
             value(FilterMode::Sinc4, tag("sinc4")),
             value(FilterMode::Fir, tag("fir"))
        ))(input)?;
    Ok((input, ConfigureOptions { filter_mode: Some(filter_mode), ..ConfigureOptions::EMPTY }))
}

fn mode(input: &[u8]) -> IResult<&[u8], ConfigureOptions> {
    let (input, _) = pair(tag("mode"), whitespace)(input)?;
    let (input, conversion_mode) =
        alt((value(ConversionMode::Pulse, tag("pulse")),
             value(ConversionMode::Continuous, tag("continuous"))
        ))(input)?;
    Ok((input, ConfigureOptions { conversion_mode: Some(conversion_mode), ..ConfigureOptions::EMPTY }))
}

fn checksum(input: &[u8]) -> IResult<&[u8], ConfigureOptions> {
    let (input, _) = pair(tag("checksum"), whitespace)(input)?;
    let (input, checksum_mode) =
        alt((value(ChecksumMode::Off, tag("off")),
             value(ChecksumMode::Checksum, tag("checksum")),
             value(ChecksumMode::Crc, tag("crc"))
        ))(input)?;
    Ok((input, ConfigureOptions { checksum_mode: Some(checksum_mode), ..ConfigureOptions::EMPTY }))
}

fn status(input: &[u8]) -> IResult<&[u8], ConfigureOptions> {
    let (input, _) = pair(tag("status"), whitespace)(input)?;
    let (input, status_byte) =
        alt((value(StatusByte::On, tag("on")),
             value(StatusByte::Off, tag("off"))
        ))(input)?;
    Ok((input, ConfigureOptions { status_byte: Some(status_byte), ..ConfigureOptions::EMPTY }))
}

fn pga(input: &[u8]) -> IResult<&[u8], ConfigureOptions> {
    let (input, _) = pair(tag("pga"), whitespace)(input)?;
    let (input, pga_mode) =
        alt((value(PgaMode::Enabled, tag("enabled")),
             value(PgaMode::Bypassed, tag("bypassed"))
        ))(input)?;
    Ok((input, ConfigureOptions { pga_mode: Some(pga_mode), ..ConfigureOptions::EMPTY }))
}

fn rtd(input: &[u8]) -> IResult<&[u8], Command> {
    let (input, _) = pair(tag("rtd"), whitespace)(input)?;
    alt((
        map(preceded(pair(tag("on"), whitespace), adc_num),
            |adc| Command::Rtd(Some(adc))),
        value(Command::Rtd(None), tag("off"))
    ))(input)
}

fn conversions(input: &[u8]) -> IResult<&[u8], Command> {
    let (input, command) = alt((tag("start"), tag("stop"), tag("read")))(input)?;
    let (input, _) = whitespace(input)?;
    let (input, adc) = adc_num(input)?;
    let command = match command {
        b"start" => Command::Start(adc),
        b"stop" => Command::Stop(adc),
        _ => Command::Read(adc),
    };
    Ok((input, command))
}

fn command(input: &[u8]) -> IResult<&[u8], Command> {
    alt((adc_setting,
         reference,
         idac,
         map(alt((filter, mode, checksum, status, pga)), Command::Configure),
         rtd,
         conversions,
         value(Command::Sample, tag("sample")),
         value(Command::Temperature, tag("temperature")),
         value(Command::Reset, tag("reset")),
         value(Command::Show, tag("show")),
    ))(input)
}

impl Command {
    pub fn parse(input: &[u8]) -> Result<Self, Error> {
        match command(input) {
            Ok((b"", result)) =>
                Ok(result),
            Ok((input_remain, _)) =>
                Err(Error::UnexpectedInput(input_remain[0])),
            Err(e) =>
                Err(e.into()),
        }
    }

    pub fn execute<SPI, NSS, D>(&self, adc: &mut Adc<SPI, NSS, D>) -> Result<Reply, AdcError<SPI::Error>>
    where
        SPI: Transfer<u8>,
        NSS: OutputPin,
        D: DelayUs<u32>,
    {
        let reply = match self {
            Command::Configure(options) => {
                adc.configure(options)?;
                Reply::Done
            }
            Command::Rtd(Some(target)) => {
                adc.set_rtd(true, *target)?;
                Reply::Done
            }
            Command::Rtd(None) => {
                adc.set_rtd(false, AdcNum::Adc1)?;
                Reply::Done
            }
            Command::Start(target) => {
                adc.start_conversions(*target)?;
                Reply::Done
            }
            Command::Stop(target) => {
                adc.stop_conversions(*target)?;
                Reply::Done
            }
            Command::Read(target) =>
                Reply::Voltage(adc.read_voltage(*target)?),
            Command::Sample =>
                Reply::Voltage(adc.single_sample()?),
            Command::Temperature =>
                Reply::Temperature(adc.read_rtd_temperature()?),
            Command::Reset => {
                adc.reset()?;
                Reply::Done
            }
            Command::Show =>
                Reply::State(adc.state()?),
        };
        Ok(reply)
    }
}

/// Result of an executed [`Command`]
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Done,
    Voltage(f64),
    Temperature(f64),
    State(AdcState),
}

impl fmt::Display for Reply {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        match self {
            Reply::Done => fmt.write_str("ok"),
            Reply::Voltage(volts) => write!(fmt, "{:.6} V", volts),
            Reply::Temperature(celsius) => write!(fmt, "{:.3} °C", celsius),
            Reply::State(state) => fmt::Display::fmt(state, fmt),
        }
    }
}
