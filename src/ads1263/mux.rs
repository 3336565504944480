//! Input multiplexer assignment and channel consistency checks

use std::collections::BTreeSet;

use super::{Channel, Error, OpCode, Register};

fn mux_opcode(register: Register, mux_p: Option<Channel>, mux_n: Option<Channel>) -> Option<OpCode> {
    match (mux_p, mux_n) {
        (None, None) => None,
        (Some(p), Some(n)) => Some(OpCode::new(((p as u8) << 4) | n as u8, register, 0xFF)),
        (Some(p), None) => Some(OpCode::new((p as u8) << 4, register, 0xF0)),
        (None, Some(n)) => Some(OpCode::new(n as u8, register, 0x0F)),
    }
}

/// Opcodes for `INPMUX` and `ADC2MUX`. A side left as `None` keeps its
/// current nibble.
pub fn assign_channels(
    adc_1_mux_p: Option<Channel>,
    adc_1_mux_n: Option<Channel>,
    adc_2_mux_p: Option<Channel>,
    adc_2_mux_n: Option<Channel>,
) -> Vec<OpCode> {
    mux_opcode(Register::InpMux, adc_1_mux_p, adc_1_mux_n).into_iter()
        .chain(mux_opcode(Register::Adc2Mux, adc_2_mux_p, adc_2_mux_n))
        .collect()
}

/// No physical input may be assigned twice; `Float` and `AinCom` are exempt
pub fn validate_no_collision(channels: &[Channel]) -> Result<(), Error> {
    let mut seen = BTreeSet::new();
    for &channel in channels.iter().filter(|channel| !channel.is_shared()) {
        if !seen.insert(channel) {
            return Err(Error::ChannelMapping { channel });
        }
    }
    Ok(())
}

/// The RTD bank (AIN5-AIN8) is off limits while RTD is enabled, on either ADC
pub fn validate_allowed(channels: &[Channel], rtd_enabled: bool) -> Result<(), Error> {
    if !rtd_enabled {
        return Ok(());
    }
    match channels.iter().find(|channel| channel.is_rtd_reserved()) {
        Some(&channel) => Err(Error::ChannelNotAvailable { channel }),
        None => Ok(()),
    }
}
