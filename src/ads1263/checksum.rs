use core::fmt;
use crc::{Crc, CRC_8_SMBUS};

use super::Error;

/// x8 + x2 + x + 1, zero initial value
const CRC8: Crc<u8> = Crc::<u8>::new(&CRC_8_SMBUS);

/// Added to the byte sum in checksum mode
const CHECKSUM_SEED: u8 = 0x9B;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ChecksumMode {
    Off = 0b00,
    /// Byte sum, catches fewer errors than `Crc`
    Checksum = 0b01,
    Crc = 0b10,
}

impl fmt::Display for ChecksumMode {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        fmt.write_str(match self {
            ChecksumMode::Off => "off",
            ChecksumMode::Checksum => "checksum",
            ChecksumMode::Crc => "CRC",
        })
    }
}

pub fn crc8(payload: &[u8]) -> u8 {
    CRC8.checksum(payload)
}

pub fn verify_crc(payload: &[u8], check_byte: u8) -> Result<(), Error> {
    let expected = crc8(payload);
    if expected != check_byte {
        return Err(Error::ChecksumMismatch { expected, received: check_byte });
    }
    Ok(())
}

pub struct Checksum {
    mode: ChecksumMode,
}

impl Checksum {
    pub fn new(mode: ChecksumMode) -> Self {
        Checksum { mode }
    }

    /// The check byte the device appends after `payload`, if any
    pub fn result(&self, payload: &[u8]) -> Option<u8> {
        match self.mode {
            ChecksumMode::Off => None,
            ChecksumMode::Checksum => Some(
                payload.iter().fold(CHECKSUM_SEED, |sum, &b| sum.wrapping_add(b))
            ),
            ChecksumMode::Crc => Some(crc8(payload)),
        }
    }

    pub fn verify(&self, payload: &[u8], check_byte: Option<u8>) -> Result<(), Error> {
        match (self.result(payload), check_byte) {
            (None, _) => Ok(()),
            (Some(expected), Some(received)) if expected == received => Ok(()),
            (Some(expected), Some(received)) =>
                Err(Error::ChecksumMismatch { expected, received }),
            (Some(_), None) =>
                Err(Error::FrameLength { expected: payload.len() + 1, actual: payload.len() }),
        }
    }
}
