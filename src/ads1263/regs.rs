use std::collections::BTreeMap;
use core::fmt;
use bit_field::BitField;

use super::*;

pub const NUM_REGISTERS: usize = 27;

/// `RREG` opcode, OR-ed with the start address
pub const READ_REGISTERS: u8 = 0x20;
/// `WREG` opcode, OR-ed with the start address
pub const WRITE_REGISTERS: u8 = 0x40;

macro_rules! def_regs {
    ($($Reg: ident = $addr: literal, $default: expr;)*) => {
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
        #[repr(u8)]
        pub enum Register {
            $($Reg = $addr,)*
        }

        impl Register {
            pub const ALL: [Register; NUM_REGISTERS] = [$(Register::$Reg,)*];

            pub fn address(self) -> u8 {
                self as u8
            }

            pub fn from_address(address: u8) -> Option<Self> {
                match address {
                    $($addr => Some(Register::$Reg),)*
                    _ => None,
                }
            }

            /// Value after power-on or a `RESET` command
            pub fn reset_value(self) -> u8 {
                match self {
                    $(Register::$Reg => $default,)*
                }
            }
        }
    };
}

def_regs! {
    Id = 0x00, 0x21;
    Power = 0x01, 0x11;
    Interface = 0x02, 0x05;
    Mode0 = 0x03, 0x00;
    Mode1 = 0x04, 0x80;
    Mode2 = 0x05, 0x04;
    InpMux = 0x06, 0x01;
    OfCal0 = 0x07, 0x00;
    OfCal1 = 0x08, 0x00;
    OfCal2 = 0x09, 0x00;
    FsCal0 = 0x0A, 0x00;
    FsCal1 = 0x0B, 0x00;
    FsCal2 = 0x0C, 0x40;
    IdacMux = 0x0D, 0xBB;
    IdacMag = 0x0E, 0x00;
    RefMux = 0x0F, 0x00;
    TdacP = 0x10, 0x00;
    TdacN = 0x11, 0x00;
    GpioCon = 0x12, 0x00;
    GpioDir = 0x13, 0x00;
    GpioDat = 0x14, 0x00;
    Adc2Cfg = 0x15, 0x00;
    Adc2Mux = 0x16, 0x01;
    Adc2Ofc0 = 0x17, 0x00;
    Adc2Ofc1 = 0x18, 0x00;
    Adc2Fsc0 = 0x19, 0x00;
    Adc2Fsc1 = 0x1A, 0x40;
}

/// Single-byte commands
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Command {
    Nop = 0x00,
    Reset = 0x06,
    Start1 = 0x08,
    Stop1 = 0x0A,
    Start2 = 0x0C,
    Stop2 = 0x0E,
    ReadData1 = 0x12,
    ReadData2 = 0x14,
}

/// The complete register file, indexed by address
#[derive(Clone, PartialEq, Eq)]
pub struct RegisterMap([u8; NUM_REGISTERS]);

impl RegisterMap {
    pub fn reset_values() -> Self {
        let mut regs = [0; NUM_REGISTERS];
        for reg in Register::ALL.iter() {
            regs[reg.address() as usize] = reg.reset_value();
        }
        RegisterMap(regs)
    }

    /// `bytes` holds the register values starting at address 0
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        if bytes.len() != NUM_REGISTERS {
            return Err(Error::FrameLength {
                expected: NUM_REGISTERS,
                actual: bytes.len(),
            });
        }
        let mut regs = [0; NUM_REGISTERS];
        regs.copy_from_slice(bytes);
        Ok(RegisterMap(regs))
    }

    pub fn get(&self, reg: Register) -> u8 {
        self.0[reg.address() as usize]
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = (Register, u8)> + '_ {
        Register::ALL.iter().map(move |&reg| (reg, self.get(reg)))
    }

    /// Clear the bits of `opcode.mask`, then set `opcode.value`
    pub fn apply(&mut self, opcode: &OpCode) -> Result<(), Error> {
        opcode.check()?;
        let byte = &mut self.0[opcode.address.address() as usize];
        *byte = (*byte & !opcode.mask) | opcode.value;
        Ok(())
    }

    /// Fold `opcodes` in order. Returns, for every touched register,
    /// whether its final value differs from the value before the fold.
    ///
    /// Nothing is modified if any opcode is invalid.
    pub fn apply_all(&mut self, opcodes: &[OpCode]) -> Result<BTreeMap<Register, bool>, Error> {
        let mut working = self.clone();
        for opcode in opcodes {
            working.apply(opcode)?;
        }
        let changed = opcodes.iter()
            .map(|opcode| {
                let reg = opcode.address;
                (reg, working.get(reg) != self.get(reg))
            })
            .collect();
        *self = working;
        Ok(changed)
    }
}

impl fmt::Debug for RegisterMap {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        fmt.debug_map()
            .entries(self.iter().map(|(reg, value)| (reg, format!("{:#04x}", value))))
            .finish()
    }
}

/// Within `address`, replace the bits selected by `mask` with `value`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OpCode {
    pub value: u8,
    pub address: Register,
    pub mask: u8,
}

impl OpCode {
    pub fn new(value: u8, address: Register, mask: u8) -> Self {
        OpCode { value, address, mask }
    }

    /// `value` may only set bits covered by `mask`
    pub fn check(&self) -> Result<(), Error> {
        if self.value != 0 && self.value & !self.mask != 0 {
            return Err(Error::OpCodeMask {
                register: self.address,
                value: self.value,
                mask: self.mask,
            });
        }
        Ok(())
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        write!(fmt, "{:?}[{:08b}] = {:08b}", self.address, self.mask, self.value)
    }
}

/// Status byte prepended to conversion data
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Status(pub u8);

impl Status {
    /// Device was reset since the flag was last cleared
    pub fn reset(&self) -> bool {
        self.0.get_bit(0)
    }

    /// PGA differential output out of range
    pub fn pga_output_alarm(&self) -> bool {
        self.0.get_bit(1)
    }

    pub fn pga_high_alarm(&self) -> bool {
        self.0.get_bit(2)
    }

    pub fn pga_low_alarm(&self) -> bool {
        self.0.get_bit(3)
    }

    /// Low reference voltage
    pub fn reference_alarm(&self) -> bool {
        self.0.get_bit(4)
    }

    pub fn external_clock(&self) -> bool {
        self.0.get_bit(5)
    }

    /// Is there new ADC1 data?
    pub fn adc1_ready(&self) -> bool {
        self.0.get_bit(6)
    }

    /// Is there new ADC2 data?
    pub fn adc2_ready(&self) -> bool {
        self.0.get_bit(7)
    }

    pub fn has_alarm(&self) -> bool {
        self.0.get_bits(1..=4) != 0
    }
}

/// Contents of the `ID` register
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeviceId(pub u8);

impl DeviceId {
    /// `0b001` for ADS1263
    pub fn device(&self) -> u8 {
        self.0.get_bits(5..=7)
    }

    pub fn revision(&self) -> u8 {
        self.0.get_bits(0..=4)
    }
}
