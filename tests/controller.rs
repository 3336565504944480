use std::cell::RefCell;
use std::convert::Infallible;
use std::rc::Rc;
use std::sync::{Arc, Barrier, Mutex};
use std::thread;
use std::time::Duration;

use embedded_hal::blocking::delay::DelayUs;
use embedded_hal::blocking::spi::Transfer;
use embedded_hal::digital::v2::OutputPin;

use analog_board::ads1263::*;
use analog_board::command_parser::{Command as TextCommand, Reply};
use analog_board::config::{Config, RegisterCache};

#[derive(Clone, Copy, Debug, PartialEq)]
enum Event {
    ReadRegisters,
    WriteRegister(u8, u8),
    Command(u8),
    ReadData(u8),
    Delay(u32),
}

/// Register file and command decoder of an ADS1263
struct Device {
    regs: [u8; NUM_REGISTERS],
    /// Writes to this address are ignored
    stuck: Option<u8>,
    adc1_sample: [u8; 4],
    adc2_sample: [u8; 3],
    corrupt_check: bool,
    selected: bool,
    events: Vec<Event>,
}

impl Device {
    fn new() -> Self {
        let mut regs = [0; NUM_REGISTERS];
        regs.copy_from_slice(RegisterMap::reset_values().as_bytes());
        Device {
            regs,
            stuck: None,
            adc1_sample: [0; 4],
            adc2_sample: [0; 3],
            corrupt_check: false,
            selected: false,
            events: Vec::new(),
        }
    }

    fn transfer(&mut self, buf: &mut [u8]) {
        assert!(self.selected, "transfer without chip select");
        match buf[0] {
            opcode @ 0x20..=0x3F => {
                let start = (opcode & 0x1F) as usize;
                let count = buf[1] as usize + 1;
                buf[2..2 + count].copy_from_slice(&self.regs[start..start + count]);
                self.events.push(Event::ReadRegisters);
            }
            opcode @ 0x40..=0x5F => {
                let start = (opcode & 0x1F) as usize;
                let count = buf[1] as usize + 1;
                for (i, &value) in buf[2..2 + count].iter().enumerate() {
                    let address = (start + i) as u8;
                    self.events.push(Event::WriteRegister(address, value));
                    if self.stuck != Some(address) {
                        self.regs[address as usize] = value;
                    }
                }
            }
            command @ 0x12 | command @ 0x14 => {
                self.events.push(Event::ReadData(command));
                let frame = self.frame(command == 0x12);
                assert_eq!(buf.len(), 1 + frame.len(), "frame length");
                buf[1..].copy_from_slice(&frame);
            }
            command => {
                self.events.push(Event::Command(command));
                if command == 0x06 {
                    self.regs.copy_from_slice(RegisterMap::reset_values().as_bytes());
                }
            }
        }
    }

    fn frame(&self, adc1: bool) -> Vec<u8> {
        let interface = self.regs[Register::Interface.address() as usize];
        let data = if adc1 { &self.adc1_sample[..] } else { &self.adc2_sample[..] };
        let mut frame = Vec::new();
        if interface & 0x04 != 0 {
            frame.push(if adc1 { 0x40 } else { 0x80 });
        }
        frame.extend_from_slice(data);
        let check = match interface & 0x03 {
            0b01 => Some(data.iter().fold(0x9Bu8, |sum, &b| sum.wrapping_add(b))),
            0b10 => Some(crc8(data)),
            _ => None,
        };
        if let Some(check) = check {
            frame.push(if self.corrupt_check { !check } else { check });
        }
        frame
    }

    fn reg(&self, reg: Register) -> u8 {
        self.regs[reg.address() as usize]
    }

    fn commands(&self) -> Vec<u8> {
        self.events.iter()
            .filter_map(|event| match event {
                Event::Command(command) => Some(*command),
                _ => None,
            })
            .collect()
    }

    fn writes(&self) -> Vec<(u8, u8)> {
        self.events.iter()
            .filter_map(|event| match event {
                Event::WriteRegister(address, value) => Some((*address, *value)),
                _ => None,
            })
            .collect()
    }

    fn count(&self, wanted: Event) -> usize {
        self.events.iter().filter(|&&event| event == wanted).count()
    }
}

type Shared = Rc<RefCell<Device>>;

struct FakeSpi(Shared);

impl Transfer<u8> for FakeSpi {
    type Error = Infallible;

    fn transfer<'w>(&mut self, words: &'w mut [u8]) -> Result<&'w [u8], Infallible> {
        self.0.borrow_mut().transfer(words);
        Ok(words)
    }
}

struct FakeNss(Shared);

impl OutputPin for FakeNss {
    type Error = Infallible;

    fn set_low(&mut self) -> Result<(), Infallible> {
        self.0.borrow_mut().selected = true;
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        self.0.borrow_mut().selected = false;
        Ok(())
    }
}

struct FakeDelay(Shared);

impl DelayUs<u32> for FakeDelay {
    fn delay_us(&mut self, us: u32) {
        self.0.borrow_mut().events.push(Event::Delay(us));
    }
}

/// One device reachable from several threads
type SyncShared = Arc<Mutex<Device>>;

/// Register writes take long enough for another thread to get in between
struct SlowWriteSpi(SyncShared);

impl Transfer<u8> for SlowWriteSpi {
    type Error = Infallible;

    fn transfer<'w>(&mut self, words: &'w mut [u8]) -> Result<&'w [u8], Infallible> {
        if words[0] & 0xE0 == 0x40 {
            thread::sleep(Duration::from_millis(20));
        }
        self.0.lock().unwrap().transfer(words);
        Ok(words)
    }
}

struct SyncNss(SyncShared);

impl OutputPin for SyncNss {
    type Error = Infallible;

    fn set_low(&mut self) -> Result<(), Infallible> {
        self.0.lock().unwrap().selected = true;
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        self.0.lock().unwrap().selected = false;
        Ok(())
    }
}

struct NoDelay;

impl DelayUs<u32> for NoDelay {
    fn delay_us(&mut self, _us: u32) {}
}

type TestAdc = Adc<FakeSpi, FakeNss, FakeDelay>;

fn setup(config: Config) -> (TestAdc, Shared) {
    let device = Rc::new(RefCell::new(Device::new()));
    let adc = Adc::new(
        FakeSpi(device.clone()),
        FakeNss(device.clone()),
        FakeDelay(device.clone()),
        config,
    ).unwrap();
    device.borrow_mut().events.clear();
    (adc, device)
}

fn device_error<T: std::fmt::Debug>(result: Result<T, AdcError<Infallible>>) -> Error {
    match result {
        Err(AdcError::Device(e)) => e,
        other => panic!("expected a device error, got {:?}", other),
    }
}

#[test]
fn startup_writes_only_changed_registers() {
    let device = Rc::new(RefCell::new(Device::new()));
    let _adc = Adc::new(
        FakeSpi(device.clone()),
        FakeNss(device.clone()),
        FakeDelay(device.clone()),
        Config::default(),
    ).unwrap();
    let device = device.borrow();
    // POWER.RESET cleared, INTERFACE to status byte + CRC
    assert_eq!(device.writes(), vec![(0x01, 0x01), (0x02, 0x06)]);
    assert_eq!(device.count(Event::ReadRegisters), 2);
    assert!(!device.selected);
}

#[test]
fn unchanged_settings_are_not_written() {
    let (mut adc, device) = setup(Config::default());
    adc.configure(&ConfigureOptions {
        filter_mode: Some(FilterMode::Fir),
        adc_1_data_rate: Some(Adc1DataRate::Sps20),
        ..ConfigureOptions::EMPTY
    }).unwrap();
    let device = device.borrow();
    assert!(device.writes().is_empty());
    assert_eq!(device.count(Event::ReadRegisters), 1);
}

#[test]
fn half_byte_mux_update_keeps_other_nibble() {
    let (mut adc, device) = setup(Config::default());
    adc.configure(&ConfigureOptions {
        adc_2_mux_p: Some(Channel::Ain3),
        ..ConfigureOptions::EMPTY
    }).unwrap();
    assert_eq!(device.borrow().reg(Register::Adc2Mux), 0x31);
    let state = adc.state().unwrap();
    assert_eq!((state.adc_2.mux_p, state.adc_2.mux_n), (Channel::Ain3, Channel::Ain1));
}

#[test]
fn channel_collision_is_rejected_before_writing() {
    let (mut adc, device) = setup(Config::default());
    let result = adc.configure(&ConfigureOptions {
        adc_1_mux_p: Some(Channel::Ain0),
        adc_1_mux_n: Some(Channel::AinCom),
        adc_2_mux_p: Some(Channel::Ain0),
        adc_2_mux_n: Some(Channel::AinCom),
        ..ConfigureOptions::EMPTY
    });
    assert_eq!(device_error(result), Error::ChannelMapping { channel: Channel::Ain0 });
    assert!(device.borrow().writes().is_empty());
}

#[test]
fn mux_negative_needs_positive() {
    let (mut adc, _device) = setup(Config::default());
    let result = adc.configure(&ConfigureOptions {
        adc_1_mux_n: Some(Channel::Ain3),
        ..ConfigureOptions::EMPTY
    });
    assert_eq!(device_error(result), Error::MuxNegativeWithoutPositive { adc: AdcNum::Adc1 });
}

#[test]
fn rtd_reserves_its_properties() {
    let (mut adc, _device) = setup(Config::default());
    let request = ConfigureOptions {
        adc_1_mux_p: Some(Channel::Ain2),
        ..ConfigureOptions::EMPTY
    };

    adc.set_rtd(true, AdcNum::Adc1).unwrap();
    let state = adc.state().unwrap();
    assert_eq!((state.rtd_mode, state.rtd_adc), (RtdMode::On, Some(AdcNum::Adc1)));
    assert_eq!(
        device_error(adc.configure(&request)),
        Error::RtdEnabled { property: "ADC1 mux positive" }
    );

    adc.set_rtd(false, AdcNum::Adc1).unwrap();
    assert_eq!(adc.state().unwrap().rtd_mode, RtdMode::Off);
    adc.configure(&request).unwrap();
    assert_eq!(adc.state().unwrap().adc_1.mux_p, Channel::Ain2);
}

#[test]
fn rtd_bank_unavailable_to_other_adc() {
    let (mut adc, _device) = setup(Config::default());
    adc.set_rtd(true, AdcNum::Adc2).unwrap();
    let result = adc.configure(&ConfigureOptions::mux(AdcNum::Adc1, Channel::Ain5, Channel::AinCom));
    assert_eq!(device_error(result), Error::ChannelNotAvailable { channel: Channel::Ain5 });
    adc.configure(&ConfigureOptions::mux(AdcNum::Adc1, Channel::Ain2, Channel::Ain3)).unwrap();
}

#[test]
fn enabling_rtd_moves_other_adc_off_reserved_inputs() {
    let (mut adc, device) = setup(Config::default());
    adc.configure(&ConfigureOptions::mux(AdcNum::Adc2, Channel::Ain5, Channel::Ain8)).unwrap();
    adc.set_rtd(true, AdcNum::Adc1).unwrap();
    assert_eq!(device.borrow().reg(Register::Adc2Mux), 0xFA);
    assert_eq!(device.borrow().reg(Register::InpMux), 0x67);

    let state = adc.state().unwrap();
    assert_eq!((state.adc_2.mux_p, state.adc_2.mux_n), (Channel::Float, Channel::AinCom));
    assert_eq!((state.rtd_mode, state.rtd_adc), (RtdMode::On, Some(AdcNum::Adc1)));
}

#[test]
fn relocation_keeps_unreserved_side() {
    let (mut adc, _device) = setup(Config::default());
    adc.configure(&ConfigureOptions::mux(AdcNum::Adc1, Channel::Ain2, Channel::Ain7)).unwrap();
    adc.set_rtd(true, AdcNum::Adc2).unwrap();
    let state = adc.state().unwrap();
    assert_eq!((state.adc_1.mux_p, state.adc_1.mux_n), (Channel::Ain2, Channel::AinCom));
    assert_eq!(state.rtd_adc, Some(AdcNum::Adc2));
}

#[test]
fn register_read_back_mismatch() {
    let (mut adc, device) = setup(Config::default());
    device.borrow_mut().stuck = Some(Register::Mode2.address());
    let result = adc.configure(&ConfigureOptions {
        adc_1_data_rate: Some(Adc1DataRate::Sps100),
        ..ConfigureOptions::EMPTY
    });
    assert_eq!(device_error(result), Error::RegisterUpdate {
        register: Register::Mode2,
        expected: 0x07,
        actual: 0x04,
    });
}

#[test]
fn read_back_can_be_skipped() {
    let cache = RegisterCache::new();
    let config = Config::default()
        .cache(cache.clone())
        .validate_writes(false);
    let (mut adc, device) = setup(config);
    device.borrow_mut().stuck = Some(Register::Mode2.address());
    adc.configure(&ConfigureOptions {
        adc_1_data_rate: Some(Adc1DataRate::Sps100),
        ..ConfigureOptions::EMPTY
    }).unwrap();
    assert_eq!(device.borrow().count(Event::ReadRegisters), 0);
    // The cache holds what was written, the device what it kept
    assert_eq!(cache.get().unwrap().get(Register::Mode2), 0x07);
    assert_eq!(adc.refresh().unwrap().get(Register::Mode2), 0x04);
}

#[test]
fn cache_avoids_register_reads_until_reset() {
    let cache = RegisterCache::new();
    let (mut adc, device) = setup(Config::default().cache(cache.clone()));
    adc.state().unwrap();
    adc.state().unwrap();
    assert_eq!(device.borrow().count(Event::ReadRegisters), 0);

    adc.reset().unwrap();
    assert_eq!(cache.get(), None);
    assert_eq!(device.borrow().commands(), vec![0x06]);
    let state = adc.state().unwrap();
    assert_eq!(state.checksum_mode, ChecksumMode::Checksum);
    assert_eq!(device.borrow().count(Event::ReadRegisters), 1);
}

#[test]
fn shared_cache_between_handles() {
    let cache = RegisterCache::new();
    let (mut first, _device) = setup(Config::default().cache(cache.clone()));
    let (mut second, _other) = setup(Config::default().cache(cache.clone()));
    first.configure(&ConfigureOptions {
        filter_mode: Some(FilterMode::Sinc2),
        ..ConfigureOptions::EMPTY
    }).unwrap();
    assert_eq!(second.state().unwrap().filter_mode, FilterMode::Sinc2);
}

#[test]
fn single_sample_end_to_end() {
    let mut calibration = CalibrationTable::unity();
    let calib = CalibParam { gain: 2.0, offset: 0.1 };
    calibration.insert(CalibKey::Channel(Channel::Ain1), calib);
    let (mut adc, device) = setup(Config::default().calibration(calibration));
    adc.configure(&ConfigureOptions {
        adc_1_mux_p: Some(Channel::Ain1),
        adc_1_mux_n: Some(Channel::AinCom),
        adc_1_data_rate: Some(Adc1DataRate::Sps20),
        conversion_mode: Some(ConversionMode::Pulse),
        ..ConfigureOptions::EMPTY
    }).unwrap();
    device.borrow_mut().adc1_sample = [0x40, 0x00, 0x00, 0x00];
    device.borrow_mut().events.clear();

    let volts = adc.single_sample().unwrap();

    let device = device.borrow();
    assert_eq!(device.commands(), vec![Command::Start1 as u8]);
    assert!(device.writes().is_empty());
    let start = device.events.iter().position(|&e| e == Event::Command(0x08)).unwrap();
    let read = device.events.iter().position(|&e| e == Event::ReadData(0x12)).unwrap();
    let waited: u32 = device.events[start..read].iter()
        .map(|event| match event {
            Event::Delay(us) => *us,
            _ => 0,
        })
        .sum();
    // ADC1, 20 SPS, FIR filter
    assert!(waited >= 52_220, "{}", waited);
    assert_eq!(device.count(Event::ReadData(0x12)), 1);

    let step_up = (19_100.0 + 4_990.0) / 4_990.0;
    let expected = 1.25 * step_up * calib.gain + calib.offset;
    assert!((volts - expected).abs() < 1e-9, "{} != {}", volts, expected);
}

#[test]
fn single_sample_switches_to_pulse_mode() {
    let (mut adc, device) = setup(Config::default());
    adc.single_sample().unwrap();
    assert_eq!(device.borrow().reg(Register::Mode0) & 0x40, 0x40);
    assert_eq!(device.borrow().commands(), vec![0x08]);
}

#[test]
fn continuous_read_requires_continuous_mode() {
    let (mut adc, _device) = setup(Config::default());
    adc.configure(&ConfigureOptions {
        conversion_mode: Some(ConversionMode::Pulse),
        ..ConfigureOptions::EMPTY
    }).unwrap();
    assert_eq!(device_error(adc.read_voltage(AdcNum::Adc1)), Error::ContinuousMode);
    adc.configure(&ConfigureOptions::mux(AdcNum::Adc2, Channel::Ain0, Channel::AinCom)).unwrap();
    adc.read_voltage(AdcNum::Adc2).unwrap();
}

#[test]
fn start_waits_initial_delay() {
    let (mut adc, device) = setup(Config::default());
    adc.start_conversions(AdcNum::Adc2).unwrap();
    adc.stop_conversions(AdcNum::Adc2).unwrap();
    let device = device.borrow();
    assert_eq!(device.commands(), vec![0x0C, 0x0E]);
    // 3 x 121 ms at 10 SPS
    assert!(device.events.contains(&Event::Delay(363_000)));
}

#[test]
fn differential_read() {
    let (mut adc, device) = setup(Config::default());
    adc.configure(&ConfigureOptions::mux(AdcNum::Adc1, Channel::Ain2, Channel::Ain3)).unwrap();
    device.borrow_mut().adc1_sample = [0xC0, 0x00, 0x00, 0x00];
    let volts = adc.read_voltage(AdcNum::Adc1).unwrap();
    let step_up = (19_100.0 + 4_990.0) / 4_990.0;
    assert!((volts + 1.25 * step_up).abs() < 1e-9, "{}", volts);
    assert!(device.borrow().events.contains(&Event::Delay(50_000)));
}

#[test]
fn unsupported_differential_pair() {
    let (mut adc, _device) = setup(Config::default());
    adc.configure(&ConfigureOptions::mux(AdcNum::Adc1, Channel::Ain1, Channel::Ain2)).unwrap();
    assert_eq!(
        device_error(adc.read_voltage(AdcNum::Adc1)),
        Error::InvalidDifferentialPair { mux_p: Channel::Ain1, mux_n: Channel::Ain2 }
    );
}

#[test]
fn corrupted_frame_is_rejected() {
    let (mut adc, device) = setup(Config::default());
    adc.configure(&ConfigureOptions::mux(AdcNum::Adc2, Channel::Ain4, Channel::AinCom)).unwrap();
    {
        let mut device = device.borrow_mut();
        device.adc2_sample = [0x33, 0x10, 0x7E];
        device.corrupt_check = true;
    }
    let expected = crc8(&[0x33, 0x10, 0x7E]);
    assert_eq!(
        device_error(adc.read_voltage(AdcNum::Adc2)),
        Error::ChecksumMismatch { expected, received: !expected }
    );
}

#[test]
fn rtd_temperature() {
    let (mut adc, device) = setup(Config::default());
    assert_eq!(device_error(adc.read_rtd_temperature()), Error::RtdDisabled);

    adc.set_rtd(true, AdcNum::Adc2).unwrap();
    // PT100 at 25 °C against the 1326.2 ohm reference
    let resistance = 100.0 + 0.385 * 25.0;
    let code = (resistance / 1326.2 * (1u32 << 22) as f64).round() as u32;
    device.borrow_mut().adc2_sample = [(code >> 16) as u8, (code >> 8) as u8, code as u8];
    let temperature = adc.read_rtd_temperature().unwrap();
    assert!((temperature - 25.0).abs() < 0.01, "{}", temperature);
}

#[test]
fn device_id() {
    let (mut adc, _device) = setup(Config::default());
    let id = adc.device_id().unwrap();
    assert_eq!(id.device(), 0b001);
    assert_eq!(id.revision(), 0b00001);
}

#[test]
fn text_commands() {
    let (mut adc, device) = setup(Config::default());
    let reply = TextCommand::parse(b"adc1 mux ain1 aincom").unwrap()
        .execute(&mut adc).unwrap();
    assert_eq!(reply, Reply::Done);
    assert_eq!(device.borrow().reg(Register::InpMux), 0x1A);

    match TextCommand::parse(b"show").unwrap().execute(&mut adc).unwrap() {
        Reply::State(state) => assert_eq!(state.adc_1.mux_n, Channel::AinCom),
        other => panic!("unexpected reply {:?}", other),
    }

    device.borrow_mut().adc1_sample = [0x00, 0x00, 0x00, 0x00];
    let reply = TextCommand::parse(b"read adc1").unwrap().execute(&mut adc).unwrap();
    assert_eq!(reply, Reply::Voltage(0.0));
    assert_eq!(reply.to_string(), "0.000000 V");
}

#[test]
fn spi_frames_are_framed_by_chip_select() {
    let (mut adc, device) = setup(Config::default());
    adc.refresh().unwrap();
    adc.free();
    assert!(!device.borrow().selected);
}

#[test]
fn concurrent_configure_keeps_cache_in_step() {
    let device: SyncShared = Arc::new(Mutex::new(Device::new()));
    let cache = RegisterCache::new();
    let handle = || Adc::new(
        SlowWriteSpi(device.clone()),
        SyncNss(device.clone()),
        NoDelay,
        Config::default().cache(cache.clone()).validate_writes(false),
    ).unwrap();
    let requests = vec![
        (handle(), ConfigureOptions {
            adc_1_data_rate: Some(Adc1DataRate::Sps100),
            ..ConfigureOptions::EMPTY
        }),
        (handle(), ConfigureOptions {
            filter_mode: Some(FilterMode::Sinc2),
            ..ConfigureOptions::EMPTY
        }),
    ];

    let barrier = Arc::new(Barrier::new(requests.len()));
    let threads = requests.into_iter()
        .map(|(mut adc, options)| {
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                adc.configure(&options).unwrap();
            })
        })
        .collect::<Vec<_>>();
    for worker in threads {
        worker.join().unwrap();
    }

    let device = device.lock().unwrap();
    assert_eq!(device.reg(Register::Mode1), 0x20);
    assert_eq!(device.reg(Register::Mode2), 0x07);
    let cached = cache.get().unwrap();
    assert_eq!(cached.as_bytes(), &device.regs[..]);
    assert_eq!(AdcState::from_registers(&cached).unwrap().filter_mode, FilterMode::Sinc2);
}
