use embedded_hal::blocking::delay::DelayUs;
use embedded_hal::blocking::spi::Transfer;
use embedded_hal::digital::v2::OutputPin;
use tracing::{debug, info, trace, warn};

use crate::config::{Config, RegisterCache};
use super::*;
use super::voltage::{InputMode, RtdSensor, VoltageScale};

/// Wait after `RESET` before the next command
const RESET_DELAY_US: u32 = 10_000;

/// How [`Adc::configure_with`] treats a request
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConfigureFlags {
    /// Allow changes to properties reserved by an enabled RTD
    pub override_rtd: bool,
    /// Read the registers back after writing and compare
    pub validate: bool,
}

impl Default for ConfigureFlags {
    fn default() -> Self {
        ConfigureFlags {
            override_rtd: false,
            validate: true,
        }
    }
}

/// ADS1263 controller
pub struct Adc<SPI: Transfer<u8>, NSS: OutputPin, D: DelayUs<u32>> {
    spi: SPI,
    nss: NSS,
    delay: D,
    cache: Option<RegisterCache>,
    validate_writes: bool,
    scale: VoltageScale,
    rtd: RtdSensor,
    calibration: CalibrationTable,
}

impl<SPI: Transfer<u8>, NSS: OutputPin, D: DelayUs<u32>> Adc<SPI, NSS, D> {
    pub fn new(spi: SPI, mut nss: NSS, delay: D, config: Config) -> Result<Self, AdcError<SPI::Error>> {
        let _ = nss.set_high();
        let Config { cache, validate_writes, scale, rtd, calibration, startup } = config;
        let mut adc = Adc {
            spi, nss, delay,
            cache,
            validate_writes,
            scale,
            rtd,
            calibration,
        };
        if !startup.is_empty() {
            adc.configure(&startup)?;
        }
        Ok(adc)
    }

    /// Release the bus, chip select and delay
    pub fn free(self) -> (SPI, NSS, D) {
        (self.spi, self.nss, self.delay)
    }

    pub fn device_id(&mut self) -> Result<DeviceId, AdcError<SPI::Error>> {
        let map = self.read_registers()?;
        Ok(DeviceId(map.get(Register::Id)))
    }

    /// Register contents, from the cache when it holds them
    pub fn registers(&mut self) -> Result<RegisterMap, AdcError<SPI::Error>> {
        if let Some(map) = self.cache.as_ref().and_then(RegisterCache::get) {
            return Ok(map);
        }
        self.refresh()
    }

    /// Read all registers from the device and replace the cached copy
    pub fn refresh(&mut self) -> Result<RegisterMap, AdcError<SPI::Error>> {
        let map = self.read_registers()?;
        self.store(&map);
        Ok(map)
    }

    pub fn state(&mut self) -> Result<AdcState, AdcError<SPI::Error>> {
        let map = self.registers()?;
        Ok(AdcState::from_registers(&map)?)
    }

    pub fn reset(&mut self) -> Result<(), AdcError<SPI::Error>> {
        self.command(Command::Reset)?;
        self.delay.delay_us(RESET_DELAY_US);
        if let Some(cache) = &self.cache {
            cache.invalidate();
        }
        info!("ADS1263 reset");
        Ok(())
    }

    pub fn configure(&mut self, options: &ConfigureOptions) -> Result<(), AdcError<SPI::Error>> {
        let flags = ConfigureFlags {
            validate: self.validate_writes,
            ..ConfigureFlags::default()
        };
        self.configure_with(options, flags)
    }

    /// Apply `options` as one read-modify-write. A shared cache stays locked
    /// from the read through the writes, so controllers of the same device
    /// cannot overwrite each other's changes.
    pub fn configure_with(
        &mut self,
        options: &ConfigureOptions,
        flags: ConfigureFlags,
    ) -> Result<(), AdcError<SPI::Error>> {
        self.with_cache_held(|this, cached| this.configure_held(cached, options, flags))
    }

    fn configure_held(
        &mut self,
        cached: &mut Option<RegisterMap>,
        options: &ConfigureOptions,
        flags: ConfigureFlags,
    ) -> Result<(), AdcError<SPI::Error>> {
        let current = self.current_registers(cached)?;
        let state = AdcState::from_registers(&current)?;
        let entries = options.entries();
        debug!(?options, ?flags, "configure");

        if !flags.override_rtd && state.rtd_enabled() {
            if let Some(rtd_adc) = state.rtd_adc {
                let reserved = rtd_reserved_properties(rtd_adc);
                if let Some((property, _)) = entries.iter().find(|(property, _)| reserved.contains(property)) {
                    return Err(Error::RtdEnabled { property: property.name() }.into());
                }
            }
        }

        for &adc in [AdcNum::Adc1, AdcNum::Adc2].iter() {
            if let (None, Some(_)) = options.mux_request(adc) {
                return Err(Error::MuxNegativeWithoutPositive { adc }.into());
            }
        }
        let channels = options.channels();
        mux::validate_no_collision(&channels)?;
        mux::validate_allowed(&channels, state.rtd_enabled() && !flags.override_rtd)?;
        let mut opcodes = mux::assign_channels(
            options.adc_1_mux_p, options.adc_1_mux_n,
            options.adc_2_mux_p, options.adc_2_mux_n,
        );

        for &(property, setting) in entries.iter().filter(|(property, _)| !property.is_mux()) {
            opcodes.push(encode(property.descriptor(), setting)?);
        }

        let mut working = current;
        let changed = working.apply_all(&opcodes)?;
        let written = changed.into_iter()
            .filter(|&(_, changed)| changed)
            .map(|(register, _)| register)
            .collect::<Vec<_>>();
        if written.is_empty() {
            debug!("configure: no register changes");
            return Ok(());
        }
        for &register in &written {
            let value = working.get(register);
            debug!(?register, value, "write register");
            self.write_register(register, value)?;
        }

        if flags.validate {
            let actual = self.read_registers()?;
            *cached = Some(actual.clone());
            for &register in &written {
                let expected = working.get(register);
                if actual.get(register) != expected {
                    warn!(?register, expected, actual = actual.get(register), "register update failed");
                    return Err(Error::RegisterUpdate {
                        register,
                        expected,
                        actual: actual.get(register),
                    }.into());
                }
            }
        } else {
            *cached = Some(working);
        }
        Ok(())
    }

    /// Run `f` with the shared cache locked for its whole duration. `f`
    /// must go through its `cached` argument instead of `registers`/`store`.
    fn with_cache_held<T, F>(&mut self, f: F) -> Result<T, AdcError<SPI::Error>>
    where
        F: FnOnce(&mut Self, &mut Option<RegisterMap>) -> Result<T, AdcError<SPI::Error>>,
    {
        match self.cache.clone() {
            Some(cache) => {
                let mut held = cache.lock();
                f(self, &mut *held)
            }
            None => f(self, &mut None),
        }
    }

    fn current_registers(&mut self, cached: &mut Option<RegisterMap>) -> Result<RegisterMap, AdcError<SPI::Error>> {
        if let Some(map) = cached.as_ref() {
            return Ok(map.clone());
        }
        let map = self.read_registers()?;
        *cached = Some(map.clone());
        Ok(map)
    }

    /// Attach the RTD to `adc`, or detach it. Enabling moves the other
    /// converter off the RTD inputs: positive to float, negative to AINCOM.
    pub fn set_rtd(&mut self, enable: bool, adc: AdcNum) -> Result<(), AdcError<SPI::Error>> {
        let flags = ConfigureFlags {
            override_rtd: true,
            validate: self.validate_writes,
        };
        self.with_cache_held(|this, cached| {
            let options = if enable {
                let state = AdcState::from_registers(&this.current_registers(cached)?)?;
                let mut options = rtd_on(adc);
                let other = state.converter(adc.other());
                if other.mux_p.is_rtd_reserved() || other.mux_n.is_rtd_reserved() {
                    let mux_p = if other.mux_p.is_rtd_reserved() { Channel::Float } else { other.mux_p };
                    let mux_n = if other.mux_n.is_rtd_reserved() { Channel::AinCom } else { other.mux_n };
                    info!(adc = %adc.other(), %mux_p, %mux_n, "moving off RTD inputs");
                    options.set_mux(adc.other(), Some(mux_p), Some(mux_n));
                }
                options
            } else {
                RTD_OFF
            };
            this.configure_held(cached, &options, flags)
        })?;
        if enable {
            info!(%adc, "RTD enabled");
        } else {
            info!("RTD disabled");
        }
        Ok(())
    }

    /// Issue the start command and wait for the first conversion
    pub fn start_conversions(&mut self, adc: AdcNum) -> Result<(), AdcError<SPI::Error>> {
        let state = self.state()?;
        self.start(adc, &state)
    }

    pub fn stop_conversions(&mut self, adc: AdcNum) -> Result<(), AdcError<SPI::Error>> {
        self.command(adc.stop_command())
    }

    /// Next conversion of a free-running converter, in volts at the terminal
    pub fn read_voltage(&mut self, adc: AdcNum) -> Result<f64, AdcError<SPI::Error>> {
        let state = self.state()?;
        self.wait_for_conversion(adc, &state)?;
        self.read_sample(adc, &state)
    }

    /// One ADC1 conversion in pulse mode
    pub fn single_sample(&mut self) -> Result<f64, AdcError<SPI::Error>> {
        let mut state = self.state()?;
        if state.adc_1.conversion_mode != ConversionMode::Pulse {
            self.configure(&ConfigureOptions {
                conversion_mode: Some(ConversionMode::Pulse),
                ..ConfigureOptions::EMPTY
            })?;
            state = self.state()?;
        }
        self.start(AdcNum::Adc1, &state)?;
        self.read_sample(AdcNum::Adc1, &state)
    }

    /// RTD temperature in °C from whichever converter the RTD is attached to
    pub fn read_rtd_temperature(&mut self) -> Result<f64, AdcError<SPI::Error>> {
        let state = self.state()?;
        let adc = match (state.rtd_mode, state.rtd_adc) {
            (RtdMode::On, Some(adc)) => adc,
            _ => return Err(Error::RtdDisabled.into()),
        };
        let calib = self.calibration.lookup(CalibKey::Rtd)?;
        self.wait_for_conversion(adc, &state)?;
        let data = self.read_data(adc, state.frame_layout(adc))?;
        Ok(voltage::decode_rtd_temperature(&data, &self.rtd, adc, calib)?)
    }

    fn start(&mut self, adc: AdcNum, state: &AdcState) -> Result<(), AdcError<SPI::Error>> {
        let converter = state.converter(adc);
        let delay = timing::initial_delay_ms(converter.data_rate, state.filter_mode)?;
        self.command(adc.start_command())?;
        debug!(%adc, delay, "conversions started");
        self.wait_ms(delay);
        Ok(())
    }

    fn wait_for_conversion(&mut self, adc: AdcNum, state: &AdcState) -> Result<(), AdcError<SPI::Error>> {
        let converter = state.converter(adc);
        if adc == AdcNum::Adc1 && converter.conversion_mode != ConversionMode::Continuous {
            return Err(Error::ContinuousMode.into());
        }
        self.wait_ms(timing::continuous_delay_ms(converter.data_rate));
        Ok(())
    }

    fn read_sample(&mut self, adc: AdcNum, state: &AdcState) -> Result<f64, AdcError<SPI::Error>> {
        let converter = state.converter(adc);
        let calib = voltage::select_calibration(&self.calibration, converter.mux_p, converter.mux_n)?;
        let mode = InputMode::from_mux_n(converter.mux_n);
        let data = self.read_data(adc, state.frame_layout(adc))?;
        let volts = voltage::decode_voltage(&data, adc.data_bytes(), calib, mode, &self.scale)?;
        debug!(%adc, ?mode, volts, "sample");
        Ok(volts)
    }

    fn read_data(&mut self, adc: AdcNum, layout: voltage::FrameLayout) -> Result<Vec<u8>, AdcError<SPI::Error>> {
        let mut buf = vec![0; 1 + layout.len()];
        buf[0] = adc.read_command() as u8;
        self.transfer(&mut buf)?;
        let frame = voltage::parse_frame(layout, &buf[1..])
            .map_err(|e| {
                warn!(%adc, error = %e, "conversion frame rejected");
                e
            })?;
        if let Some(status) = frame.status {
            trace!(status = status.0, "status byte");
            if status.reset() {
                warn!("device reset detected");
            }
            if status.has_alarm() {
                warn!(
                    pga_output = status.pga_output_alarm(),
                    pga_high = status.pga_high_alarm(),
                    pga_low = status.pga_low_alarm(),
                    reference = status.reference_alarm(),
                    "ADC alarm"
                );
            }
        }
        Ok(frame.data.to_vec())
    }

    fn store(&self, map: &RegisterMap) {
        if let Some(cache) = &self.cache {
            cache.store(map.clone());
        }
    }

    fn wait_ms(&mut self, ms: f64) {
        let us = (ms * 1000.0).ceil() as u32;
        trace!(us, "delay");
        self.delay.delay_us(us);
    }

    fn read_registers(&mut self) -> Result<RegisterMap, AdcError<SPI::Error>> {
        let mut buf = [0u8; 2 + NUM_REGISTERS];
        buf[0] = READ_REGISTERS;
        buf[1] = (NUM_REGISTERS - 1) as u8;
        self.transfer(&mut buf)?;
        Ok(RegisterMap::from_bytes(&buf[2..])?)
    }

    fn write_register(&mut self, register: Register, value: u8) -> Result<(), AdcError<SPI::Error>> {
        let mut buf = [WRITE_REGISTERS | register.address(), 0, value];
        self.transfer(&mut buf)
    }

    fn command(&mut self, command: Command) -> Result<(), AdcError<SPI::Error>> {
        trace!(?command, "command");
        self.transfer(&mut [command as u8])
    }

    fn transfer(&mut self, buf: &mut [u8]) -> Result<(), AdcError<SPI::Error>> {
        trace!(tx = ?buf, "SPI");
        let _ = self.nss.set_low();
        let result = self.spi.transfer(buf).map(|_| ());
        let _ = self.nss.set_high();
        result.map_err(AdcError::SPI)?;
        trace!(rx = ?buf, "SPI");
        Ok(())
    }
}
