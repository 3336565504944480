use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::ads1263::{
    voltage::{RtdSensor, VoltageScale},
    CalibrationTable, ChecksumMode, ConfigureOptions, RegisterMap, StatusByte,
};

/// Applied by `Adc::new`: CRC-checked frames with a status byte, and the
/// reset flag cleared so a later device reset shows up in the status byte
pub const DEFAULT_STARTUP: ConfigureOptions = ConfigureOptions {
    checksum_mode: Some(ChecksumMode::Crc),
    status_byte: Some(StatusByte::On),
    reset_clear: true,
    ..ConfigureOptions::EMPTY
};

/// Last known register contents, shared by every handle of one device.
/// Configuration keeps it locked across its register writes.
#[derive(Clone, Debug, Default)]
pub struct RegisterCache(Arc<Mutex<Option<RegisterMap>>>);

impl RegisterCache {
    pub fn new() -> Self {
        RegisterCache::default()
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, Option<RegisterMap>> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self) -> Option<RegisterMap> {
        self.lock().clone()
    }

    pub fn store(&self, map: RegisterMap) {
        *self.lock() = Some(map);
    }

    pub fn invalidate(&self) {
        *self.lock() = None;
    }
}

pub struct Config {
    pub(crate) cache: Option<RegisterCache>,
    pub(crate) validate_writes: bool,
    pub(crate) scale: VoltageScale,
    pub(crate) rtd: RtdSensor,
    pub(crate) calibration: CalibrationTable,
    pub(crate) startup: ConfigureOptions,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            cache: None,
            validate_writes: true,
            scale: VoltageScale::default(),
            rtd: RtdSensor::default(),
            calibration: CalibrationTable::unity(),
            startup: DEFAULT_STARTUP,
        }
    }
}

impl Config {
    /// Keep register contents between operations instead of reading them
    /// back for each one. Pass a clone of one cache to every controller of
    /// the same device.
    pub fn cache(mut self, cache: RegisterCache) -> Self {
        self.cache = Some(cache);

        self
    }

    /// Skip the read-back after register writes
    pub fn validate_writes(mut self, validate: bool) -> Self {
        self.validate_writes = validate;

        self
    }

    pub fn scale(mut self, scale: VoltageScale) -> Self {
        self.scale = scale;

        self
    }

    pub fn rtd_sensor(mut self, rtd: RtdSensor) -> Self {
        self.rtd = rtd;

        self
    }

    pub fn calibration(mut self, calibration: CalibrationTable) -> Self {
        self.calibration = calibration;

        self
    }

    pub fn startup(mut self, startup: ConfigureOptions) -> Self {
        self.startup = startup;

        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_is_shared_between_clones() {
        let cache = RegisterCache::new();
        let other = cache.clone();
        assert_eq!(other.get(), None);
        cache.store(RegisterMap::reset_values());
        assert_eq!(other.get(), Some(RegisterMap::reset_values()));
        other.invalidate();
        assert_eq!(cache.get(), None);
    }

    #[test]
    fn defaults() {
        let config = Config::default();
        assert!(config.cache.is_none());
        assert!(config.validate_writes);
        assert_eq!(config.startup, DEFAULT_STARTUP);
        assert!(!config.startup.is_empty());
    }
}
