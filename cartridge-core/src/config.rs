//! Emulator configuration.
//!
//! Every threshold the firmware depends on is supplied here at construction
//! rather than compiled in, so a bench setup (or a test) can tighten the
//! timing. Configuration files are JSON; every field has a default matching
//! the production hardware.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{EmulatorError, EmulatorResult};

/// Servo pulse widths for door positions 0 (open) through 20 (closed).
pub const DEFAULT_DUTY_TABLE: [u8; 21] = [
    47, 49, 51, 53, 55, 57, 59, 61, 63, 65, 67, 69, 71, 73, 75, 77, 79, 81, 83, 85, 88,
];

/// Door actuator ramp parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ActuatorConfig {
    /// Closed position; open is always 0.
    pub motor_max: u8,
    /// Pulse width for each position, `motor_max + 1` entries.
    pub duty_table: Vec<u8>,
}

impl Default for ActuatorConfig {
    fn default() -> Self {
        Self {
            motor_max: 20,
            duty_table: DEFAULT_DUTY_TABLE.to_vec(),
        }
    }
}

/// Supply voltage hysteresis, in raw ADC counts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PowerConfig {
    /// Below this the supply is declared low (~4.70 V).
    pub lower_threshold: u16,
    /// Above this a low supply is declared restored (~4.85 V).
    pub upper_threshold: u16,
}

impl Default for PowerConfig {
    fn default() -> Self {
        Self {
            lower_threshold: 2850,
            upper_threshold: 2940,
        }
    }
}

/// Fault lamp flash periods, in ticks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FlashConfig {
    pub load_on: u16,
    pub load_off: u16,
    pub unload_on: u16,
    pub unload_off: u16,
}

impl Default for FlashConfig {
    fn default() -> Self {
        Self {
            load_on: 7,
            load_off: 7,
            unload_on: 4,
            unload_off: 4,
        }
    }
}

/// Top-level emulator configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EmulatorConfig {
    /// Tick period in milliseconds.
    pub tick_ms: u64,
    /// Drive address shown on the display. Read from the controller's
    /// address straps when unset.
    pub drive_address: Option<u8>,
    /// Fixed-platter mode flag shown on the display.
    pub fixed_mode: bool,
    /// Image file name on the media.
    pub image_file: String,
    /// Boards before version 2 cannot clock more sectors than this.
    pub max_sectors_legacy_board: u32,
    /// Emit a periodic status line every this many ticks (0 disables).
    pub status_log_interval: u32,
    /// Bytes of controller RAM available to hold the cartridge payload.
    pub device_ram_bytes: u32,
    pub actuator: ActuatorConfig,
    pub power: PowerConfig,
    pub flash: FlashConfig,
}

impl Default for EmulatorConfig {
    fn default() -> Self {
        Self {
            tick_ms: 100,
            drive_address: None,
            fixed_mode: false,
            image_file: "2315.dsk".to_string(),
            max_sectors_legacy_board: 16,
            status_log_interval: 50,
            device_ram_bytes: 0x20_0000,
            actuator: ActuatorConfig::default(),
            power: PowerConfig::default(),
            flash: FlashConfig::default(),
        }
    }
}

impl EmulatorConfig {
    /// Parse and validate a JSON configuration.
    pub fn from_json(text: &str) -> EmulatorResult<Self> {
        let config: EmulatorConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON configuration file.
    pub fn load(path: &Path) -> EmulatorResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    /// Check the cross-field invariants the subsystems rely on.
    pub fn validate(&self) -> EmulatorResult<()> {
        if self.tick_ms == 0 {
            return Err(EmulatorError::Config("tickMs must be non-zero".into()));
        }
        if self.actuator.motor_max == 0 {
            return Err(EmulatorError::Config("motorMax must be non-zero".into()));
        }
        let expected = self.actuator.motor_max as usize + 1;
        if self.actuator.duty_table.len() != expected {
            return Err(EmulatorError::Config(format!(
                "dutyTable has {} entries, expected {}",
                self.actuator.duty_table.len(),
                expected
            )));
        }
        if self.actuator.duty_table.windows(2).any(|w| w[0] > w[1]) {
            return Err(EmulatorError::Config(
                "dutyTable must be monotonically increasing".into(),
            ));
        }
        if self.power.upper_threshold <= self.power.lower_threshold {
            return Err(EmulatorError::Config(format!(
                "upperThreshold ({}) must be above lowerThreshold ({})",
                self.power.upper_threshold, self.power.lower_threshold
            )));
        }
        if self.drive_address.is_some_and(|address| address > 3) {
            return Err(EmulatorError::Config("driveAddress must be 0-3".into()));
        }
        if self.device_ram_bytes == 0 {
            return Err(EmulatorError::Config("deviceRamBytes must be non-zero".into()));
        }
        let flash = &self.flash;
        if [flash.load_on, flash.load_off, flash.unload_on, flash.unload_off].contains(&0) {
            return Err(EmulatorError::Config("flash periods must be non-zero".into()));
        }
        Ok(())
    }
}
