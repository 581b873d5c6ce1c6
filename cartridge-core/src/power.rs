//! Supply voltage monitor.
//!
//! DC-low asserts below the lower threshold and clears only above the upper
//! one.

use crate::config::PowerConfig;

/// A change in the debounced supply state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerEdge {
    Low,
    Restored,
}

#[derive(Debug, Clone)]
pub struct PowerMonitor {
    lower: u16,
    upper: u16,
    dc_low: bool,
    last_sample: u16,
}

impl PowerMonitor {
    pub fn new(config: &PowerConfig) -> Self {
        Self {
            lower: config.lower_threshold,
            upper: config.upper_threshold,
            dc_low: false,
            last_sample: 0,
        }
    }

    pub fn is_low(&self) -> bool {
        self.dc_low
    }

    pub fn last_sample(&self) -> u16 {
        self.last_sample
    }

    /// Feed one raw supply reading. Returns the edge if the debounced state
    /// changed, `None` otherwise.
    pub fn sample(&mut self, raw: u16) -> Option<PowerEdge> {
        self.last_sample = raw;
        let was_low = self.dc_low;
        self.dc_low = if was_low {
            raw <= self.upper
        } else {
            raw < self.lower
        };

        match (was_low, self.dc_low) {
            (false, true) => Some(PowerEdge::Low),
            (true, false) => Some(PowerEdge::Restored),
            _ => None,
        }
    }
}
