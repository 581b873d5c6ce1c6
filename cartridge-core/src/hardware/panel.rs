//! Operator front panel and board-level I/O lines.

/// Indicator lamps driven by the firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lamp {
    /// Drive ready.
    Ready,
    /// Drive fault; flashes in the error states.
    Fault,
    /// Cartridge unlocked, door may be opened.
    Unlock,
    /// Flash media activity.
    Media,
}

/// Switch levels sampled once per tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SwitchReading {
    /// True in the "load" position.
    pub run_load: bool,
    pub write_protect: bool,
}

/// Digital and analog lines outside the drive controller.
pub trait FrontPanel {
    fn read_switches(&mut self) -> SwitchReading;

    /// Host power-fail input.
    fn host_power_failed(&mut self) -> bool;

    /// Raw ADC reading of the supply voltage.
    fn sample_supply(&mut self) -> u16;

    fn set_lamp(&mut self, lamp: Lamp, on: bool);

    /// DC-low output line toward the host.
    fn set_dc_low(&mut self, low: bool);

    /// Board revision strap, read at boot.
    fn board_version(&mut self) -> u8;
}

/// In-memory front panel. Inputs are public fields; outputs are recorded.
#[derive(Debug, Clone)]
pub struct SimulatedPanel {
    pub run_load: bool,
    pub write_protect: bool,
    pub power_failed: bool,
    pub supply: u16,
    pub board: u8,
    lamps: [bool; 4],
    dc_low: bool,
}

impl Default for SimulatedPanel {
    fn default() -> Self {
        Self {
            run_load: false,
            write_protect: false,
            power_failed: false,
            supply: 3100,
            board: 2,
            lamps: [false; 4],
            dc_low: false,
        }
    }
}

impl SimulatedPanel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lamp(&self, lamp: Lamp) -> bool {
        self.lamps[Self::slot(lamp)]
    }

    pub fn dc_low(&self) -> bool {
        self.dc_low
    }

    fn slot(lamp: Lamp) -> usize {
        match lamp {
            Lamp::Ready => 0,
            Lamp::Fault => 1,
            Lamp::Unlock => 2,
            Lamp::Media => 3,
        }
    }
}

impl FrontPanel for SimulatedPanel {
    fn read_switches(&mut self) -> SwitchReading {
        SwitchReading {
            run_load: self.run_load,
            write_protect: self.write_protect,
        }
    }

    fn host_power_failed(&mut self) -> bool {
        self.power_failed
    }

    fn sample_supply(&mut self) -> u16 {
        self.supply
    }

    fn set_lamp(&mut self, lamp: Lamp, on: bool) {
        self.lamps[Self::slot(lamp)] = on;
    }

    fn set_dc_low(&mut self, low: bool) {
        self.dc_low = low;
    }

    fn board_version(&mut self) -> u8 {
        self.board
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lamps_are_independent() {
        let mut panel = SimulatedPanel::new();
        panel.set_lamp(Lamp::Fault, true);
        assert!(panel.lamp(Lamp::Fault));
        assert!(!panel.lamp(Lamp::Ready));
        assert!(!panel.lamp(Lamp::Unlock));
        assert!(!panel.lamp(Lamp::Media));
    }

    #[test]
    fn test_switches_reflect_fields() {
        let mut panel = SimulatedPanel::new();
        panel.run_load = true;
        assert_eq!(
            panel.read_switches(),
            SwitchReading { run_load: true, write_protect: false }
        );
    }
}
