//! Two-line status display.
//!
//! The state machine only ever pushes text; nothing it does depends on what
//! the display shows.

/// Status display interface.
pub trait Display {
    /// Show a progress message.
    fn show_status(&mut self, line1: &str, line2: &str);

    /// Show a fault message.
    fn show_error(&mut self, line1: &str, line2: &str);

    /// Show the drive identity screen. `image_name` is empty when no
    /// cartridge is loaded.
    fn show_drive_address(&mut self, address: u8, fixed_mode: bool, image_name: &str);
}

/// One entry recorded by `HeadlessDisplay`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Screen {
    Status(String, String),
    Error(String, String),
    DriveAddress {
        address: u8,
        fixed_mode: bool,
        image_name: String,
    },
}

/// Headless display for testing - records every screen pushed to it.
#[derive(Debug, Default)]
pub struct HeadlessDisplay {
    screens: Vec<Screen>,
}

impl HeadlessDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn screens(&self) -> &[Screen] {
        &self.screens
    }

    pub fn last(&self) -> Option<&Screen> {
        self.screens.last()
    }

    /// Most recent error screen, if any.
    pub fn last_error(&self) -> Option<(&str, &str)> {
        self.screens.iter().rev().find_map(|screen| match screen {
            Screen::Error(line1, line2) => Some((line1.as_str(), line2.as_str())),
            _ => None,
        })
    }

    /// True if a status screen with exactly these lines was shown.
    pub fn showed_status(&self, line1: &str, line2: &str) -> bool {
        self.screens
            .iter()
            .any(|screen| matches!(screen, Screen::Status(a, b) if a == line1 && b == line2))
    }

    pub fn clear(&mut self) {
        self.screens.clear();
    }
}

impl Display for HeadlessDisplay {
    fn show_status(&mut self, line1: &str, line2: &str) {
        self.screens
            .push(Screen::Status(line1.to_string(), line2.to_string()));
    }

    fn show_error(&mut self, line1: &str, line2: &str) {
        self.screens
            .push(Screen::Error(line1.to_string(), line2.to_string()));
    }

    fn show_drive_address(&mut self, address: u8, fixed_mode: bool, image_name: &str) {
        self.screens.push(Screen::DriveAddress {
            address,
            fixed_mode,
            image_name: image_name.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headless_display_records() {
        let mut display = HeadlessDisplay::new();
        display.show_status("microSD", "detected");
        display.show_error("no microSD", "inserted");
        display.show_drive_address(1, false, "");

        assert_eq!(display.screens().len(), 3);
        assert!(display.showed_status("microSD", "detected"));
        assert_eq!(display.last_error(), Some(("no microSD", "inserted")));
        assert_eq!(
            display.last(),
            Some(&Screen::DriveAddress {
                address: 1,
                fixed_mode: false,
                image_name: String::new(),
            })
        );
    }
}
