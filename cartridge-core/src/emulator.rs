//! Cartridge emulator - owns the drive state and runs the tick loop.

use tracing::{debug, info, warn};

use crate::actuator::{DoorActuator, DoorStatus};
use crate::config::EmulatorConfig;
use crate::console::{ConsoleCommand, Mailbox};
use crate::display::Display;
use crate::error::EmulatorResult;
use crate::hardware::{DriveController, DriveEvent, FrontPanel, Lamp};
use crate::machine::{self, StepContext};
use crate::power::{PowerEdge, PowerMonitor};
use crate::state::{DriveState, RunLoadState};
use crate::storage::ImageStore;

/// The emulator: drive state, door, power monitor and the collaborators
/// they act on.
pub struct Emulator<C, P, S, D> {
    config: EmulatorConfig,
    drive: DriveState,
    actuator: DoorActuator,
    power: PowerMonitor,
    controller: C,
    panel: P,
    store: S,
    display: D,
    mailbox: Mailbox,
    event_logging: bool,
    ticks: u64,
}

impl<C, P, S, D> Emulator<C, P, S, D>
where
    C: DriveController,
    P: FrontPanel,
    S: ImageStore,
    D: Display,
{
    /// Validate the configuration and bring the hardware to its boot state.
    pub fn new(
        config: EmulatorConfig,
        mut controller: C,
        mut panel: P,
        store: S,
        display: D,
    ) -> EmulatorResult<Self> {
        config.validate()?;

        controller.set_cartridge_ready(false)?;
        controller.set_fault_latch(false)?;
        panel.set_dc_low(false);
        for lamp in [Lamp::Ready, Lamp::Fault, Lamp::Unlock, Lamp::Media] {
            panel.set_lamp(lamp, false);
        }

        let drive_address = match config.drive_address {
            Some(address) => address,
            None => controller.drive_address()?,
        };
        let mut drive = DriveState::new(drive_address, config.fixed_mode);
        drive.board_version = panel.board_version();
        drive.controller_version = controller.firmware_version()?;
        let real_mode = controller.real_mode()?;
        info!(
            controller = %drive.controller_version,
            board = drive.board_version,
            drive_address,
            mode = if real_mode { "real" } else { "virtual" },
            "emulator starting"
        );

        // Prime the switch state so a key held at power-on is not an edge.
        let switches = panel.read_switches();
        drive.update_switches(switches);

        let mut actuator = DoorActuator::new(&config.actuator);
        if !switches.run_load {
            debug!("switch at unload on boot, opening door");
            actuator.open();
        }

        Ok(Self {
            power: PowerMonitor::new(&config.power),
            config,
            drive,
            actuator,
            controller,
            panel,
            store,
            display,
            mailbox: Mailbox::new(),
            event_logging: false,
            ticks: 0,
        })
    }

    /// Run one tick: sample inputs, move the door, step the state machine,
    /// refresh the display and drain the console.
    pub fn tick(&mut self) -> EmulatorResult<RunLoadState> {
        self.sample_inputs()?;

        if self.actuator.is_moving() {
            let (status, pulse) = self.actuator.advance();
            self.controller.write_servo(pulse)?;
            if status != DoorStatus::Moving {
                debug!(?status, "door stopped");
            }
        }

        let mut ctx = StepContext {
            drive: &mut self.drive,
            actuator: &mut self.actuator,
            controller: &mut self.controller,
            panel: &mut self.panel,
            store: &mut self.store,
            display: &mut self.display,
            config: &self.config,
        };
        machine::step(&mut ctx)?;

        self.refresh_display();
        self.drain_mailbox();

        let interval = self.config.status_log_interval as u64;
        if interval != 0 && self.ticks % interval == 0 {
            info!(
                tick = self.ticks,
                drive_address = self.drive.drive_address,
                state = %self.drive.state,
                vsense = self.power.last_sample(),
                "status"
            );
        }
        self.ticks += 1;
        Ok(self.drive.state)
    }

    fn sample_inputs(&mut self) -> EmulatorResult<()> {
        let switches = self.panel.read_switches();
        if self.drive.update_switches(switches) {
            debug!("write-protect pressed, toggling read-only");
            self.controller.toggle_read_only()?;
        }

        let raw = self.panel.sample_supply();
        match self.power.sample(raw) {
            Some(PowerEdge::Low) => warn!(raw, "DC low detected"),
            Some(PowerEdge::Restored) => info!(raw, "DC supply restored"),
            None => {}
        }
        self.drive.dc_low = self.power.is_low();
        self.panel.set_dc_low(self.drive.dc_low);
        if self.drive.dc_low {
            self.display.show_error("DC Low", "detected");
        }

        let power_failed = self.panel.host_power_failed();
        if power_failed != self.drive.power_failed {
            if power_failed {
                warn!("host power fail asserted");
            } else {
                info!("host power restored");
            }
        }
        self.drive.power_failed = power_failed;
        Ok(())
    }

    fn refresh_display(&mut self) {
        let drive = &self.drive;
        let name = match drive.state {
            RunLoadState::Idle | RunLoadState::LoadErrorOn | RunLoadState::UnloadErrorOn => {
                drive.displayed_name()
            }
            RunLoadState::ReadyWait | RunLoadState::Running => drive.image_name.as_str(),
            _ => return,
        };
        self.display
            .show_drive_address(drive.drive_address, drive.fixed_mode, name);
    }

    fn drain_mailbox(&mut self) {
        let Some(ch) = self.mailbox.take() else {
            return;
        };
        match ConsoleCommand::parse(ch) {
            Some(ConsoleCommand::EnableEventLog) => {
                info!("begin logging events");
                self.event_logging = true;
            }
            Some(ConsoleCommand::DisableEventLog) => {
                info!("stop logging events");
                self.event_logging = false;
            }
            None => debug!(?ch, "ignored console input"),
        }
    }

    /// Handle the controller's event interrupt. Does nothing unless event
    /// logging is on and the interrupt line is asserted. Only reads and
    /// logs; the state machine never sees drive events.
    pub fn service_interrupt(&mut self) -> EmulatorResult<Option<DriveEvent>> {
        if !self.event_logging || !self.controller.interrupt_pending()? {
            return Ok(None);
        }
        let event = self.controller.read_drive_event()?;
        match event {
            DriveEvent::Seek { cylinder } => info!(cylinder, "SEEK"),
            DriveEvent::Read { cylinder, head, sector } => info!(cylinder, head, sector, "READ"),
            DriveEvent::Write { cylinder, head, sector } => info!(cylinder, head, sector, "WRITE"),
            DriveEvent::Unknown { operation } => warn!(operation, "unknown drive event"),
        }
        Ok(Some(event))
    }

    /// Handle for posting console characters from another thread.
    pub fn mailbox(&self) -> Mailbox {
        self.mailbox.clone()
    }

    pub fn state(&self) -> RunLoadState {
        self.drive.state
    }

    pub fn drive(&self) -> &DriveState {
        &self.drive
    }

    pub fn actuator(&self) -> &DoorActuator {
        &self.actuator
    }

    pub fn power(&self) -> &PowerMonitor {
        &self.power
    }

    pub fn config(&self) -> &EmulatorConfig {
        &self.config
    }

    pub fn event_logging(&self) -> bool {
        self.event_logging
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn controller(&self) -> &C {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut C {
        &mut self.controller
    }

    pub fn panel(&self) -> &P {
        &self.panel
    }

    pub fn panel_mut(&mut self) -> &mut P {
        &mut self.panel
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn display(&self) -> &D {
        &self.display
    }

    pub fn display_mut(&mut self) -> &mut D {
        &mut self.display
    }
}
