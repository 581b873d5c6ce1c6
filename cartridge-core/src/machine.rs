//! Load/unload protocol state machine.
//!
//! `step` runs exactly one state handler per tick. Handlers never loop or
//! retry: a storage failure routes straight into the load or unload error
//! track, releasing any open image first. Register bus failures are not part
//! of the cartridge fault model and propagate out as `EmulatorError::Bus`.

use tracing::{debug, info, warn};

use crate::actuator::{DoorActuator, DoorStatus};
use crate::config::EmulatorConfig;
use crate::display::Display;
use crate::error::{CartridgeFault, EmulatorResult};
use crate::hardware::{DriveController, FrontPanel, Lamp};
use crate::state::{DriveState, RunLoadState};
use crate::storage::image::payload_len;
use crate::storage::{HeaderError, ImageStore, StorageError};

use crate::state::RunLoadState::*;

/// Every state change `step` may perform, as `(from, to)`.
pub const TRANSITIONS: &[(RunLoadState, RunLoadState)] = &[
    (Idle, AwaitMedia),
    (AwaitMedia, MountFs),
    (AwaitMedia, LoadError),
    (MountFs, OpenImage),
    (MountFs, LoadError),
    (OpenImage, ReadHeader),
    (OpenImage, LoadError),
    (ReadHeader, CloseDoor),
    (ReadHeader, LoadError),
    (CloseDoor, LoadData),
    (LoadData, CloseAfterLoad),
    (LoadData, LoadError),
    (CloseAfterLoad, ReadyWait),
    (CloseAfterLoad, LoadError),
    (ReadyWait, Running),
    (ReadyWait, AbortNoWriteback),
    (Running, UnloadStart),
    (UnloadStart, AbortNoWriteback),
    (UnloadStart, OpenImageWrite),
    (OpenImageWrite, WriteHeader),
    (OpenImageWrite, UnloadError),
    (WriteHeader, WriteData),
    (WriteHeader, UnloadError),
    (WriteData, CloseAfterWrite),
    (WriteData, UnloadError),
    (CloseAfterWrite, OpenDoor),
    (CloseAfterWrite, UnloadError),
    (OpenDoor, Idle),
    (AbortNoWriteback, OpenDoor),
    (LoadError, LoadErrorOn),
    (LoadErrorOn, LoadErrorOff),
    (LoadErrorOn, DoorOpenRecover),
    (LoadErrorOff, LoadErrorOn),
    (LoadErrorOff, DoorOpenRecover),
    (DoorOpenRecover, Idle),
    (UnloadError, UnloadErrorOn),
    (UnloadErrorOn, UnloadErrorOff),
    (UnloadErrorOn, DoorCloseRecover),
    (UnloadErrorOff, UnloadErrorOn),
    (UnloadErrorOff, DoorCloseRecover),
    (DoorCloseRecover, Running),
];

/// True if `from -> to` is a listed transition.
pub fn is_legal(from: RunLoadState, to: RunLoadState) -> bool {
    TRANSITIONS.contains(&(from, to))
}

/// Everything one step may touch, borrowed from the emulator.
pub struct StepContext<'a, C, P, S, D> {
    pub drive: &'a mut DriveState,
    pub actuator: &'a mut DoorActuator,
    pub controller: &'a mut C,
    pub panel: &'a mut P,
    pub store: &'a mut S,
    pub display: &'a mut D,
    pub config: &'a EmulatorConfig,
}

/// Run one state handler and apply the resulting transition.
pub fn step<C, P, S, D>(ctx: &mut StepContext<'_, C, P, S, D>) -> EmulatorResult<()>
where
    C: DriveController,
    P: FrontPanel,
    S: ImageStore,
    D: Display,
{
    let from = ctx.drive.state;
    let to = match from {
        Idle => ctx.idle(),
        AwaitMedia => ctx.await_media(),
        MountFs => ctx.mount_fs(),
        OpenImage => ctx.open_image(),
        ReadHeader => ctx.read_header(),
        CloseDoor => ctx.close_door(),
        LoadData => ctx.load_data(),
        CloseAfterLoad => ctx.close_after_load(),
        ReadyWait => ctx.ready_wait(),
        Running => ctx.running(),
        UnloadStart => ctx.unload_start(),
        OpenImageWrite => ctx.open_image_write(),
        WriteHeader => ctx.write_header(),
        WriteData => ctx.write_data(),
        CloseAfterWrite => ctx.close_after_write(),
        OpenDoor => ctx.open_door(),
        AbortNoWriteback => ctx.abort_no_writeback(),
        LoadError => ctx.load_error(),
        LoadErrorOn => ctx.load_error_flash(true),
        LoadErrorOff => ctx.load_error_flash(false),
        DoorOpenRecover => ctx.door_open_recover(),
        UnloadError => ctx.unload_error(),
        UnloadErrorOn => ctx.unload_error_flash(true),
        UnloadErrorOff => ctx.unload_error_flash(false),
        DoorCloseRecover => ctx.door_close_recover(),
    }?;

    if to != from {
        debug_assert!(is_legal(from, to), "unlisted transition {from} -> {to}");
        debug!(%from, %to, "run/load state");
        ctx.drive.state = to;
    }
    Ok(())
}

/// Map a storage error to the fault it represents, escalating bus errors.
fn classify(err: StorageError, fallback: CartridgeFault) -> EmulatorResult<CartridgeFault> {
    match err {
        StorageError::Device(bus) => Err(bus.into()),
        StorageError::Header(HeaderError::Malformed) => Ok(CartridgeFault::HeaderMalformed),
        StorageError::Header(HeaderError::BadType) => Ok(CartridgeFault::HeaderBadType),
        StorageError::Header(HeaderError::BadVersion) => Ok(CartridgeFault::HeaderBadVersion),
        other => {
            debug!(error = %other, "storage failure");
            Ok(fallback)
        }
    }
}

impl<C, P, S, D> StepContext<'_, C, P, S, D>
where
    C: DriveController,
    P: FrontPanel,
    S: ImageStore,
    D: Display,
{
    fn status(&mut self, line1: &str, line2: &str) {
        self.display.show_status(line1, line2);
    }

    /// Close the open image on the way into an error track. A failure here
    /// is logged only; the fault already being reported stands.
    fn release(&mut self) {
        if let Err(e) = self.store.close() {
            warn!(error = %e, "could not release image file");
        }
    }

    fn fail_load(&mut self, fault: CartridgeFault) -> EmulatorResult<RunLoadState> {
        warn!(%fault, "load failed");
        let (line1, line2) = fault.display_lines(false);
        self.display.show_error(line1, line2);
        self.drive.last_fault = Some(fault);
        Ok(LoadError)
    }

    fn fail_unload(&mut self, fault: CartridgeFault) -> EmulatorResult<RunLoadState> {
        warn!(%fault, "unload failed");
        let (line1, line2) = fault.display_lines(true);
        self.display.show_error(line1, line2);
        self.drive.last_fault = Some(fault);
        Ok(UnloadError)
    }

    fn idle(&mut self) -> EmulatorResult<RunLoadState> {
        self.panel.set_lamp(Lamp::Media, false);
        self.controller.set_fault_latch(false)?;
        self.panel.set_lamp(Lamp::Fault, false);
        self.panel.set_lamp(Lamp::Ready, false);

        if self.drive.power_failed {
            return Ok(Idle);
        }

        if self.controller.read_only()? {
            debug!("clearing read-only left over from the last cartridge");
            self.controller.toggle_read_only()?;
        }

        let unlocked = self.controller.unlocked()?;
        if self.drive.run_load_switch {
            if unlocked {
                info!("load requested");
                self.panel.set_lamp(Lamp::Unlock, false);
                return Ok(AwaitMedia);
            }
        } else {
            self.panel.set_lamp(Lamp::Unlock, unlocked);
        }
        Ok(Idle)
    }

    fn await_media(&mut self) -> EmulatorResult<RunLoadState> {
        self.panel.set_lamp(Lamp::Media, true);
        if !self.store.media_present() {
            return self.fail_load(CartridgeFault::MediaAbsent);
        }
        self.status("microSD", "detected");
        Ok(MountFs)
    }

    fn mount_fs(&mut self) -> EmulatorResult<RunLoadState> {
        match self.store.mount() {
            Ok(()) => {
                self.status("filesystem", "started");
                Ok(OpenImage)
            }
            Err(e) => {
                let fault = classify(e, CartridgeFault::MountFailure)?;
                self.fail_load(fault)
            }
        }
    }

    fn open_image(&mut self) -> EmulatorResult<RunLoadState> {
        match self.store.open_read() {
            Ok(()) => {
                self.status("image file", "is open");
                Ok(ReadHeader)
            }
            Err(e) => {
                let fault = classify(e, CartridgeFault::ImageOpenFailure)?;
                self.fail_load(fault)
            }
        }
    }

    fn read_header(&mut self) -> EmulatorResult<RunLoadState> {
        let header = match self.store.read_header() {
            Ok(header) => header,
            Err(e) => {
                let fault = classify(e, CartridgeFault::HeaderMalformed)?;
                self.release();
                return self.fail_load(fault);
            }
        };

        let sectors = header.geometry.sectors_per_track;
        let board = self.drive.board_version;
        if sectors > self.config.max_sectors_legacy_board && board < 2 {
            self.release();
            return self.fail_load(CartridgeFault::GeometryUnsupportedByBoard { sectors, board });
        }

        let capacity = self.config.device_ram_bytes;
        let bytes = payload_len(&header.geometry);
        if !bytes.is_some_and(|bytes| bytes <= capacity as usize) {
            self.release();
            let bytes = bytes.map_or(u64::MAX, |bytes| bytes as u64);
            return self.fail_load(CartridgeFault::GeometryExceedsRam { bytes, capacity });
        }

        self.drive.apply_header(&header, self.store.image_name());
        info!(
            id = %header.label.id,
            controller = %header.geometry.controller,
            cylinders = header.geometry.cylinders,
            sectors,
            heads = header.geometry.heads,
            "image header accepted"
        );
        self.actuator.close();
        self.status("Closing", "microSD door");
        Ok(CloseDoor)
    }

    fn close_door(&mut self) -> EmulatorResult<RunLoadState> {
        if self.actuator.status() != DoorStatus::Closed {
            return Ok(CloseDoor);
        }
        self.status("Reading", "image data");
        Ok(LoadData)
    }

    fn load_data(&mut self) -> EmulatorResult<RunLoadState> {
        match self.store.read_data(&self.drive.geometry, &mut *self.controller) {
            Ok(()) => {
                self.status("Image data", "read OK");
                Ok(CloseAfterLoad)
            }
            Err(e) => {
                let fault = classify(e, CartridgeFault::DataReadFailure)?;
                self.release();
                self.fail_load(fault)
            }
        }
    }

    fn close_after_load(&mut self) -> EmulatorResult<RunLoadState> {
        if let Err(e) = self.store.close() {
            let fault = classify(e, CartridgeFault::ImageCloseFailure)?;
            return self.fail_load(fault);
        }
        self.controller.set_cartridge_ready(true)?;
        info!(image = %self.drive.image_name, "cartridge loaded");
        Ok(ReadyWait)
    }

    /// Mirror the controller fault latch onto the fault lamp.
    fn propagate_fault(&mut self) -> EmulatorResult<()> {
        self.drive.fault_latched = self.controller.fault_latched()?;
        if self.drive.fault_latched {
            self.panel.set_lamp(Lamp::Fault, true);
        }
        Ok(())
    }

    fn ready_wait(&mut self) -> EmulatorResult<RunLoadState> {
        self.propagate_fault()?;

        if self.controller.ready()? {
            self.drive.file_ready = true;
            self.panel.set_lamp(Lamp::Ready, true);
            info!("drive ready");
            return Ok(Running);
        }
        if !self.drive.run_load_switch {
            info!("unload requested before drive came ready");
            self.controller.set_cartridge_ready(false)?;
            return Ok(AbortNoWriteback);
        }
        if self.drive.power_failed {
            warn!("host power failed before drive came ready, discarding cartridge");
            self.controller.set_cartridge_ready(false)?;
            return Ok(AbortNoWriteback);
        }
        Ok(ReadyWait)
    }

    fn running(&mut self) -> EmulatorResult<RunLoadState> {
        self.panel.set_lamp(Lamp::Media, true);
        self.propagate_fault()?;

        if self.drive.power_failed {
            warn!("host power failed, unloading");
            self.panel.set_lamp(Lamp::Ready, false);
            return Ok(UnloadStart);
        }

        // A real drive that is up keeps running regardless of the switch.
        let ready = self.controller.ready()?;
        if ready && self.controller.real_mode()? {
            return Ok(Running);
        }
        if !ready {
            self.panel.set_lamp(Lamp::Ready, false);
        }

        if !self.drive.run_load_switch {
            info!("unload requested");
            self.panel.set_lamp(Lamp::Ready, false);
            return Ok(UnloadStart);
        }
        Ok(Running)
    }

    fn unload_start(&mut self) -> EmulatorResult<RunLoadState> {
        let read_only = self.controller.read_only()?;
        self.controller.set_cartridge_ready(false)?;
        if read_only {
            info!("cartridge is read-only, skipping writeback");
            self.drive.file_ready = false;
            return Ok(AbortNoWriteback);
        }
        Ok(OpenImageWrite)
    }

    fn open_image_write(&mut self) -> EmulatorResult<RunLoadState> {
        match self.store.open_write() {
            Ok(()) => {
                self.drive.file_ready = false;
                self.status("Image file", "open");
                Ok(WriteHeader)
            }
            Err(e) => {
                let fault = classify(e, CartridgeFault::ImageOpenFailure)?;
                self.fail_unload(fault)
            }
        }
    }

    fn write_header(&mut self) -> EmulatorResult<RunLoadState> {
        let header = self.drive.to_header();
        match self.store.write_header(&header) {
            Ok(()) => {
                self.status("Writing", "image data");
                Ok(WriteData)
            }
            Err(e) => {
                let fault = classify(e, CartridgeFault::HeaderWriteFailure)?;
                self.release();
                self.fail_unload(fault)
            }
        }
    }

    fn write_data(&mut self) -> EmulatorResult<RunLoadState> {
        match self.store.write_data(&self.drive.geometry, &mut *self.controller) {
            Ok(()) => Ok(CloseAfterWrite),
            Err(e) => {
                let fault = classify(e, CartridgeFault::DataWriteFailure)?;
                self.release();
                self.fail_unload(fault)
            }
        }
    }

    fn close_after_write(&mut self) -> EmulatorResult<RunLoadState> {
        if let Err(e) = self.store.close() {
            let fault = classify(e, CartridgeFault::ImageCloseFailure)?;
            return self.fail_unload(fault);
        }
        info!(image = %self.drive.image_name, "cartridge written back");
        self.status("Opening", "microSD door");
        self.actuator.open();
        Ok(OpenDoor)
    }

    fn open_door(&mut self) -> EmulatorResult<RunLoadState> {
        self.panel.set_lamp(Lamp::Media, false);
        if self.actuator.status() != DoorStatus::Open {
            return Ok(OpenDoor);
        }
        self.status("microSD", "door open");
        self.drive.reset_cartridge();
        Ok(Idle)
    }

    fn abort_no_writeback(&mut self) -> EmulatorResult<RunLoadState> {
        info!("cartridge discarded without writeback");
        self.status("Opening", "microSD door");
        self.actuator.open();
        Ok(OpenDoor)
    }

    fn load_error(&mut self) -> EmulatorResult<RunLoadState> {
        self.panel.set_lamp(Lamp::Media, false);
        self.panel.set_lamp(Lamp::Fault, true);
        self.drive.indicator.arm(self.config.flash.load_on);
        Ok(LoadErrorOn)
    }

    fn load_error_flash(&mut self, lamp_on: bool) -> EmulatorResult<RunLoadState> {
        if !self.drive.run_load_switch && self.drive.write_protect_switch {
            info!("load error cleared by operator, opening door");
            self.actuator.open();
            self.panel.set_lamp(Lamp::Fault, false);
            self.controller.set_cartridge_ready(false)?;
            self.panel.set_lamp(Lamp::Ready, false);
            return Ok(DoorOpenRecover);
        }

        let flash = &self.config.flash;
        let (current, next, next_period) = if lamp_on {
            (LoadErrorOn, LoadErrorOff, flash.load_off)
        } else {
            (LoadErrorOff, LoadErrorOn, flash.load_on)
        };
        if !self.drive.indicator.tick() {
            return Ok(current);
        }
        self.drive.indicator.arm(next_period);
        self.panel.set_lamp(Lamp::Fault, !lamp_on);
        Ok(next)
    }

    fn door_open_recover(&mut self) -> EmulatorResult<RunLoadState> {
        if self.actuator.status() != DoorStatus::Open {
            return Ok(DoorOpenRecover);
        }
        self.drive.reset_cartridge();
        Ok(Idle)
    }

    fn unload_error(&mut self) -> EmulatorResult<RunLoadState> {
        self.panel.set_lamp(Lamp::Fault, true);
        self.drive.indicator.arm(self.config.flash.unload_on);
        Ok(UnloadErrorOn)
    }

    fn unload_error_flash(&mut self, lamp_on: bool) -> EmulatorResult<RunLoadState> {
        if self.drive.run_load_switch && self.drive.write_protect_switch {
            info!("unload error cleared by operator, closing door");
            self.actuator.close();
            self.panel.set_lamp(Lamp::Fault, false);
            return Ok(DoorCloseRecover);
        }

        let flash = &self.config.flash;
        let (current, next, next_period) = if lamp_on {
            (UnloadErrorOn, UnloadErrorOff, flash.unload_off)
        } else {
            (UnloadErrorOff, UnloadErrorOn, flash.unload_on)
        };
        if !self.drive.indicator.tick() {
            return Ok(current);
        }
        self.drive.indicator.arm(next_period);
        self.panel.set_lamp(Lamp::Fault, !lamp_on);
        Ok(next)
    }

    fn door_close_recover(&mut self) -> EmulatorResult<RunLoadState> {
        if self.actuator.status() != DoorStatus::Closed {
            return Ok(DoorCloseRecover);
        }
        Ok(Running)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::HeadlessDisplay;
    use crate::hardware::{RegisterController, SimulatedBus, SimulatedPanel};
    use crate::storage::{FailPoint, ImageHeader, MemoryImageStore};

    struct Rig {
        drive: DriveState,
        actuator: DoorActuator,
        controller: RegisterController<SimulatedBus>,
        panel: SimulatedPanel,
        store: MemoryImageStore,
        display: HeadlessDisplay,
        config: EmulatorConfig,
    }

    impl Rig {
        fn new(store: MemoryImageStore) -> Self {
            let config = EmulatorConfig::default();
            Self {
                drive: DriveState::new(0, false),
                actuator: DoorActuator::new(&config.actuator),
                controller: RegisterController::new(SimulatedBus::new(0x1000)),
                panel: SimulatedPanel::new(),
                store,
                display: HeadlessDisplay::new(),
                config,
            }
        }

        fn step_in(&mut self, state: RunLoadState) -> RunLoadState {
            self.drive.state = state;
            let mut ctx = StepContext {
                drive: &mut self.drive,
                actuator: &mut self.actuator,
                controller: &mut self.controller,
                panel: &mut self.panel,
                store: &mut self.store,
                display: &mut self.display,
                config: &self.config,
            };
            step(&mut ctx).unwrap();
            self.drive.state
        }
    }

    #[test]
    fn test_transition_table_has_no_duplicates() {
        for (i, pair) in TRANSITIONS.iter().enumerate() {
            assert!(!TRANSITIONS[i + 1..].contains(pair), "duplicate {pair:?}");
            assert_ne!(pair.0, pair.1);
        }
    }

    #[test]
    fn test_idle_stays_while_locked() {
        let mut rig = Rig::new(MemoryImageStore::empty());
        rig.controller.bus_mut().unlocked = false;
        rig.drive.run_load_switch = true;
        assert_eq!(rig.step_in(Idle), Idle);
    }

    #[test]
    fn test_idle_clears_stale_read_only() {
        let mut rig = Rig::new(MemoryImageStore::empty());
        rig.controller.bus_mut().read_only = true;
        rig.controller.bus_mut().raise_fault();
        assert_eq!(rig.step_in(Idle), Idle);
        assert!(!rig.controller.bus().read_only);
        assert!(!rig.controller.bus().fault_latched());
        assert!(rig.panel.lamp(Lamp::Unlock));
    }

    #[test]
    fn test_idle_ignores_switch_during_power_fail() {
        let mut rig = Rig::new(MemoryImageStore::empty());
        rig.drive.run_load_switch = true;
        rig.drive.power_failed = true;
        assert_eq!(rig.step_in(Idle), Idle);
    }

    #[test]
    fn test_no_media_routes_to_load_error() {
        let mut rig = Rig::new(MemoryImageStore::empty());
        assert_eq!(rig.step_in(AwaitMedia), LoadError);
        assert_eq!(rig.drive.last_fault, Some(CartridgeFault::MediaAbsent));
        assert_eq!(rig.display.last_error(), Some(("no microSD", "inserted")));
    }

    #[test]
    fn test_bad_version_closes_file() {
        let mut raw = ImageHeader::default().encode().to_vec();
        raw[10] = b'9';
        let mut rig = Rig::new(MemoryImageStore::new("2315.dsk", raw));
        rig.step_in(MountFs);
        rig.step_in(OpenImage);
        assert!(rig.store.is_open());
        assert_eq!(rig.step_in(ReadHeader), LoadError);
        assert!(!rig.store.is_open());
        assert_eq!(rig.drive.last_fault, Some(CartridgeFault::HeaderBadVersion));
    }

    fn loaded_store() -> MemoryImageStore {
        MemoryImageStore::with_image("2315.dsk", &ImageHeader::default(), &[])
    }

    #[test]
    fn test_mount_failure_routes_to_load_error() {
        let mut store = loaded_store();
        store.fail_at(FailPoint::Mount);
        let mut rig = Rig::new(store);
        assert_eq!(rig.step_in(MountFs), LoadError);
        assert_eq!(rig.drive.last_fault, Some(CartridgeFault::MountFailure));
        assert_eq!(rig.display.last_error(), Some(("cannot init", "microSD card")));
        assert!(!rig.store.is_open());
    }

    #[test]
    fn test_open_failure_routes_to_load_error() {
        let mut store = loaded_store();
        store.fail_at(FailPoint::OpenRead);
        let mut rig = Rig::new(store);
        assert_eq!(rig.step_in(MountFs), OpenImage);
        assert_eq!(rig.step_in(OpenImage), LoadError);
        assert_eq!(rig.drive.last_fault, Some(CartridgeFault::ImageOpenFailure));
        assert_eq!(rig.display.last_error(), Some(("cannot open", "disk image")));
        assert!(!rig.store.is_open());
    }

    #[test]
    fn test_bad_type_closes_file() {
        let mut raw = ImageHeader::default().encode().to_vec();
        raw[1] = b'X';
        let mut rig = Rig::new(MemoryImageStore::new("2315.dsk", raw));
        rig.step_in(MountFs);
        rig.step_in(OpenImage);
        assert!(rig.store.is_open());
        assert_eq!(rig.step_in(ReadHeader), LoadError);
        assert!(!rig.store.is_open());
        assert_eq!(rig.drive.last_fault, Some(CartridgeFault::HeaderBadType));
        assert_eq!(rig.display.last_error(), Some(("invalid", "file type")));
    }

    #[test]
    fn test_truncated_header_closes_file() {
        let raw = ImageHeader::default().encode()[..100].to_vec();
        let mut rig = Rig::new(MemoryImageStore::new("2315.dsk", raw));
        rig.step_in(MountFs);
        rig.step_in(OpenImage);
        assert_eq!(rig.step_in(ReadHeader), LoadError);
        assert!(!rig.store.is_open());
        assert_eq!(rig.drive.last_fault, Some(CartridgeFault::HeaderMalformed));
        assert_eq!(rig.display.last_error(), Some(("cannot read", "image header")));
    }

    #[test]
    fn test_payload_larger_than_device_ram_closes_file() {
        let mut rig = Rig::new(loaded_store());
        rig.config.device_ram_bytes = 0x1000;
        rig.step_in(MountFs);
        rig.step_in(OpenImage);
        assert_eq!(rig.step_in(ReadHeader), LoadError);
        assert!(!rig.store.is_open());
        assert_eq!(
            rig.drive.last_fault,
            Some(CartridgeFault::GeometryExceedsRam {
                bytes: 1_042_608,
                capacity: 0x1000
            })
        );
        assert_eq!(rig.display.last_error(), Some(("image too", "large")));
    }

    #[test]
    fn test_unload_start_respects_read_only() {
        let mut rig = Rig::new(MemoryImageStore::empty());
        rig.controller.bus_mut().read_only = true;
        rig.controller.set_cartridge_ready(true).unwrap();
        rig.drive.file_ready = true;
        assert_eq!(rig.step_in(UnloadStart), AbortNoWriteback);
        assert!(!rig.drive.file_ready);
        assert!(!rig.controller.bus().cartridge_ready());
    }

    #[test]
    fn test_running_real_mode_ignores_switch() {
        let mut rig = Rig::new(MemoryImageStore::empty());
        rig.controller.bus_mut().real_mode = true;
        rig.controller.bus_mut().drive_ready = true;
        rig.drive.run_load_switch = false;
        assert_eq!(rig.step_in(Running), Running);

        rig.controller.bus_mut().real_mode = false;
        assert_eq!(rig.step_in(Running), UnloadStart);
    }

    #[test]
    fn test_running_propagates_fault_without_unloading() {
        let mut rig = Rig::new(MemoryImageStore::empty());
        rig.controller.bus_mut().drive_ready = true;
        rig.controller.bus_mut().raise_fault();
        rig.drive.run_load_switch = true;
        assert_eq!(rig.step_in(Running), Running);
        assert!(rig.panel.lamp(Lamp::Fault));
        assert!(rig.drive.fault_latched);
    }

    #[test]
    fn test_unload_flash_period() {
        let mut rig = Rig::new(MemoryImageStore::empty());
        assert_eq!(rig.step_in(UnloadError), UnloadErrorOn);
        assert!(rig.panel.lamp(Lamp::Fault));

        let mut state = UnloadErrorOn;
        for _ in 0..3 {
            state = rig.step_in(state);
            assert_eq!(state, UnloadErrorOn);
        }
        assert_eq!(rig.step_in(state), UnloadErrorOff);
        assert!(!rig.panel.lamp(Lamp::Fault));
    }

    #[test]
    fn test_unload_error_override_closes_door() {
        let mut rig = Rig::new(MemoryImageStore::empty());
        rig.actuator.open();
        for _ in 0..5 {
            rig.actuator.advance();
        }
        rig.drive.run_load_switch = true;
        rig.drive.write_protect_switch = true;
        assert_eq!(rig.step_in(UnloadErrorOff), DoorCloseRecover);
        assert!(rig.actuator.is_moving());
        assert!(!rig.panel.lamp(Lamp::Fault));
    }
}
