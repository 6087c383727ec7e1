use crate::{
    error::{PendantError, PendantResult},
    log_info, log_warn,
    program::{ProgramLibrary, link_calls},
    vm::RegisterBank,
};

use super::{
    device::{Device, DeviceEvent},
    execution::{RunMode, Status},
    motion_service::MotionService,
};

/// Number of arms in a cell.
pub const DEVICE_COUNT: usize = 2;

/// Both devices of a work cell and the registers they share.
pub struct Cell {
    registers: RegisterBank,
    devices: Vec<Device>,
}

impl Cell {
    /// Builds a cell from one library per device, linking every call.
    pub fn new(
        registers: RegisterBank,
        libraries: [ProgramLibrary; DEVICE_COUNT],
        mut motion: impl FnMut(u8) -> Box<dyn MotionService>,
    ) -> Self {
        let devices = libraries
            .into_iter()
            .enumerate()
            .map(|(id, library)| Device::new(id as u8, library, motion(id as u8)))
            .collect();
        let mut cell = Cell { registers, devices };
        for error in cell.relink() {
            log_warn!("{error}");
        }
        cell
    }

    pub fn registers(&self) -> &RegisterBank {
        &self.registers
    }

    pub fn registers_mut(&mut self) -> &mut RegisterBank {
        &mut self.registers
    }

    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    pub fn device(&self, id: u8) -> PendantResult<&Device> {
        self.devices
            .get(id as usize)
            .ok_or_else(|| PendantError::out_of_range("device", id as usize, self.devices.len()))
    }

    pub fn device_mut(&mut self, id: u8) -> PendantResult<&mut Device> {
        let len = self.devices.len();
        self.devices
            .get_mut(id as usize)
            .ok_or_else(|| PendantError::out_of_range("device", id as usize, len))
    }

    /// Re-resolves every call target after programs were added, removed or
    /// renamed. Returns the targets that stay unresolved.
    pub fn relink(&mut self) -> Vec<PendantError> {
        let mut libraries: Vec<&mut ProgramLibrary> = self
            .devices
            .iter_mut()
            .map(Device::library_for_link)
            .collect();
        link_calls(&mut libraries)
    }

    pub fn start(
        &mut self,
        device: u8,
        program: &str,
        mode: RunMode,
        start_idx: usize,
    ) -> PendantResult<()> {
        self.device_mut(device)?.start(program, mode, start_idx)
    }

    pub fn halt_all(&mut self) {
        for device in self.devices.iter_mut() {
            device.halt();
        }
    }

    pub fn is_busy(&self) -> bool {
        self.devices.iter().any(Device::is_busy)
    }

    /// Ticks every device once and routes cross-device calls and returns.
    /// Returns whether any device still has work.
    pub fn tick(&mut self) -> bool {
        let mut busy = false;
        for id in 0..self.devices.len() {
            let event = self.devices[id].tick(&mut self.registers);
            match event {
                DeviceEvent::Idle => (),
                DeviceEvent::Busy => busy = true,
                DeviceEvent::CrossCall { target, frame } => {
                    busy = true;
                    let accepted = match self.devices.get_mut(target.device as usize) {
                        Some(callee) => callee.accept_call(&target, frame),
                        None => Err(PendantError::UnresolvedCall {
                            program: target.program.clone(),
                            device: target.device,
                        }),
                    };
                    if let Err(e) = accepted {
                        self.devices[id].fault(e);
                    }
                }
                DeviceEvent::CallFailed { caller, reason } => {
                    busy = true;
                    let waiting = self
                        .devices
                        .get_mut(caller as usize)
                        .filter(|caller| caller.status() == Some(&Status::AwaitingCall));
                    if let Some(caller) = waiting {
                        caller.fault(PendantError::CallFailed {
                            device: id as u8,
                            reason,
                        });
                    }
                }
                DeviceEvent::Returned(frame) => {
                    busy = true;
                    match self.devices.get_mut(frame.device as usize) {
                        Some(caller) => caller.resume_after_call(),
                        None => log_warn!("return to unknown device {}", frame.device),
                    }
                }
            }
        }
        busy
    }

    /// Ticks until both devices are idle or `max_ticks` is reached. Returns
    /// the number of ticks run.
    pub fn run_until_idle(&mut self, max_ticks: usize) -> usize {
        for tick in 0..max_ticks {
            if !self.tick() {
                return tick + 1;
            }
            if self.devices.iter().any(Device::is_moving) {
                std::thread::yield_now();
            }
        }
        log_info!("cell still busy after {max_ticks} ticks");
        max_ticks
    }
}
