use crate::{
    error::{PendantError, PendantResult},
    logger::{LogMessage, Severity, get_logger},
    program::{CallTarget, ProgramHandle, ProgramLibrary},
    vm::{ActiveFrames, EvaluationContext, RegisterBank, RobotPose},
};

use super::{
    execution::{DoneReason, ExecutionState, RunMode, Status},
    motion_service::MotionService,
};

/// Where a finished callee hands control back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReturnFrame {
    /// Device running the caller.
    pub device: u8,
    pub program: ProgramHandle,
    pub resume_at: usize,
    pub mode: RunMode,
}

/// What a device needs from the cell after a tick.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceEvent {
    Idle,
    Busy,
    /// Start `target` on another device, returning to `frame`.
    CrossCall {
        target: CallTarget,
        frame: ReturnFrame,
    },
    /// A cross-device callee finished; `frame.device` resumes.
    Returned(ReturnFrame),
    /// A cross-device callee stopped without returning to `caller`.
    CallFailed { caller: u8, reason: String },
}

/// One arm: its programs, its execution engine and its motion service.
pub struct Device {
    id: u8,
    library: ProgramLibrary,
    execution: Option<ExecutionState>,
    return_stack: Vec<ReturnFrame>,
    frames: ActiveFrames,
    motion: Box<dyn MotionService>,
    /// Caller on another device left waiting by a dropped call chain.
    abandoned: Option<(u8, String)>,
}

impl Device {
    pub fn new(id: u8, library: ProgramLibrary, motion: Box<dyn MotionService>) -> Self {
        Device {
            id,
            library,
            execution: None,
            return_stack: Vec::new(),
            frames: ActiveFrames::default(),
            motion,
            abandoned: None,
        }
    }

    #[inline]
    pub fn id(&self) -> u8 {
        self.id
    }

    pub fn library(&self) -> &ProgramLibrary {
        &self.library
    }

    /// Programs may only be edited while the device is not busy.
    pub fn library_mut(&mut self) -> PendantResult<&mut ProgramLibrary> {
        if self.is_busy() {
            return Err(PendantError::DeviceBusy(self.id));
        }
        Ok(&mut self.library)
    }

    pub(crate) fn library_for_link(&mut self) -> &mut ProgramLibrary {
        &mut self.library
    }

    pub fn execution(&self) -> Option<&ExecutionState> {
        self.execution.as_ref()
    }

    pub fn status(&self) -> Option<&Status> {
        self.execution.as_ref().map(ExecutionState::status)
    }

    pub fn return_depth(&self) -> usize {
        self.return_stack.len()
    }

    pub fn frames(&self) -> ActiveFrames {
        self.frames
    }

    pub fn pose(&self) -> RobotPose {
        self.motion.pose()
    }

    /// Running, moving, waiting on a call, or holding callers to return to.
    pub fn is_busy(&self) -> bool {
        let active = self
            .execution
            .as_ref()
            .is_some_and(|state| !state.status().is_terminal());
        active || !self.return_stack.is_empty()
    }

    pub fn is_moving(&self) -> bool {
        matches!(self.status(), Some(Status::AwaitingMotion(_)))
    }

    fn report(&self, level: Severity, msg: String) {
        get_logger().log_message(LogMessage::new(level, msg).for_device(self.id));
    }

    /// Starts a program by name. Any previous call chain is dropped.
    pub fn start(&mut self, program: &str, mode: RunMode, start_idx: usize) -> PendantResult<()> {
        if self.is_busy() {
            return Err(PendantError::DeviceBusy(self.id));
        }
        let index = self.library.find(program).ok_or_else(|| PendantError::UnresolvedCall {
            program: program.to_owned(),
            device: self.id,
        })?;
        self.return_stack.clear();
        self.begin(ProgramHandle { device: self.id, index }, mode, start_idx);
        Ok(())
    }

    fn begin(&mut self, handle: ProgramHandle, mode: RunMode, start_idx: usize) {
        let state = match self.library.get(handle.index) {
            Some(program) if program.is_empty() && !self.return_stack.is_empty() => {
                ExecutionState::finished(handle, program, mode)
            }
            Some(program) => {
                self.report(
                    Severity::Debug,
                    format!("{} from line {}", program.name(), start_idx + 1),
                );
                ExecutionState::start(handle, program, mode, start_idx)
            }
            None => {
                self.report(Severity::Error, format!("no program at {}", handle.index));
                return;
            }
        };
        if let Status::Fault(reason) = state.status() {
            self.report(Severity::Error, reason.clone());
        }
        self.execution = Some(state);
    }

    /// Callee side of a cross-device call.
    pub(crate) fn accept_call(
        &mut self,
        target: &CallTarget,
        frame: ReturnFrame,
    ) -> PendantResult<()> {
        if self.is_busy() {
            return Err(PendantError::DeviceBusy(self.id));
        }
        let handle = self.library.resolve(target)?;
        self.return_stack.push(frame);
        self.begin(handle, frame.mode, 0);
        Ok(())
    }

    /// Caller side: its cross-device callee has finished.
    pub(crate) fn resume_after_call(&mut self) {
        if let Some(state) = self.execution.as_mut() {
            if let Some(program) = self.library.get(state.program().index) {
                state.resume_after_call(program);
            }
        }
    }

    pub(crate) fn fault(&mut self, error: PendantError) {
        let reason = error.to_string();
        self.report(Severity::Error, reason.clone());
        if let Some(state) = self.execution.as_mut() {
            state.fault(error);
        }
        self.drop_call_chain(reason);
    }

    fn drop_call_chain(&mut self, reason: String) {
        let caller = self
            .return_stack
            .iter()
            .find(|frame| frame.device != self.id)
            .map(|frame| frame.device);
        if let Some(caller) = caller {
            self.abandoned = Some((caller, reason));
        }
        self.return_stack.clear();
    }

    /// Continues a program paused by a stepping mode from the line it stopped
    /// on, keeping the call chain.
    pub fn resume(&mut self) -> PendantResult<()> {
        let Some(state) = self.execution.as_ref() else {
            return Ok(());
        };
        if state.status() != &Status::Done(DoneReason::Stepped) {
            return Err(PendantError::DeviceBusy(self.id));
        }
        let (handle, mode, current) = (state.program(), state.mode(), state.current());
        self.begin(handle, mode, current);
        Ok(())
    }

    /// Forces the engine to `Done` and drops the call chain.
    pub fn halt(&mut self) {
        if let Some(state) = self.execution.as_mut() {
            state.halt(self.motion.as_mut());
        }
        self.drop_call_chain("halted".to_owned());
    }

    /// Moves the engine one step forward: executes the current instruction,
    /// polls an in-flight move, or unwinds a finished call.
    pub fn tick(&mut self, registers: &mut RegisterBank) -> DeviceEvent {
        if let Some((caller, reason)) = self.abandoned.take() {
            return DeviceEvent::CallFailed { caller, reason };
        }
        let Some(state) = self.execution.as_mut() else {
            return DeviceEvent::Idle;
        };
        let Some(program) = self.library.get(state.program().index) else {
            let reason =
                PendantError::out_of_range("program", state.program().index, self.library.len());
            self.fault(reason);
            return DeviceEvent::Idle;
        };

        match state.status().clone() {
            Status::Running => {
                let pose = self.motion.pose();
                let mut ctx = EvaluationContext::new(registers, &mut self.frames, pose, self.id);
                let call = state.step(program, &mut ctx, self.motion.as_mut());
                if let Status::Fault(reason) = state.status() {
                    let reason = reason.clone();
                    self.report(Severity::Error, reason.clone());
                    self.drop_call_chain(reason);
                    return DeviceEvent::Busy;
                }
                match call {
                    Some(target) => self.dispatch_call(&target),
                    None => DeviceEvent::Busy,
                }
            }
            Status::AwaitingMotion(_) => {
                state.advance(program, self.motion.as_mut());
                DeviceEvent::Busy
            }
            // The callee reports for both arms while the call is in flight.
            Status::AwaitingCall => DeviceEvent::Idle,
            Status::Done(DoneReason::EndOfProgram) if !self.return_stack.is_empty() => {
                self.return_from_call()
            }
            Status::Done(_) | Status::Fault(_) => DeviceEvent::Idle,
        }
    }

    fn dispatch_call(&mut self, target: &CallTarget) -> DeviceEvent {
        let Some(state) = self.execution.as_ref() else {
            return DeviceEvent::Idle;
        };
        let frame = ReturnFrame {
            device: self.id,
            program: state.program(),
            resume_at: state.current() + 1,
            mode: state.mode(),
        };
        if target.device != self.id {
            return DeviceEvent::CrossCall {
                target: target.clone(),
                frame,
            };
        }
        match self.library.resolve(target) {
            Ok(handle) => {
                self.return_stack.push(frame);
                self.begin(handle, frame.mode, 0);
                DeviceEvent::Busy
            }
            Err(e) => {
                self.fault(e);
                DeviceEvent::Idle
            }
        }
    }

    fn return_from_call(&mut self) -> DeviceEvent {
        let Some(frame) = self.return_stack.pop() else {
            return DeviceEvent::Idle;
        };
        if frame.device != self.id {
            return DeviceEvent::Returned(frame);
        }
        let Some(program) = self.library.get(frame.program.index) else {
            let len = self.library.len();
            self.fault(PendantError::out_of_range("program", frame.program.index, len));
            return DeviceEvent::Idle;
        };
        // Stepping modes stop on the line after the call site.
        self.execution = Some(if frame.resume_at >= program.len() {
            ExecutionState::finished(frame.program, program, frame.mode)
        } else if frame.mode == RunMode::Full {
            ExecutionState::start(frame.program, program, frame.mode, frame.resume_at)
        } else {
            ExecutionState::paused(frame.program, program, frame.mode, frame.resume_at)
        });
        DeviceEvent::Busy
    }
}
