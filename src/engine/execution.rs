use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::{
    error::PendantError,
    log_warn,
    program::{CallTarget, Flow, Program, ProgramHandle},
    vm::EvaluationContext,
};

use super::motion_service::{MotionHandle, MotionService};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Runs until the end of the program.
    #[default]
    Full,
    /// Stops after one instruction.
    SingleStep,
    /// Steps toward the first instruction, running motions only.
    Backward,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DoneReason {
    /// The pointer moved past the last instruction, or above the first one
    /// when stepping backward.
    EndOfProgram,
    /// One instruction completed in a stepping mode.
    Stepped,
    Halted,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Status {
    /// About to execute `current`.
    Running,
    /// A move is in flight; `advance` waits for the motion service.
    AwaitingMotion(MotionHandle),
    /// A call to another device is running; `resume_after_call` continues.
    AwaitingCall,
    Done(DoneReason),
    Fault(String),
}

impl Status {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Status::Done(_) | Status::Fault(_))
    }
}

impl Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Status::Running => write!(f, "running"),
            Status::AwaitingMotion(h) => write!(f, "moving (motion {})", h.0),
            Status::AwaitingCall => write!(f, "waiting for a call"),
            Status::Done(DoneReason::EndOfProgram) => write!(f, "done"),
            Status::Done(DoneReason::Stepped) => write!(f, "paused"),
            Status::Done(DoneReason::Halted) => write!(f, "halted"),
            Status::Fault(reason) => write!(f, "fault: {reason}"),
        }
    }
}

/// Instruction pointer state of one running program.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionState {
    program: ProgramHandle,
    current: usize,
    /// Signed so that backward stepping can move above the first line.
    next: isize,
    mode: RunMode,
    status: Status,
}

impl ExecutionState {
    /// Starts `program` at `start_idx`. An index outside the program faults
    /// right away.
    pub fn start(
        handle: ProgramHandle,
        program: &Program,
        mode: RunMode,
        start_idx: usize,
    ) -> Self {
        let mut state = ExecutionState {
            program: handle,
            current: start_idx,
            next: 0,
            mode,
            status: Status::Running,
        };
        if start_idx >= program.len() {
            state.fault(PendantError::out_of_range("start", start_idx, program.len()));
        } else {
            state.next = state.following(start_idx);
        }
        state
    }

    /// A state that has already run off the end of `program`.
    pub fn finished(handle: ProgramHandle, program: &Program, mode: RunMode) -> Self {
        ExecutionState {
            program: handle,
            current: program.len(),
            next: program.len() as isize,
            mode,
            status: Status::Done(DoneReason::EndOfProgram),
        }
    }

    /// A stepping state stopped on `at`, as if the line before it had just
    /// been stepped over.
    pub fn paused(handle: ProgramHandle, program: &Program, mode: RunMode, at: usize) -> Self {
        let mut state = Self::start(handle, program, mode, at);
        if state.status == Status::Running {
            state.status = Status::Done(DoneReason::Stepped);
        }
        state
    }

    #[inline]
    pub fn program(&self) -> ProgramHandle {
        self.program
    }

    #[inline]
    pub fn current(&self) -> usize {
        self.current
    }

    #[inline]
    pub fn next(&self) -> isize {
        self.next
    }

    #[inline]
    pub fn mode(&self) -> RunMode {
        self.mode
    }

    #[inline]
    pub fn status(&self) -> &Status {
        &self.status
    }

    fn following(&self, index: usize) -> isize {
        match self.mode {
            RunMode::Backward => index as isize - 1,
            RunMode::Full | RunMode::SingleStep => index as isize + 1,
        }
    }

    pub fn fault(&mut self, error: PendantError) {
        self.status = Status::Fault(error.to_string());
    }

    /// Executes the instruction under `current`.
    ///
    /// Immediate instructions complete and advance in place. Motions leave the
    /// state in `AwaitingMotion`. Linked calls leave it in `AwaitingCall` and
    /// are handed back to the caller, which owns the return stacks.
    pub fn step(
        &mut self,
        program: &Program,
        ctx: &mut EvaluationContext,
        motion: &mut dyn MotionService,
    ) -> Option<CallTarget> {
        if self.status != Status::Running {
            return None;
        }
        let Some(instruction) = program.instruction(self.current) else {
            self.fault(PendantError::out_of_range("instruction", self.current, program.len()));
            return None;
        };
        if self.mode == RunMode::Backward && !instruction.is_motion() {
            self.move_on(program);
            return None;
        }

        match instruction.execute(ctx, program) {
            Ok(Flow::Next) => self.move_on(program),
            Ok(Flow::Jump(label)) => match program.find_label(label) {
                Some(target) => {
                    self.next = target as isize;
                    self.move_on(program);
                }
                None => self.fault(PendantError::UnresolvedLabel(label)),
            },
            Ok(Flow::Motion(request)) => {
                self.status = Status::AwaitingMotion(motion.dispatch_motion(&request));
            }
            Ok(Flow::Call(target)) => {
                if target.link.is_none() {
                    self.fault(PendantError::UnresolvedCall {
                        program: target.program,
                        device: target.device,
                    });
                    return None;
                }
                self.status = Status::AwaitingCall;
                return Some(target);
            }
            Err(e) if e.is_fatal() => self.fault(e),
            Err(e) => {
                log_warn!("{} line {}: {e}", program.name(), self.current + 1);
                self.move_on(program);
            }
        }
        None
    }

    /// Completes the current instruction. While a move is in flight this is a
    /// no-op until the motion service reports completion.
    pub fn advance(&mut self, program: &Program, motion: &mut dyn MotionService) {
        match self.status {
            Status::Done(_) | Status::Fault(_) | Status::AwaitingCall => (),
            Status::AwaitingMotion(handle) => {
                if motion.poll_complete(handle) {
                    self.status = Status::Running;
                    self.move_on(program);
                }
            }
            Status::Running => self.move_on(program),
        }
    }

    /// Continues after a cross-device call has returned.
    pub fn resume_after_call(&mut self, program: &Program) {
        if self.status == Status::AwaitingCall {
            self.status = Status::Running;
            self.move_on(program);
        }
    }

    /// Forces `Done`, cancelling any move in flight.
    pub fn halt(&mut self, motion: &mut dyn MotionService) {
        if let Status::AwaitingMotion(handle) = self.status {
            motion.cancel(handle);
        }
        self.status = Status::Done(DoneReason::Halted);
    }

    fn move_on(&mut self, program: &Program) {
        let len = program.len() as isize;
        if self.next == len || (self.next == -1 && self.mode == RunMode::Backward) {
            self.status = Status::Done(DoneReason::EndOfProgram);
            return;
        }
        if self.next < 0 || self.next > len {
            self.fault(PendantError::out_of_range("instruction", self.next, program.len()));
            return;
        }
        self.current = self.next as usize;
        self.next = self.following(self.current);
        if self.mode != RunMode::Full {
            self.status = Status::Done(DoneReason::Stepped);
        }
    }
}
