//! The boundary between program execution and the arm.
//!
//! Executing a motion instruction only hands a resolved request to a
//! [`MotionService`]; the engine then polls the returned handle until the
//! service reports the move complete.

use std::{
    collections::HashSet,
    sync::{Arc, Mutex},
    thread::JoinHandle,
    time::Duration,
};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use rand::Rng;
use serde::{Deserialize, Serialize};
use thread_priority::{ThreadBuilder, ThreadPriority};

use crate::{
    log_debug, log_warn,
    program::motion::{MotionRequest, MotionType},
    vm::{Point, RobotPose},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MotionHandle(pub u64);

pub trait MotionService: Send {
    /// Starts a move and returns immediately.
    fn dispatch_motion(&mut self, request: &MotionRequest) -> MotionHandle;

    fn poll_complete(&mut self, handle: MotionHandle) -> bool;

    /// Current pose of the arm.
    fn pose(&self) -> RobotPose;

    /// Abandons a move. The arm stays wherever it stopped.
    fn cancel(&mut self, handle: MotionHandle);
}

/// Motion service that reaches every target at once.
#[derive(Debug, Default)]
pub struct InstantMotion {
    pose: RobotPose,
    next_handle: u64,
}

impl InstantMotion {
    pub fn new(pose: RobotPose) -> Self {
        InstantMotion {
            pose,
            next_handle: 0,
        }
    }
}

impl MotionService for InstantMotion {
    fn dispatch_motion(&mut self, request: &MotionRequest) -> MotionHandle {
        self.pose.tool_tip = request.target;
        self.next_handle += 1;
        MotionHandle(self.next_handle)
    }

    fn poll_complete(&mut self, _handle: MotionHandle) -> bool {
        true
    }

    fn pose(&self) -> RobotPose {
        self.pose
    }

    fn cancel(&mut self, _handle: MotionHandle) {}
}

/// Timing of the simulated arm.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationTiming {
    /// Interpolation period.
    pub tick: Duration,
    /// Interpolation steps of a move at 100% speed.
    pub steps_at_full_speed: u32,
    /// Upper bound of the random settle time added after `FINE` moves.
    pub settle_jitter: Duration,
}

impl Default for SimulationTiming {
    fn default() -> Self {
        SimulationTiming {
            tick: Duration::from_millis(4),
            steps_at_full_speed: 25,
            settle_jitter: Duration::from_millis(6),
        }
    }
}

impl SimulationTiming {
    fn steps_for(&self, request: &MotionRequest) -> u32 {
        // Joint speeds are percentages, linear and circular ones are mm/s
        // against a 2000 mm/s ceiling.
        let ratio = match request.motion_type {
            MotionType::Joint => request.speed / 100.0,
            MotionType::Linear | MotionType::Circular => request.speed / 2000.0,
        };
        let ratio = ratio.clamp(0.01, 1.0);
        ((self.steps_at_full_speed as f32 / ratio).ceil() as u32).max(1)
    }
}

enum MotionCommand {
    Move(MotionHandle, MotionRequest),
    Cancel(MotionHandle),
}

#[derive(Default)]
struct SharedState {
    pose: RobotPose,
    completed: HashSet<MotionHandle>,
}

/// Interpolates moves on a dedicated high priority thread, one per device.
pub struct SimulatedMotion {
    commands: Sender<MotionCommand>,
    state: Arc<Mutex<SharedState>>,
    next_handle: u64,
    worker: Option<JoinHandle<()>>,
}

impl SimulatedMotion {
    pub fn create(device: u8, pose: RobotPose, timing: SimulationTiming) -> std::io::Result<Self> {
        let (tx, rx) = crossbeam_channel::unbounded();
        let state = Arc::new(Mutex::new(SharedState {
            pose,
            completed: HashSet::new(),
        }));
        let shared = Arc::clone(&state);
        let worker = ThreadBuilder::default()
            .name(format!("pendant-motion-{device}"))
            .priority(ThreadPriority::Max)
            .spawn(move |_| {
                let mut arm = ArmSimulator {
                    device,
                    commands: rx,
                    state: shared,
                    timing,
                };
                arm.live();
            })?;
        Ok(SimulatedMotion {
            commands: tx,
            state,
            next_handle: 0,
            worker: Some(worker),
        })
    }

    fn send(&self, command: MotionCommand) {
        if self.commands.send(command).is_err() {
            log_warn!("Motion worker is gone, command dropped");
        }
    }
}

impl MotionService for SimulatedMotion {
    fn dispatch_motion(&mut self, request: &MotionRequest) -> MotionHandle {
        self.next_handle += 1;
        let handle = MotionHandle(self.next_handle);
        self.send(MotionCommand::Move(handle, request.clone()));
        handle
    }

    fn poll_complete(&mut self, handle: MotionHandle) -> bool {
        match self.state.lock() {
            Ok(mut state) => state.completed.remove(&handle),
            Err(_) => false,
        }
    }

    fn pose(&self) -> RobotPose {
        self.state.lock().map(|s| s.pose).unwrap_or_default()
    }

    fn cancel(&mut self, handle: MotionHandle) {
        self.send(MotionCommand::Cancel(handle));
    }
}

impl Drop for SimulatedMotion {
    fn drop(&mut self) {
        // Closing the channel stops the worker.
        let (closed, _) = crossbeam_channel::bounded(0);
        self.commands = closed;
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

struct ArmSimulator {
    device: u8,
    commands: Receiver<MotionCommand>,
    state: Arc<Mutex<SharedState>>,
    timing: SimulationTiming,
}

impl ArmSimulator {
    fn live(&mut self) {
        log_debug!("Motion worker for R{} started", self.device);
        loop {
            match self.commands.recv() {
                Ok(MotionCommand::Move(handle, request)) => self.perform(handle, &request),
                // Nothing is in flight between moves.
                Ok(MotionCommand::Cancel(_)) => (),
                Err(_) => break,
            }
        }
        log_debug!("Motion worker for R{} exiting", self.device);
    }

    fn current_pose(&self) -> RobotPose {
        self.state.lock().map(|s| s.pose).unwrap_or_default()
    }

    fn set_tool_tip(&self, point: Point) {
        if let Ok(mut state) = self.state.lock() {
            state.pose.tool_tip = point;
        }
    }

    /// Walks the tool tip to the target, through the via point for circular
    /// moves. Returns early when a cancel for this move arrives.
    fn perform(&mut self, handle: MotionHandle, request: &MotionRequest) {
        let start = self.current_pose().tool_tip;
        let steps = self.timing.steps_for(request);
        for step in 1..=steps {
            match self.commands.recv_timeout(self.timing.tick) {
                Ok(MotionCommand::Cancel(cancelled)) if cancelled == handle => {
                    log_debug!("R{} motion {} cancelled", self.device, handle.0);
                    return;
                }
                Ok(MotionCommand::Cancel(_)) | Err(RecvTimeoutError::Timeout) => (),
                Ok(MotionCommand::Move(other, _)) => {
                    log_warn!(
                        "R{} motion {} dispatched while moving, ignored",
                        self.device,
                        other.0
                    );
                }
                Err(RecvTimeoutError::Disconnected) => return,
            }
            let t = step as f32 / steps as f32;
            let point = match request.via {
                Some(via) if t < 0.5 => start.lerp(&via, t * 2.0),
                Some(via) => via.lerp(&request.target, t * 2.0 - 1.0),
                None => start.lerp(&request.target, t),
            };
            self.set_tool_tip(point);
        }
        if request.termination == 0 && !self.timing.settle_jitter.is_zero() {
            let jitter = rand::rng().random_range(Duration::ZERO..=self.timing.settle_jitter);
            std::thread::sleep(jitter);
        }
        if let Ok(mut state) = self.state.lock() {
            state.pose.tool_tip = request.target;
            state.completed.insert(handle);
        }
    }
}
