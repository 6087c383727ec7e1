//! Program execution: the per-device state machine, the motion boundary and
//! the two-device cell driving them.

pub mod cell;
pub mod device;
pub mod execution;
pub mod motion_service;

pub use cell::{Cell, DEVICE_COUNT};
pub use device::Device;
pub use execution::{DoneReason, ExecutionState, RunMode, Status};
pub use motion_service::{
    InstantMotion, MotionHandle, MotionService, SimulatedMotion, SimulationTiming,
};
