use serde::{Deserialize, Serialize};

use super::{point::RobotPose, registers::RegisterBank};

/// Tool and user frames currently selected on a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ActiveFrames {
    pub tool: usize,
    pub user: usize,
}

/// Everything an instruction can read or write while it executes.
pub struct EvaluationContext<'a> {
    pub registers: &'a mut RegisterBank,
    pub frames: &'a mut ActiveFrames,
    pub pose: RobotPose,
    pub device: u8,
}

impl<'a> EvaluationContext<'a> {
    pub fn new(
        registers: &'a mut RegisterBank,
        frames: &'a mut ActiveFrames,
        pose: RobotPose,
        device: u8,
    ) -> Self {
        EvaluationContext {
            registers,
            frames,
            pose,
            device,
        }
    }
}
