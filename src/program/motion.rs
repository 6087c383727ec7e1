use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::{
    error::{PendantError, PendantResult},
    vm::{EvaluationContext, Point},
};

use super::Program;

/// Termination value meaning the arm stops exactly on the target.
pub const FINE: u8 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MotionType {
    #[default]
    #[serde(rename = "0")]
    Joint,
    #[serde(rename = "1")]
    Linear,
    #[serde(rename = "2")]
    Circular,
}

impl MotionType {
    pub fn letter(self) -> char {
        match self {
            MotionType::Joint => 'J',
            MotionType::Linear => 'L',
            MotionType::Circular => 'C',
        }
    }
}

/// A motion target: a point taught into the program, or a position register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionRef {
    #[serde(rename = "0")]
    Local(usize),
    #[serde(rename = "1")]
    Register(usize),
}

impl PositionRef {
    pub fn resolve(&self, ctx: &EvaluationContext, program: &Program) -> PendantResult<Point> {
        match self {
            PositionRef::Local(slot) => program.position(*slot).ok_or_else(|| {
                PendantError::out_of_range("taught position", *slot, program.position_count())
            }),
            PositionRef::Register(index) => ctx.registers.position(*index),
        }
    }
}

impl Display for PositionRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PositionRef::Local(slot) => write!(f, "P[{}]", slot + 1),
            PositionRef::Register(index) => write!(f, "PR[{}]", index + 1),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotionInstruction {
    pub motion_type: MotionType,
    pub position: PositionRef,
    /// Percent of max speed for joint moves, mm/s otherwise.
    pub speed: f32,
    /// 0 (`FINE`) to 100 percent corner rounding.
    pub termination: u8,
    pub tool_frame: usize,
    pub user_frame: usize,
    pub offset: Option<PositionRef>,
    /// Intermediate point of a circular move.
    pub via: Option<PositionRef>,
}

impl MotionInstruction {
    pub fn new(motion_type: MotionType, position: PositionRef, speed: f32) -> Self {
        MotionInstruction {
            motion_type,
            position,
            speed,
            termination: FINE,
            tool_frame: 0,
            user_frame: 0,
            offset: None,
            via: None,
        }
    }

    pub fn with_termination(mut self, termination: u8) -> Self {
        self.termination = termination.min(100);
        self
    }

    pub fn with_offset(mut self, offset: PositionRef) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn with_via(mut self, via: PositionRef) -> Self {
        self.via = Some(via);
        self
    }

    /// Resolves every position reference into a request for the motion
    /// service. The offset, if any, moves the target position.
    pub fn request(
        &self,
        ctx: &EvaluationContext,
        program: &Program,
    ) -> PendantResult<MotionRequest> {
        let mut target = self.position.resolve(ctx, program)?;
        if let Some(offset) = &self.offset {
            target = target.offset_by(&offset.resolve(ctx, program)?);
        }
        let via = match (self.motion_type, &self.via) {
            (MotionType::Circular, Some(via)) => Some(via.resolve(ctx, program)?),
            (MotionType::Circular, None) => {
                return Err(PendantError::mismatch("circular motion without a via point"));
            }
            _ => None,
        };
        Ok(MotionRequest {
            device: ctx.device,
            motion_type: self.motion_type,
            target,
            via,
            speed: self.speed,
            termination: self.termination,
            tool_frame: self.tool_frame,
            user_frame: self.user_frame,
        })
    }
}

impl Display for MotionInstruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ", self.motion_type.letter())?;
        if let Some(via) = &self.via {
            write!(f, "{via} ")?;
        }
        write!(f, "{} ", self.position)?;
        match self.motion_type {
            MotionType::Joint => write!(f, "{}%", self.speed)?,
            _ => write!(f, "{}mm/sec", self.speed)?,
        }
        match self.termination {
            FINE => write!(f, " FINE")?,
            cnt => write!(f, " CNT{cnt}")?,
        }
        if let Some(offset) = &self.offset {
            write!(f, " Offset,{offset}")?;
        }
        Ok(())
    }
}

/// What the motion service is asked to do, with every reference resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotionRequest {
    pub device: u8,
    pub motion_type: MotionType,
    pub target: Point,
    pub via: Option<Point>,
    pub speed: f32,
    pub termination: u8,
    pub tool_frame: usize,
    pub user_frame: usize,
}
