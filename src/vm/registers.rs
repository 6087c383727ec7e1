use serde::{Deserialize, Serialize};

use crate::error::{PendantError, PendantResult};

use super::point::Point;

pub const DEFAULT_DATA_REGISTERS: usize = 100;
pub const DEFAULT_IO_REGISTERS: usize = 32;
pub const DEFAULT_POSITION_REGISTERS: usize = 100;

/// A register slot: its value plus the comment shown on the pendant.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Register<T> {
    pub value: T,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub comment: String,
}

/// The global registers shared by every device of a cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisterBank {
    data: Vec<Register<f32>>,
    io: Vec<Register<bool>>,
    positions: Vec<Register<Point>>,
}

impl Default for RegisterBank {
    fn default() -> Self {
        Self::new(
            DEFAULT_DATA_REGISTERS,
            DEFAULT_IO_REGISTERS,
            DEFAULT_POSITION_REGISTERS,
        )
    }
}

impl RegisterBank {
    pub fn new(data: usize, io: usize, positions: usize) -> Self {
        RegisterBank {
            data: vec![Register::default(); data],
            io: vec![Register::default(); io],
            positions: vec![Register::default(); positions],
        }
    }

    #[inline]
    pub fn data_len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn io_len(&self) -> usize {
        self.io.len()
    }

    #[inline]
    pub fn position_len(&self) -> usize {
        self.positions.len()
    }

    pub fn data(&self, index: usize) -> PendantResult<f32> {
        self.data
            .get(index)
            .map(|r| r.value)
            .ok_or_else(|| PendantError::out_of_range("data register", index, self.data.len()))
    }

    pub fn set_data(&mut self, index: usize, value: f32) -> PendantResult<()> {
        let len = self.data.len();
        let reg = self
            .data
            .get_mut(index)
            .ok_or_else(|| PendantError::out_of_range("data register", index, len))?;
        reg.value = value;
        Ok(())
    }

    pub fn io(&self, index: usize) -> PendantResult<bool> {
        self.io
            .get(index)
            .map(|r| r.value)
            .ok_or_else(|| PendantError::out_of_range("I/O register", index, self.io.len()))
    }

    pub fn set_io(&mut self, index: usize, state: bool) -> PendantResult<()> {
        let len = self.io.len();
        let reg = self
            .io
            .get_mut(index)
            .ok_or_else(|| PendantError::out_of_range("I/O register", index, len))?;
        reg.value = state;
        Ok(())
    }

    pub fn position(&self, index: usize) -> PendantResult<Point> {
        self.positions.get(index).map(|r| r.value).ok_or_else(|| {
            PendantError::out_of_range("position register", index, self.positions.len())
        })
    }

    pub fn set_position(&mut self, index: usize, point: Point) -> PendantResult<()> {
        *self.position_mut(index)? = point;
        Ok(())
    }

    pub fn position_component(&self, index: usize, component: usize) -> PendantResult<f32> {
        self.position(index)?
            .component(component)
            .ok_or_else(|| PendantError::out_of_range("position component", component, 6))
    }

    pub fn set_position_component(
        &mut self,
        index: usize,
        component: usize,
        value: f32,
    ) -> PendantResult<()> {
        if !self.position_mut(index)?.set_component(component, value) {
            return Err(PendantError::out_of_range("position component", component, 6));
        }
        Ok(())
    }

    fn position_mut(&mut self, index: usize) -> PendantResult<&mut Point> {
        let len = self.positions.len();
        self.positions
            .get_mut(index)
            .map(|r| &mut r.value)
            .ok_or_else(|| PendantError::out_of_range("position register", index, len))
    }

    pub fn set_data_comment(
        &mut self,
        index: usize,
        comment: impl Into<String>,
    ) -> PendantResult<()> {
        let len = self.data.len();
        let reg = self
            .data
            .get_mut(index)
            .ok_or_else(|| PendantError::out_of_range("data register", index, len))?;
        reg.comment = comment.into();
        Ok(())
    }

    pub fn data_comment(&self, index: usize) -> Option<&str> {
        self.data.get(index).map(|r| r.comment.as_str())
    }
}
