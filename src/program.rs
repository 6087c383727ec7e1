//! Pendant programs: an instruction list plus the points taught into it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
    error::{PendantError, PendantResult},
    vm::Point,
};

pub mod instruction;
pub mod library;
pub mod motion;

pub use instruction::{CallTarget, Flow, Instruction, InstructionId, InstructionKind};
pub use library::{ProgramHandle, ProgramLibrary, link_calls};

/// Number of position slots a program can hold.
pub const POSITION_CAPACITY: usize = 1000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Program {
    name: String,
    instructions: Vec<Instruction>,
    positions: BTreeMap<usize, Point>,
    /// Lowest unused slot. Points at an occupied slot once the table is full.
    next_free_slot: usize,
    #[serde(skip)]
    next_id: u64,
}

impl Program {
    pub fn new(name: impl Into<String>) -> Self {
        Program {
            name: name.into(),
            instructions: Vec::new(),
            positions: BTreeMap::new(),
            next_free_slot: 0,
            next_id: 1,
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn rename(&mut self, name: String) {
        self.name = name;
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn instruction(&self, index: usize) -> Option<&Instruction> {
        self.instructions.get(index)
    }

    pub fn instruction_mut(&mut self, index: usize) -> Option<&mut Instruction> {
        self.instructions.get_mut(index)
    }

    fn fresh_id(&mut self) -> InstructionId {
        let id = InstructionId(self.next_id.max(1));
        self.next_id = id.0 + 1;
        id
    }

    pub fn push_instruction(&mut self, instruction: Instruction) -> PendantResult<InstructionId> {
        self.insert_instruction(self.instructions.len(), instruction)
    }

    /// Inserts before `index`; `index == len()` appends.
    pub fn insert_instruction(
        &mut self,
        index: usize,
        mut instruction: Instruction,
    ) -> PendantResult<InstructionId> {
        if index > self.instructions.len() {
            return Err(PendantError::out_of_range(
                "instruction",
                index,
                self.instructions.len(),
            ));
        }
        instruction.id = self.fresh_id();
        let id = instruction.id;
        self.instructions.insert(index, instruction);
        Ok(id)
    }

    pub fn remove_instruction(&mut self, index: usize) -> PendantResult<Instruction> {
        if index >= self.instructions.len() {
            return Err(PendantError::out_of_range(
                "instruction",
                index,
                self.instructions.len(),
            ));
        }
        Ok(self.instructions.remove(index))
    }

    /// Replaces the instruction at `index`, which keeps its identity.
    pub fn set_instruction(
        &mut self,
        index: usize,
        mut instruction: Instruction,
    ) -> PendantResult<Instruction> {
        let len = self.instructions.len();
        let slot = self
            .instructions
            .get_mut(index)
            .ok_or_else(|| PendantError::out_of_range("instruction", index, len))?;
        instruction.id = slot.id;
        Ok(std::mem::replace(slot, instruction))
    }

    /// Current index of an instruction, wherever edits have moved it.
    pub fn position_of(&self, id: InstructionId) -> Option<usize> {
        self.instructions.iter().position(|i| i.id == id)
    }

    /// Gives every instruction a fresh identity. Identities are not persisted.
    pub fn renumber(&mut self) {
        self.next_id = 1;
        for i in 0..self.instructions.len() {
            let id = self.fresh_id();
            self.instructions[i].id = id;
        }
    }

    /// Index of the first live `LBL[number]`.
    pub fn find_label(&self, number: u32) -> Option<usize> {
        self.instructions.iter().position(|i| {
            !i.commented && matches!(i.kind, InstructionKind::Label(n) if n == number)
        })
    }

    pub fn for_each_call_mut(&mut self, f: &mut impl FnMut(&mut CallTarget)) {
        for instruction in self.instructions.iter_mut() {
            instruction.for_each_call_mut(f);
        }
    }

    pub fn position(&self, slot: usize) -> Option<Point> {
        self.positions.get(&slot).copied()
    }

    pub fn positions(&self) -> impl Iterator<Item = (usize, &Point)> {
        self.positions.iter().map(|(slot, p)| (*slot, p))
    }

    #[inline]
    pub fn position_count(&self) -> usize {
        self.positions.len()
    }

    #[inline]
    pub fn next_free_slot(&self) -> usize {
        self.next_free_slot
    }

    fn free_slot_from(&self, start: usize) -> Option<usize> {
        (start..POSITION_CAPACITY).find(|slot| !self.positions.contains_key(slot))
    }

    /// Creates or overwrites the point in `slot`.
    pub fn set_position(&mut self, slot: usize, point: Point) -> PendantResult<()> {
        if slot >= POSITION_CAPACITY {
            return Err(PendantError::out_of_range("position slot", slot, POSITION_CAPACITY));
        }
        self.positions.insert(slot, point);
        if slot == self.next_free_slot {
            // Saturated tables keep pointing at an occupied slot.
            self.next_free_slot = self.free_slot_from(slot).unwrap_or(slot);
        }
        Ok(())
    }

    pub fn clear_position(&mut self, slot: usize) -> Option<Point> {
        let removed = self.positions.remove(&slot)?;
        let saturated = self.positions.contains_key(&self.next_free_slot);
        if slot < self.next_free_slot || saturated {
            self.next_free_slot = slot;
        }
        Some(removed)
    }

    /// Stores `point` in the lowest free slot and returns that slot.
    pub fn teach_position(&mut self, point: Point) -> PendantResult<usize> {
        let slot = self.next_free_slot;
        if self.positions.contains_key(&slot) {
            return Err(PendantError::CapacityExceeded("position table"));
        }
        self.set_position(slot, point)?;
        Ok(slot)
    }
}

#[cfg(test)]
mod tests;
