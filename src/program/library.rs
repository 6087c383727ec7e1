use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{PendantError, PendantResult};

use super::{Program, instruction::CallTarget};

/// Live reference to a program: owning device and position in its library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProgramHandle {
    pub device: u8,
    pub index: usize,
}

/// Ordered programs of one device, unique by name.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ProgramLibrary {
    programs: Vec<Program>,
}

impl ProgramLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.programs.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }

    pub fn programs(&self) -> &[Program] {
        &self.programs
    }

    pub fn get(&self, index: usize) -> Option<&Program> {
        self.programs.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Program> {
        self.programs.get_mut(index)
    }

    pub fn find(&self, name: &str) -> Option<usize> {
        self.programs.iter().position(|p| p.name() == name)
    }

    pub fn by_name(&self, name: &str) -> Option<&Program> {
        self.find(name).and_then(|i| self.get(i))
    }

    pub fn by_name_mut(&mut self, name: &str) -> Option<&mut Program> {
        self.find(name).and_then(|i| self.get_mut(i))
    }

    pub fn create(&mut self, name: impl Into<String>) -> PendantResult<usize> {
        self.add(Program::new(name))
    }

    pub fn add(&mut self, program: Program) -> PendantResult<usize> {
        if self.find(program.name()).is_some() {
            return Err(PendantError::DuplicateName(program.name().to_owned()));
        }
        self.programs.push(program);
        Ok(self.programs.len() - 1)
    }

    /// Removes a program. Handles to later programs shift, so callers relink.
    pub fn remove(&mut self, index: usize) -> PendantResult<Program> {
        if index >= self.programs.len() {
            return Err(PendantError::out_of_range("program", index, self.programs.len()));
        }
        Ok(self.programs.remove(index))
    }

    pub fn rename(&mut self, index: usize, name: impl Into<String>) -> PendantResult<()> {
        let name = name.into();
        if self.find(&name).is_some_and(|other| other != index) {
            return Err(PendantError::DuplicateName(name));
        }
        let len = self.programs.len();
        let program = self
            .programs
            .get_mut(index)
            .ok_or_else(|| PendantError::out_of_range("program", index, len))?;
        program.rename(name);
        Ok(())
    }

    /// Checks a linked call target against this library. A stale link, left
    /// over from an edit made after the last linking pass, is unresolved.
    pub fn resolve(&self, target: &CallTarget) -> PendantResult<ProgramHandle> {
        let unresolved = || PendantError::UnresolvedCall {
            program: target.program.clone(),
            device: target.device,
        };
        let handle = target.link.ok_or_else(unresolved)?;
        match self.get(handle.index) {
            Some(program) if program.name() == target.program => Ok(handle),
            _ => Err(unresolved()),
        }
    }
}

/// Links every call of every program to its target. `libraries[d]` holds the
/// programs of device `d`. Unresolved targets stay unlinked and are returned.
pub fn link_calls(libraries: &mut [&mut ProgramLibrary]) -> Vec<PendantError> {
    let index: HashMap<(u8, String), ProgramHandle> = libraries
        .iter()
        .enumerate()
        .flat_map(|(device, library)| {
            library.programs.iter().enumerate().map(move |(i, program)| {
                let device = device as u8;
                (
                    (device, program.name().to_owned()),
                    ProgramHandle { device, index: i },
                )
            })
        })
        .collect();

    let mut unresolved = Vec::new();
    for library in libraries.iter_mut() {
        for program in library.programs.iter_mut() {
            program.for_each_call_mut(&mut |target: &mut CallTarget| {
                target.link = index.get(&(target.device, target.program.clone())).copied();
                if target.link.is_none() {
                    unresolved.push(PendantError::UnresolvedCall {
                        program: target.program.clone(),
                        device: target.device,
                    });
                }
            });
        }
    }
    unresolved
}
