//! Editable token form of pendant expressions.
//!
//! A sequence is `v0 op0 v1 op1 v2 ...`, evaluated as a strict left fold with
//! no operator precedence. Nested sequences are operands and render between
//! a pair of brackets.
//!
//! The pendant addresses a line through flat edit slots: every element takes
//! as many slots as its display length, a nested sequence taking one slot per
//! bracket plus the slots of its own elements. `locate` turns a flat slot into
//! a path of nested element indices, and edits walk that path.

use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::error::{PendantError, PendantResult};

use super::{EvaluationContext, expression::ExpressionTree, operand::Operand, operator::Operator};

/// Longest line, in display slots (brackets included), the pendant can render.
pub const MAX_DISPLAY_LENGTH: usize = 21;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Token {
    #[serde(rename = "0")]
    Operand(Operand),
    #[serde(rename = "1")]
    Operator(Operator),
}

impl From<Operand> for Token {
    fn from(value: Operand) -> Self {
        Token::Operand(value)
    }
}

impl From<Operator> for Token {
    fn from(value: Operator) -> Self {
        Token::Operator(value)
    }
}

impl Token {
    #[inline]
    pub fn is_operand(&self) -> bool {
        matches!(self, Token::Operand(_))
    }

    pub fn display_length(&self) -> usize {
        match self {
            Token::Operand(operand) => operand.display_length(),
            Token::Operator(_) => 1,
        }
    }

    pub fn as_sequence(&self) -> Option<&TokenSequence> {
        match self {
            Token::Operand(operand) => operand.as_sequence(),
            Token::Operator(_) => None,
        }
    }

    pub fn as_sequence_mut(&mut self) -> Option<&mut TokenSequence> {
        match self {
            Token::Operand(operand) => operand.as_sequence_mut(),
            Token::Operator(_) => None,
        }
    }

    /// The blank of the other kind, inserted after this token.
    fn blank_after(&self) -> Token {
        match self {
            Token::Operand(_) => Token::Operator(Operator::Uninitialized),
            Token::Operator(_) => Token::Operand(Operand::Uninitialized),
        }
    }
}

impl Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Operand(operand) => write!(f, "{operand}"),
            Token::Operator(op) => write!(f, "{op}"),
        }
    }
}

/// Where a flat edit slot lands inside a sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    /// A plain element.
    Element(usize),
    /// The opening bracket of a nested sequence.
    Open(usize),
    /// The closing bracket of a nested sequence.
    Close(usize),
}

impl Slot {
    pub fn element(self) -> usize {
        match self {
            Slot::Element(i) | Slot::Open(i) | Slot::Close(i) => i,
        }
    }
}

/// A located edit slot: indices of the nested sequences to walk through from
/// the root, then the slot inside the last one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditLocation {
    pub path: Vec<usize>,
    pub slot: Slot,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenSequence {
    tokens: Vec<Token>,
}

impl Default for TokenSequence {
    /// A single blank operand, as a freshly created pendant line.
    fn default() -> Self {
        TokenSequence {
            tokens: vec![Token::Operand(Operand::Uninitialized)],
        }
    }
}

impl FromIterator<Token> for TokenSequence {
    fn from_iter<I: IntoIterator<Item = Token>>(iter: I) -> Self {
        TokenSequence {
            tokens: iter.into_iter().collect(),
        }
    }
}

impl TokenSequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_tokens(tokens: Vec<Token>) -> Self {
        TokenSequence { tokens }
    }

    #[inline]
    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Odd length, operands at even positions and operators at odd ones.
    pub fn check_well_formed(&self) -> PendantResult<()> {
        if self.tokens.len() % 2 == 0 {
            return Err(PendantError::malformed(format!(
                "{} elements, expected an odd count",
                self.tokens.len()
            )));
        }
        for (i, token) in self.tokens.iter().enumerate() {
            if token.is_operand() != (i % 2 == 0) {
                return Err(PendantError::malformed(format!(
                    "element {i} breaks the operand/operator alternation"
                )));
            }
        }
        Ok(())
    }

    /// Left fold: `((v0 op0 v1) op1 v2) ...`, regardless of operator kinds.
    pub fn evaluate(&self, ctx: &EvaluationContext) -> PendantResult<Operand> {
        self.check_well_formed()?;
        let Some((Token::Operand(first), rest)) = self.tokens.split_first() else {
            return Err(PendantError::malformed("missing leading operand"));
        };
        let mut acc = first.resolve(ctx)?;
        for pair in rest.chunks(2) {
            let [Token::Operator(op), Token::Operand(value)] = pair else {
                return Err(PendantError::malformed("dangling operator"));
            };
            acc = ExpressionTree::new(acc, *op, value.clone()).evaluate(ctx)?;
        }
        Ok(acc)
    }

    /// Display slots of the whole sequence, outer brackets included.
    pub fn total_display_length(&self) -> usize {
        2 + self.content_length()
    }

    fn content_length(&self) -> usize {
        self.tokens.iter().map(Token::display_length).sum()
    }

    /// Owning element of every flat edit slot.
    fn edit_table(&self) -> Vec<usize> {
        self.tokens
            .iter()
            .enumerate()
            .flat_map(|(i, token)| std::iter::repeat_n(i, token.display_length()))
            .collect()
    }

    pub fn edit_index_to_element(&self, edit_idx: usize) -> Option<usize> {
        self.edit_table().get(edit_idx).copied()
    }

    /// Resolves a flat edit slot, descending into nested sequences when the
    /// slot falls strictly between their brackets.
    pub fn locate(&self, edit_idx: usize) -> PendantResult<EditLocation> {
        let table = self.edit_table();
        let Some(&elem) = table.get(edit_idx) else {
            return Err(PendantError::out_of_range("edit index", edit_idx, table.len()));
        };
        let Some(inner) = self.tokens[elem].as_sequence() else {
            return Ok(EditLocation {
                path: Vec::new(),
                slot: Slot::Element(elem),
            });
        };
        let start = table.iter().position(|&e| e == elem).unwrap_or(edit_idx);
        let end = start + inner.total_display_length() - 1;
        if edit_idx == start {
            return Ok(EditLocation {
                path: Vec::new(),
                slot: Slot::Open(elem),
            });
        }
        if edit_idx == end {
            return Ok(EditLocation {
                path: Vec::new(),
                slot: Slot::Close(elem),
            });
        }
        let mut loc = inner.locate(edit_idx - start - 1)?;
        loc.path.insert(0, elem);
        Ok(loc)
    }

    fn sequence_at_mut(&mut self, path: &[usize]) -> PendantResult<&mut TokenSequence> {
        let mut seq = self;
        for &i in path {
            seq = match seq.tokens.get_mut(i).and_then(Token::as_sequence_mut) {
                Some(inner) => inner,
                None => return Err(PendantError::malformed(format!("no nested sequence at {i}"))),
            };
        }
        Ok(seq)
    }

    /// The element under an edit slot. Bracket slots give the nested sequence.
    pub fn element_at(&self, edit_idx: usize) -> PendantResult<&Token> {
        let loc = self.locate(edit_idx)?;
        let mut seq = self;
        for &i in &loc.path {
            seq = seq.tokens[i]
                .as_sequence()
                .ok_or_else(|| PendantError::malformed(format!("no nested sequence at {i}")))?;
        }
        Ok(&seq.tokens[loc.slot.element()])
    }

    /// Inserts a blank element for the slot at `edit_idx`.
    ///
    /// `-1` prepends; `total_display_length() - 2`, the closing bracket,
    /// appends. Any other slot inserts right after its owning element, inside
    /// a nested sequence when the slot lies strictly within its brackets.
    pub fn insert_at(&mut self, edit_idx: isize) -> PendantResult<()> {
        let total = self.total_display_length();
        let last_slot = total as isize - 2;
        if edit_idx < -1 || edit_idx > last_slot {
            return Err(PendantError::out_of_range("edit index", edit_idx, total - 1));
        }
        if total + 1 > MAX_DISPLAY_LENGTH {
            return Err(PendantError::CapacityExceeded("token sequence"));
        }

        if edit_idx == -1 {
            let blank = match self.tokens.first() {
                Some(token) if token.is_operand() => Token::Operator(Operator::Uninitialized),
                _ => Token::Operand(Operand::Uninitialized),
            };
            self.tokens.insert(0, blank);
            return Ok(());
        }
        if edit_idx == last_slot {
            let blank = self
                .tokens
                .last()
                .map(Token::blank_after)
                .unwrap_or(Token::Operand(Operand::Uninitialized));
            self.tokens.push(blank);
            return Ok(());
        }

        let loc = self.locate(edit_idx as usize)?;
        let elem = loc.slot.element();
        let seq = self.sequence_at_mut(&loc.path)?;
        let blank = seq.tokens[elem].blank_after();
        seq.tokens.insert(elem + 1, blank);
        Ok(())
    }

    /// Removes the element under `edit_idx`. On a bracket slot the whole
    /// nested sequence goes. A sequence never shrinks below one element.
    pub fn remove_at(&mut self, edit_idx: usize) -> PendantResult<()> {
        let loc = self.locate(edit_idx)?;
        let seq = self.sequence_at_mut(&loc.path)?;
        if seq.tokens.len() <= 1 {
            return Err(PendantError::SequenceTooShort);
        }
        seq.tokens.remove(loc.slot.element());
        Ok(())
    }

    /// Replaces the element under `edit_idx` with one of the same kind.
    pub fn replace_at(&mut self, edit_idx: usize, token: Token) -> PendantResult<()> {
        let loc = self.locate(edit_idx)?;
        let current = self.element_at(edit_idx)?;
        if current.is_operand() != token.is_operand() {
            return Err(PendantError::mismatch(format!(
                "cannot put {token} in place of {current}"
            )));
        }
        let grows_by = token
            .display_length()
            .saturating_sub(current.display_length());
        if self.total_display_length() + grows_by > MAX_DISPLAY_LENGTH {
            return Err(PendantError::CapacityExceeded("token sequence"));
        }
        let seq = self.sequence_at_mut(&loc.path)?;
        seq.tokens[loc.slot.element()] = token;
        Ok(())
    }
}

impl Display for TokenSequence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, token) in self.tokens.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{token}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests;
