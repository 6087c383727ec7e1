use super::*;
use crate::vm::{evaluation_context::ActiveFrames, point::RobotPose, registers::RegisterBank};

fn eval(seq: &TokenSequence) -> PendantResult<Operand> {
    let mut registers = RegisterBank::default();
    registers.set_data(0, 6.0).unwrap();
    let mut frames = ActiveFrames::default();
    let ctx = EvaluationContext::new(&mut registers, &mut frames, RobotPose::default(), 0);
    seq.evaluate(&ctx)
}

fn f(x: f32) -> Token {
    Token::Operand(Operand::Float(x))
}

fn op(o: Operator) -> Token {
    Token::Operator(o)
}

fn nested(tokens: Vec<Token>) -> Token {
    Token::Operand(TokenSequence::from_tokens(tokens).into())
}

fn blank_op() -> Token {
    op(Operator::Uninitialized)
}

fn blank_operand() -> Token {
    Token::Operand(Operand::Uninitialized)
}

/// `1 + (2 * 3)`: slots 0:`1` 1:`+` 2:`(` 3:`2` 4:`*` 5:`3` 6:`)`
fn one_plus_nested() -> TokenSequence {
    TokenSequence::from_tokens(vec![
        f(1.0),
        op(Operator::Add),
        nested(vec![f(2.0), op(Operator::Mul), f(3.0)]),
    ])
}

/// `1 + ((2 + 3) * 4)`
fn doubly_nested() -> TokenSequence {
    TokenSequence::from_tokens(vec![
        f(1.0),
        op(Operator::Add),
        nested(vec![
            nested(vec![f(2.0), op(Operator::Add), f(3.0)]),
            op(Operator::Mul),
            f(4.0),
        ]),
    ])
}

#[test]
fn left_fold_has_no_precedence() {
    let seq = TokenSequence::from_tokens(vec![
        f(3.0),
        op(Operator::Add),
        f(4.0),
        op(Operator::Mul),
        f(2.0),
    ]);
    assert_eq!(eval(&seq), Ok(Operand::Float(14.0)));
}

#[test]
fn nesting_groups_explicitly() {
    let seq = TokenSequence::from_tokens(vec![
        f(3.0),
        op(Operator::Add),
        nested(vec![f(4.0), op(Operator::Mul), f(2.0)]),
    ]);
    assert_eq!(eval(&seq), Ok(Operand::Float(11.0)));
    assert_eq!(eval(&doubly_nested()), Ok(Operand::Float(21.0)));
}

#[test]
fn fold_matches_leftmost_reduction() {
    // R[1] (6) - 2 * 3 > 10 AND ON, reduced by hand from the left.
    let seq = TokenSequence::from_tokens(vec![
        Token::Operand(Operand::DataRegister(0)),
        op(Operator::Sub),
        f(2.0),
        op(Operator::Mul),
        f(3.0),
        op(Operator::Gt),
        f(10.0),
        op(Operator::And),
        Token::Operand(Operand::Bool(true)),
    ]);
    let step1 = 6.0f32 - 2.0;
    let step2 = step1 * 3.0;
    let step3 = step2 > 10.0;
    assert_eq!(eval(&seq), Ok(Operand::Bool(step3)));
}

#[test]
fn single_operand_resolves() {
    let seq = TokenSequence::from_tokens(vec![Token::Operand(Operand::DataRegister(0))]);
    assert_eq!(eval(&seq), Ok(Operand::Float(6.0)));
}

#[test]
fn float_equality_is_exact() {
    let seq = TokenSequence::from_tokens(vec![
        f(0.1),
        op(Operator::Add),
        f(0.6),
        op(Operator::Eq),
        f(0.7),
    ]);
    assert_eq!(eval(&seq), Ok(Operand::Bool(false)));
}

#[test]
fn malformed_sequences_are_errors() {
    let even = TokenSequence::from_tokens(vec![f(1.0), op(Operator::Add)]);
    assert!(matches!(eval(&even), Err(PendantError::MalformedSequence(_))));
    let swapped = TokenSequence::from_tokens(vec![op(Operator::Add), f(1.0), op(Operator::Add)]);
    assert!(matches!(eval(&swapped), Err(PendantError::MalformedSequence(_))));
    let doubled = TokenSequence::from_tokens(vec![f(1.0), f(2.0), f(3.0)]);
    assert!(matches!(eval(&doubled), Err(PendantError::MalformedSequence(_))));
    let empty = TokenSequence::from_tokens(Vec::new());
    assert!(matches!(eval(&empty), Err(PendantError::MalformedSequence(_))));
    let inner_bad = TokenSequence::from_tokens(vec![
        f(1.0),
        op(Operator::Add),
        nested(vec![f(2.0), op(Operator::Mul)]),
    ]);
    assert!(matches!(eval(&inner_bad), Err(PendantError::MalformedSequence(_))));
}

#[test]
fn display_lengths_count_brackets() {
    let seq = one_plus_nested();
    assert_eq!(seq.tokens()[2].display_length(), 5);
    assert_eq!(seq.total_display_length(), 9);
    assert_eq!(TokenSequence::new().total_display_length(), 3);
    assert_eq!(doubly_nested().total_display_length(), 13);
}

#[test]
fn edit_slots_map_to_top_level_elements() {
    let seq = one_plus_nested();
    let owners: Vec<_> = (0..8).map(|i| seq.edit_index_to_element(i)).collect();
    assert_eq!(
        owners,
        vec![
            Some(0),
            Some(1),
            Some(2),
            Some(2),
            Some(2),
            Some(2),
            Some(2),
            None
        ]
    );
}

#[test]
fn locate_descends_between_brackets_only() {
    let seq = doubly_nested();
    // 0:1 1:+ 2:( 3:( 4:2 5:+ 6:3 7:) 8:* 9:4 10:)
    let at = |i| seq.locate(i).unwrap();
    assert_eq!(at(1), EditLocation { path: vec![], slot: Slot::Element(1) });
    assert_eq!(at(2), EditLocation { path: vec![], slot: Slot::Open(2) });
    assert_eq!(at(10), EditLocation { path: vec![], slot: Slot::Close(2) });
    assert_eq!(at(3), EditLocation { path: vec![2], slot: Slot::Open(0) });
    assert_eq!(at(7), EditLocation { path: vec![2], slot: Slot::Close(0) });
    assert_eq!(at(5), EditLocation { path: vec![2, 0], slot: Slot::Element(1) });
    assert_eq!(at(9), EditLocation { path: vec![2], slot: Slot::Element(2) });
    assert!(seq.locate(11).is_err());
}

#[test]
fn prepend_to_operand_adds_operator() {
    let mut seq = TokenSequence::from_tokens(vec![f(5.0)]);
    seq.insert_at(-1).unwrap();
    assert_eq!(seq.tokens(), &[blank_op(), f(5.0)]);
    seq.insert_at(-1).unwrap();
    assert_eq!(seq.tokens(), &[blank_operand(), blank_op(), f(5.0)]);
}

#[test]
fn insert_goes_after_owner() {
    let mut seq = TokenSequence::from_tokens(vec![f(3.0), op(Operator::Add), f(4.0)]);
    seq.insert_at(0).unwrap();
    assert_eq!(seq.tokens(), &[f(3.0), blank_op(), op(Operator::Add), f(4.0)]);
    seq.insert_at(2).unwrap();
    assert_eq!(
        seq.tokens(),
        &[f(3.0), blank_op(), op(Operator::Add), blank_operand(), f(4.0)]
    );
}

#[test]
fn insert_inside_nested_sequence() {
    let mut seq = one_plus_nested();
    seq.insert_at(3).unwrap();
    let inner = seq.tokens()[2].as_sequence().unwrap();
    assert_eq!(inner.tokens(), &[f(2.0), blank_op(), op(Operator::Mul), f(3.0)]);
    assert_eq!(seq.len(), 3);
}

#[test]
fn insert_on_brackets_stays_outside() {
    for bracket in [2, 6] {
        let mut seq = one_plus_nested();
        seq.insert_at(bracket).unwrap();
        assert_eq!(seq.len(), 4);
        assert_eq!(seq.tokens()[3], blank_op());
        assert_eq!(seq.tokens()[2].as_sequence().unwrap().len(), 3);
    }
}

#[test]
fn insert_on_closing_slot_appends() {
    let mut seq = one_plus_nested();
    let closing = seq.total_display_length() as isize - 2;
    seq.insert_at(closing).unwrap();
    assert_eq!(seq.tokens().last(), Some(&blank_op()));
    assert!(seq.insert_at(seq.total_display_length() as isize - 1).is_err());
    assert!(seq.insert_at(-2).is_err());
}

#[test]
fn insert_is_capped() {
    let mut tokens = vec![f(1.0)];
    for _ in 0..9 {
        tokens.push(op(Operator::Add));
        tokens.push(f(1.0));
    }
    let mut seq = TokenSequence::from_tokens(tokens);
    assert_eq!(seq.total_display_length(), MAX_DISPLAY_LENGTH);
    assert_eq!(
        seq.insert_at(0),
        Err(PendantError::CapacityExceeded("token sequence"))
    );
    seq.remove_at(0).unwrap();
    assert!(seq.insert_at(0).is_ok());
}

#[test]
fn remove_plain_and_nested_elements() {
    let mut seq = one_plus_nested();
    seq.remove_at(4).unwrap();
    assert_eq!(seq.tokens()[2].as_sequence().unwrap().tokens(), &[f(2.0), f(3.0)]);

    let mut seq = one_plus_nested();
    seq.remove_at(6).unwrap();
    assert_eq!(seq.tokens(), &[f(1.0), op(Operator::Add)]);

    let mut seq = one_plus_nested();
    seq.remove_at(2).unwrap();
    assert_eq!(seq.tokens(), &[f(1.0), op(Operator::Add)]);

    let mut seq = one_plus_nested();
    seq.remove_at(1).unwrap();
    assert_eq!(seq.len(), 2);
    assert!(seq.remove_at(7).is_err());
}

#[test]
fn remove_never_empties_a_sequence() {
    let mut seq = TokenSequence::from_tokens(vec![f(1.0)]);
    assert_eq!(seq.remove_at(0), Err(PendantError::SequenceTooShort));
    assert_eq!(seq.tokens(), &[f(1.0)]);

    let mut seq = TokenSequence::from_tokens(vec![f(1.0), op(Operator::Add), nested(vec![f(2.0)])]);
    assert_eq!(seq.remove_at(3), Err(PendantError::SequenceTooShort));
    seq.remove_at(2).unwrap();
    assert_eq!(seq.len(), 2);
}

#[test]
fn insert_then_remove_restores() {
    let originals = [
        TokenSequence::from_tokens(vec![f(3.0), op(Operator::Add), f(4.0)]),
        one_plus_nested(),
        doubly_nested(),
    ];
    for original in originals {
        for slot in 0..original.total_display_length() - 2 {
            // Bracket slots own a whole nested sequence, so the blank inserted
            // there does not sit at slot + 1.
            let loc = original.locate(slot).unwrap();
            if loc.slot != Slot::Element(loc.slot.element()) {
                continue;
            }
            let mut seq = original.clone();
            seq.insert_at(slot as isize).unwrap();
            // insert_at(k) places the blank right after the element owning k,
            // which for a one-slot element is display slot k + 1.
            seq.remove_at(slot + 1).unwrap();
            assert_eq!(seq, original, "slot {slot}");
        }
        let mut seq = original.clone();
        seq.insert_at(-1).unwrap();
        seq.remove_at(0).unwrap();
        assert_eq!(seq, original);
    }
}

#[test]
fn edits_keep_alternation_when_paired() {
    let mut seq = TokenSequence::from_tokens(vec![f(2.0)]);
    seq.insert_at(0).unwrap();
    seq.insert_at(1).unwrap();
    seq.replace_at(1, op(Operator::Mul)).unwrap();
    seq.replace_at(2, f(8.0)).unwrap();
    assert!(seq.check_well_formed().is_ok());
    assert_eq!(eval(&seq), Ok(Operand::Float(16.0)));
}

#[test]
fn replace_keeps_kinds() {
    let mut seq = one_plus_nested();
    assert!(matches!(
        seq.replace_at(1, f(0.0)),
        Err(PendantError::TypeMismatch(_))
    ));
    seq.replace_at(5, f(10.0)).unwrap();
    assert_eq!(eval(&seq), Ok(Operand::Float(21.0)));
    assert_eq!(seq.element_at(2).unwrap().as_sequence().unwrap().len(), 3);
}

#[test]
fn clones_share_nothing() {
    let original = one_plus_nested();
    let mut copy = original.clone();
    copy.insert_at(3).unwrap();
    copy.replace_at(0, f(100.0)).unwrap();
    assert_eq!(original, one_plus_nested());
    assert_eq!(eval(&original), Ok(Operand::Float(7.0)));
}

#[test]
fn renders_with_brackets() {
    assert_eq!(one_plus_nested().to_string(), "1 + (2 * 3)");
    assert_eq!(TokenSequence::new().to_string(), "...");
}
