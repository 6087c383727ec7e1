use super::*;
use crate::vm::{ActiveFrames, EvaluationContext, Operand, RegisterBank, RobotPose};

fn p(x: f32) -> Point {
    Point::new([x, 0.0, 0.0], [0.0; 3])
}

#[test]
fn instruction_list_edits() {
    let mut program = Program::new("MAIN");
    program.push_instruction(Instruction::label(1)).unwrap();
    program.push_instruction(Instruction::jump(1)).unwrap();
    program.insert_instruction(1, Instruction::io_set(0, true)).unwrap();
    assert_eq!(program.len(), 3);
    assert_eq!(program.instruction(1).map(Instruction::tag), Some(3));

    assert!(program.insert_instruction(4, Instruction::default()).is_err());
    assert!(program.remove_instruction(3).is_err());

    let removed = program.remove_instruction(0).unwrap();
    assert_eq!(removed.kind, InstructionKind::Label(1));
    assert_eq!(program.len(), 2);
}

#[test]
fn identities_survive_list_edits() {
    let mut program = Program::new("MAIN");
    let first = program.push_instruction(Instruction::label(1)).unwrap();
    let second = program.push_instruction(Instruction::jump(1)).unwrap();
    assert_ne!(first, second);

    let inserted = program.insert_instruction(0, Instruction::default()).unwrap();
    assert_eq!(program.position_of(inserted), Some(0));
    assert_eq!(program.position_of(first), Some(1));
    assert_eq!(program.position_of(second), Some(2));

    program.set_instruction(1, Instruction::label(7)).unwrap();
    assert_eq!(program.position_of(first), Some(1));

    program.remove_instruction(1).unwrap();
    assert_eq!(program.position_of(first), None);
    assert_eq!(program.position_of(second), Some(1));

    let copy = program.clone();
    assert_eq!(copy.position_of(second), Some(1));
}

#[test]
fn labels_skip_commented_lines() {
    let mut program = Program::new("MAIN");
    program.push_instruction(Instruction::label(2).commented()).unwrap();
    program.push_instruction(Instruction::default()).unwrap();
    program.push_instruction(Instruction::label(2)).unwrap();
    program.push_instruction(Instruction::label(3)).unwrap();
    assert_eq!(program.find_label(2), Some(2));
    assert_eq!(program.find_label(3), Some(3));
    assert_eq!(program.find_label(4), None);
}

#[test]
fn next_free_slot_stays_lowest() {
    let mut program = Program::new("MAIN");
    assert_eq!(program.teach_position(p(0.0)), Ok(0));
    assert_eq!(program.teach_position(p(1.0)), Ok(1));
    program.set_position(3, p(3.0)).unwrap();
    assert_eq!(program.next_free_slot(), 2);
    assert_eq!(program.teach_position(p(2.0)), Ok(2));
    assert_eq!(program.next_free_slot(), 4);

    program.set_position(1, p(10.0)).unwrap();
    assert_eq!(program.position(1), Some(p(10.0)));
    assert_eq!(program.next_free_slot(), 4);

    assert_eq!(program.clear_position(1), Some(p(10.0)));
    assert_eq!(program.next_free_slot(), 1);
    assert_eq!(program.clear_position(1), None);
    assert_eq!(program.clear_position(3), Some(p(3.0)));
    assert_eq!(program.next_free_slot(), 1);
    assert_eq!(program.position_count(), 2);
}

#[test]
fn position_table_saturates() {
    let mut program = Program::new("MAIN");
    for slot in 0..POSITION_CAPACITY {
        assert_eq!(program.teach_position(p(slot as f32)), Ok(slot));
    }
    assert!(program.position(program.next_free_slot()).is_some());
    assert_eq!(
        program.teach_position(p(0.0)),
        Err(PendantError::CapacityExceeded("position table"))
    );
    assert!(program.set_position(POSITION_CAPACITY, p(0.0)).is_err());

    program.clear_position(500);
    assert_eq!(program.next_free_slot(), 500);
    assert_eq!(program.teach_position(p(5.0)), Ok(500));
}

#[test]
fn clones_are_independent() {
    let mut original = Program::new("MAIN");
    original.teach_position(p(1.0)).unwrap();
    original.push_instruction(Instruction::io_set(0, true)).unwrap();

    let mut copy = original.clone();
    copy.set_position(0, p(99.0)).unwrap();
    copy.instruction_mut(0).unwrap().commented = true;
    copy.push_instruction(Instruction::jump(1)).unwrap();

    assert_eq!(original.position(0), Some(p(1.0)));
    assert!(!original.instruction(0).unwrap().commented);
    assert_eq!(original.len(), 1);
}

#[test]
fn clone_shares_register_references_only() {
    let mut program = Program::new("MAIN");
    program
        .push_instruction(Instruction::if_then(Operand::IoRegister(0), Instruction::jump(1)))
        .unwrap();
    let copy = program.clone();

    let mut registers = RegisterBank::default();
    let mut frames = ActiveFrames::default();
    let mut ctx = EvaluationContext::new(&mut registers, &mut frames, RobotPose::default(), 0);
    let first = copy.instruction(0).unwrap().execute(&mut ctx, &copy).unwrap();
    ctx.registers.set_io(0, true).unwrap();
    let second = program.instruction(0).unwrap().execute(&mut ctx, &program).unwrap();
    assert_eq!(first, Flow::Next);
    assert_eq!(second, Flow::Jump(1));
}

#[test]
fn renumber_assigns_fresh_identities() {
    let mut program = Program::new("MAIN");
    program.push_instruction(Instruction::label(1)).unwrap();
    program.push_instruction(Instruction::label(2)).unwrap();
    for instruction in program.instructions.iter_mut() {
        instruction.id = InstructionId::default();
    }
    program.renumber();
    let ids: Vec<_> = program.instructions().iter().map(Instruction::id).collect();
    assert_ne!(ids[0], ids[1]);
    assert!(ids.iter().all(|id| *id != InstructionId::default()));
    let next = program.push_instruction(Instruction::default()).unwrap();
    assert!(!ids.contains(&next));
}
