use std::sync::Arc;
use crate::ctrl::config::CtrlConfig;
use crate::ctrl::control_unit::ControlUnit;
use crate::ctrl::decode::{DecodeUnit, Opcode, PLACE_BLOCK};
use crate::ctrl::program::{assemble_line, lookup_mnemonic, Program};

const ECHO_PROGRAM: &str = include_str!("../../demos/echo.asm");

#[test]
fn mnemonic_with_operands() {
    let word = assemble_line("LOADPC 1 127 80").expect("assemble").expect("word");
    assert_eq!(word, DecodeUnit::encode(Opcode::LoadPC as u8, 1, PLACE_BLOCK, 80));
}

#[test]
fn missing_operands_are_zero() {
    let word = assemble_line("  start  ").expect("assemble").expect("word");
    assert_eq!(word, Opcode::Start as u32);
}

#[test]
fn raw_words_and_comments() {
    assert_eq!(assemble_line("0x0010_00c1 # LOADD 0 3 16").unwrap(), Some(0x0010_00c1));
    assert_eq!(assemble_line("# nothing here").unwrap(), None);
    assert_eq!(assemble_line("").unwrap(), None);
}

#[test]
fn hex_operands() {
    let word = assemble_line("STOREDA 1 127 0x100").unwrap().unwrap();
    let inst = DecodeUnit::decode(word);
    assert_eq!(inst.op(), Some(Opcode::StoreDA));
    assert_eq!(inst.address, 0x100);
}

#[test]
fn lookup_is_case_insensitive() {
    assert_eq!(lookup_mnemonic("slct_dout_line"), Some(Opcode::SelectDoutLine));
    assert_eq!(lookup_mnemonic("JUMP"), None);
}

#[test]
fn bad_lines_are_rejected() {
    assert!(assemble_line("JUMP 1").is_err());
    assert!(assemble_line("LOADD 8 0 0").is_err());
    assert!(assemble_line("LOADD 0 128 0").is_err());
    assert!(assemble_line("LOADD 0 0 0x10000").is_err());
    assert!(assemble_line("LOADD 0 0 0 0").is_err());
    assert!(assemble_line("0x12 3").is_err());
    assert!(assemble_line("LOADD zero").is_err());
}

#[test]
fn parse_reports_line_numbers() {
    let err = Program::parse("NOOP\n\nFROB 1\n").expect_err("unknown mnemonic");
    assert!(format!("{:#}", err).contains("line 3"), "{:#}", err);
}

#[test]
fn echo_program_parses() {
    let program = Program::parse(ECHO_PROGRAM).expect("demo program");
    assert_eq!(program.len(), 14);
    let last = DecodeUnit::decode(program.get(13).unwrap());
    assert_eq!(last.op(), Some(Opcode::Finish));
    let load = DecodeUnit::decode(program.get(3).unwrap());
    assert_eq!(load.op(), Some(Opcode::LoadPC));
    assert_eq!(load.address, 0x50);
}

#[test]
fn program_must_fit_program_memory() {
    let config = Arc::new(CtrlConfig { program_capacity: 2 });
    let program = Program::new(vec![0; 3]);
    assert!(ControlUnit::new(config.clone(), program).is_err());
    assert!(ControlUnit::new(config, Program::new(vec![0; 2])).is_ok());
}
