use crate::ctrl::decode::{DecodeUnit, Opcode, PLACE_BLOCK};

#[test]
fn decode_splits_fields() {
    // LOADD line 0 place 3 addr 16
    let inst = DecodeUnit::decode(0x0010_00c1);
    assert_eq!(inst.opcode, 1);
    assert_eq!(inst.place, 3);
    assert_eq!(inst.line, 0);
    assert_eq!(inst.address, 16);
    assert_eq!(inst.op(), Some(Opcode::LoadD));
    assert!(!inst.is_block());
}

#[test]
fn decode_takes_top_bits_as_address() {
    let inst = DecodeUnit::decode(0xffff_ffff);
    assert_eq!(inst.opcode, 0x3f);
    assert_eq!(inst.place, 0x7f);
    assert_eq!(inst.line, 0x7);
    assert_eq!(inst.address, 0xffff);
    assert!(inst.is_block());
    assert_eq!(inst.op(), None);
}

#[test]
fn encode_inverts_decode() {
    let word = DecodeUnit::encode(Opcode::LoadPC as u8, 1, PLACE_BLOCK, 80);
    let inst = DecodeUnit::decode(word);
    assert_eq!(inst.op(), Some(Opcode::LoadPC));
    assert_eq!(inst.line, 1);
    assert_eq!(inst.place, PLACE_BLOCK);
    assert_eq!(inst.address, 80);
    assert_eq!(inst.raw, word);
}

#[test]
fn encode_truncates_wide_fields() {
    let word = DecodeUnit::encode(0x41, 9, 0x80, 0);
    let inst = DecodeUnit::decode(word);
    assert_eq!(inst.opcode, 0x01);
    assert_eq!(inst.line, 1);
    assert_eq!(inst.place, 0);
}

#[test]
fn display_names_unknown_opcodes() {
    let inst = DecodeUnit::decode(0x3e);
    assert!(inst.to_string().contains("<unknown>"));
    let inst = DecodeUnit::decode(Opcode::WaitReady as u32);
    assert!(inst.to_string().contains("WAIT_READY"));
}
