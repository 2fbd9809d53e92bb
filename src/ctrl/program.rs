//! Text loader for controller programs.
//!
//! One instruction per line, either a raw word (`0x00502145`) or a mnemonic followed by up to
//! three positional operands `line place address`, e.g. `LOADPC 1 127 80`. Missing operands are
//! zero. `#` starts a comment.
use std::fs;
use std::path::Path;

use anyhow::{anyhow, bail, ensure, Context};
use phf::phf_map;

use crate::ctrl::decode::{DecodeUnit, Opcode};

static MNEMONICS: phf::Map<&'static str, Opcode> = phf_map! {
    "NOOP" => Opcode::Noop,
    "LOADD" => Opcode::LoadD,
    "LOADDA" => Opcode::LoadDA,
    "STORED" => Opcode::StoreD,
    "STOREDA" => Opcode::StoreDA,
    "LOADPC" => Opcode::LoadPC,
    "LOADCC" => Opcode::LoadCC,
    "START" => Opcode::Start,
    "WAIT_READY" => Opcode::WaitReady,
    "FINISH" => Opcode::Finish,
    "SLCT_DIN_LINE" => Opcode::SelectDinLine,
    "SLCT_DOUT_LINE" => Opcode::SelectDoutLine,
    "SLCT_PC_LINE" => Opcode::SelectPcLine,
    "SLCT_CC_LINE" => Opcode::SelectCcLine,
};

pub fn lookup_mnemonic(name: &str) -> Option<Opcode> {
    MNEMONICS.get(name.to_ascii_uppercase().as_str()).copied()
}

fn parse_number(token: &str) -> anyhow::Result<u32> {
    let cleaned = token.replace('_', "");
    let parsed = match cleaned.strip_prefix("0x").or_else(|| cleaned.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => cleaned.parse::<u32>(),
    };
    parsed.map_err(|err| anyhow!("bad number '{}': {}", token, err))
}

/// Assembles one source line; `None` for blank and comment-only lines.
pub fn assemble_line(source: &str) -> anyhow::Result<Option<u32>> {
    let code = source.split('#').next().unwrap_or("").trim();
    let mut tokens = code.split_whitespace();
    let Some(head) = tokens.next() else {
        return Ok(None);
    };

    if head.starts_with(|c: char| c.is_ascii_digit()) {
        ensure!(tokens.next().is_none(), "raw instruction word takes no operands");
        return parse_number(head).map(Some);
    }

    let opcode = lookup_mnemonic(head).ok_or_else(|| anyhow!("unknown mnemonic '{}'", head))?;
    let operands = tokens.map(parse_number).collect::<anyhow::Result<Vec<_>>>()?;
    if operands.len() > 3 {
        bail!("{} takes at most 3 operands (line place address), got {}", head, operands.len());
    }
    let field = |idx: usize| operands.get(idx).copied().unwrap_or(0);
    let (line, place, address) = (field(0), field(1), field(2));
    ensure!(line <= 0x7, "line {} does not fit 3 bits", line);
    ensure!(place <= 0x7f, "place {} does not fit 7 bits", place);
    ensure!(address <= 0xffff, "address {:#x} does not fit 16 bits", address);

    Ok(Some(DecodeUnit::encode(opcode as u8, line as u8, place as u8, address as u16)))
}

/// Instruction words of one controller program, in execution order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Program {
    words: Vec<u32>,
}

impl Program {
    pub fn new(words: Vec<u32>) -> Self {
        Self { words }
    }

    pub fn parse(text: &str) -> anyhow::Result<Self> {
        let mut words = Vec::new();
        for (lineno, source) in text.lines().enumerate() {
            if let Some(word) = assemble_line(source).with_context(|| format!("line {}", lineno + 1))? {
                words.push(word);
            }
        }
        Ok(Self { words })
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = fs::read_to_string(path).with_context(|| format!("failed to read program {:?}", path))?;
        Self::parse(&text).with_context(|| format!("in program {:?}", path))
    }

    pub fn words(&self) -> &[u32] {
        &self.words
    }

    pub fn get(&self, idx: usize) -> Option<u32> {
        self.words.get(idx).copied()
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}
