// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Instruction table for the target stack machine.
//!
//! Mnemonics are lower-case and every instruction is a single opcode byte;
//! push instructions carry their immediate bytes inline, the width being
//! implied by the opcode (`0x5f + width`).

pub struct OpcodeEntry {
    pub mnemonic: &'static str,
    pub opcode: u8,
}

pub const PUSH2: u8 = 0x61;
pub const JUMPDEST: u8 = 0x5b;
pub const STOP: u8 = 0x00;

/// Largest immediate a push instruction can carry.
pub const MAX_PUSH_WIDTH: usize = 32;

const PUSH_BASE: u8 = 0x5f;

pub static OPCODE_TABLE: &[OpcodeEntry] = &[
    OpcodeEntry { mnemonic: "stop", opcode: 0x00 },
    OpcodeEntry { mnemonic: "add", opcode: 0x01 },
    OpcodeEntry { mnemonic: "mul", opcode: 0x02 },
    OpcodeEntry { mnemonic: "sub", opcode: 0x03 },
    OpcodeEntry { mnemonic: "div", opcode: 0x04 },
    OpcodeEntry { mnemonic: "sdiv", opcode: 0x05 },
    OpcodeEntry { mnemonic: "mod", opcode: 0x06 },
    OpcodeEntry { mnemonic: "smod", opcode: 0x07 },
    OpcodeEntry { mnemonic: "addmod", opcode: 0x08 },
    OpcodeEntry { mnemonic: "mulmod", opcode: 0x09 },
    OpcodeEntry { mnemonic: "exp", opcode: 0x0a },
    OpcodeEntry { mnemonic: "signextend", opcode: 0x0b },
    OpcodeEntry { mnemonic: "lt", opcode: 0x10 },
    OpcodeEntry { mnemonic: "gt", opcode: 0x11 },
    OpcodeEntry { mnemonic: "slt", opcode: 0x12 },
    OpcodeEntry { mnemonic: "sgt", opcode: 0x13 },
    OpcodeEntry { mnemonic: "eq", opcode: 0x14 },
    OpcodeEntry { mnemonic: "iszero", opcode: 0x15 },
    OpcodeEntry { mnemonic: "and", opcode: 0x16 },
    OpcodeEntry { mnemonic: "or", opcode: 0x17 },
    OpcodeEntry { mnemonic: "xor", opcode: 0x18 },
    OpcodeEntry { mnemonic: "not", opcode: 0x19 },
    OpcodeEntry { mnemonic: "byte", opcode: 0x1a },
    OpcodeEntry { mnemonic: "shl", opcode: 0x1b },
    OpcodeEntry { mnemonic: "shr", opcode: 0x1c },
    OpcodeEntry { mnemonic: "sar", opcode: 0x1d },
    OpcodeEntry { mnemonic: "sha3", opcode: 0x20 },
    OpcodeEntry { mnemonic: "address", opcode: 0x30 },
    OpcodeEntry { mnemonic: "balance", opcode: 0x31 },
    OpcodeEntry { mnemonic: "origin", opcode: 0x32 },
    OpcodeEntry { mnemonic: "caller", opcode: 0x33 },
    OpcodeEntry { mnemonic: "callvalue", opcode: 0x34 },
    OpcodeEntry { mnemonic: "calldataload", opcode: 0x35 },
    OpcodeEntry { mnemonic: "calldatasize", opcode: 0x36 },
    OpcodeEntry { mnemonic: "calldatacopy", opcode: 0x37 },
    OpcodeEntry { mnemonic: "codesize", opcode: 0x38 },
    OpcodeEntry { mnemonic: "codecopy", opcode: 0x39 },
    OpcodeEntry { mnemonic: "gasprice", opcode: 0x3a },
    OpcodeEntry { mnemonic: "extcodesize", opcode: 0x3b },
    OpcodeEntry { mnemonic: "extcodecopy", opcode: 0x3c },
    OpcodeEntry { mnemonic: "returndatasize", opcode: 0x3d },
    OpcodeEntry { mnemonic: "returndatacopy", opcode: 0x3e },
    OpcodeEntry { mnemonic: "extcodehash", opcode: 0x3f },
    OpcodeEntry { mnemonic: "blockhash", opcode: 0x40 },
    OpcodeEntry { mnemonic: "coinbase", opcode: 0x41 },
    OpcodeEntry { mnemonic: "timestamp", opcode: 0x42 },
    OpcodeEntry { mnemonic: "number", opcode: 0x43 },
    OpcodeEntry { mnemonic: "difficulty", opcode: 0x44 },
    OpcodeEntry { mnemonic: "gaslimit", opcode: 0x45 },
    OpcodeEntry { mnemonic: "pop", opcode: 0x50 },
    OpcodeEntry { mnemonic: "mload", opcode: 0x51 },
    OpcodeEntry { mnemonic: "mstore", opcode: 0x52 },
    OpcodeEntry { mnemonic: "mstore8", opcode: 0x53 },
    OpcodeEntry { mnemonic: "sload", opcode: 0x54 },
    OpcodeEntry { mnemonic: "sstore", opcode: 0x55 },
    OpcodeEntry { mnemonic: "jump", opcode: 0x56 },
    OpcodeEntry { mnemonic: "jumpi", opcode: 0x57 },
    OpcodeEntry { mnemonic: "pc", opcode: 0x58 },
    OpcodeEntry { mnemonic: "msize", opcode: 0x59 },
    OpcodeEntry { mnemonic: "gas", opcode: 0x5a },
    OpcodeEntry { mnemonic: "jumpdest", opcode: 0x5b },
    OpcodeEntry { mnemonic: "push1", opcode: 0x60 },
    OpcodeEntry { mnemonic: "push2", opcode: 0x61 },
    OpcodeEntry { mnemonic: "push3", opcode: 0x62 },
    OpcodeEntry { mnemonic: "push4", opcode: 0x63 },
    OpcodeEntry { mnemonic: "push5", opcode: 0x64 },
    OpcodeEntry { mnemonic: "push6", opcode: 0x65 },
    OpcodeEntry { mnemonic: "push7", opcode: 0x66 },
    OpcodeEntry { mnemonic: "push8", opcode: 0x67 },
    OpcodeEntry { mnemonic: "push9", opcode: 0x68 },
    OpcodeEntry { mnemonic: "push10", opcode: 0x69 },
    OpcodeEntry { mnemonic: "push11", opcode: 0x6a },
    OpcodeEntry { mnemonic: "push12", opcode: 0x6b },
    OpcodeEntry { mnemonic: "push13", opcode: 0x6c },
    OpcodeEntry { mnemonic: "push14", opcode: 0x6d },
    OpcodeEntry { mnemonic: "push15", opcode: 0x6e },
    OpcodeEntry { mnemonic: "push16", opcode: 0x6f },
    OpcodeEntry { mnemonic: "push17", opcode: 0x70 },
    OpcodeEntry { mnemonic: "push18", opcode: 0x71 },
    OpcodeEntry { mnemonic: "push19", opcode: 0x72 },
    OpcodeEntry { mnemonic: "push20", opcode: 0x73 },
    OpcodeEntry { mnemonic: "push21", opcode: 0x74 },
    OpcodeEntry { mnemonic: "push22", opcode: 0x75 },
    OpcodeEntry { mnemonic: "push23", opcode: 0x76 },
    OpcodeEntry { mnemonic: "push24", opcode: 0x77 },
    OpcodeEntry { mnemonic: "push25", opcode: 0x78 },
    OpcodeEntry { mnemonic: "push26", opcode: 0x79 },
    OpcodeEntry { mnemonic: "push27", opcode: 0x7a },
    OpcodeEntry { mnemonic: "push28", opcode: 0x7b },
    OpcodeEntry { mnemonic: "push29", opcode: 0x7c },
    OpcodeEntry { mnemonic: "push30", opcode: 0x7d },
    OpcodeEntry { mnemonic: "push31", opcode: 0x7e },
    OpcodeEntry { mnemonic: "push32", opcode: 0x7f },
    OpcodeEntry { mnemonic: "dup1", opcode: 0x80 },
    OpcodeEntry { mnemonic: "dup2", opcode: 0x81 },
    OpcodeEntry { mnemonic: "dup3", opcode: 0x82 },
    OpcodeEntry { mnemonic: "dup4", opcode: 0x83 },
    OpcodeEntry { mnemonic: "dup5", opcode: 0x84 },
    OpcodeEntry { mnemonic: "dup6", opcode: 0x85 },
    OpcodeEntry { mnemonic: "dup7", opcode: 0x86 },
    OpcodeEntry { mnemonic: "dup8", opcode: 0x87 },
    OpcodeEntry { mnemonic: "dup9", opcode: 0x88 },
    OpcodeEntry { mnemonic: "dup10", opcode: 0x89 },
    OpcodeEntry { mnemonic: "dup11", opcode: 0x8a },
    OpcodeEntry { mnemonic: "dup12", opcode: 0x8b },
    OpcodeEntry { mnemonic: "dup13", opcode: 0x8c },
    OpcodeEntry { mnemonic: "dup14", opcode: 0x8d },
    OpcodeEntry { mnemonic: "dup15", opcode: 0x8e },
    OpcodeEntry { mnemonic: "dup16", opcode: 0x8f },
    OpcodeEntry { mnemonic: "swap1", opcode: 0x90 },
    OpcodeEntry { mnemonic: "swap2", opcode: 0x91 },
    OpcodeEntry { mnemonic: "swap3", opcode: 0x92 },
    OpcodeEntry { mnemonic: "swap4", opcode: 0x93 },
    OpcodeEntry { mnemonic: "swap5", opcode: 0x94 },
    OpcodeEntry { mnemonic: "swap6", opcode: 0x95 },
    OpcodeEntry { mnemonic: "swap7", opcode: 0x96 },
    OpcodeEntry { mnemonic: "swap8", opcode: 0x97 },
    OpcodeEntry { mnemonic: "swap9", opcode: 0x98 },
    OpcodeEntry { mnemonic: "swap10", opcode: 0x99 },
    OpcodeEntry { mnemonic: "swap11", opcode: 0x9a },
    OpcodeEntry { mnemonic: "swap12", opcode: 0x9b },
    OpcodeEntry { mnemonic: "swap13", opcode: 0x9c },
    OpcodeEntry { mnemonic: "swap14", opcode: 0x9d },
    OpcodeEntry { mnemonic: "swap15", opcode: 0x9e },
    OpcodeEntry { mnemonic: "swap16", opcode: 0x9f },
    OpcodeEntry { mnemonic: "log0", opcode: 0xa0 },
    OpcodeEntry { mnemonic: "log1", opcode: 0xa1 },
    OpcodeEntry { mnemonic: "log2", opcode: 0xa2 },
    OpcodeEntry { mnemonic: "log3", opcode: 0xa3 },
    OpcodeEntry { mnemonic: "log4", opcode: 0xa4 },
    OpcodeEntry { mnemonic: "create", opcode: 0xf0 },
    OpcodeEntry { mnemonic: "call", opcode: 0xf1 },
    OpcodeEntry { mnemonic: "callcode", opcode: 0xf2 },
    OpcodeEntry { mnemonic: "return", opcode: 0xf3 },
    OpcodeEntry { mnemonic: "delegatecall", opcode: 0xf4 },
    OpcodeEntry { mnemonic: "create2", opcode: 0xf5 },
    OpcodeEntry { mnemonic: "staticcall", opcode: 0xfa },
    OpcodeEntry { mnemonic: "revert", opcode: 0xfd },
    OpcodeEntry { mnemonic: "invalid", opcode: 0xfe },
    OpcodeEntry { mnemonic: "selfdestruct", opcode: 0xff },
];

/// Look up the opcode byte for a mnemonic. Lookup is case-sensitive.
pub fn opcode_for(mnemonic: &str) -> Option<u8> {
    OPCODE_TABLE
        .iter()
        .find(|entry| entry.mnemonic == mnemonic)
        .map(|entry| entry.opcode)
}

/// Push opcode carrying `width` immediate bytes, if the width is encodable.
pub fn push_opcode_for_width(width: usize) -> Option<u8> {
    if (1..=MAX_PUSH_WIDTH).contains(&width) {
        Some(PUSH_BASE + width as u8)
    } else {
        None
    }
}

/// Immediate width implied by a push opcode.
pub fn push_width(opcode: u8) -> Option<usize> {
    if (0x60..=0x7f).contains(&opcode) {
        Some((opcode - PUSH_BASE) as usize)
    } else {
        None
    }
}
