// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Core macro assembler pipeline.
//!
//! - [`parser`] - Declaration parser for macros and tables
//! - [`tokenizer`] - Macro body tokenizer
//! - [`expr`] - Literal and arithmetic evaluation
//! - [`macro_processor`] - Recursive macro and template expansion
//! - [`linker`] - Table placement and placeholder patching

pub mod assembler;
pub mod expr;
pub mod linker;
pub mod macro_processor;
pub mod opcodes;
pub mod parser;
pub mod report;
pub mod source_map;
pub mod text_utils;
pub mod tokenizer;
