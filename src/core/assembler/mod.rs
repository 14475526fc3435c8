// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Assembler-wide support shared by the core pipeline.
//!
//! - [`error`] - Error types and diagnostics

pub mod error;
