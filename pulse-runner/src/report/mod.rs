// Copyright (c) The pulse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reading and writing the report artifact.

mod reader;
mod writer;

pub use reader::*;
pub use writer::*;
