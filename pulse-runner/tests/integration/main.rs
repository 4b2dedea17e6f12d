// Copyright (c) The pulse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

mod basic;
mod fixtures;
mod sharded;
