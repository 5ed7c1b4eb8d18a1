// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! REST surface of the poll backend.

pub mod models;
pub mod transport;
