// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Re-exports the lock types used throughout the crate so the implementation
//! can be swapped in one place. These are used in conjunction with the
//! `trace_lock!`, `trace_read_lock!` and `trace_write_lock!` macros.

pub use parking_lot::{Mutex, RwLock};
