// SPDX-FileCopyrightText: 2025 gm20b contributors
// SPDX-License-Identifier: GPL-3.0-or-later

//! Maxwell (GM20B) 3D engine front end.
//!
//! Method dispatch, register state with its shadow copy, the macro executor,
//! semaphore releases and the pushbuffer plumbing that feeds them.

pub mod backend;
pub mod command_processor;
pub mod engines;
pub mod error;
pub mod gpu_context;
pub mod guest_memory;
pub mod macro_interpreter;
pub mod macro_store;
pub mod memory_manager;
pub mod syncpoint;
pub mod timer;
