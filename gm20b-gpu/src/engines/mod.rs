// SPDX-FileCopyrightText: 2025 gm20b contributors
// SPDX-License-Identifier: GPL-3.0-or-later

//! GPU engine trait.
//!
//! Engines are bound to GPFIFO subchannels and driven one method write at a
//! time by the command processor.

pub mod maxwell_3d;

use crate::error::Result;

/// GPU engine class IDs (NV device class numbers).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ClassId {
    Threed = 0xB197,
}

/// A GPU engine that accepts method writes.
pub trait Engine: Send {
    fn class_id(&self) -> ClassId;

    /// Handle one method write. `last_call` is set on the final word of a
    /// pushbuffer method batch.
    fn call_method(&mut self, method: u32, argument: u32, last_call: bool) -> Result<()>;

    /// Raw live register words, for inspection and dumps.
    fn registers(&self) -> &[u32];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_ids() {
        assert_eq!(ClassId::Threed as u32, 0xB197);
    }
}
