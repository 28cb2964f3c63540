// SPDX-FileCopyrightText: 2025 gm20b contributors
// SPDX-License-Identifier: GPL-3.0-or-later

//! Null sink: state changes are accepted and dropped.

use super::StateSink;

pub struct NullBackend;

impl NullBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for NullBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl StateSink for NullBackend {
    fn name(&self) -> &str {
        "null"
    }
}
