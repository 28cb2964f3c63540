// SPDX-FileCopyrightText: 2025 gm20b contributors
// SPDX-License-Identifier: GPL-3.0-or-later

/// Default number of macro instructions executed before an invocation is
/// aborted as runaway.
pub const DEFAULT_MACRO_STEP_LIMIT: u32 = 0x10_0000;

/// Default size of the guest memory backing used by the replay tool (64 MiB).
pub const DEFAULT_MEMORY_SIZE: u64 = 0x400_0000;

/// Engine settings, populated from the config INI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    // Gpu
    pub macro_step_limit: u32,
    pub memory_size: u64,

    // Debug
    pub use_debug_logging: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            macro_step_limit: DEFAULT_MACRO_STEP_LIMIT,
            memory_size: DEFAULT_MEMORY_SIZE,
            use_debug_logging: false,
        }
    }
}

impl EngineSettings {
    /// Settings with a custom macro step limit, everything else default.
    pub fn with_macro_step_limit(limit: u32) -> Self {
        Self {
            macro_step_limit: limit,
            ..Self::default()
        }
    }
}

/// Parse a boolean the way INI files in the wild spell it.
pub fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse an unsigned integer in decimal or `0x`-prefixed hex.
pub fn parse_u64(s: &str) -> Option<u64> {
    let s = s.trim();
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => s.parse().ok(),
    }
}
