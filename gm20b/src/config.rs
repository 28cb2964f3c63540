// SPDX-FileCopyrightText: 2025 gm20b contributors
// SPDX-License-Identifier: GPL-3.0-or-later

use gm20b_common::settings::{parse_bool, parse_u64, EngineSettings};
use ini::Ini;
use log::{debug, info, warn};
use std::path::PathBuf;

/// Load engine settings from an INI file. A missing or unreadable file falls
/// back to defaults.
pub fn load_config(path: Option<&PathBuf>) -> EngineSettings {
    let mut settings = EngineSettings::default();

    let Some(config_path) = path else {
        info!("No config given, using defaults");
        return settings;
    };
    if !config_path.exists() {
        warn!("Config file not found: {}", config_path.display());
        return settings;
    }

    info!("Loading config from: {}", config_path.display());

    match Ini::load_from_file(config_path) {
        Ok(conf) => apply_ini(&conf, &mut settings),
        Err(e) => warn!("Failed to parse config: {}", e),
    }
    settings
}

/// Overlay the values present in `conf` onto `settings`.
pub fn apply_ini(conf: &Ini, settings: &mut EngineSettings) {
    // [Gpu]
    if let Some(section) = conf.section(Some("Gpu")) {
        if let Some(limit) = section.get("macro_step_limit") {
            match parse_u64(limit).and_then(|v| u32::try_from(v).ok()) {
                Some(v) if v > 0 => {
                    settings.macro_step_limit = v;
                    debug!("Macro step limit: 0x{:X}", v);
                }
                _ => warn!("Ignoring macro_step_limit = {:?}", limit),
            }
        }
        if let Some(size) = section.get("memory_size") {
            match parse_u64(size) {
                Some(v) if v > 0 => settings.memory_size = v,
                _ => warn!("Ignoring memory_size = {:?}", size),
            }
        }
    }

    // [Debugging]
    if let Some(section) = conf.section(Some("Debugging")) {
        if let Some(debug_log) = section.get("use_debug_logging") {
            settings.use_debug_logging = parse_bool(debug_log).unwrap_or(false);
        }
    }
}
