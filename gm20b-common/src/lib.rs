// SPDX-FileCopyrightText: 2025 gm20b contributors
// SPDX-License-Identifier: GPL-3.0-or-later

pub mod settings;
pub mod types;

pub use settings::EngineSettings;
pub use types::*;
