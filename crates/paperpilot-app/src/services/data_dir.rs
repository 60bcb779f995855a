// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Platform-aware data directory resolution.

use std::path::{Path, PathBuf};

/// Name of the client configuration file inside the data directory.
pub const CONFIG_FILE: &str = "config.json";

/// Return the application data directory.  It is not created; a missing
/// directory just means there is no configuration file.
pub fn data_dir() -> PathBuf {
    base_dir(
        std::env::var_os("XDG_DATA_HOME").as_deref().map(Path::new),
        std::env::var_os("HOME").as_deref().map(Path::new),
    )
    .join("paperpilot")
}

/// Default location of the configuration file.
pub fn config_path() -> PathBuf {
    data_dir().join(CONFIG_FILE)
}

fn base_dir(xdg_data_home: Option<&Path>, home: Option<&Path>) -> PathBuf {
    // Try XDG data dir, then fallback to home
    if let Some(xdg) = xdg_data_home.filter(|p| !p.as_os_str().is_empty()) {
        return xdg.to_path_buf();
    }
    if let Some(home) = home {
        return home.join(".local").join("share");
    }
    // Last resort
    std::env::temp_dir()
}
