//! Application directory paths.
//!
//! Uses the [`dirs`] crate for platform-appropriate resolution.
//!
//! | Purpose | macOS | Linux |
//! |---------|-------|-------|
//! | Config | `~/Library/Application Support/medsearch/` | `~/.config/medsearch/` |
//!
//! Set `MEDSEARCH_CONFIG_DIR` to override [`config_dir`].

use std::path::PathBuf;

/// Application config directory.
///
/// Holds `config.toml` and, optionally, a user catalog.
#[must_use]
pub fn config_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("MEDSEARCH_CONFIG_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::config_dir()
        .map(|d| d.join("medsearch"))
        .unwrap_or_else(|| PathBuf::from("/tmp/medsearch-config"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_dir_ends_with_app_name_or_override() {
        let dir = config_dir();
        if std::env::var_os("MEDSEARCH_CONFIG_DIR").is_none() {
            assert!(dir.ends_with("medsearch") || dir.ends_with("medsearch-config"));
        }
    }
}
