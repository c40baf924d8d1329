//! App-specific configuration extensions.
//!
//! This module provides hotkey support on top of the core Config.

use global_hotkey::hotkey::{Code, HotKey, Modifiers};
use tracing::warn;

use crate::Config;

/// Default hotkey: Meta+Shift+R
pub fn default_hotkey() -> HotKey {
    HotKey::new(Some(Modifiers::META | Modifiers::SHIFT), Code::KeyR)
}

/// Extension trait for Config to handle hotkeys.
pub trait ConfigExt {
    /// Get the record/stop hotkey, parsing from config or using default.
    fn hotkey(&self) -> HotKey;
}

impl ConfigExt for Config {
    fn hotkey(&self) -> HotKey {
        let Some(hotkey) = self.hotkey.as_deref() else {
            return default_hotkey();
        };
        match hotkey.parse::<HotKey>() {
            Ok(hotkey) => hotkey,
            Err(e) => {
                warn!(hotkey, error = %e, "Invalid hotkey in config, using default");
                default_hotkey()
            }
        }
    }
}
