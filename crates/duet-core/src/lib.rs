//! Core types and configuration for duet.
//!
//! This crate provides platform-agnostic types that can be used across
//! all duet sub-crates.

mod config;
mod event;
mod state;

pub use config::{Config, ConfigManager};
pub use event::{CaptureEvent, MediaEvent, MediaSlot};
pub use state::{ControlInputs, Controls, SessionState, ToggleLabel};

/// Application name
pub const APP_NAME: &str = "duet";

/// Pretty application name for display
pub const APP_NAME_PRETTY: &str = "Duet";

/// Default log level
pub const DEFAULT_LOG_LEVEL: &str = "info";
