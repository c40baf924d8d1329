// Re-export from sub-crates
pub use duet_core::{
    APP_NAME, APP_NAME_PRETTY, CaptureEvent, Config, ConfigManager, Controls, DEFAULT_LOG_LEVEL,
    MediaEvent, MediaSlot, SessionState, ToggleLabel,
};
pub use duet_media::{
    CameraCapture, CaptureDevice, CaptureStream, CpalPlayer, MATROSKA_MIME, MediaElement,
    MediaError, MediaSource, RecordedTake, TakeFormat, TakePlayer,
};
pub use duet_upload::{HttpUploader, HttpUploaderConfig, UploadError, UploadFile, Uploader};

// App-specific modules
mod color;
pub mod config_ext;
pub mod countdown;
pub mod event;
pub mod icon;
pub mod notify;
pub mod screen;
pub mod selection;
pub mod session;
pub mod sink;
pub mod tray;
pub mod upload;

// Version from this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
