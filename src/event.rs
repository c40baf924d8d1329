//! Events driving the recording session.

use crate::countdown::CountdownEvent;
use crate::selection::SelectedAudio;
use crate::upload::UploadStatus;
use crate::{CaptureEvent, MediaEvent, MediaSlot};

/// Something the user pressed.
#[derive(Debug, Clone)]
pub enum UserAction {
    /// Replace the selected audio, or clear it with `None`
    SelectAudio(Option<SelectedAudio>),
    Upload,
    Record,
    Stop,
    TogglePlayback,
    /// Play or pause the selected audio on its own
    PreviewAudio,
}

/// Every input the session reacts to. Device threads and async tasks post
/// these through an [`EventSink`](crate::sink::EventSink); the session handles
/// them one at a time on its own thread.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    User(UserAction),
    /// Countdown progress for the take being prepared
    Countdown { take: u64, event: CountdownEvent },
    /// Capture output for the given take
    Capture { take: u64, event: CaptureEvent },
    /// Transport change of one of the playback elements
    Media { slot: MediaSlot, event: MediaEvent },
    UploadFinished(UploadStatus),
}

impl From<UserAction> for SessionEvent {
    fn from(action: UserAction) -> Self {
        SessionEvent::User(action)
    }
}
