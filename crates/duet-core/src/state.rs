//! Session state and the button enablement derived from it.

/// Where the recording session currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// Nothing recorded yet, or the last attempt failed
    #[default]
    Idle,
    /// Devices are held and the countdown is on screen
    CountingDown,
    /// Capturing while the selected audio plays
    Recording,
    /// A finished take is loaded next to the selected audio
    Reviewing,
}

/// Label of the combined play/stop button.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleLabel {
    Play,
    Stop,
}

impl ToggleLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToggleLabel::Play => "Play",
            ToggleLabel::Stop => "Stop playback",
        }
    }
}

/// Everything the enablement rules look at.
#[derive(Debug, Clone, Copy, Default)]
pub struct ControlInputs {
    pub state: SessionState,
    /// Stop was requested and the capture has not delivered its final event
    pub finishing: bool,
    pub has_selected_audio: bool,
    pub audio_source: bool,
    pub video_source: bool,
    /// Either element is currently playing
    pub playing: bool,
}

/// What the user can press right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Controls {
    pub record: bool,
    pub stop: bool,
    pub toggle: bool,
    pub toggle_label: ToggleLabel,
    pub upload: bool,
    pub audio_preview: bool,
}

impl Controls {
    /// Derives enablement from the session inputs. Record and stop are never
    /// enabled together.
    pub fn derive(inputs: ControlInputs) -> Self {
        let (record, stop) = match inputs.state {
            SessionState::Idle | SessionState::Reviewing => (true, false),
            SessionState::CountingDown => (false, false),
            SessionState::Recording => (false, !inputs.finishing),
        };

        Self {
            record,
            stop,
            toggle: inputs.audio_source && inputs.video_source,
            toggle_label: if inputs.playing {
                ToggleLabel::Stop
            } else {
                ToggleLabel::Play
            },
            upload: inputs.has_selected_audio,
            audio_preview: inputs.has_selected_audio,
        }
    }
}
