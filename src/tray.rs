//! Tray menu standing in for the session's buttons and labels.

use anyhow::Result;
use tray_icon::menu::{
    AboutMetadataBuilder, Menu, MenuId, MenuItem, PredefinedMenuItem,
};

use crate::event::UserAction;
use crate::session::RecordingSession;
use crate::{APP_NAME_PRETTY, CaptureDevice, Controls, MediaElement, SessionState, VERSION};

/// What a click on a menu item asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuCommand {
    Record,
    Stop,
    TogglePlayback,
    Upload,
    PreviewAudio,
    /// Select the audio file whose path is on the clipboard
    UseCopiedPath,
    ClearAudio,
    CopyConfigPath,
    Quit,
}

impl MenuCommand {
    /// The session action this command maps to directly, if any.
    pub fn action(&self) -> Option<UserAction> {
        match self {
            MenuCommand::Record => Some(UserAction::Record),
            MenuCommand::Stop => Some(UserAction::Stop),
            MenuCommand::TogglePlayback => Some(UserAction::TogglePlayback),
            MenuCommand::Upload => Some(UserAction::Upload),
            MenuCommand::PreviewAudio => Some(UserAction::PreviewAudio),
            MenuCommand::ClearAudio => Some(UserAction::SelectAudio(None)),
            MenuCommand::UseCopiedPath | MenuCommand::CopyConfigPath | MenuCommand::Quit => None,
        }
    }
}

/// Everything the tray shows, captured after each event so unchanged views
/// are not pushed to the platform.
#[derive(Debug, Clone, PartialEq)]
pub struct TrayView {
    pub state: SessionState,
    pub controls: Controls,
    pub countdown: Option<&'static str>,
    pub upload_status: Option<String>,
    pub selection: Option<String>,
    /// The selected audio is playing by itself
    pub previewing: bool,
}

impl TrayView {
    pub fn of<A, V, C>(session: &RecordingSession<A, V, C>) -> Self
    where
        A: MediaElement,
        V: MediaElement,
        C: CaptureDevice,
    {
        Self {
            state: session.state(),
            controls: session.controls(),
            countdown: session.countdown_label(),
            upload_status: session.upload_status().map(ToString::to_string),
            selection: session.selected_audio().map(|s| s.name().to_string()),
            previewing: session.is_previewing(),
        }
    }

    /// First line of the menu.
    pub fn headline(&self) -> String {
        if let Some(label) = self.countdown {
            return label.to_string();
        }
        match self.state {
            SessionState::Idle => "Ready".to_string(),
            SessionState::CountingDown => "Get ready".to_string(),
            SessionState::Recording if self.controls.stop => "Recording".to_string(),
            SessionState::Recording => "Finishing recording".to_string(),
            SessionState::Reviewing => "Take ready".to_string(),
        }
    }

    pub fn selection_line(&self) -> String {
        match &self.selection {
            Some(name) => format!("Audio: {}", name),
            None => "No audio selected".to_string(),
        }
    }

    pub fn preview_label(&self) -> &'static str {
        if self.previewing {
            "Pause preview"
        } else {
            "Preview audio"
        }
    }

    pub fn tooltip(&self) -> String {
        format!("{} - {}", APP_NAME_PRETTY, self.headline())
    }
}

pub struct TrayMenu {
    menu: Menu,
    headline: MenuItem,
    selection: MenuItem,
    upload_status: MenuItem,
    use_copied: MenuItem,
    clear: MenuItem,
    preview: MenuItem,
    upload: MenuItem,
    record: MenuItem,
    stop: MenuItem,
    toggle: MenuItem,
    copy_config: MenuItem,
    quit: MenuItem,
}

impl TrayMenu {
    pub fn new() -> Result<Self> {
        let tray = Self {
            menu: Menu::new(),
            headline: MenuItem::new("Ready", false, None),
            selection: MenuItem::new("No audio selected", false, None),
            upload_status: MenuItem::new("", false, None),
            use_copied: MenuItem::new("Use copied audio path", true, None),
            clear: MenuItem::new("Clear audio", false, None),
            preview: MenuItem::new("Preview audio", false, None),
            upload: MenuItem::new("Upload audio", false, None),
            record: MenuItem::new("Record", true, None),
            stop: MenuItem::new("Stop", false, None),
            toggle: MenuItem::new("Play", false, None),
            copy_config: MenuItem::new("Copy config path", true, None),
            quit: MenuItem::new("Quit", true, None),
        };

        tray.menu.append_items(&[
            &tray.headline,
            &tray.selection,
            &tray.upload_status,
            &PredefinedMenuItem::separator(),
            &tray.use_copied,
            &tray.clear,
            &tray.preview,
            &tray.upload,
            &PredefinedMenuItem::separator(),
            &tray.record,
            &tray.stop,
            &tray.toggle,
            &PredefinedMenuItem::separator(),
            &PredefinedMenuItem::about(
                None,
                Some(
                    AboutMetadataBuilder::new()
                        .version(Some(VERSION.to_owned()))
                        .build(),
                ),
            ),
            &tray.copy_config,
            &PredefinedMenuItem::separator(),
            &tray.quit,
        ])?;

        Ok(tray)
    }

    pub fn menu(&self) -> &Menu {
        &self.menu
    }

    pub fn command(&self, id: &MenuId) -> Option<MenuCommand> {
        let commands = [
            (&self.record, MenuCommand::Record),
            (&self.stop, MenuCommand::Stop),
            (&self.toggle, MenuCommand::TogglePlayback),
            (&self.upload, MenuCommand::Upload),
            (&self.preview, MenuCommand::PreviewAudio),
            (&self.use_copied, MenuCommand::UseCopiedPath),
            (&self.clear, MenuCommand::ClearAudio),
            (&self.copy_config, MenuCommand::CopyConfigPath),
            (&self.quit, MenuCommand::Quit),
        ];
        commands
            .into_iter()
            .find(|(item, _)| item.id() == id)
            .map(|(_, command)| command)
    }

    pub fn apply(&self, view: &TrayView) {
        self.headline.set_text(view.headline());
        self.selection.set_text(view.selection_line());
        self.upload_status
            .set_text(view.upload_status.as_deref().unwrap_or(""));

        self.clear.set_enabled(view.selection.is_some());
        self.preview.set_enabled(view.controls.audio_preview);
        self.preview.set_text(view.preview_label());
        self.upload.set_enabled(view.controls.upload);
        self.record.set_enabled(view.controls.record);
        self.stop.set_enabled(view.controls.stop);
        self.toggle.set_enabled(view.controls.toggle);
        self.toggle.set_text(view.controls.toggle_label.as_str());
    }
}
