use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use arboard::Clipboard;
use duet::config_ext::ConfigExt;
use duet::countdown::Countdown;
use duet::event::{SessionEvent, UserAction};
use duet::icon;
use duet::notify::{self, NotificationLayer};
use duet::screen::TakeScreen;
use duet::selection::SelectedAudio;
use duet::session::RecordingSession;
use duet::sink::{EventSink, ProxySink};
use duet::tray::{MenuCommand, TrayMenu, TrayView};
use duet::{
    CameraCapture, ConfigManager, CpalPlayer, DEFAULT_LOG_LEVEL, HttpUploader,
    HttpUploaderConfig, MediaElement, MediaSlot, SessionState, TakePlayer,
};
use duet_media::{MediaCallback, request_camera_access};
use global_hotkey::{GlobalHotKeyEvent, GlobalHotKeyManager, HotKeyState};
use tao::event::{Event, StartCause, WindowEvent};
use tao::event_loop::{ControlFlow, EventLoop, EventLoopBuilder};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tray_icon::menu::MenuEvent;
use tray_icon::TrayIconBuilder;

/// How often the take window checks for the next frame while playing.
const FRAME_POLL: Duration = Duration::from_millis(33);

fn main() -> Result<()> {
    // Initialize the logger
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("DUET_LOG")
                .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL)),
        )
        .finish()
        .with(NotificationLayer::new())
        .init();

    // Load config
    let config_manager = ConfigManager::new()?;
    let config = config_manager.load()?;
    // save back the config to create the file if it doesn't exist
    config_manager.save(&config)?;

    // Set up hotkey
    let hotkey_manager = GlobalHotKeyManager::new().context("Failed to create hotkey manager")?;
    let hotkey = config.hotkey();
    let hotkey_id = hotkey.id();
    hotkey_manager
        .register(hotkey)
        .context("Failed to register hotkey")?;

    // Countdown and uploads run here and report back through the event loop.
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_all()
        .build()?;

    let event_loop: EventLoop<SessionEvent> = EventLoopBuilder::with_user_event().build();
    let sink: Arc<dyn EventSink> = Arc::new(ProxySink::new(event_loop.create_proxy()));

    // Set up the session
    let mut session = RecordingSession::new(
        CpalPlayer::new("audio", media_callback(&sink, MediaSlot::Audio)),
        TakePlayer::new("take", media_callback(&sink, MediaSlot::Video)),
        CameraCapture::new(config.camera, config.chunk_interval()),
        sink.clone(),
        runtime.handle().clone(),
    )
    .with_countdown(Countdown::from_config(&config));

    if let Some(url) = config.upload_url() {
        let mut upload_config = HttpUploaderConfig::new(url).with_field(&config.upload_field);
        if let Some(authorization) = config.upload_auth() {
            upload_config = upload_config.with_authorization(authorization);
        }
        session = session.with_uploader(Arc::new(HttpUploader::new(upload_config)));
    }

    if let Some(path) = std::env::args_os().nth(1) {
        match SelectedAudio::from_path(&path) {
            Ok(selected) => session.handle(UserAction::SelectAudio(Some(selected)).into()),
            Err(e) => warn!("{:#}", e),
        }
    }

    request_camera_access();

    let mut clipboard = Clipboard::new()?;
    let tray_menu = TrayMenu::new()?;

    // Set up the event loop
    let mut icon_tray = None;
    let mut screen: Option<TakeScreen> = None;
    let mut last_view: Option<TrayView> = None;

    let menu_channel = MenuEvent::receiver();
    let hotkey_channel = GlobalHotKeyEvent::receiver();

    event_loop.run(move |event, target, control_flow| {
        *control_flow = ControlFlow::Wait;
        // Owned by the loop so countdowns and uploads keep running.
        let _ = &runtime;

        if let Event::NewEvents(StartCause::Init) = event {
            // We create the icon once the event loop is actually running
            // to prevent issues like https://github.com/tauri-apps/tray-icon/issues/90
            let mut builder = TrayIconBuilder::new()
                .with_menu(Box::new(tray_menu.menu().clone()))
                .with_tooltip("duet - sing along and record");
            if let Some(icon) = icon::icon(SessionState::Idle) {
                builder = builder.with_icon(icon);
            }
            match builder.build() {
                Ok(tray) => {
                    icon_tray.replace(tray);
                }
                Err(e) => error!("Failed to create tray icon: {}", e),
            }

            // We have to request a redraw here to have the icon actually show up.
            // Tao only exposes a redraw method on the Window so we use core-foundation directly.
            #[cfg(target_os = "macos")]
            unsafe {
                use core_foundation::runloop::{CFRunLoopGetMain, CFRunLoopWakeUp};

                let rl = CFRunLoopGetMain();
                CFRunLoopWakeUp(rl);
            }

            match TakeScreen::new(target) {
                Ok(created) => screen = Some(created),
                Err(e) => error!("{:#}", e),
            }

            info!("Duet ready");
        }

        match &event {
            Event::WindowEvent {
                window_id,
                event: WindowEvent::CloseRequested,
                ..
            } => {
                if let Some(screen) = screen.as_mut().filter(|s| s.id() == *window_id) {
                    screen.dismiss();
                }
            }
            Event::RedrawRequested(window_id) => {
                if let Some(screen) = screen.as_mut().filter(|s| s.id() == *window_id) {
                    if let Err(e) = screen.redraw() {
                        warn!("{:#}", e);
                    }
                }
            }
            _ => {}
        }

        if let Ok(event) = menu_channel.try_recv() {
            match tray_menu.command(&event.id) {
                Some(MenuCommand::Quit) => {
                    icon_tray.take();
                    *control_flow = ControlFlow::Exit;
                }
                Some(MenuCommand::CopyConfigPath) => {
                    if let Err(e) = clipboard
                        .set_text(config_manager.config_path().to_string_lossy().into_owned())
                    {
                        error!("Failed to copy config path to clipboard: {}", e);
                    }
                }
                Some(MenuCommand::UseCopiedPath) => match copied_audio(&mut clipboard) {
                    Ok(selected) => session.handle(UserAction::SelectAudio(Some(selected)).into()),
                    Err(e) => warn!("{:#}", e),
                },
                Some(command) => {
                    if let Some(action) = command.action() {
                        session.handle(action.into());
                    }
                }
                None => {}
            }
        }

        // Handle hotkey events: press whichever of record/stop is enabled
        if let Ok(event) = hotkey_channel.try_recv() {
            if event.id() == hotkey_id && event.state() == HotKeyState::Pressed {
                let controls = session.controls();
                if controls.record {
                    session.handle(UserAction::Record.into());
                } else if controls.stop {
                    session.handle(UserAction::Stop.into());
                }
            }
        }

        // Handle events posted by devices and tasks
        if let Event::UserEvent(event) = event {
            session.handle(event);
        }

        for message in session.take_alerts() {
            notify::alert(&message);
        }

        if let Some(screen) = screen.as_mut() {
            screen.update(session.video());
        }
        if *control_flow == ControlFlow::Wait && session.video().status().is_playing() {
            *control_flow = ControlFlow::WaitUntil(Instant::now() + FRAME_POLL);
        }

        let view = TrayView::of(&session);
        if last_view.as_ref() != Some(&view) {
            debug!(state = ?view.state, controls = ?view.controls, "view changed");
            tray_menu.apply(&view);
            if let Some(tray) = icon_tray.as_ref() {
                if let Err(e) = tray.set_icon(icon::icon(view.state)) {
                    warn!("Failed to set tray icon: {}", e);
                }
                tray.set_tooltip(Some(view.tooltip())).ok();
                tray.set_title(view.countdown);
            }
            last_view = Some(view);
        }
    });
}

fn media_callback(sink: &Arc<dyn EventSink>, slot: MediaSlot) -> MediaCallback {
    let sink = sink.clone();
    Arc::new(move |event| sink.post(SessionEvent::Media { slot, event }))
}

/// Reads an audio file whose path was copied to the clipboard.
fn copied_audio(clipboard: &mut Clipboard) -> Result<SelectedAudio> {
    let text = clipboard
        .get_text()
        .context("Clipboard does not contain a file path")?;
    let path = text.trim().trim_matches('"');
    SelectedAudio::from_path(path)
}
