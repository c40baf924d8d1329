//! The recording session controller.
//!
//! One [`RecordingSession`] exists per app run. It owns both playback
//! elements and the capture device, and is the only thing that changes them
//! (apart from the elements' own end-of-track handling, which it observes
//! through media events). All methods run on the thread that owns the
//! session; slow work (countdown, upload) runs on the tokio runtime and comes
//! back as [`SessionEvent`]s.

use std::sync::Arc;
use std::time::Duration;

use duet_core::ControlInputs;
use duet_media::{CaptureCallback, RecordingBuffer};
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

use crate::countdown::{Countdown, CountdownEvent};
use crate::event::{SessionEvent, UserAction};
use crate::selection::SelectedAudio;
use crate::sink::EventSink;
use crate::upload::UploadStatus;
use crate::{
    CaptureDevice, CaptureEvent, CaptureStream, Controls, MediaElement, MediaSlot, RecordedTake,
    SessionState, TakeFormat, Uploader,
};

pub struct RecordingSession<A, V, C: CaptureDevice> {
    audio: A,
    video: V,
    capture: C,
    // Held from acquisition until stop; dropping it releases the device.
    stream: Option<C::Stream>,
    format: Option<TakeFormat>,
    buffer: RecordingBuffer,
    state: SessionState,
    finishing: bool,
    take: u64,
    selected: Option<SelectedAudio>,
    countdown: Countdown,
    countdown_label: Option<&'static str>,
    uploader: Option<Arc<dyn Uploader>>,
    upload_status: Option<UploadStatus>,
    alerts: Vec<String>,
    sink: Arc<dyn EventSink>,
    runtime: Handle,
}

impl<A, V, C> RecordingSession<A, V, C>
where
    A: MediaElement,
    V: MediaElement,
    C: CaptureDevice,
{
    pub fn new(audio: A, video: V, capture: C, sink: Arc<dyn EventSink>, runtime: Handle) -> Self {
        Self {
            audio,
            video,
            capture,
            stream: None,
            format: None,
            buffer: RecordingBuffer::new(),
            state: SessionState::Idle,
            finishing: false,
            take: 0,
            selected: None,
            countdown: Countdown::default(),
            countdown_label: None,
            uploader: None,
            upload_status: None,
            alerts: Vec::new(),
            sink,
            runtime,
        }
    }

    pub fn with_countdown(mut self, countdown: Countdown) -> Self {
        self.countdown = countdown;
        self
    }

    pub fn with_uploader(mut self, uploader: Arc<dyn Uploader>) -> Self {
        self.uploader = Some(uploader);
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Enablement of every button, derived from the current state.
    pub fn controls(&self) -> Controls {
        Controls::derive(ControlInputs {
            state: self.state,
            finishing: self.finishing,
            has_selected_audio: self.selected.is_some(),
            audio_source: self.audio.has_source(),
            video_source: self.video.has_source(),
            playing: self.is_playing(),
        })
    }

    /// Whether the selected audio is playing on its own, outside a
    /// recording.
    pub fn is_previewing(&self) -> bool {
        self.state != SessionState::Recording
            && !self.video.status().is_playing()
            && self.audio.status().is_playing()
    }

    /// Whether either element is playing. Recomputed from the elements on
    /// every call, so changes made outside the session are reflected.
    pub fn is_playing(&self) -> bool {
        self.audio.status().is_playing() || self.video.status().is_playing_steady()
    }

    /// Label currently shown by the countdown, if one is running.
    pub fn countdown_label(&self) -> Option<&'static str> {
        self.countdown_label
    }

    pub fn upload_status(&self) -> Option<&UploadStatus> {
        self.upload_status.as_ref()
    }

    pub fn selected_audio(&self) -> Option<&SelectedAudio> {
        self.selected.as_ref()
    }

    /// Chunks buffered for the current (or last) recording.
    pub fn buffered_chunks(&self) -> usize {
        self.buffer.len()
    }

    pub fn audio(&self) -> &A {
        &self.audio
    }

    pub fn video(&self) -> &V {
        &self.video
    }

    /// Alerts raised since the last call, oldest first.
    pub fn take_alerts(&mut self) -> Vec<String> {
        std::mem::take(&mut self.alerts)
    }

    /// Applies one event.
    pub fn handle(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::User(action) => self.handle_action(action),
            SessionEvent::Countdown { take, event } => self.on_countdown(take, event),
            SessionEvent::Capture { take, event } => self.on_capture(take, event),
            SessionEvent::Media { slot, event } => {
                debug!(?slot, ?event, playing = self.is_playing(), "media event");
            }
            SessionEvent::UploadFinished(status) => {
                if status.is_failure() {
                    warn!(status = %status, "upload finished");
                } else {
                    info!(status = %status, "upload finished");
                }
                self.upload_status = Some(status);
            }
        }
    }

    fn handle_action(&mut self, action: UserAction) {
        match action {
            UserAction::SelectAudio(selected) => self.select_audio(selected),
            UserAction::Upload => self.upload(),
            UserAction::Record => self.record(),
            UserAction::Stop => self.stop(),
            UserAction::TogglePlayback => self.toggle_playback(),
            UserAction::PreviewAudio => self.preview_audio(),
        }
    }

    fn select_audio(&mut self, selected: Option<SelectedAudio>) {
        info!(file = ?selected.as_ref().map(SelectedAudio::name), "audio selection changed");
        if let Err(e) = self.audio.load(selected.as_ref().map(SelectedAudio::to_source)) {
            warn!(error = %e, "selected audio cannot be played");
        }
        self.selected = selected;
    }

    /// Plays or pauses the selected audio by itself. Usable in any state
    /// except while capturing.
    fn preview_audio(&mut self) {
        if !self.controls().audio_preview || self.state == SessionState::Recording {
            debug!(state = ?self.state, "preview ignored");
            return;
        }
        if self.audio.status().is_playing() {
            info!("pausing preview");
            self.audio.pause();
            return;
        }
        info!("previewing selected audio");
        if let Err(e) = self.audio.play() {
            self.alerts.push(format!("The selected audio cannot be played: {}", e));
        }
    }

    fn upload(&mut self) {
        let Some(selected) = &self.selected else {
            debug!("upload ignored, no file selected");
            return;
        };
        let Some(uploader) = self.uploader.clone() else {
            info!("upload skipped, no endpoint configured");
            self.upload_status = Some(UploadStatus::NotConfigured);
            return;
        };

        let file = selected.to_upload();
        info!(file = %file.name, bytes = file.data.len(), uploader = uploader.name(), "uploading");
        self.upload_status = Some(UploadStatus::InProgress);

        let sink = self.sink.clone();
        self.runtime.spawn(async move {
            let result = uploader.upload(file).await;
            sink.post(SessionEvent::UploadFinished(result.into()));
        });
    }

    fn record(&mut self) {
        if !self.controls().record {
            debug!(state = ?self.state, "record ignored");
            return;
        }
        self.stop_playback();

        self.take += 1;
        let take = self.take;
        let sink = self.sink.clone();
        let callback: CaptureCallback =
            Arc::new(move |event| sink.post(SessionEvent::Capture { take, event }));

        match self.capture.acquire(callback) {
            Ok(stream) => {
                info!(take, "capture acquired, counting down");
                self.format = Some(stream.format());
                self.stream = Some(stream);
                self.state = SessionState::CountingDown;
                self.runtime.spawn(self.countdown.run(self.sink.clone(), take));
            }
            Err(e) => self.fail(format!("Could not access the capture device: {}", e)),
        }
    }

    fn on_countdown(&mut self, take: u64, event: CountdownEvent) {
        if take != self.take || self.state != SessionState::CountingDown {
            debug!(take, ?event, "stale countdown event");
            return;
        }
        match event {
            CountdownEvent::Show(label) => self.countdown_label = Some(label),
            CountdownEvent::Finished => self.begin_recording(),
        }
    }

    fn begin_recording(&mut self) {
        self.countdown_label = None;
        self.buffer.reset();

        let Some(stream) = self.stream.as_mut() else {
            self.fail("Capture device was released before recording".to_string());
            return;
        };
        if let Err(e) = stream.start() {
            self.fail(format!("Could not start capturing: {}", e));
            return;
        }
        self.state = SessionState::Recording;

        // Anything started during the countdown is rewound.
        self.stop_playback();
        if self.audio.has_source() {
            if let Err(e) = self.audio.play() {
                warn!(error = %e, "failed to start audio playback");
            }
        }
        info!(take = self.take, "recording started");
    }

    fn stop(&mut self) {
        if !self.controls().stop {
            debug!(state = ?self.state, finishing = self.finishing, "stop ignored");
            return;
        }
        info!(take = self.take, "stop requested");
        self.finish_capture();
    }

    /// Stops the device. The take is built once the stream reports
    /// `Stopped`, which comes after its last chunk.
    fn finish_capture(&mut self) {
        self.finishing = true;
        if let Some(mut stream) = self.stream.take() {
            stream.stop();
        }
    }

    fn on_capture(&mut self, take: u64, event: CaptureEvent) {
        if take != self.take {
            debug!(take, current = self.take, "stale capture event");
            return;
        }
        match event {
            CaptureEvent::Chunk(chunk) => {
                if self.state == SessionState::Recording {
                    self.buffer.push(chunk);
                }
            }
            CaptureEvent::Failed(reason) => match self.state {
                SessionState::CountingDown => {
                    self.fail(format!("Capture device stopped: {}", reason));
                }
                SessionState::Recording if !self.finishing => {
                    warn!(%reason, "capture ended by the device, finishing take");
                    self.finish_capture();
                }
                _ => {}
            },
            CaptureEvent::Stopped => {
                if self.state == SessionState::Recording && self.finishing {
                    self.finalize();
                }
            }
        }
    }

    fn finalize(&mut self) {
        self.finishing = false;
        self.audio.pause();
        self.audio.seek(Duration::ZERO);

        let Some(format) = self.format.take() else {
            self.fail("Recording format was lost".to_string());
            return;
        };
        if self.buffer.is_empty() {
            self.fail("Nothing was recorded".to_string());
            return;
        }
        let take = RecordedTake::assemble(&format, self.buffer.concat());

        info!(
            take = self.take,
            chunks = self.buffer.len(),
            bytes = take.data().len(),
            mime = take.mime(),
            "recording finished"
        );

        let name = format!("take-{}", self.take);
        if let Err(e) = self.video.load(Some(take.into_source(name))) {
            self.fail(format!("The recording cannot be played: {}", e));
            return;
        }
        self.state = SessionState::Reviewing;
    }

    fn toggle_playback(&mut self) {
        if !self.controls().toggle {
            debug!("toggle ignored, sources missing");
            return;
        }
        if self.is_playing() {
            info!("stopping playback");
            self.stop_playback();
            return;
        }

        info!("starting playback");
        for (slot, element) in [
            (MediaSlot::Audio, &mut self.audio as &mut dyn MediaElement),
            (MediaSlot::Video, &mut self.video as &mut dyn MediaElement),
        ] {
            element.seek(Duration::ZERO);
            if let Err(e) = element.play() {
                warn!(?slot, error = %e, "failed to start playback");
            }
        }
    }

    fn stop_playback(&mut self) {
        self.audio.pause();
        self.audio.seek(Duration::ZERO);
        self.video.pause();
        self.video.seek(Duration::ZERO);
    }

    /// Releases the device, returns to idle and raises an alert.
    fn fail(&mut self, message: String) {
        warn!(take = self.take, %message, "recording aborted");
        // Any `Stopped` this produces finds the session idle and is ignored.
        self.stream = None;
        self.format = None;
        self.finishing = false;
        self.countdown_label = None;
        self.state = SessionState::Idle;
        self.alerts.push(message);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use async_trait::async_trait;
    use bytes::Bytes;
    use duet_media::{MediaError, MediaSource, PlaybackStatus};
    use parking_lot::Mutex;
    use tokio::sync::mpsc::{self, UnboundedReceiver};
    use tokio::time::sleep;

    use super::*;
    use crate::{ToggleLabel, UploadError, UploadFile};

    #[derive(Default)]
    struct FakeElement {
        source: Option<MediaSource>,
        status: PlaybackStatus,
        plays: usize,
    }

    impl MediaElement for FakeElement {
        fn load(&mut self, source: Option<MediaSource>) -> duet_media::Result<()> {
            self.status = PlaybackStatus::default();
            self.source = None;
            match source {
                Some(source) if source.mime() == "broken/unplayable" => {
                    Err(MediaError::UnsupportedFormat(source.mime().to_string()))
                }
                source => {
                    self.source = source;
                    Ok(())
                }
            }
        }

        fn has_source(&self) -> bool {
            self.source.is_some()
        }

        fn play(&mut self) -> duet_media::Result<()> {
            if self.source.is_none() {
                return Err(MediaError::NoSource);
            }
            self.status.paused = false;
            self.status.ended = false;
            self.plays += 1;
            Ok(())
        }

        fn pause(&mut self) {
            self.status.paused = true;
        }

        fn seek(&mut self, position: Duration) {
            self.status.position = position;
            self.status.ended = false;
        }

        fn status(&self) -> PlaybackStatus {
            self.status
        }
    }

    /// What the test can see of the fake device.
    #[derive(Default)]
    struct DeviceHandle {
        deny: AtomicBool,
        fail_start: AtomicBool,
        /// Stop delivers no final chunk
        no_tail: AtomicBool,
        held: AtomicBool,
        acquisitions: AtomicUsize,
        callback: Mutex<Option<CaptureCallback>>,
    }

    impl DeviceHandle {
        /// Delivers an event as the device thread would.
        fn emit(&self, event: CaptureEvent) {
            let callback = self.callback.lock().clone().expect("device never acquired");
            callback(event);
        }
    }

    struct FakeCapture {
        device: Arc<DeviceHandle>,
    }

    struct FakeStream {
        device: Arc<DeviceHandle>,
        callback: CaptureCallback,
        stopped: bool,
    }

    impl CaptureDevice for FakeCapture {
        type Stream = FakeStream;

        fn acquire(&mut self, callback: CaptureCallback) -> duet_media::Result<FakeStream> {
            if self.device.deny.load(Ordering::SeqCst) {
                return Err(MediaError::NoInputDevice);
            }
            self.device.acquisitions.fetch_add(1, Ordering::SeqCst);
            self.device.held.store(true, Ordering::SeqCst);
            *self.device.callback.lock() = Some(callback.clone());
            Ok(FakeStream {
                device: self.device.clone(),
                callback,
                stopped: false,
            })
        }
    }

    impl CaptureStream for FakeStream {
        fn format(&self) -> TakeFormat {
            TakeFormat::new("video/webm")
        }

        fn start(&mut self) -> duet_media::Result<()> {
            if self.device.fail_start.load(Ordering::SeqCst) {
                return Err(MediaError::NoInputDevice);
            }
            Ok(())
        }

        fn stop(&mut self) {
            if !self.stopped {
                self.stopped = true;
                if !self.device.no_tail.load(Ordering::SeqCst) {
                    (self.callback)(CaptureEvent::Chunk(Bytes::from_static(b"|tail")));
                }
                (self.callback)(CaptureEvent::Stopped);
            }
        }
    }

    impl Drop for FakeStream {
        fn drop(&mut self) {
            self.stop();
            self.device.held.store(false, Ordering::SeqCst);
        }
    }

    struct FakeUploader {
        fail: bool,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Uploader for FakeUploader {
        async fn upload(&self, file: UploadFile) -> duet_upload::Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            assert_eq!(file.name, "song.mp3");
            sleep(Duration::from_millis(100)).await;
            if self.fail {
                Err(UploadError::Status {
                    status: duet_upload::StatusCode::BAD_GATEWAY,
                    body: String::new(),
                })
            } else {
                Ok(())
            }
        }

        fn name(&self) -> &str {
            "fake"
        }
    }

    type Session = RecordingSession<FakeElement, FakeElement, FakeCapture>;

    struct Harness {
        session: Session,
        events: UnboundedReceiver<SessionEvent>,
        device: Arc<DeviceHandle>,
    }

    impl Harness {
        fn new() -> Self {
            let (sender, events) = mpsc::unbounded_channel();
            let device = Arc::new(DeviceHandle::default());
            let session = RecordingSession::new(
                FakeElement::default(),
                FakeElement::default(),
                FakeCapture {
                    device: device.clone(),
                },
                Arc::new(sender),
                Handle::current(),
            );
            Self {
                session,
                events,
                device,
            }
        }

        fn handle(&mut self, event: impl Into<SessionEvent>) {
            self.session.handle(event.into());
            let controls = self.session.controls();
            assert!(
                !(controls.record && controls.stop),
                "record and stop both enabled in {:?}",
                self.session.state()
            );
        }

        /// Handles everything already posted.
        fn pump(&mut self) {
            while let Ok(event) = self.events.try_recv() {
                self.handle(event);
            }
        }

        /// Handles posted events, waiting for new ones, until `done` holds.
        async fn run_until(&mut self, done: impl Fn(&Session) -> bool) {
            while !done(&self.session) {
                let event = self.events.recv().await.expect("event channel closed");
                self.handle(event);
            }
        }

        fn select_song(&mut self) {
            self.handle(UserAction::SelectAudio(Some(SelectedAudio::new(
                "song.mp3",
                "audio/mpeg",
                &b"mp3 data"[..],
            ))));
        }

        async fn record_until_recording(&mut self) {
            self.handle(UserAction::Record);
            assert_eq!(self.session.state(), SessionState::CountingDown);
            self.run_until(|s| s.state() == SessionState::Recording).await;
        }

        async fn stop_until_reviewing(&mut self) {
            self.handle(UserAction::Stop);
            self.run_until(|s| s.state() != SessionState::Recording).await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_selection_drives_preview_and_upload() {
        let mut h = Harness::new();
        assert!(!h.session.controls().audio_preview);
        assert!(!h.session.controls().upload);

        for present in [true, false, true, true, false, false] {
            if present {
                h.select_song();
            } else {
                h.handle(UserAction::SelectAudio(None));
            }
            let controls = h.session.controls();
            assert_eq!(controls.audio_preview, present);
            assert_eq!(controls.upload, present);
            assert_eq!(h.session.audio().has_source(), present);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_unplayable_selection_still_uploads() {
        let mut h = Harness::new();
        h.handle(UserAction::SelectAudio(Some(SelectedAudio::new(
            "song.xyz",
            "broken/unplayable",
            &b"??"[..],
        ))));

        assert!(h.session.controls().upload);
        assert!(!h.session.audio().has_source());
    }

    #[tokio::test(start_paused = true)]
    async fn test_record_then_stop_produces_reviewable_take() {
        let mut h = Harness::new();
        h.select_song();
        assert!(h.session.controls().record && !h.session.controls().stop);

        h.handle(UserAction::Record);
        assert_eq!(h.session.state(), SessionState::CountingDown);
        let controls = h.session.controls();
        assert!(!controls.record && !controls.stop);
        assert!(h.device.held.load(Ordering::SeqCst));

        let mut labels = Vec::new();
        while h.session.state() == SessionState::CountingDown {
            let event = h.events.recv().await.unwrap();
            h.handle(event);
            if let Some(label) = h.session.countdown_label() {
                if labels.last() != Some(&label) {
                    labels.push(label);
                }
            }
        }
        assert_eq!(labels, vec!["3", "2", "1", "GO!"]);
        assert_eq!(h.session.state(), SessionState::Recording);
        assert!(h.session.countdown_label().is_none());

        // Audio starts from zero as recording begins.
        let audio = h.session.audio().status();
        assert!(audio.is_playing());
        assert_eq!(audio.position, Duration::ZERO);
        assert_eq!(h.session.audio().plays, 1);
        assert!(h.session.controls().stop && !h.session.controls().record);

        h.device.emit(CaptureEvent::Chunk(Bytes::from_static(b"one")));
        sleep(Duration::from_secs(2)).await;
        h.device.emit(CaptureEvent::Chunk(Bytes::from_static(b"|two")));
        h.pump();

        h.stop_until_reviewing().await;

        assert_eq!(h.session.state(), SessionState::Reviewing);
        assert!(!h.device.held.load(Ordering::SeqCst));
        let video = h.session.video().source.as_ref().unwrap();
        assert_eq!(video.data(), &Bytes::from_static(b"one|two|tail"));
        assert_eq!(video.mime(), "video/webm");

        let audio = h.session.audio().status();
        assert!(audio.paused);
        assert_eq!(audio.position, Duration::ZERO);

        let controls = h.session.controls();
        assert!(controls.record && !controls.stop && controls.toggle);
        assert_eq!(controls.toggle_label, ToggleLabel::Play);
        assert!(h.session.take_alerts().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_record_without_audio_selected() {
        let mut h = Harness::new();
        h.record_until_recording().await;

        assert_eq!(h.session.audio().plays, 0);
        h.stop_until_reviewing().await;

        assert_eq!(h.session.state(), SessionState::Reviewing);
        assert!(h.session.video().has_source());
        assert!(!h.session.controls().toggle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_recording_starts_from_empty_buffer() {
        let mut h = Harness::new();
        h.select_song();
        h.record_until_recording().await;
        h.device.emit(CaptureEvent::Chunk(Bytes::from_static(b"first")));
        h.pump();
        h.stop_until_reviewing().await;
        assert_eq!(h.session.buffered_chunks(), 2);

        h.handle(UserAction::Record);
        // Leftovers from the previous take are ignored.
        h.handle(SessionEvent::Capture {
            take: 1,
            event: CaptureEvent::Chunk(Bytes::from_static(b"stale")),
        });
        // The previous take stays reviewable until the new one completes.
        assert!(h.session.video().has_source());
        h.run_until(|s| s.state() == SessionState::Recording).await;
        assert_eq!(h.session.buffered_chunks(), 0);

        h.device.emit(CaptureEvent::Chunk(Bytes::from_static(b"second")));
        h.pump();
        h.stop_until_reviewing().await;

        let video = h.session.video().source.as_ref().unwrap();
        assert_eq!(video.data(), &Bytes::from_static(b"second|tail"));
        assert_eq!(video.name(), "take-2");
        assert_eq!(h.device.acquisitions.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_capture_denied_stays_idle() {
        let mut h = Harness::new();
        h.select_song();
        h.device.deny.store(true, Ordering::SeqCst);

        h.handle(UserAction::Record);

        assert_eq!(h.session.state(), SessionState::Idle);
        let controls = h.session.controls();
        assert!(controls.record && !controls.stop);
        let alerts = h.session.take_alerts();
        assert_eq!(alerts.len(), 1);
        assert!(alerts[0].contains("no input device"), "{alerts:?}");
        assert!(!h.device.held.load(Ordering::SeqCst));

        // Nothing was scheduled.
        sleep(Countdown::default().total() * 2).await;
        h.pump();
        assert_eq!(h.session.state(), SessionState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_capture_start_failure_releases_device() {
        let mut h = Harness::new();
        h.device.fail_start.store(true, Ordering::SeqCst);

        h.handle(UserAction::Record);
        h.run_until(|s| s.state() != SessionState::CountingDown).await;
        h.pump();

        assert_eq!(h.session.state(), SessionState::Idle);
        assert!(!h.device.held.load(Ordering::SeqCst));
        assert_eq!(h.session.take_alerts().len(), 1);
        assert!(h.session.controls().record);
    }

    #[tokio::test(start_paused = true)]
    async fn test_device_failure_during_countdown() {
        let mut h = Harness::new();
        h.handle(UserAction::Record);
        h.device.emit(CaptureEvent::Failed("unplugged".to_string()));
        h.pump();

        assert_eq!(h.session.state(), SessionState::Idle);
        assert!(!h.device.held.load(Ordering::SeqCst));

        // The rest of the countdown must not start a recording.
        sleep(Countdown::default().total()).await;
        h.pump();
        assert_eq!(h.session.state(), SessionState::Idle);
        assert_eq!(h.session.take_alerts().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_device_failure_while_recording_keeps_take() {
        let mut h = Harness::new();
        h.select_song();
        h.record_until_recording().await;
        h.device.emit(CaptureEvent::Chunk(Bytes::from_static(b"kept")));
        h.device.emit(CaptureEvent::Failed("revoked".to_string()));
        h.run_until(|s| s.state() != SessionState::Recording).await;

        assert_eq!(h.session.state(), SessionState::Reviewing);
        assert_eq!(
            h.session.video().source.as_ref().unwrap().data(),
            &Bytes::from_static(b"kept|tail")
        );
        assert!(!h.device.held.load(Ordering::SeqCst));
        assert!(!h.session.audio().status().is_playing());
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_stop_is_ignored() {
        let mut h = Harness::new();
        h.record_until_recording().await;

        h.handle(UserAction::Stop);
        assert_eq!(h.session.state(), SessionState::Recording);
        assert!(!h.session.controls().stop);
        h.handle(UserAction::Stop);
        h.pump();

        assert_eq!(h.session.state(), SessionState::Reviewing);
        assert_eq!(
            h.session.video().source.as_ref().unwrap().data(),
            &Bytes::from_static(b"|tail")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_recording_is_not_reviewable() {
        let mut h = Harness::new();
        h.device.no_tail.store(true, Ordering::SeqCst);
        h.record_until_recording().await;
        h.stop_until_reviewing().await;

        assert_eq!(h.session.state(), SessionState::Idle);
        assert!(!h.session.video().has_source());
        assert_eq!(h.session.take_alerts(), vec!["Nothing was recorded".to_string()]);
        assert!(h.session.controls().record);
    }

    #[tokio::test(start_paused = true)]
    async fn test_record_ignored_while_busy() {
        let mut h = Harness::new();
        h.handle(UserAction::Record);
        h.handle(UserAction::Record);
        assert_eq!(h.device.acquisitions.load(Ordering::SeqCst), 1);

        h.run_until(|s| s.state() == SessionState::Recording).await;
        h.handle(UserAction::Record);
        assert_eq!(h.device.acquisitions.load(Ordering::SeqCst), 1);
        assert_eq!(h.session.state(), SessionState::Recording);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unplayable_take_returns_to_idle() {
        struct BrokenCapture(Arc<DeviceHandle>);
        struct BrokenStream(FakeStream);

        impl CaptureDevice for BrokenCapture {
            type Stream = BrokenStream;

            fn acquire(&mut self, callback: CaptureCallback) -> duet_media::Result<BrokenStream> {
                FakeCapture {
                    device: self.0.clone(),
                }
                .acquire(callback)
                .map(BrokenStream)
            }
        }

        impl CaptureStream for BrokenStream {
            fn format(&self) -> TakeFormat {
                TakeFormat::new("broken/unplayable")
            }

            fn start(&mut self) -> duet_media::Result<()> {
                self.0.start()
            }

            fn stop(&mut self) {
                self.0.stop()
            }
        }

        let (sender, mut events) = mpsc::unbounded_channel();
        let device = Arc::new(DeviceHandle::default());
        let mut session = RecordingSession::new(
            FakeElement::default(),
            FakeElement::default(),
            BrokenCapture(device.clone()),
            Arc::new(sender),
            Handle::current(),
        )
        .with_countdown(Countdown::new(Duration::from_millis(10), Duration::ZERO));

        session.handle(UserAction::Record.into());
        while session.state() != SessionState::Recording {
            session.handle(events.recv().await.unwrap());
        }
        session.handle(UserAction::Stop.into());
        while let Ok(event) = events.try_recv() {
            session.handle(event);
        }

        assert_eq!(session.state(), SessionState::Idle);
        assert!(!session.video().has_source());
        assert_eq!(session.take_alerts().len(), 1);
        assert!(!device.held.load(Ordering::SeqCst));
    }

    async fn reviewing_harness() -> Harness {
        let mut h = Harness::new();
        h.select_song();
        h.record_until_recording().await;
        h.stop_until_reviewing().await;
        assert!(h.session.controls().toggle);
        h
    }

    #[tokio::test(start_paused = true)]
    async fn test_toggle_starts_both_from_zero() {
        let mut h = reviewing_harness().await;
        h.session.audio.status.position = Duration::from_secs(5);
        h.session.video.status.position = Duration::from_secs(3);
        let audio_plays = h.session.audio().plays;

        h.handle(UserAction::TogglePlayback);

        for element in [h.session.audio(), h.session.video()] {
            assert!(element.status().is_playing());
            assert_eq!(element.status().position, Duration::ZERO);
        }
        assert_eq!(h.session.audio().plays, audio_plays + 1);
        assert_eq!(h.session.controls().toggle_label, ToggleLabel::Stop);
    }

    #[tokio::test(start_paused = true)]
    async fn test_toggle_stops_and_rewinds_when_either_plays() {
        let mut h = reviewing_harness().await;
        // Only the take is playing, started from its own controls.
        h.session.video.play().unwrap();
        h.session.video.status.position = Duration::from_secs(4);
        h.handle(SessionEvent::Media {
            slot: MediaSlot::Video,
            event: crate::MediaEvent::Play,
        });
        assert_eq!(h.session.controls().toggle_label, ToggleLabel::Stop);

        h.handle(UserAction::TogglePlayback);

        for element in [h.session.audio(), h.session.video()] {
            assert!(element.status().paused);
            assert_eq!(element.status().position, Duration::ZERO);
        }
        assert_eq!(h.session.controls().toggle_label, ToggleLabel::Play);
    }

    #[tokio::test(start_paused = true)]
    async fn test_seeking_video_alone_is_not_playing() {
        let mut h = reviewing_harness().await;
        h.session.video.play().unwrap();
        h.session.video.status.seeking = true;
        assert!(!h.session.is_playing());

        h.session.audio.play().unwrap();
        h.session.audio.status.seeking = true;
        assert!(h.session.is_playing());
    }

    #[tokio::test(start_paused = true)]
    async fn test_ended_media_updates_label() {
        let mut h = reviewing_harness().await;
        h.handle(UserAction::TogglePlayback);
        assert_eq!(h.session.controls().toggle_label, ToggleLabel::Stop);

        for slot in [MediaSlot::Audio, MediaSlot::Video] {
            let element = match slot {
                MediaSlot::Audio => &mut h.session.audio,
                MediaSlot::Video => &mut h.session.video,
            };
            element.status.ended = true;
            h.handle(SessionEvent::Media {
                slot,
                event: crate::MediaEvent::Ended,
            });
        }
        assert_eq!(h.session.controls().toggle_label, ToggleLabel::Play);
    }

    #[tokio::test(start_paused = true)]
    async fn test_double_toggle_ends_stopped() {
        let mut h = reviewing_harness().await;

        h.handle(UserAction::TogglePlayback);
        h.handle(UserAction::TogglePlayback);

        for element in [h.session.audio(), h.session.video()] {
            assert!(!element.status().is_playing());
            assert_eq!(element.status().position, Duration::ZERO);
        }
        assert!(!h.session.is_playing());
    }

    #[tokio::test(start_paused = true)]
    async fn test_playback_started_in_countdown_is_rewound() {
        let mut h = reviewing_harness().await;
        h.handle(UserAction::Record);
        assert!(h.session.controls().toggle);

        h.handle(UserAction::TogglePlayback);
        assert!(h.session.video().status().is_playing());
        h.session.video.status.position = Duration::from_secs(2);
        h.session.audio.status.position = Duration::from_secs(2);

        h.run_until(|s| s.state() == SessionState::Recording).await;

        let video = h.session.video().status();
        assert!(video.paused);
        assert_eq!(video.position, Duration::ZERO);
        let audio = h.session.audio().status();
        assert!(audio.is_playing());
        assert_eq!(audio.position, Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_preview_without_take() {
        let mut h = Harness::new();
        h.select_song();
        assert!(h.session.controls().audio_preview);
        assert!(!h.session.video().has_source());

        h.handle(UserAction::PreviewAudio);
        assert!(h.session.is_previewing());
        assert!(h.session.audio().status().is_playing());
        assert_eq!(h.session.audio().plays, 1);
        assert!(!h.session.video().status().is_playing());

        // A second press pauses where it is.
        h.session.audio.status.position = Duration::from_secs(3);
        h.handle(UserAction::PreviewAudio);
        assert!(!h.session.is_previewing());
        assert!(h.session.audio().status().paused);
        assert_eq!(h.session.audio().status().position, Duration::from_secs(3));
        assert!(h.session.take_alerts().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_preview_needs_selection() {
        let mut h = Harness::new();
        h.handle(UserAction::PreviewAudio);
        assert_eq!(h.session.audio().plays, 0);
        assert!(h.session.take_alerts().is_empty());

        h.handle(UserAction::SelectAudio(Some(SelectedAudio::new(
            "song.xyz",
            "broken/unplayable",
            &b"??"[..],
        ))));
        h.handle(UserAction::PreviewAudio);
        assert!(!h.session.is_previewing());
        assert_eq!(h.session.take_alerts().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_preview_ignored_while_recording() {
        let mut h = Harness::new();
        h.select_song();
        h.record_until_recording().await;

        h.handle(UserAction::PreviewAudio);

        assert!(h.session.audio().status().is_playing());
        assert!(!h.session.is_previewing());
    }

    #[tokio::test(start_paused = true)]
    async fn test_toggle_without_take_is_ignored() {
        let mut h = Harness::new();
        h.select_song();

        h.handle(UserAction::TogglePlayback);

        assert!(!h.session.controls().toggle);
        assert_eq!(h.session.audio().plays, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_upload_without_file_is_noop() {
        let mut h = Harness::new();
        let uploader = Arc::new(FakeUploader {
            fail: false,
            calls: AtomicUsize::new(0),
        });
        h.session.uploader = Some(uploader.clone());

        h.handle(UserAction::Upload);
        sleep(Duration::from_secs(1)).await;
        h.pump();

        assert!(h.session.upload_status().is_none());
        assert_eq!(uploader.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_upload_without_endpoint() {
        let mut h = Harness::new();
        h.select_song();

        h.handle(UserAction::Upload);

        assert_eq!(h.session.upload_status(), Some(&UploadStatus::NotConfigured));
    }

    #[tokio::test(start_paused = true)]
    async fn test_upload_reports_outcome() {
        for (fail, expected) in [
            (false, "Upload successful!"),
            (true, "Upload failed: 502 Bad Gateway"),
        ] {
            let mut h = Harness::new();
            let uploader = Arc::new(FakeUploader {
                fail,
                calls: AtomicUsize::new(0),
            });
            h.session.uploader = Some(uploader.clone());
            h.select_song();

            h.handle(UserAction::Upload);
            assert_eq!(h.session.upload_status(), Some(&UploadStatus::InProgress));
            h.run_until(|s| s.upload_status() != Some(&UploadStatus::InProgress)).await;

            assert_eq!(h.session.upload_status().unwrap().to_string(), expected);
            assert_eq!(uploader.calls.load(Ordering::SeqCst), 1);
            // Upload does not touch the recording state.
            assert_eq!(h.session.state(), SessionState::Idle);
        }
    }
}
