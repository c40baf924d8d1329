//! Tray icons, one colour per session state.

use std::sync::LazyLock;

use image::{Rgba, RgbaImage};
use tracing::error;

use crate::SessionState;
use crate::color::{Color, GRAY, GREEN, RED, YELLOW};

const ICON_SIZE: u32 = 32;

static ICON_IDLE: LazyLock<Option<tray_icon::Icon>> = LazyLock::new(|| load_icon(&GRAY));
static ICON_COUNTING_DOWN: LazyLock<Option<tray_icon::Icon>> =
    LazyLock::new(|| load_icon(&YELLOW));
static ICON_RECORDING: LazyLock<Option<tray_icon::Icon>> = LazyLock::new(|| load_icon(&RED));
static ICON_REVIEWING: LazyLock<Option<tray_icon::Icon>> = LazyLock::new(|| load_icon(&GREEN));

/// Icon for the given state, or `None` if it could not be built.
pub fn icon(state: SessionState) -> Option<tray_icon::Icon> {
    match state {
        SessionState::Idle => ICON_IDLE.clone(),
        SessionState::CountingDown => ICON_COUNTING_DOWN.clone(),
        SessionState::Recording => ICON_RECORDING.clone(),
        SessionState::Reviewing => ICON_REVIEWING.clone(),
    }
}

fn load_icon(color: &Color) -> Option<tray_icon::Icon> {
    let image = render_dot(color.default_dark);
    let (width, height) = image.dimensions();
    tray_icon::Icon::from_rgba(image.into_raw(), width, height)
        .map_err(|e| error!("Failed to build tray icon: {}", e))
        .ok()
}

/// A filled circle on a transparent square.
fn render_dot((r, g, b): (u8, u8, u8)) -> RgbaImage {
    let center = (ICON_SIZE as f32 - 1.0) / 2.0;
    let radius = ICON_SIZE as f32 / 2.0 - 2.0;
    RgbaImage::from_fn(ICON_SIZE, ICON_SIZE, |x, y| {
        let dx = x as f32 - center;
        let dy = y as f32 - center;
        if dx * dx + dy * dy <= radius * radius {
            Rgba([r, g, b, 255])
        } else {
            Rgba([0, 0, 0, 0])
        }
    })
}
