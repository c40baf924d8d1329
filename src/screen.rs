//! Window showing the recorded take while it plays.

use std::num::NonZeroU32;
use std::rc::Rc;

use anyhow::{Context, Result, anyhow};
use image::{ImageFormat, RgbImage};
use softbuffer::Surface;
use tao::dpi::LogicalSize;
use tao::event_loop::EventLoopWindowTarget;
use tao::window::{Window, WindowBuilder, WindowId};
use tracing::{debug, warn};

use crate::{MediaElement, TakePlayer};

pub struct TakeScreen {
    window: Rc<Window>,
    surface: Surface<Rc<Window>, Rc<Window>>,
    take: Option<String>,
    frame: Option<usize>,
    picture: Option<RgbImage>,
}

impl TakeScreen {
    /// Creates the window hidden; it appears once a take is loaded.
    pub fn new<T>(target: &EventLoopWindowTarget<T>) -> Result<Self> {
        let window = WindowBuilder::new()
            .with_title("duet - take")
            .with_inner_size(LogicalSize::new(640.0, 480.0))
            .with_visible(false)
            .build(target)
            .context("Failed to create take window")?;
        let window = Rc::new(window);
        let context = softbuffer::Context::new(window.clone())
            .map_err(|e| anyhow!("Failed to open display: {}", e))?;
        let surface = Surface::new(&context, window.clone())
            .map_err(|e| anyhow!("Failed to create window surface: {}", e))?;

        Ok(Self {
            window,
            surface,
            take: None,
            frame: None,
            picture: None,
        })
    }

    pub fn id(&self) -> WindowId {
        self.window.id()
    }

    /// Hides the window until the next take.
    pub fn dismiss(&mut self) {
        self.window.set_visible(false);
    }

    /// Follows the player: shows a newly loaded take, hides when it is gone
    /// and redraws when the position reaches another frame.
    pub fn update(&mut self, player: &TakePlayer) {
        let take = player.take_name().map(str::to_string);
        if take != self.take {
            debug!(?take, "take window follows new take");
            self.window.set_visible(take.is_some());
            self.take = take;
            self.frame = None;
            self.picture = None;
        }
        if !player.has_source() {
            return;
        }

        let Some(index) = player.frame_index() else {
            return;
        };
        if self.frame == Some(index) {
            return;
        }
        self.frame = Some(index);
        let Some(frame) = player.frame(index) else {
            return;
        };
        match image::load_from_memory_with_format(&frame.jpeg, ImageFormat::Jpeg) {
            Ok(picture) => {
                self.picture = Some(picture.to_rgb8());
                self.window.request_redraw();
            }
            Err(e) => warn!(index, error = %e, "skipping undecodable frame"),
        }
    }

    pub fn redraw(&mut self) -> Result<()> {
        let size = self.window.inner_size();
        let (Some(width), Some(height)) = (NonZeroU32::new(size.width), NonZeroU32::new(size.height))
        else {
            return Ok(());
        };
        self.surface
            .resize(width, height)
            .map_err(|e| anyhow!("Failed to resize surface: {}", e))?;

        let mut buffer = self
            .surface
            .buffer_mut()
            .map_err(|e| anyhow!("Failed to map surface: {}", e))?;
        match &self.picture {
            Some(picture) => blit(picture, size.width, size.height, &mut buffer),
            None => buffer.fill(0),
        }
        buffer
            .present()
            .map_err(|e| anyhow!("Failed to present frame: {}", e))
    }
}

/// Scales `picture` to fit a `width` x `height` buffer of 0RGB pixels,
/// keeping its aspect ratio. The borders are black.
fn blit(picture: &RgbImage, width: u32, height: u32, out: &mut [u32]) {
    out.fill(0);
    let (pw, ph) = picture.dimensions();
    if pw == 0 || ph == 0 || width == 0 || height == 0 {
        return;
    }

    let (w, h) = (width as u64, height as u64);
    let (dw, dh) = if w * ph as u64 <= h * pw as u64 {
        (w, (ph as u64 * w / pw as u64).max(1))
    } else {
        ((pw as u64 * h / ph as u64).max(1), h)
    };
    let (ox, oy) = ((w - dw) / 2, (h - dh) / 2);

    for y in 0..dh {
        let sy = (y * ph as u64 / dh) as u32;
        let row = ((oy + y) * w) as usize;
        for x in 0..dw {
            let sx = (x * pw as u64 / dw) as u32;
            let [r, g, b] = picture.get_pixel(sx, sy).0;
            out[row + (ox + x) as usize] = ((r as u32) << 16) | ((g as u32) << 8) | b as u32;
        }
    }
}
