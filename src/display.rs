// Where finished panel frames go.
// The physical rig shares one bus between the panels, so a channel has to be
// selected before each present; both sinks enforce the same contract.
// - WindowSink: a desktop preview, every panel side by side in one window.
// - MemorySink: headless, keeps the last frame per channel (tests, --headless).

use minifb::{Key, Window, WindowOptions};
use tracing::info;

use crate::error::{Error, Result};
use crate::palette::Rgb565Lut;
use crate::types::FrameBuffer;

pub trait DisplaySink {
    /// Number of addressable channels.
    fn channels(&self) -> usize;

    /// Address one channel; every following `present` goes there.
    fn select(&mut self, channel: usize) -> Result<()>;

    /// Push a whole panel frame to the selected channel.
    fn present(&mut self, frame: &FrameBuffer) -> Result<()>;

    /// False once the user (or the device) asked to stop.
    fn is_open(&self) -> bool;
}

/// Shared bookkeeping for the select-then-present contract.
#[derive(Debug)]
struct ChannelBus {
    count: usize,
    panel_width: usize,
    panel_height: usize,
    selected: Option<usize>,
}

impl ChannelBus {
    fn select(&mut self, channel: usize) -> Result<()> {
        if channel >= self.count {
            return Err(Error::ChannelOutOfRange { channel, count: self.count });
        }
        self.selected = Some(channel);
        Ok(())
    }

    /// Selected channel, after checking the frame fits the panel.
    fn target(&self, frame: &FrameBuffer) -> Result<usize> {
        let channel = self.selected.ok_or(Error::NoChannelSelected)?;
        if frame.width != self.panel_width
            || frame.height != self.panel_height
            || frame.pixels.len() != frame.width * frame.height
        {
            return Err(Error::FrameSize {
                width: frame.width,
                height: frame.height,
                panel_width: self.panel_width,
                panel_height: self.panel_height,
            });
        }
        Ok(channel)
    }
}

/* ------------------------------- window -------------------------------- */

/// Gap between panels in the preview window.
const PANEL_GAP: usize = 8;
const GAP_COLOR: u32 = 0x00_20_20_20;

pub struct WindowSink {
    window: Window,
    bus: ChannelBus,
    lut: Rgb565Lut,
    canvas: Vec<u32>,
    canvas_width: usize,
}

impl WindowSink {
    /// Open a window wide enough for `channels` panels in a row.
    pub fn new(title: &str, channels: usize, panel_width: usize, panel_height: usize) -> Result<Self> {
        let canvas_width = channels * panel_width + channels.saturating_sub(1) * PANEL_GAP;
        let window = Window::new(title, canvas_width, panel_height, WindowOptions::default())
            .map_err(|e| Error::WindowInit(e.to_string()))?;
        info!(channels, panel_width, panel_height, "Preview window open");
        Ok(Self {
            window,
            bus: ChannelBus { count: channels, panel_width, panel_height, selected: None },
            lut: Rgb565Lut::new(),
            canvas: vec![GAP_COLOR; canvas_width * panel_height],
            canvas_width,
        })
    }

    /// True while ESC is held down.
    fn esc_pressed(&self) -> bool {
        self.window.is_key_down(Key::Escape)
    }
}

impl DisplaySink for WindowSink {
    fn channels(&self) -> usize {
        self.bus.count
    }

    fn select(&mut self, channel: usize) -> Result<()> {
        self.bus.select(channel)
    }

    /// Copies the panel into its slot; the window itself refreshes when the
    /// last channel is presented.
    fn present(&mut self, frame: &FrameBuffer) -> Result<()> {
        let channel = self.bus.target(frame)?;
        let x0 = channel * (self.bus.panel_width + PANEL_GAP);
        for y in 0..frame.height {
            let src = &frame.pixels[y * frame.width..(y + 1) * frame.width];
            let start = y * self.canvas_width + x0;
            let dst = &mut self.canvas[start..start + frame.width];
            for (d, &s) in dst.iter_mut().zip(src) {
                *d = self.lut.bus_to_rgb32(s);
            }
        }

        if channel + 1 == self.bus.count {
            self.window
                .update_with_buffer(&self.canvas, self.canvas_width, self.bus.panel_height)
                .map_err(|e| Error::WindowUpdate(e.to_string()))?;
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.window.is_open() && !self.esc_pressed()
    }
}

/* ------------------------------- memory -------------------------------- */

#[derive(Debug)]
pub struct MemorySink {
    bus: ChannelBus,
    frames: Vec<Option<FrameBuffer>>,
    selects: usize,
    presents: usize,
}

impl MemorySink {
    pub fn new(channels: usize, panel_width: usize, panel_height: usize) -> Self {
        Self {
            bus: ChannelBus { count: channels, panel_width, panel_height, selected: None },
            frames: vec![None; channels],
            selects: 0,
            presents: 0,
        }
    }

    /// Last frame presented on `channel`, if any.
    #[cfg(test)]
    pub fn frame(&self, channel: usize) -> Option<&FrameBuffer> {
        self.frames.get(channel).and_then(Option::as_ref)
    }

    pub fn selects(&self) -> usize {
        self.selects
    }

    pub fn presents(&self) -> usize {
        self.presents
    }
}

impl DisplaySink for MemorySink {
    fn channels(&self) -> usize {
        self.bus.count
    }

    fn select(&mut self, channel: usize) -> Result<()> {
        self.bus.select(channel)?;
        self.selects += 1;
        Ok(())
    }

    fn present(&mut self, frame: &FrameBuffer) -> Result<()> {
        let channel = self.bus.target(frame)?;
        match &mut self.frames[channel] {
            Some(kept) => kept.pixels.copy_from_slice(&frame.pixels),
            slot @ None => *slot = Some(frame.clone()),
        }
        self.presents += 1;
        Ok(())
    }

    fn is_open(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(w: usize, h: usize, fill: u16) -> FrameBuffer {
        let mut fb = FrameBuffer::try_new(w, h).unwrap();
        fb.pixels.fill(fill);
        fb
    }

    #[test]
    fn test_present_requires_select() {
        let mut sink = MemorySink::new(2, 4, 4);
        let err = sink.present(&frame(4, 4, 1)).unwrap_err();
        assert!(matches!(err, Error::NoChannelSelected));
        assert_eq!(sink.presents(), 0);
    }

    #[test]
    fn test_select_out_of_range() {
        let mut sink = MemorySink::new(2, 4, 4);
        let err = sink.select(2).unwrap_err();
        assert!(matches!(err, Error::ChannelOutOfRange { channel: 2, count: 2 }));
    }

    #[test]
    fn test_frames_land_on_selected_channel() {
        let mut sink = MemorySink::new(2, 4, 4);
        sink.select(1).unwrap();
        sink.present(&frame(4, 4, 7)).unwrap();
        assert!(sink.frame(0).is_none());
        assert!(sink.frame(1).unwrap().pixels.iter().all(|&p| p == 7));

        sink.select(0).unwrap();
        sink.present(&frame(4, 4, 9)).unwrap();
        sink.select(1).unwrap();
        sink.present(&frame(4, 4, 3)).unwrap();
        assert!(sink.frame(0).unwrap().pixels.iter().all(|&p| p == 9));
        assert!(sink.frame(1).unwrap().pixels.iter().all(|&p| p == 3));
        assert_eq!((sink.selects(), sink.presents()), (3, 3));
    }

    #[test]
    fn test_wrong_frame_size_rejected() {
        let mut sink = MemorySink::new(1, 4, 4);
        sink.select(0).unwrap();
        let err = sink.present(&frame(5, 4, 0)).unwrap_err();
        assert!(matches!(err, Error::FrameSize { width: 5, height: 4, .. }));
    }
}
