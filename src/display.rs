//! # Display Port and Adapters
//!
//! From the core's point of view the panel is stateless: it can draw a
//! string at a character position in one of two inks, and it can be wiped.
//! Remembering what is on the glass is [`crate::render::RenderCache`]'s job.
//!
//! Positions are character cells of the font selected by [`TextSize`], so a
//! row/column pair always addresses the same place for a given size.
//!
//! Adapters:
//! - [`TerminalDisplay`]: prints every draw operation, used in development mode
//! - [`GraphicsDisplay`]: renders with `embedded-graphics` onto any RGB565
//!   [`Surface`], such as the in-memory [`Framebuffer`] or a Linux
//!   [`FramebufferDevice`]

use embedded_graphics::{
    mono_font::{
        ascii::{FONT_10X20, FONT_6X10, FONT_9X15},
        MonoFont, MonoTextStyleBuilder,
    },
    pixelcolor::{IntoStorage, Rgb565},
    prelude::*,
    text::{Baseline, Text},
};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::Path;
use thiserror::Error;

/// Errors reported by display adapters. The core logs them and moves on.
#[derive(Error, Debug)]
pub enum DisplayError {
    #[error("display draw failed: {0}")]
    Draw(String),

    #[error("unsupported panel size {width}x{height}")]
    Size { width: u32, height: u32 },

    #[error("display IO: {0}")]
    Io(#[from] std::io::Error),
}

/// Which of the two configured colours to draw with.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Ink {
    Foreground,
    Background,
}

/// Text size, mapped to a monospaced font by the graphics adapter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextSize {
    Small,
    Medium,
    Large,
}

impl TextSize {
    fn font(self) -> &'static MonoFont<'static> {
        match self {
            TextSize::Small => &FONT_6X10,
            TextSize::Medium => &FONT_9X15,
            TextSize::Large => &FONT_10X20,
        }
    }

    fn label(self) -> &'static str {
        match self {
            TextSize::Small => "small",
            TextSize::Medium => "medium",
            TextSize::Large => "large",
        }
    }
}

/// Capability the renderer needs from the panel.
pub trait DisplayPort: Send {
    /// Draw `text` with its top-left corner at the given character cell.
    /// Embedded newlines continue on the following rows.
    fn draw_text(
        &mut self,
        row: u16,
        col: u16,
        text: &str,
        size: TextSize,
        ink: Ink,
    ) -> Result<(), DisplayError>;

    /// Fill the whole panel with one ink.
    fn clear_screen(&mut self, ink: Ink) -> Result<(), DisplayError>;
}

/// Development display that prints every operation as one line.
pub struct TerminalDisplay<W: Write + Send> {
    out: W,
}

impl TerminalDisplay<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> TerminalDisplay<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn get_ref(&self) -> &W {
        &self.out
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> DisplayPort for TerminalDisplay<W> {
    fn draw_text(
        &mut self,
        row: u16,
        col: u16,
        text: &str,
        size: TextSize,
        ink: Ink,
    ) -> Result<(), DisplayError> {
        let verb = match ink {
            Ink::Foreground => "draw ",
            Ink::Background => "erase",
        };
        for (offset, line) in text.lines().enumerate() {
            writeln!(
                self.out,
                "[{verb} {row:>2},{col:<2} {}] {line}",
                size.label(),
                row = row as usize + offset,
            )?;
        }
        self.out.flush()?;
        Ok(())
    }

    fn clear_screen(&mut self, ink: Ink) -> Result<(), DisplayError> {
        writeln!(self.out, "[clear {ink:?}]")?;
        self.out.flush()?;
        Ok(())
    }
}

/// Convert an 8-bit-per-channel colour to RGB565.
pub fn rgb565([r, g, b]: [u8; 3]) -> Rgb565 {
    Rgb565::new(r >> 3, g >> 2, b >> 3)
}

/// An RGB565 draw target that can push its content to the panel.
pub trait Surface: DrawTarget<Color = Rgb565> + Send {
    /// Make everything drawn so far visible.
    fn present(&mut self) -> Result<(), DisplayError> {
        Ok(())
    }
}

/// Text renderer on top of an `embedded-graphics` surface.
pub struct GraphicsDisplay<T> {
    target: T,
    foreground: Rgb565,
    background: Rgb565,
}

impl<T> GraphicsDisplay<T>
where
    T: Surface,
    T::Error: core::fmt::Debug,
{
    pub fn new(target: T, foreground: Rgb565, background: Rgb565) -> Self {
        Self {
            target,
            foreground,
            background,
        }
    }

    pub fn target(&self) -> &T {
        &self.target
    }

    fn color(&self, ink: Ink) -> Rgb565 {
        match ink {
            Ink::Foreground => self.foreground,
            Ink::Background => self.background,
        }
    }
}

impl<T> DisplayPort for GraphicsDisplay<T>
where
    T: Surface,
    T::Error: core::fmt::Debug,
{
    fn draw_text(
        &mut self,
        row: u16,
        col: u16,
        text: &str,
        size: TextSize,
        ink: Ink,
    ) -> Result<(), DisplayError> {
        let font = size.font();
        // Cell background is always painted so an erase wipes whole glyph cells.
        let style = MonoTextStyleBuilder::new()
            .font(font)
            .text_color(self.color(ink))
            .background_color(self.background)
            .build();

        let cell_w = font.character_size.width + font.character_spacing;
        let cell_h = font.character_size.height;
        let origin = Point::new(
            (col as u32 * cell_w) as i32,
            (row as u32 * cell_h) as i32,
        );

        Text::with_baseline(text, origin, style, Baseline::Top)
            .draw(&mut self.target)
            .map_err(|e| DisplayError::Draw(format!("{e:?}")))?;
        self.target.present()
    }

    fn clear_screen(&mut self, ink: Ink) -> Result<(), DisplayError> {
        let color = self.color(ink);
        self.target
            .clear(color)
            .map_err(|e| DisplayError::Draw(format!("{e:?}")))?;
        self.target.present()
    }
}

/// In-memory RGB565 frame.
pub struct Framebuffer {
    width: u32,
    height: u32,
    pixels: Vec<Rgb565>,
}

/// Largest supported panel edge, in pixels.
pub const MAX_DIMENSION: u32 = 4096;

impl Framebuffer {
    /// Both edges must be between 1 and [`MAX_DIMENSION`].
    pub fn new(width: u32, height: u32) -> Result<Self, DisplayError> {
        let valid = |edge: u32| (1..=MAX_DIMENSION).contains(&edge);
        if !valid(width) || !valid(height) {
            return Err(DisplayError::Size { width, height });
        }
        Ok(Self {
            width,
            height,
            pixels: vec![Rgb565::BLACK; width as usize * height as usize],
        })
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgb565> {
        if x < self.width && y < self.height {
            self.pixels.get((y * self.width + x) as usize).copied()
        } else {
            None
        }
    }

    /// Number of pixels currently holding `color`.
    pub fn count(&self, color: Rgb565) -> usize {
        self.pixels.iter().filter(|&&p| p == color).count()
    }

    /// Raw little-endian RGB565 bytes, row-major, as a Linux framebuffer expects.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.pixels
            .iter()
            .flat_map(|&p| p.into_storage().to_le_bytes())
            .collect()
    }
}

impl DrawTarget for Framebuffer {
    type Color = Rgb565;
    type Error = core::convert::Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(point, color) in pixels {
            if point.x < 0 || point.y < 0 {
                continue;
            }
            let (x, y) = (point.x as u32, point.y as u32);
            if x < self.width && y < self.height {
                self.pixels[(y * self.width + x) as usize] = color;
            }
        }
        Ok(())
    }
}

impl OriginDimensions for Framebuffer {
    fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }
}

impl Surface for Framebuffer {}

/// A [`Framebuffer`] mirrored to a framebuffer device such as `/dev/fb1`.
pub struct FramebufferDevice {
    frame: Framebuffer,
    file: File,
}

impl FramebufferDevice {
    pub fn open<P: AsRef<Path>>(path: P, width: u32, height: u32) -> Result<Self, DisplayError> {
        let frame = Framebuffer::new(width, height)?;
        let file = OpenOptions::new().write(true).open(path)?;
        Ok(Self { frame, file })
    }
}

impl DrawTarget for FramebufferDevice {
    type Color = Rgb565;
    type Error = core::convert::Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        self.frame.draw_iter(pixels)
    }
}

impl OriginDimensions for FramebufferDevice {
    fn size(&self) -> Size {
        self.frame.size()
    }
}

impl Surface for FramebufferDevice {
    fn present(&mut self) -> Result<(), DisplayError> {
        self.file.seek(SeekFrom::Start(0))?;
        self.file.write_all(&self.frame.to_bytes())?;
        self.file.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graphics() -> GraphicsDisplay<Framebuffer> {
        GraphicsDisplay::new(
            Framebuffer::new(120, 60).unwrap(),
            Rgb565::WHITE,
            Rgb565::BLACK,
        )
    }

    #[test]
    fn framebuffer_rejects_unsupported_sizes() {
        for (w, h) in [(0, 240), (320, 0), (MAX_DIMENSION + 1, 240), (u32::MAX, u32::MAX)] {
            assert!(matches!(
                Framebuffer::new(w, h),
                Err(DisplayError::Size { width, height }) if width == w && height == h
            ));
        }
        let frame = Framebuffer::new(MAX_DIMENSION, 1).unwrap();
        assert_eq!(frame.size(), Size::new(MAX_DIMENSION, 1));
    }

    #[test]
    fn draw_then_erase_restores_background() {
        let mut display = graphics();
        display
            .draw_text(1, 2, "72.4F", TextSize::Small, Ink::Foreground)
            .unwrap();
        assert!(display.target().count(Rgb565::WHITE) > 0);

        display
            .draw_text(1, 2, "72.4F", TextSize::Small, Ink::Background)
            .unwrap();
        assert_eq!(display.target().count(Rgb565::WHITE), 0);
    }

    #[test]
    fn text_lands_in_its_cell() {
        let mut display = graphics();
        display
            .draw_text(2, 3, "#", TextSize::Small, Ink::Foreground)
            .unwrap();

        // FONT_6X10: cell (3, 2) spans x 18..24, y 20..30
        let fb = display.target();
        let lit: Vec<(u32, u32)> = (0..120)
            .flat_map(|x| (0..60).map(move |y| (x, y)))
            .filter(|&(x, y)| fb.pixel(x, y) == Some(Rgb565::WHITE))
            .collect();
        assert!(!lit.is_empty());
        assert!(lit
            .iter()
            .all(|&(x, y)| (18..24).contains(&x) && (20..30).contains(&y)));
    }

    #[test]
    fn clear_screen_fills_with_ink() {
        let mut display = graphics();
        display.clear_screen(Ink::Foreground).unwrap();
        assert_eq!(display.target().count(Rgb565::WHITE), 120 * 60);
        display.clear_screen(Ink::Background).unwrap();
        assert_eq!(display.target().count(Rgb565::BLACK), 120 * 60);
    }

    #[test]
    fn terminal_display_prints_each_line() {
        let mut display = TerminalDisplay::new(Vec::new());
        display
            .draw_text(2, 0, "Boulder\n72.4F Clear", TextSize::Medium, Ink::Foreground)
            .unwrap();
        display
            .draw_text(0, 0, "10:30 AM", TextSize::Small, Ink::Background)
            .unwrap();
        display.clear_screen(Ink::Background).unwrap();

        let out = String::from_utf8(display.into_inner()).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("[draw ") && lines[0].ends_with("Boulder"));
        assert!(lines[1].contains(" 3,") && lines[1].ends_with("72.4F Clear"));
        assert!(lines[2].starts_with("[erase") && lines[2].ends_with("10:30 AM"));
        assert_eq!(lines[3], "[clear Background]");
    }

    #[test]
    fn framebuffer_device_writes_raw_frame() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let device = FramebufferDevice::open(file.path(), 16, 8).unwrap();
        let mut display = GraphicsDisplay::new(device, Rgb565::WHITE, Rgb565::BLACK);
        display.clear_screen(Ink::Foreground).unwrap();

        let bytes = std::fs::read(file.path()).unwrap();
        assert_eq!(bytes.len(), 16 * 8 * 2);
        assert!(bytes.iter().all(|&b| b == 0xFF));
    }

    #[test]
    fn rgb_conversion_keeps_extremes() {
        assert_eq!(rgb565([255, 255, 255]), Rgb565::WHITE);
        assert_eq!(rgb565([0, 0, 0]), Rgb565::BLACK);
    }
}
