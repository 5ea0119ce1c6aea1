//! Reference software device: fontdue-rasterized text into RGBA page
//! buffers.
//!
//! One [`RasterPages`] instance plays both roles the engine needs — the
//! page factory and, through its devices, the measuring surface — so a
//! headless render needs nothing but this type and a resolver. Output
//! pages are plain `image` buffers, saved as PNG on request.

use std::path::{Path, PathBuf};
use std::rc::Rc;

use anyhow::{Context, Result};
use fontdue::{Font, FontSettings};
use image::{ImageBuffer, Rgba, RgbaImage};

use folio_css::device::measure_breakable;
use folio_css::{Color, FontMetrics, FontSpec, PageGeometry, Side, TextMeasurement, TextMeasurer};

use crate::device::{Device, PageProvider};

/// Common system font paths to search for a default font.
const FONT_SEARCH_PATHS: &[&str] = &[
    // macOS
    "/System/Library/Fonts/Helvetica.ttc",
    "/System/Library/Fonts/SFNS.ttf",
    "/Library/Fonts/Arial.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    // Linux
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/truetype/freefont/FreeSans.ttf",
    // Windows
    "C:\\Windows\\Fonts\\arial.ttf",
    "C:\\Windows\\Fonts\\segoeui.ttf",
];

/// Fallback measurement ratios when no system font is available: the same
/// fixed ratios the layout test metrics use.
const FALLBACK_CHAR_RATIO: f32 = 0.6;

/// Page factory producing raster pages of one uniform size.
pub struct RasterPages {
    width: u32,
    height: u32,
    margins: [f32; 4],
    font: Option<Rc<Font>>,
    current: Option<RasterDevice>,
    /// Finished page buffers, in page order.
    pub pages: Vec<RgbaImage>,
}

impl RasterPages {
    /// A factory for pages of `width`×`height` pixels with the same margin
    /// on every edge. Attempts to load a system font; without one, text is
    /// measured with fixed ratios and not drawn.
    #[must_use]
    pub fn new(width: u32, height: u32, margin: f32) -> Self {
        let font = load_system_font().map(Rc::new);
        if font.is_none() {
            eprintln!("Warning: no system font found, text will be measured approximately");
        }
        RasterPages {
            width,
            height,
            margins: [margin; 4],
            font,
            current: None,
            pages: Vec::new(),
        }
    }

    /// A measuring device detached from any page, for layout.
    #[must_use]
    pub fn measurer(&self) -> RasterDevice {
        RasterDevice::new(self.width, self.height, self.font.clone())
    }

    /// Save all finished pages as `page-<n>.png` under `dir`.
    ///
    /// # Errors
    ///
    /// Returns an error when a page buffer cannot be written.
    pub fn save_pages(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let mut paths = Vec::with_capacity(self.pages.len());
        for (index, page) in self.pages.iter().enumerate() {
            let path = dir.join(format!("page-{index}.png"));
            page.save(&path)
                .with_context(|| format!("failed to save page {index} to '{}'", path.display()))?;
            paths.push(path);
        }
        Ok(paths)
    }
}

impl PageGeometry for RasterPages {
    #[allow(clippy::cast_precision_loss)]
    fn page_width(&self, _page: usize) -> f32 {
        self.width as f32
    }

    #[allow(clippy::cast_precision_loss)]
    fn page_height(&self, _page: usize) -> f32 {
        self.height as f32
    }

    fn margin(&self, side: Side) -> f32 {
        match side {
            Side::Top => self.margins[0],
            Side::Right => self.margins[1],
            Side::Bottom => self.margins[2],
            Side::Left => self.margins[3],
        }
    }
}

impl PageProvider for RasterPages {
    fn start_page(&mut self, _page: usize) -> &mut dyn Device {
        self.current = Some(RasterDevice::new(self.width, self.height, self.font.clone()));
        self.current.as_mut().expect("page just created")
    }

    fn end_page(&mut self, _page: usize) {
        if let Some(device) = self.current.take() {
            self.pages.push(device.buffer);
        }
    }
}

fn load_system_font() -> Option<Font> {
    for path in FONT_SEARCH_PATHS {
        if let Ok(data) = std::fs::read(path)
            && let Ok(font) = Font::from_bytes(data, FontSettings::default())
        {
            return Some(font);
        }
    }
    None
}

/// One page's paint surface: an RGBA buffer plus a translation stack.
pub struct RasterDevice {
    buffer: RgbaImage,
    width: u32,
    height: u32,
    font: Option<Rc<Font>>,
    offset: (f32, f32),
    saved: Vec<(f32, f32)>,
}

impl RasterDevice {
    fn new(width: u32, height: u32, font: Option<Rc<Font>>) -> Self {
        RasterDevice {
            buffer: ImageBuffer::from_pixel(width, height, Rgba([255, 255, 255, 255])),
            width,
            height,
            font,
            offset: (0.0, 0.0),
            saved: Vec::new(),
        }
    }

    fn advance(&self, text: &str, font_size: f32) -> f32 {
        match &self.font {
            Some(font) => text
                .chars()
                .filter(|ch| !ch.is_control())
                .map(|ch| font.metrics(ch, font_size).advance_width)
                .sum(),
            None => {
                #[allow(clippy::cast_precision_loss)]
                let chars = text.chars().count() as f32;
                chars * font_size * FALLBACK_CHAR_RATIO
            }
        }
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn blend_pixel(&mut self, x: i32, y: i32, color: Color, alpha: u8) {
        if x < 0 || y < 0 || x as u32 >= self.width || y as u32 >= self.height {
            return;
        }
        let fg = Rgba([color.r, color.g, color.b, color.a]);
        if alpha == 255 && color.a == 255 {
            self.buffer.put_pixel(x as u32, y as u32, fg);
            return;
        }
        let a = f32::from(alpha) / 255.0 * f32::from(color.a) / 255.0;
        let inv = 1.0 - a;
        let bg = *self.buffer.get_pixel(x as u32, y as u32);
        let blended = Rgba([
            f32::from(fg[0]).mul_add(a, f32::from(bg[0]) * inv) as u8,
            f32::from(fg[1]).mul_add(a, f32::from(bg[1]) * inv) as u8,
            f32::from(fg[2]).mul_add(a, f32::from(bg[2]) * inv) as u8,
            255,
        ]);
        self.buffer.put_pixel(x as u32, y as u32, blended);
    }
}

impl TextMeasurer for RasterDevice {
    fn measure_text(
        &self,
        font: &FontSpec,
        text: &str,
        max_width: Option<f32>,
    ) -> TextMeasurement {
        measure_breakable(|s| self.advance(s, font.size), text, max_width)
    }

    fn font_metrics(&self, font: &FontSpec) -> FontMetrics {
        if let Some(f) = &self.font {
            if let Some(line) = f.horizontal_line_metrics(font.size) {
                return FontMetrics {
                    ascent: line.ascent,
                    height: line.ascent - line.descent,
                    leading: line.line_gap.max(font.size * 0.1),
                };
            }
        }
        FontMetrics {
            ascent: font.size * 0.8,
            height: font.size,
            leading: font.size * 0.2,
        }
    }
}

impl Device for RasterDevice {
    #[allow(clippy::cast_possible_truncation)]
    fn fill_rect(&mut self, x: f32, y: f32, width: f32, height: f32, color: Color) {
        let x0 = (x + self.offset.0) as i32;
        let y0 = (y + self.offset.1) as i32;
        let w = width.max(0.0) as i32;
        let h = height.max(0.0) as i32;
        for dy in 0..h {
            for dx in 0..w {
                self.blend_pixel(x0 + dx, y0 + dy, color, 255);
            }
        }
    }

    fn draw_line(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, width: f32, color: Color) {
        // Axis-aligned strokes only, which is all the paint layer emits.
        if (y1 - y2).abs() < f32::EPSILON {
            self.fill_rect(x1.min(x2), y1 - width / 2.0, (x2 - x1).abs(), width, color);
        } else {
            self.fill_rect(x1 - width / 2.0, y1.min(y2), width, (y2 - y1).abs(), color);
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn draw_text(&mut self, font: &FontSpec, x: f32, y: f32, text: &str, color: Color) {
        let Some(face) = self.font.clone() else {
            return;
        };
        let mut cursor = x + self.offset.0;
        let baseline = y + self.offset.1;
        for ch in text.chars() {
            if ch.is_control() {
                continue;
            }
            let (metrics, bitmap) = face.rasterize(ch, font.size);
            let glyph_x = cursor as i32 + metrics.xmin;
            let glyph_y = baseline as i32 - metrics.ymin - metrics.height as i32;
            for gy in 0..metrics.height {
                for gx in 0..metrics.width {
                    let alpha = bitmap[gy * metrics.width + gx];
                    if alpha > 0 {
                        #[allow(clippy::cast_possible_wrap)]
                        self.blend_pixel(
                            glyph_x + gx as i32,
                            glyph_y + gy as i32,
                            color,
                            alpha,
                        );
                    }
                }
            }
            cursor += metrics.advance_width;
        }
    }

    fn draw_image(&mut self, _src: &str, x: f32, y: f32, width: f32, height: f32) {
        // The reference device has no decoder wired in: draw a placeholder
        // frame where the image belongs.
        let frame = Color::rgb(0xcc, 0xcc, 0xcc);
        self.fill_rect(x, y, width, height, Color::rgb(0xee, 0xee, 0xee));
        self.fill_rect(x, y, width, 1.0, frame);
        self.fill_rect(x, y + height - 1.0, width, 1.0, frame);
        self.fill_rect(x, y, 1.0, height, frame);
        self.fill_rect(x + width - 1.0, y, 1.0, height, frame);
    }

    fn save(&mut self) {
        self.saved.push(self.offset);
    }

    fn restore(&mut self) {
        if let Some(offset) = self.saved.pop() {
            self.offset = offset;
        }
    }

    fn translate(&mut self, dx: f32, dy: f32) {
        self.offset.0 += dx;
        self.offset.1 += dy;
    }
}
