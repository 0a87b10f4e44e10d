//! Bitmap to raster line encoder.
//!
//! The printer consumes fixed-width scanlines, one bit per dot, packed MSB
//! first and right-aligned against the label's right margin. The head
//! prints mirrored, so source pixel column 0 lands on the highest dot of
//! the printable area. Every emitted line is exactly
//! `MediaProfile::row_bytes` long regardless of the source width;
//! compression later only changes the transmitted size, never this length.

use crate::error::ConfigError;
use crate::media::MediaProfile;
use crate::Matrix;

/// Threshold that separates printed from blank dots in 8-bit grayscale.
/// Works well when the source is already close to monochrome.
pub const DEFAULT_THRESHOLD: u8 = 80;

/// An 8-bit grayscale bitmap, row major, 0 = black.
#[derive(Debug, Clone)]
pub struct Bitmap {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl Bitmap {
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self, ConfigError> {
        let expected = (width as usize) * (height as usize);
        if pixels.len() != expected {
            return Err(ConfigError::BitmapSizeMismatch {
                expected,
                actual: pixels.len(),
            });
        }
        Ok(Bitmap { width, height, pixels })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    fn pixel(&self, x: u32, y: u32) -> u8 {
        self.pixels[(y * self.width + x) as usize]
    }
}

/// One label's worth of encoded raster lines.
///
/// For two-color pages the rows are interleaved black, red, black, red...
/// in transmission order; `lines_per_plane` is the per-color line count
/// that goes into the media configuration frame.
#[derive(Debug, Clone)]
pub struct Page {
    rows: Matrix,
    planes: u8,
}

impl Page {
    pub fn rows(&self) -> &Matrix {
        &self.rows
    }

    pub fn planes(&self) -> u8 {
        self.planes
    }

    pub fn lines_per_plane(&self) -> u32 {
        (self.rows.len() / self.planes as usize) as u32
    }
}

/// Encode a monochrome bitmap into raster lines for the given profile.
///
/// Width and length are validated once up front so an oversized image
/// fails before a single line is produced.
pub fn encode(bitmap: &Bitmap, profile: &MediaProfile, threshold: u8) -> Result<Page, ConfigError> {
    check_dimensions(bitmap, profile)?;

    let rows = (0..bitmap.height)
        .map(|y| pack_row(bitmap, y, profile, threshold))
        .collect();
    Ok(Page { rows, planes: 1 })
}

/// Encode a black plane and a red plane into interleaved two-color lines.
pub fn encode_two_color(
    black: &Bitmap,
    red: &Bitmap,
    profile: &MediaProfile,
    threshold: u8,
) -> Result<Page, ConfigError> {
    if black.width != red.width || black.height != red.height {
        return Err(ConfigError::PlaneMismatch);
    }
    check_dimensions(black, profile)?;

    let mut rows = Vec::with_capacity(2 * black.height as usize);
    for y in 0..black.height {
        rows.push(pack_row(black, y, profile, threshold));
        rows.push(pack_row(red, y, profile, threshold));
    }
    Ok(Page { rows, planes: 2 })
}

fn check_dimensions(bitmap: &Bitmap, profile: &MediaProfile) -> Result<(), ConfigError> {
    if bitmap.width > profile.printable_dots {
        return Err(ConfigError::ImageTooWide {
            width: bitmap.width,
            printable: profile.printable_dots,
        });
    }

    let label = profile.label;
    if label.form_factor.is_die_cut() {
        if bitmap.height != label.dots_printable.1 {
            return Err(ConfigError::ImageLengthMismatch {
                rows: bitmap.height,
                expected: label.dots_printable.1,
            });
        }
    } else {
        let model = profile.model;
        if bitmap.height < model.min_length || bitmap.height > model.max_length {
            return Err(ConfigError::LengthOutOfRange {
                rows: bitmap.height,
                min: model.min_length,
                max: model.max_length,
            });
        }
    }
    Ok(())
}

fn pack_row(bitmap: &Bitmap, y: u32, profile: &MediaProfile, threshold: u8) -> Vec<u8> {
    let mut row = vec![0u8; profile.row_bytes];
    let width = bitmap.width;
    for x in 0..width {
        if bitmap.pixel(x, y) <= threshold {
            // Mirrored head: leftmost source pixel maps to the highest dot.
            let dot = profile.right_margin_dots + (width - 1 - x);
            row[(dot / 8) as usize] |= 0x80 >> (dot % 8);
        }
    }
    row
}

/// Split packed RGB data into black and red grayscale planes.
///
/// Red-dominant pixels go to the red plane, other dark pixels to the black
/// plane. The output planes use 0 for "print" and 255 for "blank" so they
/// feed straight into [`encode_two_color`].
pub fn split_two_color(
    width: u32,
    height: u32,
    rgb: &[u8],
) -> Result<(Bitmap, Bitmap), ConfigError> {
    let expected = (width as usize) * (height as usize) * 3;
    if rgb.len() != expected {
        return Err(ConfigError::BitmapSizeMismatch {
            expected,
            actual: rgb.len(),
        });
    }

    let pixel_count = (width as usize) * (height as usize);
    let mut black = vec![255u8; pixel_count];
    let mut red = vec![255u8; pixel_count];

    for (i, px) in rgb.chunks_exact(3).enumerate() {
        let (r, g, b) = (px[0], px[1], px[2]);
        if is_red(r, g, b) {
            red[i] = 0;
        } else if is_black(r, g, b) {
            black[i] = 0;
        }
    }

    Ok((
        Bitmap::new(width, height, black)?,
        Bitmap::new(width, height, red)?,
    ))
}

fn is_red(r: u8, g: u8, b: u8) -> bool {
    r > 200 && g < 100 && b < 100
}

fn is_black(r: u8, g: u8, b: u8) -> bool {
    let brightness = ((r as u32 + g as u32 + b as u32) / 3) as u8;
    brightness < 128
}
