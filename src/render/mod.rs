//! Rendering of annotated points and epipolar lines onto the image pair.
//!
//! Presentation-only collaborator of the geometry core: loads the source
//! images, assigns one color per correspondence index (so point `i` and its
//! epipolar line `i` match across both images), rasterizes markers and line
//! segments, and writes the overlays as indexed PNG files.

use crate::epipolar::EpipolarLine;
use image::{Rgb, RgbImage};
use log::{debug, warn};
use nalgebra::Point2;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(thiserror::Error, Debug)]
pub enum RenderError {
    #[error("Failed to load image: {0}")]
    ImageLoad(String),
    #[error("Failed to save image: {0}")]
    ImageSave(String),
    #[error("IO Error: {0}")]
    IOError(String),
}

impl From<std::io::Error> for RenderError {
    fn from(err: std::io::Error) -> Self {
        RenderError::IOError(err.to_string())
    }
}

/// Qualitative palette for up to 10 series.
const PALETTE_10: [[u8; 3]; 10] = [
    [31, 119, 180],
    [255, 127, 14],
    [44, 160, 44],
    [214, 39, 40],
    [148, 103, 189],
    [140, 86, 75],
    [227, 119, 194],
    [127, 127, 127],
    [188, 189, 34],
    [23, 190, 207],
];

/// Qualitative palette for up to 20 series, paired strong/light hues.
const PALETTE_20: [[u8; 3]; 20] = [
    [31, 119, 180],
    [174, 199, 232],
    [255, 127, 14],
    [255, 187, 120],
    [44, 160, 44],
    [152, 223, 138],
    [214, 39, 40],
    [255, 152, 150],
    [148, 103, 189],
    [197, 176, 213],
    [140, 86, 75],
    [196, 156, 148],
    [227, 119, 194],
    [247, 182, 210],
    [127, 127, 127],
    [199, 199, 199],
    [188, 189, 34],
    [219, 219, 141],
    [23, 190, 207],
    [158, 218, 229],
];

/// One distinct color per correspondence index.
///
/// Small sets use the qualitative 10- and 20-entry palettes; larger sets
/// fall back to evenly spaced hues around the color wheel.
pub fn palette(n: usize) -> Vec<Rgb<u8>> {
    if n <= PALETTE_10.len() {
        PALETTE_10.iter().take(n).map(|&c| Rgb(c)).collect()
    } else if n <= PALETTE_20.len() {
        PALETTE_20.iter().take(n).map(|&c| Rgb(c)).collect()
    } else {
        (0..n).map(|i| hue_color(i, n)).collect()
    }
}

/// Color at `i / n` of the color wheel, converted from HSV.
fn hue_color(i: usize, n: usize) -> Rgb<u8> {
    let hue = 360.0 * i as f64 / n as f64;
    let (saturation, value) = (0.85, 0.9);

    let chroma = value * saturation;
    let h_prime = hue / 60.0;
    let x = chroma * (1.0 - (h_prime % 2.0 - 1.0).abs());
    let (r, g, b) = match h_prime as u32 {
        0 => (chroma, x, 0.0),
        1 => (x, chroma, 0.0),
        2 => (0.0, chroma, x),
        3 => (0.0, x, chroma),
        4 => (x, 0.0, chroma),
        _ => (chroma, 0.0, x),
    };
    let m = value - chroma;
    Rgb([
        ((r + m) * 255.0).round() as u8,
        ((g + m) * 255.0).round() as u8,
        ((b + m) * 255.0).round() as u8,
    ])
}

/// Load an image from a file path
///
/// # Arguments
///
/// * `path` - Path to the image file
///
/// # Returns
///
/// * `Result<RgbImage, RenderError>` - Loaded RGB image
pub fn load_image(path: &Path) -> Result<RgbImage, RenderError> {
    let img = image::open(path)
        .map_err(|e| RenderError::ImageLoad(format!("{}: {e}", path.display())))?;

    Ok(img.to_rgb8())
}

/// Ensure the output directory exists
pub fn ensure_output_dir(output_dir: &Path) -> Result<(), RenderError> {
    if !output_dir.exists() {
        fs::create_dir_all(output_dir).map_err(|e| {
            RenderError::IOError(format!("Failed to create output directory: {e}"))
        })?;
    }
    Ok(())
}

/// Midpoint of the image, the origin of the centered coordinate frame.
pub fn image_center(image: &RgbImage) -> Point2<f64> {
    Point2::new(image.width() as f64 / 2.0, image.height() as f64 / 2.0)
}

/// Set a pixel's color, ignoring coordinates outside the image.
#[inline]
fn set_pixel(image: &mut RgbImage, x: i64, y: i64, color: Rgb<u8>) {
    if x >= 0 && x < image.width() as i64 && y >= 0 && y < image.height() as i64 {
        image.put_pixel(x as u32, y as u32, color);
    }
}

const MARKER_RADIUS: i64 = 4;

/// Draws a filled disc marker at a point given in centered coordinates.
pub fn draw_marker(image: &mut RgbImage, point: &Point2<f64>, color: Rgb<u8>) {
    let center = image_center(image);
    let cx = (point.x + center.x).round() as i64;
    let cy = (point.y + center.y).round() as i64;

    for dy in -MARKER_RADIUS..=MARKER_RADIUS {
        for dx in -MARKER_RADIUS..=MARKER_RADIUS {
            if dx * dx + dy * dy <= MARKER_RADIUS * MARKER_RADIUS {
                set_pixel(image, cx + dx, cy + dy, color);
            }
        }
    }
}

/// Clips a segment to the pixel rectangle `[0, w-1] x [0, h-1]`.
///
/// Line endpoints can lie far outside the image when the line barely
/// grazes it; rasterizing the unclipped span would walk an enormous pixel
/// range. Returns `None` when the segment misses the image entirely.
fn clip_to_image(
    p0: (f64, f64),
    p1: (f64, f64),
    width: f64,
    height: f64,
) -> Option<((f64, f64), (f64, f64))> {
    let (dx, dy) = (p1.0 - p0.0, p1.1 - p0.1);
    let (mut t0, mut t1) = (0.0f64, 1.0f64);

    let edges = [
        (-dx, p0.0),
        (dx, width - 1.0 - p0.0),
        (-dy, p0.1),
        (dy, height - 1.0 - p0.1),
    ];
    for (p, q) in edges {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
        } else {
            let r = q / p;
            if p < 0.0 {
                if r > t1 {
                    return None;
                }
                if r > t0 {
                    t0 = r;
                }
            } else {
                if r < t0 {
                    return None;
                }
                if r < t1 {
                    t1 = r;
                }
            }
        }
    }

    Some((
        (p0.0 + t0 * dx, p0.1 + t0 * dy),
        (p0.0 + t1 * dx, p0.1 + t1 * dy),
    ))
}

/// Draws a line segment between two points given in centered coordinates,
/// using Bresenham's algorithm after clipping to the image bounds.
pub fn draw_line_segment(
    image: &mut RgbImage,
    p0: &Point2<f64>,
    p1: &Point2<f64>,
    color: Rgb<u8>,
) {
    let center = image_center(image);
    let a = (p0.x + center.x, p0.y + center.y);
    let b = (p1.x + center.x, p1.y + center.y);

    let Some((a, b)) = clip_to_image(a, b, image.width() as f64, image.height() as f64) else {
        debug!("Line segment lies outside the image, skipping");
        return;
    };

    let (mut x0, mut y0) = (a.0.round() as i64, a.1.round() as i64);
    let (x1, y1) = (b.0.round() as i64, b.1.round() as i64);

    let dx = (x1 - x0).abs();
    let dy = (y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx - dy;

    loop {
        set_pixel(image, x0, y0, color);
        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 > -dy {
            err -= dy;
            x0 += sx;
        }
        if e2 < dx {
            err += dx;
            y0 += sy;
        }
    }
}

/// Writes a copy of `image` with one colored marker per annotated point.
///
/// The file is named `{prefix}pointed_images_{index:02}.png` inside
/// `output_dir`.
pub fn save_pointed_image(
    image: &RgbImage,
    points: &[Point2<f64>],
    index: usize,
    output_dir: &Path,
    prefix: &str,
) -> Result<PathBuf, RenderError> {
    let colors = palette(points.len());
    let mut canvas = image.clone();
    for (point, color) in points.iter().zip(colors.iter()) {
        draw_marker(&mut canvas, point, *color);
    }

    let path = output_dir.join(format!("{prefix}pointed_images_{index:02}.png"));
    canvas
        .save(&path)
        .map_err(|e| RenderError::ImageSave(format!("{}: {e}", path.display())))?;
    Ok(path)
}

/// Writes a copy of `image` overlaid with epipolar lines and, optionally,
/// the image's own annotated points.
///
/// `lines[i]` and marker `i` share color `i`, which keeps correspondences
/// visually paired across the two output images. Degenerate lines are
/// skipped with a warning. The file is named
/// `{prefix}lined_epipolar_{index:02}.png` inside `output_dir`.
pub fn save_epipolar_image(
    image: &RgbImage,
    own_points: Option<&[Point2<f64>]>,
    lines: &[EpipolarLine],
    index: usize,
    output_dir: &Path,
    prefix: &str,
) -> Result<PathBuf, RenderError> {
    let colors = palette(lines.len());
    let mut canvas = image.clone();
    let half_width = canvas.width() as f64 / 2.0;
    let half_height = canvas.height() as f64 / 2.0;

    if let Some(points) = own_points {
        for (point, color) in points.iter().zip(colors.iter()) {
            draw_marker(&mut canvas, point, *color);
        }
    }

    for (i, (line, color)) in lines.iter().zip(colors.iter()).enumerate() {
        match line.endpoints(half_width, half_height) {
            Some([p0, p1]) => draw_line_segment(&mut canvas, &p0, &p1, *color),
            None => warn!("Epipolar line {i} is degenerate, skipping"),
        }
    }

    let path = output_dir.join(format!("{prefix}lined_epipolar_{index:02}.png"));
    canvas
        .save(&path)
        .map_err(|e| RenderError::ImageSave(format!("{}: {e}", path.display())))?;
    Ok(path)
}
