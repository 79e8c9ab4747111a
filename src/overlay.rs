use image::{DynamicImage, Rgb, RgbImage};

use crate::reference::GlobalShift;

const MARKER: Rgb<u8> = Rgb([255, 0, 0]);

/// Absolute strip columns for a strip's peak indices.
///
/// `None` when the strip has fewer than two peaks (not drawn at all). Columns
/// falling outside `[0, width)` are dropped.
pub fn map_columns(peak_indices: &[usize], shift: GlobalShift, width: u32) -> Option<Vec<u32>> {
    if peak_indices.len() < 2 {
        return None;
    }
    Some(
        peak_indices
            .iter()
            .filter_map(|&index| index.checked_add(shift.0))
            .filter(|&column| column < width as usize)
            .map(|column| column as u32)
            .collect(),
    )
}

/// Vertical full-height marker at every column.
pub fn draw_markers(image: &DynamicImage, columns: &[u32]) -> RgbImage {
    let mut canvas = image.to_rgb8();
    let (width, height) = canvas.dimensions();
    for &x in columns.iter().filter(|&&x| x < width) {
        for y in 0..height {
            canvas.put_pixel(x, y, MARKER);
        }
    }
    canvas
}
