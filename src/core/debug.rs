//! 调试画布：左为源帧，右为目标帧

use super::geometry::Quad;
use image::{imageops, Rgb, RgbImage};
use nalgebra::Point2;

const FOOTPRINT_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const INLIER_COLOR: Rgb<u8> = Rgb([0, 255, 0]);

/// Canvas returned when a pair has no usable overlap.
pub fn blank_canvas(source_width: u32, source_height: u32) -> RgbImage {
    RgbImage::new(2 * source_width, source_height)
}

/// Side-by-side canvas with the projected footprint outlined on the target
/// and one line per inlier correspondence.
pub fn render_overlap(
    source: &RgbImage,
    target: &RgbImage,
    footprint: &Quad,
    inlier_lines: &[(Point2<f64>, Point2<f64>)],
) -> RgbImage {
    let offset = source.width() as f64;
    let mut canvas = RgbImage::new(
        source.width() + target.width(),
        source.height().max(target.height()),
    );
    imageops::replace(&mut canvas, source, 0, 0);
    imageops::replace(&mut canvas, target, source.width() as i64, 0);

    for k in 0..footprint.len() {
        let a = footprint[k];
        let b = footprint[(k + 1) % footprint.len()];
        draw_line(
            &mut canvas,
            Point2::new(a.x + offset, a.y),
            Point2::new(b.x + offset, b.y),
            FOOTPRINT_COLOR,
        );
    }
    for (from, to) in inlier_lines {
        draw_line(&mut canvas, *from, Point2::new(to.x + offset, to.y), INLIER_COLOR);
    }

    canvas
}

/// Bresenham; pixels outside the canvas are skipped.
fn draw_line(canvas: &mut RgbImage, from: Point2<f64>, to: Point2<f64>, color: Rgb<u8>) {
    // 远离画布的端点先截断，避免超长循环
    let limit = 4.0 * (canvas.width().max(canvas.height()) as f64 + 1.0);
    let clamp = |v: f64| v.clamp(-limit, limit).round() as i64;
    let (mut x0, mut y0) = (clamp(from.x), clamp(from.y));
    let (x1, y1) = (clamp(to.x), clamp(to.y));

    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        if x0 >= 0 && y0 >= 0 && (x0 as u32) < canvas.width() && (y0 as u32) < canvas.height() {
            canvas.put_pixel(x0 as u32, y0 as u32, color);
        }
        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}
