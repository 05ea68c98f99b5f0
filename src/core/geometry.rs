//! Footprint projection and overlap area.

use nalgebra::{Matrix3, Point2, Vector3};

pub type Quad = [Point2<f64>; 4];

/// Corner quadrilateral of a `width` x `height` frame, in the order
/// top-left, bottom-left, bottom-right, top-right.
pub fn frame_corners(width: u32, height: u32) -> Quad {
    let w = width.saturating_sub(1) as f64;
    let h = height.saturating_sub(1) as f64;
    [
        Point2::new(0.0, 0.0),
        Point2::new(0.0, h),
        Point2::new(w, h),
        Point2::new(w, 0.0),
    ]
}

/// Perspective-maps `p` through `h`. A point sent to infinity keeps the sign
/// of its direction; an indeterminate one collapses to the origin.
pub fn project_point(h: &Matrix3<f64>, p: &Point2<f64>) -> Point2<f64> {
    let v = h * Vector3::new(p.x, p.y, 1.0);
    let x = v.x / v.z;
    let y = v.y / v.z;
    Point2::new(
        if x.is_nan() { 0.0 } else { x },
        if y.is_nan() { 0.0 } else { y },
    )
}

pub fn project_quad(h: &Matrix3<f64>, quad: &Quad) -> Quad {
    quad.map(|p| project_point(h, &p))
}

/// Clamps each vertex into `[0, width] x [0, height]`.
///
/// This is coordinate clamping, not polygon clipping: a quadrilateral that
/// leaves and re-enters the frame is only approximated.
pub fn clamp_to_frame(quad: &Quad, width: f64, height: f64) -> Quad {
    quad.map(|p| Point2::new(p.x.clamp(0.0, width), p.y.clamp(0.0, height)))
}

/// Shoelace area of a simple polygon, vertex order irrelevant.
pub fn polygon_area(polygon: &[Point2<f64>]) -> f64 {
    let n = polygon.len();
    if n < 3 {
        return 0.0;
    }
    let twice_signed: f64 = (0..n)
        .map(|i| {
            let a = polygon[i];
            let b = polygon[(i + 1) % n];
            a.x * b.y - b.x * a.y
        })
        .sum();
    0.5 * twice_signed.abs()
}

/// Fraction of the target frame covered by the source frame's footprint
/// under `h`, together with the unclamped footprint.
pub fn footprint_overlap(
    h: &Matrix3<f64>,
    source_size: (u32, u32),
    target_size: (u32, u32),
) -> (f64, Quad) {
    let footprint = project_quad(h, &frame_corners(source_size.0, source_size.1));
    let (tw, th) = (target_size.0 as f64, target_size.1 as f64);
    let target_area = tw * th;
    if target_area <= 0.0 {
        return (0.0, footprint);
    }
    let clamped = clamp_to_frame(&footprint, tw, th);
    (polygon_area(&clamped) / target_area, footprint)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn translation(tx: f64, ty: f64) -> Matrix3<f64> {
        Matrix3::new(1.0, 0.0, tx, 0.0, 1.0, ty, 0.0, 0.0, 1.0)
    }

    #[test]
    fn test_polygon_area_unit_square_any_orientation() {
        let ccw = [
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(1.0, 1.0),
            Point2::new(0.0, 1.0),
        ];
        let mut cw = ccw;
        cw.reverse();
        assert!((polygon_area(&ccw) - 1.0).abs() < 1e-12);
        assert!((polygon_area(&cw) - 1.0).abs() < 1e-12);
        assert_eq!(polygon_area(&ccw[..2]), 0.0);
    }

    #[test]
    fn test_identity_overlap() {
        let (ratio, footprint) = footprint_overlap(&Matrix3::identity(), (100, 50), (100, 50));
        let expected = 99.0 * 49.0 / (100.0 * 50.0);
        assert!((ratio - expected).abs() < 1e-12);
        assert_eq!(footprint, frame_corners(100, 50));
    }

    #[test]
    fn test_translated_overlap_is_clamped() {
        let (ratio, footprint) = footprint_overlap(&translation(40.0, 0.0), (100, 50), (100, 50));
        // x range [40, 139] clamps to [40, 100]
        let expected = 60.0 * 49.0 / 5000.0;
        assert!((ratio - expected).abs() < 1e-12);
        assert!((footprint[2].x - 139.0).abs() < 1e-12);
    }

    #[test]
    fn test_footprint_outside_frame_has_zero_overlap() {
        let (ratio, _) = footprint_overlap(&translation(500.0, 0.0), (100, 50), (100, 50));
        assert_eq!(ratio, 0.0);
    }

    #[test]
    fn test_scale_down_overlap() {
        let half = Matrix3::new(0.5, 0.0, 0.0, 0.0, 0.5, 0.0, 0.0, 0.0, 1.0);
        let (ratio, _) = footprint_overlap(&half, (100, 100), (100, 100));
        let expected = 49.5 * 49.5 / 10000.0;
        assert!((ratio - expected).abs() < 1e-12);
    }

    #[test]
    fn test_project_point_at_infinity_stays_finite_after_clamp() {
        let degenerate = Matrix3::new(1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 1.0, 0.0, 0.0);
        let p = project_point(&degenerate, &Point2::new(0.0, 0.0));
        assert_eq!(p, Point2::new(0.0, 0.0));

        let quad = project_quad(&degenerate, &frame_corners(10, 10));
        let clamped = clamp_to_frame(&quad, 10.0, 10.0);
        assert!(clamped.iter().all(|p| p.x.is_finite() && p.y.is_finite()));
    }
}
