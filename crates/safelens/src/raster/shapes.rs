//! Contour extraction and per-contour shape measurements.

use image::GrayImage;
use imageproc::contours::{find_contours, BorderType};
use imageproc::point::Point;

/// Axis-aligned bounding box in pixels (`width`/`height` count pixels).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct BoundingBox {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl BoundingBox {
    pub(crate) fn area(&self) -> f64 {
        self.width as f64 * self.height as f64
    }

    /// Long side over short side.
    pub(crate) fn elongation(&self) -> f64 {
        let long = self.width.max(self.height) as f64;
        let short = self.width.min(self.height).max(1) as f64;
        long / short
    }

    /// Width over height.
    pub(crate) fn aspect(&self) -> f64 {
        self.width as f64 / self.height.max(1) as f64
    }
}

/// A traced border with lazily computed measurements.
#[derive(Debug, Clone)]
pub(crate) struct Shape {
    pub points: Vec<Point<i32>>,
    area: f64,
}

impl Shape {
    pub(crate) fn new(points: Vec<Point<i32>>) -> Self {
        let area = polygon_area(&points);
        Self { points, area }
    }

    /// Enclosed polygon area of the traced border (shoelace).
    pub(crate) fn area(&self) -> f64 {
        self.area
    }

    /// Closed arc length of the traced border.
    pub(crate) fn perimeter(&self) -> f64 {
        if self.points.len() < 2 {
            return 0.0;
        }
        imageproc::geometry::arc_length(&self.points, true)
    }

    /// `4π·area / perimeter²`; 1 for a perfect disk.
    pub(crate) fn circularity(&self) -> f64 {
        let p = self.perimeter();
        if p <= 0.0 {
            return 0.0;
        }
        4.0 * std::f64::consts::PI * self.area / (p * p)
    }

    pub(crate) fn hull_area(&self) -> f64 {
        if self.points.len() < 3 {
            return 0.0;
        }
        let hull = imageproc::geometry::convex_hull(&self.points[..]);
        polygon_area(&hull)
    }

    /// Area over convex-hull area, `None` for degenerate hulls.
    pub(crate) fn solidity(&self) -> Option<f64> {
        let hull = self.hull_area();
        (hull > 0.0).then(|| self.area / hull)
    }

    pub(crate) fn bounding_box(&self) -> BoundingBox {
        let mut min_x = i32::MAX;
        let mut min_y = i32::MAX;
        let mut max_x = i32::MIN;
        let mut max_y = i32::MIN;
        for p in &self.points {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }
        if self.points.is_empty() {
            return BoundingBox {
                x: 0,
                y: 0,
                width: 0,
                height: 0,
            };
        }
        BoundingBox {
            x: min_x,
            y: min_y,
            width: max_x - min_x + 1,
            height: max_y - min_y + 1,
        }
    }

    /// Vertex count after Douglas–Peucker simplification with
    /// `epsilon = epsilon_frac · perimeter`.
    ///
    /// Vertices closer than epsilon to their predecessor (including the
    /// closing vertex) are merged.
    pub(crate) fn polygon_vertices(&self, epsilon_frac: f64) -> usize {
        if self.points.len() < 3 {
            return self.points.len();
        }
        let eps = epsilon_frac * self.perimeter();
        if eps.is_nan() || eps <= 0.0 {
            return self.points.len();
        }
        let near = |a: &Point<i32>, b: &Point<i32>| {
            let (dx, dy) = ((a.x - b.x) as f64, (a.y - b.y) as f64);
            (dx * dx + dy * dy).sqrt() <= eps
        };
        let mut kept: Vec<Point<i32>> = Vec::new();
        for p in imageproc::geometry::approximate_polygon_dp(&self.points, eps, true) {
            if kept.last().map_or(true, |q| !near(&p, q)) {
                kept.push(p);
            }
        }
        while kept.len() > 1 && near(&kept[kept.len() - 1], &kept[0]) {
            kept.pop();
        }
        kept.len()
    }

    /// Centroid of the border points.
    pub(crate) fn centroid(&self) -> [f64; 2] {
        let n = self.points.len().max(1) as f64;
        let (sx, sy) = self
            .points
            .iter()
            .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x as f64, sy + p.y as f64));
        [sx / n, sy / n]
    }

    /// Minor/major eigenvalue ratio of the border point covariance.
    pub(crate) fn inertia_ratio(&self) -> f64 {
        let [cx, cy] = self.centroid();
        let n = self.points.len().max(1) as f64;
        let (mut sxx, mut syy, mut sxy) = (0.0, 0.0, 0.0);
        for p in &self.points {
            let dx = p.x as f64 - cx;
            let dy = p.y as f64 - cy;
            sxx += dx * dx;
            syy += dy * dy;
            sxy += dx * dy;
        }
        let (sxx, syy, sxy) = (sxx / n, syy / n, sxy / n);
        let tr = sxx + syy;
        let disc = ((sxx - syy).powi(2) + 4.0 * sxy * sxy).sqrt();
        let major = 0.5 * (tr + disc);
        let minor = 0.5 * (tr - disc);
        if major <= 0.0 {
            return 0.0;
        }
        (minor / major).clamp(0.0, 1.0)
    }

    /// Mean distance from the centroid to the border points.
    pub(crate) fn mean_radius(&self) -> f64 {
        let [cx, cy] = self.centroid();
        let n = self.points.len().max(1) as f64;
        self.points
            .iter()
            .map(|p| ((p.x as f64 - cx).powi(2) + (p.y as f64 - cy).powi(2)).sqrt())
            .sum::<f64>()
            / n
    }
}

/// Absolute shoelace area of a closed polygon.
pub(crate) fn polygon_area(points: &[Point<i32>]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let mut acc = 0.0f64;
    for (i, p) in points.iter().enumerate() {
        let q = &points[(i + 1) % points.len()];
        acc += p.x as f64 * q.y as f64 - q.x as f64 * p.y as f64;
    }
    (acc * 0.5).abs()
}

/// Outermost borders of the non-zero regions of `binary`.
pub(crate) fn external_shapes(binary: &GrayImage) -> Vec<Shape> {
    find_contours::<i32>(binary)
        .into_iter()
        .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
        .map(|c| Shape::new(c.points))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;
    use imageproc::drawing::{draw_filled_circle_mut, draw_filled_rect_mut};
    use imageproc::rect::Rect;

    #[test]
    fn filled_disk_is_round_and_solid() {
        let mut img = GrayImage::new(80, 80);
        draw_filled_circle_mut(&mut img, (40, 40), 20, Luma([255]));
        let shapes = external_shapes(&img);
        assert_eq!(shapes.len(), 1);
        let disk = &shapes[0];
        assert!(disk.circularity() > 0.8, "circularity {}", disk.circularity());
        assert!(disk.solidity().unwrap() > 0.95);
        assert!(disk.inertia_ratio() > 0.9);
        assert!((disk.mean_radius() - 20.0).abs() < 1.5);
    }

    #[test]
    fn thin_bar_is_elongated_rectangle() {
        let mut img = GrayImage::new(100, 40);
        draw_filled_rect_mut(&mut img, Rect::at(10, 15).of_size(70, 8), Luma([255]));
        let shapes = external_shapes(&img);
        assert_eq!(shapes.len(), 1);
        let bar = &shapes[0];
        let bbox = bar.bounding_box();
        assert_eq!((bbox.width, bbox.height), (70, 8));
        assert!(bar.bounding_box().elongation() > 5.0);
        assert_eq!(bar.polygon_vertices(0.02), 4);
    }

    #[test]
    fn nested_regions_are_not_external() {
        let mut img = GrayImage::new(60, 60);
        draw_filled_rect_mut(&mut img, Rect::at(5, 5).of_size(50, 50), Luma([255]));
        draw_filled_rect_mut(&mut img, Rect::at(15, 15).of_size(30, 30), Luma([0]));
        draw_filled_rect_mut(&mut img, Rect::at(25, 25).of_size(10, 10), Luma([255]));
        assert_eq!(external_shapes(&img).len(), 1);
        let outer = find_contours::<i32>(&img)
            .into_iter()
            .filter(|c| c.border_type == BorderType::Outer)
            .count();
        assert_eq!(outer, 2);
    }
}
