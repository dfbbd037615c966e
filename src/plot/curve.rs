use serde::Serialize;

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// The two inner control points of one cubic Bézier segment.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct CurveSegment {
    pub control1: Point,
    pub control2: Point,
}

/// Control points for a C1-continuous cubic curve through every point.
///
/// Returns one segment per consecutive pair, so `points.len() - 1` entries,
/// or none for fewer than two points. The first control points come from a
/// tridiagonal system solved with the Thomas algorithm; the second ones
/// follow from them.
pub fn control_points(points: &[Point]) -> Vec<CurveSegment> {
    if points.len() < 2 {
        return Vec::new();
    }
    let count = points.len() - 1;

    if count == 1 {
        let (p0, p3) = (points[0], points[1]);
        let p1 = Point::new((2.0 * p0.x + p3.x) / 3.0, (2.0 * p0.y + p3.y) / 3.0);
        let p2 = Point::new(2.0 * p1.x - p0.x, 2.0 * p1.y - p0.y);
        return vec![CurveSegment {
            control1: p1,
            control2: p2,
        }];
    }

    let mut a = vec![0.0f64; count];
    let mut b = vec![0.0f64; count];
    let mut c = vec![0.0f64; count];
    let mut rhs = vec![Point::default(); count];

    for i in 0..count {
        let (p0, p3) = (points[i], points[i + 1]);
        if i == 0 {
            (a[i], b[i], c[i]) = (0.0, 2.0, 1.0);
            rhs[i] = Point::new(p0.x + 2.0 * p3.x, p0.y + 2.0 * p3.y);
        } else if i == count - 1 {
            (a[i], b[i], c[i]) = (2.0, 7.0, 0.0);
            rhs[i] = Point::new(8.0 * p0.x + p3.x, 8.0 * p0.y + p3.y);
        } else {
            (a[i], b[i], c[i]) = (1.0, 4.0, 1.0);
            rhs[i] = Point::new(4.0 * p0.x + 2.0 * p3.x, 4.0 * p0.y + 2.0 * p3.y);
        }
    }

    // Forward sweep.
    for i in 1..count {
        let m = a[i] / b[i - 1];
        b[i] -= m * c[i - 1];
        rhs[i] = Point::new(rhs[i].x - m * rhs[i - 1].x, rhs[i].y - m * rhs[i - 1].y);
    }

    // Back substitution.
    let mut first = vec![Point::default(); count];
    first[count - 1] = Point::new(rhs[count - 1].x / b[count - 1], rhs[count - 1].y / b[count - 1]);
    for i in (0..count - 1).rev() {
        first[i] = Point::new(
            (rhs[i].x - c[i] * first[i + 1].x) / b[i],
            (rhs[i].y - c[i] * first[i + 1].y) / b[i],
        );
    }

    (0..count)
        .map(|i| {
            let p3 = points[i + 1];
            let control2 = if i == count - 1 {
                Point::new((p3.x + first[i].x) / 2.0, (p3.y + first[i].y) / 2.0)
            } else {
                Point::new(2.0 * p3.x - first[i + 1].x, 2.0 * p3.y - first[i + 1].y)
            };
            CurveSegment {
                control1: first[i],
                control2,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: Point, b: Point) -> bool {
        (a.x - b.x).abs() < 1e-9 && (a.y - b.y).abs() < 1e-9
    }

    fn bezier_derivative(p0: Point, c1: Point, c2: Point, p3: Point, t: f64) -> Point {
        let u = 1.0 - t;
        let dx = 3.0 * u * u * (c1.x - p0.x) + 6.0 * u * t * (c2.x - c1.x) + 3.0 * t * t * (p3.x - c2.x);
        let dy = 3.0 * u * u * (c1.y - p0.y) + 6.0 * u * t * (c2.y - c1.y) + 3.0 * t * t * (p3.y - c2.y);
        Point::new(dx, dy)
    }

    #[test]
    fn too_few_points() {
        assert!(control_points(&[]).is_empty());
        assert!(control_points(&[Point::new(1.0, 1.0)]).is_empty());
    }

    #[test]
    fn single_segment_closed_form() {
        let p0 = Point::new(0.0, 3.0);
        let p3 = Point::new(9.0, 0.0);
        let segments = control_points(&[p0, p3]);
        assert_eq!(segments.len(), 1);
        let p1 = Point::new((2.0 * p0.x + p3.x) / 3.0, (2.0 * p0.y + p3.y) / 3.0);
        assert_eq!(segments[0].control1, p1);
        assert_eq!(segments[0].control2, Point::new(2.0 * p1.x - p0.x, 2.0 * p1.y - p0.y));
    }

    #[test]
    fn one_segment_per_pair() {
        let points: Vec<Point> = (0..9).map(|i| Point::new(i as f64, (i as f64).sin())).collect();
        assert_eq!(control_points(&points).len(), 8);
    }

    #[test]
    fn straight_line_keeps_controls_on_the_line() {
        let points: Vec<Point> = (0..5).map(|i| Point::new(i as f64, 2.0 * i as f64)).collect();
        for segment in control_points(&points) {
            assert!((segment.control1.y - 2.0 * segment.control1.x).abs() < 1e-9);
            assert!((segment.control2.y - 2.0 * segment.control2.x).abs() < 1e-9);
        }
    }

    #[test]
    fn tangent_is_continuous_at_interior_knots() {
        let points = [
            Point::new(0.0, 0.0),
            Point::new(1.0, 2.0),
            Point::new(2.0, -1.0),
            Point::new(3.0, 0.5),
            Point::new(4.0, 0.0),
        ];
        let segments = control_points(&points);
        for i in 0..segments.len() - 1 {
            let end = bezier_derivative(points[i], segments[i].control1, segments[i].control2, points[i + 1], 1.0);
            let start = bezier_derivative(
                points[i + 1],
                segments[i + 1].control1,
                segments[i + 1].control2,
                points[i + 2],
                0.0,
            );
            assert!(close(end, start), "knot {}: {:?} vs {:?}", i + 1, end, start);
        }
    }
}
