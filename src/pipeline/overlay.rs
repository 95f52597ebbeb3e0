use crate::{config::MARKER_RADIUS, types::Marker};

pub const CONNECTIONS: &[(usize, usize)] = &[
    (0, 1),
    (1, 2),
    (2, 3),
    (3, 4),
    (0, 5),
    (5, 6),
    (6, 7),
    (7, 8),
    (0, 9),
    (9, 10),
    (10, 11),
    (11, 12),
    (0, 13),
    (13, 14),
    (14, 15),
    (15, 16),
    (0, 17),
    (17, 18),
    (18, 19),
    (19, 20),
    (5, 9),
    (9, 13),
    (13, 17),
];

const LINE_COLOR: [u8; 4] = [255, 255, 255, 255];
const JOINT_COLOR: [u8; 4] = [248, 113, 113, 255];
const LINE_THICKNESS: i32 = 3;
const JOINT_RADIUS: i32 = 4;

/// An RGBA image being annotated in place.
pub struct Canvas<'a> {
    buffer: &'a mut [u8],
    width: u32,
    height: u32,
}

impl<'a> Canvas<'a> {
    pub fn new(buffer: &'a mut [u8], width: u32, height: u32) -> Self {
        Self {
            buffer,
            width,
            height,
        }
    }

    /// Draws bones and joints of a hand given in pixel coordinates.
    pub fn draw_skeleton(&mut self, points: &[(f32, f32)]) {
        if points.len() < 2 {
            return;
        }

        for &(a, b) in CONNECTIONS {
            if let (Some(pa), Some(pb)) = (points.get(a), points.get(b)) {
                self.draw_line(*pa, *pb, LINE_COLOR, LINE_THICKNESS);
            }
        }
        for &(x, y) in points {
            self.draw_circle((x as i32, y as i32), JOINT_RADIUS, JOINT_COLOR);
        }
    }

    pub fn draw_marker(&mut self, marker: &Marker) {
        self.draw_circle((marker.x, marker.y), MARKER_RADIUS, marker.color.rgba());
    }

    fn draw_line(&mut self, p0: (f32, f32), p1: (f32, f32), color: [u8; 4], thickness: i32) {
        let (mut x0, mut y0) = (p0.0 as i32, p0.1 as i32);
        let (x1, y1) = (p1.0 as i32, p1.1 as i32);
        let dx = (x1 - x0).abs();
        let sx = if x0 < x1 { 1 } else { -1 };
        let dy = -(y1 - y0).abs();
        let sy = if y0 < y1 { 1 } else { -1 };
        let mut err = dx + dy;
        let radius = (thickness.max(1) - 1) / 2;

        loop {
            if radius > 0 {
                self.draw_circle((x0, y0), radius, color);
            } else {
                self.put_pixel(x0, y0, color);
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

    fn draw_circle(&mut self, center: (i32, i32), radius: i32, color: [u8; 4]) {
        let (cx, cy) = center;
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                if dx * dx + dy * dy <= radius * radius {
                    self.put_pixel(cx + dx, cy + dy, color);
                }
            }
        }
    }

    fn put_pixel(&mut self, x: i32, y: i32, color: [u8; 4]) {
        if x < 0 || y < 0 || x as u32 >= self.width || y as u32 >= self.height {
            return;
        }
        let idx = ((y as u32 * self.width + x as u32) as usize) * 4;
        if let Some(px) = self.buffer.get_mut(idx..idx + 4) {
            px.copy_from_slice(&color);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MarkerColor;

    fn pixel(buffer: &[u8], width: u32, x: u32, y: u32) -> [u8; 4] {
        let idx = ((y * width + x) * 4) as usize;
        [buffer[idx], buffer[idx + 1], buffer[idx + 2], buffer[idx + 3]]
    }

    #[test]
    fn marker_fills_a_disc() {
        let (w, h) = (64, 64);
        let mut buffer = vec![0u8; (w * h * 4) as usize];
        Canvas::new(&mut buffer, w, h).draw_marker(&Marker {
            x: 32,
            y: 32,
            color: MarkerColor::Red,
        });

        assert_eq!(pixel(&buffer, w, 32, 32), [255, 0, 0, 255]);
        assert_eq!(pixel(&buffer, w, 32 + 15, 32), [255, 0, 0, 255]);
        assert_eq!(pixel(&buffer, w, 32 + 16, 32), [0, 0, 0, 0]);
        assert_eq!(pixel(&buffer, w, 32 + 11, 32 + 11), [0, 0, 0, 0]);
    }

    #[test]
    fn drawing_off_canvas_is_clipped() {
        let (w, h) = (8, 8);
        let mut buffer = vec![0u8; (w * h * 4) as usize];
        let mut canvas = Canvas::new(&mut buffer, w, h);
        canvas.draw_marker(&Marker {
            x: -100,
            y: 500,
            color: MarkerColor::Blue,
        });
        canvas.draw_skeleton(&[(-50.0, -50.0), (100.0, 100.0)]);
        assert_eq!(pixel(&buffer, w, 4, 4)[3], 255);
    }

    #[test]
    fn skeleton_connects_joints() {
        let (w, h) = (32, 32);
        let mut buffer = vec![0u8; (w * h * 4) as usize];
        let mut points = vec![(2.0, 2.0); 21];
        points[1] = (28.0, 2.0);
        Canvas::new(&mut buffer, w, h).draw_skeleton(&points);
        assert_eq!(pixel(&buffer, w, 15, 2), LINE_COLOR);
        assert_eq!(pixel(&buffer, w, 15, 20), [0, 0, 0, 0]);
    }
}
