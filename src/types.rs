use std::time::Instant;

#[derive(Clone, Debug)]
pub struct Frame {
    pub rgba: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub timestamp: Instant,
}

impl Frame {
    pub fn new(rgba: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            rgba,
            width,
            height,
            timestamp: Instant::now(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScreenSize {
    pub width: u32,
    pub height: u32,
}

impl ScreenSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// A point in normalized image space: `x` and `y` are fractions of the frame
/// width and height, `y` grows downward.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Landmark {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y, z: 0.0 }
    }

    pub fn distance_to(&self, other: &Landmark) -> f32 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// Semantic indices of the 21-point hand skeleton.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum HandLandmark {
    Wrist = 0,
    ThumbCmc = 1,
    ThumbMcp = 2,
    ThumbIp = 3,
    ThumbTip = 4,
    IndexMcp = 5,
    IndexPip = 6,
    IndexDip = 7,
    IndexTip = 8,
    MiddleMcp = 9,
    MiddlePip = 10,
    MiddleDip = 11,
    MiddleTip = 12,
    RingMcp = 13,
    RingPip = 14,
    RingDip = 15,
    RingTip = 16,
    PinkyMcp = 17,
    PinkyPip = 18,
    PinkyDip = 19,
    PinkyTip = 20,
}

pub const NUM_HAND_LANDMARKS: usize = 21;

/// One detected hand: exactly 21 normalized points addressed by [`HandLandmark`].
#[derive(Clone, Debug, PartialEq)]
pub struct HandLandmarks {
    points: [Landmark; NUM_HAND_LANDMARKS],
}

impl HandLandmarks {
    pub fn new(points: [Landmark; NUM_HAND_LANDMARKS]) -> Self {
        Self { points }
    }

    /// Builds a hand from pixel-space points of a `width` x `height` frame.
    /// Returns `None` unless exactly 21 points are given.
    pub fn from_pixels(points: &[(f32, f32)], width: u32, height: u32) -> Option<Self> {
        if points.len() != NUM_HAND_LANDMARKS || width == 0 || height == 0 {
            return None;
        }
        let mut normalized = [Landmark::default(); NUM_HAND_LANDMARKS];
        for (slot, &(x, y)) in normalized.iter_mut().zip(points) {
            *slot = Landmark::new(x / width as f32, y / height as f32);
        }
        Some(Self::new(normalized))
    }

    pub fn set(&mut self, landmark: HandLandmark, point: Landmark) {
        self.points[landmark as usize] = point;
    }

    /// Points scaled back to pixel coordinates of a `width` x `height` image.
    pub fn to_pixels(&self, width: u32, height: u32) -> Vec<(f32, f32)> {
        self.points
            .iter()
            .map(|p| (p.x * width as f32, p.y * height as f32))
            .collect()
    }
}

impl std::ops::Index<HandLandmark> for HandLandmarks {
    type Output = Landmark;

    fn index(&self, landmark: HandLandmark) -> &Landmark {
        &self.points[landmark as usize]
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MarkerColor {
    Blue,
    Magenta,
    Red,
    Green,
}

impl MarkerColor {
    pub fn rgba(&self) -> [u8; 4] {
        match self {
            MarkerColor::Blue => [0, 0, 255, 255],
            MarkerColor::Magenta => [255, 0, 255, 255],
            MarkerColor::Red => [255, 0, 0, 255],
            MarkerColor::Green => [0, 255, 0, 255],
        }
    }
}

/// Overlay hint for the frame the gesture was recognized in, in camera pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Marker {
    pub x: i32,
    pub y: i32,
    pub color: MarkerColor,
}
