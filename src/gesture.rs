use std::collections::HashMap;

use crate::{
    config::{CAMERA_HEIGHT, CAMERA_WIDTH, GestureThresholds},
    types::{HandLandmark, HandLandmarks, Landmark, Marker, MarkerColor, ScreenSize},
};

/// Linearly maps `value` from `[in_min, in_max]` onto `[out_min, out_max]`.
///
/// # Panics
///
/// Panics if `in_min == in_max`.
pub fn map_range(value: f64, in_min: f64, in_max: f64, out_min: f64, out_max: f64) -> f64 {
    assert!(
        in_min != in_max,
        "map_range needs a non-empty input domain, got [{in_min}, {in_max}]"
    );
    (value - in_min) * (out_max - out_min) / (in_max - in_min) + out_min
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Gesture {
    Screenshot,
    Scroll,
    Click,
    Move,
    Idle,
}

impl Gesture {
    /// Gestures in the order they are tested; the first match wins.
    pub const PRIORITY: [Gesture; 4] = [
        Gesture::Screenshot,
        Gesture::Scroll,
        Gesture::Click,
        Gesture::Move,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Gesture::Screenshot => "screenshot",
            Gesture::Scroll => "scroll",
            Gesture::Click => "click",
            Gesture::Move => "move",
            Gesture::Idle => "idle",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScrollDirection {
    Up,
    Down,
}

/// What the executor should do for one hand in one frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum GestureAction {
    /// `capture` is true only on the frame the gesture starts.
    Screenshot { capture: bool },
    /// `tick` is `None` on the baseline frame and while the wrist stays
    /// within the scroll sensitivity.
    Scroll { tick: Option<ScrollDirection> },
    /// `fire` is true only on the frame the pinch starts.
    Click { fire: bool },
    /// Absolute screen coordinate in pixels, unrounded.
    Move { x: f64, y: f64 },
    Idle,
}

impl GestureAction {
    pub fn gesture(&self) -> Gesture {
        match self {
            GestureAction::Screenshot { .. } => Gesture::Screenshot,
            GestureAction::Scroll { .. } => Gesture::Scroll,
            GestureAction::Click { .. } => Gesture::Click,
            GestureAction::Move { .. } => Gesture::Move,
            GestureAction::Idle => Gesture::Idle,
        }
    }
}

/// Latches that make click and screenshot edge-triggered and hold the scroll
/// baseline across frames.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GestureSession {
    pub is_clicking: bool,
    pub is_take_screenshot: bool,
    pub is_scrolling: bool,
    /// Wrist height in camera pixels at the last scroll tick.
    pub last_vertical_position: f32,
}

impl GestureSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.is_clicking = false;
        self.is_take_screenshot = false;
        self.is_scrolling = false;
    }
}

/// Session state for every tracked hand, keyed by detection slot.
#[derive(Debug, Default)]
pub struct HandSessions {
    sessions: HashMap<usize, GestureSession>,
}

impl HandSessions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn session_mut(&mut self, slot: usize) -> &mut GestureSession {
        self.sessions.entry(slot).or_default()
    }

    pub fn get(&self, slot: usize) -> Option<&GestureSession> {
        self.sessions.get(&slot)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Drops the state of every slot for which `keep` returns false.
    pub fn retain(&mut self, mut keep: impl FnMut(usize) -> bool) {
        self.sessions.retain(|slot, _| keep(*slot));
    }
}

/// Geometric facts about one hand that the gesture guards are built from.
#[derive(Clone, Copy, Debug)]
struct HandPose {
    pinch_index: f32,
    pinch_middle: f32,
    pinch_ring: f32,
    pinch_pinky: f32,
    index_extended: bool,
    middle_extended: bool,
    ring_curled: bool,
    pinky_curled: bool,
    index_above_middle: bool,
}

impl HandPose {
    fn measure(hand: &HandLandmarks) -> Self {
        let thumb_tip = hand[HandLandmark::ThumbTip];
        let index_tip = hand[HandLandmark::IndexTip];
        let middle_tip = hand[HandLandmark::MiddleTip];
        let ring_tip = hand[HandLandmark::RingTip];
        let pinky_tip = hand[HandLandmark::PinkyTip];

        Self {
            pinch_index: thumb_tip.distance_to(&index_tip),
            pinch_middle: thumb_tip.distance_to(&middle_tip),
            pinch_ring: thumb_tip.distance_to(&ring_tip),
            pinch_pinky: thumb_tip.distance_to(&pinky_tip),
            index_extended: index_tip.y < hand[HandLandmark::IndexPip].y,
            middle_extended: middle_tip.y < hand[HandLandmark::MiddlePip].y,
            ring_curled: ring_tip.y > hand[HandLandmark::RingMcp].y,
            pinky_curled: pinky_tip.y > hand[HandLandmark::PinkyMcp].y,
            index_above_middle: index_tip.y < middle_tip.y,
        }
    }

    fn matches(&self, gesture: Gesture, thresholds: &GestureThresholds) -> bool {
        match gesture {
            Gesture::Screenshot => [
                self.pinch_index,
                self.pinch_middle,
                self.pinch_ring,
                self.pinch_pinky,
            ]
            .iter()
            .all(|&d| d < thresholds.screenshot_distance),
            Gesture::Scroll => {
                self.index_extended && self.middle_extended && self.ring_curled && self.pinky_curled
            }
            Gesture::Click => self.pinch_index < thresholds.click_distance,
            Gesture::Move => self.index_above_middle,
            Gesture::Idle => true,
        }
    }

    fn recognize(&self, thresholds: &GestureThresholds) -> Gesture {
        Gesture::PRIORITY
            .into_iter()
            .find(|gesture| self.matches(*gesture, thresholds))
            .unwrap_or(Gesture::Idle)
    }
}

/// Rule-based classifier turning one hand's landmarks into exactly one
/// [`GestureAction`] per frame.
#[derive(Clone, Debug)]
pub struct GestureClassifier {
    thresholds: GestureThresholds,
    screen: ScreenSize,
    camera: ScreenSize,
}

impl GestureClassifier {
    pub fn new(screen: ScreenSize) -> Self {
        Self::with_thresholds(screen, GestureThresholds::default())
    }

    pub fn with_thresholds(screen: ScreenSize, thresholds: GestureThresholds) -> Self {
        Self {
            thresholds,
            screen,
            camera: ScreenSize::new(CAMERA_WIDTH, CAMERA_HEIGHT),
        }
    }

    /// Recognizes the pose without touching any session state.
    pub fn recognize(&self, hand: &HandLandmarks) -> Gesture {
        HandPose::measure(hand).recognize(&self.thresholds)
    }

    pub fn classify(&self, hand: &HandLandmarks, session: &mut GestureSession) -> GestureAction {
        let gesture = self.recognize(hand);
        log::trace!("recognized {} pose", gesture.label());

        match gesture {
            Gesture::Screenshot => {
                let capture = !session.is_take_screenshot;
                session.is_take_screenshot = true;
                session.is_scrolling = false;
                GestureAction::Screenshot { capture }
            }
            Gesture::Scroll => GestureAction::Scroll {
                tick: self.track_scroll(hand[HandLandmark::Wrist], session),
            },
            Gesture::Click => {
                let fire = !session.is_clicking;
                session.is_clicking = true;
                session.is_scrolling = false;
                GestureAction::Click { fire }
            }
            Gesture::Move => {
                session.is_scrolling = false;
                let (x, y) = self.screen_position(hand[HandLandmark::IndexTip]);
                GestureAction::Move { x, y }
            }
            Gesture::Idle => {
                session.reset();
                GestureAction::Idle
            }
        }
    }

    fn track_scroll(&self, wrist: Landmark, session: &mut GestureSession) -> Option<ScrollDirection> {
        let current = wrist.y * self.camera.height as f32;
        if !session.is_scrolling {
            session.is_scrolling = true;
            session.last_vertical_position = current;
            return None;
        }

        let delta = current - session.last_vertical_position;
        if delta.abs() <= self.thresholds.scroll_sensitivity {
            return None;
        }
        session.last_vertical_position = current;
        if delta > 0.0 {
            Some(ScrollDirection::Down)
        } else {
            Some(ScrollDirection::Up)
        }
    }

    fn screen_position(&self, point: Landmark) -> (f64, f64) {
        (
            map_range(point.x as f64, 0.0, 1.0, 0.0, self.screen.width as f64),
            map_range(point.y as f64, 0.0, 1.0, 0.0, self.screen.height as f64),
        )
    }

    /// Overlay marker for `action`, placed on the landmark that drives it.
    pub fn marker(&self, action: &GestureAction, hand: &HandLandmarks) -> Option<Marker> {
        let (landmark, color) = match action {
            GestureAction::Screenshot { .. } => (HandLandmark::ThumbTip, MarkerColor::Blue),
            GestureAction::Scroll { .. } => (HandLandmark::Wrist, MarkerColor::Magenta),
            GestureAction::Click { .. } => (HandLandmark::IndexTip, MarkerColor::Red),
            GestureAction::Move { .. } => (HandLandmark::IndexTip, MarkerColor::Green),
            GestureAction::Idle => return None,
        };
        let point = hand[landmark];
        Some(Marker {
            x: (point.x * self.camera.width as f32) as i32,
            y: (point.y * self.camera.height as f32) as i32,
            color,
        })
    }
}
