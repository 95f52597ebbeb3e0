use std::path::PathBuf;

use crate::{
    actions::{ActionError, ActionExecutor},
    config,
    gesture::{GestureAction, GestureClassifier, HandSessions},
    types::{HandLandmarks, Marker},
};

/// Outcome of processing one hand for one frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HandReport {
    pub slot: usize,
    pub action: GestureAction,
    pub marker: Option<Marker>,
}

/// Classifies each detected hand and applies the resulting action through an
/// [`ActionExecutor`].
pub struct VirtualMouse<E> {
    executor: E,
    classifier: GestureClassifier,
    sessions: HandSessions,
    screenshot_path: PathBuf,
}

impl<E: ActionExecutor> VirtualMouse<E> {
    /// Queries the screen size once and sets up the classifier for it.
    pub fn new(executor: E) -> Result<Self, ActionError> {
        let screen = executor.screen_size()?;
        log::info!("screen resolution {}x{}", screen.width, screen.height);
        Ok(Self::with_classifier(executor, GestureClassifier::new(screen)))
    }

    pub fn with_classifier(executor: E, classifier: GestureClassifier) -> Self {
        Self {
            executor,
            classifier,
            sessions: HandSessions::new(),
            screenshot_path: config::screenshot_path(),
        }
    }

    pub fn with_screenshot_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.screenshot_path = path.into();
        self
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    pub fn sessions(&self) -> &HandSessions {
        &self.sessions
    }

    /// Forgets the gesture state of hands that are no longer tracked.
    pub fn retain_hands(&mut self, keep: impl FnMut(usize) -> bool) {
        self.sessions.retain(keep);
    }

    /// Runs one frame's worth of gesture handling for the hand in `slot`.
    ///
    /// Session state is updated before the action executes, so a failing OS
    /// call does not cause the edge-triggered action to repeat next frame.
    pub fn update(&mut self, slot: usize, hand: &HandLandmarks) -> Result<HandReport, ActionError> {
        let action = self
            .classifier
            .classify(hand, self.sessions.session_mut(slot));
        let marker = self.classifier.marker(&action, hand);
        self.execute(slot, &action)?;

        Ok(HandReport {
            slot,
            action,
            marker,
        })
    }

    fn execute(&mut self, slot: usize, action: &GestureAction) -> Result<(), ActionError> {
        match *action {
            GestureAction::Screenshot { capture: true } => {
                self.executor.capture_screenshot(&self.screenshot_path)?;
                log::info!("screenshot saved as {}", self.screenshot_path.display());
            }
            GestureAction::Scroll {
                tick: Some(direction),
            } => {
                log::debug!("hand {slot}: scroll {direction:?}");
                self.executor.scroll(direction)?;
            }
            GestureAction::Click { fire: true } => {
                log::debug!("hand {slot}: click");
                self.executor.click()?;
            }
            GestureAction::Move { x, y } => {
                let (px, py) = (x.round() as i32, y.round() as i32);
                log::trace!("hand {slot}: move cursor to ({px}, {py})");
                self.executor.move_cursor(px, py)?;
            }
            GestureAction::Screenshot { capture: false }
            | GestureAction::Scroll { tick: None }
            | GestureAction::Click { fire: false }
            | GestureAction::Idle => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::{
        gesture::{
            ScrollDirection,
            tests::{click_hand, idle_hand, move_hand, pinch_all_hand},
        },
        types::{MarkerColor, ScreenSize},
    };

    #[derive(Default)]
    struct FailingExecutor {
        attempts: usize,
    }

    impl ActionExecutor for FailingExecutor {
        fn screen_size(&self) -> Result<ScreenSize, ActionError> {
            Err(ActionError::InvalidScreen {
                width: 0,
                height: 0,
            })
        }

        fn move_cursor(&mut self, _x: i32, _y: i32) -> Result<(), ActionError> {
            self.attempts += 1;
            Ok(())
        }

        fn click(&mut self) -> Result<(), ActionError> {
            self.attempts += 1;
            Err(ActionError::InvalidScreen {
                width: -1,
                height: -1,
            })
        }

        fn scroll(&mut self, _direction: ScrollDirection) -> Result<(), ActionError> {
            self.attempts += 1;
            Ok(())
        }

        fn capture_screenshot(&mut self, _path: &Path) -> Result<(), ActionError> {
            self.attempts += 1;
            Ok(())
        }
    }

    fn mouse() -> VirtualMouse<FailingExecutor> {
        VirtualMouse::with_classifier(
            FailingExecutor::default(),
            GestureClassifier::new(ScreenSize::new(1920, 1080)),
        )
    }

    #[test]
    fn new_propagates_screen_query_failure() {
        assert!(VirtualMouse::new(FailingExecutor::default()).is_err());
    }

    #[test]
    fn failed_click_still_latches() {
        let mut mouse = mouse();
        assert!(mouse.update(0, &click_hand()).is_err());
        let report = mouse.update(0, &click_hand()).expect("latched click is a no-op");
        assert_eq!(report.action, GestureAction::Click { fire: false });
        assert_eq!(mouse.executor().attempts, 1);
    }

    #[test]
    fn report_carries_marker() {
        let mut mouse = mouse();
        let report = mouse.update(3, &move_hand(0.5, 0.25)).expect("move succeeds");
        assert_eq!(report.slot, 3);
        assert_eq!(
            report.marker,
            Some(Marker {
                x: 320,
                y: 120,
                color: MarkerColor::Green
            })
        );

        let idle = mouse.update(3, &idle_hand()).expect("idle is a no-op");
        assert_eq!(idle.marker, None);
    }

    #[test]
    fn held_screenshot_captures_once() {
        let mut mouse = mouse();
        for _ in 0..4 {
            mouse.update(0, &pinch_all_hand(0.01)).expect("capture succeeds");
        }
        assert_eq!(mouse.executor().attempts, 1);
        assert!(mouse.sessions().get(0).is_some_and(|s| s.is_take_screenshot));
    }
}
