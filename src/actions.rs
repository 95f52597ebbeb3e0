use std::path::{Path, PathBuf};

use enigo::{Axis, Button, Coordinate, Direction, Enigo, Mouse, Settings};
use xcap::Monitor;

use crate::{gesture::ScrollDirection, types::ScreenSize};

#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    #[error("failed to connect to the input backend: {0}")]
    Connect(#[from] enigo::NewConError),

    #[error("input injection failed: {0}")]
    Input(#[from] enigo::InputError),

    #[error("screen capture failed: {0}")]
    Capture(#[from] xcap::XCapError),

    #[error("failed to save screenshot to {path}: {source}")]
    Save {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("display reported an invalid size {width}x{height}")]
    InvalidScreen { width: i32, height: i32 },
}

/// OS-level effects requested by the virtual mouse.
pub trait ActionExecutor {
    fn screen_size(&self) -> Result<ScreenSize, ActionError>;

    fn move_cursor(&mut self, x: i32, y: i32) -> Result<(), ActionError>;

    /// Single left click at the current cursor position.
    fn click(&mut self) -> Result<(), ActionError>;

    /// One scroll unit.
    fn scroll(&mut self, direction: ScrollDirection) -> Result<(), ActionError>;

    /// Captures the full screen and writes it to `path`, replacing any
    /// existing file.
    fn capture_screenshot(&mut self, path: &Path) -> Result<(), ActionError>;
}

/// Drives the real cursor through `enigo` and captures the screen with `xcap`.
pub struct DesktopExecutor {
    enigo: Enigo,
}

impl DesktopExecutor {
    pub fn new() -> Result<Self, ActionError> {
        let enigo = Enigo::new(&Settings::default())?;
        Ok(Self { enigo })
    }
}

impl ActionExecutor for DesktopExecutor {
    fn screen_size(&self) -> Result<ScreenSize, ActionError> {
        let (width, height) = self.enigo.main_display()?;
        match (u32::try_from(width), u32::try_from(height)) {
            (Ok(w), Ok(h)) if w > 0 && h > 0 => Ok(ScreenSize::new(w, h)),
            _ => Err(ActionError::InvalidScreen { width, height }),
        }
    }

    fn move_cursor(&mut self, x: i32, y: i32) -> Result<(), ActionError> {
        self.enigo.move_mouse(x, y, Coordinate::Abs)?;
        Ok(())
    }

    fn click(&mut self) -> Result<(), ActionError> {
        self.enigo.button(Button::Left, Direction::Click)?;
        Ok(())
    }

    fn scroll(&mut self, direction: ScrollDirection) -> Result<(), ActionError> {
        // enigo scrolls down for positive lengths.
        let length = match direction {
            ScrollDirection::Down => 1,
            ScrollDirection::Up => -1,
        };
        self.enigo.scroll(length, Axis::Vertical)?;
        Ok(())
    }

    fn capture_screenshot(&mut self, path: &Path) -> Result<(), ActionError> {
        let monitor = Monitor::from_point(0, 0)?;
        let image = monitor.capture_image()?;
        image.save(path).map_err(|source| ActionError::Save {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(())
    }
}
