pub mod actions;
pub mod app;
pub mod config;
pub mod gesture;
pub mod model_download;
pub mod mouse;
pub mod pipeline;
pub mod types;

pub use actions::{ActionError, ActionExecutor, DesktopExecutor};
pub use gesture::{
    Gesture, GestureAction, GestureClassifier, GestureSession, HandSessions, ScrollDirection,
    map_range,
};
pub use mouse::{HandReport, VirtualMouse};
pub use types::{Frame, HandLandmark, HandLandmarks, Landmark, Marker, MarkerColor, ScreenSize};
