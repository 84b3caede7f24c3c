pub mod cancel;
pub mod content;
pub mod event;
pub mod geo;
pub mod lifecycle;
pub mod pacing;
pub mod playback;
pub mod poi;
pub mod reactor;
pub mod selector;
pub mod session;
pub mod telemetry;
pub mod time;
pub mod trip;
