//! Viewer for linear-camera captures: 102 gray levels per frame, one frame
//! per text line, played back from a file or streamed live.

pub mod config;
pub mod error;
pub mod frame;
pub mod play;
pub mod playback;
pub mod source;
pub mod strip;
