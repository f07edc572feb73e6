//! Where frames come from: a looped recording on disk, or a live stream that
//! only ever exposes its latest frame.

pub mod live;
pub mod recorded;

pub use live::{ready_gate, LiveFeed, LiveInput, LiveReader, ReadySignal, ReadyWait};
pub use recorded::RecordedSource;
