//! ARBOR Event Log
//!
//! Turns a directory of per-node log files into one time-ordered,
//! indexed [`Timeline`] of typed events.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod event;
pub mod parse;
pub mod reader;
pub mod stable;
pub mod timeline;

pub use config::{IngestConfig, ParseConfig};
pub use event::{
    ChildState, Event, EventKind, EventOrigin, EventPayload, Location, ManagerState, TreeState,
};
pub use parse::{LineError, LineParser, ParsedLine};
pub use reader::{EventReader, ParseError, SourceState};
pub use stable::{StableError, StablePeriod, detect_stable_position};
pub use timeline::{IngestError, Timeline, build_timeline};
