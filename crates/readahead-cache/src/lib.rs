//! Read-ahead caching for Modbus reads.
//!
//! A [`ReadAhead`] sits in front of anything implementing [`UnitSource`].
//! On a miss it fetches at least `readahead_size` units starting at the
//! requested address, keeps the result as an immutable [`Window`], and serves
//! later reads that fall entirely inside a window without touching the
//! source again. Windows are kept per function code until [`ReadAhead::clear`].

#![forbid(unsafe_code)]

pub mod config;
pub mod coordinator;
pub mod error;
pub mod sim;
pub mod source;
pub mod window;

pub use config::ReadAheadConfig;
pub use coordinator::ReadAhead;
#[cfg(feature = "metrics")]
pub use coordinator::ReadAheadMetricsSnapshot;
pub use error::{ReadAheadError, WindowError};
pub use readahead_core::ReadFunction;
pub use sim::{InMemorySource, SimulatorError};
pub use source::UnitSource;
pub use window::Window;

/// Number of addressable units in the 16-bit address space.
pub const ADDRESS_SPACE: u32 = 1 << 16;
