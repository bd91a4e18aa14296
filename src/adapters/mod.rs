//! Adapters: concrete implementations of the port traits.
//!
//! | Adapter      | Implements          | Connects to                   |
//! |--------------|---------------------|-------------------------------|
//! | `time`       | Clock, DelayNs      | `std::time` (host runs)       |
//! | `log_sink`   | ReportSink          | `log` facade                  |
//! | `frame_sink` | ReportSink          | postcard frames for transport |

pub mod frame_sink;
pub mod log_sink;
pub mod time;

pub use frame_sink::{FRAME_CAPACITY, Frame, FrameSink};
pub use log_sink::LogSink;
pub use time::{StdDelay, SystemClock};
