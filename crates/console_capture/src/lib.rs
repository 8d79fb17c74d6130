#![forbid(unsafe_code)]
//! Console output capture for test runners.
//!
//! Writes to the output and error sinks are attributed to the running test,
//! suite or file, buffered per task, and flushed once per tick as
//! [`UserConsoleLog`] messages:
//! - Attribution walks the [`ExecutionContext`] and falls back to the caller's
//!   source file taken from the call stack.
//! - Writes made within one tick coalesce into one message per channel; the
//!   channel written to first is reported first.
//! - With `print_console_trace` every write becomes its own message carrying
//!   the frames that produced it.
//!
//! Buffers are unbounded; a task that prints without yielding keeps growing
//! them until the next tick.

mod buffer;
mod builder;
mod capture;
mod clock;
mod config;
mod console;
mod context;
mod emitter;
mod error;
mod interceptor;
mod message;
mod resolver;
mod schedule;
mod stack;
mod transport;

pub use buffer::{BufferStore, TaskTimer, WriteRecord};
pub use builder::ConsoleCaptureBuilder;
pub use capture::ConsoleCapture;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{CaptureConfig, DEFAULT_TRACE_DEPTH};
pub use console::Console;
pub use context::{ExecutionContext, NoContext, TaskTracker, UNKNOWN_TASK_ID};
pub use error::{CaptureError, TransportError};
pub use interceptor::StreamInterceptor;
pub use message::{Channel, UserConsoleLog, EMPTY_LINE};
pub use resolver::TaskResolver;
pub use schedule::{
    Debouncer, DeferredJob, ManualTicker, PendingTick, TickScheduler, TokioTicker,
};
pub use stack::{
    parse_backtrace, BacktraceCapture, StackCapture, StackFrame, CONSOLE_EMIT_MARKER,
    CONSOLE_TRACE_MARKER,
};
pub use transport::{ChannelTransport, NdjsonTransport, ReportTransport};
