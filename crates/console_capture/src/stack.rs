use std::{
    backtrace::Backtrace,
    fmt,
    path::{Path, PathBuf},
    sync::OnceLock,
};

use regex::Regex;

/// Frame every [`Console`](crate::Console) method funnels through before it
/// reaches an interceptor.
pub const CONSOLE_EMIT_MARKER: &str = "console_capture::console::Console::emit";
/// Frame present whenever a write comes from `Console::trace`.
pub const CONSOLE_TRACE_MARKER: &str = "console_capture::console::Console::trace";

/// Frames belonging to this crate's write path; an origin trace starts after
/// the outermost of them.
pub(crate) const INTERNAL_FRAME_MARKERS: &[&str] = &[
    "console_capture::console::Console::",
    "console_capture::interceptor::StreamInterceptor",
];

/// Frames reserved for capture machinery and the internal write path on top of
/// whatever depth the caller asked for.
pub(crate) const INTERNAL_FRAME_BUDGET: usize = 32;

/// `std::io` and `core::fmt` plumbing that can sit between a sink and the code
/// writing to it, e.g. `Write::write_all` or `&mut W` forwarding impls.
const ADAPTER_FRAME_PREFIXES: &[&str] = &[
    "std::io::",
    "<std::io::",
    "core::fmt::",
    "<core::fmt::",
    "alloc::fmt::",
    "<&mut ",
];

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct StackFrame {
    pub function: String,
    pub file: Option<PathBuf>,
    pub line: Option<u32>,
    pub column: Option<u32>,
}

impl StackFrame {
    pub fn new(function: impl Into<String>) -> Self {
        Self {
            function: function.into(),
            file: None,
            line: None,
            column: None,
        }
    }

    pub fn at(mut self, file: impl Into<PathBuf>, line: u32, column: u32) -> Self {
        self.file = Some(file.into());
        self.line = Some(line);
        self.column = Some(column);
        self
    }

    pub fn matches(&self, marker: &str) -> bool {
        self.function.contains(marker)
    }

    pub fn file(&self) -> Option<&Path> {
        self.file.as_deref()
    }
}

impl fmt::Display for StackFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "at {}", self.function)?;
        let Some(file) = self.file.as_ref() else {
            return Ok(());
        };
        write!(f, " ({}", file.display())?;
        if let Some(line) = self.line {
            write!(f, ":{line}")?;
            if let Some(column) = self.column {
                write!(f, ":{column}")?;
            }
        }
        write!(f, ")")
    }
}

/// Snapshot of the current call stack, innermost frame first.
pub trait StackCapture: Send + Sync + 'static {
    fn capture(&self, limit: usize) -> Vec<StackFrame>;
}

/// [`StackCapture`] backed by `std::backtrace`. Requires debug info to yield
/// file locations; without it frames carry function names only.
///
/// `std` symbolizes the whole stack before anything can be read, so a capture
/// costs the same whatever `limit` is; only parsing stops early. Captures are
/// taken for writes that no [`ExecutionContext`](crate::ExecutionContext)
/// scope covers and for every write in trace mode.
#[derive(Debug, Clone, Copy, Default)]
pub struct BacktraceCapture;

impl StackCapture for BacktraceCapture {
    fn capture(&self, limit: usize) -> Vec<StackFrame> {
        let text = Backtrace::force_capture().to_string();
        parse_frames(&text, limit)
    }
}

fn symbol_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*\d+:\s+(.+?)\s*$").expect("valid symbol regex"))
}

/// Extra symbols inlined into a numbered frame are printed unnumbered.
fn inlined_symbol_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s+([^\s\[].*?)\s*$").expect("valid inlined symbol regex"))
}

fn location_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*at\s+(.+?)(?::(\d+))?(?::(\d+))?\s*$").expect("valid location regex")
    })
}

/// Parses the `Display` form of a `std::backtrace::Backtrace`.
pub fn parse_backtrace(text: &str) -> Vec<StackFrame> {
    parse_frames(text, usize::MAX)
}

fn parse_frames(text: &str, limit: usize) -> Vec<StackFrame> {
    let mut frames: Vec<StackFrame> = Vec::new();
    for line in text.lines() {
        if let Some(caps) = symbol_line().captures(line) {
            if frames.len() == limit {
                break;
            }
            frames.push(StackFrame::new(&caps[1]));
            continue;
        }
        if let Some(caps) = location_line().captures(line) {
            // Only the first location line after a symbol belongs to it.
            let Some(frame) = frames.last_mut() else {
                continue;
            };
            if frame.file.is_some() {
                continue;
            }
            frame.file = Some(PathBuf::from(&caps[1]));
            frame.line = caps.get(2).and_then(|m| m.as_str().parse().ok());
            frame.column = caps.get(3).and_then(|m| m.as_str().parse().ok());
            continue;
        }
        if frames.is_empty() || frames.len() == limit {
            continue;
        }
        if let Some(caps) = inlined_symbol_line().captures(line) {
            frames.push(StackFrame::new(&caps[1]));
        }
    }
    frames
}

/// Renders caller frames the way they are attached to a report message.
pub(crate) fn render_origin(frames: &[StackFrame]) -> String {
    frames
        .iter()
        .map(|frame| format!("    {frame}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Index of the first frame past this crate's write path and any `std::io`
/// adapter frames directly outside it. `None` when no write-path frame is on
/// the stack.
pub(crate) fn write_path_end(frames: &[StackFrame]) -> Option<usize> {
    let outermost = frames.iter().rposition(|frame| {
        INTERNAL_FRAME_MARKERS
            .iter()
            .any(|marker| frame.matches(marker))
    })?;
    let adapters = frames[outermost + 1..]
        .iter()
        .take_while(|frame| {
            ADAPTER_FRAME_PREFIXES
                .iter()
                .any(|prefix| frame.function.starts_with(prefix))
        })
        .count();
    Some(outermost + 1 + adapters)
}

/// Frames after the write path, or all frames when none of it is present.
pub(crate) fn caller_frames(frames: &[StackFrame]) -> &[StackFrame] {
    &frames[write_path_end(frames).unwrap_or(0)..]
}
