use std::{
    fmt::Display,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use crate::{
    interceptor::StreamInterceptor,
    message::Channel,
    stack::{caller_frames, render_origin, INTERNAL_FRAME_BUDGET},
};

const GROUP_INDENT: usize = 2;

/// Console-style front end over a capture's two sinks. Every call writes one
/// newline-terminated message.
#[derive(Clone)]
pub struct Console {
    stdout: StreamInterceptor,
    stderr: StreamInterceptor,
    group_depth: Arc<AtomicUsize>,
}

impl Console {
    pub(crate) fn new(stdout: StreamInterceptor, stderr: StreamInterceptor) -> Self {
        Self {
            stdout,
            stderr,
            group_depth: Arc::new(AtomicUsize::new(0)),
        }
    }

    #[inline(never)]
    pub fn log(&self, message: impl Display) {
        self.emit(Channel::Output, &message.to_string());
    }

    #[inline(never)]
    pub fn info(&self, message: impl Display) {
        self.emit(Channel::Output, &message.to_string());
    }

    #[inline(never)]
    pub fn debug(&self, message: impl Display) {
        self.emit(Channel::Output, &message.to_string());
    }

    #[inline(never)]
    pub fn warn(&self, message: impl Display) {
        self.emit(Channel::Error, &message.to_string());
    }

    #[inline(never)]
    pub fn error(&self, message: impl Display) {
        self.emit(Channel::Error, &message.to_string());
    }

    /// Writes `Trace: <message>` followed by the caller's frames to the error
    /// channel.
    #[inline(never)]
    pub fn trace(&self, message: impl Display) {
        let shared = self.stderr.shared();
        let depth = shared.config.trace_depth;
        let frames = shared.stack.capture(INTERNAL_FRAME_BUDGET + depth);
        let callers = caller_frames(&frames);
        let callers = &callers[..callers.len().min(depth)];

        let mut text = format!("Trace: {message}");
        if !callers.is_empty() {
            text.push('\n');
            text.push_str(&render_origin(callers));
        }
        self.emit(Channel::Error, &text);
    }

    /// Logs `label` and indents everything after it until [`Console::group_end`].
    #[inline(never)]
    pub fn group(&self, label: impl Display) {
        let label = label.to_string();
        if !label.is_empty() {
            self.emit(Channel::Output, &label);
        }
        self.group_depth.fetch_add(1, Ordering::SeqCst);
    }

    pub fn group_end(&self) {
        let _ = self
            .group_depth
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |depth| {
                depth.checked_sub(1)
            });
    }

    #[inline(never)]
    fn emit(&self, channel: Channel, text: &str) {
        let indent = " ".repeat(self.group_depth.load(Ordering::SeqCst) * GROUP_INDENT);
        let mut line = if indent.is_empty() {
            text.to_string()
        } else {
            format!("{indent}{}", text.replace('\n', &format!("\n{indent}")))
        };
        line.push('\n');

        match channel {
            Channel::Output => self.stdout.write_str(&line),
            Channel::Error => self.stderr.write_str(&line),
        }
    }
}
