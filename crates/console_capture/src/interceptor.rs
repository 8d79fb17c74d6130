use std::{fmt, io, sync::Arc};

use crate::{
    buffer::WriteRecord,
    capture::Shared,
    message::Channel,
    stack::{caller_frames, render_origin, CONSOLE_TRACE_MARKER, INTERNAL_FRAME_BUDGET},
};

/// Write sink for one channel. Every write is accepted in full and buffered
/// for the task it is attributed to; nothing is written anywhere else.
#[derive(Clone)]
pub struct StreamInterceptor {
    shared: Arc<Shared>,
    channel: Channel,
}

impl StreamInterceptor {
    pub(crate) fn new(shared: Arc<Shared>, channel: Channel) -> Self {
        Self { shared, channel }
    }

    pub fn channel(&self) -> Channel {
        self.channel
    }

    pub(crate) fn shared(&self) -> &Arc<Shared> {
        &self.shared
    }

    pub fn write_str(&self, text: &str) {
        self.write_chunk(text.as_bytes());
    }

    /// Buffers `chunk` and schedules a flush for its task. Invalid UTF-8 is
    /// replaced rather than rejected.
    #[inline(never)]
    pub fn write_chunk(&self, chunk: &[u8]) {
        let content = String::from_utf8_lossy(chunk).into_owned();
        let task_id = self.shared.resolver.resolve();
        let origin = if self.shared.config.print_console_trace {
            self.origin_trace()
        } else {
            None
        };
        let now = self.shared.clock.now_ms();
        self.shared
            .record(self.channel, task_id, WriteRecord { content, origin }, now);
    }

    fn origin_trace(&self) -> Option<String> {
        let depth = self.shared.config.trace_depth;
        let frames = self.shared.stack.capture(INTERNAL_FRAME_BUDGET + depth);
        if self.channel == Channel::Error
            && frames.iter().any(|frame| frame.matches(CONSOLE_TRACE_MARKER))
        {
            return None;
        }
        let callers = caller_frames(&frames);
        Some(render_origin(&callers[..callers.len().min(depth)]))
    }
}

impl io::Write for StreamInterceptor {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_chunk(buf);
        Ok(buf.len())
    }

    /// One formatted write is one record, however many pieces the format
    /// string splits into.
    fn write_fmt(&mut self, args: fmt::Arguments<'_>) -> io::Result<()> {
        match args.as_str() {
            Some(text) => self.write_chunk(text.as_bytes()),
            None => self.write_chunk(fmt::format(args).as_bytes()),
        }
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
