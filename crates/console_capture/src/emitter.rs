use crate::{
    buffer::{BufferStore, WriteRecord},
    clock::Clock,
    message::{Channel, UserConsoleLog, EMPTY_LINE},
};

/// Turns a task's buffered writes into report messages.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Emitter {
    trace: bool,
}

impl Emitter {
    pub(crate) fn new(trace: bool) -> Self {
        Self { trace }
    }

    /// Drains both channels of `task_id`. The error channel goes first only
    /// when its first pending write is strictly older than the output one.
    pub(crate) fn drain(
        &self,
        store: &mut BufferStore,
        task_id: &str,
        clock: &dyn Clock,
    ) -> Vec<UserConsoleLog> {
        let timer = store.timer(task_id).unwrap_or_default();
        let order = if timer.error_first_write < timer.output_first_write {
            [Channel::Error, Channel::Output]
        } else {
            [Channel::Output, Channel::Error]
        };

        let mut messages = Vec::new();
        for channel in order {
            let Some((records, first_write)) = store.take(task_id, channel) else {
                continue;
            };
            let time = if first_write == 0 {
                clock.now_ms()
            } else {
                first_write
            };
            self.format(channel, task_id, time, records, &mut messages);
        }
        messages
    }

    fn format(
        &self,
        channel: Channel,
        task_id: &str,
        time: u64,
        records: Vec<WriteRecord>,
        out: &mut Vec<UserConsoleLog>,
    ) {
        if self.trace {
            for record in records {
                let size = record.content.chars().count();
                out.push(message(channel, task_id, time, record.content, size, record.origin));
            }
        } else {
            let size = records.len();
            let content: String = records.into_iter().map(|r| r.content).collect();
            out.push(message(channel, task_id, time, content, size, None));
        }
    }
}

fn message(
    channel: Channel,
    task_id: &str,
    time: u64,
    content: String,
    size: usize,
    origin: Option<String>,
) -> UserConsoleLog {
    let content = if content.is_empty() {
        EMPTY_LINE.to_string()
    } else {
        content
    };
    UserConsoleLog {
        channel,
        content,
        task_id: task_id.to_string(),
        time,
        size,
        origin,
    }
}
