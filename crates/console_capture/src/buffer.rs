use std::collections::HashMap;

use crate::message::Channel;

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct WriteRecord {
    pub content: String,
    pub origin: Option<String>,
}

/// First pending write per channel, in epoch milliseconds; zero means idle.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub struct TaskTimer {
    pub output_first_write: u64,
    pub error_first_write: u64,
}

impl TaskTimer {
    pub fn first_write(&self, channel: Channel) -> u64 {
        match channel {
            Channel::Output => self.output_first_write,
            Channel::Error => self.error_first_write,
        }
    }

    fn slot(&mut self, channel: Channel) -> &mut u64 {
        match channel {
            Channel::Output => &mut self.output_first_write,
            Channel::Error => &mut self.error_first_write,
        }
    }

    fn is_idle(&self) -> bool {
        self.output_first_write == 0 && self.error_first_write == 0
    }
}

/// Pending writes per task and channel. A task has a timer exactly while it
/// has buffered records on either channel.
#[derive(Debug, Default)]
pub struct BufferStore {
    output: HashMap<String, Vec<WriteRecord>>,
    error: HashMap<String, Vec<WriteRecord>>,
    timers: HashMap<String, TaskTimer>,
}

impl BufferStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn buffers(&self, channel: Channel) -> &HashMap<String, Vec<WriteRecord>> {
        match channel {
            Channel::Output => &self.output,
            Channel::Error => &self.error,
        }
    }

    fn buffers_mut(&mut self, channel: Channel) -> &mut HashMap<String, Vec<WriteRecord>> {
        match channel {
            Channel::Output => &mut self.output,
            Channel::Error => &mut self.error,
        }
    }

    /// Appends a record; the channel's first-write time is only set when the
    /// channel had nothing pending.
    pub fn append(&mut self, task_id: &str, channel: Channel, record: WriteRecord, now_ms: u64) {
        let timer = self.timers.entry(task_id.to_string()).or_default();
        let slot = timer.slot(channel);
        if *slot == 0 {
            *slot = now_ms.max(1);
        }
        self.buffers_mut(channel)
            .entry(task_id.to_string())
            .or_default()
            .push(record);
    }

    pub fn timer(&self, task_id: &str) -> Option<TaskTimer> {
        self.timers.get(task_id).copied()
    }

    pub fn records(&self, task_id: &str, channel: Channel) -> Option<&[WriteRecord]> {
        self.buffers(channel).get(task_id).map(Vec::as_slice)
    }

    /// Removes one channel's records and resets its timer field. Returns the
    /// records together with the first-write time they were buffered under.
    pub fn take(&mut self, task_id: &str, channel: Channel) -> Option<(Vec<WriteRecord>, u64)> {
        let records = self.buffers_mut(channel).remove(task_id)?;
        let mut first_write = 0;
        if let Some(timer) = self.timers.get_mut(task_id) {
            let slot = timer.slot(channel);
            first_write = *slot;
            *slot = 0;
            if timer.is_idle() {
                self.timers.remove(task_id);
            }
        }
        Some((records, first_write))
    }

    pub fn pending_tasks(&self) -> Vec<String> {
        let mut tasks: Vec<String> = self.timers.keys().cloned().collect();
        tasks.sort();
        tasks
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(content: &str) -> WriteRecord {
        WriteRecord {
            content: content.to_string(),
            origin: None,
        }
    }

    #[test]
    fn first_write_time_sticks_until_taken() {
        let mut store = BufferStore::new();
        store.append("t", Channel::Output, record("a"), 10);
        store.append("t", Channel::Output, record("b"), 20);
        store.append("t", Channel::Error, record("x"), 30);

        let timer = store.timer("t").unwrap();
        assert_eq!(timer.output_first_write, 10);
        assert_eq!(timer.error_first_write, 30);
        assert_eq!(store.records("t", Channel::Output).unwrap().len(), 2);
    }

    #[test]
    fn taking_one_channel_leaves_the_other() {
        let mut store = BufferStore::new();
        store.append("t", Channel::Output, record("a"), 10);
        store.append("t", Channel::Error, record("x"), 11);

        let (records, time) = store.take("t", Channel::Output).unwrap();
        assert_eq!(records, vec![record("a")]);
        assert_eq!(time, 10);
        assert!(store.records("t", Channel::Output).is_none());
        assert_eq!(store.records("t", Channel::Error).unwrap().len(), 1);

        let timer = store.timer("t").unwrap();
        assert_eq!(timer.output_first_write, 0);
        assert_eq!(timer.error_first_write, 11);
    }

    #[test]
    fn timer_is_dropped_once_both_channels_drain() {
        let mut store = BufferStore::new();
        store.append("t", Channel::Error, record("x"), 5);
        assert!(store.take("t", Channel::Output).is_none());
        assert!(store.take("t", Channel::Error).is_some());
        assert!(store.timer("t").is_none());
        assert!(store.is_empty());

        store.append("t", Channel::Error, record("y"), 50);
        assert_eq!(store.timer("t").unwrap().error_first_write, 50);
        assert_eq!(store.pending_tasks(), vec!["t".to_string()]);
    }
}
