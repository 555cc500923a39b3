/*!
Configuration for a [`Logger`](crate::Logger).

All options are fixed once [`Builder::build`] returns. The defaults match
a common production setup: rotate at least once a day and whenever the
active file would exceed 100MiB, retain everything, no symlink, fully
synchronous writes.
*/

use std::{path::PathBuf, time::Duration};

use crate::{
    clock::{Clock, SystemClock},
    error::Error,
    Logger,
};

pub(crate) struct Options {
    pub(crate) clock: Box<dyn Clock>,
    pub(crate) symlink: Option<PathBuf>,
    pub(crate) max_interval: Duration,
    pub(crate) max_size: u64,
    pub(crate) max_sequence: u32,
    pub(crate) max_age: Duration,
    pub(crate) max_backups: usize,
    pub(crate) write_ch_size: usize,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            clock: Box::new(SystemClock),
            symlink: None,
            max_interval: Duration::from_secs(24 * 60 * 60),
            max_size: 100 * 1024 * 1024,
            max_sequence: 0,
            max_age: Duration::ZERO,
            max_backups: 0,
            write_ch_size: 0,
        }
    }
}

/**
A builder for a [`Logger`].

Created through [`Logger::builder`] with the filename pattern; every
other option starts from its default.
*/
pub struct Builder {
    pattern: String,
    options: Options,
}

impl Builder {
    pub(crate) fn new(pattern: impl Into<String>) -> Self {
        Builder {
            pattern: pattern.into(),
            options: Options::default(),
        }
    }

    /**
    The time source used for rotation boundaries and pattern expansion.

    Defaults to [`SystemClock`].
    */
    pub fn clock(mut self, clock: impl Clock + 'static) -> Self {
        self.options.clock = Box::new(clock);
        self
    }

    /**
    A path kept pointing at the active file.

    The link is refreshed by the housekeeping worker after each rotation.
    Defaults to none.
    */
    pub fn symlink(mut self, symlink: impl Into<PathBuf>) -> Self {
        self.options.symlink = Some(symlink.into());
        self
    }

    /**
    The minimum wall-clock duration between forced rotations, aligned to
    local time. A zero duration disables interval rotation.

    Defaults to 24 hours.
    */
    pub fn max_interval(mut self, max_interval: Duration) -> Self {
        self.options.max_interval = max_interval;
        self
    }

    /**
    The byte threshold above which the active file is rotated. Zero
    disables size rotation.

    Defaults to 100MiB.
    */
    pub fn max_size(mut self, max_size: u64) -> Self {
        self.options.max_size = max_size;
        self
    }

    /**
    The cap on the numeric overflow suffix within one interval. When the
    cap is reached, the `.max_sequence` file is reused and truncated on
    each further rotation. Zero leaves the suffix unbounded.

    Defaults to unbounded.
    */
    pub fn max_sequence(mut self, max_sequence: u32) -> Self {
        self.options.max_sequence = max_sequence;
        self
    }

    /**
    The retention age for rotated files. Files whose modification time
    falls behind `now - max_age` are deleted by the housekeeping worker.
    Zero retains files forever.

    Defaults to zero.
    */
    pub fn max_age(mut self, max_age: Duration) -> Self {
        self.options.max_age = max_age;
        self
    }

    /**
    The retention count for rotated files. When more files than this
    match the pattern, the oldest are deleted. Zero retains all.

    Defaults to zero.
    */
    pub fn max_backups(mut self, max_backups: usize) -> Self {
        self.options.max_backups = max_backups;
        self
    }

    /**
    The capacity of the buffered-write channel. A non-zero capacity
    makes writes copy the record and enqueue it for a background worker;
    records that find the channel full are discarded and counted in
    [`Metrics::discards`](crate::Metrics::discards). Zero keeps writes
    synchronous.

    Defaults to zero.
    */
    pub fn write_ch_size(mut self, write_ch_size: usize) -> Self {
        self.options.write_ch_size = write_ch_size;
        self
    }

    /**
    Validate the pattern, spawn the background workers, and return the
    sink.

    The active file is not created until the first write.
    */
    pub fn build(self) -> Result<Logger, Error> {
        Logger::spawn(self.pattern, self.options)
    }
}
