/*!
A rotating file sink for line-oriented log streams.

A [`Logger`] is an [`io::Write`] implementation that appends opaque byte
records to a file named by a strftime-style pattern. As records arrive it
rotates the active file on two triggers:

- **Interval:** when the wall clock crosses an interval boundary aligned
  to local time (midnight for the default 24 hour interval), the pattern
  is re-expanded and a fresh base filename takes over.
- **Size:** when a write would push the active file past `max_size`, the
  sink moves to the next numeric overflow suffix (`.1`, `.2`, ...) within
  the same interval. An optional cap turns the final suffix into a wrap
  slot that is truncated and reused.

A background housekeeping worker keeps a configurable symlink pointing at
the newest file and deletes rotated files that fall outside the retention
policy (`max_age`, `max_backups`). The sink also self-heals: if the
active file is deleted out from under it, the next write recreates it.

With a non-zero `write_ch_size`, writes become non-blocking: records are
copied into a bounded channel and a worker drains them to disk. Records
that find the channel full are dropped and counted, never blocking the
producer; the count is visible through [`Logger::metrics`].

# Examples

Rotate hourly, keep a week of files, and publish a stable path:

```no_run
use std::io::Write;

let logger = logrotate::Logger::builder("logs/app.%Y%m%d%H.log")
    .max_interval(std::time::Duration::from_secs(60 * 60))
    .max_backups(24 * 7)
    .symlink("logs/app.log")
    .build()?;

writeln!(&logger, "hello")?;

logger.close()?;
# Ok::<(), Box<dyn std::error::Error>>(())
```

Force a rotation outside the normal rules, e.g. on SIGHUP:

```no_run
# let logger = logrotate::Logger::builder("logs/app.%Y%m%d.log").build()?;
logger.rotate()?;
# Ok::<(), Box<dyn std::error::Error>>(())
```
*/

use std::{
    fmt,
    fs,
    io::{self, Write as _},
    path::{Path, PathBuf},
    sync::Arc,
    thread,
};

use crossbeam_channel::Sender;
use parking_lot::{Mutex, RwLock};

mod clock;
mod error;
mod filename;
mod internal_metrics;
mod mill;
mod options;
mod writer;

pub use self::{
    clock::{Clock, SystemClock},
    error::Error,
    options::Builder,
};

use self::{internal_metrics::InternalMetrics, options::Options};

/**
A snapshot of the sink's internal counters.

All counts increase monotonically over the life of the sink.
*/
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Metrics {
    /**
    Records dropped in buffered mode because the write channel was full.
    */
    pub discards: u64,
    /**
    Log files created, counting rotations and self-heals.
    */
    pub file_creates: u64,
    /**
    Rotated files deleted by the retention policy.
    */
    pub file_deletes: u64,
    /**
    Writes that failed against the underlying file handle.
    */
    pub write_failures: u64,
}

/**
A rotating file sink.

Cheap to share: [`io::Write`] is implemented for `&Logger` as well, so a
single instance can serve concurrent producers. All rotation decisions
happen under an internal lock; in synchronous mode writes are serialized
through it, in buffered mode they only touch the record channel.
*/
pub struct Logger {
    core: Arc<Core>,
    shutdown: Mutex<Option<Shutdown>>,
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger").finish_non_exhaustive()
    }
}

struct Shutdown {
    quit_tx: Sender<()>,
    workers: Vec<thread::JoinHandle<()>>,
}

impl Logger {
    /**
    Start building a sink over the given filename pattern.

    The pattern mixes literal characters with strftime directives
    (`%Y`, `%m`, `%d`, `%H`, `%M`, `%S`, `%%`, ...), expanded at each
    rotation boundary in the clock's timezone.
    */
    pub fn builder(pattern: impl Into<String>) -> Builder {
        Builder::new(pattern)
    }

    pub(crate) fn spawn(pattern: String, options: Options) -> Result<Logger, Error> {
        filename::validate_pattern(&pattern)?;

        let glob_pattern = filename::parse_glob_pattern(&pattern);
        glob::Pattern::new(&glob_pattern).map_err(|err| Error::Pattern(err.to_string()))?;

        let max_interval_secs = options.max_interval.as_secs() as i64;
        let tz_offset_secs = i64::from(options.clock.now().offset().local_minus_utc());

        let (mill_tx, mill_rx) = crossbeam_channel::bounded(1);
        let (quit_tx, quit_rx) = crossbeam_channel::bounded(0);

        let (records_tx, records_rx) = if options.write_ch_size > 0 {
            let (tx, rx) = crossbeam_channel::bounded(options.write_ch_size);
            (Some(tx), Some(rx))
        } else {
            (None, None)
        };

        let core = Arc::new(Core {
            pattern,
            glob_pattern,
            options,
            max_interval_secs,
            tz_offset_secs,
            state: RwLock::new(State::default()),
            metrics: InternalMetrics::default(),
            mill_tx,
            records_tx,
        });

        let mut workers = Vec::with_capacity(2);

        {
            let core = core.clone();
            let quit_rx = quit_rx.clone();
            workers.push(thread::spawn(move || mill::run(core, mill_rx, quit_rx)));
        }

        if let Some(records_rx) = records_rx {
            let core = core.clone();
            workers.push(thread::spawn(move || writer::run(core, records_rx, quit_rx)));
        }

        Ok(Logger {
            core,
            shutdown: Mutex::new(Some(Shutdown { quit_tx, workers })),
        })
    }

    /**
    Forcibly rotate the active file.

    The current file is closed and the next write goes to a fresh file;
    if the pattern expands to a name that already exists, a numeric
    suffix is probed until a free one is found. Housekeeping runs
    afterwards.
    */
    pub fn rotate(&self) -> Result<(), Error> {
        let mut state = self.core.state.write();

        self.core.rotate_locked(&mut state)
    }

    /**
    Shut the sink down.

    Signals both workers, waits for each to finish its bounded drain, and
    releases the active file. Idempotent; writes issued after `close`
    return without panicking but are not guaranteed to reach disk.
    */
    pub fn close(&self) -> Result<(), Error> {
        let Some(shutdown) = self.shutdown.lock().take() else {
            return Ok(());
        };

        // Dropping the quit sender unblocks both workers.
        drop(shutdown.quit_tx);
        for worker in shutdown.workers {
            let _ = worker.join();
        }

        self.core.state.write().file = None;

        Ok(())
    }

    /**
    The path of the file the sink is currently writing to.

    Empty until the first write or rotation creates a file.
    */
    pub fn current_filename(&self) -> PathBuf {
        let state = self.core.state.read();

        PathBuf::from(state.curr_filename.as_str())
    }

    /**
    A snapshot of the sink's counters. See [`Metrics`].
    */
    pub fn metrics(&self) -> Metrics {
        Metrics {
            discards: self.core.metrics.discards.sample(),
            file_creates: self.core.metrics.file_create.sample(),
            file_deletes: self.core.metrics.file_delete.sample(),
            write_failures: self.core.metrics.file_write_failed.sample(),
        }
    }
}

impl io::Write for &Logger {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if let Some(records_tx) = &self.core.records_tx {
            if records_tx.try_send(buf.to_vec()).is_err() {
                self.core.metrics.discards.increment();
            }

            return Ok(buf.len());
        }

        self.core.write_sync(buf).map_err(io::Error::other)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl io::Write for Logger {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        (&*self).write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        (&*self).flush()
    }
}

impl Drop for Logger {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

// Shared between the public handle and the workers. Rotation state is
// only ever mutated under the write half of `state`.
pub(crate) struct Core {
    pattern: String,
    pub(crate) glob_pattern: String,
    pub(crate) options: Options,
    max_interval_secs: i64,
    tz_offset_secs: i64,
    state: RwLock<State>,
    pub(crate) metrics: InternalMetrics,
    mill_tx: Sender<()>,
    records_tx: Option<Sender<Vec<u8>>>,
}

#[derive(Default)]
struct State {
    file: Option<fs::File>,
    size: u64,
    curr_rotation_time: i64,
    curr_base_filename: String,
    curr_filename: String,
    curr_sequence: u32,
}

impl Core {
    pub(crate) fn write_sync(&self, record: &[u8]) -> Result<usize, Error> {
        let mut state = self.state.write();

        self.write_locked(&mut state, record)
    }

    fn write_locked(&self, state: &mut State, record: &[u8]) -> Result<usize, Error> {
        let write_len = record.len() as u64;

        if state.file.is_none() {
            self.open_existing_or_new(state, write_len)?;
        } else {
            match fs::metadata(&state.curr_filename) {
                Ok(_) => {}
                Err(err) if err.kind() == io::ErrorKind::NotFound => {
                    // The active file was removed externally; self-heal.
                    self.open_existing_or_new(state, write_len)?;
                }
                Err(source) => {
                    return Err(Error::Stat {
                        path: PathBuf::from(&state.curr_filename),
                        source,
                    });
                }
            }
        }

        if self.options.max_size > 0 && state.size + write_len > self.options.max_size {
            self.rotate_locked(state)?;
        } else if self.max_interval_secs > 0
            && state.curr_rotation_time != self.eval_rotation_time()
        {
            self.rotate_locked(state)?;
        }

        let file = state
            .file
            .as_mut()
            .expect("the active file is open after the freshness check");

        match file.write(record) {
            Ok(written) => {
                state.size += written as u64;

                Ok(written)
            }
            Err(source) => {
                self.metrics.file_write_failed.increment();
                tracing::warn!(error = %source, "write failed, reopening the log file");

                let recovery = self
                    .open_existing_or_new(state, write_len)
                    .err()
                    .map(Box::new);

                Err(Error::Write { source, recovery })
            }
        }
    }

    fn rotate_locked(&self, state: &mut State) -> Result<(), Error> {
        state.file = None;

        let next = self.eval_current_filename(state, 0, true);
        self.open_new(state, &next)?;
        self.request_mill();

        Ok(())
    }

    // Resume the candidate file if it exists and can still take this
    // write, otherwise start a new one.
    fn open_existing_or_new(&self, state: &mut State, write_len: u64) -> Result<(), Error> {
        state.file = None;

        let result = self.open_existing_or_new_inner(state, write_len);
        self.request_mill();

        result
    }

    fn open_existing_or_new_inner(&self, state: &mut State, write_len: u64) -> Result<(), Error> {
        let candidate = self.eval_current_filename(state, write_len, false);

        // The wrap slot is always truncated rather than resumed.
        if self.options.max_sequence > 0 && state.curr_sequence >= self.options.max_sequence {
            return self.open_new(state, &candidate);
        }

        let info = match fs::metadata(&candidate) {
            Ok(info) => info,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return self.open_new(state, &candidate);
            }
            Err(source) => {
                return Err(Error::Stat {
                    path: PathBuf::from(candidate),
                    source,
                });
            }
        };

        if self.options.max_size > 0 && info.len() + write_len >= self.options.max_size {
            return self.rotate_locked(state);
        }

        match fs::OpenOptions::new().append(true).open(&candidate) {
            Ok(file) => {
                state.file = Some(file);
                state.size = info.len();

                Ok(())
            }
            // Resuming is best-effort; fall back to a fresh file.
            Err(_) => self.open_new(state, &candidate),
        }
    }

    fn open_new(&self, state: &mut State, filename: &str) -> Result<(), Error> {
        let path = Path::new(filename);

        if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|source| Error::CreateDir {
                path: dir.to_path_buf(),
                source,
            })?;
        }

        // Truncate deliberately: the path was either probed not to exist
        // or is the wrap slot being reused.
        let file = fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)
            .map_err(|source| Error::Open {
                path: path.to_path_buf(),
                source,
            })?;

        self.metrics.file_create.increment();
        tracing::debug!(path = %path.display(), "opened log file");

        state.file = Some(file);
        state.size = 0;

        Ok(())
    }

    // Decide the filename the next open should use, advancing the
    // rotation interval and the overflow suffix as required.
    fn eval_current_filename(
        &self,
        state: &mut State,
        write_len: u64,
        force_new_file: bool,
    ) -> String {
        let mut base_filename = state.curr_base_filename.clone();

        if state.curr_base_filename.is_empty() {
            state.curr_rotation_time = self.eval_rotation_time();
            base_filename = filename::base_filename(
                &self.pattern,
                self.options.clock.now(),
                state.curr_rotation_time,
            );
        } else if self.max_interval_secs > 0 {
            let rotation_time = self.eval_rotation_time();

            if state.curr_rotation_time != rotation_time {
                state.curr_rotation_time = rotation_time;
                base_filename =
                    filename::base_filename(&self.pattern, self.options.clock.now(), rotation_time);
            }
        }

        if base_filename != state.curr_base_filename {
            // A new interval resets the overflow suffix.
            state.curr_base_filename = base_filename;
            state.curr_sequence = 0;
        } else if force_new_file
            || (self.options.max_size > 0 && state.size + write_len > self.options.max_size)
        {
            let next = state.curr_sequence + 1;

            state.curr_sequence =
                if self.options.max_sequence > 0 && next > self.options.max_sequence {
                    self.options.max_sequence
                } else {
                    next
                };
        }

        let mut current = filename::sequenced(&state.curr_base_filename, state.curr_sequence);

        if force_new_file {
            // Probe for the first name not taken yet. At the sequence cap
            // the existing wrap slot is reused as-is.
            while fs::metadata(&current).is_ok() {
                if self.options.max_sequence > 0
                    && state.curr_sequence >= self.options.max_sequence
                {
                    break;
                }

                state.curr_sequence += 1;
                current = filename::sequenced(&state.curr_base_filename, state.curr_sequence);
            }
        }

        state.curr_filename = current.clone();

        current
    }

    fn eval_rotation_time(&self) -> i64 {
        let now = self.options.clock.now();

        if self.max_interval_secs <= 0 {
            // Interval rotation disabled: pin the expansion instant so
            // the base filename stays stable.
            return now.timestamp();
        }

        filename::rotation_time(now.timestamp(), self.tz_offset_secs, self.max_interval_secs)
    }

    fn request_mill(&self) {
        let _ = self.mill_tx.try_send(());
    }
}
