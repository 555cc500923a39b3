use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use crossbeam_channel::{select, Receiver};

use crate::Core;

const DRAIN_WINDOW: Duration = Duration::from_millis(10);
const BACKLOG_DRAIN_WINDOW: Duration = Duration::from_millis(100);
const BACKLOG_THRESHOLD: usize = 100;

// The buffered-mode worker: drains the record channel into the
// synchronous write path until shutdown, then performs a bounded drain
// of whatever is left.
pub(crate) fn run(core: Arc<Core>, records: Receiver<Vec<u8>>, quit: Receiver<()>) {
    loop {
        select! {
            recv(records) -> record => match record {
                Ok(record) => write(&core, &record),
                Err(_) => return,
            },
            recv(quit) -> _ => {
                drain(&core, &records);
                return;
            }
        }
    }
}

fn drain(core: &Core, records: &Receiver<Vec<u8>>) {
    let window = if records.len() > BACKLOG_THRESHOLD {
        BACKLOG_DRAIN_WINDOW
    } else {
        DRAIN_WINDOW
    };

    let deadline = Instant::now() + window;
    while let Ok(record) = records.recv_deadline(deadline) {
        write(core, &record);
    }
}

fn write(core: &Core, record: &[u8]) {
    if let Err(err) = core.write_sync(record) {
        tracing::warn!(error = %err, "buffered write failed");
    }
}
