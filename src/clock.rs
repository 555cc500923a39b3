/*!
The [`Clock`] used to decide when rotation boundaries are crossed.

A clock yields the current wall-clock instant together with its timezone
offset. Interval truncation and pattern expansion both happen in that
offset, so a sink configured with a Tokyo clock rolls its files at Tokyo
midnight regardless of where the process runs.

The default is [`SystemClock`], which reads the system time in the local
zone. Tests can substitute a fixed or manually advanced clock.
*/

use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Local};

/**
A source of wall-clock time for the sink.
*/
pub trait Clock: Send + Sync {
    /**
    The current instant, carrying the clock's timezone offset.
    */
    fn now(&self) -> DateTime<FixedOffset>;
}

impl<'a, T: Clock + ?Sized> Clock for &'a T {
    fn now(&self) -> DateTime<FixedOffset> {
        (**self).now()
    }
}

impl<T: Clock + ?Sized> Clock for Box<T> {
    fn now(&self) -> DateTime<FixedOffset> {
        (**self).now()
    }
}

impl<T: Clock + ?Sized> Clock for Arc<T> {
    fn now(&self) -> DateTime<FixedOffset> {
        (**self).now()
    }
}

/**
The default [`Clock`], reading the system time in the local zone.
*/
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<FixedOffset> {
        Local::now().fixed_offset()
    }
}
