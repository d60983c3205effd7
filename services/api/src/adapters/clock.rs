//! services/api/src/adapters/clock.rs
//!
//! The wall clock behind the `Clock` port.

use bookflow_core::ports::Clock;
use chrono::Utc;

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}
