//! Background Jobs Module
//!
//! Jobs executed by the job scheduler service, independent of user
//! requests:
//!
//! - `morning_brief_job` - predictions for every ticker, broadcast at open
//! - `evening_brief_job` - realized outcomes vs predictions after close
//! - `weekly_digest_job` - per-ticker accuracy summary on Sundays
//! - `signal_watcher_job` - direction flips and filing-sentiment spikes
//!
//! Jobs are idempotent: each delivery is keyed through the sent-alerts
//! dedup table, so a re-run within the cooldown sends nothing twice.

pub mod evening_brief_job;
pub mod morning_brief_job;
pub mod signal_watcher_job;
pub mod weekly_digest_job;
