//! Actor running the probe cycles
//!
//! ```text
//!   SchedulerHandle ──commands──▶ ProbeSchedulerActor
//!                                        │ every interval
//!                          ┌─────────────┼─────────────┐
//!                          ▼             ▼             ▼
//!                     task(target1) task(target2) task(targetN)
//!                     probe → parse → publish (serialized by Publisher)
//! ```

pub mod messages;
pub mod scheduler;
