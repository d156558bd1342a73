// coopsched: cooperative, priority-based run-to-completion scheduler
// for small embedded cores. No stacks per task, no allocation.
//
// port:    native word, find-highest-set-bit, WFI (target seam)
// config:  compile-time limits and validation
// error:   create() failures
// kernel:  bitmap index, ready queues, control blocks, drain loop

#![cfg_attr(not(test), no_std)]

pub mod config;
pub mod error;
/// Scheduler core. The ready table and priority bitmap stay internal:
///
/// ```compile_fail
/// use coopsched::kernel::queue::ReadyTable;
/// ```
///
/// ```compile_fail
/// use coopsched::kernel::bitmap::PrioBitmap;
/// ```
pub mod kernel;
pub mod port;

pub use config::{Config, groups_for};
pub use error::Error;
pub use kernel::{Entry, Scheduler, TaskId, TaskState, run, run_for};
