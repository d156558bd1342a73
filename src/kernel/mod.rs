// Cooperative scheduler core
// Single context, no preemption. Units run to completion; ISRs signal
// readiness. WFI idles the CPU between drains.

mod bitmap;
mod defer;
pub mod idle;
mod queue;
pub mod scheduler;
pub mod task;

pub use idle::{run, run_for};
pub use scheduler::Scheduler;
pub use task::{Entry, TaskId, TaskState};
