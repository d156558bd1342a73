use core::fmt;

/// Failure from [`Scheduler::create`](crate::Scheduler::create), the only
/// fallible operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Every control block in the pool is in use
    PoolExhausted { capacity: usize },
    /// Priority outside `0..levels`
    InvalidPriority { priority: u8, levels: usize },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::PoolExhausted { capacity } => {
                write!(f, "task pool exhausted ({} slots)", capacity)
            }
            Error::InvalidPriority { priority, levels } => {
                write!(f, "priority {} out of range (0..{})", priority, levels)
            }
        }
    }
}

impl core::error::Error for Error {}
