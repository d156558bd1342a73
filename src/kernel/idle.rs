// Superloop helpers
//
// schedule() drains and returns; the application loop calls it again
// whenever an interrupt may have readied work. Between drains the core
// sleeps in WFI, woken by the next ISR.

use super::scheduler::Scheduler;

/// The canonical main loop: drain, sleep until an interrupt, repeat.
pub fn run<C: Copy, const N: usize, const P: usize, const G: usize>(
    sched: &Scheduler<C, N, P, G>,
) -> ! {
    loop {
        sched.schedule();
        sched.sleep_until_ready();
    }
}

/// Run at most `drains` drain/sleep rounds, stopping early once a drain
/// leaves nothing ready. Returns the number of drains performed.
///
/// Useful for hosts and tests where the loop must end.
pub fn run_for<C: Copy, const N: usize, const P: usize, const G: usize>(
    sched: &Scheduler<C, N, P, G>,
    drains: usize,
) -> usize {
    for done in 1..=drains {
        sched.schedule();
        if sched.is_empty() {
            return done;
        }
    }
    drains
}
