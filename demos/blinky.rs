// Blinky on the cooperative scheduler, hosted
//
// Two software timers at priority 1 count drains down and ready a
// one-shot toggle unit at priority 7 when they expire. Each drain is one
// timer tick: a timer readies itself again, and that request lands in
// the next drain.
//
// Logs at info by default; RUST_LOG=debug adds the scheduler's own records.

use core::cell::{Cell, RefCell};
use core::convert::Infallible;

use critical_section::Mutex;
use embedded_hal::digital::{ErrorType, OutputPin, StatefulOutputPin};
use log::info;
use static_cell::StaticCell;

use coopsched::{Scheduler, TaskId, run_for};

const TICKS: usize = 2000;
const FAST_PERIOD: u32 = 100;
const SLOW_PERIOD: u32 = 1000;

const TIMER_PRIORITY: u8 = 1;
const TOGGLE_PRIORITY: u8 = 7;

// Stand-in for a GPIO output; remembers its level and counts edges.
struct FakePin {
    high: bool,
    edges: u32,
}

impl ErrorType for FakePin {
    type Error = Infallible;
}

impl OutputPin for FakePin {
    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.edges += u32::from(!self.high);
        self.high = true;
        Ok(())
    }

    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.edges += u32::from(self.high);
        self.high = false;
        Ok(())
    }
}

impl StatefulOutputPin for FakePin {
    fn is_set_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.high)
    }

    fn is_set_low(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.high)
    }
}

struct Led {
    name: &'static str,
    pin: Mutex<RefCell<FakePin>>,
}

impl Led {
    const fn new(name: &'static str) -> Self {
        Self {
            name,
            pin: Mutex::new(RefCell::new(FakePin {
                high: false,
                edges: 0,
            })),
        }
    }

    fn edges(&self) -> u32 {
        critical_section::with(|cs| self.pin.borrow_ref(cs).edges)
    }
}

struct Countdown {
    period: u32,
    left: Mutex<Cell<u32>>,
    toggle: TaskId,
}

#[derive(Clone, Copy)]
enum Ctx {
    Timer(&'static Countdown),
    Toggle(&'static Led),
}

type Sched = Scheduler<Ctx, 4, 8>;

static SCHED: Sched = Scheduler::new();

static FAST_LED: Led = Led::new("fast");
static SLOW_LED: Led = Led::new("slow");

static FAST_TIMER: StaticCell<Countdown> = StaticCell::new();
static SLOW_TIMER: StaticCell<Countdown> = StaticCell::new();

fn timer(sched: &Sched, ctx: Ctx) {
    let Ctx::Timer(countdown) = ctx else {
        return;
    };

    let expired = critical_section::with(|cs| {
        let left = countdown.left.borrow(cs);
        let next = left.get() - 1;
        left.set(if next == 0 { countdown.period } else { next });
        next == 0
    });
    if expired {
        sched.ready(countdown.toggle);
    }

    // keep ticking; this lands in the next drain
    if let Some(me) = sched.current() {
        sched.ready(me);
    }
}

fn toggle(sched: &Sched, ctx: Ctx) {
    let Ctx::Toggle(led) = ctx else {
        return;
    };

    let level = critical_section::with(|cs| {
        let mut pin = led.pin.borrow_ref_mut(cs);
        let _ = pin.toggle();
        pin.is_set_high().unwrap_or(false)
    });
    info!("{} led {}", led.name, if level { "on" } else { "off" });
    sched.done();
}

fn spawn_blinker(
    cell: &'static StaticCell<Countdown>,
    led: &'static Led,
    period: u32,
) -> Result<(), coopsched::Error> {
    let toggle_id = SCHED.create(toggle, Ctx::Toggle(led), TOGGLE_PRIORITY)?;
    let countdown: &'static Countdown = cell.init(Countdown {
        period,
        left: Mutex::new(Cell::new(period)),
        toggle: toggle_id,
    });
    let timer_id = SCHED.create(timer, Ctx::Timer(countdown), TIMER_PRIORITY)?;
    SCHED.ready(timer_id);
    Ok(())
}

fn main() -> Result<(), coopsched::Error> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    info!("blinky: {}", SCHED.config());

    spawn_blinker(&FAST_TIMER, &FAST_LED, FAST_PERIOD)?;
    spawn_blinker(&SLOW_TIMER, &SLOW_LED, SLOW_PERIOD)?;

    let drains = run_for(&SCHED, TICKS);
    info!(
        "blinky: {} drains, fast led {} edges, slow led {} edges",
        drains,
        FAST_LED.edges(),
        SLOW_LED.edges()
    );
    Ok(())
}
