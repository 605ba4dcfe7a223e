use std::time::Duration;

use log::{debug, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::kernel::KernelReturn;
use crate::reg::Reg;
use crate::state::EngineState;
use crate::version::SciVersion;

/// Interpreter ticks per second.
pub const TICKS_PER_SECOND: u64 = 60;

/// Slice used while blocking in kWait so input keeps flowing.
const WAIT_SLICE: Duration = Duration::from_millis(10);

fn ms_to_ticks(ms: u64) -> u64 {
    ms * TICKS_PER_SECOND / 1000
}

fn ticks_to_ms(ticks: u64) -> u64 {
    ticks * 1000 / TICKS_PER_SECOND
}

/// `Random(from, to)` returns a number in the inclusive range; with one
/// argument it reseeds, with three it reports the seed (always null).
pub fn k_random(state: &mut EngineState, args: &[Reg]) -> KernelReturn {
    match args {
        [seed] => {
            state.rng = StdRng::seed_from_u64(seed.to_u16() as u64);
            KernelReturn::Value(Reg::NULL)
        }
        [from, to] => {
            let (from, to) = (from.to_u16(), to.to_u16());
            // reversed ranges return the upper bound
            if from > to {
                return KernelReturn::Value(Reg::int(to));
            }
            // (0, 0xFFFF) wraps to an empty span and always yields `from`
            let span = (to - from).wrapping_add(1);
            let picked = if span == 0 {
                from
            } else {
                from + state.rng.gen_range(0..span)
            };
            KernelReturn::Value(Reg::int(picked))
        }
        _ => KernelReturn::Value(Reg::NULL),
    }
}

const GET_TIME_TICKS: u16 = 0;
const GET_TIME_12_HOUR: u16 = 1;
const GET_TIME_24_HOUR: u16 = 2;
const GET_TIME_DATE: u16 = 3;

pub fn k_get_time(state: &mut EngineState, args: &[Reg]) -> KernelReturn {
    let mode = args.first().map_or(GET_TIME_TICKS, |reg| reg.to_u16());
    if state.version == SciVersion::Sci0Early && mode > GET_TIME_12_HOUR {
        warn!("kGetTime mode {mode} does not exist before late SCI0");
        return KernelReturn::Value(Reg::NULL);
    }

    let time = state.platform.local_time();
    let (hour, minute, second) = (time.hour as u16, time.minute as u16, time.second as u16);
    let packed = match mode {
        GET_TIME_TICKS => ms_to_ticks(state.platform.ticks()) as u16,
        GET_TIME_12_HOUR => ((hour % 12) << 12) | (minute << 6) | second,
        GET_TIME_24_HOUR => (hour << 11) | (minute << 5) | (second >> 1),
        GET_TIME_DATE => {
            let base_year = if state.version <= SciVersion::Sci0Late {
                1920
            } else {
                1980
            };
            let years = (time.year as i32 - base_year) as u16 & 0x7f;
            time.day as u16 | ((time.month as u16) << 5) | (years << 9)
        }
        other => {
            warn!("kGetTime: unknown mode {other}");
            0
        }
    };
    KernelReturn::Value(Reg::int(packed))
}

/// Blocks until `ticks` have passed since the previous call and returns
/// the ticks that actually elapsed.
pub fn k_wait(state: &mut EngineState, args: &[Reg]) -> KernelReturn {
    let ticks = args.first().map_or(0, |reg| reg.to_u16()) as u64;
    let deadline = state.last_wait_ms + ticks_to_ms(ticks);

    loop {
        if state.pump_events() {
            debug!("quit requested during kWait");
            return KernelReturn::Quit;
        }
        let now = state.platform.ticks();
        if now >= deadline {
            break;
        }
        let remaining = Duration::from_millis(deadline - now);
        state.platform.sleep(remaining.min(WAIT_SLICE));
    }

    let now = state.platform.ticks();
    let elapsed = ms_to_ticks(now.saturating_sub(state.last_wait_ms));
    state.last_wait_ms = now;
    KernelReturn::Value(Reg::int(elapsed.min(u16::MAX as u64) as u16))
}

pub fn k_restart_game(state: &mut EngineState, _: &[Reg]) -> KernelReturn {
    state.restarting = true;
    KernelReturn::Restart
}

/// Reports whether the game was restarted; an argument of zero clears the
/// flag.
pub fn k_game_is_restarting(state: &mut EngineState, args: &[Reg]) -> KernelReturn {
    let was_restarting = state.restarting;
    if let Some(flag) = args.first() {
        if flag.to_u16() == 0 {
            state.restarting = false;
        }
    }
    KernelReturn::Value(Reg::int(was_restarting as u16))
}
