//! Sound bookkeeping behind kDoSound. No audio is produced; the registry
//! tracks what the scripts asked for so the sound objects they poll see
//! consistent state.

use std::collections::BTreeMap;

use log::{debug, warn};

use crate::kernel::KernelReturn;
use crate::reg::Reg;
use crate::state::EngineState;
use crate::version::SciVersion;

pub const MAX_VOLUME: u16 = 15;
/// Voices reported to the scripts (OPL2).
pub const POLYPHONY: u16 = 9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoundStatus {
    Initialized,
    Playing,
    Paused,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SoundEntry {
    pub status: SoundStatus,
    pub volume: u16,
    pub hold: u16,
}

#[derive(Debug, Clone)]
pub struct SoundRegistry {
    pub sounds: BTreeMap<Reg, SoundEntry>,
    pub master_volume: u16,
    pub muted: bool,
    pub reverb: u16,
}

impl Default for SoundRegistry {
    fn default() -> Self {
        SoundRegistry {
            sounds: BTreeMap::new(),
            master_volume: MAX_VOLUME,
            muted: false,
            reverb: 0,
        }
    }
}

impl SoundRegistry {
    fn entry(&mut self, object: Reg) -> &mut SoundEntry {
        self.sounds.entry(object).or_insert(SoundEntry {
            status: SoundStatus::Initialized,
            volume: MAX_VOLUME,
            hold: 0,
        })
    }

    pub fn status(&self, object: Reg) -> Option<SoundStatus> {
        self.sounds.get(&object).map(|sound| sound.status)
    }

    fn set_paused(&mut self, target: Option<Reg>, paused: bool) {
        for (object, sound) in self.sounds.iter_mut() {
            if target.is_some_and(|target| target != *object) {
                continue;
            }
            match (sound.status, paused) {
                (SoundStatus::Playing, true) => sound.status = SoundStatus::Paused,
                (SoundStatus::Paused, false) => sound.status = SoundStatus::Playing,
                _ => {}
            }
        }
    }
}

fn arg(args: &[Reg], index: usize) -> Option<Reg> {
    args.get(index).copied()
}

pub fn k_do_sound_init(state: &mut EngineState, args: &[Reg]) -> KernelReturn {
    if let Some(object) = arg(args, 0) {
        let sound = state.sound.entry(object);
        sound.status = SoundStatus::Initialized;
    }
    KernelReturn::Keep
}

/// SCI1 passes a second "restart" flag that the registry does not need.
pub fn k_do_sound_play(state: &mut EngineState, args: &[Reg]) -> KernelReturn {
    if let Some(object) = arg(args, 0) {
        if state.sound.status(object).is_none() {
            debug!("kDoSound(play): {object} was never initialized");
        }
        state.sound.entry(object).status = SoundStatus::Playing;
    }
    KernelReturn::Keep
}

pub fn k_do_sound_dispose(state: &mut EngineState, args: &[Reg]) -> KernelReturn {
    if let Some(object) = arg(args, 0) {
        if state.sound.sounds.remove(&object).is_none() {
            warn!("kDoSound(dispose): {object} is not a known sound");
        }
    }
    KernelReturn::Keep
}

/// Returns the previous mute state; an argument sets it.
pub fn k_do_sound_mute(state: &mut EngineState, args: &[Reg]) -> KernelReturn {
    let previous = state.sound.muted;
    if let Some(flag) = arg(args, 0) {
        state.sound.muted = flag.to_u16() != 0;
    }
    KernelReturn::Value(Reg::int(previous as u16))
}

pub fn k_do_sound_stop(state: &mut EngineState, args: &[Reg]) -> KernelReturn {
    if let Some(object) = arg(args, 0) {
        if let Some(sound) = state.sound.sounds.get_mut(&object) {
            sound.status = SoundStatus::Stopped;
        }
    }
    KernelReturn::Keep
}

/// SCI0: `Pause(flag)` for every sound. SCI1: `Pause(object, flag)` where a
/// null object means every sound.
pub fn k_do_sound_pause(state: &mut EngineState, args: &[Reg]) -> KernelReturn {
    let (target, flag) = match args {
        [flag] => (None, *flag),
        [object, flag, ..] => ((!object.is_null()).then_some(*object), *flag),
        [] => return KernelReturn::Keep,
    };
    state.sound.set_paused(target, flag.to_u16() != 0);
    KernelReturn::Keep
}

/// Returns the previous master volume; an argument sets it.
pub fn k_do_sound_master_volume(state: &mut EngineState, args: &[Reg]) -> KernelReturn {
    let previous = state.sound.master_volume;
    if let Some(volume) = arg(args, 0) {
        state.sound.master_volume = volume.to_u16().min(MAX_VOLUME);
    }
    KernelReturn::Value(Reg::int(previous))
}

pub fn k_do_sound_update(state: &mut EngineState, args: &[Reg]) -> KernelReturn {
    if let Some(object) = arg(args, 0) {
        if state.sound.status(object).is_none() {
            debug!("kDoSound(update): {object} is not a known sound");
        }
    }
    KernelReturn::Keep
}

/// SCI0 fades out and stops. SCI1 fades to `target` and stops only when
/// asked to.
pub fn k_do_sound_fade(state: &mut EngineState, args: &[Reg]) -> KernelReturn {
    let Some(object) = arg(args, 0) else {
        return KernelReturn::Keep;
    };
    let sci1 = state.version >= SciVersion::Sci1Egaonly;
    let target = if sci1 {
        arg(args, 1).map_or(0, |reg| reg.to_u16().min(MAX_VOLUME))
    } else {
        0
    };
    let stop = !sci1 || arg(args, 4).is_some_and(|reg| reg.to_u16() != 0);

    match state.sound.sounds.get_mut(&object) {
        Some(sound) => {
            sound.volume = target;
            if stop {
                sound.status = SoundStatus::Stopped;
            }
        }
        None => warn!("kDoSound(fade): {object} is not a known sound"),
    }
    KernelReturn::Keep
}

pub fn k_do_sound_get_polyphony(_: &mut EngineState, _: &[Reg]) -> KernelReturn {
    KernelReturn::Value(Reg::int(POLYPHONY))
}

pub fn k_do_sound_stop_all(state: &mut EngineState, _: &[Reg]) -> KernelReturn {
    for sound in state.sound.sounds.values_mut() {
        sound.status = SoundStatus::Stopped;
    }
    KernelReturn::Keep
}

pub fn k_do_sound_update_cues(state: &mut EngineState, args: &[Reg]) -> KernelReturn {
    k_do_sound_update(state, args)
}

pub fn k_do_sound_global_reverb(state: &mut EngineState, args: &[Reg]) -> KernelReturn {
    let previous = state.sound.reverb;
    if let Some(reverb) = arg(args, 0) {
        state.sound.reverb = reverb.to_u16();
    }
    KernelReturn::Value(Reg::int(previous))
}

pub fn k_do_sound_set_hold(state: &mut EngineState, args: &[Reg]) -> KernelReturn {
    if let (Some(object), Some(hold)) = (arg(args, 0), arg(args, 1)) {
        state.sound.entry(object).hold = hold.to_u16();
    }
    KernelReturn::Keep
}
