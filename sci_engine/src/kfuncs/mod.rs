//! Native kernel functions and the kernel map that names them.

pub mod lists;
pub mod math;
pub mod sound;
pub mod system;

use crate::kernel::{EntryPoint, KernelMapEntry, KernelSubEntry};
use crate::state::EngineState;
use crate::version::{SOUND_SCI0, SOUND_SCI1};
use crate::workarounds::{
    ABS_WORKAROUNDS, DO_SOUND_FADE_WORKAROUNDS, GET_DISTANCE_WORKAROUNDS, WAIT_WORKAROUNDS,
};

use EntryPoint::{Empty, Native, Unimplemented};

type Entry = KernelMapEntry<EngineState>;
type Sub = KernelSubEntry<EngineState>;

static DO_SOUND: &[Sub] = &[
    Sub::new(SOUND_SCI0, 0, "DoSoundInit", Native(sound::k_do_sound_init), Some("o")),
    Sub::new(SOUND_SCI0, 1, "DoSoundPlay", Native(sound::k_do_sound_play), Some("o")),
    Sub::new(SOUND_SCI0, 2, "DoSoundRestore", Empty, Some("(o)")),
    Sub::new(SOUND_SCI0, 3, "DoSoundDispose", Native(sound::k_do_sound_dispose), Some("o")),
    Sub::new(SOUND_SCI0, 4, "DoSoundMute", Native(sound::k_do_sound_mute), Some("(i)")),
    Sub::new(SOUND_SCI0, 5, "DoSoundStop", Native(sound::k_do_sound_stop), Some("o")),
    Sub::new(SOUND_SCI0, 6, "DoSoundPause", Native(sound::k_do_sound_pause), Some("i")),
    Sub::new(SOUND_SCI0, 7, "DoSoundResumeAfterRestore", Empty, Some("")),
    Sub::new(SOUND_SCI0, 8, "DoSoundMasterVolume", Native(sound::k_do_sound_master_volume), Some("(i)")),
    Sub::new(SOUND_SCI0, 9, "DoSoundUpdate", Native(sound::k_do_sound_update), Some("o")),
    Sub::new(SOUND_SCI0, 10, "DoSoundFade", Native(sound::k_do_sound_fade), Some("o")),
    Sub::new(SOUND_SCI0, 11, "DoSoundGetPolyphony", Native(sound::k_do_sound_get_polyphony), Some("")),
    Sub::new(SOUND_SCI0, 12, "DoSoundStopAll", Native(sound::k_do_sound_stop_all), Some("")),
    Sub::new(SOUND_SCI1, 0, "DoSoundMasterVolume", Native(sound::k_do_sound_master_volume), None),
    Sub::new(SOUND_SCI1, 1, "DoSoundMute", Native(sound::k_do_sound_mute), None),
    Sub::new(SOUND_SCI1, 2, "DoSoundRestore", Empty, None),
    Sub::new(SOUND_SCI1, 3, "DoSoundGetPolyphony", Native(sound::k_do_sound_get_polyphony), None),
    Sub::new(SOUND_SCI1, 4, "DoSoundUpdate", Native(sound::k_do_sound_update), None),
    Sub::new(SOUND_SCI1, 5, "DoSoundInit", Native(sound::k_do_sound_init), None),
    Sub::new(SOUND_SCI1, 6, "DoSoundDispose", Native(sound::k_do_sound_dispose), None),
    Sub::new(SOUND_SCI1, 7, "DoSoundPlay", Native(sound::k_do_sound_play), Some("o(i)")),
    Sub::new(SOUND_SCI1, 8, "DoSoundStop", Native(sound::k_do_sound_stop), None),
    Sub::new(SOUND_SCI1, 9, "DoSoundPause", Native(sound::k_do_sound_pause), Some("[o0]i")),
    Sub::new(SOUND_SCI1, 10, "DoSoundFade", Native(sound::k_do_sound_fade), Some("oiiii"))
        .workarounds(DO_SOUND_FADE_WORKAROUNDS),
    Sub::new(SOUND_SCI1, 11, "DoSoundUpdateCues", Native(sound::k_do_sound_update_cues), Some("o")),
    Sub::new(SOUND_SCI1, 12, "DoSoundSendMidi", Unimplemented, Some("oiii")),
    Sub::new(SOUND_SCI1, 13, "DoSoundGlobalReverb", Native(sound::k_do_sound_global_reverb), Some("(i)")),
    Sub::new(SOUND_SCI1, 14, "DoSoundSetHold", Native(sound::k_do_sound_set_hold), Some("oi")),
    Sub::new(SOUND_SCI1, 15, "DoSoundDummy", Empty, Some("")),
];

/// Every kernel function this engine knows, by name. Numbers come from the
/// kernel name table of the running game.
pub static KERNEL_MAP: &[Entry] = &[
    Entry::new("Abs", Native(math::k_abs), Some("i")).workarounds(ABS_WORKAROUNDS),
    Entry::new("Sqrt", Native(math::k_sqrt), Some("i")),
    Entry::new("GetAngle", Native(math::k_get_angle), Some("iiii")),
    Entry::new("GetDistance", Native(math::k_get_distance), Some("ii(i)(i)(i)(i)"))
        .workarounds(GET_DISTANCE_WORKAROUNDS),
    Entry::new("SinMult", Native(math::k_sin_mult), Some("ii")),
    Entry::new("CosMult", Native(math::k_cos_mult), Some("ii")),
    Entry::new("Random", Native(system::k_random), Some("i(i)(i)")),
    Entry::new("GetTime", Native(system::k_get_time), Some("(i)")),
    Entry::new("Wait", Native(system::k_wait), Some("i")).workarounds(WAIT_WORKAROUNDS),
    Entry::new("RestartGame", Native(system::k_restart_game), Some("")),
    Entry::new("GameIsRestarting", Native(system::k_game_is_restarting), Some("(i)")),
    Entry::new("NewList", Native(lists::k_new_list), Some("")),
    Entry::new("DisposeList", Native(lists::k_dispose_list), Some("l")),
    Entry::new("NewNode", Native(lists::k_new_node), Some(".(.)")),
    Entry::new("FirstNode", Native(lists::k_first_node), Some("[l0]")),
    Entry::new("LastNode", Native(lists::k_last_node), Some("[l0]")),
    Entry::new("EmptyList", Native(lists::k_empty_list), Some("[l0]")),
    Entry::new("NextNode", Native(lists::k_next_node), Some("n")),
    Entry::new("PrevNode", Native(lists::k_prev_node), Some("n")),
    Entry::new("NodeValue", Native(lists::k_node_value), Some("[n0]")),
    Entry::new("AddAfter", Native(lists::k_add_after), Some("lnn(.)")),
    Entry::new("AddToFront", Native(lists::k_add_to_front), Some("ln(.)")),
    Entry::new("AddToEnd", Native(lists::k_add_to_end), Some("ln(.)")),
    Entry::new("FindKey", Native(lists::k_find_key), Some("l.")),
    Entry::new("DeleteKey", Native(lists::k_delete_key), Some("l.")),
    // always dispatched through a sub-function
    Entry::new("DoSound", Empty, None).sub_functions(DO_SOUND),
    // SCI1.1 replaced kSetSynonyms with a no-op
    Entry::new("Empty", Empty, Some("(.*)")),
];
