//! Per-script fixes for kernel calls that shipped games make incorrectly.
//!
//! A workaround is keyed by where the call happens (script, object, method)
//! and optionally narrowed to a room and a local call offset.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::version::GameId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkaroundSolution {
    /// Skip the call and leave the accumulator alone.
    Ignore,
    /// Call the function even though the arguments do not match.
    StillCall,
    /// Skip the call and return this value.
    Fake(u16),
    /// Replace one argument before the signature is checked.
    Substitute { argument: usize, value: u16 },
}

impl WorkaroundSolution {
    pub fn is_substitute(self) -> bool {
        matches!(self, WorkaroundSolution::Substitute { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WorkaroundEntry {
    pub game: GameId,
    pub room: Option<u16>,
    pub script: u16,
    pub object: &'static str,
    pub method: &'static str,
    pub local_call_offset: Option<u32>,
    pub solution: WorkaroundSolution,
}

impl WorkaroundEntry {
    fn applies_to(&self, origin: &CallOrigin) -> bool {
        self.game == origin.game
            && self.room.map_or(true, |room| room == origin.room)
            && self
                .local_call_offset
                .map_or(true, |offset| Some(offset) == origin.local_call_offset)
    }
}

/// Where a kernel call was issued from, as reported by the interpreter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallOrigin {
    pub game: GameId,
    #[serde(default)]
    pub room: u16,
    #[serde(default)]
    pub script: u16,
    #[serde(default)]
    pub object: String,
    #[serde(default)]
    pub method: String,
    #[serde(default)]
    pub local_call_offset: Option<u32>,
}

impl CallOrigin {
    pub fn new(game: GameId, room: u16, script: u16, object: &str, method: &str) -> Self {
        CallOrigin {
            game,
            room,
            script,
            object: object.to_string(),
            method: method.to_string(),
            local_call_offset: None,
        }
    }

    /// Origin used when nothing is known about the caller.
    pub fn unknown(game: GameId) -> Self {
        CallOrigin::new(game, 0, 0, "", "")
    }
}

impl fmt::Display for CallOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} room {} script {} {}::{}",
            self.game, self.room, self.script, self.object, self.method
        )?;
        if let Some(offset) = self.local_call_offset {
            write!(f, " local call 0x{offset:04x}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct WorkaroundKey<'a> {
    script: u16,
    object: &'a str,
    method: &'a str,
}

/// Immutable lookup over a function's workaround entries.
#[derive(Debug, Clone, Default)]
pub struct WorkaroundTable {
    by_site: HashMap<WorkaroundKey<'static>, Vec<WorkaroundEntry>>,
}

impl WorkaroundTable {
    pub fn new(entries: &[WorkaroundEntry]) -> Self {
        let mut by_site: HashMap<WorkaroundKey<'static>, Vec<WorkaroundEntry>> = HashMap::new();
        for entry in entries {
            let key = WorkaroundKey {
                script: entry.script,
                object: entry.object,
                method: entry.method,
            };
            by_site.entry(key).or_default().push(*entry);
        }
        WorkaroundTable { by_site }
    }

    pub fn is_empty(&self) -> bool {
        self.by_site.is_empty()
    }

    pub fn len(&self) -> usize {
        self.by_site.values().map(Vec::len).sum()
    }

    /// Entries that apply to `origin`, in table order.
    pub fn matching<'t>(
        &'t self,
        origin: &'t CallOrigin,
    ) -> impl Iterator<Item = &'t WorkaroundEntry> + 't {
        let key = WorkaroundKey {
            script: origin.script,
            object: origin.object.as_str(),
            method: origin.method.as_str(),
        };
        let map: &HashMap<WorkaroundKey<'_>, Vec<WorkaroundEntry>> = &self.by_site;
        map.get(&key)
            .into_iter()
            .flatten()
            .filter(move |entry| entry.applies_to(origin))
    }

    /// Argument replacements that apply to `origin`.
    pub fn substitutions<'t>(
        &'t self,
        origin: &'t CallOrigin,
    ) -> impl Iterator<Item = (usize, u16)> + 't {
        self.matching(origin)
            .filter_map(|entry| match entry.solution {
                WorkaroundSolution::Substitute { argument, value } => Some((argument, value)),
                _ => None,
            })
    }

    /// Entry that handles a signature mismatch at `origin`.
    pub fn on_mismatch<'t>(&'t self, origin: &'t CallOrigin) -> Option<&'t WorkaroundEntry> {
        self.matching(origin)
            .find(|entry| !entry.solution.is_substitute())
    }
}

/// Hoyle 1 rooms 1-3 call kAbs on an object while computing card positions.
pub const ABS_WORKAROUNDS: &[WorkaroundEntry] = &[
    WorkaroundEntry {
        game: GameId::Hoyle1,
        room: Some(1),
        script: 1,
        object: "room1",
        method: "doit",
        local_call_offset: None,
        solution: WorkaroundSolution::Fake(0x3e9),
    },
    WorkaroundEntry {
        game: GameId::Hoyle1,
        room: Some(2),
        script: 2,
        object: "room2",
        method: "doit",
        local_call_offset: None,
        solution: WorkaroundSolution::Fake(0x3e9),
    },
    WorkaroundEntry {
        game: GameId::Hoyle1,
        room: Some(3),
        script: 3,
        object: "room3",
        method: "doit",
        local_call_offset: None,
        solution: WorkaroundSolution::Fake(0x3e9),
    },
];

/// Fades issued on sounds that were never initialized.
pub const DO_SOUND_FADE_WORKAROUNDS: &[WorkaroundEntry] = &[
    WorkaroundEntry {
        game: GameId::Kq5,
        room: Some(213),
        script: 989,
        object: "globalSound3",
        method: "fade",
        local_call_offset: None,
        solution: WorkaroundSolution::Ignore,
    },
    WorkaroundEntry {
        game: GameId::Kq6,
        room: Some(105),
        script: 989,
        object: "globalSound",
        method: "fade",
        local_call_offset: None,
        solution: WorkaroundSolution::Ignore,
    },
];

/// Delays computed from a temporary the script never writes.
pub const WAIT_WORKAROUNDS: &[WorkaroundEntry] = &[WorkaroundEntry {
    game: GameId::Lsl6,
    room: Some(820),
    script: 82,
    object: "",
    method: "export 0",
    local_call_offset: None,
    solution: WorkaroundSolution::Substitute {
        argument: 0,
        value: 0,
    },
}];

/// Distance checks against a node that was already disposed of.
pub const GET_DISTANCE_WORKAROUNDS: &[WorkaroundEntry] = &[WorkaroundEntry {
    game: GameId::Sq4,
    room: Some(520),
    script: 520,
    object: "robot",
    method: "doit",
    local_call_offset: Some(0x0034),
    solution: WorkaroundSolution::StillCall,
}];
