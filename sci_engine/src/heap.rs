use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::reg::{Reg, UNINITIALIZED_SEGMENT};
use crate::signature::TypeMask;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentKind {
    Script,
    Clones,
    Locals,
    Stack,
    DynMem,
    Hunk,
    Array,
    Lists,
    Nodes,
}

impl SegmentKind {
    /// Table segments address slots by index; the rest are byte buffers.
    pub fn is_table(self) -> bool {
        matches!(
            self,
            SegmentKind::Clones
                | SegmentKind::Hunk
                | SegmentKind::Array
                | SegmentKind::Lists
                | SegmentKind::Nodes
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Segment {
    pub kind: SegmentKind,
    #[serde(default)]
    pub size: u32,
    /// Offsets of objects inside a script buffer.
    #[serde(default)]
    pub objects: BTreeSet<u32>,
    /// Live entries of a table segment.
    #[serde(default)]
    pub slots: BTreeSet<u32>,
}

impl Segment {
    pub fn buffer(kind: SegmentKind, size: u32) -> Self {
        Segment {
            kind,
            size,
            objects: BTreeSet::new(),
            slots: BTreeSet::new(),
        }
    }

    pub fn table(kind: SegmentKind) -> Self {
        Segment::buffer(kind, 0)
    }

    pub fn is_valid_offset(&self, offset: u32) -> bool {
        if self.kind.is_table() {
            self.slots.contains(&offset)
        } else {
            offset < self.size
        }
    }
}

/// Closed set of register kinds as seen by the kernel boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RegKind {
    Null,
    Integer,
    Object,
    Reference,
    List,
    Node,
    Uninitialized,
    /// Pointer into a segment that does not exist.
    Error,
}

impl RegKind {
    pub fn mask(self) -> TypeMask {
        match self {
            RegKind::Null => TypeMask::NULL | TypeMask::INTEGER,
            RegKind::Integer => TypeMask::INTEGER,
            RegKind::Object => TypeMask::OBJECT,
            RegKind::Reference => TypeMask::REFERENCE,
            RegKind::List => TypeMask::LIST,
            RegKind::Node => TypeMask::NODE,
            RegKind::Uninitialized => TypeMask::UNINITIALIZED,
            RegKind::Error => TypeMask::ERROR,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            RegKind::Null => "null",
            RegKind::Integer => "integer",
            RegKind::Object => "object",
            RegKind::Reference => "reference",
            RegKind::List => "list",
            RegKind::Node => "node",
            RegKind::Uninitialized => "uninitialized",
            RegKind::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RegType {
    pub kind: RegKind,
    pub invalid_offset: bool,
}

impl RegType {
    pub const fn of(kind: RegKind) -> Self {
        RegType {
            kind,
            invalid_offset: false,
        }
    }
}

impl fmt::Display for RegType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind.label())?;
        if self.invalid_offset {
            f.write_str(" (invalid)")?;
        }
        Ok(())
    }
}

/// Anything that can tell the kernel what a register points at.
pub trait HeapInspect {
    fn classify(&self, reg: Reg) -> RegType;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SegmentTable {
    #[serde(default)]
    segments: BTreeMap<u16, Segment>,
}

impl SegmentTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: u16, segment: Segment) -> Option<Segment> {
        self.segments.insert(id, segment)
    }

    /// Adds `segment` under the lowest free id.
    pub fn allocate(&mut self, segment: Segment) -> u16 {
        let id = (1..UNINITIALIZED_SEGMENT)
            .find(|id| !self.segments.contains_key(id))
            .unwrap_or(UNINITIALIZED_SEGMENT - 1);
        self.segments.insert(id, segment);
        id
    }

    pub fn segment(&self, id: u16) -> Option<&Segment> {
        self.segments.get(&id)
    }

    pub fn segment_mut(&mut self, id: u16) -> Option<&mut Segment> {
        self.segments.get_mut(&id)
    }

    pub fn first_of_kind(&self, kind: SegmentKind) -> Option<u16> {
        self.segments
            .iter()
            .find(|(_, segment)| segment.kind == kind)
            .map(|(id, _)| *id)
    }

    pub fn add_object(&mut self, reg: Reg) -> bool {
        match self.segments.get_mut(&reg.segment) {
            Some(segment) if segment.kind == SegmentKind::Script => {
                segment.objects.insert(reg.offset);
                true
            }
            Some(segment) if segment.kind == SegmentKind::Clones => {
                segment.slots.insert(reg.offset);
                true
            }
            _ => false,
        }
    }

    pub fn claim_slot(&mut self, reg: Reg) -> bool {
        match self.segments.get_mut(&reg.segment) {
            Some(segment) if segment.kind.is_table() => segment.slots.insert(reg.offset),
            _ => false,
        }
    }

    pub fn release_slot(&mut self, reg: Reg) -> bool {
        match self.segments.get_mut(&reg.segment) {
            Some(segment) if segment.kind.is_table() => segment.slots.remove(&reg.offset),
            _ => false,
        }
    }
}

impl HeapInspect for SegmentTable {
    fn classify(&self, reg: Reg) -> RegType {
        if reg.segment == 0 {
            // Numbers are 16 bits wide; anything above would alias after `to_u16`.
            if reg.offset > 0xFFFF {
                return RegType {
                    kind: RegKind::Integer,
                    invalid_offset: true,
                };
            }
            return RegType::of(if reg.offset == 0 {
                RegKind::Null
            } else {
                RegKind::Integer
            });
        }
        if reg.is_uninitialized() {
            return RegType::of(RegKind::Uninitialized);
        }

        let Some(segment) = self.segments.get(&reg.segment) else {
            return RegType::of(RegKind::Error);
        };

        let kind = match segment.kind {
            SegmentKind::Script if segment.objects.contains(&reg.offset) => RegKind::Object,
            SegmentKind::Script => RegKind::Reference,
            SegmentKind::Clones => RegKind::Object,
            SegmentKind::Locals
            | SegmentKind::Stack
            | SegmentKind::DynMem
            | SegmentKind::Hunk
            | SegmentKind::Array => RegKind::Reference,
            SegmentKind::Lists => RegKind::List,
            SegmentKind::Nodes => RegKind::Node,
        };

        RegType {
            kind,
            invalid_offset: !segment.is_valid_offset(reg.offset),
        }
    }
}
