//! Kernel call signatures.
//!
//! Kernel tables describe the arguments they accept with a compact string
//! such as `"i(i)(i)"` or `"[io]*"`:
//!
//! | char | meaning                                                  |
//! |------|----------------------------------------------------------|
//! | `0`  | null                                                     |
//! | `i`  | integer (null is an integer too)                         |
//! | `o`  | object                                                   |
//! | `r`  | reference                                                |
//! | `l`  | list                                                     |
//! | `n`  | node                                                     |
//! | `.`  | anything except an uninitialized value                   |
//! | `!`  | an invalid offset is acceptable (pointer types only)     |
//! | `[]` | either-or group, forms one argument                      |
//! | `()` | optional group, every argument inside is optional        |
//! | `*`  | the last argument may repeat                             |
//!
//! Inside an optional group all but the last argument "need more": if the
//! script passes one of them it must pass the next one too.

use std::fmt;
use std::ops::BitOr;

use thiserror::Error;

use crate::heap::{HeapInspect, RegKind, RegType};
use crate::reg::Reg;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TypeMask(u16);

impl TypeMask {
    pub const EMPTY: TypeMask = TypeMask(0);
    pub const NULL: TypeMask = TypeMask(0x01);
    pub const INTEGER: TypeMask = TypeMask(0x02);
    pub const UNINITIALIZED: TypeMask = TypeMask(0x04);
    pub const OBJECT: TypeMask = TypeMask(0x08);
    pub const REFERENCE: TypeMask = TypeMask(0x10);
    pub const LIST: TypeMask = TypeMask(0x20);
    pub const NODE: TypeMask = TypeMask(0x40);
    pub const ERROR: TypeMask = TypeMask(0x80);

    /// Every real type. Uninitialized values are never acceptable.
    pub const ANY: TypeMask = TypeMask(0x01 | 0x02 | 0x08 | 0x10 | 0x20 | 0x40);
    pub const POINTERS: TypeMask = TypeMask(0x08 | 0x10 | 0x20 | 0x40);

    pub const fn bits(self) -> u16 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn contains(self, other: TypeMask) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn intersects(self, other: TypeMask) -> bool {
        self.0 & other.0 != 0
    }

    pub const fn union(self, other: TypeMask) -> TypeMask {
        TypeMask(self.0 | other.0)
    }
}

impl BitOr for TypeMask {
    type Output = TypeMask;

    fn bitor(self, rhs: TypeMask) -> TypeMask {
        self.union(rhs)
    }
}

impl fmt::Display for TypeMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == TypeMask::ANY {
            return f.write_str(".");
        }
        let mut chars = String::new();
        if self.contains(TypeMask::NULL) && !self.contains(TypeMask::INTEGER) {
            chars.push('0');
        }
        for (mask, ch) in [
            (TypeMask::INTEGER, 'i'),
            (TypeMask::OBJECT, 'o'),
            (TypeMask::REFERENCE, 'r'),
            (TypeMask::LIST, 'l'),
            (TypeMask::NODE, 'n'),
        ] {
            if self.contains(mask) {
                chars.push(ch);
            }
        }
        f.write_str(&chars)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SigEntry {
    pub types: TypeMask,
    pub allow_invalid: bool,
    pub optional: bool,
    pub needs_more: bool,
    pub more_may_follow: bool,
}

impl SigEntry {
    pub const fn required(types: TypeMask) -> Self {
        SigEntry {
            types,
            allow_invalid: false,
            optional: false,
            needs_more: false,
            more_may_follow: false,
        }
    }

    pub const fn optional(types: TypeMask) -> Self {
        SigEntry {
            optional: true,
            ..SigEntry::required(types)
        }
    }

    pub const fn variadic(types: TypeMask) -> Self {
        SigEntry {
            more_may_follow: true,
            ..SigEntry::required(types)
        }
    }

    pub fn accepts(&self, found: RegType) -> bool {
        if found.kind == RegKind::Uninitialized {
            return false;
        }
        if found.invalid_offset && !self.allow_invalid {
            return false;
        }
        if found.kind == RegKind::Error {
            // stale pointer into a freed segment
            return self.allow_invalid;
        }
        self.types.intersects(found.kind.mask())
    }

    fn validate(&self, index: usize) -> Result<(), SignatureError> {
        if self.types.is_empty() {
            return Err(SignatureError::EmptyEntry { index });
        }
        if self.types.intersects(TypeMask::UNINITIALIZED | TypeMask::ERROR) {
            return Err(SignatureError::ReservedType { index });
        }
        if self.needs_more && self.more_may_follow {
            return Err(SignatureError::ConflictingFlags {
                index,
                reason: "an argument cannot both need a follower and repeat",
            });
        }
        if self.needs_more && !self.optional {
            return Err(SignatureError::ConflictingFlags {
                index,
                reason: "only optional arguments can need a follower",
            });
        }
        if self.allow_invalid && !self.types.intersects(TypeMask::POINTERS) {
            return Err(SignatureError::InvalidWithoutPointer { index });
        }
        Ok(())
    }
}

impl fmt::Display for SigEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let types = self.types.to_string();
        let bang = if self.allow_invalid { "!" } else { "" };
        if types.len() > 1 || self.allow_invalid {
            write!(f, "[{types}{bang}]")
        } else {
            f.write_str(&types)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    #[error("unknown character '{ch}' at position {position}")]
    UnknownChar { ch: char, position: usize },
    #[error("'{ch}' at position {position} cannot be nested")]
    Nested { ch: char, position: usize },
    #[error("'{ch}' at position {position} has no opening bracket")]
    Unbalanced { ch: char, position: usize },
    #[error("'{ch}' is never closed")]
    Unterminated { ch: char },
    #[error("bracket group closing at position {position} holds no type")]
    EmptyGroup { position: usize },
    #[error("type '{ch}' specified twice for one argument at position {position}")]
    DuplicateType { ch: char, position: usize },
    #[error("required argument at position {position} follows optional ones")]
    RequiredAfterOptional { position: usize },
    #[error("'*' at position {position} must follow a type")]
    RepeatWithoutType { position: usize },
    #[error("'*' at position {position} may only mark the last argument")]
    RepeatNotLast { position: usize },
    #[error("argument {index} accepts no types")]
    EmptyEntry { index: usize },
    #[error("argument {index} names a type that is only used for comparisons")]
    ReservedType { index: usize },
    #[error("argument {index}: {reason}")]
    ConflictingFlags { index: usize, reason: &'static str },
    #[error("argument {index}: '!' needs a pointer type next to it")]
    InvalidWithoutPointer { index: usize },
    #[error("required argument {index} follows optional ones")]
    RequiredEntryAfterOptional { index: usize },
}

/// Why an argument list was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureMismatch {
    #[error("argument {position} is uninitialized")]
    Uninitialized { position: usize },
    #[error("argument {position}: expected {expected}, found {found}")]
    TypeMismatch {
        position: usize,
        expected: SigEntry,
        found: RegType,
    },
    #[error("{given} arguments given, at most {accepted} accepted")]
    TooManyArguments { accepted: usize, given: usize },
    #[error("{given} arguments given, at least {required} required")]
    NotEnoughArguments { required: usize, given: usize },
    #[error("argument {position} must be followed by another argument")]
    MissingFollower { position: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    entries: Vec<SigEntry>,
}

impl Signature {
    /// Builds a signature from hand-made entries, rejecting flag
    /// combinations that can never be satisfied.
    pub fn from_entries(entries: Vec<SigEntry>) -> Result<Self, SignatureError> {
        let mut seen_optional = false;
        for (index, entry) in entries.iter().enumerate() {
            entry.validate(index)?;
            if entry.optional {
                seen_optional = true;
            } else if seen_optional {
                return Err(SignatureError::RequiredEntryAfterOptional { index });
            }
        }
        Ok(Signature { entries })
    }

    pub fn parse(text: &str) -> Result<Self, SignatureError> {
        SignatureParser::default().parse(text)
    }

    pub fn entries(&self) -> &[SigEntry] {
        &self.entries
    }

    /// Arguments that must always be present.
    pub fn required_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| !entry.optional && !entry.more_may_follow)
            .count()
    }

    pub fn matches<H: HeapInspect + ?Sized>(&self, heap: &H, args: &[Reg]) -> bool {
        self.check(heap, args).is_ok()
    }

    pub fn check<H: HeapInspect + ?Sized>(
        &self,
        heap: &H,
        args: &[Reg],
    ) -> Result<(), SignatureMismatch> {
        let mut index = 0;
        let mut awaiting_follower = None;

        for (position, &arg) in args.iter().enumerate() {
            let found = heap.classify(arg);
            if found.kind == RegKind::Uninitialized {
                return Err(SignatureMismatch::Uninitialized { position });
            }

            loop {
                let Some(entry) = self.entries.get(index) else {
                    return Err(SignatureMismatch::TooManyArguments {
                        accepted: position,
                        given: args.len(),
                    });
                };

                if entry.accepts(found) {
                    awaiting_follower = entry.needs_more.then_some(position);
                    if !entry.more_may_follow {
                        index += 1;
                    }
                    break;
                }

                // a repeating run ends at the first argument it rejects
                if entry.more_may_follow && index + 1 < self.entries.len() {
                    index += 1;
                    continue;
                }

                return Err(SignatureMismatch::TypeMismatch {
                    position,
                    expected: *entry,
                    found,
                });
            }
        }

        if let Some(position) = awaiting_follower {
            return Err(SignatureMismatch::MissingFollower { position });
        }

        let satisfied = self.entries[index.min(self.entries.len())..]
            .iter()
            .all(|entry| entry.optional || entry.more_may_follow);
        if !satisfied {
            return Err(SignatureMismatch::NotEnoughArguments {
                required: self.required_count(),
                given: args.len(),
            });
        }

        Ok(())
    }

    /// Multi-line description of a call for the debug log.
    pub fn debug_report<H: HeapInspect + ?Sized>(&self, heap: &H, args: &[Reg]) -> String {
        let mut report = format!("signature: \"{self}\"\n");
        if args.is_empty() {
            report.push_str("  (no arguments)\n");
        }
        for (position, &arg) in args.iter().enumerate() {
            let found = heap.classify(arg);
            let expected = self.expected_at(position);
            let verdict = match expected {
                Some(entry) if entry.accepts(found) => "ok",
                Some(_) => "MISMATCH",
                None => "EXTRA",
            };
            report.push_str(&format!(
                "  [{position}] {arg} {:<14} expected {:<8} {verdict}\n",
                found.to_string(),
                expected
                    .map(|entry| entry.to_string())
                    .unwrap_or_else(|| String::from("-")),
            ));
        }
        if let Err(mismatch) = self.check(heap, args) {
            report.push_str(&format!("  => {mismatch}\n"));
        }
        report
    }

    fn expected_at(&self, position: usize) -> Option<&SigEntry> {
        self.entries.get(position).or_else(|| {
            self.entries
                .last()
                .filter(|entry| entry.more_may_follow)
        })
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut in_group = false;
        for entry in &self.entries {
            if entry.optional && !in_group {
                f.write_str("(")?;
                in_group = true;
            }
            write!(f, "{entry}")?;
            if entry.more_may_follow {
                f.write_str("*")?;
            }
            if entry.optional && !entry.needs_more {
                f.write_str(")")?;
                in_group = false;
            }
        }
        Ok(())
    }
}

#[derive(Default)]
struct SignatureParser {
    entries: Vec<SigEntry>,
    pending: Option<SigEntry>,
    /// Type characters already given for the pending entry.
    seen: Vec<char>,
    either_or: bool,
    group_has_type: bool,
    optional: bool,
    optional_has_type: bool,
    had_optional: bool,
}

impl SignatureParser {
    fn parse(mut self, text: &str) -> Result<Signature, SignatureError> {
        let chars: Vec<char> = text.chars().collect();
        for (position, &ch) in chars.iter().enumerate() {
            match ch {
                '[' => {
                    if self.either_or {
                        return Err(SignatureError::Nested { ch, position });
                    }
                    self.flush(self.optional);
                    self.either_or = true;
                    self.group_has_type = false;
                }
                ']' => {
                    if !self.either_or {
                        return Err(SignatureError::Unbalanced { ch, position });
                    }
                    if !self.group_has_type {
                        return Err(SignatureError::EmptyGroup { position });
                    }
                    self.either_or = false;
                }
                '(' => {
                    if self.optional || self.either_or {
                        return Err(SignatureError::Nested { ch, position });
                    }
                    self.flush(false);
                    self.optional = true;
                    self.optional_has_type = false;
                }
                ')' => {
                    if !self.optional {
                        return Err(SignatureError::Unbalanced { ch, position });
                    }
                    if self.either_or {
                        return Err(SignatureError::Unterminated { ch: '[' });
                    }
                    if !self.optional_has_type {
                        return Err(SignatureError::EmptyGroup { position });
                    }
                    self.flush(false);
                    self.optional = false;
                    self.had_optional = true;
                }
                '*' => {
                    if self.either_or {
                        return Err(SignatureError::Nested { ch, position });
                    }
                    let rest: String = chars[position + 1..].iter().collect();
                    let last = rest.is_empty() || (self.optional && rest == ")");
                    if !last {
                        return Err(SignatureError::RepeatNotLast { position });
                    }
                    let Some(pending) = self.pending.as_mut() else {
                        return Err(SignatureError::RepeatWithoutType { position });
                    };
                    pending.more_may_follow = true;
                }
                '0' | 'i' | 'o' | 'r' | 'l' | 'n' | '.' | '!' => {
                    if self.had_optional && !self.optional {
                        return Err(SignatureError::RequiredAfterOptional { position });
                    }
                    if !self.either_or {
                        self.flush(self.optional);
                    }
                    self.add_type(ch, position)?;
                    self.group_has_type = true;
                    if self.optional {
                        self.optional_has_type = true;
                    }
                }
                _ => return Err(SignatureError::UnknownChar { ch, position }),
            }
        }

        if self.either_or {
            return Err(SignatureError::Unterminated { ch: '[' });
        }
        if self.optional {
            return Err(SignatureError::Unterminated { ch: '(' });
        }
        self.flush(false);
        Signature::from_entries(self.entries)
    }

    fn add_type(&mut self, ch: char, position: usize) -> Result<(), SignatureError> {
        if self.seen.contains(&ch) {
            return Err(SignatureError::DuplicateType { ch, position });
        }
        self.seen.push(ch);
        let optional = self.optional;
        let entry = self.pending.get_or_insert(SigEntry {
            optional,
            ..SigEntry::required(TypeMask::EMPTY)
        });

        let added = match ch {
            '0' => TypeMask::NULL,
            'i' => TypeMask::INTEGER | TypeMask::NULL,
            'o' => TypeMask::OBJECT,
            'r' => TypeMask::REFERENCE,
            'l' => TypeMask::LIST,
            'n' => TypeMask::NODE,
            '.' => TypeMask::ANY,
            _ => {
                entry.allow_invalid = true;
                return Ok(());
            }
        };
        entry.types = entry.types | added;
        Ok(())
    }

    /// Emits the pending entry. `followed` marks an optional entry that has
    /// another argument after it in the same group.
    fn flush(&mut self, followed: bool) {
        self.seen.clear();
        if let Some(mut entry) = self.pending.take() {
            if entry.optional && followed {
                entry.needs_more = true;
            }
            self.entries.push(entry);
        }
    }
}
