use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Segment id reserved for values read from never-written temporaries.
pub const UNINITIALIZED_SEGMENT: u16 = 0xFFFF;

/// A script register: segment/offset pair. Segment 0 holds plain numbers.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Reg {
    pub segment: u16,
    pub offset: u32,
}

impl Reg {
    pub const NULL: Reg = Reg::new(0, 0);

    pub const fn new(segment: u16, offset: u32) -> Self {
        Reg { segment, offset }
    }

    pub const fn int(value: u16) -> Self {
        Reg::new(0, value as u32)
    }

    pub const fn signed(value: i16) -> Self {
        Reg::new(0, value as u16 as u32)
    }

    pub const fn uninitialized() -> Self {
        Reg::new(UNINITIALIZED_SEGMENT, 0)
    }

    pub fn is_null(self) -> bool {
        self == Reg::NULL
    }

    pub fn is_number(self) -> bool {
        self.segment == 0
    }

    pub fn is_uninitialized(self) -> bool {
        self.segment == UNINITIALIZED_SEGMENT
    }

    pub fn is_pointer(self) -> bool {
        self.segment != 0 && !self.is_uninitialized()
    }

    pub fn to_u16(self) -> u16 {
        self.offset as u16
    }

    pub fn to_i16(self) -> i16 {
        self.offset as u16 as i16
    }
}

impl fmt::Display for Reg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04x}:{:04x}", self.segment, self.offset)
    }
}

static REG_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([0-9a-fA-F]{1,4}):([0-9a-fA-F]{1,8})$").expect("valid regex"));

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("'{0}' is not a register (expected ssss:oooo, a decimal integer, null or uninit)")]
pub struct ParseRegError(String);

/// Accepts the debugger notation (`0003:0010`), signed decimal integers,
/// `null` and `uninit`.
impl FromStr for Reg {
    type Err = ParseRegError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let trimmed = input.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "null" => return Ok(Reg::NULL),
            "uninit" | "uninitialized" => return Ok(Reg::uninitialized()),
            _ => {}
        }

        if let Some(caps) = REG_PATTERN.captures(trimmed) {
            let segment = u16::from_str_radix(&caps[1], 16)
                .map_err(|_| ParseRegError(input.to_string()))?;
            let offset = u32::from_str_radix(&caps[2], 16)
                .map_err(|_| ParseRegError(input.to_string()))?;
            return Ok(Reg::new(segment, offset));
        }

        if let Ok(value) = trimmed.parse::<i16>() {
            return Ok(Reg::signed(value));
        }
        if let Ok(value) = trimmed.parse::<u16>() {
            return Ok(Reg::int(value));
        }

        Err(ParseRegError(input.to_string()))
    }
}
