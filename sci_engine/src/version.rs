use std::fmt;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Interpreter generations that change kernel numbering or call shapes.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum SciVersion {
    Sci0Early,
    Sci0Late,
    Sci01,
    Sci1Egaonly,
    Sci1Early,
    Sci1Middle,
    Sci1Late,
    Sci11,
}

impl SciVersion {
    pub const ALL: [SciVersion; 8] = [
        SciVersion::Sci0Early,
        SciVersion::Sci0Late,
        SciVersion::Sci01,
        SciVersion::Sci1Egaonly,
        SciVersion::Sci1Early,
        SciVersion::Sci1Middle,
        SciVersion::Sci1Late,
        SciVersion::Sci11,
    ];

    pub fn label(self) -> &'static str {
        match self {
            SciVersion::Sci0Early => "SCI0 (early)",
            SciVersion::Sci0Late => "SCI0 (late)",
            SciVersion::Sci01 => "SCI01",
            SciVersion::Sci1Egaonly => "SCI1 (EGA only)",
            SciVersion::Sci1Early => "SCI1 (early)",
            SciVersion::Sci1Middle => "SCI1 (middle)",
            SciVersion::Sci1Late => "SCI1 (late)",
            SciVersion::Sci11 => "SCI1.1",
        }
    }

    /// Versions that still carry the SCI0 kernel layout with file calls
    /// and `DoAvoider`.
    pub fn is_sci0(self) -> bool {
        self <= SciVersion::Sci0Late
    }
}

impl fmt::Display for SciVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Inclusive version span a kernel map entry applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionRange {
    pub min: SciVersion,
    pub max: SciVersion,
}

impl VersionRange {
    pub const ALL: VersionRange = VersionRange::new(SciVersion::Sci0Early, SciVersion::Sci11);

    pub const fn new(min: SciVersion, max: SciVersion) -> Self {
        VersionRange { min, max }
    }

    pub const fn only(version: SciVersion) -> Self {
        VersionRange::new(version, version)
    }

    pub fn contains(&self, version: SciVersion) -> bool {
        self.min <= version && version <= self.max
    }
}

/// Sound driver interface used by SCI0 era games.
pub const SOUND_SCI0: VersionRange = VersionRange::new(SciVersion::Sci0Early, SciVersion::Sci01);
/// Sound driver interface introduced with SCI1.
pub const SOUND_SCI1: VersionRange = VersionRange::new(SciVersion::Sci1Egaonly, SciVersion::Sci11);

/// Games that need per-script workarounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum GameId {
    Castlebrain,
    Ecoquest,
    Hoyle1,
    Hoyle3,
    Iceman,
    Kq1,
    Kq4,
    Kq5,
    Kq6,
    Lsl1,
    Lsl2,
    Lsl3,
    Lsl5,
    Lsl6,
    Pq2,
    Pq3,
    Qfg1,
    Qfg2,
    Qfg3,
    Sq1,
    Sq3,
    Sq4,
    Sq5,
    /// Fan games and anything not listed above.
    Unknown,
}

impl fmt::Display for GameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self
            .to_possible_value()
            .map(|value| value.get_name().to_string())
            .unwrap_or_else(|| format!("{self:?}"));
        f.write_str(&name)
    }
}
