//! Capability mask and modality tags.
//!
//! The same integer values serve two purposes on the wire: the header stores
//! the OR of the enabled modalities, and each record starts with the value of
//! the single modality it carries.
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign};

/// Bit-set selecting which modalities a session records or replays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct RecordOptions(u32);

impl RecordOptions {
    pub const NONE: RecordOptions = RecordOptions(0);
    pub const COLOR: RecordOptions = RecordOptions(1);
    pub const DEPTH: RecordOptions = RecordOptions(2);
    pub const SKELETONS: RecordOptions = RecordOptions(4);
    /// All three modalities; on replay this selects the correlated timeline.
    pub const ALL: RecordOptions = RecordOptions(7);

    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Decode a header mask. Negative values and unknown bits are rejected.
    pub fn from_bits(bits: i32) -> Option<Self> {
        if bits < 0 || (bits as u32) & !Self::ALL.0 != 0 {
            return None;
        }
        Some(RecordOptions(bits as u32))
    }

    pub const fn contains(self, other: RecordOptions) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn is_all(self) -> bool {
        self.0 == Self::ALL.0
    }

    /// Whether the given modality's bit is set.
    pub const fn has(self, modality: Modality) -> bool {
        self.contains(modality.option())
    }

    /// Enabled modalities in tag order.
    pub fn modalities(self) -> impl Iterator<Item = Modality> {
        Modality::ALL.into_iter().filter(move |m| self.has(*m))
    }
}

impl BitOr for RecordOptions {
    type Output = RecordOptions;
    fn bitor(self, rhs: RecordOptions) -> RecordOptions {
        RecordOptions(self.0 | rhs.0)
    }
}

impl BitOrAssign for RecordOptions {
    fn bitor_assign(&mut self, rhs: RecordOptions) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for RecordOptions {
    type Output = RecordOptions;
    fn bitand(self, rhs: RecordOptions) -> RecordOptions {
        RecordOptions(self.0 & rhs.0)
    }
}

impl From<Modality> for RecordOptions {
    fn from(m: Modality) -> Self {
        m.option()
    }
}

impl fmt::Display for RecordOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("none");
        }
        let names: Vec<&str> = self.modalities().map(Modality::name).collect();
        f.write_str(&names.join("|"))
    }
}

/// One of the three sensor output kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Modality {
    Color,
    Depth,
    Skeletons,
}

impl Modality {
    pub const ALL: [Modality; 3] = [Modality::Color, Modality::Depth, Modality::Skeletons];

    pub const fn option(self) -> RecordOptions {
        match self {
            Modality::Color => RecordOptions::COLOR,
            Modality::Depth => RecordOptions::DEPTH,
            Modality::Skeletons => RecordOptions::SKELETONS,
        }
    }

    /// Record tag written in front of every frame of this modality.
    pub const fn tag(self) -> i32 {
        self.option().bits() as i32
    }

    pub fn from_tag(tag: i32) -> Option<Modality> {
        Modality::ALL.into_iter().find(|m| m.tag() == tag)
    }

    pub const fn name(self) -> &'static str {
        match self {
            Modality::Color => "color",
            Modality::Depth => "depth",
            Modality::Skeletons => "skeletons",
        }
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
