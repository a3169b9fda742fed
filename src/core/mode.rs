//! Evaluation modes.
//!
//! Every operator declares which modes it supports. The mode of a node is
//! fixed when the node is built and decides which source kinds are
//! accepted and what kind of output the node represents.

use serde::{Deserialize, Serialize};
use std::fmt;

/// How a node's output is represented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Output is bound to a concrete raster grid.
    PixelGrid,
    /// Output is resolution free; a grid is picked at render time.
    ResolutionIndependent,
    /// Output is a group of images, one node per member.
    Collection,
}

impl Mode {
    /// All modes in declaration order.
    pub const ALL: [Mode; 3] = [Mode::PixelGrid, Mode::ResolutionIndependent, Mode::Collection];

    /// Short name used in registry keys and diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            Mode::PixelGrid => "pixel_grid",
            Mode::ResolutionIndependent => "resolution_independent",
            Mode::Collection => "collection",
        }
    }

    /// Parse a mode name, ignoring case. Accepts the legacy aliases
    /// `rendered` and `renderable` as well.
    pub fn from_name(name: &str) -> Option<Mode> {
        match name.to_ascii_lowercase().as_str() {
            "pixel_grid" | "pixelgrid" | "rendered" => Some(Mode::PixelGrid),
            "resolution_independent" | "resolutionindependent" | "renderable" => {
                Some(Mode::ResolutionIndependent)
            }
            "collection" => Some(Mode::Collection),
            _ => None,
        }
    }

    fn bit(&self) -> u8 {
        match self {
            Mode::PixelGrid => 0b001,
            Mode::ResolutionIndependent => 0b010,
            Mode::Collection => 0b100,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A small set of modes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModeSet(u8);

impl ModeSet {
    /// The empty set.
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Every mode.
    pub fn all() -> Self {
        Mode::ALL.into_iter().collect()
    }

    /// Add a mode.
    pub fn with(mut self, mode: Mode) -> Self {
        self.insert(mode);
        self
    }

    pub fn insert(&mut self, mode: Mode) {
        self.0 |= mode.bit();
    }

    pub fn contains(&self, mode: Mode) -> bool {
        self.0 & mode.bit() != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Iterate the contained modes in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = Mode> + '_ {
        Mode::ALL.into_iter().filter(|m| self.contains(*m))
    }
}

impl FromIterator<Mode> for ModeSet {
    fn from_iter<I: IntoIterator<Item = Mode>>(iter: I) -> Self {
        let mut set = ModeSet::empty();
        for mode in iter {
            set.insert(mode);
        }
        set
    }
}

impl From<Mode> for ModeSet {
    fn from(mode: Mode) -> Self {
        ModeSet::empty().with(mode)
    }
}

impl fmt::Display for ModeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.iter().map(|m| m.name()).collect();
        write!(f, "{{{}}}", names.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_set_membership() {
        let set = ModeSet::empty().with(Mode::PixelGrid).with(Mode::Collection);
        assert!(set.contains(Mode::PixelGrid));
        assert!(!set.contains(Mode::ResolutionIndependent));
        assert_eq!(set.iter().count(), 2);
        assert!(ModeSet::empty().is_empty());
    }

    #[test]
    fn test_mode_from_name() {
        assert_eq!(Mode::from_name("Rendered"), Some(Mode::PixelGrid));
        assert_eq!(Mode::from_name("COLLECTION"), Some(Mode::Collection));
        assert_eq!(Mode::from_name("tiles"), None);
    }

    #[test]
    fn test_mode_set_display() {
        assert_eq!(ModeSet::all().to_string(), "{pixel_grid, resolution_independent, collection}");
    }
}
