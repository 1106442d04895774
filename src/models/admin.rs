//! Administrative levels and nested admin-code paths.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Deepest admin code carried on a gazetteer row (admin1..admin4, plus admin5).
pub const MAX_ADMIN_DEPTH: usize = 5;

/// Admin levels generated when none are requested.
pub const DEFAULT_ADMIN_LEVELS: [u8; 3] = [1, 2, 3];

/// Nesting depth of an administrative area (1 = first-order subdivision).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct AdminLevel(u8);

impl AdminLevel {
    pub fn new(level: u8) -> Option<Self> {
        (1..=MAX_ADMIN_DEPTH as u8)
            .contains(&level)
            .then_some(AdminLevel(level))
    }

    pub fn get(self) -> u8 {
        self.0
    }

    /// Number of admin codes that make up a path at this level
    pub fn depth(self) -> usize {
        self.0 as usize
    }

    /// GeoNames feature code of rows that represent an area at this level, e.g. `ADM2`
    pub fn feature_code(self) -> String {
        format!("ADM{}", self.0)
    }

    pub fn defaults() -> Vec<AdminLevel> {
        DEFAULT_ADMIN_LEVELS.iter().map(|&l| AdminLevel(l)).collect()
    }
}

impl TryFrom<u8> for AdminLevel {
    type Error = String;

    fn try_from(level: u8) -> Result<Self, Self::Error> {
        AdminLevel::new(level)
            .ok_or_else(|| format!("admin level must be between 1 and {MAX_ADMIN_DEPTH}, got {level}"))
    }
}

impl From<AdminLevel> for u8 {
    fn from(level: AdminLevel) -> Self {
        level.0
    }
}

impl FromStr for AdminLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let level: u8 = s
            .trim()
            .parse()
            .map_err(|_| format!("invalid admin level '{s}'"))?;
        AdminLevel::try_from(level)
    }
}

impl fmt::Display for AdminLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Nested admin codes of a place. `None` means "not assigned at this depth".
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AdminCodes([Option<String>; MAX_ADMIN_DEPTH]);

impl AdminCodes {
    /// Build from codes ordered admin1 first. Empty strings count as absent.
    pub fn new<I, S>(codes: I) -> Self
    where
        I: IntoIterator<Item = Option<S>>,
        S: Into<String>,
    {
        let mut admin_codes = AdminCodes::default();
        for (i, code) in codes.into_iter().take(MAX_ADMIN_DEPTH).enumerate() {
            admin_codes.set(i + 1, code.map(Into::into));
        }
        admin_codes
    }

    /// Code at a 1-based depth
    pub fn get(&self, depth: usize) -> Option<&str> {
        depth
            .checked_sub(1)
            .and_then(|i| self.0.get(i))
            .and_then(|c| c.as_deref())
    }

    pub fn set(&mut self, depth: usize, code: Option<String>) {
        if let Some(slot) = depth.checked_sub(1).and_then(|i| self.0.get_mut(i)) {
            *slot = code.filter(|c| !c.trim().is_empty());
        }
    }

    /// The codes for depths `1..=level`, or `None` if any of them is absent.
    pub fn path(&self, level: AdminLevel) -> Option<Vec<&str>> {
        (1..=level.depth()).map(|d| self.get(d)).collect()
    }

    /// True when every code present here is equal in `other`.
    ///
    /// Absent codes act as wildcards, so an area's codes are refined by the
    /// codes of every place inside it.
    pub fn is_refined_by(&self, other: &AdminCodes) -> bool {
        self.0
            .iter()
            .zip(other.0.iter())
            .all(|(mine, theirs)| match mine {
                Some(code) => theirs.as_deref() == Some(code.as_str()),
                None => true,
            })
    }
}
