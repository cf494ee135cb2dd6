//! Power/performance mode table types

use serde::{Deserialize, Serialize};
use std::fmt;

/// One selectable power/performance profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PowerMode {
    pub id: u32,
    pub name: String,
    pub description: String,
}

impl fmt::Display for PowerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.id, self.name)
    }
}

/// Parsed `pp_power_profile_mode` table
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PpmTable {
    pub modes: Vec<PowerMode>,
    /// Id of the mode marked active by the driver
    pub current: Option<u32>,
    /// Non-fatal problems found while parsing
    pub warnings: Vec<String>,
}

impl PpmTable {
    pub fn mode(&self, id: u32) -> Option<&PowerMode> {
        self.modes.iter().find(|m| m.id == id)
    }

    pub fn current_mode(&self) -> Option<&PowerMode> {
        self.current.and_then(|id| self.mode(id))
    }

    /// Find a mode by case-insensitive name
    pub fn by_name(&self, name: &str) -> Option<&PowerMode> {
        self.modes
            .iter()
            .find(|m| m.name.eq_ignore_ascii_case(name))
    }

    pub fn is_empty(&self) -> bool {
        self.modes.is_empty()
    }
}
