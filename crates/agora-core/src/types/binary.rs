use serde::{Deserialize, Serialize};
use std::fmt;

/// A single bit agreed on by binary agreement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Binary {
    Zero,
    One,
}

impl Binary {
    pub fn as_bool(self) -> bool {
        matches!(self, Binary::One)
    }

    fn index(self) -> usize {
        match self {
            Binary::Zero => 0,
            Binary::One => 1,
        }
    }
}

impl From<bool> for Binary {
    fn from(value: bool) -> Self {
        if value {
            Binary::One
        } else {
            Binary::Zero
        }
    }
}

impl fmt::Display for Binary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.index())
    }
}

/// A cell holding an optional binary value
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BinaryState {
    value: Option<Binary>,
}

impl BinaryState {
    pub fn new() -> Self {
        BinaryState { value: None }
    }

    pub fn set(&mut self, value: Binary) {
        self.value = Some(value);
    }

    pub fn value(&self) -> Option<Binary> {
        self.value
    }

    pub fn is_undefined(&self) -> bool {
        self.value.is_none()
    }
}

/// Set over the two-element binary domain
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BinarySet {
    members: [bool; 2],
}

impl BinarySet {
    pub fn new() -> Self {
        BinarySet::default()
    }

    pub fn union(&mut self, value: Binary) {
        self.members[value.index()] = true;
    }

    pub fn exist(&self, value: Binary) -> bool {
        self.members[value.index()]
    }

    /// Members in stable order, zero before one
    pub fn to_list(&self) -> Vec<Binary> {
        [Binary::Zero, Binary::One]
            .into_iter()
            .filter(|v| self.exist(*v))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.members.iter().filter(|m| **m).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        self.members = [false; 2];
    }
}
