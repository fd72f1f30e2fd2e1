//! Attribute groups and the update plan produced by diffing

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Mutable attribute groups of a compute instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Attribute {
    Name,
    Tags,
    SecurityGroups,
    InstanceType,
    #[serde(rename = "AMI")]
    Ami,
    Volumes,
}

impl Attribute {
    pub const ALL: [Attribute; 6] = [
        Attribute::Name,
        Attribute::Tags,
        Attribute::SecurityGroups,
        Attribute::InstanceType,
        Attribute::Ami,
        Attribute::Volumes,
    ];

    /// `true` for attributes whose update needs the instance stopped
    pub fn requires_power_cycle(&self) -> bool {
        matches!(self, Attribute::InstanceType | Attribute::Volumes)
    }
}

impl std::fmt::Display for Attribute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Attribute::Name => write!(f, "Name"),
            Attribute::Tags => write!(f, "Tags"),
            Attribute::SecurityGroups => write!(f, "SecurityGroups"),
            Attribute::InstanceType => write!(f, "InstanceType"),
            Attribute::Ami => write!(f, "AMI"),
            Attribute::Volumes => write!(f, "Volumes"),
        }
    }
}

/// Per-attribute "needs update" flags
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdatePlan {
    updates: BTreeMap<Attribute, bool>,
}

impl UpdatePlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, attribute: Attribute, needs_update: bool) {
        self.updates.insert(attribute, needs_update);
    }

    pub fn with(mut self, attribute: Attribute, needs_update: bool) -> Self {
        self.set(attribute, needs_update);
        self
    }

    /// Unknown attributes are treated as up to date
    pub fn needs_update(&self, attribute: Attribute) -> bool {
        self.updates.get(&attribute).copied().unwrap_or(false)
    }

    pub fn has_updates(&self) -> bool {
        self.updates.values().any(|needs| *needs)
    }

    /// Attributes flagged for update, in attribute order
    pub fn pending(&self) -> Vec<Attribute> {
        self.updates
            .iter()
            .filter(|(_, needs)| **needs)
            .map(|(attribute, _)| *attribute)
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Attribute, bool)> + '_ {
        self.updates.iter().map(|(a, n)| (*a, *n))
    }
}

impl std::fmt::Display for UpdatePlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let pending = self.pending();
        if pending.is_empty() {
            return write!(f, "up to date");
        }
        let names: Vec<String> = pending.iter().map(|a| a.to_string()).collect();
        write!(f, "{} to update: {}", pending.len(), names.join(", "))
    }
}
