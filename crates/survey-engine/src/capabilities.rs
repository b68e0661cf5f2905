use std::collections::BTreeSet;
use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Optional section families a deployment can switch on or off.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Budgeting,
    GeoBudgeting,
    Map,
    Attachment,
}

impl Capability {
    pub const ALL: [Capability; 4] = [
        Capability::Budgeting,
        Capability::GeoBudgeting,
        Capability::Map,
        Capability::Attachment,
    ];
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Capability::Budgeting => "budgeting",
            Capability::GeoBudgeting => "geo_budgeting",
            Capability::Map => "map",
            Capability::Attachment => "attachment",
        };
        f.write_str(name)
    }
}

/// Capability set handed to the definition loader. Defaults to everything enabled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capabilities {
    enabled: BTreeSet<Capability>,
}

impl Capabilities {
    pub fn none() -> Self {
        Self {
            enabled: BTreeSet::new(),
        }
    }

    pub fn with(mut self, capability: Capability) -> Self {
        self.enabled.insert(capability);
        self
    }

    pub fn without(mut self, capability: Capability) -> Self {
        self.enabled.remove(&capability);
        self
    }

    pub fn set(&mut self, capability: Capability, enabled: bool) {
        if enabled {
            self.enabled.insert(capability);
        } else {
            self.enabled.remove(&capability);
        }
    }

    pub fn contains(&self, capability: Capability) -> bool {
        self.enabled.contains(&capability)
    }

    pub fn iter(&self) -> impl Iterator<Item = Capability> + '_ {
        self.enabled.iter().copied()
    }
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            enabled: Capability::ALL.into_iter().collect(),
        }
    }
}

impl FromIterator<Capability> for Capabilities {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        Self {
            enabled: iter.into_iter().collect(),
        }
    }
}
