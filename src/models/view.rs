//! What the user is currently looking at.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Zone, folder prefix and visible keys of the current listing.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct ViewContext {
    pub zone: String,

    #[serde(default)]
    pub prefix: String,

    #[serde(default)]
    pub keys: Vec<String>,
}

impl ViewContext {
    /// Whether moving from `self` to `next` crosses a navigation boundary.
    ///
    /// A zone switch, a different prefix, or a different set of visible keys
    /// all count. Reordering the same keys does not.
    pub fn materially_differs(&self, next: &ViewContext) -> bool {
        if self.zone != next.zone || self.prefix != next.prefix {
            return true;
        }
        let current: BTreeSet<&str> = self.keys.iter().map(String::as_str).collect();
        let incoming: BTreeSet<&str> = next.keys.iter().map(String::as_str).collect();
        current != incoming
    }
}
