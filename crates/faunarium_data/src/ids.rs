//! Identifier newtypes for the environment/population/agent graph.
//!
//! Back-references between simulation objects are carried as ids rather
//! than owning pointers; ownership always flows environment → population
//! → agent.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! id_newtype {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        pub struct $name(Uuid);

        impl $name {
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            #[must_use]
            pub const fn from_uuid(id: Uuid) -> Self {
                Self(id)
            }

            #[must_use]
            pub const fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}

id_newtype!(
    /// Identity of one agent, stable across migration and metamorphosis.
    AgentId
);
id_newtype!(
    /// Identity of one population, stable across environment moves.
    PopulationId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique() {
        assert_ne!(AgentId::new(), AgentId::new());
        assert_ne!(PopulationId::new(), PopulationId::new());
    }

    #[test]
    fn id_roundtrips_through_uuid() {
        let id = AgentId::new();
        assert_eq!(AgentId::from_uuid(id.as_uuid()), id);
    }
}
