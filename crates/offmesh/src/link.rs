//! Off-mesh link payloads
//!
//! A link payload describes what a link traversal actually is (a jump, a
//! door, a smart-object interaction) and decides at query time whether a
//! given requester may use it. Payloads are handed to the navigation by
//! moving an `Arc` into it; a caller that wants to keep a private copy
//! clones one explicitly through [`OffMeshLink::clone_link`] first.

use std::fmt;
use std::sync::Arc;

use offmesh_common::{EntityId, Vec3};

/// Polymorphic payload attached to an off-mesh link
pub trait OffMeshLink: fmt::Debug + Send + Sync {
    /// Entity that contributed this link, if any
    fn entity_id(&self) -> EntityId;

    /// World position the link starts from
    fn start(&self) -> Vec3;

    /// World position the link ends at
    fn end(&self) -> Vec3;

    /// Usability predicate
    ///
    /// Returns the traversal cost multiplier when the requester may use the
    /// link right now, or `None` when the link is unusable (blocked, busy,
    /// or incompatible with the requester).
    fn can_use(&self, requester: Option<EntityId>) -> Option<f32>;

    /// Creates an independent copy of the payload
    fn clone_link(&self) -> Arc<dyn OffMeshLink>;
}

/// Payload for a traversal contributed by a smart object
///
/// Carries the owning entity, the hash of the smart-object class the
/// traversal belongs to, and the helper endpoints in world space. The
/// `enabled` flag mirrors the object's current availability; a disabled
/// link stays in the graph but fails its usability predicate.
#[derive(Debug, Clone)]
pub struct SmartObjectLink {
    /// Entity owning the smart object
    pub object_entity: EntityId,
    /// Hash of the smart-object class name
    pub class_hash: u32,
    /// World position of the start helper
    pub start: Vec3,
    /// World position of the end helper
    pub end: Vec3,
    /// Traversal cost multiplier reported to users
    pub cost_multiplier: f32,
    /// Whether the object currently allows the traversal
    pub enabled: bool,
}

impl SmartObjectLink {
    /// Creates an enabled smart-object traversal payload
    pub fn new(object_entity: EntityId, class_hash: u32, start: Vec3, end: Vec3) -> Self {
        SmartObjectLink {
            object_entity,
            class_hash,
            start,
            end,
            cost_multiplier: 1.0,
            enabled: true,
        }
    }

    /// Sets the traversal cost multiplier
    pub fn with_cost_multiplier(mut self, cost_multiplier: f32) -> Self {
        self.cost_multiplier = cost_multiplier;
        self
    }
}

impl OffMeshLink for SmartObjectLink {
    fn entity_id(&self) -> EntityId {
        self.object_entity
    }

    fn start(&self) -> Vec3 {
        self.start
    }

    fn end(&self) -> Vec3 {
        self.end
    }

    fn can_use(&self, _requester: Option<EntityId>) -> Option<f32> {
        if self.enabled {
            Some(self.cost_multiplier)
        } else {
            None
        }
    }

    fn clone_link(&self) -> Arc<dyn OffMeshLink> {
        Arc::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_smart_object_link_is_unusable() {
        let mut link = SmartObjectLink::new(
            EntityId::new(9),
            0xBEEF,
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
        )
        .with_cost_multiplier(2.5);

        assert_eq!(link.can_use(None), Some(2.5));
        link.enabled = false;
        assert_eq!(link.can_use(Some(EntityId::new(1))), None);
    }
}
