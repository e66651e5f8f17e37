use easypaies_core::EntityId;

use crate::EventEnvelope;

/// Messages that belong to a single client entity.
///
/// Lets workers pin themselves to one entity and drop everything else.
pub trait EntityScoped {
    fn entity_id(&self) -> EntityId;
}

impl<E> EntityScoped for EventEnvelope<E> {
    fn entity_id(&self) -> EntityId {
        EventEnvelope::entity_id(self)
    }
}
