use std::sync::Arc;

use ve_core::{Event, EventKind, Terrain};

use crate::mailbox::Mailbox;

pub trait Entity: Send + Sync {
    fn id(&self) -> &str;
    fn position(&self) -> (f64, f64);
    fn size(&self) -> (u32, u32);
    fn dead(&self) -> bool;
    fn describe(&self) -> String;
    fn receive(&self) -> Mailbox;
}

/// The spatial container an entity currently occupies.
///
/// Implementations are shared by every entity they hold and must accept
/// concurrent calls from those entities' background tasks.
pub trait EntityRegion: Send + Sync {
    fn id(&self) -> &str;

    fn get_event(&self, kind: EventKind, body: String, origin: &str) -> Event {
        Event::new(kind, body, Some(origin.to_string()))
    }

    fn broadcast(&self, event: Event);

    fn get_entity(&self, entity_id: &str) -> Option<Arc<dyn Entity>>;

    fn terrain(&self) -> Terrain;

    // Called once an entity has shut down for good.
    fn release(&self, _entity_id: &str) {}
}

pub fn distance(from: (f64, f64), to: (f64, f64)) -> f64 {
    (to.0 - from.0).hypot(to.1 - from.1)
}
