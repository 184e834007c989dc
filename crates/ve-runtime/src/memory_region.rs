use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use crossbeam_channel::{unbounded, Receiver, Sender};
use tracing::{debug, trace};
use ve_core::{Event, Terrain};

use crate::mailbox::MailboxError;
use crate::region::{Entity, EntityRegion};

/// In-memory region: an entity table, fixed terrain bounds and broadcast
/// fan-out. Broadcasts never block the sender.
pub struct MemoryRegion {
    id: String,
    terrain: Terrain,
    entities: RwLock<BTreeMap<String, Arc<dyn Entity>>>,
    subscribers: Mutex<Vec<Sender<Event>>>,
}

impl MemoryRegion {
    pub fn new(id: impl Into<String>, terrain: Terrain) -> Self {
        Self {
            id: id.into(),
            terrain,
            entities: RwLock::new(BTreeMap::new()),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    pub fn add_entity(&self, entity: Arc<dyn Entity>) {
        let entity_id = entity.id().to_string();
        self.entities
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(entity_id, entity);
    }

    pub fn remove_entity(&self, entity_id: &str) -> Option<Arc<dyn Entity>> {
        self.entities
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(entity_id)
    }

    pub fn entity_ids(&self) -> Vec<String> {
        self.entities
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entities
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // Every broadcast, including ones no entity received.
    pub fn subscribe(&self) -> Receiver<Event> {
        let (sender, receiver) = unbounded();
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(sender);
        receiver
    }

    pub fn sweep_dead(&self) -> Vec<String> {
        let mut entities = self.entities.write().unwrap_or_else(PoisonError::into_inner);
        let dead: Vec<String> = entities
            .iter()
            .filter(|(_, entity)| entity.dead())
            .map(|(entity_id, _)| entity_id.clone())
            .collect();
        for entity_id in &dead {
            entities.remove(entity_id);
        }
        dead
    }

    fn snapshot(&self) -> Vec<Arc<dyn Entity>> {
        self.entities
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }
}

impl EntityRegion for MemoryRegion {
    fn id(&self) -> &str {
        &self.id
    }

    fn broadcast(&self, event: Event) {
        for entity in self.snapshot() {
            if event.is_from(entity.id()) || entity.dead() {
                continue;
            }
            match entity.receive().try_deliver(event.clone()) {
                Ok(()) => {}
                Err(MailboxError::Full) => {
                    debug!(
                        target: "ve_runtime",
                        region = %self.id,
                        entity = entity.id(),
                        kind = %event.kind,
                        "mailbox full, event dropped"
                    );
                }
                Err(MailboxError::Closed) => {
                    trace!(target: "ve_runtime", region = %self.id, entity = entity.id(), "mailbox closed");
                }
            }
        }
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|subscriber| subscriber.send(event.clone()).is_ok());
    }

    fn get_entity(&self, entity_id: &str) -> Option<Arc<dyn Entity>> {
        self.entities
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(entity_id)
            .cloned()
    }

    fn terrain(&self) -> Terrain {
        self.terrain
    }

    fn release(&self, entity_id: &str) {
        self.remove_entity(entity_id);
    }
}
