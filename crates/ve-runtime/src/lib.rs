mod config;
mod entity;
mod host_bridge;
mod killer;
mod mailbox;
mod memory_region;
mod region;
mod termination;

pub use config::{EntityOptions, EventObserver, RuntimeConfig, DEFAULT_TICK_INTERVAL_MS};
pub use entity::{now_millis, VirtualEntity};
pub use killer::{destroy_channel, DestroyHandle, DestroyListener};
pub use mailbox::{Backpressure, Mailbox, MailboxConfig, MailboxError};
pub use memory_region::MemoryRegion;
pub use region::{distance, Entity, EntityRegion};
pub use termination::{Phase, TaskGuard, Termination, TerminationState};
