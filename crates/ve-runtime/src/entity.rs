use std::mem;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::thread::{self, JoinHandle};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crossbeam_channel::{select, tick, Receiver};
use serde_json::{Map as JsonMap, Value as JsonValue};
use tracing::{debug, info, trace, warn};
use ve_core::{Event, EventKind, Terrain, VeError};
use ve_script::rhai::{FLOAT, INT};
use ve_script::{parse_float_text, parse_size_text, sandboxed_engine, BehaviorRegistry, ScriptRuntime};

use crate::config::EntityOptions;
use crate::host_bridge;
use crate::killer::DestroyListener;
use crate::mailbox::Mailbox;
use crate::region::{distance, Entity, EntityRegion};
use crate::termination::{Phase, Termination, TerminationState};

static NEXT_ENTITY_ID: AtomicU64 = AtomicU64::new(1);
// Unix epoch milliseconds.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|since| since.as_millis() as u64)
        .unwrap_or_default()
}

fn next_entity_id() -> String {
    format!("e{}", NEXT_ENTITY_ID.fetch_add(1, Ordering::Relaxed))
}

pub struct VirtualEntity {
    id: String,
    runtime: ScriptRuntime,
    options: EntityOptions,
    location: RwLock<Option<Arc<dyn EntityRegion>>>,
    mailbox: Mailbox,
    inbox: Mutex<Option<Receiver<Event>>>,
    termination: Arc<Termination>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    placed: AtomicBool,
    shutdown_claimed: AtomicBool,
    last_tick: AtomicU64,
}

impl VirtualEntity {
    pub fn new(
        registry: &BehaviorRegistry,
        behavior: &str,
        options: EntityOptions,
    ) -> Result<Arc<Self>, VeError> {
        Self::with_id(next_entity_id(), registry, behavior, options)
    }

    pub fn with_id(
        id: impl Into<String>,
        registry: &BehaviorRegistry,
        behavior: &str,
        options: EntityOptions,
    ) -> Result<Arc<Self>, VeError> {
        let id = id.into();
        if id.is_empty() {
            return Err(VeError::new("ENTITY_ID_INVALID", "Entity id must not be empty."));
        }
        let behavior = registry.load(behavior)?;
        let limits = registry.limits().clone();
        let (mailbox, inbox) = Mailbox::channel(&options.mailbox);

        let entity = Arc::new_cyclic(|weak| {
            let mut engine = sandboxed_engine(&limits);
            host_bridge::install(&mut engine, weak.clone());
            Self {
                id,
                runtime: ScriptRuntime::new(behavior, engine),
                options,
                location: RwLock::new(None),
                mailbox,
                inbox: Mutex::new(Some(inbox)),
                termination: Arc::new(Termination::new()),
                tasks: Mutex::new(Vec::new()),
                placed: AtomicBool::new(false),
                shutdown_claimed: AtomicBool::new(false),
                last_tick: AtomicU64::new(0),
            }
        });
        debug!(
            target: "ve_runtime",
            entity = %entity.id,
            behavior = entity.behavior(),
            "entity created"
        );
        Ok(entity)
    }

    pub fn behavior(&self) -> &str {
        self.runtime.behavior_name()
    }

    pub fn location(&self) -> Option<Arc<dyn EntityRegion>> {
        self.location
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_location(self: &Arc<Self>, region: Arc<dyn EntityRegion>) {
        self.activate(region, None);
    }

    pub fn place_at(self: &Arc<Self>, region: Arc<dyn EntityRegion>, x: f64, y: f64) {
        self.activate(region, Some((x, y)));
    }

    pub fn set_position(&self, x: f64, y: f64) {
        self.runtime.pass("setPosition", (x as FLOAT, y as FLOAT));
    }

    pub fn killer(self: &Arc<Self>, listener: DestroyListener) {
        let entity = Arc::clone(self);
        let cancel = self.termination.listener();
        let spawned = thread::Builder::new()
            .name(format!("ve-killer-{}", self.id))
            .spawn(move || {
                let DestroyListener { destroy, done } = listener;
                let destroyed = select! {
                    recv(destroy) -> signal => match signal {
                        Ok(()) => true,
                        Err(_) => {
                            let _ = cancel.recv();
                            false
                        }
                    },
                    recv(cancel) -> _ => false,
                };
                if destroyed {
                    info!(target: "ve_runtime", entity = %entity.id, "destroying entity");
                } else {
                    info!(target: "ve_runtime", entity = %entity.id, "closing entity");
                }
                entity.shutdown();
                drop(done);
            });
        if let Err(error) = spawned {
            warn!(target: "ve_runtime", entity = %self.id, %error, "failed to start killer");
        }
    }

    // Non-blocking; the background tasks and any killer finish the teardown.
    // An inbox that no mailbox task took is dropped here so senders see it closed.
    pub fn close(&self) {
        if self.termination.request() {
            debug!(target: "ve_runtime", entity = %self.id, "termination requested");
        }
        drop(
            self.inbox
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take(),
        );
    }

    // Blocks until both background tasks are gone. Every caller returns only
    // after that point; the first one also joins the threads and detaches.
    pub fn shutdown(&self) {
        self.close();
        if self.on_own_task() {
            return;
        }
        if self.shutdown_claimed.swap(true, Ordering::AcqRel) {
            self.termination.wait_settled();
            return;
        }
        self.termination.wait_settled();
        let tasks = mem::take(&mut *self.tasks.lock().unwrap_or_else(PoisonError::into_inner));
        for task in tasks {
            if task.join().is_err() {
                warn!(target: "ve_runtime", entity = %self.id, "entity task panicked");
            }
        }
        let region = self
            .location
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(region) = region {
            region.release(&self.id);
        }
        info!(target: "ve_runtime", entity = %self.id, "entity closed");
    }

    pub fn phase(&self) -> Phase {
        match self.termination.state() {
            TerminationState::Closed => Phase::Closed,
            TerminationState::Requested => Phase::Closing,
            TerminationState::Running if self.placed.load(Ordering::Acquire) => Phase::Active,
            TerminationState::Running => Phase::Unplaced,
        }
    }

    pub fn last_tick(&self) -> u64 {
        self.last_tick.load(Ordering::Acquire)
    }

    pub fn terrain(&self) -> Terrain {
        self.location()
            .map(|region| region.terrain())
            .unwrap_or_default()
    }

    pub(crate) fn send_event(&self, kind: &str, body: String) {
        let Some(region) = self.location() else {
            return;
        };
        let event = region.get_event(EventKind::from_code(kind), body, &self.id);
        if !event.kind.is_known() {
            debug!(
                target: "ve_runtime",
                entity = %self.id,
                kind = %event.kind,
                "broadcasting unknown event kind"
            );
        }
        region.broadcast(event);
    }

    pub(crate) fn distance_to(&self, other_id: &str) -> f64 {
        let Some(other) = self.location().and_then(|region| region.get_entity(other_id)) else {
            return f64::NAN;
        };
        distance(self.position(), other.position())
    }

    pub(crate) fn distance_from(&self, other_id: &str, point: (f64, f64)) -> f64 {
        let Some(other) = self.location().and_then(|region| region.get_entity(other_id)) else {
            return f64::NAN;
        };
        distance(point, other.position())
    }

    pub(crate) fn script_log(&self, message: &str) {
        info!(
            target: "ve_script",
            entity = %self.id,
            behavior = self.behavior(),
            "{message}"
        );
    }

    fn activate(self: &Arc<Self>, region: Arc<dyn EntityRegion>, position: Option<(f64, f64)>) {
        if self.termination.is_requested() {
            warn!(
                target: "ve_runtime",
                entity = %self.id,
                region = region.id(),
                "ignoring placement of a terminated entity"
            );
            return;
        }
        let region_id = region.id().to_string();
        *self.location.write().unwrap_or_else(PoisonError::into_inner) = Some(region);

        if self.placed.swap(true, Ordering::AcqRel) {
            debug!(target: "ve_runtime", entity = %self.id, region = %region_id, "entity transferred");
            if let Some((x, y)) = position {
                self.set_position(x, y);
            }
            return;
        }

        self.runtime.pass("setup", ());
        if let Some((x, y)) = position {
            self.set_position(x, y);
        }
        self.start_tasks();
        debug!(target: "ve_runtime", entity = %self.id, region = %region_id, "entity placed");
    }

    fn start_tasks(self: &Arc<Self>) {
        let Some(inbox) = self
            .inbox
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        else {
            return;
        };
        let period = self.options.tick_interval.max(Duration::from_millis(1));
        // Held while spawning so a concurrent shutdown joins every started task.
        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(guard) = self.termination.enter() {
            let entity = Arc::clone(self);
            let cancel = self.termination.listener();
            let spawned = thread::Builder::new()
                .name(format!("ve-tick-{}", self.id))
                .spawn(move || {
                    let _guard = guard;
                    entity.run_ticks(period, cancel);
                });
            self.track(spawned, "tick", &mut tasks);
        }

        if let Some(guard) = self.termination.enter() {
            let entity = Arc::clone(self);
            let cancel = self.termination.listener();
            let spawned = thread::Builder::new()
                .name(format!("ve-mailbox-{}", self.id))
                .spawn(move || {
                    let _guard = guard;
                    entity.run_mailbox(inbox, cancel);
                });
            self.track(spawned, "mailbox", &mut tasks);
        }
    }

    fn track(
        &self,
        spawned: std::io::Result<JoinHandle<()>>,
        task: &str,
        started: &mut Vec<JoinHandle<()>>,
    ) {
        match spawned {
            Ok(handle) => started.push(handle),
            Err(error) => {
                warn!(target: "ve_runtime", entity = %self.id, task, %error, "failed to start task");
            }
        }
    }

    fn run_ticks(&self, period: Duration, cancel: Receiver<()>) {
        let mut previous = now_millis();
        self.last_tick.store(previous, Ordering::Release);
        let ticker = tick(period);
        loop {
            select! {
                recv(cancel) -> _ => break,
                recv(ticker) -> _ => {
                    let now = now_millis();
                    let elapsed = now.saturating_sub(previous);
                    self.runtime.pass("tick", (now as INT, elapsed as INT));
                    self.last_tick.store(now, Ordering::Release);
                    previous = now;
                }
            }
        }
        trace!(target: "ve_runtime", entity = %self.id, "tick task stopped");
    }

    fn run_mailbox(&self, inbox: Receiver<Event>, cancel: Receiver<()>) {
        loop {
            select! {
                recv(cancel) -> _ => break,
                recv(inbox) -> event => match event {
                    Ok(event) => self.handle(event),
                    Err(_) => break,
                },
            }
        }
        trace!(target: "ve_runtime", entity = %self.id, "mailbox task stopped");
    }

    fn handle(&self, event: Event) {
        match &event.kind {
            EventKind::EntityUpdate => {
                trace!(target: "ve_runtime", entity = %self.id, body = %event.body, "entity update");
            }
            EventKind::Chat
            | EventKind::Particle
            | EventKind::Direction
            | EventKind::Location
            | EventKind::Spawn
            | EventKind::Delete
            | EventKind::Sound
            | EventKind::Error => {}
            EventKind::Unknown(code) => {
                debug!(target: "ve_runtime", entity = %self.id, kind = %code, "dropping unknown event");
            }
        }
        if let Some(observer) = &self.options.observer {
            observer.observe(&self.id, &event);
        }
    }

    fn on_own_task(&self) -> bool {
        let current = thread::current().id();
        self.tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|task| task.thread().id() == current)
    }
}

impl Entity for VirtualEntity {
    fn id(&self) -> &str {
        &self.id
    }

    fn position(&self) -> (f64, f64) {
        let x = parse_float_text(&self.runtime.call("getX")).unwrap_or(0.0);
        let y = parse_float_text(&self.runtime.call("getY")).unwrap_or(0.0);
        (x, y)
    }

    fn size(&self) -> (u32, u32) {
        let width = parse_size_text(&self.runtime.call("getWidth")).unwrap_or(0);
        let height = parse_size_text(&self.runtime.call("getHeight")).unwrap_or(0);
        (width, height)
    }

    fn dead(&self) -> bool {
        self.termination.is_requested()
    }

    fn describe(&self) -> String {
        let data = self.runtime.call("getData");
        let fields = match serde_json::from_str::<JsonValue>(&data) {
            Ok(JsonValue::Object(fields)) => fields,
            _ => {
                if !data.is_empty() {
                    warn!(
                        target: "ve_runtime",
                        entity = %self.id,
                        behavior = self.behavior(),
                        "getData did not return a JSON object"
                    );
                }
                JsonMap::new()
            }
        };
        let mut described = JsonMap::new();
        described.insert("id".to_string(), JsonValue::String(self.id.clone()));
        for (key, value) in fields {
            if key != "id" {
                described.insert(key, value);
            }
        }
        JsonValue::Object(described).to_string()
    }

    fn receive(&self) -> Mailbox {
        self.mailbox.clone()
    }
}
