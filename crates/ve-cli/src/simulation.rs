use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::info;
use ve_api::{load_runtime_config, registry_from_dir, spawn_entity, SpawnOptions, SpawnedEntity};
use ve_core::{Event, Terrain, VeError};
use ve_runtime::{Entity, MemoryRegion, RuntimeConfig};

use crate::{resolve_dir, RunArgs};

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SpawnRequest {
    pub(crate) behavior: String,
    pub(crate) position: Option<(f64, f64)>,
}

// `class` or `class@x,y`.
pub(crate) fn parse_spawn(raw: &str) -> Result<SpawnRequest, VeError> {
    let invalid = || {
        VeError::new(
            "CLI_SPAWN_INVALID",
            format!("Invalid spawn \"{}\", expected class or class@x,y.", raw),
        )
    };
    let (behavior, position) = match raw.split_once('@') {
        None => (raw.trim(), None),
        Some((behavior, coords)) => {
            let (x, y) = coords.split_once(',').ok_or_else(invalid)?;
            let x = x.trim().parse::<f64>().map_err(|_| invalid())?;
            let y = y.trim().parse::<f64>().map_err(|_| invalid())?;
            (behavior.trim(), Some((x, y)))
        }
    };
    if behavior.is_empty() {
        return Err(invalid());
    }
    Ok(SpawnRequest {
        behavior: behavior.to_string(),
        position,
    })
}

pub(crate) fn resolve_config(args: &RunArgs) -> Result<RuntimeConfig, VeError> {
    let mut config = match &args.config {
        Some(path) => load_runtime_config(Path::new(path))?,
        None => RuntimeConfig::default(),
    };
    if let Some(tick_ms) = args.tick_ms {
        config.tick_interval_ms = tick_ms;
    }
    config.validate()?;
    Ok(config)
}

pub(crate) fn run_simulation(args: RunArgs) -> Result<i32, VeError> {
    let behaviors_dir = resolve_dir(&args.behaviors_dir, "behaviors-dir")?;
    let requests = args
        .spawn
        .iter()
        .map(|raw| parse_spawn(raw))
        .collect::<Result<Vec<_>, _>>()?;
    let config = resolve_config(&args)?;
    let registry = registry_from_dir(&behaviors_dir, config.script_limits.clone())?;

    let region = Arc::new(MemoryRegion::new(
        "cli",
        Terrain::new(args.width, args.height),
    ));
    let events = region.subscribe();
    let entity_options = config.entity_options();

    let mut spawned: Vec<SpawnedEntity> = Vec::new();
    for request in requests {
        let result = spawn_entity(
            &registry,
            &region,
            SpawnOptions {
                behavior: request.behavior,
                id: None,
                position: request.position,
                entity: entity_options.clone(),
            },
        );
        match result {
            Ok(entity) => spawned.push(entity),
            Err(error) => {
                destroy_all(&spawned);
                return Err(error);
            }
        }
    }
    info!(entities = spawned.len(), duration_ms = args.duration_ms, "simulation started");

    let deadline = Instant::now() + Duration::from_millis(args.duration_ms);
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match events.recv_timeout(remaining) {
            Ok(event) => print_event(&event),
            Err(_) => break,
        }
    }

    for entity in &spawned {
        println!("ENTITY:{}", entity.entity.describe());
    }
    destroy_all(&spawned);
    while let Ok(event) = events.try_recv() {
        print_event(&event);
    }
    println!("RESULT:OK");
    Ok(0)
}

pub(crate) fn print_event(event: &Event) {
    match serde_json::to_string(event) {
        Ok(line) => println!("EVENT:{}", line),
        Err(error) => tracing::warn!(%error, "failed to serialize event"),
    }
}

fn destroy_all(spawned: &[SpawnedEntity]) {
    for entity in spawned {
        entity.destroy.destroy();
    }
}
