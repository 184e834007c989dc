use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use ve_core::VeError;
use ve_runtime::{
    destroy_channel, DestroyHandle, Entity, EntityOptions, EntityRegion, MemoryRegion,
    RuntimeConfig, VirtualEntity,
};
use ve_script::{BehaviorRegistry, ScriptLimits};

#[derive(Clone)]
pub struct SpawnOptions {
    pub behavior: String,
    pub id: Option<String>,
    pub position: Option<(f64, f64)>,
    pub entity: EntityOptions,
}

impl SpawnOptions {
    pub fn new(behavior: impl Into<String>) -> Self {
        Self {
            behavior: behavior.into(),
            id: None,
            position: None,
            entity: EntityOptions::default(),
        }
    }
}

pub struct SpawnedEntity {
    pub entity: Arc<VirtualEntity>,
    pub destroy: DestroyHandle,
}

impl SpawnedEntity {
    pub fn id(&self) -> &str {
        self.entity.id()
    }
}

pub fn registry_from_dir(dir: &Path, limits: ScriptLimits) -> Result<BehaviorRegistry, VeError> {
    if !dir.is_dir() {
        return Err(VeError::new(
            "BEHAVIOR_DIR_NOT_FOUND",
            format!("Behavior directory {} does not exist.", dir.display()),
        ));
    }
    let registry = BehaviorRegistry::with_root(dir, limits);
    registry.load_dir(dir)?;
    Ok(registry)
}

pub fn registry_from_sources(
    sources: &BTreeMap<String, String>,
    limits: ScriptLimits,
) -> Result<BehaviorRegistry, VeError> {
    let registry = BehaviorRegistry::new(limits);
    for (name, source) in sources {
        registry.insert_source(name, source)?;
    }
    Ok(registry)
}

pub fn load_runtime_config(path: &Path) -> Result<RuntimeConfig, VeError> {
    RuntimeConfig::load(path)
}

// Adds the entity to the region before placing it, so `setup` can already
// find it through the region.
pub fn spawn_entity(
    registry: &BehaviorRegistry,
    region: &Arc<MemoryRegion>,
    options: SpawnOptions,
) -> Result<SpawnedEntity, VeError> {
    let SpawnOptions {
        behavior,
        id,
        position,
        entity: entity_options,
    } = options;
    let entity = match id {
        Some(id) => {
            if region.get_entity(&id).is_some() {
                return Err(VeError::new(
                    "ENTITY_ID_TAKEN",
                    format!("Entity \"{}\" already exists in region.", id),
                ));
            }
            VirtualEntity::with_id(id, registry, &behavior, entity_options)?
        }
        None => VirtualEntity::new(registry, &behavior, entity_options)?,
    };
    region.add_entity(entity.clone());
    match position {
        Some((x, y)) => entity.place_at(region.clone(), x, y),
        None => entity.set_location(region.clone()),
    }
    let (destroy, listener) = destroy_channel();
    entity.killer(listener);
    Ok(SpawnedEntity { entity, destroy })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::{Duration, SystemTime, UNIX_EPOCH};
    use ve_core::Terrain;
    use ve_runtime::Phase;

    const TRADER: &str = r#"
        fn setup() { this.x = 0.0; this.y = 0.0; this.gold = 5; }
        fn setPosition(x, y) { this.x = x; this.y = y; }
        fn getX() { this.x }
        fn getY() { this.y }
        fn getData() { #{ gold: this.gold, x: this.x } }
    "#;

    fn map(entries: &[(&str, &str)]) -> BTreeMap<String, String> {
        entries
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    fn temp_dir(label: &str) -> std::path::PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock should be after epoch")
            .as_nanos();
        let dir = std::env::temp_dir().join(format!("ve-api-{}-{}", label, nanos));
        fs::create_dir_all(&dir).expect("temp dir should be created");
        dir
    }

    #[test]
    fn spawn_entity_places_and_registers_killer() {
        let registry = registry_from_sources(&map(&[("trader", TRADER)]), ScriptLimits::default())
            .expect("sources should compile");
        let region = Arc::new(MemoryRegion::new("market", Terrain::new(20, 20)));
        let mut options = SpawnOptions::new("trader");
        options.id = Some("t1".to_string());
        options.position = Some((4.0, 2.0));
        let spawned = spawn_entity(&registry, &region, options).expect("spawn should work");
        assert_eq!(spawned.id(), "t1");
        assert_eq!(spawned.entity.position(), (4.0, 2.0));
        assert_eq!(spawned.entity.describe(), r#"{"id":"t1","gold":5,"x":4.0}"#);
        assert!(region.get_entity("t1").is_some());

        spawned.destroy.destroy();
        assert_eq!(spawned.entity.phase(), Phase::Closed);
        assert!(region.get_entity("t1").is_none());
    }

    #[test]
    fn spawn_entity_rejects_taken_ids() {
        let registry = registry_from_sources(&map(&[("trader", TRADER)]), ScriptLimits::default())
            .expect("sources should compile");
        let region = Arc::new(MemoryRegion::new("market", Terrain::new(20, 20)));
        let mut options = SpawnOptions::new("trader");
        options.id = Some("t1".to_string());
        let first = spawn_entity(&registry, &region, options.clone()).expect("spawn should work");
        let error = spawn_entity(&registry, &region, options)
            .err()
            .expect("second spawn should fail");
        assert_eq!(error.code, "ENTITY_ID_TAKEN");
        first.destroy.destroy();
    }

    #[test]
    fn spawn_entity_reports_unknown_behavior() {
        let registry = BehaviorRegistry::default();
        let region = Arc::new(MemoryRegion::new("market", Terrain::new(20, 20)));
        let error = spawn_entity(&registry, &region, SpawnOptions::new("ghost"))
            .err()
            .expect("unknown behavior should fail");
        assert_eq!(error.code, "BEHAVIOR_NOT_FOUND");
        assert!(region.is_empty());
    }

    #[test]
    fn registry_from_dir_loads_all_behaviors() {
        let dir = temp_dir("registry");
        fs::write(dir.join("trader.rhai"), TRADER).expect("behavior should write");
        let registry =
            registry_from_dir(&dir, ScriptLimits::default()).expect("registry should load");
        assert_eq!(registry.names(), vec!["trader".to_string()]);
        let _ = fs::remove_dir_all(dir);

        let error = registry_from_dir(Path::new("/definitely/not/here"), ScriptLimits::default())
            .err()
            .expect("missing dir should fail");
        assert_eq!(error.code, "BEHAVIOR_DIR_NOT_FOUND");
    }

    #[test]
    fn load_runtime_config_reads_json_file() {
        let dir = temp_dir("config");
        let path = dir.join("runtime.json");
        fs::write(&path, r#"{"tickIntervalMs": 50}"#).expect("config should write");
        let config = load_runtime_config(&path).expect("config should load");
        assert_eq!(
            config.entity_options().tick_interval,
            Duration::from_millis(50)
        );
        let _ = fs::remove_dir_all(dir);
    }
}
