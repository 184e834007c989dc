use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use rhai::{Engine, AST};
use tracing::debug;
use ve_core::VeError;
use walkdir::WalkDir;

use crate::limits::{sandboxed_engine, ScriptLimits};

pub const BEHAVIOR_EXTENSION: &str = "rhai";

#[derive(Debug)]
pub struct CompiledBehavior {
    name: String,
    ast: AST,
}

impl CompiledBehavior {
    pub fn new(name: impl Into<String>, mut ast: AST) -> Self {
        let name = name.into();
        ast.set_source(name.as_str());
        Self { name, ast }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ast(&self) -> &AST {
        &self.ast
    }
}

/// Compiled behaviors keyed by class name. Entries are added on first load and
/// never evicted, so every entity of a class shares one `AST`.
pub struct BehaviorRegistry {
    compiler: Engine,
    root: Option<PathBuf>,
    limits: ScriptLimits,
    programs: RwLock<BTreeMap<String, Arc<CompiledBehavior>>>,
}

impl Default for BehaviorRegistry {
    fn default() -> Self {
        Self::new(ScriptLimits::default())
    }
}

impl BehaviorRegistry {
    pub fn new(limits: ScriptLimits) -> Self {
        Self {
            compiler: sandboxed_engine(&limits),
            root: None,
            limits,
            programs: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn with_root(root: impl Into<PathBuf>, limits: ScriptLimits) -> Self {
        let mut registry = Self::new(limits);
        registry.root = Some(root.into());
        registry
    }

    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    pub fn limits(&self) -> &ScriptLimits {
        &self.limits
    }

    pub fn insert_source(
        &self,
        name: &str,
        source: &str,
    ) -> Result<Arc<CompiledBehavior>, VeError> {
        validate_name(name)?;
        if self.get(name).is_some() {
            return Err(VeError::new(
                "BEHAVIOR_DUPLICATE",
                format!("Behavior \"{}\" is already registered.", name),
            ));
        }
        let compiled = Arc::new(self.compile(name, source)?);
        self.programs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_string(), Arc::clone(&compiled));
        Ok(compiled)
    }

    pub fn load(&self, name: &str) -> Result<Arc<CompiledBehavior>, VeError> {
        if let Some(found) = self.get(name) {
            return Ok(found);
        }
        validate_name(name)?;
        let Some(root) = self.root.as_ref() else {
            return Err(VeError::new(
                "BEHAVIOR_NOT_FOUND",
                format!("Behavior \"{}\" is not registered.", name),
            ));
        };
        let path = root.join(format!("{}.{}", name, BEHAVIOR_EXTENSION));
        if !path.is_file() {
            return Err(VeError::new(
                "BEHAVIOR_NOT_FOUND",
                format!(
                    "Behavior \"{}\" is not registered and {} does not exist.",
                    name,
                    path.display()
                ),
            ));
        }
        let source = read_source(&path)?;
        let compiled = Arc::new(self.compile(name, &source)?);

        let mut programs = self.programs.write().unwrap_or_else(PoisonError::into_inner);
        // Another thread may have compiled the same class meanwhile; keep the first.
        let entry = programs
            .entry(name.to_string())
            .or_insert_with(|| Arc::clone(&compiled));
        Ok(Arc::clone(entry))
    }

    pub fn load_dir(&self, dir: &Path) -> Result<Vec<String>, VeError> {
        let mut loaded = Vec::new();
        for entry in WalkDir::new(dir).sort_by_file_name() {
            let entry = entry.map_err(|error| {
                VeError::new(
                    "SCRIPT_SOURCE_READ",
                    format!("Failed to walk {}: {}", dir.display(), error),
                )
            })?;
            let path = entry.path();
            if !entry.file_type().is_file()
                || path.extension().and_then(|ext| ext.to_str()) != Some(BEHAVIOR_EXTENSION)
            {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };
            let source = read_source(path)?;
            self.insert_source(name, &source)?;
            loaded.push(name.to_string());
        }
        debug!(target: "ve_script", dir = %dir.display(), count = loaded.len(), "behaviors loaded");
        Ok(loaded)
    }

    pub fn get(&self, name: &str) -> Option<Arc<CompiledBehavior>> {
        self.programs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.programs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.programs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn compile(&self, name: &str, source: &str) -> Result<CompiledBehavior, VeError> {
        let ast = self.compiler.compile(source).map_err(|error| {
            VeError::new(
                "SCRIPT_COMPILE",
                format!("Behavior \"{}\" failed to compile: {}", name, error),
            )
        })?;
        Ok(CompiledBehavior::new(name, ast))
    }
}

fn read_source(path: &Path) -> Result<String, VeError> {
    fs::read_to_string(path).map_err(|error| {
        VeError::new(
            "SCRIPT_SOURCE_READ",
            format!("Failed to read {}: {}", path.display(), error),
        )
    })
}

fn validate_name(name: &str) -> Result<(), VeError> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '-');
    if valid {
        Ok(())
    } else {
        Err(VeError::new(
            "BEHAVIOR_NAME_INVALID",
            format!("Behavior name \"{}\" is invalid.", name),
        ))
    }
}
