mod bridge;
mod handle;
mod limits;
mod registry;

pub use bridge::{
    dynamic_to_float, dynamic_to_json, dynamic_to_text, parse_float_text, parse_size_text,
};
pub use handle::ScriptRuntime;
pub use limits::{sandboxed_engine, ScriptLimits};
pub use registry::{BehaviorRegistry, CompiledBehavior, BEHAVIOR_EXTENSION};

pub use rhai;
