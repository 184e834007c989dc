use std::sync::Weak;

use ve_script::rhai::{Dynamic, Engine, ImmutableString, FLOAT, INT};
use ve_script::{dynamic_to_float, dynamic_to_text};

use crate::entity::VirtualEntity;

// Every function holds a weak handle and reads the entity's location at call
// time, so they are safe to install before the first placement.
pub(crate) fn install(engine: &mut Engine, entity: Weak<VirtualEntity>) {
    let owner = entity.clone();
    engine.register_fn("sendEvent", move |kind: Dynamic, body: Dynamic| {
        if let Some(entity) = owner.upgrade() {
            entity.send_event(&dynamic_to_text(&kind), dynamic_to_text(&body));
        }
    });

    let owner = entity.clone();
    engine.register_fn("getDistance", move |other: Dynamic| -> FLOAT {
        owner
            .upgrade()
            .map(|entity| entity.distance_to(&dynamic_to_text(&other)))
            .unwrap_or(FLOAT::NAN)
    });

    let owner = entity.clone();
    engine.register_fn(
        "getDistanceFrom",
        move |other: Dynamic, x: Dynamic, y: Dynamic| -> FLOAT {
            let point = (
                dynamic_to_float(&x).unwrap_or(0.0),
                dynamic_to_float(&y).unwrap_or(0.0),
            );
            owner
                .upgrade()
                .map(|entity| entity.distance_from(&dynamic_to_text(&other), point))
                .unwrap_or(FLOAT::NAN)
        },
    );

    let owner = entity.clone();
    engine.register_fn("getLevWidth", move || -> INT {
        owner
            .upgrade()
            .map(|entity| INT::from(entity.terrain().width))
            .unwrap_or(0)
    });

    let owner = entity.clone();
    engine.register_fn("getLevHeight", move || -> INT {
        owner
            .upgrade()
            .map(|entity| INT::from(entity.terrain().height))
            .unwrap_or(0)
    });

    let owner = entity.clone();
    engine.register_fn("despawn", move || {
        if let Some(entity) = owner.upgrade() {
            entity.close();
        }
    });

    let owner = entity;
    engine.register_fn("log", move |message: ImmutableString| {
        if let Some(entity) = owner.upgrade() {
            entity.script_log(message.as_str());
        }
    });
}
