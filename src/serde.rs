//! JSON round-trip for entities, driven by component metadata services.
//!
//! An entity is stored as one object mapping component friendly names to
//! member data:
//!
//! ```json
//! {
//!     "components": {
//!         "Transform": { "position": {"x": 10.0, "y": 20.0}, "rotation": 45.0 },
//!         "Tag": { "name": "hero" }
//!     }
//! }
//! ```
//!
//! Files live at `<root>/entities/<name>.json`. Serialization invokes
//! each owned component's `"serialize"` service; types without one are
//! skipped. Deserialization runs in two passes: first every listed
//! component is allocated through the runtime-typed add, then each
//! `"deserialize"` service fills the allocated component in.
//!
//! Deserialization is lenient, member by member: a member missing from
//! the stored object keeps its default and logs a warning naming entity,
//! component, and member; a member whose stored value doesn't fit its
//! type (an unknown enum variant name, say) keeps the default with an
//! error log; stored keys that match no member are ignored.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::component::Component;
use crate::meta::{self, service_names};
use crate::registry::{Entity, Registry};

/// Signature convention of the `"serialize"` service.
pub type SerializeFn = fn(&dyn Component) -> serde_json::Result<Value>;
/// Signature convention of the `"deserialize"` service. The `&str` is the
/// component's friendly name, for log messages.
pub type DeserializeFn = fn(&mut dyn Component, &Value, Entity, &str);

#[derive(Debug, Error)]
pub enum SerdeError {
    #[error("entity {0:?} is not alive")]
    DeadEntity(Entity),
    #[error("entity data has no \"components\" object")]
    MalformedFile,
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// The `"serialize"` service installed by
/// [`MetaBuilder::serde`](crate::component::MetaBuilder::serde).
pub fn serialize_thunk<C: Component + Serialize>(
    comp: &dyn Component,
) -> serde_json::Result<Value> {
    // SAFETY: services are only invoked through their own type's metadata
    // entry.
    let comp: &C = unsafe { comp.downcast_ref().unwrap_unchecked() };
    serde_json::to_value(comp)
}

/// The `"deserialize"` service installed by
/// [`MetaBuilder::serde`](crate::component::MetaBuilder::serde).
pub fn deserialize_thunk<C>(comp: &mut dyn Component, stored: &Value, entity: Entity, name: &str)
where
    C: Component + Serialize + DeserializeOwned + Default,
{
    let defaults = match serde_json::to_value(C::default()) {
        Ok(it) => it,
        Err(err) => {
            tracing::error!("component {} can't serialize its default: {}", name, err);
            return;
        }
    };

    let rebuilt = match (&defaults, stored.as_object()) {
        (Value::Object(default_members), Some(stored_members)) => {
            rebuild_members::<C>(default_members, stored_members, entity, name)
        }
        // Tuple and newtype components have no member names to merge
        // over; they round-trip whole.
        _ => match serde_json::from_value::<C>(stored.clone()) {
            Ok(it) => it,
            Err(err) => {
                tracing::error!(
                    "entity {:?} component {}: {}; keeping default",
                    entity,
                    name,
                    err
                );
                C::default()
            }
        },
    };

    // SAFETY: services are only invoked through their own type's metadata
    // entry.
    let comp: &mut C = unsafe { comp.downcast_mut().unwrap_unchecked() };
    *comp = rebuilt;
}

/// Apply `stored` over the serialized default one member at a time, so a
/// single bad member can't take the rest of the component down with it.
fn rebuild_members<C>(
    default_members: &Map<String, Value>,
    stored_members: &Map<String, Value>,
    entity: Entity,
    name: &str,
) -> C
where
    C: DeserializeOwned + Default,
{
    let mut current = Value::Object(default_members.clone());

    for (member, default_value) in default_members {
        let Some(stored_value) = stored_members.get(member) else {
            tracing::warn!(
                "entity {:?} component {} member {} missing; keeping default",
                entity,
                name,
                member
            );
            continue;
        };

        let merged = merge_member(default_value, stored_value, entity, name, member);
        let mut candidate = current.clone();
        candidate[member.as_str()] = merged;
        match serde_json::from_value::<C>(candidate.clone()) {
            Ok(_) => current = candidate,
            Err(err) => tracing::error!(
                "entity {:?} component {} member {}: {}; keeping default",
                entity,
                name,
                member,
                err
            ),
        }
    }

    match serde_json::from_value(current) {
        Ok(it) => it,
        Err(err) => {
            tracing::error!(
                "entity {:?} component {}: {}; keeping default",
                entity,
                name,
                err
            );
            C::default()
        }
    }
}

/// Objects merge recursively key-by-key against the default's shape, so
/// nested missing members also keep defaults and get their own warnings.
/// Anything else takes the stored value as-is.
fn merge_member(
    default: &Value,
    stored: &Value,
    entity: Entity,
    name: &str,
    path: &str,
) -> Value {
    match (default, stored) {
        (Value::Object(default_map), Value::Object(stored_map)) => {
            let mut out = Map::new();
            for (key, default_value) in default_map {
                match stored_map.get(key) {
                    Some(stored_value) => {
                        let child_path = format!("{}.{}", path, key);
                        out.insert(
                            key.clone(),
                            merge_member(default_value, stored_value, entity, name, &child_path),
                        );
                    }
                    None => {
                        tracing::warn!(
                            "entity {:?} component {} member {}.{} missing; keeping default",
                            entity,
                            name,
                            path,
                            key
                        );
                        out.insert(key.clone(), default_value.clone());
                    }
                }
            }
            Value::Object(out)
        }
        _ => stored.clone(),
    }
}

/// Serialize every component of `entity` that registered a serialize
/// service.
pub fn serialize_entity(registry: &Registry, entity: Entity) -> Result<Value, SerdeError> {
    if !registry.is_alive(entity) {
        return Err(SerdeError::DeadEntity(entity));
    }

    let mut components = Map::new();
    registry.each_component(entity, |id, comp| {
        let metadata = meta::resolve(id).expect("live component with unknown type id");
        let Some(serialize) = metadata.service::<SerializeFn>(service_names::SERIALIZE) else {
            return;
        };
        match serialize(comp) {
            Ok(value) => {
                components.insert(metadata.name.to_owned(), value);
            }
            Err(err) => tracing::error!(
                "failed to serialize {} on {:?}: {}",
                metadata.name,
                entity,
                err
            ),
        }
    });

    let mut root = Map::new();
    root.insert("components".to_owned(), Value::Object(components));
    Ok(Value::Object(root))
}

/// Rebuild components onto `entity` from serialized data. Unknown
/// component names log a warning and are skipped.
pub fn deserialize_entity(
    registry: &mut Registry,
    entity: Entity,
    value: &Value,
) -> Result<(), SerdeError> {
    if !registry.is_alive(entity) {
        return Err(SerdeError::DeadEntity(entity));
    }
    let components = value
        .get("components")
        .and_then(Value::as_object)
        .ok_or(SerdeError::MalformedFile)?;

    // Allocate everything first, so by the time anything is filled in the
    // entity already has its full shape.
    for name in components.keys() {
        match meta::resolve_name(name) {
            Some(metadata) => registry.add_dyn(entity, metadata.id, None),
            None => tracing::warn!("unknown component type {:?} in entity data, skipping", name),
        }
    }

    for (name, stored) in components {
        let Some(metadata) = meta::resolve_name(name) else {
            continue;
        };
        let Some(deserialize) = metadata.service::<DeserializeFn>(service_names::DESERIALIZE)
        else {
            tracing::warn!("component type {} has no deserialize service", metadata.name);
            continue;
        };
        let Some(entry) = registry.entry_mut(entity, metadata.id) else {
            continue;
        };
        let boxed = entry.get_mut().unwrap();
        deserialize(&mut **boxed, stored, entity, metadata.name);
    }
    Ok(())
}

/// Where an entity named `name` lives on disk, relative to the resource
/// root.
pub fn entity_path(root: &Path, name: &str) -> PathBuf {
    root.join("entities").join(format!("{}.json", name))
}

pub fn save_entity(
    registry: &Registry,
    entity: Entity,
    root: &Path,
    name: &str,
) -> Result<(), SerdeError> {
    let value = serialize_entity(registry, entity)?;
    let path = entity_path(root, name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&path, serde_json::to_string_pretty(&value)?)?;
    Ok(())
}

/// Create a fresh entity from `<root>/entities/<name>.json`.
pub fn load_entity(registry: &mut Registry, root: &Path, name: &str) -> Result<Entity, SerdeError> {
    let text = fs::read_to_string(entity_path(root, name))?;
    let value: Value = serde_json::from_str(&text)?;

    let entity = registry.create();
    if let Err(err) = deserialize_entity(registry, entity, &value) {
        registry.destroy(entity);
        return Err(err);
    }
    Ok(entity)
}
