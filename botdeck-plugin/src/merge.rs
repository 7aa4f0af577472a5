//! Field-level merge rules for installed-plugin records.
//!
//! Stored records stay minimal: an environment, settings map or dependency
//! list that ends up empty is dropped from the record instead of being
//! persisted as `{}` / `[]`.

use botdeck_core::model::{FieldUpdate, InstalledPluginRecord, PluginUpdate};
use std::collections::BTreeMap;

/// `Some(map)` unless the map is empty.
pub fn non_empty<V>(map: BTreeMap<String, V>) -> Option<BTreeMap<String, V>> {
    if map.is_empty() { None } else { Some(map) }
}

/// Lay `overrides` over `base`; override wins per key.
pub fn overlay<V: Clone>(
    mut base: BTreeMap<String, V>,
    overrides: Option<&BTreeMap<String, V>>,
) -> Option<BTreeMap<String, V>> {
    if let Some(overrides) = overrides {
        for (k, v) in overrides {
            base.insert(k.clone(), v.clone());
        }
    }
    non_empty(base)
}

/// Apply a tri-state map update to a stored map.
///
/// `{}` clears, like `null` does.
pub fn apply_map_update<V: Clone>(
    current: Option<BTreeMap<String, V>>,
    update: FieldUpdate<BTreeMap<String, V>>,
) -> Option<BTreeMap<String, V>> {
    match update {
        FieldUpdate::Keep => current,
        FieldUpdate::Clear => None,
        FieldUpdate::Set(incoming) if incoming.is_empty() => None,
        FieldUpdate::Set(incoming) => overlay(current.unwrap_or_default(), Some(&incoming)),
    }
}

/// Lists are replaced wholesale, never merged.
pub fn apply_list_update<T>(
    current: Option<Vec<T>>,
    update: FieldUpdate<Vec<T>>,
) -> Option<Vec<T>> {
    match update {
        FieldUpdate::Keep => current,
        FieldUpdate::Clear => None,
        FieldUpdate::Set(list) if list.is_empty() => None,
        FieldUpdate::Set(list) => Some(list),
    }
}

/// Apply a partial update in place. Version, install time and dependency
/// tags are never touched.
pub fn apply_update(record: &mut InstalledPluginRecord, update: PluginUpdate) {
    record.environment = apply_map_update(record.environment.take(), update.environment);
    record.settings = apply_map_update(record.settings.take(), update.settings);
    record.dependencies = apply_list_update(record.dependencies.take(), update.dependencies);
    if let Some(enabled) = update.enabled {
        record.enabled = enabled;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use botdeck_core::model::{EnvValue, Environment, PluginDependency};
    use chrono::Utc;

    fn env(pairs: &[(&str, &str)]) -> Environment {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), EnvValue::from(*v)))
            .collect()
    }

    #[test]
    fn overlay_prefers_override() {
        let merged = overlay(env(&[("A", ""), ("B", "x")]), Some(&env(&[("A", "set")]))).unwrap();
        assert_eq!(merged, env(&[("A", "set"), ("B", "x")]));
    }

    #[test]
    fn overlay_of_nothing_is_none() {
        assert!(overlay(Environment::new(), None).is_none());
        assert!(overlay(Environment::new(), Some(&Environment::new())).is_none());
    }

    #[test]
    fn keep_leaves_current_value() {
        let current = Some(env(&[("A", "1")]));
        assert_eq!(apply_map_update(current.clone(), FieldUpdate::Keep), current);
        assert_eq!(apply_map_update::<EnvValue>(None, FieldUpdate::Keep), None);
    }

    #[test]
    fn null_and_empty_object_both_clear() {
        let current = Some(env(&[("A", "1")]));
        assert_eq!(apply_map_update(current.clone(), FieldUpdate::Clear), None);
        assert_eq!(apply_map_update(current, FieldUpdate::Set(Environment::new())), None);
    }

    #[test]
    fn set_merges_key_by_key() {
        let current = Some(env(&[("A", "1"), ("B", "2")]));
        let merged = apply_map_update(current, FieldUpdate::Set(env(&[("B", "20"), ("C", "3")])));
        assert_eq!(merged, Some(env(&[("A", "1"), ("B", "20"), ("C", "3")])));
    }

    #[test]
    fn set_on_absent_field_creates_it() {
        let merged = apply_map_update(None, FieldUpdate::Set(env(&[("A", "1")])));
        assert_eq!(merged, Some(env(&[("A", "1")])));
    }

    #[test]
    fn list_update_replaces_or_clears() {
        let current = Some(vec![PluginDependency::named("a")]);
        assert_eq!(
            apply_list_update(
                current.clone(),
                FieldUpdate::Set(vec![PluginDependency::named("b")])
            ),
            Some(vec![PluginDependency::named("b")])
        );
        assert_eq!(apply_list_update(current.clone(), FieldUpdate::Set(vec![])), None);
        assert_eq!(apply_list_update(current.clone(), FieldUpdate::Clear), None);
        assert_eq!(apply_list_update(current.clone(), FieldUpdate::Keep), current);
    }

    #[test]
    fn apply_update_touches_only_requested_fields() {
        let mut record = InstalledPluginRecord::new("1.0.0", Utc::now());
        record.environment = Some(env(&[("TOKEN", "abc")]));
        record.is_dependency = Some(true);
        record.dependent_plugin = Some("owner".into());
        let installed_at = record.installed_at;

        apply_update(
            &mut record,
            PluginUpdate {
                enabled: Some(false),
                ..PluginUpdate::default()
            },
        );

        assert!(!record.enabled);
        assert_eq!(record.environment, Some(env(&[("TOKEN", "abc")])));
        assert_eq!(record.version, "1.0.0");
        assert_eq!(record.installed_at, installed_at);
        assert!(record.is_dependency_of("owner"));
    }
}
