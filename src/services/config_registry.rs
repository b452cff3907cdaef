use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use dashmap::DashMap;
use tracing::{info, instrument, warn};

use crate::models::{AssemblyTypeConfig, ComponentSpec, SensorGroup, COMPONENT_COUNT};
use crate::store::RemoteStore;

/// Sensor count assumed when an unknown type arrives without an explicit
/// layout hint.
const DEFAULT_SENSOR_COUNT: u16 = 16;

/// Default component templates applied when synthesizing a configuration for
/// an unrecognized assembly type: (id, item code, name, verification code).
const DEFAULT_COMPONENTS: [(&str, &str, &str, Option<&str>); COMPONENT_COUNT as usize] = [
    ("C1", "CTRL-MAIN", "Main controller board", Some("MCB")),
    ("C2", "PWR-SUP", "Power supply", Some("PSU")),
    ("C3", "WIRE-HARN", "Wiring harness", Some("L")),
    ("C4", "BACKPLANE", "Backplane", Some("3Q4")),
    ("C5", "DISP-MOD", "Display module", Some("DSP")),
    ("C6", "ENCL-COV", "Enclosure cover", None),
];

fn components_from_templates() -> Vec<ComponentSpec> {
    DEFAULT_COMPONENTS
        .iter()
        .enumerate()
        .map(|(i, (id, item_code, name, code))| ComponentSpec {
            id: (*id).to_string(),
            item_code: (*item_code).to_string(),
            name: (*name).to_string(),
            verification_code: code.map(str::to_string),
            sequence_index: i as u16 + 1,
        })
        .collect()
}

fn sensor_item_codes(count: u16) -> HashMap<u16, String> {
    (1..=count)
        .map(|pos| (pos, format!("SNS-{:02}", pos)))
        .collect()
}

fn positions(range: std::ops::RangeInclusive<u16>) -> BTreeSet<u16> {
    range.collect()
}

/// Per-assembly-type scan specifications: a static catalog plus a
/// deterministic fallback for unanticipated variants, so the sequencer stays
/// operable rather than failing hard on an unknown type.
pub struct ConfigRegistry {
    known: HashMap<String, Arc<AssemblyTypeConfig>>,
    /// Synthesized fallbacks, cached so repeated lookups within a session
    /// are stable.
    synthesized: DashMap<String, Arc<AssemblyTypeConfig>>,
}

impl ConfigRegistry {
    pub fn with_builtin_catalog() -> Self {
        let mut known = HashMap::new();
        for config in [Self::rk_600_23a(), Self::rk_600_16b()] {
            known.insert(config.id.clone(), Arc::new(config));
        }
        Self {
            known,
            synthesized: DashMap::new(),
        }
    }

    /// Resolves an assembly type. Unknown ids synthesize a configuration
    /// from the caller-supplied sensor count (an explicit parameter, never
    /// read from presentation state) and the default item-code templates.
    #[instrument(skip(self))]
    pub fn resolve(&self, assembly_type_id: &str, sensor_count: Option<u16>) -> Arc<AssemblyTypeConfig> {
        if let Some(config) = self.known.get(assembly_type_id) {
            return config.clone();
        }
        if let Some(cached) = self.synthesized.get(assembly_type_id) {
            return cached.value().clone();
        }
        let count = sensor_count.unwrap_or(DEFAULT_SENSOR_COUNT);
        warn!(
            assembly_type_id,
            sensor_count = count,
            "unknown assembly type; synthesizing fallback configuration"
        );
        let config = Arc::new(Self::synthesize(assembly_type_id, count));
        self.synthesized
            .insert(assembly_type_id.to_string(), config.clone());
        config
    }

    pub fn known_configs(&self) -> impl Iterator<Item = &Arc<AssemblyTypeConfig>> {
        self.known.values()
    }

    /// Overlays verification codes from the durable store's item lookup onto
    /// a resolved configuration. Lookup failures keep the static codes.
    pub async fn refresh_verification_codes(
        &self,
        config: &AssemblyTypeConfig,
        remote: &dyn RemoteStore,
    ) -> Arc<AssemblyTypeConfig> {
        let mut refreshed = config.clone();
        for component in &mut refreshed.components {
            match remote.lookup_item_verification_info(&component.item_code).await {
                Ok(info) => {
                    if let Some(code) = info.verification_code {
                        component.verification_code = Some(code);
                    }
                }
                Err(err) => {
                    info!(
                        item_code = %component.item_code,
                        "verification lookup unavailable, keeping static code: {}",
                        err
                    );
                }
            }
        }
        for group in &mut refreshed.sensor_groups {
            // Auto-pass groups stay auto-pass; keyed lookups use the item
            // code of the group's first position.
            if group.code.is_none() {
                continue;
            }
            let Some(first) = group.positions.iter().next() else {
                continue;
            };
            let Some(item_code) = refreshed.sensor_item_codes.get(first) else {
                continue;
            };
            match remote.lookup_item_verification_info(item_code).await {
                Ok(info) => {
                    if let Some(code) = info.verification_code {
                        group.code = Some(code);
                    }
                }
                Err(err) => {
                    info!(
                        item_code = %item_code,
                        "sensor verification lookup unavailable, keeping static code: {}",
                        err
                    );
                }
            }
        }
        Arc::new(refreshed)
    }

    fn synthesize(assembly_type_id: &str, sensor_count: u16) -> AssemblyTypeConfig {
        AssemblyTypeConfig {
            id: assembly_type_id.to_string(),
            components: components_from_templates(),
            sensor_count,
            // Fallback sensors auto-pass: the variant is unanticipated, so
            // no verification scheme exists for its sensor layout yet.
            sensor_groups: vec![SensorGroup {
                code: None,
                positions: positions(1..=sensor_count),
            }],
            sensor_item_codes: sensor_item_codes(sensor_count),
        }
    }

    /// 23-sensor variant: thermal sensors 1-8, pressure sensors 9-16,
    /// unverified auxiliary positions 17-23.
    fn rk_600_23a() -> AssemblyTypeConfig {
        AssemblyTypeConfig {
            id: "RK-600-23A".to_string(),
            components: components_from_templates(),
            sensor_count: 23,
            sensor_groups: vec![
                SensorGroup {
                    code: Some("TS".to_string()),
                    positions: positions(1..=8),
                },
                SensorGroup {
                    code: Some("PS".to_string()),
                    positions: positions(9..=16),
                },
                SensorGroup {
                    code: None,
                    positions: positions(17..=23),
                },
            ],
            sensor_item_codes: sensor_item_codes(23),
        }
    }

    /// 16-sensor variant: thermal sensors 1-8, pressure sensors 9-16.
    fn rk_600_16b() -> AssemblyTypeConfig {
        AssemblyTypeConfig {
            id: "RK-600-16B".to_string(),
            components: components_from_templates(),
            sensor_count: 16,
            sensor_groups: vec![
                SensorGroup {
                    code: Some("TS".to_string()),
                    positions: positions(1..=8),
                },
                SensorGroup {
                    code: Some("PS".to_string()),
                    positions: positions(9..=16),
                },
            ],
            sensor_item_codes: sensor_item_codes(16),
        }
    }
}

impl Default for ConfigRegistry {
    fn default() -> Self {
        Self::with_builtin_catalog()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ServiceError;
    use crate::store::remote::{MockRemoteStore, VerificationInfo};

    #[test]
    fn known_type_resolves_to_static_definition() {
        let registry = ConfigRegistry::with_builtin_catalog();
        let config = registry.resolve("RK-600-23A", None);
        assert_eq!(config.sensor_count, 23);
        assert_eq!(config.total_expected(), 29);
    }

    #[test]
    fn unknown_type_synthesizes_from_explicit_sensor_count() {
        let registry = ConfigRegistry::with_builtin_catalog();
        let config = registry.resolve("RK-999-XX", Some(11));
        assert_eq!(config.sensor_count, 11);
        config.validate().expect("synthesized config must validate");
        // Fallback sensors auto-pass.
        assert!(config.sensor_group_for(5).unwrap().code.is_none());
    }

    #[test]
    fn synthesized_config_is_cached_for_session_stability() {
        let registry = ConfigRegistry::with_builtin_catalog();
        let first = registry.resolve("RK-999-XX", Some(11));
        // A later lookup with a different hint still returns the cached config.
        let second = registry.resolve("RK-999-XX", Some(30));
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn refresh_overlays_remote_codes_and_tolerates_failures() {
        let registry = ConfigRegistry::with_builtin_catalog();
        let config = registry.resolve("RK-600-16B", None);

        let mut remote = MockRemoteStore::new();
        remote
            .expect_lookup_item_verification_info()
            .returning(|item_code| {
                if item_code == "CTRL-MAIN" {
                    Ok(VerificationInfo {
                        verification_code: Some("MCB9".to_string()),
                        description: None,
                    })
                } else {
                    Err(ServiceError::Connectivity("store offline".into()))
                }
            });

        let refreshed = registry.refresh_verification_codes(&config, &remote).await;
        assert_eq!(
            refreshed.component_at(1).unwrap().verification_code.as_deref(),
            Some("MCB9")
        );
        // All other codes fall back to the static definition.
        assert_eq!(
            refreshed.component_at(4).unwrap().verification_code.as_deref(),
            Some("3Q4")
        );
        assert_eq!(
            refreshed.sensor_group_for(1).unwrap().code.as_deref(),
            Some("TS")
        );
    }
}
