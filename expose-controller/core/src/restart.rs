//! Forces workloads to roll out when a config map they read changes.

use crate::{
    annotations,
    k8s::{ConfigMap, Deployment, EnvVar, ResourceExt},
};
use std::collections::{BTreeMap, BTreeSet};
use tracing::info;

/// Renders the data of `cm` as `key=value` pairs sorted by key and joined
/// with `;`.
pub fn fingerprint(cm: &ConfigMap) -> String {
    cm.data
        .iter()
        .flatten()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(";")
}

/// The environment variable carrying the fingerprint of `config_map`.
///
/// The name is upper-cased and every run of characters that may not appear
/// in an environment variable name becomes a single `_`. Leading runs are
/// dropped.
pub fn env_var_name(config_map: &str) -> String {
    let mut name = String::from(annotations::CONFIG_MAP_ENV_PREFIX);
    let mut last_valid = false;
    for c in config_map.chars().map(|c| c.to_ascii_uppercase()) {
        if c.is_ascii_uppercase() || c.is_ascii_digit() {
            name.push(c);
            last_valid = true;
        } else {
            if last_valid {
                name.push('_');
            }
            last_valid = false;
        }
    }
    name.push_str(annotations::CONFIG_MAP_ENV_SUFFIX);
    name
}

/// Returns true if `deployment` restarts when `config_map` changes.
pub fn depends_on(deployment: &Deployment, config_map: &str) -> bool {
    deployment
        .annotations()
        .get(annotations::UPDATE_ON_CHANGE)
        .is_some_and(|names| names.split(',').any(|n| n.trim() == config_map))
}

/// Stamps the fingerprint of `cm` into every container of the deployments
/// that depend on it.
///
/// Returns the names of the deployments that changed.
pub fn roll(cm: &ConfigMap, deployments: &mut BTreeMap<String, Deployment>) -> BTreeSet<String> {
    let config_map = cm.name_any();
    let env_name = env_var_name(&config_map);
    let version = fingerprint(cm);

    let mut changed = BTreeSet::new();
    for (name, deployment) in deployments.iter_mut() {
        if !depends_on(deployment, &config_map) {
            continue;
        }
        let containers = deployment
            .spec
            .iter_mut()
            .filter_map(|spec| spec.template.spec.as_mut())
            .flat_map(|pod| pod.containers.iter_mut());

        let mut updated = false;
        for container in containers {
            let env = container.env.get_or_insert_with(Vec::new);
            match env.iter_mut().find(|e| e.name == env_name) {
                Some(var) if var.value.as_deref() == Some(version.as_str()) => {}
                Some(var) => {
                    var.value = Some(version.clone());
                    var.value_from = None;
                    updated = true;
                }
                None => {
                    env.push(EnvVar {
                        name: env_name.clone(),
                        value: Some(version.clone()),
                        ..Default::default()
                    });
                    updated = true;
                }
            }
        }
        if updated {
            info!(deployment = %name, %config_map, "Rolling deployment");
            changed.insert(name.clone());
        }
    }
    changed
}
