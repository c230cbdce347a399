//! Injects exposed URLs into `ConfigMap`s.
//!
//! Propagation is driven by annotations on the config maps themselves: a
//! config map opts in to receiving a value by naming the data key it should
//! be written to. Two contracts exist:
//!
//! - Any config map in the service's namespace may carry one of the
//!   [`Transform`] annotations scoped to the service's name.
//! - The config map named like the service may declare keys for the API
//!   server, console and cluster addresses, and the service may carry a list
//!   of [`LineRewrite`]s applied to that config map's values.

use crate::{
    annotations,
    k8s::{ConfigMap, IntOrString, ResourceExt, Service},
    patch, urls,
};
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Cluster-wide values available to the service-named config map.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Settings {
    pub api_server: Option<String>,
    pub api_server_protocol: String,
    pub console_url: Option<String>,

    /// The protocol written to keys named by the url-protocol annotation:
    /// `http` when the controller is configured for plain HTTP, else `https`.
    pub url_protocol: String,
}

/// A rendering of an exposed URL.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Transform {
    /// The URL without a trailing `/`.
    Plain,
    /// The URL with a trailing `/`.
    Full,
    /// The URL without its scheme or a trailing `/`.
    NoProtocol,
    /// The URL without its scheme, with a trailing `/`.
    FullNoProtocol,
    /// The scheme and host of the URL, with the path replaced by `/`.
    NoPath,
    /// Only the scheme of the URL.
    Protocol,
}

/// Rewrites the lines of a config map value that start with `prefix`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LineRewrite {
    pub key: String,
    pub expression: String,
    pub prefix: String,
    pub suffix: String,
}

/// The values a [`LineRewrite`] expression may refer to.
#[derive(Debug, Default)]
struct Values<'a> {
    host: Option<String>,
    url: &'a str,
    api_server: Option<&'a str>,
    api_server_url: Option<String>,
    api_server_protocol: &'a str,
    console_url: Option<&'a str>,
}

/// Computes the config maps that change when `svc` is propagated.
///
/// Only config maps whose data differs from `config_maps` are returned.
pub fn propagate(
    settings: &Settings,
    svc: &Service,
    config_maps: &BTreeMap<String, ConfigMap>,
) -> Vec<ConfigMap> {
    let service = svc.name_any();
    let url = patch::exposed_url(svc);

    let mut changed = Vec::new();
    for (name, original) in config_maps {
        let mut cm = original.clone();
        if *name == service {
            update_service_config_map(settings, svc, &mut cm);
        }
        if let Some(url) = url {
            apply_transforms(&service, url, &mut cm);
            let protocol_keys = cm.annotations().get(annotations::CONFIG_URL_PROTOCOL).cloned();
            if let Some(keys) = protocol_keys {
                for key in split_keys(&keys) {
                    set(&mut cm, key, &settings.url_protocol);
                }
            }
        }

        if cm.data != original.data {
            info!(namespace = %cm.namespace().unwrap_or_default(), config_map = %name, "Updating ConfigMap");
            changed.push(cm);
        }
    }
    changed
}

fn apply_transforms(service: &str, url: &str, cm: &mut ConfigMap) {
    for transform in Transform::ALL {
        let Some(keys) = cm.annotations().get(&transform.annotation_key(service)).cloned() else {
            continue;
        };
        let Some(value) = transform.apply(url) else {
            warn!(%url, ?transform, "Failed to transform exposed URL");
            continue;
        };
        for key in split_keys(&keys) {
            set(cm, key, &value);
        }
    }
}

fn update_service_config_map(settings: &Settings, svc: &Service, cm: &mut ConfigMap) {
    let declared = |cm: &ConfigMap, annotation: &str| {
        cm.annotations()
            .get(annotation)
            .filter(|k| !k.is_empty())
            .cloned()
    };

    let api_server_url = settings
        .api_server
        .as_ref()
        .map(|api| format!("{}://{api}", settings.api_server_protocol));
    if let (Some(api), Some(api_url)) = (&settings.api_server, &api_server_url) {
        if let Some(key) = declared(cm, annotations::CONFIG_API_SERVER_KEY) {
            set(cm, &key, api);
        }
        if let Some(key) = declared(cm, annotations::CONFIG_API_SERVER_URL_KEY) {
            set(cm, &key, api_url);
        }
    }
    if let Some(console) = &settings.console_url {
        if let Some(key) = declared(cm, annotations::CONFIG_CONSOLE_URL_KEY) {
            set(cm, &key, console);
        }
    }
    if let Some(key) = declared(cm, annotations::CONFIG_API_SERVER_PROTOCOL_KEY) {
        set(cm, &key, &settings.api_server_protocol);
    }

    update_cluster_ip(svc, cm);

    let Some(url) = patch::exposed_url(svc) else {
        return;
    };
    let host = urls::host(url);
    if host.is_none() {
        warn!(%url, service = %svc.name_any(), "Failed to parse exposed URL");
    }
    if let Some(key) = declared(cm, annotations::CONFIG_URL_KEY) {
        set(cm, &key, url);
    }
    if let (Some(host), Some(key)) = (&host, declared(cm, annotations::CONFIG_HOST_KEY)) {
        set(cm, &key, host);
    }
    if let Some(key) = declared(cm, annotations::CONFIG_PATH_KEY) {
        let path = urls::path(url).unwrap_or_else(|_| "/".to_string());
        debug!(%key, %path, "Found path key");
        set(cm, &key, &path);
    }

    let Some(yaml) = svc
        .annotations()
        .get(annotations::CONFIG_YAML)
        .filter(|y| !y.is_empty())
    else {
        return;
    };
    let rewrites = match serde_yaml::from_str::<Vec<LineRewrite>>(yaml) {
        Ok(rewrites) => rewrites,
        Err(error) => {
            warn!(service = %svc.name_any(), %error, "Failed to parse config YAML");
            return;
        }
    };
    let values = Values {
        host,
        url,
        api_server: settings.api_server.as_deref(),
        api_server_url,
        api_server_protocol: &settings.api_server_protocol,
        console_url: settings.console_url.as_deref(),
    };
    for rewrite in &rewrites {
        rewrite.apply(cm, &values);
    }
}

fn update_cluster_ip(svc: &Service, cm: &mut ConfigMap) {
    let Some(cluster_ip) = svc
        .spec
        .as_ref()
        .and_then(|spec| spec.cluster_ip.as_deref())
        .filter(|ip| !ip.is_empty() && *ip != "None")
    else {
        return;
    };

    // The service's declaration wins over the config map's.
    let declared = |annotation: &str| {
        [svc.annotations(), cm.annotations()]
            .into_iter()
            .find_map(|anns| anns.get(annotation).filter(|k| !k.is_empty()))
            .cloned()
    };
    let ip_key = declared(annotations::CONFIG_CLUSTER_IP_KEY);
    let ip_port_key = declared(annotations::CONFIG_CLUSTER_IP_PORT_KEY);
    let if_empty_key = declared(annotations::CONFIG_CLUSTER_IP_PORT_IF_EMPTY_KEY);

    if let Some(key) = ip_key {
        set(cm, &key, cluster_ip);
    }

    let Some(port) = target_port(svc) else {
        return;
    };
    let ip_port = format!("{cluster_ip}:{port}");
    if let Some(key) = ip_port_key {
        set(cm, &key, &ip_port);
    }
    if let Some(key) = if_empty_key {
        let data = cm.data.get_or_insert_with(Default::default);
        let value = data.entry(key).or_default();
        if value.is_empty() {
            *value = ip_port;
        }
    }
}

/// The first target port declared by `svc`.
fn target_port(svc: &Service) -> Option<String> {
    svc.spec
        .iter()
        .flat_map(|spec| spec.ports.iter().flatten())
        .find_map(|port| match port.target_port.as_ref()? {
            IntOrString::String(name) if !name.is_empty() => Some(name.clone()),
            IntOrString::Int(n) if *n > 0 => Some(n.to_string()),
            _ => None,
        })
}

fn split_keys(keys: &str) -> impl Iterator<Item = &str> {
    keys.split(',').map(str::trim).filter(|k| !k.is_empty())
}

fn set(cm: &mut ConfigMap, key: &str, value: &str) {
    let data = cm.data.get_or_insert_with(Default::default);
    if data.get(key).map(String::as_str) != Some(value) {
        debug!(config_map = %cm.metadata.name.as_deref().unwrap_or_default(), %key, "Setting key");
        data.insert(key.to_string(), value.to_string());
    }
}

// === impl Transform ===

impl Transform {
    pub const ALL: [Self; 6] = [
        Self::Plain,
        Self::Full,
        Self::NoProtocol,
        Self::FullNoProtocol,
        Self::NoPath,
        Self::Protocol,
    ];

    fn prefix(self) -> &'static str {
        match self {
            Self::Plain => "expose",
            Self::Full => "expose-full",
            Self::NoProtocol => "expose-no-protocol",
            Self::FullNoProtocol => "expose-full-no-protocol",
            Self::NoPath => "expose-no-path",
            Self::Protocol => "expose-protocol",
        }
    }

    /// The config map annotation that requests this rendering of `service`'s
    /// URL.
    pub fn annotation_key(self, service: &str) -> String {
        format!("{}.service-key.config.fabric8.io/{service}", self.prefix())
    }

    /// Renders `url`. Returns `None` when the URL cannot be parsed.
    pub fn apply(self, url: &str) -> Option<String> {
        let trimmed = url.strip_suffix('/').unwrap_or(url);
        let full = format!("{trimmed}/");
        match self {
            Self::Plain => Some(trimmed.to_string()),
            Self::Full => Some(full),
            Self::NoProtocol => Some(urls::strip_http_scheme(trimmed).to_string()),
            Self::FullNoProtocol => Some(urls::strip_http_scheme(&full).to_string()),
            Self::NoPath => urls::root(url).ok(),
            Self::Protocol => urls::scheme(url).map(Into::into),
        }
    }
}

// === impl LineRewrite ===

impl LineRewrite {
    fn apply(&self, cm: &mut ConfigMap, values: &Values<'_>) {
        let config_map = cm.name_any();
        if self.key.is_empty() {
            warn!(%config_map, rewrite = ?self, "Config YAML entry has no key");
            return;
        }
        let Some(replacement) = values.get(&self.expression).filter(|v| !v.is_empty()) else {
            warn!(%config_map, expression = %self.expression, "Could not calculate expression");
            return;
        };
        let Some(current) = cm
            .data
            .as_ref()
            .and_then(|data| data.get(&self.key))
            .filter(|v| !v.is_empty())
        else {
            warn!(%config_map, key = %self.key, "ConfigMap does not have the key to rewrite");
            return;
        };

        let rewritten = current
            .split('\n')
            .map(|line| {
                if line.starts_with(&self.prefix) {
                    format!("{}{replacement}{}", self.prefix, self.suffix)
                } else {
                    line.to_string()
                }
            })
            .collect::<Vec<_>>()
            .join("\n");
        set(cm, &self.key, &rewritten);
    }
}

impl Values<'_> {
    fn get(&self, expression: &str) -> Option<&str> {
        match expression {
            "host" => self.host.as_deref(),
            "url" => Some(self.url),
            "apiserver" => self.api_server,
            "apiserverURL" => self.api_server_url.as_deref(),
            "apiserverProtocol" => Some(self.api_server_protocol),
            "consoleURL" => self.console_url,
            _ => None,
        }
    }
}
