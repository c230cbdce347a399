use anyhow::{Context, Result};
use serde::Deserialize;

/// Controller configuration.
///
/// Field names follow the keys of the controller's `config.yml`, so that an
/// existing configuration file can be loaded unchanged.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// One of `ingress`, `nodeport`, `loadbalancer`, `route`; detected when
    /// unset.
    pub exposer: Option<String>,

    /// The wildcard DNS domain that exposed hosts are created under.
    pub domain: Option<String>,

    /// An alternate domain, selected per service by annotation.
    pub internal_domain: Option<String>,

    #[serde(rename = "urltemplate")]
    pub url_template: Option<String>,

    #[serde(rename = "nodeIP")]
    pub node_ip: Option<String>,

    pub route_host: Option<String>,
    pub route_use_path: bool,

    /// `path` routes every service under the bare domain.
    pub path_mode: Option<String>,

    pub ingress_class: Option<String>,

    pub http: bool,

    #[serde(rename = "tls-acme")]
    pub tls_acme: bool,
    pub tls_secret_name: Option<String>,
    pub tls_use_wildcard: bool,

    #[serde(rename = "apiserver")]
    pub api_server: Option<String>,
    #[serde(rename = "apiserverProtocol")]
    pub api_server_protocol: Option<String>,
    #[serde(rename = "consoleURL")]
    pub console_url: Option<String>,

    /// When non-empty, only services with these names are handled.
    pub services: Vec<String>,
}

impl Config {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).context("failed to parse controller configuration")
    }
}

pub(crate) fn non_empty(s: &Option<String>) -> Option<&str> {
    s.as_deref().filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_config_yml() {
        let config = Config::from_yaml(
            r#"
exposer: Ingress
domain: 10.0.0.5.nip.io
urltemplate: "{{.Service}}-{{.Namespace}}.{{.Domain}}"
nodeIP: 10.0.0.5
pathMode: path
http: true
tls-acme: true
tlsSecretName: wildcard-tls
apiserver: api.example.com:6443
consoleURL: https://console.example.com
services:
  - web
  - api
"#,
        )
        .unwrap();

        assert_eq!(
            config,
            Config {
                exposer: Some("Ingress".to_string()),
                domain: Some("10.0.0.5.nip.io".to_string()),
                url_template: Some("{{.Service}}-{{.Namespace}}.{{.Domain}}".to_string()),
                node_ip: Some("10.0.0.5".to_string()),
                path_mode: Some("path".to_string()),
                http: true,
                tls_acme: true,
                tls_secret_name: Some("wildcard-tls".to_string()),
                api_server: Some("api.example.com:6443".to_string()),
                console_url: Some("https://console.example.com".to_string()),
                services: vec!["web".to_string(), "api".to_string()],
                ..Default::default()
            }
        );
    }
}
