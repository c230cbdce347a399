use super::{app_name, ensure_markers, expose_port, finish, ExposeStrategy, Exposure, Tls};
use crate::{
    annotations,
    config::{non_empty, Config},
    k8s::{
        HTTPIngressPath, HTTPIngressRuleValue, Ingress, IngressBackend, IngressRule,
        IngressServiceBackend, IngressSpec, IngressTLS, ObjectMeta, ResourceExt, Service,
        ServiceBackendPort,
    },
    patch, urls, Snapshot, UrlTemplate, Write,
};
use anyhow::{Context, Result};
use tracing::{debug, info, warn};

const PATH_TYPE: &str = "ImplementationSpecific";

/// Exposes services through `Ingress` rules under a wildcard domain.
#[derive(Clone, Debug)]
pub struct IngressStrategy {
    domain: String,
    internal_domain: Option<String>,
    template: UrlTemplate,
    path_mode: Option<String>,
    ingress_class: Option<String>,
    tls: Tls,
}

/// Where a service is reachable once its ingress rule exists.
#[derive(Debug, PartialEq, Eq)]
struct Placement {
    /// The rule host.
    host: String,
    /// The rule path, if any.
    path: Option<String>,
    /// The host the service is exposed at, including the path in path mode.
    full_host: String,
    /// The host covered by the TLS certificate.
    tls_host: String,
    path_mode: bool,
}

// === impl IngressStrategy ===

impl IngressStrategy {
    pub fn new(config: &Config, domain: String) -> Result<Self> {
        let template = UrlTemplate::parse(non_empty(&config.url_template).unwrap_or_default())
            .context("failed to get a url format")?;
        info!(%domain, %template, "Using ingress domain");
        Ok(Self {
            domain,
            internal_domain: non_empty(&config.internal_domain).map(Into::into),
            template,
            path_mode: non_empty(&config.path_mode).map(Into::into),
            ingress_class: non_empty(&config.ingress_class).map(Into::into),
            tls: Tls::from_config(config),
        })
    }

    fn place(&self, svc: &Service, app: &str) -> Placement {
        let anns = svc.annotations();
        let namespace = svc.namespace().unwrap_or_default();

        let host_name = anns
            .get(annotations::HOST_NAME)
            .filter(|h| !h.is_empty())
            .map(String::as_str)
            .unwrap_or(app);

        let use_internal = anns
            .get(annotations::USE_INTERNAL_DOMAIN)
            .is_some_and(|v| v == "true");
        let domain = match &self.internal_domain {
            Some(internal) if use_internal => internal.as_str(),
            _ => self.domain.as_str(),
        };

        let host = self.template.render(host_name, &namespace, domain);
        let tls_host = if self.tls.wildcard {
            format!("*.{domain}")
        } else {
            host.clone()
        };

        let path = anns
            .get(annotations::INGRESS_PATH)
            .filter(|p| !p.is_empty())
            .cloned();
        let path_mode = anns
            .get(annotations::PATH_MODE)
            .filter(|m| !m.is_empty())
            .or(self.path_mode.as_ref())
            .is_some_and(|m| m == annotations::PATH_MODE_USE_PATH);

        if path_mode {
            let suffix = path.as_deref().unwrap_or("/");
            let path = urls::join(&["/", namespace.as_str(), app, suffix]);
            return Placement {
                full_host: urls::join(&[domain, path.as_str()]),
                host: domain.to_string(),
                path: Some(path),
                tls_host,
                path_mode,
            };
        }

        Placement {
            full_host: host.clone(),
            host,
            path,
            tls_host,
            path_mode,
        }
    }

    fn ingress_annotations(&self, svc: &Service, app: &str, meta: &mut ObjectMeta, path_mode: bool) {
        let anns = meta.annotations.get_or_insert_with(Default::default);

        if let Some(class) = &self.ingress_class {
            anns.insert(annotations::INGRESS_CLASS.to_string(), class.clone());
            anns.insert(annotations::NGINX_INGRESS_CLASS.to_string(), class.clone());
        }
        if path_mode {
            for key in [annotations::INGRESS_CLASS, annotations::NGINX_INGRESS_CLASS] {
                let class = anns.entry(key.to_string()).or_default();
                if class.is_empty() {
                    *class = annotations::DEFAULT_INGRESS_CLASS.to_string();
                }
            }
        }
        if self.tls.acme {
            anns.insert(annotations::TLS_ACME.to_string(), "true".to_string());
        }

        if let Some(extra) = svc.annotations().get(annotations::INGRESS_ANNOTATIONS) {
            for line in extra.lines().map(str::trim).filter(|l| !l.is_empty()) {
                match line.split_once(':') {
                    Some((key, value)) if !key.trim().is_empty() => {
                        anns.insert(key.trim().to_string(), value.trim().to_string());
                    }
                    _ => warn!(ingress = %app, %line, "Ignoring malformed ingress annotation"),
                }
            }
        }
    }
}

impl ExposeStrategy for IngressStrategy {
    fn add(&self, svc: &Service, snapshot: &Snapshot) -> Result<Exposure> {
        let app = app_name(svc);
        let name = svc.name_any();
        let placement = self.place(svc, &app);
        let tls = self.tls.enabled_for(svc);

        let existing = snapshot.ingresses.get(&app);
        let backend_paths = existing
            .and_then(|i| i.spec.as_ref())
            .and_then(|spec| spec.rules.as_ref())
            .and_then(|rules| rules.first())
            .and_then(|rule| rule.http.as_ref())
            .map(|http| http.paths.clone())
            .unwrap_or_default();

        let bound = backend_paths.iter().any(|p| {
            let backend = p.backend.service.as_ref().map(|s| s.name.as_str());
            backend == Some(name.as_str())
                && p.path.as_deref().filter(|p| !p.is_empty()) == placement.path.as_deref()
        });

        let mut writes = Vec::new();
        if bound {
            debug!(ingress = %app, path = ?placement.path, "Service path already routed");
        } else {
            let port = expose_port(svc)?;
            info!(service = %name, %port, path_mode = %placement.path_mode, path = ?placement.path, "Exposing service port");

            let mut ingress = existing.cloned().unwrap_or_else(|| Ingress {
                metadata: ObjectMeta {
                    namespace: svc.namespace(),
                    name: Some(app.clone()),
                    ..Default::default()
                },
                ..Default::default()
            });
            ensure_markers(&mut ingress.metadata, svc);
            self.ingress_annotations(svc, &app, &mut ingress.metadata, placement.path_mode);

            let mut paths = Vec::with_capacity(backend_paths.len() + 1);
            paths.push(HTTPIngressPath {
                backend: IngressBackend {
                    service: Some(IngressServiceBackend {
                        name: name.clone(),
                        port: Some(ServiceBackendPort {
                            number: Some(port),
                            name: None,
                        }),
                    }),
                    resource: None,
                },
                path: placement.path.clone(),
                path_type: PATH_TYPE.to_string(),
            });
            paths.extend(backend_paths);

            let spec = ingress.spec.get_or_insert_with(IngressSpec::default);
            spec.rules = Some(vec![IngressRule {
                host: Some(placement.host.clone()),
                http: Some(HTTPIngressRuleValue { paths }),
            }]);
            if tls {
                spec.tls = Some(vec![IngressTLS {
                    hosts: Some(vec![placement.tls_host.clone()]),
                    secret_name: self.tls.secret_for(&app),
                }]);
            }

            writes.push(if existing.is_some() {
                Write::ReplaceIngress(ingress)
            } else {
                Write::CreateIngress(ingress)
            });
        }

        let mut desired = svc.clone();
        let protocol = if tls { "https" } else { "http" };
        patch::add_annotation_with_protocol(&mut desired, &placement.full_host, protocol);
        finish(svc, desired, writes)
    }

    fn remove(&self, svc: &Service, snapshot: &Snapshot) -> Result<Exposure> {
        let app = app_name(svc);
        let mut writes = Vec::new();
        if snapshot.ingresses.contains_key(&app) {
            writes.push(Write::DeleteIngress {
                namespace: svc.namespace().unwrap_or_default(),
                name: app,
            });
        }

        let mut desired = svc.clone();
        patch::remove_annotation(&mut desired);
        finish(svc, desired, writes)
    }
}
