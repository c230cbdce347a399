use super::{
    app_name, ensure_markers, expose_port, finish, service_ports, ExposeStrategy, Exposure, Tls,
};
use crate::{
    annotations,
    config::{non_empty, Config},
    k8s::{
        IntOrString, ObjectMeta, ResourceExt, Route, RoutePort, RouteSpec, RouteTargetReference,
        Service, TlsConfig,
    },
    patch, urls, Snapshot, UrlTemplate, Write,
};
use anyhow::{Context, Result};
use tracing::info;

/// Exposes services through OpenShift routes.
#[derive(Clone, Debug)]
pub struct RouteStrategy {
    domain: String,
    template: UrlTemplate,
    route_host: Option<String>,
    use_path: bool,
    tls: Tls,
}

impl RouteStrategy {
    pub fn new(config: &Config, domain: String) -> Result<Self> {
        let template = UrlTemplate::parse(non_empty(&config.url_template).unwrap_or_default())
            .context("failed to get a url format")?;
        info!(%domain, %template, "Using route domain");
        Ok(Self {
            domain,
            template,
            route_host: non_empty(&config.route_host).map(Into::into),
            use_path: config.route_use_path,
            tls: Tls::from_config(config),
        })
    }

    /// Returns the route host and path for `svc`.
    fn place(&self, svc: &Service, app: &str) -> (String, Option<String>) {
        let namespace = svc.namespace().unwrap_or_default();
        if self.use_path {
            let host = self.route_host.as_deref().unwrap_or(&self.domain);
            let path = urls::join(&["/", namespace.as_str(), app, "/"]);
            return (host.to_string(), Some(path));
        }

        let host_name = svc
            .annotations()
            .get(annotations::HOST_NAME)
            .filter(|h| !h.is_empty())
            .map(String::as_str)
            .unwrap_or(app);
        (self.template.render(host_name, &namespace, &self.domain), None)
    }
}

impl ExposeStrategy for RouteStrategy {
    fn add(&self, svc: &Service, snapshot: &Snapshot) -> Result<Exposure> {
        let app = app_name(svc);
        let (host, path) = self.place(svc, &app);
        let tls = self.tls.enabled_for(svc);

        let port = expose_port(svc)?;
        let target_port = service_ports(svc)
            .iter()
            .find(|p| p.port == port)
            .and_then(|p| p.name.clone())
            .filter(|n| !n.is_empty())
            .map(IntOrString::String)
            .unwrap_or(IntOrString::Int(port));

        let existing = snapshot.routes.get(&app);
        let mut route = existing.cloned().unwrap_or_else(|| Route {
            metadata: ObjectMeta {
                namespace: svc.namespace(),
                name: Some(app.clone()),
                ..Default::default()
            },
            spec: RouteSpec::default(),
        });
        ensure_markers(&mut route.metadata, svc);
        route.spec.host = Some(host.clone());
        route.spec.path = path.clone();
        route.spec.to = RouteTargetReference::service(svc.name_any());
        route.spec.port = Some(RoutePort { target_port });
        route.spec.tls = tls.then(|| TlsConfig {
            termination: "edge".to_string(),
            insecure_edge_termination_policy: Some("Redirect".to_string()),
        });

        let mut writes = Vec::new();
        match existing {
            None => writes.push(Write::CreateRoute(route)),
            Some(existing) if *existing != route => writes.push(Write::ReplaceRoute(route)),
            Some(_) => {}
        }

        let full_host = match &path {
            Some(path) => urls::join(&[host.as_str(), path.as_str()]),
            None => host,
        };
        let mut desired = svc.clone();
        let protocol = if tls { "https" } else { "http" };
        patch::add_annotation_with_protocol(&mut desired, &full_host, protocol);
        finish(svc, desired, writes)
    }

    fn remove(&self, svc: &Service, snapshot: &Snapshot) -> Result<Exposure> {
        let app = app_name(svc);
        let mut writes = Vec::new();
        if snapshot.routes.contains_key(&app) {
            writes.push(Write::DeleteRoute {
                namespace: svc.namespace().unwrap_or_default(),
                name: app,
            });
        }

        let mut desired = svc.clone();
        patch::remove_annotation(&mut desired);
        finish(svc, desired, writes)
    }
}
