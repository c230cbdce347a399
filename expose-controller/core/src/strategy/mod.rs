//! Exposure strategies.
//!
//! Each strategy makes a service reachable from outside the cluster in a
//! different way. They share one contract: given the observed service and a
//! snapshot of its namespace, produce the writes that expose (or un-expose)
//! it, along with the desired state of the service itself.

mod ingress;
mod loadbalancer;
mod nodeport;
mod route;

pub use self::{
    ingress::IngressStrategy, loadbalancer::LoadBalancerStrategy, nodeport::NodePortStrategy,
    route::RouteStrategy,
};
use crate::{
    annotations,
    config::{non_empty, Config},
    k8s::{self, ObjectMeta, OwnerReference, ResourceExt, Service},
    patch,
    platform::{self, Platform},
    Snapshot, Store, Write,
};
use anyhow::{bail, Context, Result};
use std::{fmt, str::FromStr};
use thiserror::Error;
use tracing::{info, warn};

/// Exposes services.
pub trait ExposeStrategy {
    /// Plans the writes that expose `svc`.
    fn add(&self, svc: &Service, snapshot: &Snapshot) -> Result<Exposure>;

    /// Plans the writes that stop exposing `svc`.
    fn remove(&self, svc: &Service, snapshot: &Snapshot) -> Result<Exposure>;
}

/// The result of a strategy operation.
#[derive(Clone, Debug)]
pub struct Exposure {
    /// Routing resource writes followed, if the service changed, by a patch
    /// of the service.
    pub writes: Vec<Write>,

    /// The desired state of the service.
    pub service: Service,
}

/// The configured strategy.
#[derive(Clone, Debug)]
pub enum Strategy {
    Ingress(IngressStrategy),
    NodePort(NodePortStrategy),
    LoadBalancer(LoadBalancerStrategy),
    Route(RouteStrategy),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ExposerKind {
    Ingress,
    NodePort,
    LoadBalancer,
    Route,
}

#[derive(Debug, Error)]
pub enum ExposeError {
    #[error("service {0} has no ports specified")]
    NoPorts(String),

    #[error(
        "service {service} has multiple ports specified ({ports}); node port strategy can only \
         be used with single port services"
    )]
    MultiplePorts { service: String, ports: usize },

    #[error("node port strategy can only be used with single node clusters - found {0} nodes")]
    NotSingleNode(usize),

    #[error("host IP unknown for node {0}")]
    NoNodeAddress(String),

    #[error(
        "no known automatic ways to get an external ip to use with nip.io; configure a domain"
    )]
    NoDomain,

    #[error("{0} strategy is not supported on {1}")]
    Unsupported(ExposerKind, Platform),

    #[error("unknown exposer {0:?}")]
    UnknownExposer(String),
}

/// Builds the strategy described by `config`.
///
/// When no exposer is configured, the platform decides: routes on OpenShift
/// and ingresses elsewhere. Strategies that create host names under a
/// wildcard domain discover one when none is configured.
pub async fn select<S: Store + ?Sized>(config: &Config, store: &S) -> Result<Strategy> {
    let platform = Platform::detect(store).await?;
    let kind = match non_empty(&config.exposer) {
        Some(exposer) if !exposer.eq_ignore_ascii_case("auto") => exposer.parse()?,
        _ => platform.default_exposer(),
    };
    info!(exposer = %kind, %platform, "Using exposer strategy");

    let strategy = match kind {
        ExposerKind::Ingress => {
            if platform == Platform::OpenShift {
                bail!(ExposeError::Unsupported(kind, platform));
            }
            let domain = domain(config, store).await?;
            Strategy::Ingress(IngressStrategy::new(config, domain)?)
        }
        ExposerKind::Route => {
            if platform != Platform::OpenShift {
                bail!(ExposeError::Unsupported(kind, platform));
            }
            let domain = if config.route_use_path && non_empty(&config.route_host).is_some() {
                non_empty(&config.domain).unwrap_or_default().to_string()
            } else {
                domain(config, store).await?
            };
            Strategy::Route(RouteStrategy::new(config, domain)?)
        }
        ExposerKind::NodePort => Strategy::NodePort(
            NodePortStrategy::resolve(non_empty(&config.node_ip), store)
                .await
                .context("could not create node port strategy")?,
        ),
        ExposerKind::LoadBalancer => Strategy::LoadBalancer(LoadBalancerStrategy),
    };
    Ok(strategy)
}

async fn domain<S: Store + ?Sized>(config: &Config, store: &S) -> Result<String> {
    if let Some(domain) = non_empty(&config.domain) {
        return Ok(domain.to_string());
    }
    let domain = platform::default_domain(store)
        .await
        .context("failed to get a domain")?;
    info!(%domain, "Using discovered domain");
    Ok(domain)
}

// === impl Strategy ===

impl ExposeStrategy for Strategy {
    fn add(&self, svc: &Service, snapshot: &Snapshot) -> Result<Exposure> {
        match self {
            Self::Ingress(s) => s.add(svc, snapshot),
            Self::NodePort(s) => s.add(svc, snapshot),
            Self::LoadBalancer(s) => s.add(svc, snapshot),
            Self::Route(s) => s.add(svc, snapshot),
        }
    }

    fn remove(&self, svc: &Service, snapshot: &Snapshot) -> Result<Exposure> {
        match self {
            Self::Ingress(s) => s.remove(svc, snapshot),
            Self::NodePort(s) => s.remove(svc, snapshot),
            Self::LoadBalancer(s) => s.remove(svc, snapshot),
            Self::Route(s) => s.remove(svc, snapshot),
        }
    }
}

// === impl ExposerKind ===

impl FromStr for ExposerKind {
    type Err = ExposeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ingress" => Ok(Self::Ingress),
            "nodeport" => Ok(Self::NodePort),
            "loadbalancer" => Ok(Self::LoadBalancer),
            "route" => Ok(Self::Route),
            _ => Err(ExposeError::UnknownExposer(s.to_string())),
        }
    }
}

impl fmt::Display for ExposerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Ingress => "ingress",
            Self::NodePort => "nodeport",
            Self::LoadBalancer => "loadbalancer",
            Self::Route => "route",
        })
    }
}

// === helpers ===

fn service_id(svc: &Service) -> String {
    format!("{}/{}", svc.namespace().unwrap_or_default(), svc.name_any())
}

fn service_ports(svc: &Service) -> &[k8s::ServicePort] {
    svc.spec
        .as_ref()
        .and_then(|spec| spec.ports.as_deref())
        .unwrap_or_default()
}

/// The name of the routing resource for `svc`.
///
/// An explicit annotation wins; otherwise a Helm release prefix is stripped
/// from the service name.
fn app_name(svc: &Service) -> String {
    if let Some(name) = svc
        .annotations()
        .get(annotations::INGRESS_NAME)
        .filter(|n| !n.is_empty())
    {
        return name.clone();
    }

    let name = svc.name_any();
    match svc
        .labels()
        .get(annotations::RELEASE_LABEL)
        .filter(|r| !r.is_empty())
    {
        Some(release) => name.replacen(&format!("{release}-"), "", 1),
        None => name,
    }
}

/// Picks the service port to route to.
///
/// The port named by the expose-port annotation is used when the service
/// declares it; otherwise the first port.
fn expose_port(svc: &Service) -> Result<i32> {
    let ports = service_ports(svc);
    let first = ports
        .first()
        .ok_or_else(|| ExposeError::NoPorts(service_id(svc)))?;

    if let Some(value) = svc
        .annotations()
        .get(annotations::EXPOSE_PORT)
        .filter(|v| !v.is_empty())
    {
        match value.parse::<i32>() {
            Ok(port) if ports.iter().any(|p| p.port == port) => return Ok(port),
            Ok(_) => warn!(
                port = %value,
                service = %service_id(svc),
                "Port provided in the expose port annotation is not a port of the service",
            ),
            Err(_) => warn!(
                port = %value,
                service = %service_id(svc),
                "Port provided in the expose port annotation is not a valid number",
            ),
        }
    }
    Ok(first.port)
}

/// Stamps the generated-resource markers on `meta` and makes `svc` one of
/// its owners.
fn ensure_markers(meta: &mut ObjectMeta, svc: &Service) {
    let (key, value) = annotations::PROVIDER_LABEL;
    meta.labels
        .get_or_insert_with(Default::default)
        .entry(key.to_string())
        .or_insert_with(|| value.to_string());

    let (key, value) = annotations::GENERATED_BY;
    meta.annotations
        .get_or_insert_with(Default::default)
        .entry(key.to_string())
        .or_insert_with(|| value.to_string());

    let uid = svc.uid().unwrap_or_default();
    let owners = meta.owner_references.get_or_insert_with(Vec::new);
    if !owners.iter().any(|o| o.uid == uid) {
        owners.push(OwnerReference {
            api_version: "v1".to_string(),
            kind: "Service".to_string(),
            name: svc.name_any(),
            uid,
            ..Default::default()
        });
    }
}

/// TLS settings shared by the routing strategies.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
struct Tls {
    secret_name: Option<String>,
    acme: bool,
    wildcard: bool,
}

impl Tls {
    fn from_config(config: &Config) -> Self {
        Self {
            secret_name: non_empty(&config.tls_secret_name).map(Into::into),
            acme: config.tls_acme,
            wildcard: config.tls_use_wildcard,
        }
    }

    fn enabled_for(&self, svc: &Service) -> bool {
        let skip = svc
            .annotations()
            .get(annotations::SKIP_TLS)
            .is_some_and(|v| v == "true");
        !skip && (self.acme || self.secret_name.is_some())
    }

    fn secret_for(&self, app: &str) -> Option<String> {
        match &self.secret_name {
            Some(name) => Some(name.clone()),
            None if self.acme => Some(format!("tls-{app}")),
            None => None,
        }
    }
}

/// Appends a service patch to `writes` when `desired` differs from `svc`.
fn finish(svc: &Service, desired: Service, mut writes: Vec<Write>) -> Result<Exposure> {
    if let Some(patch) = patch::create_patch(svc, &desired).context("failed to create patch")? {
        writes.push(Write::PatchService {
            namespace: svc.namespace().unwrap_or_default(),
            name: svc.name_any(),
            patch,
        });
    }
    Ok(Exposure {
        writes,
        service: desired,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::k8s::{ServicePort, ServiceSpec};
    use maplit::btreemap;

    fn svc(labels: &[(&str, &str)], anns: &[(&str, &str)], ports: &[i32]) -> Service {
        let map = |kvs: &[(&str, &str)]| {
            Some(
                kvs.iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            )
        };
        Service {
            metadata: ObjectMeta {
                namespace: Some("ns1".to_string()),
                name: Some("myrelease-web".to_string()),
                uid: Some("uid-1".to_string()),
                labels: map(labels),
                annotations: map(anns),
                ..Default::default()
            },
            spec: Some(ServiceSpec {
                ports: Some(
                    ports
                        .iter()
                        .map(|&port| ServicePort {
                            port,
                            ..Default::default()
                        })
                        .collect(),
                ),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn app_names() {
        assert_eq!(app_name(&svc(&[], &[], &[80])), "myrelease-web");
        assert_eq!(
            app_name(&svc(&[("release", "myrelease")], &[], &[80])),
            "web"
        );
        assert_eq!(
            app_name(&svc(
                &[("release", "myrelease")],
                &[(annotations::INGRESS_NAME, "frontend")],
                &[80]
            )),
            "frontend"
        );
    }

    #[test]
    fn port_selection() {
        assert_eq!(expose_port(&svc(&[], &[], &[80, 8080])).unwrap(), 80);
        assert_eq!(
            expose_port(&svc(&[], &[(annotations::EXPOSE_PORT, "8080")], &[80, 8080])).unwrap(),
            8080
        );
        assert_eq!(
            expose_port(&svc(&[], &[(annotations::EXPOSE_PORT, "9090")], &[80, 8080])).unwrap(),
            80
        );
        assert_eq!(
            expose_port(&svc(&[], &[(annotations::EXPOSE_PORT, "http")], &[80, 8080])).unwrap(),
            80
        );
        assert!(expose_port(&svc(&[], &[], &[])).is_err());
    }

    #[test]
    fn markers_are_added_once() {
        let svc = svc(&[], &[], &[80]);
        let mut meta = ObjectMeta::default();
        ensure_markers(&mut meta, &svc);
        ensure_markers(&mut meta, &svc);
        assert_eq!(
            meta.labels,
            Some(btreemap! { "provider".to_string() => "fabric8".to_string() })
        );
        assert_eq!(
            meta.annotations,
            Some(btreemap! {
                "fabric8.io/generated-by".to_string() => "exposecontroller".to_string(),
            })
        );
        assert_eq!(meta.owner_references.as_ref().map(Vec::len), Some(1));
    }

    #[test]
    fn tls_precedence() {
        let plain = svc(&[], &[], &[80]);
        let skip = svc(&[], &[(annotations::SKIP_TLS, "true")], &[80]);

        let off = Tls::default();
        assert!(!off.enabled_for(&plain));

        let acme = Tls {
            acme: true,
            ..Default::default()
        };
        assert!(acme.enabled_for(&plain));
        assert!(!acme.enabled_for(&skip));
        assert_eq!(acme.secret_for("web").as_deref(), Some("tls-web"));

        let secret = Tls {
            secret_name: Some("wildcard".to_string()),
            ..Default::default()
        };
        assert!(secret.enabled_for(&plain));
        assert_eq!(secret.secret_for("web").as_deref(), Some("wildcard"));
    }

    #[test]
    fn exposer_kinds() {
        assert_eq!("Ingress".parse::<ExposerKind>().unwrap(), ExposerKind::Ingress);
        assert_eq!("NodePort".parse::<ExposerKind>().unwrap(), ExposerKind::NodePort);
        assert_eq!(
            "loadbalancer".parse::<ExposerKind>().unwrap(),
            ExposerKind::LoadBalancer
        );
        assert_eq!("Route".parse::<ExposerKind>().unwrap(), ExposerKind::Route);
        assert!("gateway".parse::<ExposerKind>().is_err());
    }
}
