use super::{finish, service_id, service_ports, ExposeError, ExposeStrategy, Exposure};
use crate::{
    annotations,
    k8s::{self, ResourceExt, Service},
    patch, platform, urls, Snapshot, Store,
};
use anyhow::{Context, Result};
use tracing::info;

/// Exposes single port services on the node port of a single node cluster.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodePortStrategy {
    node_ip: String,
}

impl NodePortStrategy {
    pub fn new(node_ip: impl ToString) -> Self {
        Self {
            node_ip: node_ip.to_string(),
        }
    }

    /// Uses `node_ip` when given; otherwise the address of the cluster's only
    /// node.
    pub async fn resolve<S: Store + ?Sized>(node_ip: Option<&str>, store: &S) -> Result<Self> {
        if let Some(ip) = node_ip {
            return Ok(Self::new(ip));
        }

        let nodes = store.list_nodes().await.context("failed to list nodes")?;
        let [node] = nodes.as_slice() else {
            return Err(ExposeError::NotSingleNode(nodes.len()).into());
        };

        let ip = match node
            .annotations()
            .get(annotations::EXTERNAL_IP_LABEL)
            .filter(|ip| !ip.is_empty())
        {
            Some(ip) => ip.clone(),
            None => platform::node_host_ip(node)
                .ok_or_else(|| ExposeError::NoNodeAddress(node.name_any()))
                .context("cannot discover node IP")?,
        };
        info!(node_ip = %ip, "Using node address");
        Ok(Self::new(ip))
    }
}

impl ExposeStrategy for NodePortStrategy {
    fn add(&self, svc: &Service, _: &Snapshot) -> Result<Exposure> {
        let port = match service_ports(svc) {
            [] => return Err(ExposeError::NoPorts(service_id(svc)).into()),
            [port] => port,
            ports => {
                return Err(ExposeError::MultiplePorts {
                    service: service_id(svc),
                    ports: ports.len(),
                }
                .into())
            }
        };
        let node_port = port.node_port.unwrap_or_default();

        let mut desired = svc.clone();
        let spec = desired.spec.get_or_insert_with(Default::default);
        spec.type_ = Some(k8s::SERVICE_TYPE_NODE_PORT.to_string());
        spec.external_ips = None;
        if node_port > 0 {
            let host = urls::join_host_port(&self.node_ip, node_port);
            patch::add_annotation(&mut desired, &host);
        }
        finish(svc, desired, Vec::new())
    }

    fn remove(&self, svc: &Service, _: &Snapshot) -> Result<Exposure> {
        let mut desired = svc.clone();
        patch::remove_annotation(&mut desired);
        finish(svc, desired, Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::k8s::{ObjectMeta, ServicePort, ServiceSpec};
    use pretty_assertions::assert_eq;

    fn svc(ports: Vec<ServicePort>) -> Service {
        Service {
            metadata: ObjectMeta {
                namespace: Some("ns1".to_string()),
                name: Some("web".to_string()),
                ..Default::default()
            },
            spec: Some(ServiceSpec {
                ports: Some(ports),
                external_ips: Some(vec!["1.2.3.4".to_string()]),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn port(node_port: i32) -> ServicePort {
        ServicePort {
            port: 8080,
            node_port: Some(node_port),
            ..Default::default()
        }
    }

    #[test]
    fn exposes_the_node_port() {
        let strategy = NodePortStrategy::new("10.0.0.5");
        let exposure = strategy
            .add(&svc(vec![port(30080)]), &Snapshot::new("ns1"))
            .unwrap();

        let spec = exposure.service.spec.as_ref().unwrap();
        assert_eq!(spec.type_.as_deref(), Some("NodePort"));
        assert_eq!(spec.external_ips, None);
        assert_eq!(
            patch::exposed_url(&exposure.service),
            Some("http://10.0.0.5:30080")
        );
        assert_eq!(exposure.writes.len(), 1);
    }

    #[test]
    fn unassigned_node_port_is_not_annotated() {
        let strategy = NodePortStrategy::new("10.0.0.5");
        let exposure = strategy
            .add(&svc(vec![port(0)]), &Snapshot::new("ns1"))
            .unwrap();
        assert_eq!(patch::exposed_url(&exposure.service), None);
        assert_eq!(
            exposure.service.spec.as_ref().unwrap().type_.as_deref(),
            Some("NodePort")
        );
    }

    #[test]
    fn requires_exactly_one_port() {
        let strategy = NodePortStrategy::new("10.0.0.5");
        let none = strategy.add(&svc(vec![]), &Snapshot::new("ns1")).unwrap_err();
        assert!(matches!(
            none.downcast_ref::<ExposeError>(),
            Some(ExposeError::NoPorts(_))
        ));

        let two = strategy
            .add(&svc(vec![port(30080), port(30081)]), &Snapshot::new("ns1"))
            .unwrap_err();
        assert!(matches!(
            two.downcast_ref::<ExposeError>(),
            Some(ExposeError::MultiplePorts { ports: 2, .. })
        ));
    }
}
