use super::{finish, ExposeStrategy, Exposure};
use crate::{
    k8s::{self, Service},
    patch, Snapshot,
};
use anyhow::Result;

/// Exposes services through a cloud load balancer.
///
/// The URL is only recorded when the service requests a specific address;
/// addresses assigned later by the provider are not observed.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct LoadBalancerStrategy;

impl ExposeStrategy for LoadBalancerStrategy {
    fn add(&self, svc: &Service, _: &Snapshot) -> Result<Exposure> {
        let mut desired = svc.clone();
        let spec = desired.spec.get_or_insert_with(Default::default);
        spec.type_ = Some(k8s::SERVICE_TYPE_LOAD_BALANCER.to_string());
        if let Some(ip) = spec.load_balancer_ip.clone().filter(|ip| !ip.is_empty()) {
            patch::add_annotation(&mut desired, &ip);
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
    use crate::k8s::{ServicePort, ServiceSpec};

    #[test]
    fn annotates_requested_address() {
        let svc = Service {
            spec: Some(ServiceSpec {
                load_balancer_ip: Some("34.1.2.3".to_string()),
                ports: Some(vec![ServicePort {
                    name: Some("https".to_string()),
                    port: 443,
                    ..Default::default()
                }]),
                ..Default::default()
            }),
            ..Default::default()
        };
        let exposure = LoadBalancerStrategy.add(&svc, &Snapshot::default()).unwrap();
        assert_eq!(
            exposure.service.spec.as_ref().unwrap().type_.as_deref(),
            Some("LoadBalancer")
        );
        assert_eq!(
            patch::exposed_url(&exposure.service),
            Some("https://34.1.2.3")
        );
    }

    #[test]
    fn waits_for_requested_address() {
        let svc = Service::default();
        let exposure = LoadBalancerStrategy.add(&svc, &Snapshot::default()).unwrap();
        assert_eq!(patch::exposed_url(&exposure.service), None);
        assert_eq!(exposure.writes.len(), 1);

        let again = LoadBalancerStrategy
            .add(&exposure.service, &Snapshot::default())
            .unwrap();
        assert!(again.writes.is_empty());
    }

    #[test]
    fn ipv6_address_is_bracketed() {
        let svc = Service {
            spec: Some(ServiceSpec {
                load_balancer_ip: Some("fd00::1".to_string()),
                ports: Some(vec![ServicePort {
                    port: 80,
                    ..Default::default()
                }]),
                ..Default::default()
            }),
            ..Default::default()
        };
        let exposure = LoadBalancerStrategy.add(&svc, &Snapshot::default()).unwrap();
        assert_eq!(
            patch::exposed_url(&exposure.service),
            Some("http://[fd00::1]")
        );
    }
}
