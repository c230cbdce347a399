//! Computes minimal service write-backs.
//!
//! Every strategy builds the desired state of a service from scratch on each
//! invocation. [`create_patch`] is what keeps that idempotent: when the
//! desired object serializes identically to the observed one, no patch is
//! produced and the caller must not write at all.
//!
//! Patches are JSON merge patches (RFC 7386). They name only the fields that
//! changed, so applying one to a live object that has moved on since it was
//! observed leaves unrelated fields alone, and re-applying one is harmless.

use crate::{
    annotations,
    k8s::{ResourceExt, Service},
    urls,
};
use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::{Map, Value};

/// Diffs `original` against `desired`.
///
/// Returns `None` when both objects serialize to the same bytes.
pub fn create_patch<T: Serialize>(original: &T, desired: &T) -> Result<Option<Value>> {
    let a = serde_json::to_vec(original).context("failed to encode original object")?;
    let b = serde_json::to_vec(desired).context("failed to encode desired object")?;
    if a == b {
        return Ok(None);
    }

    let a: Value = serde_json::from_slice(&a)?;
    let b: Value = serde_json::from_slice(&b)?;
    Ok(merge_diff(&a, &b))
}

/// Builds the merge patch that turns `a` into `b`.
///
/// Objects are diffed key by key and removed keys become `null`. Anything
/// else, arrays included, is replaced whole.
fn merge_diff(a: &Value, b: &Value) -> Option<Value> {
    match (a, b) {
        (Value::Object(a), Value::Object(b)) => {
            let mut patch = Map::new();
            for (key, old) in a {
                match b.get(key) {
                    None => {
                        patch.insert(key.clone(), Value::Null);
                    }
                    Some(new) => {
                        if let Some(diff) = merge_diff(old, new) {
                            patch.insert(key.clone(), diff);
                        }
                    }
                }
            }
            for (key, new) in b {
                if !a.contains_key(key) {
                    patch.insert(key.clone(), new.clone());
                }
            }
            (!patch.is_empty()).then_some(Value::Object(patch))
        }
        (a, b) if a == b => None,
        (_, b) => Some(b.clone()),
    }
}

/// Infers the protocol a service is reached with at `host`.
///
/// Defaults to `http`; ports 443 and 8443, or a service port named `https`,
/// select `https`.
pub fn http_protocol(svc: &Service, host: &str) -> &'static str {
    let mut protocol = "http";
    if let Some("443" | "8443") = urls::split_port(host) {
        protocol = "https";
    }
    let https_port = svc
        .spec
        .iter()
        .flat_map(|spec| spec.ports.iter().flatten())
        .any(|port| port.name.as_deref() == Some("https"));
    if https_port {
        protocol = "https";
    }
    protocol
}

/// Records `host` as the exposed address of `svc`, inferring the protocol.
pub fn add_annotation(svc: &mut Service, host: &str) {
    let protocol = http_protocol(svc, host);
    add_annotation_with_protocol(svc, host, protocol)
}

/// Records `protocol://host` as the exposed URL of `svc`.
///
/// The service's API path annotation is appended to the URL, and when the
/// service names a host-alias annotation it receives the bare host.
pub fn add_annotation_with_protocol(svc: &mut Service, host: &str, protocol: &str) {
    let anns = svc.annotations_mut();

    let mut url = format!("{protocol}://{}", urls::url_host(host));
    if let Some(path) = anns
        .get(annotations::API_SERVICE_PATH)
        .filter(|p| !p.is_empty())
    {
        url = urls::join(&[url.as_str(), path.as_str()]);
    }
    anns.insert(annotations::EXPOSE_URL.to_string(), url);

    if let Some(key) = anns
        .get(annotations::EXPOSE_HOST_NAME_AS)
        .filter(|k| !k.is_empty())
        .cloned()
    {
        anns.insert(key, host.to_string());
    }
}

/// Clears the exposed URL and the host alias from `svc`.
pub fn remove_annotation(svc: &mut Service) {
    let Some(anns) = svc.metadata.annotations.as_mut() else {
        return;
    };
    anns.remove(annotations::EXPOSE_URL);
    if let Some(key) = anns
        .get(annotations::EXPOSE_HOST_NAME_AS)
        .filter(|k| !k.is_empty())
        .cloned()
    {
        anns.remove(&key);
    }
}

/// Returns the exposed URL recorded on `svc`, if any.
pub fn exposed_url(svc: &Service) -> Option<&str> {
    svc.annotations()
        .get(annotations::EXPOSE_URL)
        .map(String::as_str)
        .filter(|u| !u.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::k8s::{ObjectMeta, ServicePort, ServiceSpec};
    use maplit::btreemap;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;

    fn svc(annotations: Option<BTreeMap<String, String>>) -> Service {
        Service {
            metadata: ObjectMeta {
                annotations,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn identical_objects_produce_no_patch() {
        let a = svc(Some(btreemap! { "a".to_string() => "b".to_string() }));
        assert!(create_patch(&a, &a.clone()).unwrap().is_none());
    }

    #[test]
    fn annotation_change_produces_patch() {
        let a = svc(None);
        let mut b = a.clone();
        add_annotation_with_protocol(&mut b, "example.com", "http");
        let patch = create_patch(&a, &b).unwrap().expect("patch");
        assert_eq!(
            patch,
            serde_json::json!({
                "metadata": { "annotations": { (annotations::EXPOSE_URL): "http://example.com" } }
            })
        );

        let mut doc = serde_json::to_value(&a).unwrap();
        json_patch::merge(&mut doc, &patch);
        assert_eq!(doc, serde_json::to_value(&b).unwrap());
    }

    #[test]
    fn patch_keeps_fields_added_since_observed() {
        let observed = svc(None);
        let mut desired = observed.clone();
        add_annotation_with_protocol(&mut desired, "example.com", "http");
        let patch = create_patch(&observed, &desired).unwrap().expect("patch");

        let live = svc(Some(btreemap! { "team".to_string() => "payments".to_string() }));
        let mut doc = serde_json::to_value(&live).unwrap();
        json_patch::merge(&mut doc, &patch);
        let live: Service = serde_json::from_value(doc).unwrap();
        assert_eq!(
            live.metadata.annotations,
            Some(btreemap! {
                "team".to_string() => "payments".to_string(),
                annotations::EXPOSE_URL.to_string() => "http://example.com".to_string(),
            })
        );
    }

    #[test]
    fn removal_patch_reapplies_cleanly() {
        let observed = svc(Some(btreemap! {
            annotations::EXPOSE_URL.to_string() => "http://example.com".to_string(),
        }));
        let mut desired = observed.clone();
        remove_annotation(&mut desired);
        let patch = create_patch(&observed, &desired).unwrap().expect("patch");
        assert_eq!(
            patch,
            serde_json::json!({
                "metadata": { "annotations": { (annotations::EXPOSE_URL): null } }
            })
        );

        // Applying the same patch to an already cleared service is a no-op.
        let cleared = svc(Some(BTreeMap::new()));
        let mut doc = serde_json::to_value(&cleared).unwrap();
        json_patch::merge(&mut doc, &patch);
        json_patch::merge(&mut doc, &patch);
        assert_eq!(doc, serde_json::to_value(&cleared).unwrap());
    }

    #[test]
    fn arrays_are_replaced_and_removed_fields_nulled() {
        let a = serde_json::json!({
            "spec": { "type": "ClusterIP", "externalIPs": ["1.2.3.4"], "ports": [1, 2] }
        });
        let b = serde_json::json!({ "spec": { "type": "NodePort", "ports": [1] } });
        assert_eq!(
            merge_diff(&a, &b),
            Some(serde_json::json!({
                "spec": { "type": "NodePort", "externalIPs": null, "ports": [1] }
            }))
        );
        assert_eq!(merge_diff(&a, &a), None);
    }

    #[test]
    fn add_with_protocol() {
        let cases = vec![
            (
                svc(None),
                "example.com",
                "http",
                btreemap! {
                    annotations::EXPOSE_URL.to_string() => "http://example.com".to_string(),
                },
            ),
            (
                svc(None),
                "example.com",
                "https",
                btreemap! {
                    annotations::EXPOSE_URL.to_string() => "https://example.com".to_string(),
                },
            ),
            (
                svc(Some(btreemap! {
                    annotations::API_SERVICE_PATH.to_string() => "some/path".to_string(),
                })),
                "example.com",
                "https",
                btreemap! {
                    annotations::API_SERVICE_PATH.to_string() => "some/path".to_string(),
                    annotations::EXPOSE_URL.to_string() => "https://example.com/some/path".to_string(),
                },
            ),
            (
                svc(Some(btreemap! {
                    annotations::EXPOSE_HOST_NAME_AS.to_string() => "osiris.deislabs.io/ingressHostname".to_string(),
                })),
                "example.com",
                "http",
                btreemap! {
                    annotations::EXPOSE_HOST_NAME_AS.to_string() => "osiris.deislabs.io/ingressHostname".to_string(),
                    "osiris.deislabs.io/ingressHostname".to_string() => "example.com".to_string(),
                    annotations::EXPOSE_URL.to_string() => "http://example.com".to_string(),
                },
            ),
        ];

        for (mut svc, host, protocol, expected) in cases {
            add_annotation_with_protocol(&mut svc, host, protocol);
            assert_eq!(svc.metadata.annotations, Some(expected));
        }
    }

    #[test]
    fn ipv6_hosts_are_bracketed() {
        let mut svc = svc(None);
        add_annotation(&mut svc, "fd00::1");
        assert_eq!(exposed_url(&svc), Some("http://[fd00::1]"));
    }

    #[test]
    fn remove() {
        let mut empty = svc(None);
        remove_annotation(&mut empty);
        assert_eq!(empty.metadata.annotations, None);

        let mut svc = svc(Some(btreemap! {
            annotations::EXPOSE_HOST_NAME_AS.to_string() => "osiris.deislabs.io/ingressHostname".to_string(),
            "osiris.deislabs.io/ingressHostname".to_string() => "example.com".to_string(),
            annotations::API_SERVICE_PATH.to_string() => "some/path".to_string(),
            annotations::EXPOSE_URL.to_string() => "http://example.com/some/path".to_string(),
        }));
        remove_annotation(&mut svc);
        assert_eq!(
            svc.metadata.annotations,
            Some(btreemap! {
                annotations::EXPOSE_HOST_NAME_AS.to_string() => "osiris.deislabs.io/ingressHostname".to_string(),
                annotations::API_SERVICE_PATH.to_string() => "some/path".to_string(),
            })
        );
    }

    #[test]
    fn protocol_inference() {
        let mut svc = svc(None);
        assert_eq!(http_protocol(&svc, "10.0.0.5:30080"), "http");
        assert_eq!(http_protocol(&svc, "10.0.0.5:8443"), "https");
        assert_eq!(http_protocol(&svc, "2001:db8::443"), "http");
        assert_eq!(http_protocol(&svc, "[2001:db8::1]:443"), "https");

        svc.spec = Some(ServiceSpec {
            ports: Some(vec![ServicePort {
                name: Some("https".to_string()),
                port: 443,
                ..Default::default()
            }]),
            ..Default::default()
        });
        assert_eq!(http_protocol(&svc, "10.0.0.5:30080"), "https");
    }
}
