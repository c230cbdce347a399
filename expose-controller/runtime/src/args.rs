use crate::{
    core::{Config, Controller},
    k8s, ControllerMetrics, KubeStore,
};
use anyhow::{bail, Context, Result};
use clap::Parser;
use kube::runtime::watcher;
use prometheus_client::registry::Registry;
use std::path::PathBuf;
use tracing::{info, info_span, Instrument};

#[derive(Debug, Parser)]
#[clap(
    name = "expose-controller",
    about = "Exposes Kubernetes services outside of the cluster"
)]
pub struct Args {
    #[clap(
        long,
        default_value = "expose_controller=info,warn",
        env = "EXPOSE_CONTROLLER_LOG"
    )]
    log_level: kubert::LogFilter,

    #[clap(long, default_value = "plain")]
    log_format: kubert::LogFormat,

    #[clap(flatten)]
    client: kubert::ClientArgs,

    #[clap(flatten)]
    admin: kubert::AdminArgs,

    /// A YAML configuration file. Command line options override its values.
    #[clap(long, env = "EXPOSE_CONTROLLER_CONFIG")]
    config_file: Option<PathBuf>,

    /// Only watch services in this namespace. All namespaces are watched by
    /// default.
    #[clap(long, env = "EXPOSE_CONTROLLER_WATCH_NAMESPACE")]
    watch_namespace: Option<String>,

    #[clap(flatten)]
    overrides: Overrides,
}

/// Options that override values from the configuration file.
#[derive(Clone, Debug, Default, clap::Args)]
struct Overrides {
    /// One of `ingress`, `nodeport`, `loadbalancer`, `route` or `auto`.
    #[clap(long)]
    exposer: Option<String>,

    /// The wildcard DNS domain exposed hosts are created under.
    #[clap(long)]
    domain: Option<String>,

    #[clap(long)]
    internal_domain: Option<String>,

    /// e.g. `{{.Service}}-{{.Namespace}}.{{.Domain}}`
    #[clap(long)]
    url_template: Option<String>,

    #[clap(long)]
    node_ip: Option<String>,

    #[clap(long)]
    route_host: Option<String>,

    #[clap(long)]
    route_use_path: bool,

    #[clap(long)]
    path_mode: Option<String>,

    #[clap(long)]
    ingress_class: Option<String>,

    #[clap(long)]
    http: bool,

    #[clap(long)]
    tls_acme: bool,

    #[clap(long)]
    tls_secret_name: Option<String>,

    #[clap(long)]
    tls_use_wildcard: bool,

    #[clap(long)]
    api_server: Option<String>,

    #[clap(long)]
    api_server_protocol: Option<String>,

    #[clap(long)]
    console_url: Option<String>,

    /// Only handle services with these names.
    #[clap(long, value_delimiter = ',')]
    services: Vec<String>,
}

impl Args {
    #[inline]
    pub async fn parse_and_run() -> Result<()> {
        Self::parse().run().await
    }

    pub async fn run(self) -> Result<()> {
        let Self {
            log_level,
            log_format,
            client,
            admin,
            config_file,
            watch_namespace,
            overrides,
        } = self;

        let config = match config_file {
            Some(path) => {
                let yaml = std::fs::read_to_string(&path)
                    .with_context(|| format!("failed to read {}", path.display()))?;
                Config::from_yaml(&yaml)?
            }
            None => Config::default(),
        };
        let config = overrides.apply(config);

        let mut prom = <Registry>::default();
        let metrics = ControllerMetrics::register(prom.sub_registry_with_prefix("expose"));
        let rt_metrics = kubert::RuntimeMetrics::register(prom.sub_registry_with_prefix("kube"));

        let mut runtime = kubert::Runtime::builder()
            .with_log(log_level, log_format)
            .with_metrics(rt_metrics)
            .with_admin(admin.into_builder().with_prometheus(prom))
            .with_client(client)
            .build()
            .await?;

        let store = KubeStore::new(runtime.client());
        let controller = Controller::new(&config, store).await?;

        let services = match &watch_namespace {
            Some(ns) => {
                info!(namespace = %ns, "Watching services");
                futures::future::Either::Left(
                    runtime.watch_namespaced::<k8s::Service>(ns.clone(), watcher::Config::default()),
                )
            }
            None => {
                info!("Watching services in all namespaces");
                futures::future::Either::Right(
                    runtime.watch_all::<k8s::Service>(watcher::Config::default()),
                )
            }
        };
        tokio::spawn(
            crate::controller::run(controller, services, metrics)
                .instrument(info_span!("services")),
        );

        // Block the main thread on the shutdown signal.
        if runtime.run().await.is_err() {
            bail!("Aborted");
        }

        Ok(())
    }
}

// === impl Overrides ===

impl Overrides {
    fn apply(self, mut config: Config) -> Config {
        fn set(field: &mut Option<String>, value: Option<String>) {
            if let Some(value) = value.filter(|v| !v.is_empty()) {
                *field = Some(value);
            }
        }

        set(&mut config.exposer, self.exposer);
        set(&mut config.domain, self.domain);
        set(&mut config.internal_domain, self.internal_domain);
        set(&mut config.url_template, self.url_template);
        set(&mut config.node_ip, self.node_ip);
        set(&mut config.route_host, self.route_host);
        set(&mut config.path_mode, self.path_mode);
        set(&mut config.ingress_class, self.ingress_class);
        set(&mut config.tls_secret_name, self.tls_secret_name);
        set(&mut config.api_server, self.api_server);
        set(&mut config.api_server_protocol, self.api_server_protocol);
        set(&mut config.console_url, self.console_url);

        config.route_use_path |= self.route_use_path;
        config.http |= self.http;
        config.tls_acme |= self.tls_acme;
        config.tls_use_wildcard |= self.tls_use_wildcard;

        if !self.services.is_empty() {
            config.services = self.services;
        }
        config
    }
}
