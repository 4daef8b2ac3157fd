//! Host groups sharing one listening interface.
//!
//! A [`Network`] maps host names to [`Host`]s without owning them: entries are
//! weak, so dropping the last owning `Arc<Host>` elsewhere makes its names
//! resolve to the default host. Owners should [`deregister`](Network::deregister)
//! a host before dropping it.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};

use futures::future::join_all;
use micro_transport::connection::Pipeline;
use tracing::{debug, error, info};

use crate::error::ConfigError;
use crate::host::Host;
use crate::lifecycle::{Lifecycle, State};
use crate::request::normalize_host;

#[derive(Default)]
pub struct Network {
    hosts: HashMap<String, Weak<Host>>,
    default_host: Option<String>,
    lifecycle: Lifecycle,
}

impl Network {
    /// A network without hosts or default; see [`Network::builder`] for a validated one.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> NetworkBuilder {
        NetworkBuilder::default()
    }

    pub fn default_host(&self) -> Option<&str> {
        self.default_host.as_deref()
    }

    /// Adds the names of `host` to the lookup table, without taking ownership.
    pub fn register(&mut self, host: &Arc<Host>) {
        for name in host.names() {
            debug!(name, "registering host name");
            self.hosts.insert(name.clone(), Arc::downgrade(host));
        }
    }

    /// Removes every name that resolves to `host`.
    pub fn deregister(&mut self, host: &Arc<Host>) {
        let host = Arc::downgrade(host);
        self.hosts.retain(|_, registered| !registered.ptr_eq(&host));
    }

    /// Resolves `hostname`, falling back to the default host.
    pub fn select(&self, hostname: Option<&str>) -> Result<Arc<Host>, ConfigError> {
        let found = hostname.and_then(normalize_host).and_then(|name| self.hosts.get(&name)).and_then(Weak::upgrade);
        if let Some(host) = found {
            return Ok(host);
        }

        let Some(default) = &self.default_host else {
            return Err(ConfigError::NoDefaultHost);
        };
        self.hosts.get(default).and_then(Weak::upgrade).ok_or_else(|| ConfigError::UnknownDefaultHost { name: default.clone() })
    }

    /// Routes a batch of pipelined requests of one connection.
    ///
    /// The host is chosen from the first request alone and every request of the
    /// batch goes to it, whatever `Host` the later ones name. The chosen host is
    /// returned so the connection can hand later batches to [`Host::accept`]
    /// directly. An empty batch selects nothing.
    pub fn accept(&self, batch: Pipeline) -> Result<Option<Arc<Host>>, ConfigError> {
        let Some((_, first)) = batch.first() else {
            return Ok(None);
        };

        let hostname = first.header().host();
        let host = match self.select(hostname) {
            Ok(host) => host,
            Err(e) => {
                // dropping the batch abandons its output slots, which closes the connection
                error!(?hostname, cause = %e, "no host for connection");
                return Err(e);
            }
        };

        debug!(?hostname, host = ?host.canonical(), requests = batch.len(), "connection bound to host");
        host.accept(batch);
        Ok(Some(host))
    }

    /// Live hosts, each once.
    pub fn hosts(&self) -> Vec<Arc<Host>> {
        let mut hosts: Vec<Arc<Host>> = Vec::new();
        for host in self.hosts.values().filter_map(Weak::upgrade) {
            if !hosts.iter().any(|seen| Arc::ptr_eq(seen, &host)) {
                hosts.push(host);
            }
        }
        hosts
    }

    /// Terminates every live host; completes once all of them have terminated.
    ///
    /// When termination already started, only waits for it to finish.
    pub async fn terminate(&self) {
        if !self.lifecycle.start_termination() {
            self.lifecycle.terminated().await;
            return;
        }
        info!(hosts = self.hosts.len(), "network terminating");

        let hosts = self.hosts();
        join_all(hosts.iter().map(|host| host.terminate())).await;

        self.lifecycle.finish_termination().await;
        info!("network terminated");
    }

    pub fn state(&self) -> State {
        self.lifecycle.state()
    }
}

impl fmt::Debug for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.hosts.keys().collect();
        names.sort();
        f.debug_struct("Network").field("names", &names).field("default_host", &self.default_host).finish()
    }
}

/// Validates that the default host resolves before the network is used.
#[derive(Debug, Default)]
pub struct NetworkBuilder {
    default_host: Option<String>,
    hosts: Vec<Arc<Host>>,
}

impl NetworkBuilder {
    pub fn default_host(mut self, name: impl Into<String>) -> Self {
        self.default_host = Some(name.into());
        self
    }

    pub fn host(mut self, host: &Arc<Host>) -> Self {
        self.hosts.push(Arc::clone(host));
        self
    }

    pub fn build(self) -> Result<Network, ConfigError> {
        let default_host = self.default_host.ok_or(ConfigError::NoDefaultHost)?;
        let default_host = normalize_host(&default_host).ok_or(ConfigError::UnknownDefaultHost { name: default_host })?;

        let mut network = Network { default_host: Some(default_host), ..Network::default() };
        for host in &self.hosts {
            network.register(host);
        }

        // resolves the default or reports why it cannot
        network.select(None)?;
        info!(default_host = ?network.default_host, names = network.hosts.len(), "network configured");
        Ok(network)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::Controller;
    use crate::controller::tests::wire;
    use crate::error::ControllerError;
    use crate::partition::{Mount, Partition};
    use http::{Request, header};
    use micro_transport::connection::pipeline;
    use micro_transport::protocol::RequestHeader;
    use micro_transport::protocol::body::ReqBody;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::sync::oneshot;

    /// Answers with the canonical name of the host it is mounted on.
    struct WhoAmI(Mount);

    impl Partition for WhoAmI {
        fn mount(&self) -> &Mount {
            &self.0
        }

        fn select(&self, host: &Arc<Host>, mut controller: Controller) -> Result<(), ControllerError> {
            controller.accept(None)?;
            controller.write_text(format!("{}:{}", host.canonical().unwrap_or("-"), controller.request().path()))
        }
    }

    /// Answers once released.
    struct Held {
        mount: Mount,
        release: Mutex<Option<oneshot::Receiver<()>>>,
    }

    impl Partition for Held {
        fn mount(&self) -> &Mount {
            &self.mount
        }

        fn select(&self, _host: &Arc<Host>, mut controller: Controller) -> Result<(), ControllerError> {
            let release = self.release.lock().unwrap().take();
            controller.accept(None)?;
            let scope = controller.scope().clone();
            scope.spawn(async move {
                if let Some(release) = release {
                    let _ = release.await;
                }
                let _ = controller.write_text("released");
            });
            Ok(())
        }
    }

    fn host(names: &[&str]) -> Arc<Host> {
        Arc::new(Host::builder().names(names.iter().copied()).partition(WhoAmI(Mount::new("/"))).build().unwrap())
    }

    fn request(path: &str, host: Option<&str>) -> Request<()> {
        let mut builder = Request::builder().uri(path);
        if let Some(host) = host {
            builder = builder.header(header::HOST, host);
        }
        builder.body(()).unwrap()
    }

    async fn serve(network: &Network, requests: Vec<Request<()>>) -> (Option<Arc<Host>>, String) {
        let (mut pipeliner, catenation) = pipeline();
        let batch = pipeliner.admit_all(requests.into_iter().map(|request| (RequestHeader::from(request), ReqBody::empty())));
        drop(pipeliner);
        let host = network.accept(batch).unwrap();
        (host, wire(catenation).await)
    }

    #[test]
    fn unknown_names_resolve_to_default() {
        let example = host(&["example"]);
        let other = host(&["other.example", "alias.example"]);
        let network = Network::builder().default_host("example").host(&example).host(&other).build().unwrap();

        assert!(Arc::ptr_eq(&network.select(Some("other.example")).unwrap(), &other));
        assert!(Arc::ptr_eq(&network.select(Some("ALIAS.example:8080")).unwrap(), &other));
        assert!(Arc::ptr_eq(&network.select(Some("unknown.example")).unwrap(), &example));
        assert!(Arc::ptr_eq(&network.select(None).unwrap(), &example));
        assert_eq!(network.hosts().len(), 2);
    }

    #[test]
    fn missing_default_is_a_configuration_error() {
        let example = host(&["example"]);
        let mut network = Network::new();
        network.register(&example);

        assert!(network.select(Some("example")).is_ok());
        assert!(matches!(network.select(Some("unknown")), Err(ConfigError::NoDefaultHost)));
        assert!(matches!(network.select(None), Err(ConfigError::NoDefaultHost)));

        assert!(matches!(Network::builder().host(&example).build(), Err(ConfigError::NoDefaultHost)));
        let result = Network::builder().default_host("nobody").host(&example).build();
        assert!(matches!(result, Err(ConfigError::UnknownDefaultHost { name }) if name == "nobody"));
    }

    #[test]
    fn registry_does_not_own_hosts() {
        let example = host(&["example"]);
        let other = host(&["other"]);
        let mut network = Network::builder().default_host("example").host(&example).host(&other).build().unwrap();

        drop(other);
        assert!(Arc::ptr_eq(&network.select(Some("other")).unwrap(), &example));
        assert_eq!(network.hosts().len(), 1);

        network.deregister(&example);
        assert!(matches!(network.select(None), Err(ConfigError::UnknownDefaultHost { .. })));
    }

    #[tokio::test]
    async fn root_without_host_header_reaches_default_host() {
        let example = host(&["example"]);
        let network = Network::builder().default_host("example").host(&example).build().unwrap();

        let (bound, out) = serve(&network, vec![request("/", None)]).await;
        assert!(Arc::ptr_eq(&bound.unwrap(), &example));
        assert!(out.starts_with("HTTP/1.1 200 OK\r\n"), "{out}");
        assert!(out.ends_with("example:/"), "{out}");
    }

    // The whole batch follows the first request's Host, even when a later
    // request names another registered host.
    #[tokio::test]
    async fn batch_is_routed_by_first_host_header() {
        let example = host(&["example"]);
        let other = host(&["other.example"]);
        let network = Network::builder().default_host("example").host(&example).host(&other).build().unwrap();

        let requests = vec![request("/a", Some("other.example")), request("/b", Some("example"))];
        let (bound, out) = serve(&network, requests).await;

        assert!(Arc::ptr_eq(&bound.unwrap(), &other));
        assert!(out.contains("other.example:/a"), "{out}");
        assert!(out.contains("other.example:/b"), "{out}");
        assert!(!out.contains("\r\n\r\nexample:"), "{out}");
    }

    #[tokio::test]
    async fn bound_host_serves_later_batches() {
        let example = host(&["example"]);
        let network = Network::builder().default_host("example").host(&example).build().unwrap();

        let (mut pipeliner, catenation) = pipeline();
        let first = pipeliner.admit_all([(RequestHeader::from(request("/1", None)), ReqBody::empty())]);
        let bound = network.accept(first).unwrap().unwrap();

        let second = pipeliner.admit_all([(RequestHeader::from(request("/2", None)), ReqBody::empty())]);
        bound.accept(second);
        drop(pipeliner);

        let out = wire(catenation).await;
        let one = out.find("example:/1").unwrap();
        let two = out.find("example:/2").unwrap();
        assert!(one < two, "{out}");
    }

    #[tokio::test]
    async fn empty_batch_selects_nothing() {
        let network = Network::new();
        assert!(network.accept(Vec::new()).unwrap().is_none());
    }

    #[tokio::test]
    async fn termination_waits_for_host_already_terminating() {
        let (release, held) = oneshot::channel();
        let partition = Held { mount: Mount::new("/"), release: Mutex::new(Some(held)) };
        let example = Arc::new(Host::builder().name("example").partition(partition).build().unwrap());
        let network = Network::builder().default_host("example").host(&example).build().unwrap();

        let (mut pipeliner, catenation) = pipeline();
        network.accept(pipeliner.admit_all([(RequestHeader::from(request("/", None)), ReqBody::empty())])).unwrap();
        drop(pipeliner);
        let reader = tokio::spawn(wire(catenation));

        let terminating = Arc::clone(&example);
        let host_done = tokio::spawn(async move { terminating.terminate().await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(example.state(), State::Terminating);

        let network_done = tokio::spawn(async move {
            network.terminate().await;
            network
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!network_done.is_finished());

        release.send(()).unwrap();
        let network = network_done.await.unwrap();
        assert_eq!(network.state(), State::Terminated);
        assert_eq!(example.state(), State::Terminated);
        host_done.await.unwrap();
        assert!(reader.await.unwrap().ends_with("released"));
    }

    #[tokio::test]
    async fn termination_cascades_to_hosts() {
        let example = host(&["example"]);
        let other = host(&["other"]);
        let network = Network::builder().default_host("example").host(&example).host(&other).build().unwrap();

        network.terminate().await;
        assert_eq!(network.state(), State::Terminated);
        assert_eq!(example.state(), State::Terminated);
        assert_eq!(other.state(), State::Terminated);

        // idempotent
        network.terminate().await;
        assert_eq!(network.state(), State::Terminated);
    }
}
