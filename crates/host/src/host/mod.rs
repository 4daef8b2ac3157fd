//! Virtual host routing.
//!
//! A [`Host`] answers for a set of names and routes each request by path to
//! the [`Partition`] with the most specific mount prefix. Requests no
//! partition claims are answered by the host itself:
//!
//! | match | path | method  | answer                                      |
//! |-------|------|---------|---------------------------------------------|
//! | found | any  | any     | the partition's [`Partition::select`]       |
//! | none  | `*`  | OPTIONS | `204 NO CONTENT` with `Allow`               |
//! | none  | any  | any     | request body discarded, `404` XML document |

mod error_document;

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use futures::future::join_all;
use http::header::ALLOW;
use http::{HeaderValue, Method, StatusCode};
use micro_transport::connection::Pipeline;
use tracing::{debug, error, info};

pub use error_document::STYLESHEET;

use crate::controller::Controller;
use crate::error::{ConfigError, ControllerError};
use crate::lifecycle::{Lifecycle, State};
use crate::partition::Partition;
use crate::prefix::PrefixIndex;
use crate::request::ASTERISK;
use crate::status;

/// Methods a host permits unless configured otherwise, in `Allow` order.
pub const DEFAULT_METHODS: [Method; 7] =
    [Method::GET, Method::HEAD, Method::POST, Method::PUT, Method::PATCH, Method::DELETE, Method::OPTIONS];

pub struct Host {
    names: Vec<String>,
    allowed_methods: Vec<Method>,
    allow: HeaderValue,
    options: HashSet<String>,
    mount_point: Option<String>,
    routes: Option<Routes>,
    lifecycle: Lifecycle,
}

struct Routes {
    index: PrefixIndex,
    mounted: Vec<Mounted>,
}

struct Mounted {
    partition: Arc<dyn Partition>,
    scope: Lifecycle,
}

impl Host {
    pub fn builder() -> HostBuilder {
        HostBuilder::new()
    }

    /// The first configured name.
    pub fn canonical(&self) -> Option<&str> {
        self.names.first().map(String::as_str)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Replaces the names this host answers for; the first becomes canonical.
    ///
    /// A host registered with a network must be registered again for the
    /// change to reach the lookup table.
    pub fn update_names<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.names = normalize_names(names);
    }

    pub fn allowed_methods(&self) -> &[Method] {
        &self.allowed_methods
    }

    pub fn is_allowed(&self, method: &Method) -> bool {
        self.allowed_methods.contains(method)
    }

    pub fn options(&self) -> &HashSet<String> {
        &self.options
    }

    pub fn has_option(&self, option: &str) -> bool {
        self.options.contains(option)
    }

    pub fn enable_options<I, S>(&mut self, options: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options.extend(options.into_iter().map(Into::into));
    }

    pub fn disable_options<I, S>(&mut self, options: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for option in options {
            self.options.remove(option.as_ref());
        }
    }

    /// Path prefix under which a fronting proxy exposes this host.
    pub fn mount_point(&self) -> Option<&str> {
        self.mount_point.as_deref()
    }

    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    pub fn is_configured(&self) -> bool {
        self.routes.is_some()
    }

    /// Builds the prefix index from the partitions' mount paths.
    ///
    /// Must happen exactly once, before the host routes any request.
    pub fn configure(&mut self, partitions: Vec<Arc<dyn Partition>>) -> Result<(), ConfigError> {
        if self.routes.is_some() {
            return Err(ConfigError::AlreadyConfigured { canonical: self.canonical().map(str::to_owned) });
        }

        let index = PrefixIndex::new(partitions.iter().map(|partition| partition.mount().path()))
            .map_err(|path| ConfigError::DuplicateMount { path })?;

        let mounted = partitions
            .into_iter()
            .map(|partition| Mounted { partition, scope: self.lifecycle.child() })
            .collect::<Vec<_>>();

        info!(host = ?self.canonical(), partitions = mounted.len(), "host configured");
        self.routes = Some(Routes { index, mounted });
        Ok(())
    }

    /// Mount paths in configuration order.
    pub fn mounts(&self) -> impl Iterator<Item = &str> {
        self.routes.iter().flat_map(|routes| routes.mounted.iter().map(|mounted| mounted.partition.mount().path()))
    }

    /// Builds a controller per request of `batch` and routes them in arrival order.
    pub fn accept(self: &Arc<Self>, batch: Pipeline) {
        for (port, descriptor) in batch {
            let controller = Controller::new(port, descriptor, self.lifecycle.clone());
            let channel_id = controller.channel_id();
            if let Err(e) = self.route(controller) {
                error!(host = ?self.canonical(), %channel_id, cause = %e, "failed to route request");
            }
        }
    }

    /// Routes one request according to the decision table of this module.
    pub fn route(self: &Arc<Self>, mut controller: Controller) -> Result<(), ControllerError> {
        let request = controller.request();
        let path = request.path();
        let is_options = path == ASTERISK && *request.method() == Method::OPTIONS;
        let target = self.routes.as_ref().and_then(|routes| routes.index.lookup(path).map(|i| &routes.mounted[i]));

        match target {
            Some(mounted) => {
                debug!(channel_id = %controller.channel_id(), path, mount = mounted.partition.mount().path(), "routing to partition");
                controller.rebind(mounted.scope.clone());
                mounted.partition.select(self, controller)
            }
            None if is_options => self.options_request(controller),
            None => self.fallback(controller),
        }
    }

    /// Answers `OPTIONS *` with the permitted methods.
    pub fn options_request(&self, mut controller: Controller) -> Result<(), ControllerError> {
        controller.add_header(ALLOW, self.allow.clone());
        controller.set_response(StatusCode::NO_CONTENT, status::description(StatusCode::NO_CONTENT), None, None)?;
        controller.accept(None)?;
        controller.connect(None)
    }

    /// Answers a request no partition claims: the body is discarded and a `404` sent.
    pub fn fallback(&self, mut controller: Controller) -> Result<(), ControllerError> {
        debug!(channel_id = %controller.channel_id(), path = controller.request().path(), "no partition matched");
        controller.accept(None)?;
        self.render_error(&mut controller, StatusCode::NOT_FOUND, None)
    }

    /// Answers `500 MISCONFIGURED` for a partition that cannot resolve a request.
    pub fn misconfigured(&self, mut controller: Controller) -> Result<(), ControllerError> {
        if !controller.is_accepted() {
            controller.accept(None)?;
        }
        self.render_error(&mut controller, StatusCode::INTERNAL_SERVER_ERROR, Some("MISCONFIGURED"))
    }

    /// Answers `405` with an `Allow` header, for partitions that enforce the method set.
    pub fn method_not_allowed(&self, mut controller: Controller) -> Result<(), ControllerError> {
        if !controller.is_accepted() {
            controller.accept(None)?;
        }
        controller.add_header(ALLOW, self.allow.clone());
        self.render_error(&mut controller, StatusCode::METHOD_NOT_ALLOWED, None)
    }

    /// Sends the XML error document for `status`.
    ///
    /// `description` defaults to the upper-cased canonical reason and is used
    /// both on the status line and in the document.
    pub fn render_error(
        &self,
        controller: &mut Controller,
        status: StatusCode,
        description: Option<&str>,
    ) -> Result<(), ControllerError> {
        let default;
        let description = match description {
            Some(description) => description,
            None => {
                default = status::description(status);
                std::str::from_utf8(&default).unwrap_or_default()
            }
        };

        let document = error_document::render(status, description);
        let reason = bytes::Bytes::copy_from_slice(description.as_bytes());
        controller.set_response(status, reason, Some(document.len() as u64), Some(&mime::TEXT_XML))?;
        controller.connect(Some(document.into()))
    }

    /// Terminates every partition scope, then the host itself.
    ///
    /// Completes once no unit of work of the host remains. Terminating a host
    /// that already started terminating waits for that termination to finish.
    pub async fn terminate(&self) {
        if !self.lifecycle.start_termination() {
            self.lifecycle.terminated().await;
            return;
        }
        info!(host = ?self.canonical(), "host terminating");

        if let Some(routes) = &self.routes {
            join_all(routes.mounted.iter().map(|mounted| mounted.scope.terminate())).await;
        }

        self.lifecycle.finish_termination().await;
        info!(host = ?self.canonical(), "host terminated");
    }

    pub fn state(&self) -> State {
        self.lifecycle.state()
    }
}

impl fmt::Debug for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Host")
            .field("names", &self.names)
            .field("allowed_methods", &self.allowed_methods)
            .field("options", &self.options)
            .field("mount_point", &self.mount_point)
            .field("mounts", &self.mounts().collect::<Vec<_>>())
            .field("lifecycle", &self.lifecycle)
            .finish()
    }
}

fn normalize_names<I, S>(names: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    names.into_iter().map(|name| name.as_ref().to_ascii_lowercase()).filter(|name| seen.insert(name.clone())).collect()
}

fn allow_header(methods: &[Method]) -> Result<HeaderValue, ConfigError> {
    let joined = methods.iter().map(Method::as_str).collect::<Vec<_>>().join(",");
    HeaderValue::from_str(&joined).map_err(|_invalid| ConfigError::InvalidMethod { method: joined })
}

/// Collects the settings of a [`Host`] and validates them on [`build`](Self::build).
#[derive(Default)]
pub struct HostBuilder {
    names: Vec<String>,
    allowed_methods: Option<Vec<Method>>,
    options: HashSet<String>,
    mount_point: Option<String>,
    partitions: Vec<Arc<dyn Partition>>,
}

impl fmt::Debug for HostBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostBuilder")
            .field("names", &self.names)
            .field("allowed_methods", &self.allowed_methods)
            .field("mounts", &self.partitions.iter().map(|partition| partition.mount().path()).collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl HostBuilder {
    fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.names.push(name.into());
        self
    }

    pub fn names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.names.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn allowed_methods<I>(mut self, methods: I) -> Self
    where
        I: IntoIterator<Item = Method>,
    {
        self.allowed_methods = Some(methods.into_iter().collect());
        self
    }

    pub fn option(mut self, option: impl Into<String>) -> Self {
        self.options.insert(option.into());
        self
    }

    pub fn mount_point(mut self, mount_point: impl Into<String>) -> Self {
        self.mount_point = Some(mount_point.into());
        self
    }

    pub fn partition<P: Partition>(mut self, partition: P) -> Self {
        self.partitions.push(Arc::new(partition));
        self
    }

    pub fn shared_partition(mut self, partition: Arc<dyn Partition>) -> Self {
        self.partitions.push(partition);
        self
    }

    /// Builds and configures the host.
    pub fn build(self) -> Result<Host, ConfigError> {
        let allowed_methods = self.allowed_methods.unwrap_or_else(|| DEFAULT_METHODS.to_vec());
        let mut host = Host {
            names: normalize_names(self.names),
            allow: allow_header(&allowed_methods)?,
            allowed_methods,
            options: self.options,
            mount_point: self.mount_point,
            routes: None,
            lifecycle: Lifecycle::new(),
        };
        host.configure(self.partitions)?;
        Ok(host)
    }
}
