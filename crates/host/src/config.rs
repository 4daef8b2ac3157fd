//! Serde documents describing hosts and networks.
//!
//! ```json
//! {
//!   "default_host": "example.org",
//!   "hosts": [
//!     { "names": ["example.org", "www.example.org"], "allowed_methods": ["GET", "HEAD"] }
//!   ]
//! }
//! ```
//!
//! Documents only carry settings; partitions are code and are attached to the
//! returned [`HostBuilder`]s before building.

use http::Method;
use serde::Deserialize;

use crate::error::ConfigError;
use crate::host::{Host, HostBuilder};
use crate::network::NetworkBuilder;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HostConfig {
    pub names: Vec<String>,
    /// `None` keeps the default method set.
    pub allowed_methods: Option<Vec<String>>,
    pub options: Vec<String>,
    pub mount_point: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NetworkConfig {
    pub default_host: Option<String>,
    pub hosts: Vec<HostConfig>,
}

impl HostConfig {
    pub fn builder(&self) -> Result<HostBuilder, ConfigError> {
        let mut builder = Host::builder().names(self.names.iter().cloned());

        if let Some(methods) = &self.allowed_methods {
            let methods = methods
                .iter()
                .map(|method| {
                    Method::from_bytes(method.as_bytes()).map_err(|_invalid| ConfigError::InvalidMethod { method: method.clone() })
                })
                .collect::<Result<Vec<_>, _>>()?;
            builder = builder.allowed_methods(methods);
        }

        for option in &self.options {
            builder = builder.option(option.clone());
        }

        if let Some(mount_point) = &self.mount_point {
            builder = builder.mount_point(mount_point.clone());
        }

        Ok(builder)
    }
}

impl NetworkConfig {
    /// A network builder carrying the default host; hosts are added once built.
    pub fn builder(&self) -> NetworkBuilder {
        let builder = NetworkBuilder::default();
        match &self.default_host {
            Some(name) => builder.default_host(name.clone()),
            None => builder,
        }
    }

    /// One host builder per configured host, in document order.
    pub fn host_builders(&self) -> Result<Vec<HostBuilder>, ConfigError> {
        self.hosts.iter().map(HostConfig::builder).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn network_document() {
        let config: NetworkConfig = serde_json::from_str(
            r#"{
                "default_host": "example.org",
                "hosts": [
                    { "names": ["example.org", "www.example.org"], "allowed_methods": ["GET", "HEAD"], "options": ["trace"] },
                    { "names": ["static.example.org"], "mount_point": "/static/" }
                ]
            }"#,
        )
        .unwrap();

        let hosts: Vec<Arc<Host>> =
            config.host_builders().unwrap().into_iter().map(|builder| Arc::new(builder.build().unwrap())).collect();
        assert_eq!(hosts[0].allowed_methods(), [Method::GET, Method::HEAD]);
        assert!(hosts[0].has_option("trace"));
        assert_eq!(hosts[1].mount_point(), Some("/static/"));
        assert_eq!(hosts[1].allowed_methods().len(), 7);

        let network = hosts.iter().fold(config.builder(), |builder, host| builder.host(host)).build().unwrap();
        let selected = network.select(Some("www.example.org")).unwrap();
        assert!(Arc::ptr_eq(&selected, &hosts[0]));
    }

    #[test]
    fn invalid_method_is_rejected() {
        let config: HostConfig = serde_json::from_str(r#"{ "allowed_methods": ["GET", "NOT A METHOD"] }"#).unwrap();
        assert!(matches!(config.builder(), Err(ConfigError::InvalidMethod { method }) if method == "NOT A METHOD"));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        assert!(serde_json::from_str::<HostConfig>(r#"{ "nmaes": [] }"#).is_err());
    }

    #[test]
    fn missing_default_fails_at_build() {
        let config: NetworkConfig = serde_json::from_str(r#"{ "hosts": [{ "names": ["a"] }] }"#).unwrap();
        let host = Arc::new(config.host_builders().unwrap().remove(0).build().unwrap());
        assert!(matches!(config.builder().host(&host).build(), Err(ConfigError::NoDefaultHost)));
    }
}
