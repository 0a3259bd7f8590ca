use std::{
    sync::{LazyLock, RwLock},
    time::Duration,
};

use ureq::{Agent, Proxy};

/// User agent sent to upstream indexes unless configured otherwise.
pub const DEFAULT_USER_AGENT: &str = concat!("wheelhouse/", env!("CARGO_PKG_VERSION"));

/// Settings of the process-wide HTTP agent.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub user_agent: Option<String>,
    pub proxy: Option<Proxy>,
    pub timeout: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            user_agent: Some(DEFAULT_USER_AGENT.into()),
            proxy: None,
            timeout: None,
        }
    }
}

impl ClientConfig {
    /// Builds an HTTP `Agent` from this configuration.
    ///
    /// # Examples
    ///
    /// ```
    /// use wheelhouse_dl::http_client::ClientConfig;
    ///
    /// let agent = ClientConfig::default().build();
    /// let _req = agent.get("https://pypi.org/simple/");
    /// ```
    pub fn build(&self) -> Agent {
        let mut builder = Agent::config_builder()
            .proxy(self.proxy.clone())
            .timeout_global(self.timeout);

        if let Some(user_agent) = &self.user_agent {
            builder = builder.user_agent(user_agent);
        }

        builder.build().into()
    }
}

static SHARED_CLIENT: LazyLock<RwLock<(ClientConfig, Agent)>> = LazyLock::new(|| {
    let config = ClientConfig::default();
    let agent = config.build();
    RwLock::new((config, agent))
});

/// The process-wide agent. Clones share one connection pool.
pub fn shared_agent() -> Agent {
    SHARED_CLIENT.read().unwrap().1.clone()
}

/// Updates the shared client configuration and rebuilds the shared agent.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use wheelhouse_dl::http_client::configure_http_client;
///
/// configure_http_client(|cfg| {
///     cfg.timeout = Some(Duration::from_secs(60));
/// });
/// ```
pub fn configure_http_client<F>(updater: F)
where
    F: FnOnce(&mut ClientConfig),
{
    let mut shared = SHARED_CLIENT.write().unwrap();
    let mut config = shared.0.clone();
    updater(&mut config);
    let agent = config.build();
    *shared = (config, agent);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_config_default() {
        let config = ClientConfig::default();
        assert!(config
            .user_agent
            .as_deref()
            .is_some_and(|ua| ua.starts_with("wheelhouse/")));
        assert!(config.proxy.is_none());
        assert!(config.timeout.is_none());
    }

    #[test]
    fn test_configure_http_client() {
        configure_http_client(|cfg| {
            cfg.timeout = Some(Duration::from_secs(10));
            cfg.user_agent = Some("wheelhouse-test".into());
        });

        let config = SHARED_CLIENT.read().unwrap().0.clone();
        assert_eq!(config.timeout, Some(Duration::from_secs(10)));
        assert_eq!(config.user_agent.as_deref(), Some("wheelhouse-test"));

        let _ = shared_agent().get("https://pypi.org/simple/");

        configure_http_client(|cfg| *cfg = ClientConfig::default());
    }
}
