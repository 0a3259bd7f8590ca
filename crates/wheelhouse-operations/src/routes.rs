//! Handler tables for the publishing and query protocols.
//!
//! Configuration maps `:action` values and XML-RPC method names to handler names. The
//! tables are resolved once into typed handlers so an unknown handler name fails at startup
//! instead of on the first request that uses it.

use std::{collections::BTreeMap, fmt, str::FromStr};

use wheelhouse_config::config::Config;

use crate::error::{OperationError, Result};

/// Handlers reachable through the `:action` form field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionHandler {
    /// Upload or register a release.
    Publish,
    ListClassifiers,
}

/// Handlers reachable through XML-RPC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RpcHandler {
    ListPackages,
    PackageReleases,
    ReleaseUrls,
    ReleaseData,
}

/// Handler for requests without an `:action`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackHandler {
    /// Human-browsable list of packages.
    Index,
}

macro_rules! handler_names {
    ($ty:ident { $($variant:ident => $name:literal),+ $(,)? }) => {
        impl $ty {
            pub const ALL: &'static [$ty] = &[$($ty::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($ty::$variant => $name),+
                }
            }
        }

        impl FromStr for $ty {
            type Err = ();

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                match s.trim() {
                    $($name => Ok($ty::$variant),)+
                    _ => Err(()),
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

handler_names!(ActionHandler {
    Publish => "publish",
    ListClassifiers => "list_classifiers",
});

handler_names!(RpcHandler {
    ListPackages => "list_packages",
    PackageReleases => "package_releases",
    ReleaseUrls => "release_urls",
    ReleaseData => "release_data",
});

handler_names!(FallbackHandler {
    Index => "index",
});

/// Immutable dispatch tables.
#[derive(Debug, Clone)]
pub struct Routes {
    actions: BTreeMap<String, ActionHandler>,
    rpc_methods: BTreeMap<String, RpcHandler>,
    fallback: FallbackHandler,
}

impl Routes {
    /// Resolves the handler tables of `config`.
    ///
    /// # Errors
    ///
    /// * [`OperationError::UnknownHandler`] if a table names a handler that does not exist.
    pub fn from_config(config: &Config) -> Result<Self> {
        let actions = resolve_table("action", config.actions(), ActionHandler::ALL)?;
        let rpc_methods = resolve_table("rpc", config.rpc_methods(), RpcHandler::ALL)?;
        let fallback = resolve("fallback", "fallback", config.fallback(), FallbackHandler::ALL)?;

        Ok(Self {
            actions,
            rpc_methods,
            fallback,
        })
    }

    pub fn action(&self, action: &str) -> Option<ActionHandler> {
        self.actions.get(action).copied()
    }

    pub fn rpc_method(&self, method: &str) -> Option<RpcHandler> {
        self.rpc_methods.get(method).copied()
    }

    pub fn fallback(&self) -> FallbackHandler {
        self.fallback
    }

    /// Names of every routable action, for `Allow` headers.
    pub fn action_names(&self) -> Vec<&str> {
        self.actions.keys().map(String::as_str).collect()
    }

    pub fn rpc_method_names(&self) -> Vec<&str> {
        self.rpc_methods.keys().map(String::as_str).collect()
    }
}

fn resolve_table<H>(
    kind: &'static str,
    table: BTreeMap<String, String>,
    all: &[H],
) -> Result<BTreeMap<String, H>>
where
    H: FromStr + fmt::Display,
{
    table
        .into_iter()
        .map(|(name, handler)| {
            let resolved = resolve(kind, &name, &handler, all)?;
            Ok((name, resolved))
        })
        .collect()
}

fn resolve<H>(kind: &'static str, name: &str, handler: &str, all: &[H]) -> Result<H>
where
    H: FromStr + fmt::Display,
{
    handler.parse().map_err(|_| {
        OperationError::UnknownHandler {
            kind,
            name: name.to_string(),
            handler: handler.to_string(),
            available: all
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", "),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        let mut config = Config::default_config();
        config.resolve().unwrap();
        config
    }

    #[test]
    fn test_default_routes() {
        let routes = Routes::from_config(&config()).unwrap();

        assert_eq!(routes.action("file_upload"), Some(ActionHandler::Publish));
        assert_eq!(routes.action("submit"), Some(ActionHandler::Publish));
        assert_eq!(
            routes.action("list_classifiers"),
            Some(ActionHandler::ListClassifiers)
        );
        assert_eq!(routes.action("verify"), None);
        assert_eq!(
            routes.action_names(),
            vec!["file_upload", "list_classifiers", "submit"]
        );

        assert_eq!(
            routes.rpc_method("release_urls"),
            Some(RpcHandler::ReleaseUrls)
        );
        assert_eq!(routes.rpc_method("search"), None);
        assert_eq!(routes.fallback(), FallbackHandler::Index);
    }

    #[test]
    fn test_aliased_action() {
        let mut config = config();
        config
            .actions
            .get_or_insert_with(Default::default)
            .insert("upload".into(), "publish".into());

        let routes = Routes::from_config(&config).unwrap();
        assert_eq!(routes.action("upload"), Some(ActionHandler::Publish));
    }

    #[test]
    fn test_unknown_handler_fails() {
        let mut config = config();
        config
            .rpc_methods
            .get_or_insert_with(Default::default)
            .insert("search".into(), "search_everything".into());

        let err = Routes::from_config(&config).unwrap_err();
        match err {
            OperationError::UnknownHandler {
                kind,
                name,
                handler,
                available,
            } => {
                assert_eq!(kind, "rpc");
                assert_eq!(name, "search");
                assert_eq!(handler, "search_everything");
                assert!(available.contains("release_data"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_unknown_fallback_fails() {
        let mut config = config();
        config.fallback = Some("welcome".into());
        assert!(matches!(
            Routes::from_config(&config),
            Err(OperationError::UnknownHandler { kind: "fallback", .. })
        ));
    }
}
