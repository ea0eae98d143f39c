use std::collections::BTreeMap;

use tracing::debug;

use super::BackendKind;
use crate::BackendConfig;
use crate::RegistrationError;

/// A path split into its mount and the key inside that mount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    pub path: String,
    pub kind: BackendKind,
    /// Mount path without the trailing slash, e.g. `secret`
    pub mount: String,
    /// Key relative to the mount, e.g. `app/db` or a database role
    pub key: String,
    /// Field inside a versioned secret (`secret/app/db:password` -> `password`)
    pub field: Option<String>,
}

/// Static lookup table from mount prefix to secrets engine type.
///
/// Built once, either from configuration or from a mount discovery listing,
/// before anything is watched.
#[derive(Debug, Clone, Default)]
pub struct MountTable {
    /// prefix (with trailing slash) -> engine type
    mounts: BTreeMap<String, String>,
}

impl MountTable {
    pub fn from_config(config: &BackendConfig) -> Self {
        let mut table = Self::default();
        for mount in &config.mounts {
            table.insert(&mount.prefix, &mount.kind);
        }
        table
    }

    /// Builds the table from a discovery listing of `prefix -> engine type`,
    /// skipping system mounts named in `config.ignored_prefixes`.
    ///
    /// Every ignored entry is a prefix match, so `sys/` also drops
    /// `sys/internal/` and `identity/` drops `identity/oidc/`, even though
    /// only `sys/` is a mount tree; `cubbyhole/` and `identity/` are single
    /// mounts, so with the default list the outcome matches an exact compare.
    pub fn from_discovery<I, P, K>(
        listing: I,
        config: &BackendConfig,
    ) -> Self
    where
        I: IntoIterator<Item = (P, K)>,
        P: AsRef<str>,
        K: AsRef<str>,
    {
        let mut table = Self::from_config(config);
        for (prefix, kind) in listing {
            let prefix = prefix.as_ref();
            if config.ignored_prefixes.iter().any(|ignored| prefix.starts_with(ignored.as_str())) {
                debug!(prefix, "skipping system mount");
                continue;
            }
            table.insert(prefix, kind.as_ref());
        }
        table
    }

    pub fn insert(
        &mut self,
        prefix: &str,
        kind: &str,
    ) {
        let mut prefix = prefix.to_string();
        if !prefix.ends_with('/') {
            prefix.push('/');
        }
        self.mounts.insert(prefix, kind.to_string());
    }

    pub fn len(&self) -> usize {
        self.mounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mounts.is_empty()
    }

    /// Longest mount prefix that `path` starts with.
    fn lookup(
        &self,
        path: &str,
    ) -> Option<(&str, &str)> {
        self.mounts
            .iter()
            .filter(|(prefix, _)| path.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(prefix, kind)| (prefix.as_str(), kind.as_str()))
    }

    pub fn kind_of(
        &self,
        path: &str,
    ) -> Option<BackendKind> {
        self.lookup(path).and_then(|(_, kind)| BackendKind::from_engine_type(kind))
    }

    /// Resolves a path to its backend kind, mount and key.
    ///
    /// Versioned paths must name a field: `mount/secret/path:field`.
    /// Leased paths name a role: `mount/role`.
    pub fn resolve(
        &self,
        path: &str,
    ) -> std::result::Result<ResolvedPath, RegistrationError> {
        let (prefix, engine) = self.lookup(path).ok_or_else(|| RegistrationError::NoMount {
            path: path.to_string(),
        })?;
        let mount = prefix.trim_end_matches('/').to_string();

        let kind = BackendKind::from_engine_type(engine).ok_or_else(|| RegistrationError::UnsupportedKind {
            mount: mount.clone(),
            kind: engine.to_string(),
        })?;

        let rest = &path[prefix.len()..];
        let malformed = |reason: &str| RegistrationError::MalformedPath {
            path: path.to_string(),
            reason: reason.to_string(),
        };

        match kind {
            BackendKind::Versioned => {
                let (key, field) = rest
                    .split_once(':')
                    .ok_or_else(|| malformed("expected <mount>/<key>:<field>"))?;
                if key.is_empty() || field.is_empty() {
                    return Err(malformed("key and field must be non-empty"));
                }
                Ok(ResolvedPath {
                    path: path.to_string(),
                    kind,
                    mount,
                    key: key.to_string(),
                    field: Some(field.to_string()),
                })
            }
            BackendKind::Leased => {
                if rest.is_empty() {
                    return Err(malformed("missing role name"));
                }
                Ok(ResolvedPath {
                    path: path.to_string(),
                    kind,
                    mount,
                    key: rest.to_string(),
                    field: None,
                })
            }
        }
    }
}
