use std::collections::BTreeMap;
use std::path::PathBuf;
use log::debug;
use thiserror::Error;

/// Property holding the base DNS domain of the cluster router.
pub const ROUTER_DOMAIN_PROPERTY: &str = "operator.domain.name";

#[derive(Error, Debug)]
pub enum Error {
    #[error("property {0} is not set")]
    NotFound(String),

    #[error("property {0} is not a string")]
    NotAString(String),

    #[error("read {path}: {err}")]
    ReadFile {
        err: std::io::Error,
        path: String,
    },

    #[error("parse {path}: {err}")]
    Parse {
        err: toml::de::Error,
        path: String,
    },
}

/// Ambient configuration, looked up one property at a time.
pub trait ConfigSource: Send + Sync {
    fn value(&self, key: &str) -> Result<String, Error>;
}

impl ConfigSource for BTreeMap<String, String> {
    fn value(&self, key: &str) -> Result<String, Error> {
        self.get(key)
            .filter(|value| !value.is_empty())
            .cloned()
            .ok_or_else(|| Error::NotFound(key.to_string()))
    }
}

/// Process environment first, then an optional TOML properties file.
///
/// Nothing is cached: every lookup consults the environment and re-reads
/// the file, so a changed value is picked up by the next request.
#[derive(Debug, Clone, Default)]
pub struct Properties {
    file: Option<PathBuf>,
}

impl Properties {
    pub fn new(file: Option<PathBuf>) -> Self {
        Self { file }
    }

    fn from_env(key: &str) -> Option<String> {
        std::env::var(key)
            .ok()
            .or_else(|| std::env::var(env_name(key)).ok())
            .filter(|value| !value.is_empty())
    }

    fn from_file(&self, key: &str) -> Result<Option<String>, Error> {
        let Some(path) = &self.file else {
            return Ok(None);
        };
        let path = path.to_string_lossy().to_string();
        let data = std::fs::read_to_string(&path).map_err(|err| Error::ReadFile {
            err,
            path: path.clone(),
        })?;
        let table: toml::Table = toml::from_str(&data).map_err(|err| Error::Parse { err, path })?;
        lookup(&table, key)
    }
}

impl ConfigSource for Properties {
    fn value(&self, key: &str) -> Result<String, Error> {
        if let Some(value) = Self::from_env(key) {
            debug!("property {key} resolved from environment");
            return Ok(value);
        }
        self.from_file(key)?
            .ok_or_else(|| Error::NotFound(key.to_string()))
    }
}

/// `operator.domain.name` -> `OPERATOR_DOMAIN_NAME`
fn env_name(key: &str) -> String {
    key.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
        .collect()
}

/// Accepts both a quoted flat key and nested tables.
fn lookup(table: &toml::Table, key: &str) -> Result<Option<String>, Error> {
    let found = match table.get(key) {
        Some(value) => Some(value),
        None => {
            let mut segments = key.split('.');
            let first = segments.next().and_then(|s| table.get(s));
            segments.fold(first, |value, segment| value.and_then(|v| v.get(segment)))
        }
    };
    match found {
        None => Ok(None),
        // An empty value counts as unset.
        Some(toml::Value::String(s)) if s.is_empty() => Ok(None),
        Some(toml::Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(Error::NotAString(key.to_string())),
    }
}

pub mod file {
    use serde::Deserialize;
    use serde_inline_default::serde_inline_default;
    use thiserror::Error;

    const DEFAULT_CONFIG: &str = include_str!("../default.toml");

    #[derive(Error, Debug)]
    pub enum Error {
        #[error("read {path}: {err}")]
        ReadFile {
            err: std::io::Error,
            path: String,
        },

        #[error("deserialize: {0}")]
        Deserialize(#[from] toml::de::Error),
    }

    /// A ssr.toml file.
    #[derive(Deserialize, Debug)]
    pub struct File {
        pub description: Option<String>,
        #[serde(default = "Default::default")]
        pub provisioner: Provisioner,
    }

    impl Default for File {
        fn default() -> Self {
            // The default config is compiled into the program, so
            // make sure to test default() to catch panics compile-time.
            toml::from_str(DEFAULT_CONFIG).unwrap()
        }
    }

    impl File {
        /// Layer a user supplied file on top of the built-in defaults.
        pub fn default_with_user_config_file(path: &str) -> Result<Self, Error> {
            let user = std::fs::read_to_string(path).map_err(|err| Error::ReadFile {
                err,
                path: path.to_string(),
            })?;
            let mut merged: toml::Table = toml::from_str(DEFAULT_CONFIG)?;
            merge(&mut merged, toml::from_str(&user)?);
            Ok(toml::Value::Table(merged).try_into()?)
        }
    }

    fn merge(base: &mut toml::Table, overlay: toml::Table) {
        for (key, value) in overlay {
            match value {
                toml::Value::Table(nested) if base.get(&key).is_some_and(|v| v.is_table()) => {
                    if let Some(toml::Value::Table(existing)) = base.get_mut(&key) {
                        merge(existing, nested);
                    }
                }
                value => {
                    base.insert(key, value);
                }
            }
        }
    }

    #[derive(Deserialize, Debug, Clone, Copy, PartialEq)]
    #[serde(rename_all = "lowercase")]
    pub enum Mode {
        /// Log the mutations instead of performing them.
        Plan,
        /// Hand every mutation to an external program.
        Hook,
    }

    #[serde_inline_default]
    #[derive(Deserialize, Debug, Clone)]
    pub struct Provisioner {
        #[serde_inline_default(Mode::Plan)]
        pub mode: Mode,
        #[serde_inline_default("spaship-provisioner".to_string())]
        pub program: String,
        /// Ask the hook to wait until the cluster has rolled out the change.
        #[serde_inline_default(true)]
        pub wait: bool,
    }

    impl Default for Provisioner {
        fn default() -> Self {
            Self {
                mode: Mode::Plan,
                program: "spaship-provisioner".to_string(),
                wait: true,
            }
        }
    }
}

#[cfg(test)]
pub mod test {
    use std::io::Write;
    use super::{ConfigSource, Error, Properties};

    #[test]
    pub fn load_default_configuration() {
        let cfg = super::file::File::default();
        assert_eq!(cfg.description, Some("Default configuration file".into()));
        assert_eq!(cfg.provisioner.mode, super::file::Mode::Plan);
        assert!(cfg.provisioner.wait);
    }

    #[test]
    pub fn user_file_overrides_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[provisioner]\nmode = \"hook\"\nwait = false").unwrap();
        let cfg = super::file::File::default_with_user_config_file(file.path().to_str().unwrap()).unwrap();
        assert_eq!(cfg.provisioner.mode, super::file::Mode::Hook);
        assert!(!cfg.provisioner.wait);
        assert_eq!(cfg.provisioner.program, "spaship-provisioner");
        assert_eq!(cfg.description, Some("Default configuration file".into()));
    }

    #[test]
    pub fn environment_variable_name() {
        assert_eq!(super::env_name("operator.domain.name"), "OPERATOR_DOMAIN_NAME");
        assert_eq!(super::env_name("a-b.c"), "A_B_C");
    }

    #[test]
    pub fn nested_and_flat_keys_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "\"spaship.flat.key\" = \"flat\"\n[spaship.nested]\nkey = \"nested\"\ncount = 3").unwrap();
        let props = Properties::new(Some(file.path().to_path_buf()));
        assert_eq!(props.value("spaship.flat.key").unwrap(), "flat");
        assert_eq!(props.value("spaship.nested.key").unwrap(), "nested");
        assert!(matches!(props.value("spaship.nested.count"), Err(Error::NotAString(_))));
        assert!(matches!(props.value("spaship.nested.absent"), Err(Error::NotFound(_))));
    }

    #[test]
    pub fn file_is_read_on_every_lookup() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[spaship.reload]\nkey = \"first\"").unwrap();
        let props = Properties::new(Some(file.path().to_path_buf()));
        assert_eq!(props.value("spaship.reload.key").unwrap(), "first");

        std::fs::write(file.path(), "[spaship.reload]\nkey = \"second\"\n").unwrap();
        assert_eq!(props.value("spaship.reload.key").unwrap(), "second");
    }

    #[test]
    pub fn empty_value_is_not_set() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "\"spaship.empty.flat\" = \"\"\n[spaship.empty]\nname = \"\"").unwrap();
        let props = Properties::new(Some(file.path().to_path_buf()));
        assert!(matches!(props.value("spaship.empty.name"), Err(Error::NotFound(_))));
        assert!(matches!(props.value("spaship.empty.flat"), Err(Error::NotFound(_))));
    }

    #[test]
    pub fn empty_router_domain_is_omitted_from_parameters() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[operator.domain]\nname = \"\"").unwrap();
        if std::env::var("OPERATOR_DOMAIN_NAME").is_ok() || std::env::var(super::ROUTER_DOMAIN_PROPERTY).is_ok() {
            return;
        }
        let props = Properties::new(Some(file.path().to_path_buf()));
        let params = crate::descriptor::tests::acme().template_parameters(&props);
        assert_eq!(params.get(crate::descriptor::ROUTER_DOMAIN), None);
        assert!(params.router_domain_error().unwrap().contains("is not set"));
    }

    #[test]
    pub fn missing_file_is_an_error() {
        let props = Properties::new(Some("/nonexistent/ssr.toml".into()));
        assert!(matches!(props.value("spaship.any.key"), Err(Error::ReadFile { .. })));
    }

    #[test]
    pub fn no_file_means_not_found() {
        let props = Properties::default();
        assert!(matches!(props.value("spaship.unset.key"), Err(Error::NotFound(_))));
    }
}
