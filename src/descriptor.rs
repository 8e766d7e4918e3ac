use std::collections::{BTreeMap, HashMap};
use std::fmt::{Display, Formatter};
use log::error;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use crate::config::{ConfigSource, ROUTER_DOMAIN_PROPERTY};

pub const IMAGE_URL: &str = "IMAGE-URL";
pub const APP: &str = "APP";
pub const CONTEXT_PATH: &str = "CONTEXT-PATH";
pub const HEALTH_CHECK_PATH: &str = "HEALTH-CHECK-PATH";
pub const WEBSITE: &str = "WEBSITE";
pub const ENV: &str = "ENV";
pub const ROUTER_DOMAIN: &str = "ROUTER-DOMAIN";

#[derive(Error, Debug, PartialEq)]
pub enum Error {
    #[error("required field {0} is missing or empty")]
    MissingField(&'static str),
}

/// Everything needed to describe one SPA/SSR environment.
///
/// Built by the caller for a single request and consumed by the request processor.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentDescriptor {
    #[serde(alias = "nameSpace")]
    pub namespace: String,
    pub image_url: Option<String>,
    pub app: Option<String>,
    pub context_path: Option<String>,
    pub health_check_path: Option<String>,
    pub website: Option<String>,
    pub environment: Option<String>,
    /// Extra configuration entries. Empty means no config map step.
    #[serde(default)]
    pub config_map: HashMap<String, String>,
}

/// Label selector of the config map belonging to an environment.
#[derive(Debug, Clone, PartialEq)]
pub struct IdentityTriple {
    pub website: String,
    pub app: String,
    pub environment: String,
}

/// Template-ready parameters derived from a descriptor.
///
/// A key is absent when the descriptor did not supply the field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TemplateParameters {
    values: BTreeMap<String, String>,
    /// Why `ROUTER-DOMAIN` could not be resolved, if it couldn't.
    router_domain_error: Option<String>,
}

impl TemplateParameters {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn values(&self) -> &BTreeMap<String, String> {
        &self.values
    }

    pub fn router_domain_error(&self) -> Option<&str> {
        self.router_domain_error.as_deref()
    }

    fn put(&mut self, key: &str, value: &Option<String>) {
        if let Some(value) = value {
            self.values.insert(key.to_string(), value.clone());
        }
    }
}

impl EnvironmentDescriptor {
    pub fn has_config_map(&self) -> bool {
        !self.config_map.is_empty()
    }

    /// Derive the template parameters, resolving the router domain from `config` right now.
    pub fn template_parameters(&self, config: &dyn ConfigSource) -> TemplateParameters {
        let mut params = TemplateParameters::default();
        params.put(IMAGE_URL, &self.image_url);
        params.put(APP, &self.app);
        params.put(CONTEXT_PATH, &self.context_path);
        params.put(HEALTH_CHECK_PATH, &self.health_check_path);
        params.put(WEBSITE, &self.website);
        params.put(ENV, &self.environment);

        match config.value(ROUTER_DOMAIN_PROPERTY) {
            Ok(domain) => {
                params.values.insert(ROUTER_DOMAIN.to_string(), domain);
            }
            Err(err) => {
                error!("failed to fetch the value of property {ROUTER_DOMAIN_PROPERTY}: {err}");
                params.router_domain_error = Some(err.to_string());
            }
        }
        params
    }

    pub fn identity(&self) -> Result<IdentityTriple, Error> {
        Ok(IdentityTriple {
            website: required("website", &self.website)?,
            app: required("app", &self.app)?,
            environment: required("environment", &self.environment)?,
        })
    }

    /// `<website>-<app>-<environment>`, joined verbatim.
    pub fn deployment_name(&self) -> Result<String, Error> {
        let id = self.identity()?;
        Ok(format!("{}-{}-{}", id.website, id.app, id.environment))
    }
}

fn required(name: &'static str, value: &Option<String>) -> Result<String, Error> {
    match value {
        Some(value) if !value.is_empty() => Ok(value.clone()),
        _ => Err(Error::MissingField(name)),
    }
}

impl Display for EnvironmentDescriptor {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        fn show(value: &Option<String>) -> &str {
            value.as_deref().unwrap_or("null")
        }
        let config_map: BTreeMap<_, _> = self.config_map.iter().collect();
        write!(
            f,
            "EnvironmentDescriptor[namespace={}, imageUrl={}, app={}, contextPath={}, healthCheckPath={}, website={}, environment={}, configMap={:?}]",
            self.namespace,
            show(&self.image_url),
            show(&self.app),
            show(&self.context_path),
            show(&self.health_check_path),
            show(&self.website),
            show(&self.environment),
            config_map,
        )
    }
}
