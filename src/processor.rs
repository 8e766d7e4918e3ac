use std::fmt::{Display, Formatter};
use std::sync::Arc;
use log::{debug, info};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::oneshot;
use crate::access_url::access_url;
use crate::config::ConfigSource;
use crate::descriptor::{self, EnvironmentDescriptor};
use crate::executor::Executor;
use crate::provisioner::{self, Provisioner};

#[derive(Error, Debug)]
pub enum Error {
    #[error("failed to provision resource: {0}")]
    Provisioning(String),

    #[error("failed to delete resource: {0}")]
    Deletion(String),

    #[error("failed to update config map: {0}")]
    ConfigurationUpdate(String),

    #[error("access url parameters missing: {}{}", .missing.join(", "), because(.cause))]
    MissingParameter {
        missing: Vec<&'static str>,
        /// Why the router domain could not be resolved, when that is one of them.
        cause: Option<String>,
    },

    #[error("invalid request: {0}")]
    Descriptor(#[from] descriptor::Error),

    #[error("provisioner: {0}")]
    Provisioner(#[from] provisioner::Error),

    #[error("request was dropped before it completed")]
    Dispatch,
}

fn because(cause: &Option<String>) -> String {
    cause.as_ref().map(|c| format!(" ({c})")).unwrap_or_default()
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Provisioned,
    Updated,
    Deleted,
}

/// Normalized result of a successful request.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Outcome {
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_url: Option<String>,
}

impl Outcome {
    fn of(status: Status) -> Self {
        Self { status, access_url: None }
    }

    fn provisioned(access_url: String) -> Self {
        Self { status: Status::Provisioned, access_url: Some(access_url) }
    }
}

impl Display for Outcome {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&serde_json::to_string(self).map_err(|_| std::fmt::Error)?)
    }
}

/// Where a provision request got to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Stage {
    /// The descriptor carried no configuration entries.
    ConfigSkipped,
    ConfigApplied,
    Provisioned,
}

/// Runs lifecycle requests for SPA/SSR environments.
///
/// Each request is handed to the executor and runs there start to finish.
/// Requests are not serialized against each other, not even for the same
/// environment.
pub struct RequestProcessor {
    steps: Steps,
    executor: Arc<dyn Executor>,
}

#[derive(Clone)]
struct Steps {
    provisioner: Arc<dyn Provisioner>,
    config: Arc<dyn ConfigSource>,
}

type Step = fn(&Steps, &EnvironmentDescriptor) -> Result<Outcome, Error>;

impl RequestProcessor {
    pub fn new(provisioner: Arc<dyn Provisioner>, config: Arc<dyn ConfigSource>, executor: Arc<dyn Executor>) -> Self {
        Self {
            steps: Steps { provisioner, config },
            executor,
        }
    }

    /// Apply the config map when there is one, then create the environment.
    pub async fn provision(&self, descriptor: EnvironmentDescriptor) -> Result<Outcome, Error> {
        self.dispatch(descriptor, Steps::provision).await
    }

    /// Point the existing deployment at a new image.
    ///
    /// Whatever the provisioner makes of the update, the outcome is `updated`
    /// unless it returns an error.
    pub async fn update(&self, descriptor: EnvironmentDescriptor) -> Result<Outcome, Error> {
        self.dispatch(descriptor, Steps::update).await
    }

    pub async fn delete(&self, descriptor: EnvironmentDescriptor) -> Result<Outcome, Error> {
        self.dispatch(descriptor, Steps::delete).await
    }

    pub async fn update_config_map(&self, descriptor: EnvironmentDescriptor) -> Result<Outcome, Error> {
        self.dispatch(descriptor, Steps::update_config_map).await
    }

    async fn dispatch(&self, descriptor: EnvironmentDescriptor, step: Step) -> Result<Outcome, Error> {
        let (tx, rx) = oneshot::channel();
        let steps = self.steps.clone();
        self.executor.execute(Box::new(move || {
            let _ = tx.send(step(&steps, &descriptor));
        }));
        rx.await.map_err(|_| Error::Dispatch)?
    }
}

impl Steps {
    fn provision(&self, descriptor: &EnvironmentDescriptor) -> Result<Outcome, Error> {
        let parameters = descriptor.template_parameters(self.config.as_ref());

        let stage = self.apply_config_map(descriptor)?;
        debug!("{stage:?} for {}", descriptor.namespace);

        if !self.provisioner.create_new_environment(parameters.values(), &descriptor.namespace)? {
            return Err(Error::Provisioning(descriptor.to_string()));
        }
        debug!("{:?} in {}", Stage::Provisioned, descriptor.namespace);

        // The environment exists from here on, even if the url can't be built.
        let url = access_url(&parameters)?;
        info!("constructed access url is {url}");
        Ok(Outcome::provisioned(url))
    }

    fn apply_config_map(&self, descriptor: &EnvironmentDescriptor) -> Result<Stage, Error> {
        if !descriptor.has_config_map() {
            return Ok(Stage::ConfigSkipped);
        }
        let outcome = self.update_config_map(descriptor)?;
        info!("configmap create or update status is as follows {outcome}");
        Ok(Stage::ConfigApplied)
    }

    fn update(&self, descriptor: &EnvironmentDescriptor) -> Result<Outcome, Error> {
        info!("the control reached with the information {descriptor}");
        let deployment_name = descriptor.deployment_name()?;
        info!("computed deployment name is {deployment_name}");
        let image_url = descriptor
            .image_url
            .as_deref()
            .ok_or(descriptor::Error::MissingField("imageUrl"))?;
        self.provisioner.update_environment(&deployment_name, image_url, &descriptor.namespace)?;
        Ok(Outcome::of(Status::Updated))
    }

    fn delete(&self, descriptor: &EnvironmentDescriptor) -> Result<Outcome, Error> {
        let parameters = descriptor.template_parameters(self.config.as_ref());
        if self.provisioner.delete_existing_environment(parameters.values(), &descriptor.namespace)? {
            Ok(Outcome::of(Status::Deleted))
        } else {
            Err(Error::Deletion(descriptor.to_string()))
        }
    }

    fn update_config_map(&self, descriptor: &EnvironmentDescriptor) -> Result<Outcome, Error> {
        let identity = descriptor.identity()?;
        if self.provisioner.update_config_map_of(&identity, &descriptor.config_map, &descriptor.namespace)? {
            Ok(Outcome::of(Status::Updated))
        } else {
            Err(Error::ConfigurationUpdate(descriptor.to_string()))
        }
    }
}
