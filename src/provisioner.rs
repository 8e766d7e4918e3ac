use std::collections::{BTreeMap, HashMap};
use std::process::{Command, ExitStatus, Output, Stdio};
use log::{debug, info};
use thiserror::Error;
use crate::descriptor::IdentityTriple;

#[derive(Error, Debug)]
pub enum Error {
    #[error("provisioner hook {program} could not be run: {err}")]
    Spawn {
        program: String,
        err: std::io::Error,
    },

    #[error("{0}")]
    Other(String),
}

/// Performs the actual cluster mutations.
///
/// `Ok(false)` means the mutation was refused or failed in an orderly way,
/// `Err` means the provisioner itself broke down.
pub trait Provisioner: Send + Sync {
    fn create_new_environment(&self, parameters: &BTreeMap<String, String>, namespace: &str) -> Result<bool, Error>;

    fn update_environment(&self, deployment_name: &str, image_url: &str, namespace: &str) -> Result<(), Error>;

    fn delete_existing_environment(&self, parameters: &BTreeMap<String, String>, namespace: &str) -> Result<bool, Error>;

    fn update_config_map_of(&self, identity: &IdentityTriple, config_map: &HashMap<String, String>, namespace: &str) -> Result<bool, Error>;
}

/// Logs every mutation and reports success without touching a cluster.
#[derive(Debug, Default, Clone)]
pub struct Plan;

impl Provisioner for Plan {
    fn create_new_environment(&self, parameters: &BTreeMap<String, String>, namespace: &str) -> Result<bool, Error> {
        info!("plan: create environment in {namespace} with parameters {parameters:?}");
        Ok(true)
    }

    fn update_environment(&self, deployment_name: &str, image_url: &str, namespace: &str) -> Result<(), Error> {
        info!("plan: set image of {namespace}/{deployment_name} to {image_url}");
        Ok(())
    }

    fn delete_existing_environment(&self, parameters: &BTreeMap<String, String>, namespace: &str) -> Result<bool, Error> {
        info!("plan: delete environment in {namespace} with parameters {parameters:?}");
        Ok(true)
    }

    fn update_config_map_of(&self, identity: &IdentityTriple, config_map: &HashMap<String, String>, namespace: &str) -> Result<bool, Error> {
        info!(
            "plan: write {} entries to config map of {}/{}/{} in {namespace}",
            config_map.len(), identity.website, identity.app, identity.environment
        );
        Ok(true)
    }
}

/// Hands every mutation to an external program.
///
/// `<program> <verb> --namespace <ns> --wait <bool> [--name <deployment> --image <url>]
/// [--label KEY=VALUE]... [--var KEY=VALUE]...`
///
/// A zero exit status is success. Standard output of the hook is captured
/// and logged, stderr is inherited.
#[derive(Debug, Clone)]
pub struct Hook {
    pub program: String,
    pub wait: bool,
}

impl Hook {
    pub fn new(program: impl Into<String>, wait: bool) -> Self {
        Self { program: program.into(), wait }
    }

    fn command(&self, verb: &str, namespace: &str) -> Command {
        let mut process = Command::new(&self.program);
        process
            .arg(verb)
            .arg("--namespace").arg(namespace)
            .arg("--wait").arg(self.wait.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit());
        process
    }

    fn output(&self, mut process: Command) -> Result<Output, Error> {
        debug!("running provisioner hook {process:?}");
        let output = process.output().map_err(|err| Error::Spawn {
            program: self.program.clone(),
            err,
        })?;
        for line in String::from_utf8_lossy(&output.stdout).lines() {
            info!("{}: {line}", self.program);
        }
        Ok(output)
    }

    fn run(&self, process: Command) -> Result<ExitStatus, Error> {
        Ok(self.output(process)?.status)
    }

    fn vars<'a>(process: &mut Command, vars: impl IntoIterator<Item = (&'a String, &'a String)>) {
        for (key, value) in vars {
            process.arg("--var").arg(format!("{key}={value}"));
        }
    }
}

impl Provisioner for Hook {
    fn create_new_environment(&self, parameters: &BTreeMap<String, String>, namespace: &str) -> Result<bool, Error> {
        let mut process = self.command("create", namespace);
        Self::vars(&mut process, parameters);
        Ok(self.run(process)?.success())
    }

    fn update_environment(&self, deployment_name: &str, image_url: &str, namespace: &str) -> Result<(), Error> {
        let mut process = self.command("update", namespace);
        process.arg("--name").arg(deployment_name).arg("--image").arg(image_url);
        let status = self.run(process)?;
        debug!("provisioner hook update exited with {status}");
        Ok(())
    }

    fn delete_existing_environment(&self, parameters: &BTreeMap<String, String>, namespace: &str) -> Result<bool, Error> {
        let mut process = self.command("delete", namespace);
        Self::vars(&mut process, parameters);
        Ok(self.run(process)?.success())
    }

    fn update_config_map_of(&self, identity: &IdentityTriple, config_map: &HashMap<String, String>, namespace: &str) -> Result<bool, Error> {
        let mut process = self.command("config", namespace);
        process
            .arg("--label").arg(format!("website={}", identity.website))
            .arg("--label").arg(format!("app={}", identity.app))
            .arg("--label").arg(format!("environment={}", identity.environment));
        let sorted: BTreeMap<_, _> = config_map.iter().collect();
        Self::vars(&mut process, sorted);
        Ok(self.run(process)?.success())
    }
}
