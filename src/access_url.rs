use log::info;
use crate::descriptor::{TemplateParameters, CONTEXT_PATH, ENV, ROUTER_DOMAIN, WEBSITE};
use crate::processor::Error;

/// `https://<website>-<env>.<router domain><context path>`
///
/// Values are used verbatim, nothing is encoded. Website, env and router
/// domain must be non-empty; the context path may be empty.
pub fn access_url(params: &TemplateParameters) -> Result<String, Error> {
    let required = [WEBSITE, ENV, ROUTER_DOMAIN, CONTEXT_PATH];
    let missing: Vec<&'static str> = required
        .into_iter()
        .filter(|key| match params.get(key) {
            None => true,
            Some(value) => value.is_empty() && *key != CONTEXT_PATH,
        })
        .collect();
    if !missing.is_empty() {
        return Err(Error::MissingParameter {
            missing,
            cause: params.router_domain_error().map(str::to_string),
        });
    }

    let [website, env, domain, context_path] = required.map(|key| params.get(key).unwrap_or_default());
    info!("<website>-<env>.<routedomain><context path> {website}-{env}.{domain}{context_path}");

    Ok(format!("https://{website}-{env}.{domain}{context_path}"))
}
