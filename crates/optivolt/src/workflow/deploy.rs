//! Environment deployment

use std::time::Duration;

use eyre::bail;
use optivolt_exec::Dispatcher;
use tracing::info;

use super::{banner, script_path, stage_failure};

const DEPLOY_TIMEOUT: Duration = Duration::from_secs(600);

/// Run the deployment script of `environment`
///
/// # Errors
/// Fails if the script could not run or exited non-zero
pub async fn deploy(dispatcher: &Dispatcher, environment: &str) -> eyre::Result<()> {
    banner(&format!("Deploying environment: {environment}"));

    let fallback = format!("scripts/deploy_{environment}.sh");
    let command = format!(
        "bash {}",
        script_path(dispatcher, environment, "deploy", &fallback)
    );
    info!(environment, command = %command, "starting deployment");

    let result = dispatcher
        .execute(environment, &command, DEPLOY_TIMEOUT)
        .await
        .map_err(|e| stage_failure(environment, e))?;

    println!("{}", result.output);

    if !result.success {
        bail!(
            "deployment of {environment} failed (exit code {})",
            result.exit_code
        );
    }

    println!("Deployment of {environment} succeeded");
    Ok(())
}
