//! Raw command dispatch

use std::time::Duration;

use eyre::bail;
use optivolt_exec::Dispatcher;

use super::stage_failure;

/// Run `command` in `environment` and print its output
///
/// # Errors
/// Fails if the command could not run or exited non-zero
pub async fn exec(
    dispatcher: &Dispatcher,
    environment: &str,
    command: &[String],
    timeout: Duration,
) -> eyre::Result<()> {
    let command = command.join(" ");

    let result = dispatcher
        .execute(environment, &command, timeout)
        .await
        .map_err(|e| stage_failure(environment, e))?;

    print!("{}", result.output);

    if !result.success {
        bail!("command exited with status {}", result.exit_code);
    }
    Ok(())
}
