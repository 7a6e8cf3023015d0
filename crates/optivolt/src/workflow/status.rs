//! Configuration status of every environment

use optivolt_core::{EnvironmentResolver, HostConfig};
use optivolt_exec::CredentialSource;

/// One status line for `name`; never opens a connection
pub(crate) fn describe(name: &str, config: &HostConfig) -> String {
    let label = name.to_uppercase();

    let channel = if config.is_local() {
        format!("local ({})", config.hostname)
    } else {
        let credentials = CredentialSource::select(&config.credential_ref);
        format!(
            "ssh {}@{}:{} ({})",
            config.username,
            config.dial_address(),
            config.port,
            credentials.kind()
        )
    };

    match config.validate() {
        Ok(()) => format!("[{label}] {channel}: configuration OK"),
        Err(issues) => {
            let issues: Vec<_> = issues.iter().map(ToString::to_string).collect();
            format!("[{label}] {channel}: INVALID ({})", issues.join("; "))
        }
    }
}

/// Print the configuration status of every environment
///
/// # Errors
/// Fails if the configuration cannot be loaded
pub fn status(resolver: &EnvironmentResolver) -> eyre::Result<()> {
    let document = resolver.document()?;
    println!("Checking {} environment(s)\n", document.environments.len());

    for (name, config) in &document.environments {
        println!("{}", describe(name, config));
    }
    Ok(())
}
