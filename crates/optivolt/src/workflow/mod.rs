//! Workflows behind each CLI subcommand

mod bench;
mod collect;
mod deploy;
mod exec;
mod report;
mod snapshot;
mod status;

pub use bench::run_tests;
pub use collect::collect;
pub use deploy::deploy;
pub use exec::exec;
pub use report::{default_results_dir, report};
pub use snapshot::metrics;
pub use status::status;

use optivolt_exec::{Dispatcher, ExecError};

/// Wrap a dispatch error so the report names the failing stage
pub(crate) fn stage_failure(environment: &str, err: ExecError) -> eyre::Report {
    let stage = err.stage();
    eyre::Report::new(err).wrap_err(format!("{environment}: {stage} failed"))
}

/// Script run for `action`, relative to the environment's working directory
///
/// A `<environment>_<action>` entry in the document's `scripts` table
/// overrides `fallback`.
pub(crate) fn script_path(
    dispatcher: &Dispatcher,
    environment: &str,
    action: &str,
    fallback: &str,
) -> String {
    dispatcher
        .resolver()
        .document()
        .ok()
        .and_then(|doc| doc.script(environment, action).map(str::to_string))
        .unwrap_or_else(|| fallback.to_string())
}

const BANNER: &str = "========================================";

pub(crate) fn banner(title: &str) {
    println!("{BANNER}");
    println!("{title}");
    println!("{BANNER}");
}
