//! Command-line arguments

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::logging::LogFormat;

#[derive(Parser, Debug)]
#[command(name = "optivolt")]
#[command(
    about = "Provisioning and performance testing of container, micro-VM and unikernel environments",
    long_about = None
)]
pub struct Cli {
    /// Configuration file; repeat to give an ordered search list
    #[arg(short, long, global = true)]
    pub config: Vec<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Pretty, global = true)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Deploy a test environment
    Deploy {
        /// Environment (docker, microvm, unikernel)
        #[arg(short, long, default_value = "docker")]
        environment: String,
    },

    /// Run performance tests and save their metrics
    Test {
        /// Environment (docker, microvm, unikernel)
        #[arg(short, long, default_value = "docker")]
        environment: String,

        /// Test type
        #[arg(short = 't', long = "type", value_enum, default_value_t = TestSelection::All)]
        test_type: TestSelection,

        /// Test duration in seconds
        #[arg(short, long, default_value_t = 30)]
        duration: u64,

        /// Directory for per-test result files
        #[arg(short, long, default_value = ".")]
        output_dir: PathBuf,
    },

    /// Collect metrics from one or all environments
    Collect {
        /// Environment name, or `all`
        #[arg(short, long, default_value = "all")]
        environment: String,

        /// Output JSON file
        #[arg(short, long, default_value = "collected_metrics.json")]
        output: PathBuf,
    },

    /// Sample system metrics on an environment and save the snapshot
    Metrics {
        /// Environment name
        #[arg(short, long, default_value = "docker")]
        environment: String,

        /// Sampling duration in seconds
        #[arg(short, long, default_value_t = 30)]
        duration: u64,

        /// Directory for the snapshot (defaults to ~/optivolt-automation/results)
        #[arg(short, long)]
        results_dir: Option<PathBuf>,
    },

    /// Check the configuration of every environment
    Status,

    /// List saved result files
    Report {
        /// Results directory (defaults to ~/optivolt-automation/results)
        #[arg(short, long)]
        results_dir: Option<PathBuf>,
    },

    /// Run an arbitrary command in an environment
    Exec {
        /// Environment name
        #[arg(short, long)]
        environment: String,

        /// Timeout in seconds
        #[arg(short, long, default_value_t = 300)]
        timeout: u64,

        /// Command to run
        #[arg(trailing_var_arg = true, required = true)]
        command: Vec<String>,
    },
}

/// Which benchmark(s) to run
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum TestSelection {
    Cpu,
    Api,
    Db,
    All,
}

impl TestSelection {
    /// Test type names covered by this selection
    #[must_use]
    pub fn test_types(self) -> &'static [&'static str] {
        match self {
            TestSelection::Cpu => &["cpu"],
            TestSelection::Api => &["api"],
            TestSelection::Db => &["db"],
            TestSelection::All => &crate::metrics::TEST_TYPES,
        }
    }
}
