//! Saved result listing

use std::path::{Path, PathBuf};

use optivolt_core::list_result_files;

/// `~/optivolt-automation/results`
pub fn default_results_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_default()
        .join("optivolt-automation")
        .join("results")
}

/// List the result files in `results_dir`
///
/// # Errors
/// Fails if the directory exists but cannot be read
pub fn report(results_dir: Option<&Path>) -> eyre::Result<()> {
    let dir = results_dir.map_or_else(default_results_dir, Path::to_path_buf);
    let files = list_result_files(&dir)?;

    println!("{} result file(s) found in {}", files.len(), dir.display());
    for file in &files {
        if let Some(name) = file.file_name() {
            println!("  - {}", name.to_string_lossy());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_default_results_dir() {
        assert!(default_results_dir().ends_with("optivolt-automation/results"));
    }

    #[test]
    fn test_report_lists_directory() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("test_cpu_docker.json"), "{}").unwrap();

        assert!(report(Some(dir.path())).is_ok());
    }

    #[test]
    fn test_report_missing_directory_is_empty() {
        let dir = TempDir::new().unwrap();
        assert!(report(Some(&dir.path().join("absent"))).is_ok());
    }
}
