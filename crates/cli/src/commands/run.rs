use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;
use sqlprobe_core::{
    parse_test_file, run_test, vars, ConnectionDescriptor, ConnectionRegistry, TestResult,
};
use tracing::{debug, error, info, warn};

use crate::discover::discover_tests;
use crate::report;

/// Execute tests and produce reports
#[derive(Debug, Parser)]
pub struct RunCommand {
    /// Directory containing test files
    #[arg(long, short = 't', value_name = "DIR")]
    pub tests: PathBuf,

    /// Shared connections YAML file
    #[arg(long, short = 'c', value_name = "FILE")]
    pub connections: Option<PathBuf>,

    /// Output HTML report path
    #[arg(long, short = 'r', value_name = "FILE")]
    pub report: Option<PathBuf>,

    /// Output JSON report path
    #[arg(long, short = 'j', value_name = "FILE")]
    pub json_report: Option<PathBuf>,

    /// Only run tests carrying one of these tags (comma-separated)
    #[arg(long, value_name = "TAGS")]
    pub tags: Option<String>,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

impl RunCommand {
    pub fn execute(&self) -> Result<i32> {
        crate::init_logging(self.verbose);

        let shared = match &self.connections {
            Some(path) => load_connections(path)?,
            None => BTreeMap::new(),
        };
        let registry = ConnectionRegistry::new(shared);

        if !self.tests.is_dir() {
            bail!("Test directory not found: {}", self.tests.display());
        }
        let files = discover_tests(&self.tests)?;
        info!(
            "Found {} test file(s) in {}",
            files.len(),
            self.tests.display()
        );

        let tag_filter = self.tag_filter();
        let results = execute_files(&files, &registry, tag_filter.as_ref());

        let passed = results.iter().filter(|r| r.passed).count();
        let failed = results.len() - passed;
        info!("{}", "=".repeat(60));
        info!(
            "RESULTS: {passed} passed, {failed} failed, {} total",
            results.len()
        );
        info!("{}", "=".repeat(60));

        if let Some(path) = &self.report {
            report::write_html_report(&results, path)?;
            info!("HTML report: {}", path.display());
        }
        if let Some(path) = &self.json_report {
            report::write_json_report(&results, path)?;
            info!("JSON report: {}", path.display());
        }

        registry.close_all();
        Ok(if failed > 0 { 1 } else { 0 })
    }

    fn tag_filter(&self) -> Option<HashSet<String>> {
        self.tags.as_ref().map(|tags| {
            tags.split(',')
                .map(|tag| tag.trim().to_ascii_lowercase())
                .filter(|tag| !tag.is_empty())
                .collect()
        })
    }
}

/// Run every discovered file in order. A file that fails to parse still
/// yields exactly one (failing) result; the run continues.
fn execute_files(
    files: &[PathBuf],
    registry: &ConnectionRegistry,
    tag_filter: Option<&HashSet<String>>,
) -> Vec<TestResult> {
    let mut results = Vec::new();

    for path in files {
        let definition = match parse_test_file(path) {
            Ok(definition) => definition,
            Err(err) => {
                error!("Failed to parse {}: {err}", path.display());
                results.push(build_parse_failure(path, &err.to_string()));
                continue;
            }
        };

        if let Some(filter) = tag_filter {
            let test_tags: HashSet<String> = definition
                .meta
                .tags
                .iter()
                .map(|tag| tag.to_ascii_lowercase())
                .collect();
            if filter.is_disjoint(&test_tags) {
                debug!("Skipping {} (tags don't match)", path.display());
                continue;
            }
        }

        results.push(run_test(&definition, registry));
    }

    results
}

fn build_parse_failure(path: &Path, message: &str) -> TestResult {
    let test_name = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    TestResult::failure(test_name, path, format!("Parse error: {message}"))
}

/// Load the shared connections file, resolving `${VAR}` placeholders against
/// the process environment. A missing file is a warning, not an error.
fn load_connections(path: &Path) -> Result<BTreeMap<String, ConnectionDescriptor>> {
    if !path.exists() {
        warn!("Connections file not found: {}", path.display());
        return Ok(BTreeMap::new());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read connections file: {}", path.display()))?;
    let raw: serde_yaml::Value = serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse YAML from: {}", path.display()))?;
    if raw.is_null() {
        return Ok(BTreeMap::new());
    }

    let resolved = vars::resolve(&raw)
        .with_context(|| format!("Failed to resolve variables in: {}", path.display()))?;
    let shared: BTreeMap<String, ConnectionDescriptor> =
        serde_path_to_error::deserialize(resolved).with_context(|| {
            format!(
                "Invalid connection definition in: {}\n\
                 Check the field names against the documentation.",
                path.display()
            )
        })?;

    info!("Loaded {} shared connection(s)", shared.len());
    Ok(shared)
}
