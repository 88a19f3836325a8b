use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use clap::Parser;
use sqlprobe_core::{parse_test_file, SqlBody, TestDefinition};
use tracing::{error, info, warn};

use crate::discover::discover_tests;

/// Check test files for errors without executing them
#[derive(Debug, Parser)]
pub struct ValidateCommand {
    /// Directory containing test files
    #[arg(long, short = 't', value_name = "DIR")]
    pub tests: PathBuf,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

impl ValidateCommand {
    pub fn execute(&self) -> Result<i32> {
        crate::init_logging(self.verbose);

        if !self.tests.is_dir() {
            bail!("Test directory not found: {}", self.tests.display());
        }
        let files = discover_tests(&self.tests)?;
        info!(
            "Validating {} test file(s) in {}",
            files.len(),
            self.tests.display()
        );

        let mut errors = 0usize;
        for path in &files {
            match parse_test_file(path) {
                Ok(definition) => {
                    if !has_connection(&definition) {
                        warn!("{}: no connection defined", file_name(path));
                    }
                    if has_sql(&definition) {
                        info!("{}: {}", file_name(path), definition.test_name());
                    } else {
                        error!("{}: no SQL body found", file_name(path));
                        errors += 1;
                    }
                }
                Err(err) => {
                    error!("{}: {err}", file_name(path));
                    errors += 1;
                }
            }
        }

        if errors > 0 {
            info!("{errors} file(s) have errors");
            Ok(1)
        } else {
            info!("All {} file(s) valid", files.len());
            Ok(0)
        }
    }
}

fn has_connection(definition: &TestDefinition) -> bool {
    let meta = &definition.meta;
    meta.connection.is_some() || meta.server.is_some() || !meta.connections.is_empty()
}

fn has_sql(definition: &TestDefinition) -> bool {
    match &definition.body {
        SqlBody::Single(sql) => !sql.is_empty(),
        SqlBody::Steps(steps) => {
            !steps.is_empty() && steps.iter().all(|(_, sql)| !sql.is_empty())
        }
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
