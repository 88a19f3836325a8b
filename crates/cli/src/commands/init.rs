use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

const INIT_CONNECTIONS: &str = "\
# sqlprobe connections
# ====================
# Define your database connections here.
# Use ${ENV_VAR} or ${ENV_VAR:default} for secrets.
#
# Reference these by name in your test files:
#   connection: local

local:
  server: localhost
  database: local.db
  trusted_connection: true

# Example with credentials:
# warehouse:
#   server: warehouse.example.com
#   database: analytics
#   username: ${DB_USER}
#   password: ${DB_PASSWORD}
#   trusted_connection: false
";

const INIT_EXAMPLE_TEST: &str = "\
---
test_name: Example - Database Is Reachable
connection: local
success_column: status
success_value: 1
tags: smoke
---
SELECT 1 AS status
";

const INIT_GITIGNORE: &str = "\
# Reports
*.html
*.json

# Don't commit connections with real credentials
# (uncomment if your connections.yaml contains secrets)
# connections.yaml
";

/// Scaffold a new test workspace
#[derive(Debug, Parser)]
pub struct InitCommand {
    /// Target directory (default: current)
    #[arg(value_name = "DIR", default_value = ".")]
    pub directory: PathBuf,
}

impl InitCommand {
    pub fn execute(&self) -> Result<i32> {
        let tests_dir = self.directory.join("tests");

        if tests_dir.exists() && tests_dir.read_dir()?.next().is_some() {
            eprintln!(
                "{} already exists and is not empty. Aborting.",
                tests_dir.display()
            );
            return Ok(1);
        }

        std::fs::create_dir_all(&tests_dir)
            .with_context(|| format!("Failed to create {}", tests_dir.display()))?;

        let connections_file = self.directory.join("connections.yaml");
        if !connections_file.exists() {
            std::fs::write(&connections_file, INIT_CONNECTIONS)
                .with_context(|| format!("Failed to write {}", connections_file.display()))?;
            println!("  Created {}", connections_file.display());
        }

        let example_test = tests_dir.join("01_example_smoke_test.sql");
        std::fs::write(&example_test, INIT_EXAMPLE_TEST)
            .with_context(|| format!("Failed to write {}", example_test.display()))?;
        println!("  Created {}", example_test.display());

        let gitignore = self.directory.join(".gitignore");
        if !gitignore.exists() {
            std::fs::write(&gitignore, INIT_GITIGNORE)
                .with_context(|| format!("Failed to write {}", gitignore.display()))?;
            println!("  Created {}", gitignore.display());
        }

        println!(
            "\nWorkspace ready at {}\n\n\
             Next steps:\n\
             \x20 1. Edit connections.yaml with your database details\n\
             \x20 2. Write test files in the tests/ directory\n\
             \x20 3. Run your tests:\n\n\
             \x20    sqlprobe run -t {} -c {}\n",
            self.directory.display(),
            tests_dir.display(),
            connections_file.display(),
        );

        Ok(0)
    }
}
