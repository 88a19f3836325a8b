//! Parsed test definitions.
//!
//! A definition is produced once by the parser and read-only thereafter.
//! The metadata block is typed here; the SQL body is kept separate so the
//! orchestrator can look step bodies up by name.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Deserializer, Serialize};

use crate::connection::{ConnectionDescriptor, ConnectionRef};
use crate::model::value::Value;

/// One test definition file, parsed.
#[derive(Debug, Clone)]
pub struct TestDefinition {
    /// Source path, preserved for error messages.
    pub path: PathBuf,
    pub meta: TestMetadata,
    pub body: SqlBody,
}

impl TestDefinition {
    /// Test name from metadata, falling back to the file stem.
    pub fn test_name(&self) -> String {
        match &self.meta.test_name {
            Some(name) => name.clone(),
            None => self
                .path
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_else(|| self.path.display().to_string()),
        }
    }

    /// SQL body for a named step, if the body declares one.
    pub fn sql_for_step(&self, name: &str) -> Option<&str> {
        match &self.body {
            SqlBody::Single(_) => None,
            SqlBody::Steps(steps) => steps
                .iter()
                .find(|(step, _)| step == name)
                .map(|(_, sql)| sql.as_str()),
        }
    }
}

/// The SQL portion of a definition: one statement, or named step bodies in
/// first-occurrence order.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlBody {
    Single(String),
    Steps(Vec<(String, String)>),
}

/// Frontmatter metadata. Unknown keys are tolerated; everything is optional
/// so that validation can produce targeted messages instead of serde noise.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TestMetadata {
    #[serde(default)]
    pub test_name: Option<String>,

    /// Either a YAML list or a comma-separated string.
    #[serde(default, deserialize_with = "deserialize_tags")]
    pub tags: Vec<String>,

    /// Default connection: a shared-connection name or an inline descriptor.
    #[serde(default)]
    pub connection: Option<ConnectionRef>,

    /// Named per-test connections for multi-step definitions.
    #[serde(default)]
    pub connections: BTreeMap<String, ConnectionDescriptor>,

    /// Ordered step declarations for multi-step definitions.
    #[serde(default)]
    pub steps: Vec<StepSpec>,

    // Inline single-connection form.
    #[serde(default)]
    pub driver: Option<String>,
    #[serde(default)]
    pub server: Option<String>,
    #[serde(default)]
    pub database: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub trusted_connection: Option<bool>,
    #[serde(default)]
    pub trust_server_certificate: Option<bool>,
    #[serde(default)]
    pub options: BTreeMap<String, String>,

    #[serde(default)]
    pub success_column: Option<String>,
    #[serde(default)]
    pub success_value: Option<Value>,
    #[serde(default)]
    pub success_expression: Option<String>,
    #[serde(default)]
    pub allow_empty: bool,
}

/// One entry of the `steps:` list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepSpec {
    pub name: String,
    /// Connection name: looked up in the definition's `connections` map
    /// first, then in the shared registry.
    #[serde(default)]
    pub connection: Option<String>,
}

fn deserialize_tags<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        List(Vec<String>),
        Csv(String),
    }

    match Option::<Raw>::deserialize(deserializer)? {
        None => Ok(Vec::new()),
        Some(Raw::List(tags)) => Ok(tags),
        Some(Raw::Csv(csv)) => Ok(csv
            .split(',')
            .map(|tag| tag.trim().to_string())
            .filter(|tag| !tag.is_empty())
            .collect()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_accept_list_and_csv_forms() {
        let meta: TestMetadata = serde_yaml::from_str("tags: [smoke, nightly]").unwrap();
        assert_eq!(meta.tags, vec!["smoke", "nightly"]);

        let meta: TestMetadata = serde_yaml::from_str("tags: smoke, nightly").unwrap();
        assert_eq!(meta.tags, vec!["smoke", "nightly"]);

        let meta: TestMetadata = serde_yaml::from_str("test_name: x").unwrap();
        assert!(meta.tags.is_empty());
    }

    #[test]
    fn test_name_falls_back_to_file_stem() {
        let definition = TestDefinition {
            path: PathBuf::from("/tests/01_row_counts.sql"),
            meta: TestMetadata::default(),
            body: SqlBody::Single("SELECT 1".to_string()),
        };
        assert_eq!(definition.test_name(), "01_row_counts");
    }

    #[test]
    fn sql_for_step_finds_named_bodies() {
        let definition = TestDefinition {
            path: PathBuf::from("t.sql"),
            meta: TestMetadata::default(),
            body: SqlBody::Steps(vec![
                ("source".to_string(), "SELECT 1".to_string()),
                ("target".to_string(), "SELECT 2".to_string()),
            ]),
        };
        assert_eq!(definition.sql_for_step("target"), Some("SELECT 2"));
        assert_eq!(definition.sql_for_step("missing"), None);
    }
}
