//! Environment-variable interpolation.
//!
//! Replaces `${NAME}` and `${NAME:default}` placeholders in strings, and
//! recursively through YAML mappings and sequences, preserving structure and
//! key order. A set variable always wins over a default; a default (possibly
//! empty) covers an unset variable; otherwise resolution fails naming the
//! variable. Replaced text is inserted verbatim and never re-scanned.

use std::collections::HashMap;

use lazy_static::lazy_static;
use regex::Regex;
use serde_yaml::Value as Yaml;

use crate::error::{EngineError, Result};

lazy_static! {
    static ref VAR_RE: Regex = Regex::new(r"\$\{(\w+)(?::([^}]*))?\}").expect("valid regex");
}

/// Where variable values come from. Production uses the process environment;
/// tests supply a map so they never touch global state.
pub trait VarSource {
    fn get(&self, name: &str) -> Option<String>;
}

/// The process environment.
pub struct ProcessEnv;

impl VarSource for ProcessEnv {
    fn get(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

impl VarSource for HashMap<String, String> {
    fn get(&self, name: &str) -> Option<String> {
        HashMap::get(self, name).cloned()
    }
}

/// Resolve placeholders against the process environment.
pub fn resolve(value: &Yaml) -> Result<Yaml> {
    resolve_with(value, &ProcessEnv)
}

/// Resolve placeholders in a YAML tree against an arbitrary source.
pub fn resolve_with<S: VarSource>(value: &Yaml, source: &S) -> Result<Yaml> {
    match value {
        Yaml::String(text) => Ok(Yaml::String(resolve_str_with(text, source)?)),
        Yaml::Mapping(mapping) => {
            let mut resolved = serde_yaml::Mapping::with_capacity(mapping.len());
            for (key, entry) in mapping {
                resolved.insert(key.clone(), resolve_with(entry, source)?);
            }
            Ok(Yaml::Mapping(resolved))
        }
        Yaml::Sequence(items) => Ok(Yaml::Sequence(
            items
                .iter()
                .map(|item| resolve_with(item, source))
                .collect::<Result<Vec<_>>>()?,
        )),
        other => Ok(other.clone()),
    }
}

/// Resolve every placeholder in one string, left to right.
pub fn resolve_str_with<S: VarSource>(text: &str, source: &S) -> Result<String> {
    let mut output = String::with_capacity(text.len());
    let mut last_end = 0;

    for caps in VAR_RE.captures_iter(text) {
        let whole = caps.get(0).expect("capture 0 always present");
        let name = &caps[1];
        output.push_str(&text[last_end..whole.start()]);

        match source.get(name) {
            Some(value) => output.push_str(&value),
            None => match caps.get(2) {
                Some(default) => output.push_str(default.as_str()),
                None => {
                    return Err(EngineError::MissingVariable {
                        name: name.to_string(),
                    })
                }
            },
        }
        last_end = whole.end();
    }

    output.push_str(&text[last_end..]);
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn set_variable_wins_over_default() {
        let env = source(&[("DB_HOST", "db01")]);
        assert_eq!(
            resolve_str_with("${DB_HOST:fallback}", &env).unwrap(),
            "db01"
        );
    }

    #[test]
    fn default_covers_unset_variable() {
        let env = source(&[]);
        assert_eq!(resolve_str_with("${DB_PORT:1433}", &env).unwrap(), "1433");
        assert_eq!(resolve_str_with("${EMPTY:}", &env).unwrap(), "");
    }

    #[test]
    fn unset_without_default_fails() {
        let env = source(&[]);
        let err = resolve_str_with("${DB_PASSWORD}", &env).unwrap_err();
        assert!(matches!(
            err,
            EngineError::MissingVariable { name } if name == "DB_PASSWORD"
        ));
    }

    #[test]
    fn multiple_placeholders_resolve_independently() {
        let env = source(&[("HOST", "db01")]);
        assert_eq!(
            resolve_str_with("${HOST}:${PORT:1433}", &env).unwrap(),
            "db01:1433"
        );
    }

    #[test]
    fn replacement_is_not_rescanned() {
        let env = source(&[("A", "${B}")]);
        assert_eq!(resolve_str_with("${A}", &env).unwrap(), "${B}");
    }

    #[test]
    fn nested_structures_preserve_shape_and_order() {
        let env = source(&[("USER", "svc")]);
        let yaml: Yaml = serde_yaml::from_str(
            "server: db01\nusername: ${USER}\nlist:\n  - ${USER}\n  - plain\ncount: 3\n",
        )
        .unwrap();

        let resolved = resolve_with(&yaml, &env).unwrap();
        let mapping = resolved.as_mapping().unwrap();

        let keys: Vec<&str> = mapping.keys().map(|k| k.as_str().unwrap()).collect();
        assert_eq!(keys, vec!["server", "username", "list", "count"]);
        assert_eq!(mapping[&Yaml::from("username")], Yaml::from("svc"));
        assert_eq!(
            mapping[&Yaml::from("list")],
            Yaml::Sequence(vec![Yaml::from("svc"), Yaml::from("plain")])
        );
        assert_eq!(mapping[&Yaml::from("count")], Yaml::from(3));
    }
}
