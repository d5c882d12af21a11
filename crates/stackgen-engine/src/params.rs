//! Placeholder resolution for descriptor fields
//!
//! `{identifier}` tokens are replaced by a built-in (`stack_dir`, `version`,
//! `stack_name`) or by a key of the service's own parameter mapping. Anything
//! else is a `MissingParameter`; nothing is left unresolved or silently
//! dropped. Braces that do not form `{identifier}` are copied verbatim.

use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;

use stackgen_utils::error::StackError;

use crate::version::StackVersion;

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("static pattern"));

const BUILTIN_KEYS: [&str; 3] = ["stack_dir", "version", "stack_name"];

#[must_use]
pub fn is_builtin(key: &str) -> bool {
    BUILTIN_KEYS.contains(&key)
}

/// Placeholder names referenced in `text`, in order of appearance
#[must_use]
pub fn placeholder_keys(text: &str) -> Vec<String> {
    PLACEHOLDER
        .captures_iter(text)
        .map(|caps| caps[1].to_string())
        .collect()
}

fn missing(service: &str, parameter: &str) -> StackError {
    StackError::MissingParameter {
        service: service.to_string(),
        parameter: parameter.to_string(),
    }
}

/// Version-derived placeholder values
#[derive(Debug, Clone)]
pub struct Placeholders {
    stack_dir: String,
    version: String,
    stack_name: String,
}

impl Placeholders {
    #[must_use]
    pub fn for_version(version: &StackVersion) -> Self {
        Self {
            stack_dir: version.path.to_string(),
            version: version.number.to_string(),
            stack_name: version.name(),
        }
    }

    fn builtin(&self, key: &str) -> Option<&str> {
        match key {
            "stack_dir" => Some(&self.stack_dir),
            "version" => Some(&self.version),
            "stack_name" => Some(&self.stack_name),
            _ => None,
        }
    }

    /// Resolve every parameter of `service`
    ///
    /// Parameters may reference built-ins and each other. A reference cycle
    /// is reported as a `MissingParameter` on the key that closes it.
    pub fn resolve_params(
        &self,
        service: &str,
        raw: &BTreeMap<String, String>,
    ) -> Result<BTreeMap<String, String>, StackError> {
        let mut resolved = BTreeMap::new();
        let mut in_progress = Vec::new();
        for key in raw.keys() {
            self.resolve_param(service, key, raw, &mut resolved, &mut in_progress)?;
        }
        Ok(resolved)
    }

    fn resolve_param(
        &self,
        service: &str,
        key: &str,
        raw: &BTreeMap<String, String>,
        resolved: &mut BTreeMap<String, String>,
        in_progress: &mut Vec<String>,
    ) -> Result<String, StackError> {
        if let Some(value) = resolved.get(key) {
            return Ok(value.clone());
        }
        let Some(raw_value) = raw.get(key) else {
            return Err(missing(service, key));
        };
        if in_progress.iter().any(|k| k == key) {
            return Err(missing(service, key));
        }

        in_progress.push(key.to_string());
        let mut out = String::with_capacity(raw_value.len());
        let mut last = 0;
        for caps in PLACEHOLDER.captures_iter(raw_value) {
            let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            out.push_str(&raw_value[last..whole.start()]);
            match self.builtin(name.as_str()) {
                Some(value) => out.push_str(value),
                None => {
                    let value =
                        self.resolve_param(service, name.as_str(), raw, resolved, in_progress)?;
                    out.push_str(&value);
                }
            }
            last = whole.end();
        }
        out.push_str(&raw_value[last..]);
        in_progress.pop();

        resolved.insert(key.to_string(), out.clone());
        Ok(out)
    }

    /// Substitute placeholders in `text` using built-ins and already resolved params
    pub fn substitute(
        &self,
        service: &str,
        text: &str,
        params: &BTreeMap<String, String>,
    ) -> Result<String, StackError> {
        let mut out = String::with_capacity(text.len());
        let mut last = 0;
        for caps in PLACEHOLDER.captures_iter(text) {
            let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            let name = name.as_str();
            let value = self
                .builtin(name)
                .or_else(|| params.get(name).map(String::as_str))
                .ok_or_else(|| missing(service, name))?;
            out.push_str(&text[last..whole.start()]);
            out.push_str(value);
            last = whole.end();
        }
        out.push_str(&text[last..]);
        Ok(out)
    }
}

/// Fetch a required, non-empty parameter
pub fn require<'a>(
    service: &str,
    params: &'a BTreeMap<String, String>,
    key: &str,
) -> Result<&'a str, StackError> {
    match params.get(key).map(String::as_str) {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(missing(service, key)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8Path;

    fn ctx() -> Placeholders {
        Placeholders::for_version(&StackVersion::new(Utf8Path::new("/stack"), 2))
    }

    fn params(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_builtins_and_param_references() {
        let raw = params(&[
            ("data_dir", "{stack_dir}/data/piper"),
            ("uri", "tcp://0.0.0.0:{port}"),
            ("port", "10200"),
            ("label", "{stack_name}-v{version}"),
        ]);

        let resolved = ctx().resolve_params("wyoming-piper", &raw).unwrap();

        assert_eq!(resolved["data_dir"], "/stack/stack-v2/data/piper");
        assert_eq!(resolved["uri"], "tcp://0.0.0.0:10200");
        assert_eq!(resolved["label"], "stack-v2-v2");
    }

    #[test]
    fn test_unknown_placeholder_is_missing_parameter() {
        let raw = params(&[("data_dir", "{stack_root}/data")]);

        let err = ctx().resolve_params("ollama", &raw).unwrap_err();

        match err {
            StackError::MissingParameter { service, parameter } => {
                assert_eq!(service, "ollama");
                assert_eq!(parameter, "stack_root");
            }
            other => panic!("expected MissingParameter, got {other:?}"),
        }
    }

    #[test]
    fn test_reference_cycle_is_missing_parameter() {
        let raw = params(&[("a", "{b}"), ("b", "{a}")]);
        assert!(matches!(
            ctx().resolve_params("svc", &raw),
            Err(StackError::MissingParameter { .. })
        ));
    }

    #[test]
    fn test_non_identifier_braces_are_literal() {
        let text = "docker ps --format '{{.Names}}' {} {1x}";
        let out = ctx().substitute("svc", text, &BTreeMap::new()).unwrap();
        assert_eq!(out, text);
    }

    #[test]
    fn test_substitute_uses_resolved_params() {
        let resolved = params(&[("voice", "en_US-lessac-medium")]);
        let out = ctx().substitute("wyoming-piper", "{voice}", &resolved).unwrap();
        assert_eq!(out, "en_US-lessac-medium");

        let err = ctx()
            .substitute("wyoming-piper", "{speaker}", &resolved)
            .unwrap_err();
        assert!(err.to_string().contains("speaker"));
    }

    #[test]
    fn test_require_rejects_empty() {
        let p = params(&[("image", "  ")]);
        assert!(require("ollama", &p, "image").is_err());
        assert!(require("ollama", &p, "host_port").is_err());
    }

    #[test]
    fn test_placeholder_keys() {
        assert_eq!(
            placeholder_keys("{stack_dir}/x/{data_dir}"),
            vec!["stack_dir".to_string(), "data_dir".to_string()]
        );
        assert!(is_builtin("version"));
        assert!(!is_builtin("voice"));
    }

    proptest::proptest! {
        #[test]
        fn prop_text_without_placeholders_is_unchanged(text in "[^{}]{0,64}") {
            let out = ctx().substitute("svc", &text, &BTreeMap::new()).unwrap();
            proptest::prop_assert_eq!(out, text);
        }

        #[test]
        fn prop_stack_dir_is_always_substituted(suffix in "[a-z/_-]{0,24}") {
            let out = ctx()
                .substitute("svc", &format!("{{stack_dir}}{suffix}"), &BTreeMap::new())
                .unwrap();
            proptest::prop_assert_eq!(out, format!("/stack/stack-v2{suffix}"));
        }
    }
}
