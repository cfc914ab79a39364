//! Static analysis and validation of the parsed template.
//!
//! Checks the document shape (known top-level keys, environment label,
//! collection and backend shapes) before any resolver runs. Field-level
//! checks inside keyed entries belong to the resolvers.

use netform_common::error::{NetformError, Result};

use super::ast::{Template, Value};

/// Attribute names accepted at the top level of an environment template.
pub const TOP_LEVEL_KEYS: &[&str] = &[
    "environment",
    "project_id",
    "network_name",
    "routing_mode",
    "region",
    "backend",
    "subnets",
    "firewall_rules",
    "routes",
];

/// Top-level attributes holding keyed resource collections.
pub const COLLECTION_KEYS: &[&str] = &["subnets", "firewall_rules", "routes"];

/// Validates a parsed template for structural correctness.
///
/// # Checks performed
///
/// 1. Every top-level key is recognized.
/// 2. `environment` is present and a valid label.
/// 3. Keyed collections are maps of maps.
/// 4. `backend`, when present, declares exactly `bucket` and `prefix`.
///
/// # Errors
///
/// Returns an error if any structural check fails.
pub fn validate(template: &Template) -> Result<()> {
    tracing::info!("validating template");
    check_known_keys(template)?;
    check_environment_label(template)?;
    check_collections(template)?;
    check_backend(template)?;
    Ok(())
}

fn check_known_keys(template: &Template) -> Result<()> {
    for key in template.attributes.keys() {
        if !TOP_LEVEL_KEYS.contains(&key.as_str()) {
            return Err(NetformError::Config {
                message: format!("unknown top-level attribute: \"{key}\""),
            });
        }
    }
    Ok(())
}

/// Returns whether `label` is usable as an environment label.
#[must_use]
pub fn is_valid_label(label: &str) -> bool {
    let mut chars = label.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
}

fn check_environment_label(template: &Template) -> Result<()> {
    match template.attributes.get("environment") {
        Some(Value::String(label)) if is_valid_label(label) => Ok(()),
        Some(Value::String(label)) => Err(NetformError::Config {
            message: format!(
                "environment label \"{label}\" must be lowercase letters, digits, '-' or '_'"
            ),
        }),
        Some(other) => Err(NetformError::Config {
            message: format!("`environment` must be a string, got {}", other.type_name()),
        }),
        None => Err(NetformError::Config {
            message: "missing required attribute `environment`".into(),
        }),
    }
}

fn check_collections(template: &Template) -> Result<()> {
    for &name in COLLECTION_KEYS {
        let Some(value) = template.attributes.get(name) else {
            continue;
        };
        let Value::Map(entries) = value else {
            return Err(NetformError::Config {
                message: format!("`{name}` must be a map, got {}", value.type_name()),
            });
        };
        for (key, entry) in entries {
            if entry.as_map().is_none() {
                return Err(NetformError::Config {
                    message: format!(
                        "`{name}.{key}` must be a map, got {}",
                        entry.type_name()
                    ),
                });
            }
        }
    }
    Ok(())
}

fn check_backend(template: &Template) -> Result<()> {
    let Some(value) = template.attributes.get("backend") else {
        return Ok(());
    };
    let Value::Map(backend) = value else {
        return Err(NetformError::Config {
            message: format!("`backend` must be a map, got {}", value.type_name()),
        });
    };
    for key in backend.keys() {
        if key != "bucket" && key != "prefix" {
            return Err(NetformError::Config {
                message: format!("unknown backend attribute: \"{key}\""),
            });
        }
    }
    for field in ["bucket", "prefix"] {
        match backend.get(field) {
            Some(Value::String(s)) if !s.is_empty() => {}
            _ => {
                return Err(NetformError::Config {
                    message: format!("`backend.{field}` must be a non-empty string"),
                });
            }
        }
    }
    if let Some(Value::String(bucket)) = backend.get("bucket") {
        check_bucket_name(bucket)?;
    }
    if let Some(Value::String(prefix)) = backend.get("prefix") {
        check_prefix(prefix)?;
    }
    Ok(())
}

/// Bucket names become a single directory under the bucket mount.
fn check_bucket_name(bucket: &str) -> Result<()> {
    if bucket == "." || bucket == ".." || bucket.contains(['/', '\\']) {
        return Err(NetformError::Config {
            message: format!("`backend.bucket` is not a valid bucket name: \"{bucket}\""),
        });
    }
    Ok(())
}

/// Prefixes must stay inside their bucket.
fn check_prefix(prefix: &str) -> Result<()> {
    let escapes = prefix.starts_with('/')
        || prefix.contains('\\')
        || prefix.split('/').any(|segment| segment == "." || segment == "..");
    if escapes {
        return Err(NetformError::Config {
            message: format!(
                "`backend.prefix` must be a relative path without `.` or `..` segments: \"{prefix}\""
            ),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::ast::Block;

    fn template(entries: Vec<(&str, Value)>) -> Template {
        Template {
            attributes: entries
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
        }
    }

    fn text(v: &str) -> Value {
        Value::String(v.into())
    }

    #[test]
    fn validate_minimal_template_succeeds() {
        let t = template(vec![("environment", text("dev"))]);
        assert!(validate(&t).is_ok());
    }

    #[test]
    fn validate_missing_environment_fails() {
        let err = validate(&Template::default()).unwrap_err();
        assert!(err.to_string().contains("environment"), "got: {err}");
    }

    #[test]
    fn validate_bad_environment_label_fails() {
        let t = template(vec![("environment", text("Prod East"))]);
        assert!(validate(&t).is_err());
        let t = template(vec![("environment", Value::Integer(1))]);
        assert!(validate(&t).is_err());
    }

    #[test]
    fn validate_unknown_top_level_key_fails() {
        let t = template(vec![("environment", text("dev")), ("subnetz", Value::Map(Block::new()))]);
        let err = validate(&t).unwrap_err();
        assert!(err.to_string().contains("subnetz"), "got: {err}");
    }

    #[test]
    fn validate_collection_must_be_map() {
        let t = template(vec![
            ("environment", text("dev")),
            ("routes", Value::List(Vec::new())),
        ]);
        let err = validate(&t).unwrap_err();
        assert!(err.to_string().contains("`routes` must be a map"), "got: {err}");
    }

    #[test]
    fn validate_collection_entries_must_be_maps() {
        let mut subnets = Block::new();
        let _ = subnets.insert("a".into(), text("10.0.0.0/24"));
        let t = template(vec![("environment", text("dev")), ("subnets", Value::Map(subnets))]);
        let err = validate(&t).unwrap_err();
        assert!(err.to_string().contains("subnets.a"), "got: {err}");
    }

    #[test]
    fn validate_empty_collection_succeeds() {
        let t = template(vec![
            ("environment", text("dev")),
            ("firewall_rules", Value::Map(Block::new())),
        ]);
        assert!(validate(&t).is_ok());
    }

    #[test]
    fn validate_backend_requires_bucket_and_prefix() {
        let mut backend = Block::new();
        let _ = backend.insert("bucket".into(), text("state"));
        let t = template(vec![("environment", text("dev")), ("backend", Value::Map(backend.clone()))]);
        assert!(validate(&t).is_err());

        let _ = backend.insert("prefix".into(), text("net/dev"));
        let t = template(vec![("environment", text("dev")), ("backend", Value::Map(backend))]);
        assert!(validate(&t).is_ok());
    }

    fn backend(bucket: &str, prefix: &str) -> Template {
        let mut block = Block::new();
        let _ = block.insert("bucket".into(), text(bucket));
        let _ = block.insert("prefix".into(), text(prefix));
        template(vec![("environment", text("dev")), ("backend", Value::Map(block))])
    }

    #[test]
    fn validate_backend_prefix_stays_inside_bucket() {
        for prefix in ["../../../etc/x", "net/../prod", "./net", "/abs/path", "net/./dev"] {
            let err = validate(&backend("state", prefix)).unwrap_err();
            assert!(err.to_string().contains("backend.prefix"), "{prefix}: {err}");
        }
        assert!(validate(&backend("state", "network/dev/")).is_ok());
        assert!(validate(&backend("state", "network/dev.v2")).is_ok());
    }

    #[test]
    fn validate_backend_bucket_is_one_segment() {
        for bucket in ["..", ".", "a/b", "../other"] {
            let err = validate(&backend(bucket, "net/dev")).unwrap_err();
            assert!(err.to_string().contains("backend.bucket"), "{bucket}: {err}");
        }
        assert!(validate(&backend("acme-state.v1", "net/dev")).is_ok());
    }

    #[test]
    fn label_rules() {
        assert!(is_valid_label("dev"));
        assert!(is_valid_label("prod-eu_1"));
        assert!(!is_valid_label(""));
        assert!(!is_valid_label("-dev"));
        assert!(!is_valid_label("Dev"));
    }
}
