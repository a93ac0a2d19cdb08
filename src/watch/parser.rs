//! Descriptor parsing and path-derived metadata.
//!
//! A descriptor file is a plain-text list of `key: value` lines; its location
//! carries the hypervisor name and the requested node type. Both are folded
//! into one [`DescriptorRecord`] here. Malformed content is flagged and
//! tolerated, never fatal.

use indexmap::IndexMap;
use regex::Regex;
use serde::Serialize;
use std::path::Path;
use std::sync::LazyLock;

/// Directory layout every descriptor file is expected to live under.
static PATH_TEMPLATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^.*/hosts/(?P<hypervisor>[^/]+)/add_(?P<nodetype>[^/]+)$")
        .expect("path template regex is valid")
});

/// Parsed contents of one descriptor file plus path-derived metadata.
///
/// `fields` keeps keys in the order they first appeared in the file; a later
/// duplicate overwrites the earlier value in place. `hypervisor` and
/// `nodetype` come from the file's location rather than its contents and are
/// `None` whenever the path does not follow the
/// `.../hosts/<hypervisor>/add_<nodetype>` layout. Serialization flattens
/// `fields` and always includes the two metadata keys, as explicit nulls
/// when absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DescriptorRecord {
    /// Key/value pairs parsed from the file body.
    #[serde(flatten)]
    pub fields: IndexMap<String, String>,
    /// Hypervisor host name taken from the parent directory.
    pub hypervisor: Option<String>,
    /// Node type taken from the file name after the `add_` prefix.
    pub nodetype: Option<String>,
}

/// Parse a descriptor file's contents into a [`DescriptorRecord`].
///
/// Each line containing a `:` is split on the first `:` only, with
/// whitespace trimmed from both sides; later duplicate keys win. Lines
/// without a separator are logged as malformed and skipped. The path-derived
/// metadata replaces any same-named keys from the body, whether or not the
/// template matched. Nothing in here fails: filesystem errors are the
/// caller's to handle before the contents reach this function.
pub fn parse(path: &Path, contents: &str) -> DescriptorRecord {
    let mut fields = IndexMap::new();

    for line in contents.lines() {
        match line.split_once(':') {
            Some((key, value)) => {
                fields.insert(key.trim().to_string(), value.trim().to_string());
            }
            None => {
                tracing::warn!(
                    "Line in file {} does not contain colon: {}",
                    path.display(),
                    line
                );
            }
        }
    }

    // The location is authoritative for these two keys.
    fields.shift_remove("hypervisor");
    fields.shift_remove("nodetype");

    let (hypervisor, nodetype) = match PATH_TEMPLATE.captures(&path.to_string_lossy()) {
        Some(caps) => (
            Some(caps["hypervisor"].to_string()),
            Some(caps["nodetype"].to_string()),
        ),
        None => {
            tracing::warn!(
                "Unable to extract hypervisor and nodetype from file path: {}",
                path.display()
            );
            (None, None)
        }
    };

    DescriptorRecord {
        fields,
        hypervisor,
        nodetype,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_key_value_lines() {
        let record = parse(
            Path::new("/data/hosts/host1/add_sensor"),
            "cpu: 4\nmemory: 8192\n",
        );

        assert_eq!(record.fields.get("cpu").map(String::as_str), Some("4"));
        assert_eq!(record.fields.get("memory").map(String::as_str), Some("8192"));
        assert_eq!(record.hypervisor.as_deref(), Some("host1"));
        assert_eq!(record.nodetype.as_deref(), Some("sensor"));
    }

    #[test]
    fn test_splits_on_first_colon_only() {
        let record = parse(
            Path::new("/data/hosts/host1/add_sensor"),
            "address: 10.0.0.1:8080\n",
        );

        assert_eq!(
            record.fields.get("address").map(String::as_str),
            Some("10.0.0.1:8080")
        );
    }

    #[test]
    fn test_later_duplicate_key_wins() {
        let record = parse(
            Path::new("/data/hosts/host1/add_sensor"),
            "role: manager\nrole: sensor\n",
        );

        assert_eq!(record.fields.get("role").map(String::as_str), Some("sensor"));
        assert_eq!(record.fields.len(), 1);
    }

    #[test]
    fn test_skips_lines_without_separator() {
        let record = parse(
            Path::new("/data/hosts/host1/add_sensor"),
            "malformed line no colon\ncpu: 4\n",
        );

        assert_eq!(record.fields.len(), 1);
        assert_eq!(record.fields.get("cpu").map(String::as_str), Some("4"));
    }

    #[test]
    fn test_path_metadata_overrides_in_file_keys() {
        let record = parse(
            Path::new("/data/hosts/host1/add_sensor"),
            "hypervisor: esxi\nnodetype: search\n",
        );

        assert_eq!(record.hypervisor.as_deref(), Some("host1"));
        assert_eq!(record.nodetype.as_deref(), Some("sensor"));
        assert!(record.fields.is_empty());
    }

    #[test]
    fn test_template_mismatch_yields_explicit_absent_metadata() {
        let record = parse(Path::new("/tmp/random/file.txt"), "role: sensor\n");

        assert!(record.hypervisor.is_none());
        assert!(record.nodetype.is_none());
        assert_eq!(record.fields.get("role").map(String::as_str), Some("sensor"));
    }

    #[test]
    fn test_preserves_field_order_in_serialized_form() {
        let record = parse(
            Path::new("/data/hosts/host1/add_sensor"),
            "b: 2\na: 1\n",
        );

        let keys: Vec<_> = record.fields.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["b", "a"]);
    }

    #[test]
    fn test_serializes_metadata_as_explicit_nulls() {
        let record = parse(Path::new("/tmp/random/file.txt"), "role: sensor\n");
        let json = serde_json::to_value(&record).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "role": "sensor",
                "hypervisor": null,
                "nodetype": null,
            })
        );
    }
}
