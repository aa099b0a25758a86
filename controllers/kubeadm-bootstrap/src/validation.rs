//! Spec validation.
//!
//! `validate` is the only way to obtain a `ValidatedConfig`. A validated config
//! holds exactly one of the two kubeadm shapes, so downstream code matches on
//! `ConfigShape` instead of re-checking which optional fields are set.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use crds::{
    BootstrapErrorReason, ClusterConfiguration, FileEncoding, InitConfiguration, JoinConfiguration,
    KubeadmConfigSpec,
};
use kubeadm_render::{INIT_CONFIG_PATH, JOIN_CONFIG_PATH};
use std::collections::HashSet;
use thiserror::Error;

const RESERVED_PATHS: [&str; 2] = [INIT_CONFIG_PATH, JOIN_CONFIG_PATH];

/// Terminal validation failures. Each maps onto one `BootstrapErrorReason`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Both or neither of the init and join shapes were set
    #[error("exactly one of init (clusterConfiguration + initConfiguration) or joinConfiguration must be set: {0}")]
    AmbiguousOrMissingConfiguration(&'static str),

    /// Only one half of the init pair was set
    #[error("clusterConfiguration and initConfiguration must be set together: {missing} is missing")]
    IncompletePair { missing: &'static str },

    /// A file entry at `index` is malformed
    #[error("files[{index}]: {reason}")]
    InvalidFile { index: usize, reason: String },
}

impl ValidationError {
    /// Reason recorded in status for this failure
    pub fn reason(&self) -> BootstrapErrorReason {
        match self {
            ValidationError::AmbiguousOrMissingConfiguration(_) => {
                BootstrapErrorReason::AmbiguousOrMissingConfiguration
            }
            ValidationError::IncompletePair { .. } => BootstrapErrorReason::IncompletePair,
            ValidationError::InvalidFile { .. } => BootstrapErrorReason::InvalidFile,
        }
    }

    fn file(index: usize, reason: impl Into<String>) -> Self {
        ValidationError::InvalidFile {
            index,
            reason: reason.into(),
        }
    }
}

/// The two legal kubeadm shapes
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConfigShape<'a> {
    /// First control-plane node
    Init {
        cluster: &'a ClusterConfiguration,
        init: &'a InitConfiguration,
    },
    /// Any node joining an existing control plane
    Join { join: &'a JoinConfiguration },
}

/// A file entry that passed validation, with its required fields resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidatedFile<'a> {
    /// Absolute path on the node
    pub path: &'a str,
    /// Owner, `None` when unset or blank
    pub owner: Option<&'a str>,
    /// Octal mode, `None` when unset or blank
    pub permissions: Option<&'a str>,
    /// How `content` is encoded
    pub encoding: FileEncoding,
    /// File content as declared
    pub content: &'a str,
}

/// A spec known to be renderable, borrowed from the resource it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedConfig<'a> {
    shape: ConfigShape<'a>,
    files: Vec<ValidatedFile<'a>>,
    pre_commands: &'a [String],
    post_commands: &'a [String],
}

impl<'a> ValidatedConfig<'a> {
    /// The kubeadm shape selected by the spec
    pub fn shape(&self) -> ConfigShape<'a> {
        self.shape
    }

    /// Files in declared order
    pub fn files(&self) -> &[ValidatedFile<'a>] {
        &self.files
    }

    /// Commands run before kubeadm
    pub fn pre_commands(&self) -> &'a [String] {
        self.pre_commands
    }

    /// Commands run after kubeadm
    pub fn post_commands(&self) -> &'a [String] {
        self.post_commands
    }
}

/// Check that `spec` has exactly one shape and well-formed files.
pub fn validate(spec: &KubeadmConfigSpec) -> Result<ValidatedConfig<'_>, ValidationError> {
    let shape = resolve_shape(spec)?;
    let files = validate_files(spec)?;
    Ok(ValidatedConfig {
        shape,
        files,
        pre_commands: &spec.pre_kubeadm_commands,
        post_commands: &spec.post_kubeadm_commands,
    })
}

fn resolve_shape(spec: &KubeadmConfigSpec) -> Result<ConfigShape<'_>, ValidationError> {
    match (
        spec.cluster_configuration.as_ref(),
        spec.init_configuration.as_ref(),
        spec.join_configuration.as_ref(),
    ) {
        (None, None, Some(join)) => Ok(ConfigShape::Join { join }),
        (Some(cluster), Some(init), None) => Ok(ConfigShape::Init { cluster, init }),
        (None, None, None) => Err(ValidationError::AmbiguousOrMissingConfiguration(
            "no configuration is set",
        )),
        (_, _, Some(_)) => Err(ValidationError::AmbiguousOrMissingConfiguration(
            "joinConfiguration is set together with init configuration",
        )),
        (Some(_), None, None) => Err(ValidationError::IncompletePair {
            missing: "initConfiguration",
        }),
        (None, Some(_), None) => Err(ValidationError::IncompletePair {
            missing: "clusterConfiguration",
        }),
    }
}

fn validate_files(spec: &KubeadmConfigSpec) -> Result<Vec<ValidatedFile<'_>>, ValidationError> {
    let mut seen = HashSet::new();
    let mut files = Vec::with_capacity(spec.files.len());

    for (index, file) in spec.files.iter().enumerate() {
        let path = file.path.as_str();
        if path.trim().is_empty() {
            return Err(ValidationError::file(index, "path must not be empty"));
        }
        if RESERVED_PATHS.contains(&path) {
            return Err(ValidationError::file(
                index,
                format!("path {path} is reserved for the kubeadm configuration"),
            ));
        }
        if !seen.insert(path) {
            return Err(ValidationError::file(index, format!("duplicate path {path}")));
        }

        let Some(content) = file.content.as_deref() else {
            return Err(ValidationError::file(index, "content is required"));
        };

        let owner = non_blank(file.owner.as_deref());
        let permissions = non_blank(file.permissions.as_deref());
        if let Some(permissions) = permissions {
            if !is_valid_mode(permissions) {
                return Err(ValidationError::file(
                    index,
                    format!("permissions {permissions:?} is not an octal file mode"),
                ));
            }
        }

        let encoding = file.encoding.unwrap_or_default();
        if encoding == FileEncoding::Base64 && !is_valid_base64(content) {
            return Err(ValidationError::file(index, "content is not valid base64"));
        }

        files.push(ValidatedFile {
            path,
            owner,
            permissions,
            encoding,
            content,
        });
    }

    Ok(files)
}

/// Blank owner or permissions mean "unset" and take the defaults
fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|s| !s.trim().is_empty())
}

/// 3 or 4 octal digits with an optional `0o` prefix
fn is_valid_mode(raw: &str) -> bool {
    let digits = raw.strip_prefix("0o").unwrap_or(raw);
    if !(3..=4).contains(&digits.len()) || !digits.bytes().all(|b| (b'0'..=b'7').contains(&b)) {
        return false;
    }
    u32::from_str_radix(digits, 8).is_ok_and(|mode| mode <= 0o7777)
}

fn is_valid_base64(content: &str) -> bool {
    let compact: String = content.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    STANDARD.decode(compact).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crds::File;

    fn init_spec() -> KubeadmConfigSpec {
        KubeadmConfigSpec {
            cluster_configuration: Some(ClusterConfiguration::default()),
            init_configuration: Some(InitConfiguration::default()),
            ..Default::default()
        }
    }

    fn file(path: &str, content: &str) -> File {
        File {
            path: path.to_string(),
            content: Some(content.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_init_shape() {
        let spec = init_spec();
        let validated = validate(&spec).unwrap();
        assert!(matches!(validated.shape(), ConfigShape::Init { .. }));
    }

    #[test]
    fn test_join_shape() {
        let spec = KubeadmConfigSpec {
            join_configuration: Some(JoinConfiguration::default()),
            ..Default::default()
        };
        let validated = validate(&spec).unwrap();
        assert!(matches!(validated.shape(), ConfigShape::Join { .. }));
    }

    #[test]
    fn test_both_shapes_is_ambiguous() {
        let mut spec = init_spec();
        spec.join_configuration = Some(JoinConfiguration::default());
        let err = validate(&spec).unwrap_err();
        assert_eq!(err.reason(), BootstrapErrorReason::AmbiguousOrMissingConfiguration);

        // join plus only half of the init pair is still ambiguous
        spec.init_configuration = None;
        let err = validate(&spec).unwrap_err();
        assert_eq!(err.reason(), BootstrapErrorReason::AmbiguousOrMissingConfiguration);
    }

    #[test]
    fn test_no_shape_is_missing() {
        let err = validate(&KubeadmConfigSpec::default()).unwrap_err();
        assert_eq!(err.reason(), BootstrapErrorReason::AmbiguousOrMissingConfiguration);
    }

    #[test]
    fn test_incomplete_pair_names_missing_half() {
        let spec = KubeadmConfigSpec {
            cluster_configuration: Some(ClusterConfiguration::default()),
            ..Default::default()
        };
        assert_eq!(
            validate(&spec).unwrap_err(),
            ValidationError::IncompletePair { missing: "initConfiguration" }
        );

        let spec = KubeadmConfigSpec {
            init_configuration: Some(InitConfiguration::default()),
            ..Default::default()
        };
        let err = validate(&spec).unwrap_err();
        assert_eq!(err.reason(), BootstrapErrorReason::IncompletePair);
        assert!(err.to_string().contains("clusterConfiguration is missing"));
    }

    #[test]
    fn test_files_keep_declared_order() {
        let mut spec = init_spec();
        spec.files = vec![file("/etc/b", "b"), file("/etc/a", "a"), file("/etc/c", "c")];
        let validated = validate(&spec).unwrap();
        let paths: Vec<&str> = validated.files().iter().map(|f| f.path).collect();
        assert_eq!(paths, vec!["/etc/b", "/etc/a", "/etc/c"]);
    }

    #[test]
    fn test_empty_path_reports_index() {
        let mut spec = init_spec();
        spec.files = vec![file("/etc/a", "a"), file("  ", "b")];
        assert!(matches!(
            validate(&spec).unwrap_err(),
            ValidationError::InvalidFile { index: 1, .. }
        ));
    }

    #[test]
    fn test_missing_content() {
        let mut spec = init_spec();
        spec.files = vec![File {
            path: "/etc/a".to_string(),
            ..Default::default()
        }];
        assert!(matches!(
            validate(&spec).unwrap_err(),
            ValidationError::InvalidFile { index: 0, .. }
        ));
    }

    #[test]
    fn test_duplicate_and_reserved_paths() {
        let mut spec = init_spec();
        spec.files = vec![file("/etc/a", "a"), file("/etc/a", "b")];
        let err = validate(&spec).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidFile { index: 1, .. }));
        assert!(err.to_string().contains("duplicate"));

        spec.files = vec![file(INIT_CONFIG_PATH, "x")];
        assert!(matches!(
            validate(&spec).unwrap_err(),
            ValidationError::InvalidFile { index: 0, .. }
        ));
    }

    #[test]
    fn test_permission_modes() {
        for mode in ["0640", "644", "0o600", "7777"] {
            assert!(is_valid_mode(mode), "{mode} should be accepted");
        }
        for mode in ["", "64", "06400", "0888", "rw-r--r--", "0o", "0x644"] {
            assert!(!is_valid_mode(mode), "{mode} should be rejected");
        }

        let mut spec = init_spec();
        let mut bad = file("/etc/a", "a");
        bad.permissions = Some("999".to_string());
        spec.files = vec![bad];
        assert!(matches!(
            validate(&spec).unwrap_err(),
            ValidationError::InvalidFile { index: 0, .. }
        ));
    }

    #[test]
    fn test_base64_content() {
        let mut spec = init_spec();
        let mut encoded = file("/etc/a", "aGVsbG8g\nd29ybGQ=");
        encoded.encoding = Some(FileEncoding::Base64);
        spec.files = vec![encoded.clone()];
        let validated = validate(&spec).unwrap();
        assert_eq!(validated.files()[0].encoding, FileEncoding::Base64);

        encoded.content = Some("not base64!".to_string());
        spec.files = vec![encoded];
        assert!(matches!(
            validate(&spec).unwrap_err(),
            ValidationError::InvalidFile { index: 0, .. }
        ));
    }

    #[test]
    fn test_blank_owner_and_permissions_are_unset() {
        let mut spec = init_spec();
        let mut blank = file("/etc/a", "a");
        blank.owner = Some(String::new());
        blank.permissions = Some("  ".to_string());
        spec.files = vec![blank];

        let validated = validate(&spec).unwrap();
        assert_eq!(validated.files()[0].owner, None);
        assert_eq!(validated.files()[0].permissions, None);
    }
}
