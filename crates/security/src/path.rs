//! Path policy for proposed file commands.
//!
//! Commands target a virtual workspace, so checks are purely lexical:
//! nothing here touches the real filesystem.

use dirflow_config::{OutsideSandboxPolicy, SecurityConfig};
use dirflow_core::error::ValidationError;

/// Lexical sandbox rules applied to every path a command names.
#[derive(Debug, Clone)]
pub struct PathPolicy {
    sandbox_root: String,
    forbidden_paths: Vec<String>,
    outside_sandbox: OutsideSandboxPolicy,
}

/// Outcome of a path check that did not reject the path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathCheck {
    Allowed,
    /// Absolute path outside the sandbox, accepted under the `warn` policy.
    OutsideSandbox,
}

impl PathPolicy {
    pub fn new(
        sandbox_root: impl Into<String>,
        forbidden_paths: Vec<String>,
        outside_sandbox: OutsideSandboxPolicy,
    ) -> Self {
        Self {
            sandbox_root: sandbox_root.into(),
            forbidden_paths,
            outside_sandbox,
        }
    }

    pub fn sandbox_root(&self) -> &str {
        &self.sandbox_root
    }

    /// Check one path.
    ///
    /// Order: traversal, home shorthand, deny-list, sandbox root.
    pub fn check(&self, path: &str) -> Result<PathCheck, ValidationError> {
        let normalized = normalize(path);

        for component in normalized.split('/') {
            if component == ".." {
                return Err(ValidationError::PathTraversal { path: path.into() });
            }
            if component.starts_with('~') {
                return Err(ValidationError::HomeShorthand { path: path.into() });
            }
        }

        let lowered = normalized.to_lowercase();
        for forbidden in &self.forbidden_paths {
            if is_under(&lowered, &normalize(forbidden).to_lowercase()) {
                return Err(ValidationError::ForbiddenPath {
                    path: path.into(),
                    pattern: forbidden.clone(),
                });
            }
        }

        if is_absolute(&normalized) && !self.is_in_sandbox(&normalized) {
            return match self.outside_sandbox {
                OutsideSandboxPolicy::Reject => Err(ValidationError::OutsideSandbox {
                    path: path.into(),
                    root: self.sandbox_root.clone(),
                }),
                OutsideSandboxPolicy::Warn => Ok(PathCheck::OutsideSandbox),
            };
        }

        Ok(PathCheck::Allowed)
    }

    /// Whether `path` names the sandbox root itself.
    pub fn is_sandbox_root(&self, path: &str) -> bool {
        normalize(path) == normalize(&self.sandbox_root)
    }

    fn is_in_sandbox(&self, normalized: &str) -> bool {
        is_under(normalized, &normalize(&self.sandbox_root))
    }
}

impl From<&SecurityConfig> for PathPolicy {
    fn from(config: &SecurityConfig) -> Self {
        Self::new(
            config.sandbox_root.clone(),
            config.forbidden_paths.clone(),
            config.outside_sandbox,
        )
    }
}

impl Default for PathPolicy {
    fn default() -> Self {
        Self::from(&SecurityConfig::default())
    }
}

/// Forward slashes, no trailing slash or `/.` (except for the root itself).
fn normalize(path: &str) -> String {
    let slashed = path.trim().replace('\\', "/");
    let mut trimmed = slashed.trim_end_matches('/');
    while let Some(rest) = trimmed.strip_suffix("/.") {
        trimmed = rest.trim_end_matches('/');
    }
    match trimmed {
        "" if slashed.starts_with('/') => "/".into(),
        trimmed => trimmed.to_string(),
    }
}

/// `path` equals `base` or lies beneath it.
fn is_under(path: &str, base: &str) -> bool {
    if base.is_empty() {
        return false;
    }
    if base == "/" {
        return path.starts_with('/');
    }
    path == base
        || path
            .strip_prefix(base)
            .is_some_and(|rest| rest.starts_with('/'))
}

fn is_absolute(normalized: &str) -> bool {
    let bytes = normalized.as_bytes();
    normalized.starts_with('/')
        || (bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':')
}
