/// Interpreter environment and workspace permission hygiene
///
/// Submissions never see the grader's full environment. The interpreter gets
/// an allowlisted subset of the parent environment, with loader and Python
/// startup hooks removed, plus deterministic values pointing caches and
/// temp files into the submission workspace.
use crate::config::types::{GradeError, Result};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

/// Parent variables the interpreter may inherit
const INHERITED_VARS: &[&str] = &["PATH", "VIRTUAL_ENV", "CONDA_PREFIX", "SYSTEMROOT"];

/// Prefixes that are never passed through, even from explicit overrides
const STRIPPED_PREFIXES: &[&str] = &["LD_", "DYLD_"];

/// Python hooks that would run code before the driver, or redirect imports
const STRIPPED_PYTHON_VARS: &[&str] = &[
    "PYTHONSTARTUP",
    "PYTHONPATH",
    "PYTHONHOME",
    "PYTHONINSPECT",
    "PYTHONUSERBASE",
];

/// Environment sanitization policy
#[derive(Debug, Clone)]
pub struct EnvPolicy {
    /// Fallback PATH when the parent has none
    pub default_path: String,
    pub locale: String,
}

impl Default for EnvPolicy {
    fn default() -> Self {
        EnvPolicy {
            default_path: "/usr/local/bin:/usr/bin:/bin".to_string(),
            locale: "C.UTF-8".to_string(),
        }
    }
}

/// Environment hygiene manager
pub struct EnvHygiene {
    policy: EnvPolicy,
}

impl EnvHygiene {
    pub fn new(policy: EnvPolicy) -> Self {
        EnvHygiene { policy }
    }

    /// Build the interpreter environment for one workspace.
    ///
    /// `overrides` come from the runtime envelope and user config and are
    /// applied last, except for stripped variables.
    pub fn sanitize_environment(
        &self,
        workspace: &Path,
        overrides: &[(String, String)],
    ) -> HashMap<String, String> {
        let mut env_map = HashMap::new();

        for var in INHERITED_VARS {
            if let Ok(value) = env::var(var) {
                env_map.insert(var.to_string(), value);
            }
        }
        env_map
            .entry("PATH".to_string())
            .or_insert_with(|| self.policy.default_path.clone());

        let workspace = workspace.to_string_lossy().to_string();
        env_map.insert("HOME".to_string(), workspace.clone());
        env_map.insert("TMPDIR".to_string(), workspace.clone());
        env_map.insert("MPLCONFIGDIR".to_string(), workspace);
        env_map.insert("LANG".to_string(), self.policy.locale.clone());
        env_map.insert("LC_ALL".to_string(), self.policy.locale.clone());
        env_map.insert("PYTHONNOUSERSITE".to_string(), "1".to_string());

        for (key, value) in overrides {
            if is_stripped(key) {
                log::warn!("Ignoring unsafe interpreter environment override: {}", key);
                continue;
            }
            env_map.insert(key.clone(), value.clone());
        }

        env_map
    }

    /// Restrict a workspace directory to its owner
    pub fn set_directory_permissions(&self, path: &Path) -> Result<()> {
        let permissions = fs::Permissions::from_mode(0o700);
        fs::set_permissions(path, permissions).map_err(|e| {
            GradeError::Execution(format!(
                "Failed to set permissions on {}: {}",
                path.display(),
                e
            ))
        })?;
        log::debug!("Set permissions 700 on {}", path.display());
        Ok(())
    }
}

impl Default for EnvHygiene {
    fn default() -> Self {
        Self::new(EnvPolicy::default())
    }
}

fn is_stripped(key: &str) -> bool {
    STRIPPED_PREFIXES.iter().any(|p| key.starts_with(p)) || STRIPPED_PYTHON_VARS.contains(&key)
}

/// Report unsafe variables present in an environment map
pub fn validate_environment_safety(env_map: &HashMap<String, String>) -> Vec<String> {
    let mut names: Vec<&String> = env_map.keys().filter(|k| is_stripped(k)).collect();
    names.sort();
    names
        .into_iter()
        .map(|name| format!("Unsafe environment variable present: {}", name))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_points_caches_into_workspace() {
        let hygiene = EnvHygiene::default();
        let env_map = hygiene.sanitize_environment(Path::new("/tmp/ws-1"), &[]);

        assert_eq!(env_map.get("HOME").map(String::as_str), Some("/tmp/ws-1"));
        assert_eq!(env_map.get("MPLCONFIGDIR").map(String::as_str), Some("/tmp/ws-1"));
        assert_eq!(env_map.get("LANG").map(String::as_str), Some("C.UTF-8"));
        assert!(env_map.contains_key("PATH"));
        assert!(validate_environment_safety(&env_map).is_empty());
    }

    #[test]
    fn test_overrides_applied_but_unsafe_ones_dropped() {
        let hygiene = EnvHygiene::default();
        let overrides = vec![
            ("MPLBACKEND".to_string(), "Agg".to_string()),
            ("LD_PRELOAD".to_string(), "/evil.so".to_string()),
            ("PYTHONSTARTUP".to_string(), "/evil.py".to_string()),
        ];
        let env_map = hygiene.sanitize_environment(Path::new("/tmp/ws"), &overrides);

        assert_eq!(env_map.get("MPLBACKEND").map(String::as_str), Some("Agg"));
        assert!(!env_map.contains_key("LD_PRELOAD"));
        assert!(!env_map.contains_key("PYTHONSTARTUP"));
    }

    #[test]
    fn test_validate_environment_safety() {
        let mut env_map = HashMap::new();
        env_map.insert("PATH".to_string(), "/usr/bin".to_string());
        assert!(validate_environment_safety(&env_map).is_empty());

        env_map.insert("LD_PRELOAD".to_string(), "/evil.so".to_string());
        env_map.insert("PYTHONPATH".to_string(), "/x".to_string());
        let warnings = validate_environment_safety(&env_map);
        assert_eq!(warnings.len(), 2);
        assert!(warnings[0].contains("LD_PRELOAD"));
    }

    #[test]
    fn test_set_directory_permissions() {
        let dir = tempfile::tempdir().unwrap();
        EnvHygiene::default()
            .set_directory_permissions(dir.path())
            .unwrap();
        let mode = fs::metadata(dir.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o700);
    }
}
