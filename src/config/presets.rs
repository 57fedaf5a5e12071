/// Interpreter runtime envelopes
///
/// An envelope is an immutable, versioned preset describing how submissions
/// are run: interpreter command, default wall limit, and the environment the
/// rendering backend needs. User config may override individual fields; the
/// envelope only fills what is left unset.
use crate::config::types::{GradeError, Result, RuntimeConfig};
use crate::utils::output::OutputLimits;
use std::collections::HashMap;
use std::time::Duration;

pub const DEFAULT_ENVELOPE_ID: &str = "python3-matplotlib-v1";

/// Interpreter runtime envelope
#[derive(Debug, Clone)]
pub struct RuntimeEnvelope {
    /// Envelope ID (e.g. "python3-matplotlib-v1")
    pub id: String,
    /// Human-readable name
    pub name: String,
    pub version: String,
    /// Interpreter executable
    pub executable: String,
    /// Interpreter arguments (before the driver script)
    pub args: Vec<String>,
    /// Default wall clock limit (milliseconds)
    pub wall_time_limit_ms: u64,
    /// Environment the rendering backend needs
    pub environment: Vec<(String, String)>,
}

/// Runtime settings after envelope defaults have been applied
#[derive(Debug, Clone)]
pub struct ResolvedRuntime {
    pub envelope_id: String,
    pub executable: String,
    pub args: Vec<String>,
    pub wall_time_limit: Duration,
    pub output_limits: OutputLimits,
    pub environment: Vec<(String, String)>,
    /// Envelope description recorded with each execution
    pub metadata: HashMap<String, String>,
}

impl RuntimeEnvelope {
    /// Fill unset fields of `config` from this envelope
    pub fn resolve(&self, config: &RuntimeConfig) -> ResolvedRuntime {
        let wall_ms = config.wall_time_limit_ms.unwrap_or(self.wall_time_limit_ms);

        // Envelope environment first so user entries win on conflict
        let mut environment = self.environment.clone();
        environment.extend(config.environment.iter().cloned());

        log::debug!("Applied runtime envelope: {} ({})", self.id, self.name);

        ResolvedRuntime {
            envelope_id: self.id.clone(),
            executable: config
                .executable
                .clone()
                .unwrap_or_else(|| self.executable.clone()),
            args: config.args.clone().unwrap_or_else(|| self.args.clone()),
            wall_time_limit: Duration::from_millis(wall_ms),
            output_limits: OutputLimits {
                stdout_limit: config.output_limit_bytes,
                stderr_limit: config.output_limit_bytes,
                ..OutputLimits::default()
            },
            environment,
            metadata: self.get_metadata(),
        }
    }

    /// Envelope metadata for audit records
    pub fn get_metadata(&self) -> HashMap<String, String> {
        let mut metadata = HashMap::new();
        metadata.insert("envelope_id".to_string(), self.id.clone());
        metadata.insert("envelope_name".to_string(), self.name.clone());
        metadata.insert("envelope_version".to_string(), self.version.clone());
        metadata.insert("executable".to_string(), self.executable.clone());
        metadata
    }
}

/// Runtime preset registry
pub struct RuntimePresets {
    envelopes: HashMap<String, RuntimeEnvelope>,
}

impl RuntimePresets {
    /// Create registry with the built-in envelopes
    pub fn new() -> Self {
        let mut presets = Self {
            envelopes: HashMap::new(),
        };
        presets.register_python3_matplotlib_v1();
        presets
    }

    fn register_python3_matplotlib_v1(&mut self) {
        let envelope = RuntimeEnvelope {
            id: DEFAULT_ENVELOPE_ID.to_string(),
            name: "Python 3 with matplotlib (Agg backend)".to_string(),
            version: "1.0".to_string(),
            executable: "python3".to_string(),
            // -S would hide site-packages, which is where numpy/matplotlib live
            args: vec!["-B".to_string()],
            wall_time_limit_ms: 30_000,
            environment: vec![
                ("MPLBACKEND".to_string(), "Agg".to_string()),
                ("PYTHONDONTWRITEBYTECODE".to_string(), "1".to_string()),
                ("PYTHONIOENCODING".to_string(), "utf-8".to_string()),
            ],
        };

        self.envelopes.insert(envelope.id.clone(), envelope);
    }

    /// Get envelope by ID
    pub fn get(&self, id: &str) -> Option<&RuntimeEnvelope> {
        self.envelopes.get(id)
    }

    /// Resolve a runtime config against its named envelope
    pub fn resolve(&self, config: &RuntimeConfig) -> Result<ResolvedRuntime> {
        let envelope = self.get(&config.envelope).ok_or_else(|| {
            GradeError::Config(format!("unknown runtime envelope: {}", config.envelope))
        })?;
        Ok(envelope.resolve(config))
    }

    pub fn has(&self, id: &str) -> bool {
        self.envelopes.contains_key(id)
    }
}

impl Default for RuntimePresets {
    fn default() -> Self {
        Self::new()
    }
}

/// Get global runtime presets registry
pub fn get_presets() -> &'static RuntimePresets {
    use std::sync::OnceLock;
    static PRESETS: OnceLock<RuntimePresets> = OnceLock::new();
    PRESETS.get_or_init(RuntimePresets::new)
}
