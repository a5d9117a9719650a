use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::behavior::{Behavior, CapabilitySet};
use crate::context::BehaviorContext;
use crate::registry::BehaviorRegistry;

/// A parsed unit manifest: the `.toml` file a `--load` command points at.
///
/// ```toml
/// [unit]
/// builder = "echo"
/// priority = 10      # optional
/// enabled = true     # optional
///
/// [params]           # optional, free-form, passed to the builder
/// prefix = "you said: "
/// ```
#[derive(Debug, Clone)]
pub struct UnitManifest {
    /// Key into the loader's builder table.
    pub builder: String,
    /// Overrides the built unit's own priority when present.
    pub priority: Option<i32>,
    /// Overrides the built unit's own enabled flag when present.
    pub enabled: Option<bool>,
    /// Free-form builder parameters.
    pub params: toml::Table,
}

/// Severity of a manifest diagnostic. Errors abort the load; warnings do not.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

/// One finding from checking a manifest, with its source location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    /// `path` or `path:line`.
    pub location: String,
}

impl Diagnostic {
    fn warning(location: String, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            message: message.into(),
            location,
        }
    }

    fn error(location: String, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            message: message.into(),
            location,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.location, self.message)
    }
}

/// Why a load was aborted. In every case nothing was registered.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("cannot read manifest {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("manifest rejected with {} diagnostic(s)", .diagnostics.len())]
    Rejected { diagnostics: Vec<Diagnostic> },

    #[error("no builder registered for '{0}'")]
    UnknownBuilder(String),

    #[error("unit '{unit}' failed to build: {reason}")]
    Build { unit: String, reason: String },

    #[error("unit '{unit}' declares no capabilities")]
    NoCapabilities { unit: String },

    #[error("a unit named '{0}' is already registered")]
    Duplicate(String),

    #[error("unit '{unit}' failed to initialize: {reason}")]
    Init { unit: String, reason: String },
}

impl LoadError {
    /// One-line-per-finding detail text, suitable for an error response.
    pub fn detail(&self) -> String {
        match self {
            LoadError::Rejected { diagnostics } => diagnostics
                .iter()
                .map(|d| d.to_string())
                .collect::<Vec<_>>()
                .join("\n"),
            other => other.to_string(),
        }
    }
}

/// What a successful load produced.
#[derive(Debug, Clone)]
pub struct LoadReport {
    pub name: String,
    pub capabilities: CapabilitySet,
    pub warnings: Vec<Diagnostic>,
}

/// Constructs a unit from its manifest. Registered in the loader's builder
/// table, statically at wiring time or dynamically for units that bring
/// their own builders.
pub type UnitBuilder =
    Arc<dyn Fn(&UnitManifest) -> valet_core::Result<Arc<dyn Behavior>> + Send + Sync>;

/// Registers and deregisters manifest-described units at runtime.
///
/// Loading resolves the manifest's `builder` key against the builder table,
/// constructs the unit under the caller-supplied identifier, runs its
/// initializer synchronously when it has one (so an init failure keeps the
/// unit out of every dispatch list), and registers it. Unloading only
/// deregisters: a unit removed at runtime never sees its teardown, since that
/// phase runs solely at service stop.
pub struct HotReloadLoader {
    registry: Arc<BehaviorRegistry>,
    builders: RwLock<HashMap<String, UnitBuilder>>,
}

impl HotReloadLoader {
    pub fn new(registry: Arc<BehaviorRegistry>) -> Self {
        Self {
            registry,
            builders: RwLock::new(HashMap::new()),
        }
    }

    /// Add a builder to the table, replacing any previous entry of the
    /// same name.
    pub fn add_builder(&self, name: &str, builder: UnitBuilder) {
        self.builders.write().insert(name.to_string(), builder);
    }

    pub fn builder_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.builders.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Load the unit described by the manifest at `path` and register it
    /// under `identifier`.
    pub async fn load(
        &self,
        cx: &BehaviorContext,
        path: &Path,
        identifier: &str,
    ) -> Result<LoadReport, LoadError> {
        let path_text = path.display().to_string();
        let src = std::fs::read_to_string(path).map_err(|e| LoadError::Io {
            path: path_text.clone(),
            reason: e.to_string(),
        })?;

        let (manifest, diagnostics) = check_manifest(&path_text, &src);
        for d in &diagnostics {
            match d.severity {
                Severity::Warning => warn!(unit = identifier, "manifest warning: {d}"),
                Severity::Error => error!(unit = identifier, "manifest error: {d}"),
            }
        }
        let Some(manifest) = manifest else {
            return Err(LoadError::Rejected { diagnostics });
        };
        let warnings = diagnostics;

        if self.registry.contains(identifier) {
            return Err(LoadError::Duplicate(identifier.to_string()));
        }

        let builder = self
            .builders
            .read()
            .get(&manifest.builder)
            .cloned()
            .ok_or_else(|| LoadError::UnknownBuilder(manifest.builder.clone()))?;

        let inner = builder(&manifest).map_err(|e| LoadError::Build {
            unit: identifier.to_string(),
            reason: e.to_string(),
        })?;

        let capabilities = inner.capabilities();
        if capabilities.is_empty() {
            return Err(LoadError::NoCapabilities {
                unit: identifier.to_string(),
            });
        }

        let unit: Arc<dyn Behavior> = Arc::new(LoadedUnit {
            name: identifier.to_string(),
            priority: manifest.priority.unwrap_or_else(|| inner.priority()),
            enabled: manifest.enabled.unwrap_or_else(|| inner.enabled()),
            inner,
        });

        // Initialization failures keep the unit out of dispatch entirely.
        if capabilities.init {
            unit.on_init(cx).await.map_err(|e| LoadError::Init {
                unit: identifier.to_string(),
                reason: e.to_string(),
            })?;
        }

        self.registry.register(Arc::clone(&unit));
        info!(
            unit = identifier,
            builder = %manifest.builder,
            capabilities = ?capabilities.names(),
            "hot-loaded unit"
        );
        Ok(LoadReport {
            name: identifier.to_string(),
            capabilities,
            warnings,
        })
    }

    /// Deregister a unit from every capability list. Idempotent; does not
    /// invoke teardown.
    pub fn unload(&self, name: &str) -> bool {
        let removed = self.registry.unregister(name);
        if removed {
            info!(unit = name, "hot-unloaded unit");
        }
        removed
    }
}

/// A hot-loaded unit: the built behavior plus its manifest overrides,
/// registered under the load identifier.
struct LoadedUnit {
    name: String,
    priority: i32,
    enabled: bool,
    inner: Arc<dyn Behavior>,
}

#[async_trait]
impl Behavior for LoadedUnit {
    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn enabled(&self) -> bool {
        self.enabled
    }

    fn capabilities(&self) -> CapabilitySet {
        self.inner.capabilities()
    }

    async fn on_init(&self, cx: &BehaviorContext) -> valet_core::Result<()> {
        self.inner.on_init(cx).await
    }

    async fn on_tick(&self, cx: &BehaviorContext) -> valet_core::Result<()> {
        self.inner.on_tick(cx).await
    }

    async fn on_net_tick(&self, cx: &BehaviorContext) -> valet_core::Result<()> {
        self.inner.on_net_tick(cx).await
    }

    async fn on_teardown(&self, cx: &BehaviorContext) -> valet_core::Result<()> {
        self.inner.on_teardown(cx).await
    }
}

/// Structurally check a manifest, accumulating diagnostics instead of
/// stopping at the first problem. Returns the manifest only when no
/// error-severity diagnostic was found.
fn check_manifest(path: &str, src: &str) -> (Option<UnitManifest>, Vec<Diagnostic>) {
    let mut diagnostics = Vec::new();

    let table: toml::Table = match src.parse() {
        Ok(table) => table,
        Err(e) => {
            // The toml error text already carries line/column.
            diagnostics.push(Diagnostic::error(path.to_string(), e.to_string()));
            return (None, diagnostics);
        }
    };

    for key in table.keys() {
        if key != "unit" && key != "params" {
            diagnostics.push(Diagnostic::warning(
                locate(path, src, key),
                format!("unknown key '{key}'"),
            ));
        }
    }

    let unit = match table.get("unit") {
        Some(toml::Value::Table(unit)) => Some(unit),
        Some(_) => {
            diagnostics.push(Diagnostic::error(
                locate(path, src, "unit"),
                "'unit' must be a table",
            ));
            None
        }
        None => {
            diagnostics.push(Diagnostic::error(
                path.to_string(),
                "missing [unit] table",
            ));
            None
        }
    };

    let mut builder = None;
    let mut priority = None;
    let mut enabled = None;
    if let Some(unit) = unit {
        for key in unit.keys() {
            if !matches!(key.as_str(), "builder" | "priority" | "enabled") {
                diagnostics.push(Diagnostic::warning(
                    locate(path, src, key),
                    format!("unknown key 'unit.{key}'"),
                ));
            }
        }

        match unit.get("builder") {
            Some(toml::Value::String(name)) => builder = Some(name.clone()),
            Some(_) => diagnostics.push(Diagnostic::error(
                locate(path, src, "builder"),
                "'unit.builder' must be a string",
            )),
            None => diagnostics.push(Diagnostic::error(
                locate(path, src, "unit"),
                "missing required key 'unit.builder'",
            )),
        }

        match unit.get("priority") {
            Some(toml::Value::Integer(p)) => match i32::try_from(*p) {
                Ok(p) => priority = Some(p),
                Err(_) => diagnostics.push(Diagnostic::error(
                    locate(path, src, "priority"),
                    format!("'unit.priority' {p} does not fit in 32 bits"),
                )),
            },
            Some(_) => diagnostics.push(Diagnostic::error(
                locate(path, src, "priority"),
                "'unit.priority' must be an integer",
            )),
            None => {}
        }

        match unit.get("enabled") {
            Some(toml::Value::Boolean(flag)) => enabled = Some(*flag),
            Some(_) => diagnostics.push(Diagnostic::error(
                locate(path, src, "enabled"),
                "'unit.enabled' must be a boolean",
            )),
            None => {}
        }
    }

    let params = match table.get("params") {
        Some(toml::Value::Table(params)) => params.clone(),
        Some(_) => {
            diagnostics.push(Diagnostic::error(
                locate(path, src, "params"),
                "'params' must be a table",
            ));
            toml::Table::new()
        }
        None => toml::Table::new(),
    };

    let has_errors = diagnostics.iter().any(|d| d.severity == Severity::Error);
    match (builder, has_errors) {
        (Some(builder), false) => (
            Some(UnitManifest {
                builder,
                priority,
                enabled,
                params,
            }),
            diagnostics,
        ),
        _ => (None, diagnostics),
    }
}

/// Best-effort `path:line` for a key name, for diagnostic locations.
fn locate(path: &str, src: &str, key: &str) -> String {
    for (idx, line) in src.lines().enumerate() {
        let trimmed = line.trim_start();
        if let Some(rest) = trimmed.strip_prefix(key) {
            if rest.trim_start().starts_with('=') {
                return format!("{path}:{}", idx + 1);
            }
        }
        if trimmed.starts_with('[') && trimmed[1..].trim_start().starts_with(key) {
            return format!("{path}:{}", idx + 1);
        }
    }
    path.to_string()
}
