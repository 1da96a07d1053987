//! Diagnostic logging
//!
//! The bridge emits `tracing` events under the `napi_shim` target. When the
//! host process installs its own subscriber nothing here is needed;
//! otherwise [`init`] (or the exported `napi_shim_init_logging`) installs a
//! stderr subscriber configured from `NAPI_SHIM_LOG_LEVEL` and
//! `NAPI_SHIM_LOG_FORMAT`. `RUST_LOG`, when set, takes precedence over the
//! level.

use std::env;
use std::fmt;
use std::io::IsTerminal;
use std::sync::OnceLock;

/// Environment variable selecting the [`LogLevel`].
pub const LEVEL_VAR: &str = "NAPI_SHIM_LOG_LEVEL";
/// Environment variable selecting the [`LogFormat`].
pub const FORMAT_VAR: &str = "NAPI_SHIM_LOG_FORMAT";

/// How events are rendered on stderr.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Compact text, colored only when stderr is a terminal.
    Auto,
    /// Compact text without color.
    Text,
    /// One JSON object per event.
    Json,
}

impl LogFormat {
    const NAMES: [(LogFormat, &'static str); 3] =
        [(LogFormat::Auto, "auto"), (LogFormat::Text, "text"), (LogFormat::Json, "json")];

    /// Case-insensitive `auto`, `text` or `json`.
    pub fn parse(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::NAMES
            .iter()
            .find(|(_, known)| known.eq_ignore_ascii_case(name))
            .map(|(format, _)| *format)
    }

    fn name(self) -> &'static str {
        Self::NAMES[self as usize].1
    }

    fn colored(self) -> bool {
        self == LogFormat::Auto && std::io::stderr().is_terminal()
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Most verbose level emitted under the `napi_shim` target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    /// Fatal errors reported by extensions.
    Error,
    /// Fallbacks that report success without effect.
    Warn,
    /// Capability table publish and withdraw.
    Info,
    /// First fallback per entry point, pool startup, teardown.
    Debug,
    /// Per-call queue and finalizer activity.
    Trace,
}

impl LogLevel {
    const NAMES: [(LogLevel, &'static str); 5] = [
        (LogLevel::Error, "error"),
        (LogLevel::Warn, "warn"),
        (LogLevel::Info, "info"),
        (LogLevel::Debug, "debug"),
        (LogLevel::Trace, "trace"),
    ];

    /// Case-insensitive `error`, `warn`, `info`, `debug` or `trace`.
    pub fn parse(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::NAMES
            .iter()
            .find(|(_, known)| known.eq_ignore_ascii_case(name))
            .map(|(level, _)| *level)
    }

    fn name(self) -> &'static str {
        Self::NAMES[self as usize].1
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Subscriber settings: `warn` and `auto` unless overridden.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogOptions {
    /// Level used when `RUST_LOG` is unset.
    pub level: LogLevel,
    /// Rendering on stderr.
    pub format: LogFormat,
}

impl Default for LogOptions {
    fn default() -> Self {
        Self { level: LogLevel::Warn, format: LogFormat::Auto }
    }
}

impl LogOptions {
    /// Defaults overridden by [`LEVEL_VAR`] and [`FORMAT_VAR`].
    #[must_use]
    pub fn from_env() -> Self {
        let level = env::var(LEVEL_VAR).ok();
        let format = env::var(FORMAT_VAR).ok();
        Self::default().overridden(level.as_deref(), format.as_deref())
    }

    /// Apply raw setting values; unrecognized ones leave the field as is.
    #[must_use]
    pub fn overridden(self, level: Option<&str>, format: Option<&str>) -> Self {
        Self {
            level: level.and_then(LogLevel::parse).unwrap_or(self.level),
            format: format.and_then(LogFormat::parse).unwrap_or(self.format),
        }
    }
}

/// Install the global stderr subscriber. Only the first call has an effect,
/// and it does nothing when the host already installed a subscriber.
/// Returns whether this call installed it.
pub fn init(options: &LogOptions) -> bool {
    use tracing_subscriber::{fmt, EnvFilter};

    static INITIALISED: OnceLock<bool> = OnceLock::new();

    *INITIALISED.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(format!("napi_shim={}", options.level)));
        let builder = fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_names(true);
        let installed = match options.format {
            LogFormat::Json => builder.json().try_init().is_ok(),
            LogFormat::Auto | LogFormat::Text => builder
                .compact()
                .with_ansi(options.format.colored())
                .try_init()
                .is_ok(),
        };
        if installed {
            tracing::debug!(target: "napi_shim", level = %options.level, format = %options.format, "logging initialised");
        }
        installed
    })
}

/// Install the stderr subscriber configured from the environment.
#[no_mangle]
pub extern "C" fn napi_shim_init_logging() {
    init(&LogOptions::from_env());
}
