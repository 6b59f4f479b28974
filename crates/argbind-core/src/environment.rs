use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

use argbind_rt::config::{ENV_PREFIX, env_key};
use chrono::{DateTime, Utc};

use crate::value::Value;

/// Names readable through `RuntimeEnvironment.<name>` expressions.
pub const PROPERTIES: &[&str] = &[
    "AppName",
    "AppPath",
    "BinDirectory",
    "MachineName",
    "ProcessId",
    "StartedAt",
    "Version",
    "DebugEnabled",
];

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RuntimeEnvironment {
    pub app_name: String,
    pub app_path: PathBuf,
    pub bin_directory: PathBuf,
    pub machine_name: String,
    pub process_id: u32,
    pub started_at: DateTime<Utc>,
    pub version: String,
    pub debug_enabled: bool,
}

impl RuntimeEnvironment {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let app_path = lookup(&env_key(ENV_PREFIX, "app_path"))
            .map(PathBuf::from)
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_default();
        let bin_directory = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(PathBuf::from))
            .unwrap_or_else(|| app_path.clone());
        let app_name = lookup(&env_key(ENV_PREFIX, "app_name")).unwrap_or_else(|| {
            app_path
                .file_name()
                .map(|name| name.to_string_lossy().to_string())
                .unwrap_or_else(|| "app".to_string())
        });
        let machine_name = lookup("HOSTNAME")
            .or_else(|| lookup("COMPUTERNAME"))
            .unwrap_or_else(|| "localhost".to_string());
        let version = lookup(&env_key(ENV_PREFIX, "app_version"))
            .unwrap_or_else(|| env!("CARGO_PKG_VERSION").to_string());
        let debug_enabled = matches!(
            lookup(&env_key(ENV_PREFIX, "debug")).as_deref(),
            Some("1") | Some("true")
        );
        Self {
            app_name,
            app_path,
            bin_directory,
            machine_name,
            process_id: std::process::id(),
            started_at: Utc::now(),
            version,
            debug_enabled,
        }
    }

    /// Environment captured on first use and shared by every context that
    /// does not bring its own.
    pub fn shared() -> Arc<Self> {
        static SHARED: OnceLock<Arc<RuntimeEnvironment>> = OnceLock::new();
        Arc::clone(SHARED.get_or_init(|| Arc::new(RuntimeEnvironment::from_env())))
    }

    pub fn property(&self, name: &str) -> Option<Value> {
        let value = match name {
            "AppName" => Value::String(self.app_name.clone()),
            "AppPath" => Value::String(self.app_path.display().to_string()),
            "BinDirectory" => Value::String(self.bin_directory.display().to_string()),
            "MachineName" => Value::String(self.machine_name.clone()),
            "ProcessId" => Value::Int(i64::from(self.process_id)),
            "StartedAt" => Value::DateTime(self.started_at.naive_utc()),
            "Version" => Value::String(self.version.clone()),
            "DebugEnabled" => Value::Bool(self.debug_enabled),
            _ => return None,
        };
        Some(value)
    }
}
