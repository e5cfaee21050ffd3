use anyhow::{Context, Result};
use directories::BaseDirs;
use serde::{Deserialize, Serialize};
use std::{env, fs, path::PathBuf};

pub const APP_DIR_NAME: &str = "PrintAgentService";
pub const SELECTION_FILE_NAME: &str = "selected_printer.json";
pub const LOG_FILE_NAME: &str = "printer_service.log";

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AgentConfig {
    pub http: Http,
    pub service: Service,
    pub storage: Storage,
    pub output: Output,
    pub printer: Printer,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Http {
    pub host: String,
    pub port: u16,
    /// Largest accepted request body; receipts carry base64 text and logos.
    pub max_body_bytes: usize,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Service {
    pub name: String,
    pub display_name: String,
    pub description: String,
    pub recovery: Recovery,
}

/// Restart-on-failure policy handed to the Service Control Manager.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Recovery {
    /// One restart action per entry, delay in milliseconds.
    pub restart_delays_ms: Vec<u64>,
    /// Seconds without failure after which the SCM resets its failure count.
    pub reset_after_secs: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Storage {
    pub data_dir: PathBuf,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Output {
    /// `file` or `stdout`.
    pub mode: String,
    /// Defaults to `<data_dir>/printer_service.log` when unset.
    pub file_path: Option<PathBuf>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Printer {
    pub test_page_text: String,
    pub logo_max_width: u32,
    pub logo_threshold: u8,
    /// Reject `/select-printer` names the backend does not list.
    pub validate_selection: bool,
}

impl Default for Http {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8000,
            max_body_bytes: 64 * 1024 * 1024,
        }
    }
}

impl Default for Service {
    fn default() -> Self {
        Self {
            name: "PrintAgentService".into(),
            display_name: "Print Agent".into(),
            description: "Local HTTP print agent for receipt printers".into(),
            recovery: Recovery::default(),
        }
    }
}

impl Default for Recovery {
    fn default() -> Self {
        Self {
            restart_delays_ms: vec![5000, 5000, 5000],
            reset_after_secs: 30,
        }
    }
}

impl Default for Storage {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

impl Default for Output {
    fn default() -> Self {
        Self {
            mode: "file".into(),
            file_path: None,
        }
    }
}

impl Default for Printer {
    fn default() -> Self {
        Self {
            test_page_text: "Success\n".into(),
            logo_max_width: 384,
            logo_threshold: 190,
            validate_selection: true,
        }
    }
}

impl AgentConfig {
    pub fn selection_file(&self) -> PathBuf {
        self.storage.data_dir.join(SELECTION_FILE_NAME)
    }

    pub fn log_file(&self) -> PathBuf {
        self.output
            .file_path
            .clone()
            .unwrap_or_else(|| self.storage.data_dir.join(LOG_FILE_NAME))
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.http.host, self.http.port)
    }
}

/// ProgramData on Windows so the selection survives reboots and is shared
/// by the service account; the per-user data dir elsewhere.
pub fn default_data_dir() -> PathBuf {
    if cfg!(windows) {
        let base = env::var("PROGRAMDATA").unwrap_or_else(|_| r"C:\ProgramData".into());
        return PathBuf::from(base).join(APP_DIR_NAME);
    }
    BaseDirs::new()
        .map(|d| d.data_dir().join(APP_DIR_NAME))
        .unwrap_or_else(|| PathBuf::from("./data").join(APP_DIR_NAME))
}

pub fn load_config_with_precedence(cli: Option<&PathBuf>) -> Result<AgentConfig> {
    let mut cfg = AgentConfig::default();
    let path = match cli {
        Some(p) => Some(p.clone()),
        None => env::var("PRINT_AGENT_CONFIG").ok().map(PathBuf::from),
    };
    if let Some(p) = path {
        if p.exists() {
            let s = fs::read_to_string(&p)
                .with_context(|| format!("reading config file {}", p.display()))?;
            let f = parse_config(&s)?;
            cfg = merge_config(&cfg, &f);
        }
    }
    apply_env_overrides(&mut cfg, |k| env::var(k).ok());
    Ok(cfg)
}

pub fn parse_config(s: &str) -> Result<AgentConfig> {
    toml::from_str(s).context("parsing config TOML")
}

pub fn apply_env_overrides(cfg: &mut AgentConfig, var: impl Fn(&str) -> Option<String>) {
    if let Some(v) = var("PRINT_AGENT_PORT") {
        if let Ok(n) = v.parse::<u16>() {
            cfg.http.port = n;
        }
    }
    if let Some(v) = var("PRINT_AGENT_HOST") {
        if !v.is_empty() {
            cfg.http.host = v;
        }
    }
    if let Some(v) = var("PRINT_AGENT_DATA_DIR") {
        if !v.is_empty() {
            cfg.storage.data_dir = v.into();
        }
    }
}

pub fn merge_config(a: &AgentConfig, b: &AgentConfig) -> AgentConfig {
    let mut out = a.clone();
    out.http = b.http.clone();
    out.service = b.service.clone();
    out.storage = b.storage.clone();
    out.output = b.output.clone();
    out.printer = b.printer.clone();
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{collections::HashMap, sync::Mutex};

    // Tests that read the real process environment.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn partial_file_keeps_defaults() {
        let cfg = parse_config(
            r#"
            [http]
            port = 9100

            [service.recovery]
            restart_delays_ms = [1000, 2000]
            "#,
        )
        .unwrap();
        assert_eq!(cfg.http.port, 9100);
        assert_eq!(cfg.http.host, "0.0.0.0");
        assert_eq!(cfg.service.name, "PrintAgentService");
        assert_eq!(cfg.service.recovery.restart_delays_ms, vec![1000, 2000]);
        assert_eq!(cfg.service.recovery.reset_after_secs, 30);
        assert_eq!(cfg.printer.logo_max_width, 384);
    }

    #[test]
    fn shipped_example_config_parses() {
        let cfg = parse_config(include_str!("../../configs/print-agent.toml")).unwrap();
        assert_eq!(cfg.service.recovery, Recovery::default());
        assert_eq!(cfg.printer, Printer::default());
    }

    #[test]
    fn invalid_toml_is_an_error() {
        assert!(parse_config("[http\nport = ").is_err());
    }

    #[test]
    fn env_overrides_apply_and_ignore_garbage() {
        let vars: HashMap<&str, &str> = [
            ("PRINT_AGENT_PORT", "not-a-port"),
            ("PRINT_AGENT_HOST", "127.0.0.1"),
            ("PRINT_AGENT_DATA_DIR", "/tmp/pa"),
        ]
        .into_iter()
        .collect();
        let mut cfg = AgentConfig::default();
        apply_env_overrides(&mut cfg, |k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(cfg.http.port, 8000);
        assert_eq!(cfg.http.host, "127.0.0.1");
        assert_eq!(cfg.storage.data_dir, PathBuf::from("/tmp/pa"));
        assert_eq!(cfg.selection_file(), PathBuf::from("/tmp/pa").join(SELECTION_FILE_NAME));
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let _env = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        let cfg = load_config_with_precedence(Some(&missing)).unwrap();
        assert_eq!(cfg.service.recovery, Recovery::default());
    }

    #[test]
    fn config_env_var_loads_file_and_cli_path_wins() {
        let _env = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let dir = tempfile::tempdir().unwrap();
        let from_env = dir.path().join("env.toml");
        let from_cli = dir.path().join("cli.toml");
        fs::write(&from_env, "[http]\nport = 9101\n").unwrap();
        fs::write(&from_cli, "[http]\nport = 9102\nmax_body_bytes = 1024\n").unwrap();

        env::set_var("PRINT_AGENT_CONFIG", &from_env);
        let via_env = load_config_with_precedence(None);
        let via_cli = load_config_with_precedence(Some(&from_cli));
        env::remove_var("PRINT_AGENT_CONFIG");

        let via_env = via_env.unwrap();
        assert_eq!(via_env.http.port, 9101);
        assert_eq!(via_env.http.max_body_bytes, Http::default().max_body_bytes);
        let via_cli = via_cli.unwrap();
        assert_eq!(via_cli.http.port, 9102);
        assert_eq!(via_cli.http.max_body_bytes, 1024);
    }

    #[test]
    fn log_file_defaults_into_data_dir() {
        let mut cfg = AgentConfig::default();
        cfg.storage.data_dir = "/var/pa".into();
        assert_eq!(cfg.log_file(), PathBuf::from("/var/pa").join(LOG_FILE_NAME));
        cfg.output.file_path = Some("/elsewhere/agent.log".into());
        assert_eq!(cfg.log_file(), PathBuf::from("/elsewhere/agent.log"));
    }
}
