use crate::model::ModuleId;
use anyhow::{Context, Result};
use clap::Parser;
use serde::Deserialize;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;

const DEFAULT_HTTP_BIND: &str = "127.0.0.1:8042";
const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 30;
const DEFAULT_MAX_PAGE_LIMIT: usize = 1000;
const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 45;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub http_bind_address: SocketAddr,
    pub command_timeout_secs: u64,
    /// Hard ceiling on `limit`; larger requests are clamped, not rejected.
    pub max_page_limit: usize,
    /// Server-wide default for the downgrade override; a request-level
    /// `allow_downgrades` query parameter wins over this.
    pub allow_downgrades: bool,
    /// Modules whose GETs are open data: readable without an access token.
    pub open_modules: Vec<ModuleId>,
    /// Access-binding provisioning file (YAML or JSON).
    pub tokens_file: Option<PathBuf>,
    pub graceful_shutdown_timeout_secs: u64,
}

impl ServerConfig {
    pub fn from_args(args: CliArgs) -> Result<Self> {
        let CliArgs {
            config,
            http_bind: cli_http_bind,
            command_timeout_secs: cli_command_timeout,
            max_page_limit: cli_max_page_limit,
            allow_downgrades: cli_allow_downgrades,
            open_modules: cli_open_modules,
            tokens_file: cli_tokens_file,
            shutdown_timeout_secs: cli_shutdown_timeout,
        } = args;

        let file_config = if let Some(path) = config.as_ref() {
            load_config_file(path)?
        } else {
            PartialConfig::default()
        };

        let PartialConfig {
            http_bind: file_http_bind,
            command_timeout_secs: file_command_timeout,
            max_page_limit: file_max_page_limit,
            allow_downgrades: file_allow_downgrades,
            open_modules: file_open_modules,
            tokens_file: file_tokens_file,
            shutdown_timeout_secs: file_shutdown_timeout,
        } = file_config;

        let http_bind_address = cli_http_bind.or(file_http_bind).unwrap_or_else(|| {
            DEFAULT_HTTP_BIND
                .parse()
                .expect("default bind address valid")
        });

        let command_timeout_secs = cli_command_timeout
            .or(file_command_timeout)
            .unwrap_or(DEFAULT_COMMAND_TIMEOUT_SECS);
        anyhow::ensure!(
            command_timeout_secs >= 1,
            "command timeout must be at least one second"
        );

        let max_page_limit = cli_max_page_limit
            .or(file_max_page_limit)
            .unwrap_or(DEFAULT_MAX_PAGE_LIMIT)
            .max(1);

        let allow_downgrades = cli_allow_downgrades.or(file_allow_downgrades).unwrap_or(false);

        let open_modules = cli_open_modules
            .or(file_open_modules)
            .unwrap_or_default()
            .into_iter()
            .map(|raw| {
                let raw = raw.trim().to_ascii_lowercase();
                ModuleId::from_str(&raw)
                    .with_context(|| format!("unknown module in open_modules: {raw:?}"))
            })
            .collect::<Result<Vec<_>>>()?;

        let tokens_file = cli_tokens_file.or(file_tokens_file);
        if let Some(path) = tokens_file.as_ref() {
            anyhow::ensure!(
                path.exists(),
                "configured tokens file {:?} does not exist",
                path
            );
            anyhow::ensure!(
                path.is_file(),
                "configured tokens file {:?} is not a file",
                path
            );
        }

        let graceful_shutdown_timeout_secs = cli_shutdown_timeout
            .or(file_shutdown_timeout)
            .unwrap_or(DEFAULT_SHUTDOWN_TIMEOUT_SECS);

        Ok(Self {
            http_bind_address,
            command_timeout_secs,
            max_page_limit,
            allow_downgrades,
            open_modules,
            tokens_file,
            graceful_shutdown_timeout_secs,
        })
    }

    pub fn is_open_module(&self, module: ModuleId) -> bool {
        self.open_modules.contains(&module)
    }

    pub fn clamp_limit(&self, requested: Option<usize>) -> Option<usize> {
        requested.map(|limit| limit.min(self.max_page_limit))
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::from_args(CliArgs::default()).expect("default config valid")
    }
}

#[derive(Parser, Debug, Default, Clone)]
#[command(name = "ocpi-node", about = "OCPI party server", version)]
pub struct CliArgs {
    #[arg(
        long,
        value_name = "FILE",
        help = "Path to a configuration file (YAML or JSON)",
        global = true
    )]
    pub config: Option<PathBuf>,

    #[arg(
        long,
        env = "OCPI_NODE_HTTP_BIND",
        value_name = "ADDR",
        help = "HTTP bind address"
    )]
    pub http_bind: Option<SocketAddr>,

    #[arg(
        long,
        env = "OCPI_NODE_COMMAND_TIMEOUT",
        value_name = "SECS",
        help = "Seconds to wait for a command handler before answering TIMEOUT"
    )]
    pub command_timeout_secs: Option<u64>,

    #[arg(
        long,
        env = "OCPI_NODE_MAX_PAGE_LIMIT",
        value_name = "N",
        help = "Upper bound applied to the limit query parameter"
    )]
    pub max_page_limit: Option<usize>,

    #[arg(
        long,
        env = "OCPI_NODE_ALLOW_DOWNGRADES",
        value_name = "BOOL",
        help = "Accept writes with an older last_updated unless the request overrides"
    )]
    pub allow_downgrades: Option<bool>,

    #[arg(
        long,
        env = "OCPI_NODE_OPEN_MODULES",
        value_name = "MODULE",
        value_delimiter = ',',
        help = "Modules whose GET endpoints require no access token"
    )]
    pub open_modules: Option<Vec<String>>,

    #[arg(
        long,
        env = "OCPI_NODE_TOKENS_FILE",
        value_name = "FILE",
        help = "Access-binding provisioning file (YAML or JSON)"
    )]
    pub tokens_file: Option<PathBuf>,

    #[arg(
        long,
        env = "OCPI_NODE_SHUTDOWN_TIMEOUT",
        value_name = "SECS",
        help = "Total graceful shutdown budget"
    )]
    pub shutdown_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct PartialConfig {
    http_bind: Option<SocketAddr>,
    command_timeout_secs: Option<u64>,
    max_page_limit: Option<usize>,
    allow_downgrades: Option<bool>,
    open_modules: Option<Vec<String>>,
    tokens_file: Option<PathBuf>,
    shutdown_timeout_secs: Option<u64>,
}

fn load_config_file(path: &Path) -> Result<PartialConfig> {
    if !path.exists() {
        anyhow::bail!("config file {:?} does not exist", path);
    }
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {:?}", path))?;
    let ext = path
        .extension()
        .and_then(|os| os.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let parsed = match ext.as_str() {
        "yaml" | "yml" => serde_yaml::from_str(&contents)
            .with_context(|| format!("failed to parse YAML config {:?}", path))?,
        "json" => serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse JSON config {:?}", path))?,
        other => anyhow::bail!("unsupported config extension: {other}"),
    };
    Ok(parsed)
}
