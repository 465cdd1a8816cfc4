// src/config.rs

use anyhow::{bail, Result};
use clap::Parser;
use secrecy::SecretString;
use std::net::{IpAddr, SocketAddr};

use crate::files::DEFAULT_FOLDER_ID;
use crate::gateway::HeaderPolicy;

/// Command-line flags, each with an environment fallback.
#[derive(Parser, Debug)]
#[command(name = "sheetbridge", version, about = "JSON gateway over a spreadsheet and a file store")]
pub struct Args {
    /// Address to listen on
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: IpAddr,

    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = 10000)]
    pub port: u16,

    /// Default tracing filter when RUST_LOG is unset
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Spreadsheet holding every table
    #[arg(long, env = "SPREADSHEET_ID")]
    pub spreadsheet_id: Option<String>,

    /// Shared secret for mutating routes
    #[arg(long, env = "INVENTORY_WRITE_KEY", hide_env_values = true)]
    pub write_key: String,

    /// Bearer token for the Google APIs
    #[arg(long, env = "GOOGLE_ACCESS_TOKEN", hide_env_values = true)]
    pub access_token: Option<String>,

    /// Upload folder used when no keyword matches
    #[arg(long, env = "DEFAULT_FOLDER_ID", default_value = DEFAULT_FOLDER_ID)]
    pub default_folder_id: String,

    /// How a grown header replaces row 1
    #[arg(long, env = "HEADER_POLICY", value_enum, default_value_t = HeaderPolicy::DeleteInsert)]
    pub header_policy: HeaderPolicy,

    /// Serialize header-mutating writes per table within this process
    #[arg(long, env = "SERIALIZE_APPENDS", default_value_t = true, action = clap::ArgAction::Set)]
    pub serialize_appends: bool,

    /// Table used by /sheet/write_passthrough_log
    #[arg(long, default_value = "3.3_Test_Sandbox")]
    pub sandbox_sheet: String,

    /// Table used by /log
    #[arg(long, default_value = "4.5_Log_Index")]
    pub log_sheet: String,

    /// Table used by /integration/log
    #[arg(long, default_value = "1.2_Integration_Log")]
    pub integration_log_sheet: String,

    /// Largest accepted multipart upload, in bytes
    #[arg(long, env = "MAX_UPLOAD_BYTES", default_value_t = 25 * 1024 * 1024)]
    pub max_upload_bytes: u64,

    /// Serve from in-process stores instead of Google
    #[arg(long)]
    pub in_memory: bool,
}

/// Where the service keeps its tables and files.
pub enum Backend {
    Google {
        spreadsheet_id: String,
        access_token: SecretString,
    },
    InMemory,
}

/// Fixed tables behind the logging routes.
#[derive(Debug, Clone)]
pub struct FixedTables {
    pub sandbox: String,
    pub log: String,
    pub integration_log: String,
}

impl Default for FixedTables {
    fn default() -> Self {
        Self {
            sandbox: "3.3_Test_Sandbox".into(),
            log: "4.5_Log_Index".into(),
            integration_log: "1.2_Integration_Log".into(),
        }
    }
}

/// Validated process configuration.
pub struct Config {
    pub listen: SocketAddr,
    pub log_level: String,
    pub backend: Backend,
    pub write_key: SecretString,
    pub default_folder_id: String,
    pub header_policy: HeaderPolicy,
    pub serialize_appends: bool,
    pub tables: FixedTables,
    pub max_upload_bytes: u64,
}

impl Config {
    pub fn from_args(args: Args) -> Result<Self> {
        if args.write_key.trim().is_empty() {
            bail!("INVENTORY_WRITE_KEY must not be empty");
        }

        let backend = if args.in_memory {
            Backend::InMemory
        } else {
            let Some(spreadsheet_id) = args.spreadsheet_id.filter(|s| !s.trim().is_empty()) else {
                bail!("SPREADSHEET_ID is required unless --in-memory is set");
            };
            let Some(token) = args.access_token.filter(|s| !s.trim().is_empty()) else {
                bail!("GOOGLE_ACCESS_TOKEN is required unless --in-memory is set");
            };
            Backend::Google {
                spreadsheet_id,
                access_token: secret(token),
            }
        };

        Ok(Self {
            listen: SocketAddr::new(args.host, args.port),
            log_level: args.log_level,
            backend,
            write_key: secret(args.write_key),
            default_folder_id: args.default_folder_id,
            header_policy: args.header_policy,
            serialize_appends: args.serialize_appends,
            tables: FixedTables {
                sandbox: args.sandbox_sheet,
                log: args.log_sheet,
                integration_log: args.integration_log_sheet,
            },
            max_upload_bytes: args.max_upload_bytes,
        })
    }
}

pub(crate) fn secret(value: String) -> SecretString {
    SecretString::new(value.into_boxed_str())
}
