// CLI module for redactgate

use crate::config::AppConfig;
use clap::Parser;
use std::path::PathBuf;

/// redactgate - response cache and rate limiting edge for the redaction API
#[derive(Parser, Debug)]
#[command(name = "redactgate", version, about, long_about = None)]
pub struct Args {
    /// Configuration file (defaults to ~/.redactgate/config.toml when present)
    #[arg(long, short = 'c', env = "REDACTGATE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Override server.host
    #[arg(long)]
    pub host: Option<String>,

    /// Override server.port
    #[arg(long, short = 'p')]
    pub port: Option<u16>,

    /// Print the effective configuration as TOML and exit
    #[arg(long)]
    pub print_config: bool,
}

impl Args {
    /// Command-line flags win over every other configuration source.
    pub fn apply(&self, config: &mut AppConfig) {
        if let Some(host) = &self.host {
            config.server.host = host.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_config() {
        let args = Args::parse_from(["redactgate", "--host", "0.0.0.0", "--port", "9000"]);
        let mut config = AppConfig::default();
        args.apply(&mut config);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 9000);
        assert!(!args.print_config);
    }

    #[test]
    fn test_no_flags_keep_config() {
        let args = Args::parse_from(["redactgate", "--print-config"]);
        let mut config = AppConfig::default();
        args.apply(&mut config);
        assert_eq!(config.server.port, AppConfig::default().server.port);
        assert!(args.print_config);
    }
}
