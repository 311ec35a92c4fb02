//! CLI and runtime settings

use std::time::Duration;

use clap::{ArgAction, Parser, Subcommand, ValueEnum};

use elastic_config_connection::TransportOptions;

/// Elastic config operator - sync index, snapshot, and cluster settings to search clusters
#[derive(Parser, Debug)]
#[command(name = "elastic-config-operator", version, about, long_about = None)]
pub struct Cli {
    /// Print CRD manifests and exit
    #[arg(long)]
    pub crd: bool,

    /// Subcommand
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Operator subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the controllers (default mode)
    ///
    /// Watches every config kind and keeps its target cluster in sync.
    Run(RunArgs),
}

/// Log output format
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// One JSON object per line
    Json,
    /// Human-readable text
    Text,
}

/// Controller mode settings
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Records reconciled in parallel per kind
    #[arg(long, env = "ELASTIC_CONFIG_CONCURRENCY", default_value_t = 4)]
    pub concurrency: u16,

    /// Skip certificate verification when a cluster has no CA bundle
    ///
    /// When false, the system trust roots are used instead.
    #[arg(
        long,
        env = "ELASTIC_CONFIG_ALLOW_INSECURE_TLS",
        default_value_t = true,
        action = ArgAction::Set
    )]
    pub allow_insecure_tls: bool,

    /// Timeout for each request to a search cluster, in seconds
    #[arg(long, env = "ELASTIC_CONFIG_REQUEST_TIMEOUT_SECS", default_value_t = 10)]
    pub request_timeout_secs: u64,

    /// Log output format
    #[arg(long, env = "ELASTIC_CONFIG_LOG_FORMAT", value_enum, default_value = "json")]
    pub log_format: LogFormat,

    /// Install or update the CRDs on start-up
    #[arg(
        long,
        env = "ELASTIC_CONFIG_INSTALL_CRDS",
        default_value_t = true,
        action = ArgAction::Set
    )]
    pub install_crds: bool,

    /// Only watch records in this namespace
    #[arg(long, env = "ELASTIC_CONFIG_WATCH_NAMESPACE")]
    pub watch_namespace: Option<String>,
}

impl RunArgs {
    /// Settings for the default mode, read from the environment only
    pub fn from_env() -> Self {
        Self::parse_from(["elastic-config-operator"])
    }

    /// Options for connections to search clusters
    pub fn transport_options(&self) -> TransportOptions {
        TransportOptions {
            allow_insecure_tls: self.allow_insecure_tls,
            request_timeout: Duration::from_secs(self.request_timeout_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_args(args: &[&str]) -> RunArgs {
        let argv = ["elastic-config-operator", "run"].iter().chain(args);
        match Cli::try_parse_from(argv).unwrap().command {
            Some(Commands::Run(args)) => args,
            None => panic!("expected run subcommand"),
        }
    }

    #[test]
    fn defaults() {
        let args = run_args(&[]);
        assert_eq!(args.concurrency, 4);
        assert!(args.allow_insecure_tls);
        assert!(args.install_crds);
        assert_eq!(args.log_format, LogFormat::Json);
        assert_eq!(args.watch_namespace, None);
        assert_eq!(args.transport_options().request_timeout, Duration::from_secs(10));
    }

    #[test]
    fn explicit_values() {
        let args = run_args(&[
            "--concurrency",
            "8",
            "--allow-insecure-tls",
            "false",
            "--request-timeout-secs",
            "30",
            "--log-format",
            "text",
            "--install-crds",
            "false",
            "--watch-namespace",
            "search",
        ]);
        assert_eq!(args.concurrency, 8);
        assert!(!args.transport_options().allow_insecure_tls);
        assert_eq!(args.transport_options().request_timeout, Duration::from_secs(30));
        assert_eq!(args.log_format, LogFormat::Text);
        assert!(!args.install_crds);
        assert_eq!(args.watch_namespace.as_deref(), Some("search"));
    }

    #[test]
    fn crd_flag_without_subcommand() {
        let cli = Cli::try_parse_from(["elastic-config-operator", "--crd"]).unwrap();
        assert!(cli.crd);
        assert!(cli.command.is_none());
    }

    #[test]
    fn rejects_unknown_log_format() {
        assert!(Cli::try_parse_from(["elastic-config-operator", "run", "--log-format", "xml"]).is_err());
    }
}
