use clap::Parser;
use kor::cluster::{CancelFlag, KubeClusterApi, ResourceKind};
use kor::config::Config;
use kor::filters::FilterOptions;
use kor::notify::SlackTarget;
use kor::report::ReportFormat;
use kor::scan::{publish, Opts, Scanner};
use kor::GroupBy;
use miette::{miette, IntoDiagnostic, Result, WrapErr};
use std::path::PathBuf;
use tracing::{debug, info};

/// kor - discover unused Kubernetes resources
#[derive(Parser, Debug)]
#[command(name = "kor")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Kinds to audit: `all`, or a comma-separated list (cm, secret, svc,
    /// sa, deploy, sts, ds, job, argorollouts, pvc, pv, sc, netpol, pdb)
    resources: String,

    /// Path to the kubeconfig file
    #[arg(long, value_name = "FILE")]
    kubeconfig: Option<PathBuf>,

    /// Kubeconfig context to use
    #[arg(long)]
    context: Option<String>,

    /// Only scan these namespaces (comma-separated)
    #[arg(short = 'n', long, value_delimiter = ',')]
    include_namespaces: Vec<String>,

    /// Skip these namespaces (comma-separated)
    #[arg(short = 'e', long, value_delimiter = ',')]
    exclude_namespaces: Vec<String>,

    /// Only audit objects matching this label selector
    #[arg(short = 'l', long)]
    include_labels: Option<String>,

    /// Skip objects matching any of these selector terms, comma-separated
    /// (`key=value`, `key`, `key in (a,b)`)
    #[arg(long)]
    exclude_labels: Vec<String>,

    /// Skip objects carrying any of these annotations (`key=value` or `key`)
    #[arg(long, value_delimiter = ',')]
    exclude_annotations: Vec<String>,

    /// Only audit objects newer than this age (e.g. 30m, 6h, 7d)
    #[arg(long, value_name = "AGE")]
    newer_than: Option<String>,

    /// Only audit objects older than this age (e.g. 30m, 6h, 7d)
    #[arg(long, value_name = "AGE")]
    older_than: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    output: OutputFormat,

    /// Delete unused resources
    #[arg(long)]
    delete: bool,

    /// Delete without confirming each resource
    #[arg(long, requires = "delete")]
    no_interactive: bool,

    /// Group results by namespace or by resource kind
    #[arg(long, value_enum, default_value = "namespace")]
    group_by: GroupByArg,

    /// Show why each resource is considered unused
    #[arg(long)]
    show_reason: bool,

    /// Path to the exception configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Do not merge the built-in exceptions into the configuration
    #[arg(long)]
    no_builtin_exceptions: bool,

    /// Slack incoming webhook URL
    #[arg(long, env = "KOR_SLACK_WEBHOOK_URL", hide_env_values = true)]
    slack_webhook_url: Option<String>,

    /// Slack channel for chat.postMessage
    #[arg(long)]
    slack_channel: Option<String>,

    /// Slack bot token for chat.postMessage
    #[arg(long, env = "KOR_SLACK_AUTH_TOKEN", hide_env_values = true)]
    slack_auth_token: Option<String>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Quiet mode - only output results
    #[arg(short, long)]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, Default)]
enum OutputFormat {
    #[default]
    Table,
    Json,
    Yaml,
}

impl From<OutputFormat> for ReportFormat {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Table => ReportFormat::Table,
            OutputFormat::Json => ReportFormat::Json,
            OutputFormat::Yaml => ReportFormat::Yaml,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, Default)]
enum GroupByArg {
    #[default]
    Namespace,
    Resource,
}

impl From<GroupByArg> for GroupBy {
    fn from(group_by: GroupByArg) -> Self {
        match group_by {
            GroupByArg::Namespace => GroupBy::Namespace,
            GroupByArg::Resource => GroupBy::Resource,
        }
    }
}

impl Cli {
    fn filter_options(&self) -> FilterOptions {
        FilterOptions {
            include_labels: self.include_labels.clone(),
            exclude_labels: self.exclude_labels.clone(),
            exclude_annotations: self.exclude_annotations.clone(),
            newer_than: self.newer_than.clone(),
            older_than: self.older_than.clone(),
            include_namespaces: self.include_namespaces.clone(),
            exclude_namespaces: self.exclude_namespaces.clone(),
        }
    }

    fn opts(&self) -> Opts {
        Opts {
            delete: self.delete,
            no_interactive: self.no_interactive,
            group_by: self.group_by.into(),
            show_reason: self.show_reason,
            format: self.output.into(),
            slack: SlackTarget::from_flags(
                self.slack_webhook_url.as_deref(),
                self.slack_channel.as_deref(),
                self.slack_auth_token.as_deref(),
            ),
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose, cli.quiet);

    info!("kor v{}", env!("CARGO_PKG_VERSION"));

    let kinds = ResourceKind::parse_list(&cli.resources).map_err(|e| miette!("{}", e))?;
    debug!(?kinds, "Resolved resource kinds");

    let config = load_config(&cli)?;
    let opts = cli.opts();

    let cancel = CancelFlag::new();
    let api = KubeClusterApi::connect(
        cli.kubeconfig.as_deref(),
        cli.context.as_deref(),
        cancel.clone(),
    )
    .into_diagnostic()
    .wrap_err("Failed to connect to the cluster")?;

    let mut scanner = Scanner::new(&api, cli.filter_options(), &config, opts.clone())
        .into_diagnostic()?
        .with_cancel(cancel)
        .with_progress(!cli.quiet);

    let report = scanner.scan(&kinds).into_diagnostic()?;

    publish(&report, &opts)
}

fn init_logging(verbose: bool, quiet: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// User exceptions from `--config` or the working directory, merged with
/// the built-ins unless disabled
fn load_config(cli: &Cli) -> Result<Config> {
    let user = if let Some(config_path) = &cli.config {
        Config::from_file(config_path)
            .into_diagnostic()
            .wrap_err("Failed to load exception configuration")?
    } else {
        let cwd = std::env::current_dir().into_diagnostic()?;
        Config::from_default_locations(&cwd)
            .into_diagnostic()
            .wrap_err("Failed to load exception configuration")?
    };

    if cli.no_builtin_exceptions {
        Ok(user)
    } else {
        Ok(Config::builtin().merge(user))
    }
}
