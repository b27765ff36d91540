//! rbp-capture - command-line field client
//!
//! Captures reports, keeps them offline when the server is unreachable and
//! syncs them later.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use report_builder_pro::capture_app::config::ENV_TOKEN;
use report_builder_pro::capture_app::{
    ApiClient, CaptureController, CaptureForm, Config, ConnectivityMonitor, LocalDatabase,
    PassOutcome, ReachabilityProbe, ReportQueue, SyncService,
};
use report_builder_pro::shared::config::AppConfig;
use report_builder_pro::shared::template::TEST_TEMPLATE_ID;
use report_builder_pro::shared::{analyze_report_text, report_text, Template};

#[derive(Debug, Parser)]
#[command(name = "rbp-capture", version, about = "Report Builder Pro offline capture client")]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Report server URL, overrides config and RBP_API_URL
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Treat the server as unreachable: skip the health probe, queue captures
    /// and use only the built-in template
    #[arg(long, global = true)]
    offline: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Log in and print the session token
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// List available templates
    Templates,
    /// Capture a report
    Capture {
        /// Template id
        #[arg(long, default_value = "test-template")]
        template: String,
        /// Job or site id
        #[arg(long)]
        job: Option<String>,
        /// Field value as `[PAGE:]COMPONENT=VALUE`, repeatable
        #[arg(long = "field", value_name = "FIELD")]
        fields: Vec<String>,
    },
    /// List reports waiting in the offline queue
    Pending,
    /// Sync queued reports now
    Sync,
    /// Show connectivity and queue status
    Status,
    /// List reports on the server
    Reports,
    /// Scan text or a stored report for risks
    Scan {
        /// Server report id to scan
        #[arg(long, conflicts_with = "text")]
        report: Option<String>,
        /// Text to scan
        text: Vec<String>,
    },
    /// Probe the server and sync automatically on reconnect until Ctrl-C
    Watch,
}

struct App {
    config: Config,
    api: Arc<ApiClient>,
    db: Arc<LocalDatabase>,
    monitor: ConnectivityMonitor,
}

impl App {
    async fn open(cli: &Cli) -> Result<Self> {
        let mut builder = AppConfig::builder();
        if let Some(path) = &cli.config {
            let source = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            builder = builder.toml_str(&source)?;
        }
        builder = builder.apply_env()?;
        if let Some(url) = &cli.api_url {
            builder = builder.server_url(url.clone());
        }

        let mut config = Config::with_builder(builder)?;
        config.set_token(std::env::var(ENV_TOKEN).ok().filter(|t| !t.trim().is_empty()));

        let api = Arc::new(ApiClient::new(&config)?);
        let db = Arc::new(
            LocalDatabase::open_default(&config)
                .await
                .context("opening the offline queue")?,
        );

        let online = !cli.offline && api.is_reachable().await;
        tracing::info!(online, server = %config.server_url(), "Client ready");

        Ok(Self {
            config,
            api,
            db,
            monitor: ConnectivityMonitor::new(online),
        })
    }

    fn sync_service(&self) -> SyncService<LocalDatabase, ApiClient> {
        SyncService::from_config(
            Arc::clone(&self.db),
            Arc::clone(&self.api),
            self.monitor.clone(),
            self.config.app(),
        )
    }
}

/// Parse `[PAGE:]COMPONENT=VALUE`
fn parse_field(raw: &str) -> Result<(usize, &str, &str)> {
    let Some((target, value)) = raw.split_once('=') else {
        bail!("field '{}' must look like [PAGE:]COMPONENT=VALUE", raw);
    };
    match target.split_once(':') {
        Some((page, component)) => {
            let page = page
                .parse::<usize>()
                .with_context(|| format!("bad page number in '{}'", raw))?;
            Ok((page, component, value))
        }
        None => Ok((0, target, value)),
    }
}

/// Template for a new capture; offline only the built-in one is available
async fn capture_template(api: &ApiClient, online: bool, id: &str) -> Result<Template> {
    if online {
        return Ok(api.get_template(id).await?);
    }
    if id == TEST_TEMPLATE_ID {
        return Ok(Template::test_template());
    }
    bail!("template '{}' is not available offline, use '{}'", id, TEST_TEMPLATE_ID)
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(&env_filter))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let app = App::open(&cli).await?;

    match cli.command {
        Command::Login { email, password } => {
            let login = app.api.login(&email, &password).await?;
            println!("Logged in as {}", login.name.as_deref().unwrap_or(&login.email));
            println!("export {}={}", ENV_TOKEN, login.token);
        }

        Command::Templates => {
            let templates = if app.monitor.is_online() {
                app.api.templates_with_fallback().await
            } else {
                vec![Template::test_template()]
            };
            for template in templates {
                let components = template.components.len();
                println!("{}\t{}\t{} component(s)", template.id, template.title, components);
            }
        }

        Command::Capture { template, job, fields } => {
            let template = capture_template(&app.api, app.monitor.is_online(), &template).await?;
            let mut form = CaptureForm::new(template);
            if let Some(job) = job {
                form.set_job_id(job);
            }
            for raw in &fields {
                let (page, component, value) = parse_field(raw)?;
                while form.page_count() <= page {
                    form.add_page();
                }
                form.go_to_page(page);
                form.set_field(component, value)?;
            }

            let controller = CaptureController::new(
                Arc::clone(&app.db),
                Arc::clone(&app.api),
                app.monitor.clone(),
            );
            let outcome = controller.submit(&mut form).await?;
            println!("{}", outcome.message());
        }

        Command::Pending => {
            let pending = app.db.list_unsynced().await?;
            if pending.is_empty() {
                println!("No reports waiting to sync.");
            }
            for report in pending {
                println!(
                    "{}\t{}\t{}\t{} field(s)",
                    report.local_id,
                    report.template_id,
                    report.job_id.as_deref().unwrap_or("-"),
                    report.captured_data.len()
                );
            }
        }

        Command::Sync => match app.sync_service().sync_now().await? {
            PassOutcome::Completed(report) => {
                println!("{}", report.summary());
                for failure in &report.failures {
                    let hint = if failure.retryable {
                        ""
                    } else {
                        " (server refused, will not succeed as is)"
                    };
                    println!("  {}: {}{}", failure.local_id, failure.reason, hint);
                }
            }
            PassOutcome::Offline => println!("Offline. Reports will sync when you're back online."),
            PassOutcome::NothingPending => println!("Nothing to sync."),
            PassOutcome::AlreadySyncing => println!("A sync is already running."),
            PassOutcome::Throttled(left) => {
                println!("Synced recently, try again in {}s.", left.as_secs().max(1))
            }
        },

        Command::Status => {
            let status = app.sync_service().status().await?;
            let stats = app.db.get_stats().await?;
            println!("Server:   {}", app.config.server_url());
            println!("Online:   {}", if status.online { "yes" } else { "no" });
            println!("Pending:  {}", status.pending);
            println!("Stored:   {}", stats.total_reports);
            println!("Database: {}", app.config.database_path().display());
        }

        Command::Reports => {
            for report in app.api.list_reports().await? {
                println!(
                    "{}\t{}\t{}\t{}",
                    report.id,
                    report.template_id,
                    report.job_id.as_deref().unwrap_or("-"),
                    report.timestamp.as_deref().unwrap_or("-")
                );
            }
        }

        Command::Scan { report, text } => {
            let input = match report {
                Some(id) => report_text(&app.api.get_report(&id).await?.captured_data),
                None if !text.is_empty() => text.join(" "),
                None => bail!("give either --report ID or text to scan"),
            };
            let issues = analyze_report_text(&input);
            if issues.is_empty() {
                println!("No risks detected.");
            }
            for issue in issues {
                println!(
                    "#{} line {} [{} / {}] {}",
                    issue.id, issue.line, issue.category, issue.severity, issue.title
                );
            }
        }

        Command::Watch => {
            // Drains any backlog right away when already online.
            let mut service = app.sync_service();
            service.start();
            let interval = Duration::from_secs(app.config.app().probe_interval_secs);
            let probe = app.monitor.spawn_probe(Arc::clone(&app.api), interval);

            tokio::signal::ctrl_c().await?;
            probe.abort();
            service.stop();
            app.db.close().await;
        }
    }

    Ok(())
}
