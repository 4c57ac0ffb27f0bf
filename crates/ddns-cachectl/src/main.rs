// # ddns-cachectl - DDNS cache inspector
//
// Thin command-line layer over ddns-cache. All store logic lives in the
// library; this binary only parses arguments, prints results and maps
// errors to exit codes.
//
// ## Configuration
//
// Every option can also be set through the environment:
//
// - `DDNS_CACHE_ROOT` / `--root`: Cache root directory (default: /tmp/dns.Cache)
// - `DDNS_CACHE_NOTIFY_CAPACITY` / `--notify-capacity`: Event channel capacity for `watch`
// - `DDNS_CACHE_STALE_AFTER_SECS` / `--stale-after-secs`: Cache expiry used by `status`
// - `DDNS_CACHE_LOG_LEVEL` / `--log-level`: trace, debug, info, warn or error (default: warn)
//
// ## Commands
//
// ```text
// ddns-cachectl list   [SECTION]...
// ddns-cachectl get    <ID> [SECTION]...
// ddns-cachectl put    <ID> <JSON> [SECTION]...
// ddns-cachectl rm     <ID> [SECTION]...
// ddns-cachectl clean  <SECTION>...
// ddns-cachectl watch  [SECTION]...
// ddns-cachectl status <DOMAIN> <SUBDOMAIN> [CONFIG_FILE]
// ```
//
// ## Example
//
// ```bash
// export DDNS_CACHE_ROOT=/var/cache/ddns
// ddns-cachectl put A-home '{"value":"1.2.3.4"}' example.com www
// ddns-cachectl list example.com www
// ```

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use ddns_cache::{DnsCache, Store, StoreConfig};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{Level, debug, error};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Exit codes for different termination scenarios
#[derive(Debug, Clone, Copy)]
enum CtlExitCode {
    /// Command completed
    Success = 0,
    /// Configuration or usage error
    ConfigError = 1,
    /// Command failed
    RuntimeError = 2,
}

impl From<CtlExitCode> for ExitCode {
    fn from(code: CtlExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Inspect and edit the DDNS record cache
///
/// Section paths are given outermost first, e.g. `example.com www`.
#[derive(Parser, Debug)]
#[command(name = "ddns-cachectl")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Cache root directory
    #[arg(long, env = "DDNS_CACHE_ROOT", global = true)]
    root: Option<PathBuf>,

    /// Event channel capacity for `watch`
    #[arg(long, env = "DDNS_CACHE_NOTIFY_CAPACITY", global = true)]
    notify_capacity: Option<usize>,

    /// Seconds after which a refresh stamp expires (0: never)
    #[arg(long, env = "DDNS_CACHE_STALE_AFTER_SECS", global = true)]
    stale_after_secs: Option<u64>,

    /// Log verbosity
    #[arg(
        long,
        env = "DDNS_CACHE_LOG_LEVEL",
        value_enum,
        default_value_t = LogLevel::Warn,
        ignore_case = true,
        global = true
    )]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

impl Cli {
    /// Store configuration with command-line and environment overrides
    fn store_config(&self) -> StoreConfig {
        let mut config = match &self.root {
            Some(root) => StoreConfig::new(root),
            None => StoreConfig::default(),
        };
        if let Some(capacity) = self.notify_capacity {
            config = config.with_notify_capacity(capacity);
        }
        if let Some(secs) = self.stale_after_secs {
            config = config.with_stale_after_secs(secs);
        }
        config
    }
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
enum Command {
    /// List items and subsections of a section
    #[command(visible_alias = "ls")]
    List {
        /// Section path
        section: Vec<String>,
    },

    /// Print an item as JSON
    Get {
        /// Item id
        id: String,
        /// Section path
        section: Vec<String>,
    },

    /// Store a JSON value as an item
    Put {
        /// Item id
        id: String,
        /// JSON value
        json: String,
        /// Section path
        section: Vec<String>,
    },

    /// Remove an item
    #[command(visible_alias = "remove")]
    Rm {
        /// Item id
        id: String,
        /// Section path
        section: Vec<String>,
    },

    /// Remove a section with everything beneath it
    Clean {
        /// Section path; the cache root itself cannot be cleaned from here
        #[arg(required = true)]
        section: Vec<String>,
    },

    /// Print changes to a section until interrupted
    Watch {
        /// Section path
        section: Vec<String>,
    },

    /// Show whether a subdomain's cached records need a refresh
    Status {
        domain: String,
        subdomain: String,
        /// Configuration file whose modification invalidates the cache
        config_file: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // --help and --version are not errors
            let code = if e.use_stderr() {
                CtlExitCode::ConfigError
            } else {
                CtlExitCode::Success
            };
            let _ = e.print();
            return code.into();
        }
    };

    let config = cli.store_config();
    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {}", e);
        return CtlExitCode::ConfigError.into();
    }

    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::from(cli.log_level))
        .with_writer(std::io::stderr)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return CtlExitCode::ConfigError.into();
    }

    debug!("Cache root: {}", config.root.display());

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return CtlExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        if let Err(e) = run(config, cli.command).await {
            error!("Command failed: {:#}", e);
            eprintln!("error: {:#}", e);
            CtlExitCode::RuntimeError
        } else {
            CtlExitCode::Success
        }
    });

    result.into()
}

/// Execute one command
async fn run(config: StoreConfig, command: Command) -> Result<()> {
    let store = Store::from_config(&config)?;

    match command {
        Command::List { section } => {
            for record in store.list(section.as_slice()).await? {
                let marker = if record.is_subsection() { "/" } else { "" };
                println!("{}{}", record.name(), marker);
            }
        }
        Command::Get { id, section } => {
            let value: serde_json::Value = store.get(&id, section.as_slice()).await?;
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        Command::Put { id, json, section } => {
            let value: serde_json::Value =
                serde_json::from_str(&json).context("value is not valid JSON")?;
            store.put(&value, &id, section.as_slice()).await?;
        }
        Command::Rm { id, section } => {
            store.remove_item(&id, section.as_slice()).await?;
        }
        Command::Clean { section } => {
            ensure_below_root(&store, &section)?;
            store.clean(section.as_slice()).await?;
        }
        Command::Watch { section } => watch(&store, section.as_slice()).await?,
        Command::Status {
            domain,
            subdomain,
            config_file,
        } => {
            let cache = DnsCache::from_config(&config)?;
            status(&cache, &domain, &subdomain, config_file).await?;
        }
    }

    Ok(())
}

/// Refuse section paths that resolve to the cache root
fn ensure_below_root(store: &Store, section: &[String]) -> Result<()> {
    let location = store.dir_location(section)?;
    if location == store.root() {
        anyhow::bail!("refusing to clean the cache root {}", location.display());
    }
    Ok(())
}

/// Print section events until a shutdown signal arrives
async fn watch(store: &Store, section: &[String]) -> Result<()> {
    let mut notifier = store.section(section).notifier();
    let mut events = ReceiverStream::new(notifier.start().await?);
    eprintln!(
        "Watching {} (Ctrl-C to stop)",
        notifier.section().location()?.display()
    );

    let shutdown = wait_for_shutdown();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            event = events.next() => match event {
                Some(event) => {
                    let marker = if event.record.is_subsection() { "/" } else { "" };
                    println!("{} {}{}", event.kind, event.record.name(), marker);
                }
                None => break,
            },
            signal = &mut shutdown => {
                debug!("Received {}", signal?);
                break;
            }
        }
    }

    notifier.stop()?;
    Ok(())
}

/// Print refresh state of one subdomain
async fn status(
    cache: &DnsCache,
    domain: &str,
    subdomain: &str,
    config_file: Option<PathBuf>,
) -> Result<()> {
    let config_modified = match config_file {
        Some(path) => ddns_cache::cache::modified_at(&path)
            .await
            .with_context(|| format!("cannot stat configuration file {}", path.display()))?,
        None => DateTime::<Utc>::UNIX_EPOCH,
    };

    match cache.last_refresh().await? {
        Some(stamp) => println!("last refresh: {}", stamp.to_rfc3339()),
        None => println!("last refresh: never"),
    }
    println!(
        "cached records: {}",
        cache.snapshots(domain, subdomain).await?.len()
    );
    println!(
        "needs refresh: {}",
        cache.needs_refresh(domain, subdomain, config_modified).await?
    );
    Ok(())
}

/// Wait for SIGTERM or SIGINT
#[cfg(unix)]
async fn wait_for_shutdown() -> Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

/// Wait for CTRL-C
#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to wait for CTRL-C: {}", e))?;
    Ok("SIGINT")
}
