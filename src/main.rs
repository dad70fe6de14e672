//! `zimshelf` command-line entry point.

use clap::Parser;
use exn::ResultExt;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use zimshelf_cache::{Database, Repository};
use zimshelf_config::{Config, Overrides};
use zimshelf_library::error::{ErrorKind, Result};
use zimshelf_library::{Actions, Maintainer};

/// Reconciles a tree of ZIM archives with its published catalog.
#[derive(Debug, Parser)]
#[command(name = "zimshelf", version, about)]
struct Cli {
    /// Actions to run: read, retain, redirects, catalogs, purge or all
    /// (comma-separated accepted).
    #[arg(value_name = "ACTION", default_value = "all")]
    actions: Vec<String>,
    /// Configuration file (TOML, YAML or JSON).
    #[arg(long, short = 'c', env = "ZIMSHELF_CONFIG")]
    config: Option<PathBuf>,
    /// Root of the archive tree.
    #[arg(long)]
    zim_root: Option<PathBuf>,
    /// Also consider hidden files and directories.
    #[arg(long)]
    with_hidden: bool,
    /// Scan, read and validate everything without changing anything.
    #[arg(long)]
    dry_run: bool,
    /// Default log level; `RUST_LOG` takes precedence.
    #[arg(long)]
    log_level: Option<String>,
}
impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            zim_root: self.zim_root.clone(),
            include_hidden: self.with_hidden.then_some(true),
            log_level: self.log_level.clone(),
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let actions = match Actions::parse(&cli.actions) {
        Ok(actions) => actions,
        Err(e) => {
            eprintln!("{e:?}");
            return ExitCode::FAILURE;
        },
    };
    let config = match Config::load(cli.config.as_deref(), &cli.overrides()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e:?}");
            return ExitCode::FAILURE;
        },
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)))
        .init();

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("could not start runtime: {e}");
            return ExitCode::FAILURE;
        },
    };
    match runtime.block_on(run(config, &actions, cli.dry_run)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e:?}");
            ExitCode::FAILURE
        },
    }
}

async fn run(config: Config, actions: &Actions, dry_run: bool) -> Result<()> {
    tracing::info!(%actions, dry_run, zim_root = %config.zim_root.display(), "Starting");
    let database = match &config.cache.path {
        Some(path) => Database::connect(path).await,
        None => Database::connect_in_memory().await,
    }
    .or_raise(|| ErrorKind::Setup("metadata cache"))?;
    let cache = Repository::new(database.pool().clone(), dry_run);
    let maintainer = Maintainer::connect(config, cache, dry_run).await?;
    let outcome = maintainer.run(actions).await;
    maintainer.close().await;
    database.close().await;
    let report = outcome?;
    tracing::info!(
        archives = report.archives,
        aliases = report.aliases,
        not_ready = report.not_ready,
        metadata_read = report.metadata.read,
        metadata_cached = report.metadata.cached,
        "Done"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(&["zimshelf"], &["all"])]
    #[case(&["zimshelf", "read,catalogs"], &["read,catalogs"])]
    #[case(&["zimshelf", "retain", "purge", "--dry-run"], &["retain", "purge"])]
    fn test_actions(#[case] args: &[&str], #[case] expected: &[&str]) {
        let cli = Cli::try_parse_from(args).unwrap();
        assert_eq!(cli.actions, expected);
        assert!(Actions::parse(&cli.actions).is_ok());
    }

    #[test]
    fn test_overrides() {
        let cli = Cli::try_parse_from(["zimshelf", "--zim-root", "/srv/zim", "--with-hidden", "--log-level", "debug"]).unwrap();
        let overrides = cli.overrides();
        assert_eq!(overrides.zim_root, Some(PathBuf::from("/srv/zim")));
        assert_eq!(overrides.include_hidden, Some(true));
        assert_eq!(overrides.log_level.as_deref(), Some("debug"));
        assert_eq!(Cli::try_parse_from(["zimshelf"]).unwrap().overrides().include_hidden, None);
    }
}
