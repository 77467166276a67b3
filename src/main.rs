use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

use apm::{commands, config::Config, runtime::RealRuntime};

/// apm - add-on package manager
///
/// Tracks plugin and script packages under a host installation, tells
/// manager-installed packages apart from files placed by hand, and installs
/// or removes packages from already extracted directories.
///
/// Examples:
///   apm --catalog packages.xml list
///   apm --catalog packages.xml install rikky/lsmash --from ./lsmash
#[derive(Parser, Debug)]
#[command(author, version = env!("APM_VERSION"), about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Installation root of the host (also via APM_ROOT; defaults to the config file or the current directory)
    #[arg(
        long = "root",
        short = 'r',
        env = "APM_ROOT",
        value_name = "PATH",
        global = true
    )]
    pub install_root: Option<PathBuf>,

    /// Package list to load; may be repeated (also via APM_CATALOGS, comma separated)
    #[arg(
        long = "catalog",
        short = 'c',
        env = "APM_CATALOGS",
        value_name = "PATH",
        value_delimiter = ',',
        global = true
    )]
    pub catalogs: Vec<PathBuf>,

    /// Show debug logging
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// List packages and their installation status
    List,

    /// Show details of a package
    Show(ShowArgs),

    /// List add-on files not installed through apm
    Manual,

    /// Install a package from an extracted directory
    Install(InstallArgs),

    /// Remove an installed package
    Uninstall(UninstallArgs),
}

#[derive(clap::Args, Debug)]
pub struct ShowArgs {
    /// Package id
    #[arg(value_name = "ID")]
    pub id: String,

    /// Repository the package comes from, when several provide it
    #[arg(long = "repo", value_name = "SOURCE")]
    pub repository: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct InstallArgs {
    /// Package id
    #[arg(value_name = "ID")]
    pub id: String,

    /// Directory holding the extracted package
    #[arg(long = "from", value_name = "DIR")]
    pub from: PathBuf,

    /// Repository the package comes from, when several provide it
    #[arg(long = "repo", value_name = "SOURCE")]
    pub repository: Option<String>,

    /// Copy the whole directory into the root instead of the listed files
    #[arg(long)]
    pub program: bool,
}

#[derive(clap::Args, Debug)]
pub struct UninstallArgs {
    /// Package id
    #[arg(value_name = "ID")]
    pub id: String,

    /// Repository the package comes from, when several provide it
    #[arg(long = "repo", value_name = "SOURCE")]
    pub repository: Option<String>,

    /// Skip confirmation prompt
    #[arg(short = 'y', long)]
    pub yes: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let default_filter = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter)).init();

    let runtime = Arc::new(RealRuntime);
    let config = Config::load(runtime.as_ref(), cli.install_root, cli.catalogs)?;

    match cli.command {
        Commands::List => commands::list(runtime, config).await?,
        Commands::Show(args) => {
            commands::show(runtime, config, &args.id, args.repository.as_deref()).await?
        }
        Commands::Manual => commands::manual(runtime, config).await?,
        Commands::Install(args) => {
            commands::install(
                runtime,
                config,
                &args.id,
                args.repository.as_deref(),
                &args.from,
                args.program,
            )
            .await?
        }
        Commands::Uninstall(args) => {
            commands::uninstall(runtime, config, &args.id, args.repository.as_deref(), args.yes)
                .await?
        }
    }
    Ok(())
}
