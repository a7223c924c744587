use std::{
    io::{self, IsTerminal},
    num::NonZeroUsize,
    process::ExitCode,
};

use chrono::{Local, NaiveDateTime};
use clap::{ArgAction, ArgGroup, Parser};
use indoc::indoc;
use tracing::{debug, error, trace};
use tracing_subscriber::EnvFilter;
use zsnap_runner::library::{
    SystemRunner,
    preflight::{ensure_programs, ensure_root, ensure_unix},
};

use crate::library::{
    config::{Config, Lifetime, PolicySpec},
    constant::{
        DEFAULT_ROOT_IDENTIFIER, DEFAULT_ZFS_PROGRAM, DEFAULT_ZPOOL_PROGRAM, EXIT_INVALID,
        FORCED_LOCALE, VERSION,
    },
    error::ZsnapError,
    lifecycle::{Lifecycle, Request},
    report::{RunReport, print_human, print_json},
    zfs::Zfs,
};

const EXIT_CODES_HELP: &str = indoc! {"
    Exit codes:
      0  snapshot created and old snapshots collected
      1  invalid options or aborted run
      2  snapshot creation failed
      3  generation policy found nothing to collect
      4  lifetime policy found nothing to collect
"};

/// Takes a labelled ZFS snapshot and prunes older ones of the same label.
#[derive(Parser, Debug)]
#[command(name = "zsnap", version)]
#[command(about = "ZFS Snapshot Rotation Tool", long_about = None, after_help = EXIT_CODES_HELP)]
#[command(group(ArgGroup::new("retention").required(true).args(["generation", "lifetime"])))]
pub struct Cli {
    /// Filesystem or volume to snapshot.
    #[arg(long, short = 'd', visible_alias = "devname")]
    pub device: String,

    /// Label of the snapshot group to rotate.
    #[arg(long, short)]
    pub label: String,

    /// Number of snapshot generations to keep.
    #[arg(long, short)]
    pub generation: Option<NonZeroUsize>,

    /// Maximum snapshot age, in seconds or with an s, m, h or d suffix.
    #[arg(long, short = 't')]
    pub lifetime: Option<Lifetime>,

    /// Show what would be collected without creating or destroying anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Print a JSON report on stdout.
    #[arg(long)]
    pub json: bool,

    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    #[arg(long, default_value = DEFAULT_ZFS_PROGRAM, hide = true)]
    pub zfs_bin: String,

    #[arg(long, default_value = DEFAULT_ZPOOL_PROGRAM, hide = true)]
    pub zpool_bin: String,

    #[arg(long, default_value = DEFAULT_ROOT_IDENTIFIER, hide = true)]
    pub root_identifier: String,
}

impl Cli {
    pub fn config(&self) -> Config {
        Config {
            zfs_program: self.zfs_bin.clone(),
            zpool_program: self.zpool_bin.clone(),
            root_identifier: self.root_identifier.clone(),
        }
    }

    pub fn policy(&self) -> Result<PolicySpec, ZsnapError> {
        match (self.generation, self.lifetime) {
            (Some(generation), None) => Ok(PolicySpec::Generation(generation)),
            (None, Some(lifetime)) => Ok(PolicySpec::Lifetime(lifetime)),
            _ => Err(ZsnapError::Configuration(
                "require exactly one of 'generation' or 'lifetime'".to_string(),
            )),
        }
    }

    pub fn request(&self, now: NaiveDateTime) -> Result<Request, ZsnapError> {
        if self.label.is_empty() || self.label.contains('@') {
            return Err(ZsnapError::Configuration(format!(
                "label `{}` must be non-empty and must not contain `@`",
                self.label
            )));
        }

        Ok(Request {
            volume: self.device.clone(),
            label: self.label.clone(),
            policy: self.policy()?,
            now,
            dry_run: self.dry_run,
        })
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(verbose >= 2)
        .init();
}

fn preflight(config: &Config, dry_run: bool) -> Result<(), ZsnapError> {
    ensure_unix()?;

    if !dry_run {
        ensure_root()?;
    }

    ensure_programs(&[config.zfs_program.as_str(), config.zpool_program.as_str()])?;

    Ok(())
}

fn execute(args: &Cli) -> u8 {
    let request = match args.request(Local::now().naive_local()) {
        Ok(request) => request,
        Err(e) => {
            error!("{}", e);
            return EXIT_INVALID;
        }
    };

    let config = args.config();

    if let Err(e) = preflight(&config, request.dry_run) {
        error!("{}", e);
        return EXIT_INVALID;
    }

    let runner = SystemRunner;
    let zfs = Zfs::new(&runner, &config);
    let _locale = zfs.scoped_locale(FORCED_LOCALE);

    match zfs.pool_names() {
        Ok(pools) => debug!(?pools, "subsystem reachable"),
        Err(e) => {
            error!("{}", e);
            return EXIT_INVALID;
        }
    }

    let result = Lifecycle::new(&zfs, &config.root_identifier)
        .show_progress(!args.json && io::stderr().is_terminal())
        .run(&request);

    let report = RunReport::new(&request, &result);

    let printed = match args.json {
        true => print_json(&mut io::stdout(), &report),
        false => print_human(&mut io::stdout(), &mut io::stderr(), &result),
    };

    if let Err(e) = printed {
        error!("failed to print report: {}", e);
    }

    report.exit_code
}

pub fn run() -> ExitCode {
    let args = match Cli::try_parse() {
        Ok(args) => args,
        Err(e) => {
            e.print().ok();

            return match e.use_stderr() {
                true => ExitCode::from(EXIT_INVALID),
                false => ExitCode::SUCCESS,
            };
        }
    };

    init_tracing(args.verbose);

    debug!(
        version = %*VERSION,
        library = %*zsnap_library::VERSION,
        "zsnap started"
    );
    trace!(?args);

    ExitCode::from(execute(&args))
}
