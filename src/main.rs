mod cli;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use color_eyre::eyre::{Result, bail};
use parking_lot::Mutex;
use tracing_subscriber::EnvFilter;

use cli::{CheckArgs, Cli, Command, ReplayArgs};
use tfsettle::{
    CheckerConfig, CheckerRegistry, RetryFailure, RetryPolicy, SchemaDocument, StateSnapshot,
    with_retries,
};

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = CheckerConfig {
        consistency_checks: cli.consistency_checks,
        ..CheckerConfig::default()
    };

    let outcome = match cli.command {
        Command::Check(args) => check(&config, args)?,
        Command::Replay(args) => replay(&config, args).await?,
    };

    println!("{}", outcome);
    if !outcome.is_settled() {
        std::process::exit(1);
    }

    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Outcome {
    Consistent,
    Settled { attempts: usize },
    Mismatch(String),
    Unsettled { attempts: u32, mismatch: String },
}

impl Outcome {
    fn is_settled(&self) -> bool {
        matches!(self, Outcome::Consistent | Outcome::Settled { .. })
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Consistent => write!(f, "consistent"),
            Outcome::Settled { attempts } => write!(f, "settled after {} attempt(s)", attempts),
            Outcome::Mismatch(mismatch) => write!(f, "{}", mismatch),
            Outcome::Unsettled { attempts, mismatch } => {
                write!(f, "not settled after {} attempts:\n{}", attempts, mismatch)
            }
        }
    }
}

fn check(config: &CheckerConfig, args: CheckArgs) -> Result<Outcome> {
    let schema = SchemaDocument::load(&args.schema)?;
    let expected = StateSnapshot::load(&args.expected)?;
    let actual = StateSnapshot::load(&args.actual)?;

    if actual.id != expected.id {
        tracing::warn!(expected = %expected.id, actual = %actual.id, "snapshot IDs differ");
    }

    let registry = CheckerRegistry::with_config(config);
    let data = Arc::new(Mutex::new(expected.into_resource_data(&schema)));
    let checker = registry.track(Arc::clone(&data), &schema);

    data.lock().replace_attributes(actual.typed_attributes(&schema));

    Ok(match checker.check_state() {
        Ok(()) => Outcome::Consistent,
        Err(err) => Outcome::Mismatch(err.to_string()),
    })
}

async fn replay(config: &CheckerConfig, args: ReplayArgs) -> Result<Outcome> {
    let schema = SchemaDocument::load(&args.schema)?;
    let expected = StateSnapshot::load(&args.expected)?;
    let reads = args
        .actual
        .iter()
        .map(|path| StateSnapshot::load(path).map(|s| s.typed_attributes(&schema)))
        .collect::<Result<Vec<_>, _>>()?;

    let Some(last_read) = reads.len().checked_sub(1) else {
        bail!("replay needs at least one re-read snapshot");
    };

    let registry = CheckerRegistry::with_config(config);
    let data = Arc::new(Mutex::new(expected.into_resource_data(&schema)));
    registry.track(Arc::clone(&data), &schema);

    let policy = RetryPolicy {
        timeout: Duration::from_secs(args.timeout_secs),
        min_delay: Duration::from_millis(args.min_delay_ms),
        ..config.retry
    };

    let mut attempt = 0usize;
    let result = with_retries(&policy, || {
        data.lock()
            .replace_attributes(reads[attempt.min(last_read)].clone());
        attempt += 1;

        let checker = registry.track(Arc::clone(&data), &schema);
        std::future::ready(checker.check_state())
    })
    .await;

    match result {
        Ok(()) => Ok(Outcome::Settled { attempts: attempt }),
        Err(RetryFailure::Timeout { attempts, last }) => Ok(Outcome::Unsettled {
            attempts,
            mismatch: last.to_string(),
        }),
        Err(err) => Err(err.into()),
    }
}
