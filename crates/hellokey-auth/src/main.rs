use std::io::{Read, Write};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use hellokey_core::status::{exit_code, message, EXIT_USAGE};
use hellokey_core::{authenticate, CredentialStore, HelloStore, Outcome};
use tracing::debug;

// stdout carries nothing but signature bytes; every other line goes to stderr

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = parse_args(std::env::args().skip(1));
    let code = run(
        args,
        Arc::new(HelloStore::new()),
        &mut std::io::stdin().lock(),
        &mut std::io::stdout(),
        &mut std::io::stderr(),
    )
    .await;
    ExitCode::from(code)
}

/// Dispatches one invocation and returns its exit code.
async fn run<S, R, W, E>(
    args: Args,
    store: Arc<S>,
    input: &mut R,
    out: &mut W,
    err: &mut E,
) -> u8
where
    S: CredentialStore + 'static,
    R: Read,
    W: Write,
    E: Write,
{
    if args.help {
        print_help(err);
        return 0;
    }
    if args.version {
        let _ = writeln!(err, "{}", env!("CARGO_PKG_VERSION"));
        return 0;
    }
    let Some(key_name) = args.key_name.filter(|name| !name.is_empty()) else {
        print_help(err);
        return EXIT_USAGE;
    };

    match sign_challenge(store, &key_name, input, out, err).await {
        Ok(code) => code,
        Err(error) => {
            debug!(?error, "authentication failed");
            let _ = writeln!(err, "Error: {error:#}");
            EXIT_USAGE
        }
    }
}

async fn sign_challenge<S, R, W, E>(
    store: Arc<S>,
    key_name: &str,
    input: &mut R,
    out: &mut W,
    err: &mut E,
) -> Result<u8>
where
    S: CredentialStore + 'static,
    R: Read,
    W: Write,
    E: Write,
{
    let mut challenge = Vec::new();
    input.read_to_end(&mut challenge)?;
    Ok(authenticate(store, key_name, challenge, out, err).await?)
}

#[derive(Debug, Default)]
struct Args {
    key_name: Option<String>,
    help: bool,
    version: bool,
}

fn parse_args<I>(args: I) -> Args
where
    I: IntoIterator<Item = String>,
{
    let mut parsed = Args::default();
    for arg in args {
        match arg.as_str() {
            "-h" | "--help" => parsed.help = true,
            "--version" => parsed.version = true,
            _ => {
                if parsed.key_name.is_none() {
                    parsed.key_name = Some(arg);
                }
            }
        }
    }
    parsed
}

fn print_help<W: Write>(output: &mut W) {
    let _ = writeln!(output, "Usage: hellokey-auth credential_key_name\n");
    let _ = writeln!(
        output,
        "Reads a challenge from stdin, signs it with the named Windows Hello key"
    );
    let _ = writeln!(output, "and writes the raw signature to stdout.\n");
    let _ = writeln!(output, "Exit codes:");
    let _ = writeln!(output, "  {EXIT_USAGE:<4} usage error");
    let mut outcomes = Outcome::ALL;
    outcomes.sort_by_key(|outcome| exit_code(*outcome));
    for outcome in outcomes {
        let _ = writeln!(
            output,
            "  {:<4} {}",
            exit_code(outcome),
            message(outcome, "credential_key_name")
        );
    }
}
