use std::io::{BufRead, Write};
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use hellokey_core::status::{EXIT_PROVISION_FAILED, EXIT_USAGE};
use hellokey_core::{provision, CredentialStore, HelloStore, ProvisionRequest};
use tracing::debug;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = parse_args(std::env::args().skip(1));
    let stdin = std::io::stdin();
    let code = run(
        args,
        Arc::new(HelloStore::new()),
        Path::new("."),
        &mut stdin.lock(),
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
    output_dir: &Path,
    input: &mut R,
    out: &mut W,
    err: &mut E,
) -> u8
where
    S: CredentialStore + 'static,
    R: BufRead,
    W: Write,
    E: Write,
{
    if args.help {
        print_help(out);
        return 0;
    }
    if args.version {
        let _ = writeln!(out, "{}", env!("CARGO_PKG_VERSION"));
        return 0;
    }

    // A prompted run was most likely started from a fresh console window;
    // keep it open until the user has read the result.
    let interactive = args.key_name.is_none();
    let code = match create_key(args.key_name, store, output_dir, input, out, err).await {
        Ok(code) => code,
        Err(error) => {
            debug!(?error, "provisioning failed");
            let _ = writeln!(err, "Error: {error:#}");
            EXIT_PROVISION_FAILED
        }
    };
    if interactive {
        wait_for_enter(input, out);
    }
    code
}

async fn create_key<S, R, W, E>(
    key_name: Option<String>,
    store: Arc<S>,
    output_dir: &Path,
    input: &mut R,
    out: &mut W,
    err: &mut E,
) -> Result<u8>
where
    S: CredentialStore + 'static,
    R: BufRead,
    W: Write,
    E: Write,
{
    let key_name = match key_name {
        Some(name) => name,
        None => prompt_key_name(input, out)?,
    };
    if key_name.is_empty() {
        writeln!(err, "Error: the key name must not be empty")?;
        print_usage_line(err);
        return Ok(EXIT_USAGE);
    }

    let request = ProvisionRequest {
        key_name,
        output_dir: output_dir.to_path_buf(),
    };
    let report = provision(store, &request, out, err).await?;
    Ok(report.exit_code)
}

fn prompt_key_name<R, W>(input: &mut R, output: &mut W) -> std::io::Result<String>
where
    R: BufRead,
    W: Write,
{
    writeln!(output, "Input the name of the new key credential")?;
    write!(output, "Name: ")?;
    output.flush()?;
    let mut line = String::new();
    input.read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

fn wait_for_enter<R, W>(input: &mut R, output: &mut W)
where
    R: BufRead,
    W: Write,
{
    // best effort: a closed console must not change the exit code
    let _ = writeln!(output, "Hit Enter key to terminate...");
    let _ = output.flush();
    let mut line = String::new();
    let _ = input.read_line(&mut line);
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
            "-h" | "--help" | "/?" => parsed.help = true,
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

fn print_usage_line<W: Write>(output: &mut W) {
    let _ = writeln!(output, "Usage: hellokey-create [key_name]");
}

fn print_help<W: Write>(output: &mut W) {
    print_usage_line(output);
    let _ = writeln!(output);
    let _ = writeln!(
        output,
        "Creates a Windows Hello key credential and saves its public key to 'key_name.pem'."
    );
    let _ = writeln!(output, "If key_name is not given, a prompt asks for the name.\n");
    let _ = writeln!(output, "Exit codes:");
    let _ = writeln!(output, "  0    a new credential was created");
    let _ = writeln!(
        output,
        "  170  the credential already existed; its public key was written"
    );
    let _ = writeln!(output, "  1    the credential could not be created");
}
