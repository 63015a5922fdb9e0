//! `ipfs-rpc`: invoke any daemon command from the shell.
//!
//! This binary is the composition root. Responsibilities:
//!
//! 1. **Parse flags** with `clap`.
//! 2. **Wire observability**: install a `tracing-subscriber` on stderr, human
//!    or JSON formatted, filtered by `RUST_LOG`.
//! 3. **Resolve the endpoint**: `--api` wins, then `--repo`, then `IPFS_PATH`
//!    or `~/.ipfs`.
//! 4. **Cancel on Ctrl-C**: the signal fires the request's cancellation token,
//!    which aborts the exchange and releases the connection.
//! 5. **Print the reply**: one JSON value per line on stdout, or the raw body
//!    with `--raw`.
//!
//! ```text
//! ipfs-rpc --api /ip4/127.0.0.1/tcp/5001 pin/ls --opt type=recursive --stream
//! ipfs-rpc add --file ./notes.txt --opt cid-version=1
//! ipfs-rpc cat --arg /ipfs/QmHash --raw > out.bin
//! ```

mod telemetry;

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use coreapi::HttpApi;
use futures::StreamExt;
use protocol::{ApiOptions, DaemonAddress, OptionValue};
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};
use transport::{Attachment, CancellationToken, HttpClient, Response};

use crate::telemetry::LogFormat;

#[derive(Debug, Parser)]
#[command(name = "ipfs-rpc", version, about = "Invoke a command on a content-addressed storage daemon")]
struct Cli {
    /// Daemon address: a multiaddr, an http(s) URL, or host:port.
    #[arg(long, env = "IPFS_RPC_API")]
    api: Option<String>,

    /// Repository directory whose `api` file names the daemon.
    #[arg(long, conflicts_with = "api")]
    repo: Option<PathBuf>,

    /// Ask the daemon not to touch the network.
    #[arg(long)]
    offline: bool,

    /// Whole-request timeout in seconds.
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Log output format.
    #[arg(long, value_enum, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,

    /// Decode the reply as a stream of values even if the daemon does not
    /// flag it as one.
    #[arg(long, conflicts_with = "raw")]
    stream: bool,

    /// Copy the reply body to stdout unchanged.
    #[arg(long)]
    raw: bool,

    /// Command path, e.g. `version` or `pin/add`.
    command: String,

    /// Positional argument; repeatable, order preserved.
    #[arg(long = "arg", value_name = "VALUE")]
    args: Vec<String>,

    /// Named option as `KEY=VALUE`; repeatable.
    #[arg(long = "opt", value_name = "KEY=VALUE", value_parser = parse_option)]
    options: Vec<(String, OptionValue)>,

    /// File to upload as an attachment; repeatable.
    #[arg(long = "file", value_name = "PATH")]
    files: Vec<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    telemetry::init(cli.log_format)?;

    let address = resolve_address(&cli)?;
    info!(%address, command = %cli.command, "using daemon");

    let mut builder = HttpClient::builder(address)
        .user_agent(concat!("ipfs-rpc/", env!("CARGO_PKG_VERSION")))
        .defaults(default_options(cli.offline));
    if let Some(secs) = cli.timeout {
        builder = builder.timeout(Duration::from_secs(secs));
    }
    let client = builder.build().context("failed to create daemon client")?;

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                debug!("interrupt received, cancelling");
                cancel.cancel();
            }
        }
    });
    let api = HttpApi::from_client(client).with_cancellation(cancel);

    let mut request = api.request(cli.command.as_str()).args(cli.args.iter().cloned());
    for (name, value) in cli.options.iter().cloned() {
        request = request.option(name, value);
    }
    for path in &cli.files {
        request = request.attachment(open_attachment(path).await?);
    }

    let response = api
        .send(request.build())
        .await
        .with_context(|| format!("'{}' failed", cli.command))?;
    print_response(response, cli.raw, cli.stream)
        .await
        .with_context(|| format!("'{}' failed", cli.command))
}

/// Options carried by every request. `offline` is only sent when set.
fn default_options(offline: bool) -> ApiOptions {
    if offline {
        ApiOptions::default().offline(true)
    } else {
        ApiOptions::default()
    }
}

fn resolve_address(cli: &Cli) -> Result<DaemonAddress> {
    if let Some(api) = &cli.api {
        return Ok(endpoint::parse_address(api)?);
    }
    if let Some(repo) = &cli.repo {
        let Some(repo) = repo.to_str() else {
            bail!("repository path is not valid UTF-8: {}", repo.display());
        };
        return Ok(endpoint::api_address(repo)?);
    }
    Ok(endpoint::resolve_local()?)
}

async fn open_attachment(path: &Path) -> Result<Attachment> {
    let file = tokio::fs::File::open(path)
        .await
        .with_context(|| format!("failed to open {}", path.display()))?;
    let length = file
        .metadata()
        .await
        .with_context(|| format!("failed to stat {}", path.display()))?
        .len();
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    Ok(Attachment::reader(name, file).with_length(length))
}

async fn print_response(response: Response, raw: bool, stream: bool) -> Result<()> {
    let mut stdout = tokio::io::stdout();

    if raw {
        let mut chunks = response.bytes_stream();
        while let Some(chunk) = chunks.next().await {
            stdout.write_all(&chunk?).await?;
        }
        stdout.flush().await?;
        return Ok(());
    }

    if stream || response.is_streaming() {
        let mut values = response.decode_stream::<Value>();
        while let Some(value) = values.next().await {
            write_line(&mut stdout, &value?).await?;
        }
    } else {
        let value: Value = response.decode_one().await?;
        write_line(&mut stdout, &value).await?;
    }
    stdout.flush().await?;
    Ok(())
}

async fn write_line(stdout: &mut tokio::io::Stdout, value: &Value) -> Result<()> {
    let mut line = serde_json::to_vec(value)?;
    line.push(b'\n');
    stdout.write_all(&line).await?;
    Ok(())
}

/// Parses `KEY=VALUE`, typing the value as a boolean or integer when it reads
/// as one.
fn parse_option(text: &str) -> Result<(String, OptionValue), String> {
    let (key, value) = text
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{text}'"))?;
    if key.is_empty() {
        return Err(format!("empty option name in '{text}'"));
    }
    let value = match value {
        "true" => OptionValue::Bool(true),
        "false" => OptionValue::Bool(false),
        other => match other.parse::<i64>() {
            Ok(number) => OptionValue::Int(number),
            Err(_) => OptionValue::String(other.to_string()),
        },
    };
    Ok((key.to_string(), value))
}
