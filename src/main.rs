#![allow(clippy::result_large_err)]

use anyhow::Context;
use mineproxy::command::{BlockCensusGenerator, CommandGenerator, PyramidGenerator};
use mineproxy::config::BridgeConfig;
use mineproxy::telemetry;
use std::io::Write;
use std::path::PathBuf;

enum CliCommand {
    Run {
        config_path: Option<PathBuf>,
        listen: Option<(String, u16)>,
    },
    Generate {
        config_path: Option<PathBuf>,
        kind: GenerateKind,
        size: u32,
    },
    Help,
}

enum GenerateKind {
    Pyramid,
    Blocks,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init_tracing().context("failed to initialise telemetry")?;

    match parse_cli_args(std::env::args().skip(1))? {
        CliCommand::Run {
            config_path,
            listen,
        } => {
            let mut config = BridgeConfig::load(config_path.as_deref())
                .context("failed to load configuration")?;
            if let Some((host, port)) = listen {
                config.listen.host = host;
                config.listen.port = port;
            }

            let app = mineproxy::app::BridgeApp::initialise(config)
                .await
                .context("failed to construct application")?;

            app.run().await.context("application runtime error")
        }
        CliCommand::Generate {
            config_path,
            kind,
            size,
        } => {
            let config = BridgeConfig::load(config_path.as_deref())
                .context("failed to load configuration")?;
            print_commands(&config, kind, size)
        }
        CliCommand::Help => {
            print_help();
            Ok(())
        }
    }
}

fn parse_cli_args<I>(args: I) -> anyhow::Result<CliCommand>
where
    I: IntoIterator<Item = String>,
{
    let mut args = args.into_iter();
    let mut config_path = None;
    let mut listen = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-c" | "--config" => {
                if config_path.is_some() {
                    anyhow::bail!("config path specified multiple times");
                }
                let value = args
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("expected path after {arg}"))?;
                config_path = Some(PathBuf::from(value));
            }
            "-l" | "--listen" => {
                let value = args
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("expected HOST:PORT after {arg}"))?;
                listen = Some(parse_listen(&value)?);
            }
            "-h" | "--help" => return Ok(CliCommand::Help),
            "generate" => return parse_generate_args(args, config_path),
            other => anyhow::bail!("unrecognised argument `{other}`"),
        }
    }

    Ok(CliCommand::Run {
        config_path,
        listen,
    })
}

fn parse_generate_args<I>(mut args: I, config_path: Option<PathBuf>) -> anyhow::Result<CliCommand>
where
    I: Iterator<Item = String>,
{
    let kind = match args.next().as_deref() {
        Some("pyramid") => GenerateKind::Pyramid,
        Some("blocks") => GenerateKind::Blocks,
        Some(other) => anyhow::bail!("unknown generator `{other}`; expected pyramid or blocks"),
        None => anyhow::bail!("mineproxy generate requires a generator name"),
    };
    let size = args
        .next()
        .ok_or_else(|| anyhow::anyhow!("mineproxy generate requires a size"))?;
    let size: u32 = size
        .parse()
        .with_context(|| format!("`{size}` is not a valid size"))?;

    if let Some(extra) = args.next() {
        anyhow::bail!("unexpected argument `{extra}` after generator size");
    }

    Ok(CliCommand::Generate {
        config_path,
        kind,
        size,
    })
}

fn parse_listen(value: &str) -> anyhow::Result<(String, u16)> {
    let (host, port) = value
        .rsplit_once(':')
        .ok_or_else(|| anyhow::anyhow!("listen address `{value}` must be HOST:PORT"))?;
    let port = port
        .parse()
        .with_context(|| format!("invalid port in listen address `{value}`"))?;
    if host.is_empty() {
        anyhow::bail!("listen address `{value}` is missing a host");
    }
    Ok((host.to_string(), port))
}

fn print_commands(config: &BridgeConfig, kind: GenerateKind, size: u32) -> anyhow::Result<()> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    match kind {
        GenerateKind::Pyramid => {
            let generator = PyramidGenerator::new(config.pyramid.block.clone());
            for line in generator.commands(size).context("cannot generate pyramid")? {
                writeln!(out, "{line}")?;
            }
        }
        GenerateKind::Blocks => {
            let generator = BlockCensusGenerator::new(config.census.radius);
            for line in generator.commands(size).context("cannot generate census")? {
                writeln!(out, "{line}")?;
            }
        }
    }
    out.flush()?;
    Ok(())
}

fn print_help() {
    println!(
        "\
Usage: mineproxy [OPTIONS]
       mineproxy [OPTIONS] generate <pyramid|blocks> <SIZE>

Options:
  -c, --config <PATH>       Configuration file (defaults to config/local, if present)
  -l, --listen <HOST:PORT>  Override listen.host and listen.port
  -h, --help                Print this help message

Generate:
  Prints the command lines a `pyramid <SIZE>` or `blocks <SIZE>` chat trigger would
  enqueue, without opening a listener.

Environment:
  MINEPROXY__<SECTION>__<KEY> overrides any configuration key, e.g.
  MINEPROXY__FLOW__WINDOW_CAPACITY=50
"
    );
}
