//! # wasmbed - host a bundled translated module from the command line

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use wasmbed::apps;
use wasmbed::config::BridgeConfig;
use wasmbed::runtime::host::create_wiring_imports;
use wasmbed::runtime::{HostContext, HostValue, Instance, MEMORY_VIEW_NAME};

#[derive(Parser)]
#[command(name = "wasmbed")]
#[command(about = "Run an embedded, ahead-of-time translated module against host services")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log bridge activity at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    /// JSON bridge configuration
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Bundled module to instantiate
    #[arg(long, global = true, default_value = "blink")]
    app: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Call setup once, then loop repeatedly
    Run {
        #[arg(long, default_value = "10")]
        loops: u32,
    },

    /// Invoke one export
    Call {
        export: String,
        /// Integers, floats or strings
        args: Vec<String>,
    },

    /// List the export binding
    Exports,

    /// Hex dump of linear memory
    Dump {
        #[arg(long, default_value = "0")]
        offset: usize,
        #[arg(long, default_value = "256")]
        length: usize,
    },
}

fn parse_arg(text: &str) -> HostValue {
    if let Ok(v) = text.parse::<i64>() {
        HostValue::Int(v)
    } else if let Ok(v) = text.parse::<f64>() {
        HostValue::Float(v)
    } else {
        HostValue::Str(text.to_string())
    }
}

fn dump(view: &[u8], offset: usize, length: usize) -> Result<()> {
    let end = offset
        .checked_add(length)
        .filter(|end| *end <= view.len())
        .ok_or_else(|| anyhow!("range {offset}+{length} exceeds memory size {}", view.len()))?;

    for (i, row) in view[offset..end].chunks(16).enumerate() {
        let printable: String = row
            .iter()
            .map(|&b| if b.is_ascii_graphic() || b == b' ' { b as char } else { '.' })
            .collect();
        println!("{:08x}  {:<32}  {printable}", offset + i * 16, hex::encode(row));
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter)).init();

    let config = match &cli.config {
        Some(path) => BridgeConfig::load(path)?,
        None => BridgeConfig::default(),
    };

    let definition = apps::by_name(&cli.app).ok_or_else(|| {
        let known: Vec<&str> = apps::APPS.iter().map(|m| m.name).collect();
        anyhow!("unknown app {}, expected one of: {}", cli.app, known.join(", "))
    })?;

    let host = HostContext::builder()
        .heap(Box::new(config.bounded_heap()))
        .build();
    let mut instance = Instance::construct(definition, &create_wiring_imports(), host, &config)
        .with_context(|| format!("bringing up {}", definition.name))?;

    match cli.command {
        Commands::Run { loops } => {
            instance.invoke("setup", &[])?;
            for _ in 0..loops {
                instance.invoke("loop", &[])?;
            }
        }

        Commands::Call { export, args } => {
            let args: Vec<HostValue> = args.iter().map(|a| parse_arg(a)).collect();
            let result = instance.invoke(&export, &args)?;
            println!("{result}");
        }

        Commands::Exports => {
            for export in instance.exports() {
                println!("{} {}", export.name, export.ty);
            }
        }

        Commands::Dump { offset, length } => {
            let view = instance.named_view(MEMORY_VIEW_NAME)?;
            dump(view, offset, length)?;
        }
    }

    instance.teardown();
    Ok(())
}
