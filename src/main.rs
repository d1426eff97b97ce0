use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use ir_fan_lib::config::AppConfig;

#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Serial port of the IR blaster
    #[arg(short, long)]
    port: Option<String>,

    /// IR signal definitions
    #[arg(long)]
    ir_file: Option<PathBuf>,

    /// Where the last fan state is kept
    #[arg(long)]
    state_file: Option<PathBuf>,

    /// List serial ports and exit
    #[arg(long)]
    list_ports: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    let mut config = AppConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    if let Some(port) = args.port {
        config.port = Some(port);
    }
    if let Some(ir_file) = args.ir_file {
        config.ir_file = ir_file;
    }
    if let Some(state_file) = args.state_file {
        config.state_file = state_file;
    }

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&config.log_level))
        .init();

    if args.list_ports {
        for port in ir_fan_lib::serial::list_ports()? {
            match (port.vid, port.pid) {
                (Some(vid), Some(pid)) => println!(
                    "{} {:04x}:{:04x} {}",
                    port.port_name,
                    vid,
                    pid,
                    port.product.unwrap_or_default()
                ),
                _ => println!("{}", port.port_name),
            }
        }
        return Ok(());
    }

    ir_fan_lib::run(config).await
}
