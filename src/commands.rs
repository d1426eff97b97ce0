use std::str::FromStr;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::fan::{FanAccessory, MAX_SPEED};

/// Operator commands accepted on the console
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleCommand {
    On,
    Off,
    Speed(u8),
    Status,
    Help,
    Quit,
}

impl FromStr for ConsoleCommand {
    type Err = String;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut parts = line.split_whitespace();
        let command = parts.next().unwrap_or_default().to_ascii_lowercase();
        let argument = parts.next();

        match (command.as_str(), argument) {
            ("on", None) => Ok(ConsoleCommand::On),
            ("off", None) => Ok(ConsoleCommand::Off),
            ("speed", Some(value)) => match value.parse::<u8>() {
                Ok(speed) if speed <= MAX_SPEED => Ok(ConsoleCommand::Speed(speed)),
                _ => Err(format!("Speed must be between 0 and {}", MAX_SPEED)),
            },
            ("speed", None) => Err("Usage: speed <0-100>".to_string()),
            ("status", None) => Ok(ConsoleCommand::Status),
            ("help", None) | ("?", None) => Ok(ConsoleCommand::Help),
            ("quit", None) | ("exit", None) => Ok(ConsoleCommand::Quit),
            _ => Err(format!("Unknown command: {}", line.trim())),
        }
    }
}

const HELP: &str = "Commands: on | off | speed <0-100> | status | help | quit";

/// Run one command against the accessory and describe the outcome
pub fn execute(accessory: &FanAccessory, command: ConsoleCommand) -> String {
    let result = match command {
        ConsoleCommand::On => accessory.set_on(true).map(|_| "Fan on".to_string()),
        ConsoleCommand::Off => accessory.set_on(false).map(|_| "Fan off".to_string()),
        ConsoleCommand::Speed(speed) => accessory
            .set_speed(speed)
            .map(|_| format!("Speed {}%", speed)),
        ConsoleCommand::Status => {
            let state = accessory.state();
            Ok(format!(
                "link: {}, on: {}, speed: {}%",
                accessory.link_status(),
                state.on,
                state.speed
            ))
        }
        ConsoleCommand::Help => Ok(HELP.to_string()),
        ConsoleCommand::Quit => Ok("Bye".to_string()),
    };

    result.unwrap_or_else(|e| format!("Error: {}", e))
}

/// Read commands line by line until `quit` or end of input
pub async fn run_console<R, W>(accessory: &FanAccessory, reader: R, mut writer: W) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let reply = match line.parse::<ConsoleCommand>() {
            Ok(ConsoleCommand::Quit) => break,
            Ok(command) => execute(accessory, command),
            Err(message) => message,
        };
        writer.write_all(reply.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
    }
    Ok(())
}
