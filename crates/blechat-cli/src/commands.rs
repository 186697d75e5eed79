//! Command handlers for the BLE chat CLI

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tracing::{debug, info};

use blechat_core::{SessionManager, SessionSnapshot};

use crate::app::BlechatApp;
use crate::cli::Commands;
use crate::error::Result;
use crate::terminal::{
    format_device, format_message, format_status, render_changes, InteractiveCommand, HELP,
};

/// Command dispatcher for handling CLI commands
pub struct CommandDispatcher;

impl CommandDispatcher {
    /// Execute a CLI command
    pub async fn execute(command: Commands, app: &BlechatApp) -> Result<()> {
        match command {
            Commands::Scan => Self::handle_scan_command(app.session()).await,
            Commands::Chat { device_id } => {
                Self::handle_chat_command(app.session(), &device_id).await
            }
            Commands::Interactive => Self::handle_interactive_command(app.session()).await,
            Commands::History { device_id } => Self::handle_history_command(app, &device_id).await,
            Commands::Config => Self::handle_config_command(app),
        }
    }

    /// Handle the scan command
    async fn handle_scan_command(session: &SessionManager) -> Result<()> {
        println!("Scanning...");
        session.start_scan().await?;

        let devices = session.snapshot().devices;
        if devices.is_empty() {
            println!("No devices found");
        } else {
            println!("Discovered devices:");
            for device in &devices {
                println!("  {}", format_device(device));
            }
        }
        Ok(())
    }

    /// Handle the chat command: connect, then relay stdin lines
    async fn handle_chat_command(session: &SessionManager, device_id: &str) -> Result<()> {
        let device = session.connect_to_device(device_id).await?;
        println!("Connected to {}. Type /quit to leave.", device);

        let mut updates = session.subscribe();
        let mut last = updates.borrow_and_update().clone();
        for message in &last.messages {
            println!("{}", format_message(message, &device.name));
        }

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            tokio::select! {
                changed = updates.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    last = print_changes(&mut updates, &last);
                }
                line = lines.next_line() => {
                    match line? {
                        Some(line) if line.trim() == "/quit" => break,
                        Some(line) => {
                            // Failures surface through the snapshot's last error
                            if let Err(e) = session.send_message(&line).await {
                                debug!("Send failed: {}", e);
                            }
                        }
                        None => break,
                    }
                }
            }
        }

        session.disconnect().await;
        info!("Chat with {} ended", device.id);
        Ok(())
    }

    /// Handle the interactive command loop
    async fn handle_interactive_command(session: &SessionManager) -> Result<()> {
        println!("{}", HELP);

        let mut updates = session.subscribe();
        let mut last = updates.borrow_and_update().clone();
        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        loop {
            tokio::select! {
                changed = updates.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    last = print_changes(&mut updates, &last);
                }
                line = lines.next_line() => {
                    let Some(line) = line? else {
                        break;
                    };
                    if line.trim().is_empty() {
                        continue;
                    }
                    match line.parse::<InteractiveCommand>() {
                        Ok(InteractiveCommand::Quit) => break,
                        Ok(command) => Self::run_interactive(session, command).await,
                        Err(usage) => println!("{}", usage),
                    }
                }
            }
        }

        session.stop_scan().await;
        session.disconnect().await;
        Ok(())
    }

    async fn run_interactive(session: &SessionManager, command: InteractiveCommand) {
        match command {
            InteractiveCommand::Scan => {
                let session = session.clone();
                tokio::spawn(async move {
                    if let Err(e) = session.start_scan().await {
                        debug!("Scan failed: {}", e);
                    }
                });
            }
            InteractiveCommand::Stop => session.stop_scan().await,
            InteractiveCommand::Devices => {
                let devices = session.snapshot().devices;
                if devices.is_empty() {
                    println!("No devices discovered");
                }
                for device in &devices {
                    println!("  {}", format_device(device));
                }
            }
            InteractiveCommand::Connect(device_id) => {
                let session = session.clone();
                tokio::spawn(async move {
                    if let Err(e) = session.connect_to_device(&device_id).await {
                        debug!("Connect to {} failed: {}", device_id, e);
                    }
                });
            }
            InteractiveCommand::Disconnect => session.disconnect().await,
            InteractiveCommand::Send(text) => {
                let snapshot = session.snapshot();
                if snapshot.connected_device.is_none() {
                    println!("Not connected, use `connect <id>` first");
                } else if let Err(e) = session.send_message(&text).await {
                    debug!("Send failed: {}", e);
                }
            }
            InteractiveCommand::Status => {
                for line in format_status(&session.snapshot()) {
                    println!("{}", line);
                }
            }
            InteractiveCommand::Clear => session.clear_error().await,
            InteractiveCommand::History => {
                let snapshot = session.snapshot();
                match &snapshot.connected_device {
                    Some(device) if snapshot.messages.is_empty() => {
                        println!("No messages with {}", device.name)
                    }
                    Some(device) => {
                        for message in &snapshot.messages {
                            println!("{}", format_message(message, &device.name));
                        }
                    }
                    None => println!("Not connected"),
                }
            }
            InteractiveCommand::Help => println!("{}", HELP),
            InteractiveCommand::Quit => {}
        }
    }

    /// Handle the history command
    async fn handle_history_command(app: &BlechatApp, device_id: &str) -> Result<()> {
        let messages = app.history().load(device_id).await?;
        if messages.is_empty() {
            println!("No messages with {}", device_id);
        }
        for message in &messages {
            println!("{}", format_message(message, device_id));
        }
        Ok(())
    }

    /// Handle the config command
    fn handle_config_command(app: &BlechatApp) -> Result<()> {
        println!("{}", app.config().to_toml()?);
        Ok(())
    }
}

/// Print what changed since `last` and return the new snapshot
fn print_changes(
    updates: &mut watch::Receiver<SessionSnapshot>,
    last: &SessionSnapshot,
) -> SessionSnapshot {
    let current = updates.borrow_and_update().clone();
    for line in render_changes(last, &current) {
        println!("{}", line);
    }
    current
}
