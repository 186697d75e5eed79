//! Line-mode terminal front-end
//!
//! Parses interactive commands and turns successive session snapshots into
//! printable lines. Nothing here touches stdin or stdout directly.

use std::collections::HashSet;
use std::str::FromStr;

use blechat_core::{Device, Message, Origin, SessionSnapshot};

pub const HELP: &str = "\
Commands:
  scan              scan for nearby devices
  stop              stop the running scan
  devices           list devices from the last scan
  connect <id>      connect to a device
  disconnect        drop the current connection
  send <text>       send a message to the connected device
  status            show session status
  clear             clear the last error
  history           show the conversation with the connected device
  help              show this help
  quit              disconnect and exit";

// ----------------------------------------------------------------------------
// Interactive Commands
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InteractiveCommand {
    Scan,
    Stop,
    Devices,
    Connect(String),
    Disconnect,
    Send(String),
    Status,
    Clear,
    History,
    Help,
    Quit,
}

impl FromStr for InteractiveCommand {
    type Err = String;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (verb, rest) = match line.split_once(char::is_whitespace) {
            Some((verb, rest)) => (verb, rest.trim()),
            None => (line, ""),
        };

        let command = match verb.to_ascii_lowercase().as_str() {
            "scan" => InteractiveCommand::Scan,
            "stop" => InteractiveCommand::Stop,
            "devices" | "ls" => InteractiveCommand::Devices,
            "connect" if !rest.is_empty() => InteractiveCommand::Connect(rest.to_string()),
            "connect" => return Err("usage: connect <device-id>".to_string()),
            "disconnect" => InteractiveCommand::Disconnect,
            "send" if !rest.is_empty() => InteractiveCommand::Send(rest.to_string()),
            "send" => return Err("usage: send <text>".to_string()),
            "status" => InteractiveCommand::Status,
            "clear" => InteractiveCommand::Clear,
            "history" => InteractiveCommand::History,
            "help" | "?" => InteractiveCommand::Help,
            "quit" | "exit" => InteractiveCommand::Quit,
            "" => return Err("empty command, type `help`".to_string()),
            other => return Err(format!("unknown command `{}`, type `help`", other)),
        };
        Ok(command)
    }
}

// ----------------------------------------------------------------------------
// Formatting
// ----------------------------------------------------------------------------

pub fn format_device(device: &Device) -> String {
    match device.signal_strength {
        Some(rssi) => format!("{:<24} {:<20} {:>4} dBm", device.id, device.name, rssi),
        None => format!("{:<24} {:<20}    ? dBm", device.id, device.name),
    }
}

pub fn format_message(message: &Message, peer_name: &str) -> String {
    let author = match message.origin {
        Origin::Local => "me",
        Origin::Remote => peer_name,
    };
    format!(
        "[{}] {}: {}",
        message.timestamp.clock_time(),
        author,
        message.text
    )
}

pub fn format_status(snapshot: &SessionSnapshot) -> Vec<String> {
    let mut lines = vec![format!("status: {}", snapshot.status)];
    if snapshot.scanning {
        lines.push("scan in progress".to_string());
    }
    match &snapshot.connected_device {
        Some(device) => lines.push(format!("connected to {}", device)),
        None => lines.push("not connected".to_string()),
    }
    lines.push(format!("{} devices discovered", snapshot.devices.len()));
    if let Some(error) = &snapshot.last_error {
        lines.push(format!("last error: {}", error));
    }
    lines
}

// ----------------------------------------------------------------------------
// Snapshot Rendering
// ----------------------------------------------------------------------------

/// Lines describing what changed between two snapshots
pub fn render_changes(previous: &SessionSnapshot, current: &SessionSnapshot) -> Vec<String> {
    let mut lines = Vec::new();

    if previous.status != current.status {
        lines.push(format!("* status: {}", current.status));
    }

    let known: HashSet<&str> = previous.devices.iter().map(|d| d.id.as_str()).collect();
    for device in &current.devices {
        if !known.contains(device.id.as_str()) {
            lines.push(format!("* found {}", device));
        }
    }

    match (&previous.connected_device, &current.connected_device) {
        (None, Some(device)) => lines.push(format!("* connected to {}", device)),
        (Some(device), None) => lines.push(format!("* disconnected from {}", device.id)),
        (Some(before), Some(after)) if before.id != after.id => {
            lines.push(format!("* connected to {}", after))
        }
        _ => {}
    }

    if let Some(device) = &current.connected_device {
        let same_peer = previous
            .connected_device
            .as_ref()
            .is_some_and(|before| before.id == device.id);
        let seen: HashSet<&str> = if same_peer {
            previous.messages.iter().map(|m| m.id.as_str()).collect()
        } else {
            HashSet::new()
        };
        for message in &current.messages {
            if !seen.contains(message.id.as_str()) {
                lines.push(format_message(message, &device.name));
            }
        }
    }

    if current.last_error != previous.last_error {
        if let Some(error) = &current.last_error {
            lines.push(format!("! {}", error));
        }
    }

    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use blechat_core::{SessionStatus, Timestamp};

    #[test]
    fn test_parse_commands() {
        assert_eq!("scan".parse(), Ok(InteractiveCommand::Scan));
        assert_eq!(" STOP ".parse(), Ok(InteractiveCommand::Stop));
        assert_eq!(
            "connect mock-alpha".parse(),
            Ok(InteractiveCommand::Connect("mock-alpha".to_string()))
        );
        assert_eq!(
            "send  hello there ".parse(),
            Ok(InteractiveCommand::Send("hello there".to_string()))
        );
        assert_eq!("exit".parse(), Ok(InteractiveCommand::Quit));
        assert!("connect".parse::<InteractiveCommand>().is_err());
        assert!("send   ".parse::<InteractiveCommand>().is_err());
        assert!("dance".parse::<InteractiveCommand>().is_err());
        assert!("".parse::<InteractiveCommand>().is_err());
    }

    #[test]
    fn test_format_message() {
        let message = Message::remote("hello", Timestamp::new(3_723_000));
        assert_eq!(format_message(&message, "Beacon"), "[01:02:03] Beacon: hello");
        let message = Message::local("hi", Timestamp::new(0));
        assert_eq!(format_message(&message, "Beacon"), "[00:00:00] me: hi");
    }

    #[test]
    fn test_render_changes() {
        let device = Device::new("mock-alpha", "Alpha", Some(-55));
        let first = Message::local("hi", Timestamp::new(1_000));
        let previous = SessionSnapshot {
            status: SessionStatus::Connected,
            devices: vec![device.clone()],
            connected_device: Some(device.clone()),
            messages: vec![first.clone()],
            ..SessionSnapshot::default()
        };
        let current = SessionSnapshot {
            messages: vec![first, Message::remote("Echo: hi", Timestamp::new(1_300))],
            last_error: Some("link lost".to_string()),
            ..previous.clone()
        };

        let lines = render_changes(&previous, &current);
        assert_eq!(
            lines,
            vec![
                "[00:00:01] Alpha: Echo: hi".to_string(),
                "! link lost".to_string()
            ]
        );
        assert!(render_changes(&current, &current).is_empty());
    }

    #[test]
    fn test_render_connection_changes() {
        let device = Device::new("mock-beta", "Beta", None);
        let idle = SessionSnapshot::default();
        let connected = SessionSnapshot {
            status: SessionStatus::Connected,
            connected_device: Some(device),
            ..SessionSnapshot::default()
        };

        let lines = render_changes(&idle, &connected);
        assert_eq!(lines[0], "* status: connected");
        assert_eq!(lines[1], "* connected to Beta (mock-beta)");

        let lines = render_changes(&connected, &idle);
        assert_eq!(lines[1], "* disconnected from mock-beta");
    }
}
