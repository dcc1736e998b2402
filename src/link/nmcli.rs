//! NetworkManager backend driven through the `nmcli` command line tool.
//!
//! Association state is read from `/sys/class/net/<iface>/operstate` so the
//! poll loop's health check never spawns a process. The passphrase is fed to
//! `nmcli --ask` on stdin and never appears on a command line.

use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, Command};
use tracing::{debug, warn};

use super::{ConnectionInfo, NetworkInfo, WirelessBackend};
use crate::error::{BridgeError, Result};

const NMCLI: &str = "nmcli";

/// `nmcli`-backed wireless interface
#[derive(Debug)]
pub struct NmcliBackend {
    interface: String,
    operstate_path: PathBuf,
    /// In-flight `nmcli device wifi connect` request
    pending: Option<Child>,
}

impl NmcliBackend {
    pub fn new(interface: impl Into<String>) -> Self {
        let interface = interface.into();
        let operstate_path = PathBuf::from(format!("/sys/class/net/{}/operstate", interface));
        Self {
            interface,
            operstate_path,
            pending: None,
        }
    }

    async fn run(&self, args: &[&str]) -> Result<String> {
        debug!("Running {} {}", NMCLI, args.join(" "));
        let output = Command::new(NMCLI)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| BridgeError::Link(format!("Failed to run {}: {}", NMCLI, e)))?;

        if !output.status.success() {
            return Err(BridgeError::Link(format!(
                "{} {} exited with {}: {}",
                NMCLI,
                args.first().copied().unwrap_or_default(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl WirelessBackend for NmcliBackend {
    async fn request_association(&mut self, ssid: &str, password: &str) -> Result<()> {
        if let Some(mut child) = self.pending.take() {
            // Superseded by this request
            let _ = child.start_kill();
        }

        let secured = !password.is_empty();
        let mut child = Command::new(NMCLI)
            .args(connect_args(ssid, &self.interface, secured))
            .stdin(if secured { Stdio::piped() } else { Stdio::null() })
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| BridgeError::Link(format!("Failed to run {}: {}", NMCLI, e)))?;

        if let Some(mut stdin) = child.stdin.take() {
            let secret = format!("{}\n", password);
            if let Err(e) = stdin.write_all(secret.as_bytes()).await {
                warn!("Failed to pass passphrase to {}: {}", NMCLI, e);
            }
        }

        self.pending = Some(child);
        Ok(())
    }

    fn is_associated(&self) -> bool {
        std::fs::read_to_string(&self.operstate_path)
            .map(|state| state.trim() == "up")
            .unwrap_or(false)
    }

    async fn disassociate(&mut self) -> Result<()> {
        if let Some(mut child) = self.pending.take() {
            let _ = child.start_kill();
        }
        if !self.is_associated() {
            return Ok(());
        }
        self.run(&["device", "disconnect", self.interface.as_str()])
            .await
            .map(|_| ())
    }

    async fn scan(&mut self) -> Result<Vec<NetworkInfo>> {
        let out = self
            .run(&["-t", "-f", "SSID,CHAN,SIGNAL", "device", "wifi", "list", "--rescan", "yes"])
            .await?;
        Ok(parse_scan(&out))
    }

    async fn connection_info(&mut self) -> Option<ConnectionInfo> {
        let out = self
            .run(&[
                "-t",
                "-f",
                "IP4.ADDRESS,IP4.GATEWAY,IP4.DNS",
                "device",
                "show",
                self.interface.as_str(),
            ])
            .await
            .ok()?;
        Some(parse_connection_info(&out))
    }
}

/// Arguments for `nmcli device wifi connect`
///
/// With `secured`, `--ask` makes nmcli read the passphrase from stdin.
fn connect_args(ssid: &str, interface: &str, secured: bool) -> Vec<String> {
    let mut args = Vec::with_capacity(7);
    if secured {
        args.push("--ask".to_string());
    }
    args.extend(["device", "wifi", "connect", ssid, "ifname", interface].map(String::from));
    args
}

/// Split one line of `nmcli -t` output on unescaped `:`
fn split_terse(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut chars = line.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if let Some(next) = chars.next() {
                    current.push(next);
                }
            }
            ':' => fields.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    fields.push(current);
    fields
}

/// Parse `nmcli -t -f SSID,CHAN,SIGNAL device wifi list`
pub fn parse_scan(output: &str) -> Vec<NetworkInfo> {
    output
        .lines()
        .filter_map(|line| {
            let fields = split_terse(line);
            if fields.len() != 3 || fields[0].is_empty() {
                return None;
            }
            Some(NetworkInfo {
                ssid: fields[0].clone(),
                channel: fields[1].trim().parse().ok()?,
                signal: fields[2].trim().parse().ok()?,
            })
        })
        .collect()
}

/// Parse `nmcli -t -f IP4.ADDRESS,IP4.GATEWAY,IP4.DNS device show <iface>`
pub fn parse_connection_info(output: &str) -> ConnectionInfo {
    let mut info = ConnectionInfo::default();
    for line in output.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        if value.is_empty() || value == "--" {
            continue;
        }
        if key.starts_with("IP4.ADDRESS") && info.address.is_none() {
            info.address = Some(value.to_string());
        } else if key == "IP4.GATEWAY" {
            info.gateway = Some(value.to_string());
        } else if key.starts_with("IP4.DNS") && info.dns.is_none() {
            info.dns = Some(value.to_string());
        }
    }
    info
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_args_keep_passphrase_off_command_line() {
        let args = connect_args("venus-HQ2449Y9R23-b05", "wlan0", true);
        assert_eq!(
            args,
            vec!["--ask", "device", "wifi", "connect", "venus-HQ2449Y9R23-b05", "ifname", "wlan0"]
        );
        assert!(!args.iter().any(|a| a == "password"));
    }

    #[test]
    fn test_connect_args_open_network() {
        let args = connect_args("Open", "wlan1", false);
        assert_eq!(args, vec!["device", "wifi", "connect", "Open", "ifname", "wlan1"]);
    }

    #[tokio::test]
    async fn test_disassociate_when_not_joined_is_noop() {
        let mut backend = NmcliBackend::new("nonexistent-wlan-iface0");
        assert!(backend.disassociate().await.is_ok());
    }

    #[test]
    fn test_parse_scan() {
        let out = "venus-HQ2449Y9R23-b05:6:72\nHome\\:Net:11:40\n:1:20\nbroken-line\n";
        let networks = parse_scan(out);
        assert_eq!(
            networks,
            vec![
                NetworkInfo { ssid: "venus-HQ2449Y9R23-b05".to_string(), channel: 6, signal: 72 },
                NetworkInfo { ssid: "Home:Net".to_string(), channel: 11, signal: 40 },
            ]
        );
    }

    #[test]
    fn test_parse_connection_info() {
        let out = "IP4.ADDRESS[1]:172.24.24.2/24\nIP4.GATEWAY:172.24.24.1\nIP4.DNS[1]:172.24.24.1\n";
        let info = parse_connection_info(out);
        assert_eq!(info.address.as_deref(), Some("172.24.24.2/24"));
        assert_eq!(info.gateway.as_deref(), Some("172.24.24.1"));
        assert_eq!(info.dns.as_deref(), Some("172.24.24.1"));
    }

    #[test]
    fn test_parse_connection_info_without_gateway() {
        let info = parse_connection_info("IP4.ADDRESS[1]:10.0.0.5/24\nIP4.GATEWAY:--\n");
        assert_eq!(info.address.as_deref(), Some("10.0.0.5/24"));
        assert_eq!(info.gateway, None);
    }

    #[test]
    fn test_missing_interface_is_not_associated() {
        let backend = NmcliBackend::new("nonexistent-wlan-iface0");
        assert!(!backend.is_associated());
    }
}
