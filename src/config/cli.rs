//! Command-line argument parsing

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug, Clone)]
#[clap(name = "mycelium-onboarding", version, author)]
#[clap(about = "Onboard Mycelium plant stations over Bluetooth Low Energy")]
pub struct CliArgs {
    /// Bluetooth adapter name (default adapter when omitted)
    #[clap(short, long)]
    pub adapter: Option<String>,

    /// Station status poll interval in milliseconds
    #[clap(long, default_value = "1000")]
    pub poll_interval_ms: u64,

    /// How long to scan for stations, in seconds
    #[clap(long, default_value = "10")]
    pub scan_secs: u64,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// List stations advertising the provisioning service
    Scan,

    /// Read the onboarding state of a station once
    Status {
        /// Station Bluetooth address
        device: String,
    },

    /// Send settings to a station and follow its onboarding progress
    Provision(ProvisionArgs),
}

#[derive(Args, Clone)]
pub struct ProvisionArgs {
    /// Station Bluetooth address (first discovered station when omitted)
    #[clap(short, long)]
    pub device: Option<String>,

    /// Plant name
    #[clap(long)]
    pub name: String,

    /// Plant location
    #[clap(long)]
    pub location: String,

    /// Plant description
    #[clap(long)]
    pub description: String,

    /// WiFi network the station should join
    #[clap(long)]
    pub wifi_ssid: String,

    /// WiFi password
    #[clap(long)]
    pub wifi_password: String,
}

impl std::fmt::Debug for ProvisionArgs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProvisionArgs")
            .field("device", &self.device)
            .field("name", &self.name)
            .field("location", &self.location)
            .field("description", &self.description)
            .field("wifi_ssid", &self.wifi_ssid)
            .field("wifi_password", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = CliArgs::try_parse_from(["mycelium-onboarding", "scan"]).unwrap();
        assert_eq!(args.adapter, None);
        assert_eq!(args.poll_interval_ms, 1000);
        assert_eq!(args.scan_secs, 10);
        assert!(matches!(args.command, Command::Scan));
    }

    #[test]
    fn test_provision_args() {
        let args = CliArgs::try_parse_from([
            "mycelium-onboarding",
            "--adapter",
            "hci1",
            "provision",
            "--device",
            "AA:BB:CC:DD:EE:FF",
            "--name",
            "Monstera",
            "--location",
            "Living room",
            "--description",
            "Next to the window",
            "--wifi-ssid",
            "HomeNet",
            "--wifi-password",
            "hunter22",
        ])
        .unwrap();

        assert_eq!(args.adapter.as_deref(), Some("hci1"));
        let Command::Provision(provision) = args.command else {
            panic!("expected provision command");
        };
        assert_eq!(provision.device.as_deref(), Some("AA:BB:CC:DD:EE:FF"));
        assert_eq!(provision.wifi_ssid, "HomeNet");
        assert!(!format!("{:?}", provision).contains("hunter22"));
    }

    #[test]
    fn test_provision_requires_settings() {
        let result = CliArgs::try_parse_from(["mycelium-onboarding", "provision", "--name", "x"]);
        assert!(result.is_err());
    }
}
