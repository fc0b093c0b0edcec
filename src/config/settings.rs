//! Runtime settings

use std::time::Duration;

use crate::{
    config::{CliArgs, cli::Command},
    core::types::OnboardingConfig,
};

/// What the binary was asked to do
#[derive(Debug, Clone)]
pub enum Action {
    Scan,
    Status { device: String },
    Provision {
        device: Option<String>,
        config: OnboardingConfig,
    },
}

/// Runtime configuration settings
#[derive(Debug, Clone)]
pub struct Settings {
    pub adapter: Option<String>,
    pub poll_interval: Duration,
    pub scan_window: Duration,
    pub action: Action,
}

impl From<CliArgs> for Settings {
    fn from(args: CliArgs) -> Self {
        let action = match args.command {
            Command::Scan => Action::Scan,
            Command::Status { device } => Action::Status { device },
            Command::Provision(provision) => Action::Provision {
                device: provision.device,
                config: OnboardingConfig {
                    name: provision.name,
                    location: provision.location,
                    description: provision.description,
                    wifi_ssid: provision.wifi_ssid,
                    wifi_password: provision.wifi_password,
                },
            },
        };

        Settings {
            adapter: args.adapter,
            // Zero would spin the poll loop
            poll_interval: Duration::from_millis(args.poll_interval_ms.max(1)),
            scan_window: Duration::from_secs(args.scan_secs),
            action,
        }
    }
}
