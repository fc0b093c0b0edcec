//! Mycelium station onboarding - Main Entry Point

use std::{sync::Arc, time::Duration};

use clap::Parser;
use mycelium_onboarding::{
    DeviceId, OnboardingConfig, OnboardingController, OnboardingState,
    backend::StationCache,
    config::{Action, CliArgs, Settings},
    core::session::ProvisioningSession,
    transport::ble::BleTransport,
};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

type Controller = OnboardingController<BleTransport, StationCache>;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,mycelium_onboarding=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = Settings::from(CliArgs::parse());
    info!(?settings, "Starting station onboarding");

    let transport = Arc::new(BleTransport::new(settings.adapter.clone()));

    let result = match settings.action.clone() {
        Action::Scan => {
            let mut controller = controller(transport, &settings);
            scan(&mut controller, settings.scan_window).await
        }
        Action::Status { device } => status(transport, DeviceId::from(device)).await,
        Action::Provision { device, config } => {
            let mut controller = controller(transport, &settings);
            provision(&mut controller, &settings, device, config).await
        }
    };

    if let Err(e) = &result {
        error!("{}", e);
    }
    result
}

fn controller(transport: Arc<BleTransport>, settings: &Settings) -> Controller {
    OnboardingController::new(
        transport,
        Arc::new(StationCache::new()),
        settings.poll_interval,
    )
}

/// Print stations as they are discovered until the scan window closes
async fn scan(
    controller: &mut Controller,
    window: Duration,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut candidates = controller.begin_discovery().await?;
    let mut reported = 0;

    let deadline = tokio::time::sleep(window);
    let interrupted = tokio::signal::ctrl_c();
    tokio::pin!(deadline, interrupted);

    loop {
        tokio::select! {
            _ = &mut deadline => break,
            _ = &mut interrupted => {
                info!("Received SIGINT (Ctrl+C), stopping scan");
                break;
            }
            changed = candidates.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = candidates.borrow_and_update().clone();
                for device in snapshot.iter().skip(reported) {
                    println!("{}", device);
                }
                reported = snapshot.len();
            }
        }
    }

    controller.cancel().await?;
    if reported == 0 {
        warn!("No stations found");
    }
    Ok(())
}

async fn status(
    transport: Arc<BleTransport>,
    device: DeviceId,
) -> Result<(), Box<dyn std::error::Error>> {
    let session = ProvisioningSession::new(transport, device);
    let state = session.poll_once().await?;
    println!("{}: {}", session.device(), state);
    Ok(())
}

async fn provision(
    controller: &mut Controller,
    settings: &Settings,
    device: Option<String>,
    config: OnboardingConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let result = select_and_follow(controller, settings.scan_window, device, config).await;

    // Discovery or polling may still be running, whatever the outcome
    let cancelled = controller.cancel().await;
    result?;
    Ok(cancelled?)
}

async fn select_and_follow(
    controller: &mut Controller,
    window: Duration,
    device: Option<String>,
    config: OnboardingConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let device = match device {
        Some(device) => DeviceId::from(device),
        None => first_station(controller, window).await?,
    };
    controller.select_device(device).await?;

    follow(controller, config).await
}

/// Wait for the first station to show up
async fn first_station(
    controller: &Controller,
    window: Duration,
) -> Result<DeviceId, Box<dyn std::error::Error>> {
    let mut candidates = controller.begin_discovery().await?;
    info!("Looking for stations for up to {:?}", window);

    let found = tokio::select! {
        found = tokio::time::timeout(window, candidates.wait_for(|set| !set.is_empty())) => found,
        _ = tokio::signal::ctrl_c() => {
            info!("Received SIGINT (Ctrl+C), stopping scan");
            return Err("Interrupted while looking for stations".into());
        }
    };
    match found {
        Ok(Ok(set)) => Ok(set[0].clone()),
        _ => Err("No station found".into()),
    }
}

/// Submit the configuration and print progress until the station settles
async fn follow(
    controller: &mut Controller,
    config: OnboardingConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let device = controller.submit(config).await?;
    let Some(mut updates) = controller.updates() else {
        return Ok(());
    };
    println!("{}: {}", device, updates.borrow_and_update().clone());

    let interrupted = tokio::signal::ctrl_c();
    tokio::pin!(interrupted);

    loop {
        tokio::select! {
            _ = &mut interrupted => {
                info!("Received SIGINT (Ctrl+C), cancelling onboarding");
                return Ok(());
            }
            changed = updates.changed() => {
                if changed.is_err() {
                    return Ok(());
                }
                let state = updates.borrow_and_update().clone();
                println!("{}: {}", device, state);

                match state {
                    OnboardingState::Complete => return Ok(()),
                    OnboardingState::Failed { error } => {
                        return Err(format!("Station reported failure: {}", error).into());
                    }
                    _ => {}
                }
            }
        }
    }
}
