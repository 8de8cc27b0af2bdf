// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

use std::env;
use std::path::Path;
use std::process;

use anyhow::Context;
use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn};
use tracing_subscriber::EnvFilter;

use loki_logs::{
    config::Config,
    extension::{
        client::ExtensionClient,
        lifecycle::{Lifecycle, LifecycleExit},
    },
    logger,
    logs::{flusher::LogsFlusher, loki::LokiClient},
    logs_api::{
        receiver::LogsReceiver,
        subscription::{subscribe_logs, SubscriptionRequest},
    },
    queue::LogQueue,
};

const DEFAULT_EXTENSION_NAME: &str = "loki-logs-extension";
const SUBSCRIPTION_ERROR_TYPE: &str = "Extension.LogsSubscriptionFailed";

#[tokio::main]
pub async fn main() {
    let log_level = env::var("LOKI_EXTENSION_LOG_LEVEL")
        .map(|val| val.to_lowercase())
        .unwrap_or("info".to_string());
    let env_filter = format!("h2=off,hyper=off,rustls=off,{log_level}");

    #[allow(clippy::expect_used)]
    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_new(env_filter).expect("could not parse log level in configuration"),
        )
        .without_time()
        .event_format(logger::Formatter)
        .finish();

    #[allow(clippy::expect_used)]
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    debug!("Logging subsystem enabled");

    let result = run().await;
    match &result {
        Ok(exit) => debug!("Extension loop ended: {exit:?}"),
        Err(e) => error!("{e:#}"),
    }
    let code = exit_code(&result);
    if code != 0 {
        process::exit(code);
    }
}

/// Only startup failures are abnormal. Every way the event loop can end,
/// including a failed next-event call, is a clean exit.
fn exit_code(result: &anyhow::Result<LifecycleExit>) -> i32 {
    match result {
        Ok(LifecycleExit::Shutdown | LifecycleExit::Cancelled | LifecycleExit::Failed) => 0,
        Err(_) => 1,
    }
}

async fn run() -> anyhow::Result<LifecycleExit> {
    let config = Config::new().context("Error loading config")?;
    let name = extension_name();
    info!("Starting {name}");

    let cancel = CancellationToken::new();
    spawn_signal_watcher(cancel.clone())?;

    let client = ExtensionClient::new(&config.runtime_api, config.next_event_timeout)
        .context("Error creating Extensions API client")?;
    let loki = LokiClient::new(config.loki(), info_span!("loki"))
        .context("Error creating Loki client")?;

    let queue = LogQueue::new();
    let receiver_shutdown = CancellationToken::new();
    let flusher = LogsFlusher::new(queue.clone(), loki, info_span!("flusher"));
    let mut lifecycle = Lifecycle::new(
        client,
        flusher,
        receiver_shutdown.clone(),
        info_span!("extension", name = %name),
    );

    let extension_id = lifecycle
        .register(&name)
        .await
        .context("Error registering extension")?;

    let receiver = match LogsReceiver::bind(
        config.logs_receiver_port,
        queue,
        receiver_shutdown.clone(),
        info_span!("receiver"),
    )
    .await
    {
        Ok(receiver) => receiver,
        Err(e) => {
            report_init_error(&lifecycle, &format!("Error binding logs receiver: {e}")).await;
            return Err(e).context("Error binding logs receiver");
        }
    };
    let receiver_handle = tokio::spawn(receiver.serve());

    let subscription = SubscriptionRequest::for_port(config.logs_receiver_port);
    if let Err(e) = subscribe_logs(&config.runtime_api, &extension_id, &subscription).await {
        report_init_error(&lifecycle, &format!("Error subscribing to Logs API: {e}")).await;
        receiver_shutdown.cancel();
        return Err(e).context("Error subscribing to Logs API");
    }

    let exit = lifecycle.run(cancel).await;
    receiver_shutdown.cancel();
    match receiver_handle.await {
        Ok(Ok(())) => debug!("Logs receiver stopped"),
        Ok(Err(e)) => error!("Logs receiver failed: {e}"),
        Err(e) => error!("Logs receiver task failed: {e}"),
    }

    Ok(exit)
}

async fn report_init_error(lifecycle: &Lifecycle<ExtensionClient>, message: &str) {
    if let Err(e) = lifecycle
        .api()
        .init_error(SUBSCRIPTION_ERROR_TYPE, message)
        .await
    {
        warn!("Failed to report init error: {e}");
    }
}

/// The platform expects the name the extension was launched under.
fn extension_name() -> String {
    let arg0 = env::args().next().unwrap_or_default();
    Path::new(&arg0)
        .file_name()
        .and_then(|name| name.to_str())
        .filter(|name| !name.is_empty())
        .unwrap_or(DEFAULT_EXTENSION_NAME)
        .to_string()
}

fn spawn_signal_watcher(cancel: CancellationToken) -> anyhow::Result<()> {
    let mut sigterm = signal(SignalKind::terminate()).context("Error installing SIGTERM handler")?;
    let mut sigint = signal(SignalKind::interrupt()).context("Error installing SIGINT handler")?;
    tokio::spawn(async move {
        tokio::select! {
            _ = sigterm.recv() => info!("Received SIGTERM"),
            _ = sigint.recv() => info!("Received SIGINT"),
        }
        cancel.cancel();
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loop_exits_are_clean() {
        assert_eq!(exit_code(&Ok(LifecycleExit::Shutdown)), 0);
        assert_eq!(exit_code(&Ok(LifecycleExit::Cancelled)), 0);
        assert_eq!(exit_code(&Ok(LifecycleExit::Failed)), 0);
    }

    #[test]
    fn test_startup_failure_exits_non_zero() {
        let result: anyhow::Result<LifecycleExit> =
            Err(anyhow::anyhow!("Error registering extension"));
        assert_eq!(exit_code(&result), 1);
    }
}
