use clap::Parser;
use log::{error, info, warn};
use natwatch::configuration::config::{logger_builder, CliArgs, Config};
use natwatch::controller::actions::{Action, ActionRegistry};
use natwatch::controller::controller_handler::{wait_for_shutdown_signal, Collaborators, Controller};
use natwatch::storage::{FileStorage, Storage};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() {
    logger_builder().init();

    let args = CliArgs::parse();

    info!("Importing configuration from {}", args.config_file.display());
    let config = match Config::load(&args) {
        Ok(c) => c,
        Err(e) => {
            error!("Unable to import configuration: {}", e);
            std::process::exit(1);
        }
    };

    let collaborators = Collaborators::from_config(&config);
    let controller = Arc::new(Controller::new(config, collaborators));
    let shutdown = CancellationToken::new();

    let mut registry = ActionRegistry::new();
    let recording = controller.clone();
    let recording_shutdown = shutdown.clone();
    if let Err(e) = registry.register(Action::Record, move || {
        let controller = recording.clone();
        let shutdown = recording_shutdown.clone();
        async move {
            let storage: Arc<dyn Storage> =
                Arc::new(FileStorage::new(&controller.config().output)?);
            controller.start_recording(storage, shutdown).await
        }
    }) {
        error!("Unable to register action: {}", e);
        std::process::exit(1);
    }

    let analyzing = controller.clone();
    if let Err(e) = registry.register(Action::Analyze, move || {
        let controller = analyzing.clone();
        async move { controller.analyze().map(|_| ()) }
    }) {
        error!("Unable to register action: {}", e);
        std::process::exit(1);
    }

    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        match wait_for_shutdown_signal().await {
            Ok(()) => {
                info!("Signal received, shutting down");
                signal_token.cancel();
            }
            Err(e) => warn!("Unable to listen for shutdown signals: {}", e),
        }
    });

    if let Err(e) = registry.run(args.action).await {
        error!("{}, exiting...", e);
        std::process::exit(1);
    }
    info!("Done");
}
