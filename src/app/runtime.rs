use super::console::{help_lines, print_lines, ConsoleDisplay};
use super::{AppCommand, CamsightApp, ShutdownReason};
use crate::analysis::{BatchReport, SingleResult};
use crate::error::{CamsightError, Result};
use std::sync::Arc;
use tokio::signal;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

impl CamsightApp {
    /// Run with the console display and keyboard until the user quits or
    /// a signal arrives
    pub async fn run_interactive(&mut self) -> Result<i32> {
        let (commands_tx, commands_rx) = mpsc::channel(32);

        let display = ConsoleDisplay::spawn(&self.event_bus, self.cancellation_token.clone());
        print_lines(&help_lines(self.selection.categories()));

        self.start(Some(commands_tx)).await?;
        let exit_code = self.run(commands_rx).await?;

        if let Err(e) = display.await {
            warn!("Console display task failed: {}", e);
        }
        Ok(exit_code)
    }

    /// Main loop: apply commands, watch for track loss, wait for shutdown
    pub async fn run(&mut self, mut commands: mpsc::Receiver<AppCommand>) -> Result<i32> {
        info!("Camsight is running");

        let shutdown_sender = self
            .shutdown_sender
            .take()
            .ok_or_else(|| CamsightError::system("Shutdown sender already taken"))?;

        let mut shutdown_receiver = self
            .shutdown_receiver
            .take()
            .ok_or_else(|| CamsightError::system("Shutdown receiver already taken"))?;

        self.setup_signal_handlers(shutdown_sender);

        let reason = loop {
            let track_ended = self.session.track_ended_signal();

            tokio::select! {
                reason = &mut shutdown_receiver => {
                    break reason.unwrap_or_else(|_| {
                        ShutdownReason::Error("Shutdown channel closed unexpectedly".to_string())
                    });
                }
                command = commands.recv() => match command {
                    Some(command) => {
                        if !self.handle_command(command).await {
                            break ShutdownReason::UserRequest;
                        }
                    }
                    None => break ShutdownReason::UserRequest,
                },
                _ = wait_for_track_end(track_ended) => {
                    self.session.handle_track_ended().await;
                }
            }
        };

        info!("Shutdown initiated: {}", reason);

        let exit_code = self.shutdown(reason).await?;

        info!("Camsight shutdown complete");
        Ok(exit_code)
    }

    /// Acquire, analyze the given categories once, release
    pub async fn run_once(&mut self, categories: &[String]) -> Result<BatchReport> {
        self.start(None).await?;
        let report = self.analyze(categories).await;
        self.shutdown(ShutdownReason::UserRequest).await?;
        report
    }

    /// Acquire, describe the frame once, release
    pub async fn describe_once(&mut self) -> Result<SingleResult> {
        self.start(None).await?;
        let result = self.describe().await;
        self.shutdown(ShutdownReason::UserRequest).await?;
        result
    }

    /// Set up signal handlers for graceful shutdown
    fn setup_signal_handlers(&self, shutdown_sender: oneshot::Sender<ShutdownReason>) {
        let shutdown_sender = Arc::new(Mutex::new(Some(shutdown_sender)));

        // Handle SIGTERM - Unix only
        #[cfg(unix)]
        {
            match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    let shutdown_sender_sigterm = Arc::clone(&shutdown_sender);
                    tokio::spawn(async move {
                        if sigterm.recv().await.is_some() {
                            info!("Received SIGTERM signal");
                            if let Some(sender) = shutdown_sender_sigterm.lock().await.take() {
                                let _ = sender.send(ShutdownReason::Signal("SIGTERM".to_string()));
                            }
                        }
                    });
                }
                Err(e) => warn!("Failed to register SIGTERM handler: {}", e),
            }
        }

        // Handle SIGINT (Ctrl+C) - Cross-platform
        let shutdown_sender_sigint = Arc::clone(&shutdown_sender);
        tokio::spawn(async move {
            if let Ok(()) = signal::ctrl_c().await {
                info!("Received SIGINT signal (Ctrl+C)");
                if let Some(sender) = shutdown_sender_sigint.lock().await.take() {
                    let _ = sender.send(ShutdownReason::Signal("SIGINT".to_string()));
                }
            }
        });
    }
}

async fn wait_for_track_end(token: Option<CancellationToken>) {
    match token {
        Some(token) => token.cancelled().await,
        None => std::future::pending().await,
    }
}
