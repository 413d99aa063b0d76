use super::{CamsightApp, ShutdownReason};
use crate::error::Result;
use crate::events::CamsightEvent;
use std::time::{Duration, SystemTime};
use tokio::time::timeout;
use tracing::{error, info, warn};

impl CamsightApp {
    /// Release the camera and stop background tasks
    pub async fn shutdown(&mut self, reason: ShutdownReason) -> Result<i32> {
        info!("Beginning graceful shutdown ({})", reason);

        self.event_bus
            .emit(CamsightEvent::ShutdownRequested {
                timestamp: SystemTime::now(),
                reason: reason.to_string(),
            })
            .await;

        // Cancel retries and background tasks
        self.cancellation_token.cancel();

        let mut exit_code = reason.exit_code();

        if let Some(keyboard_handler) = self.keyboard_handler.take() {
            match timeout(Duration::from_secs(2), keyboard_handler.stop()).await {
                Ok(Ok(())) => info!("keyboard component stopped"),
                Ok(Err(e)) => {
                    error!("Error stopping keyboard component: {}", e);
                    exit_code = 1;
                }
                Err(_) => {
                    error!("keyboard component stop timeout");
                    exit_code = 1;
                }
            }
        }

        let mut abandoned = 0;
        for batch in self.batches.drain(..) {
            if !batch.is_finished() {
                batch.abort();
                abandoned += 1;
            }
        }
        if abandoned > 0 {
            warn!("Abandoned {} in-flight analysis batch(es)", abandoned);
        }

        self.session.stop().await;
        self.surface.unmount();
        info!("camera component stopped");

        info!("Graceful shutdown completed with exit code: {}", exit_code);
        Ok(exit_code)
    }
}
