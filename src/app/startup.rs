use super::{AppCommand, CamsightApp};
use crate::error::Result;
use crate::keyboard_input::KeyboardInputHandler;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

impl CamsightApp {
    /// Mount the capture surface, start the keyboard reader if given a
    /// command channel, then acquire the camera.
    ///
    /// A failed initial acquisition is not fatal: the error is already on
    /// the bus and the user can retry.
    pub async fn start(&mut self, keyboard: Option<mpsc::Sender<AppCommand>>) -> Result<()> {
        info!("Starting camsight");

        self.mount_console_surface();

        if let Some(commands) = keyboard {
            let handler = KeyboardInputHandler::new(commands);
            handler.start().await.map_err(|e| {
                error!("Failed to start keyboard handler: {}", e);
                e
            })?;
            self.keyboard_handler = Some(handler);
            info!("Keyboard input handler started");
        }

        if let Err(e) = self.acquire().await {
            warn!("Initial camera acquisition failed: {}", e);
        }

        info!("Camera is {}", self.session.state());
        Ok(())
    }
}
