use crate::app::AppCommand;
use crate::error::Result;
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Reads key presses in raw mode and forwards them as app commands
pub struct KeyboardInputHandler {
    commands: mpsc::Sender<AppCommand>,
    cancellation_token: CancellationToken,
}

impl KeyboardInputHandler {
    pub fn new(commands: mpsc::Sender<AppCommand>) -> Self {
        Self {
            commands,
            cancellation_token: CancellationToken::new(),
        }
    }

    /// Map a key to a command. Digits 1-9 toggle categories, 0 clears.
    pub fn map_key(code: KeyCode, modifiers: KeyModifiers) -> Option<AppCommand> {
        if modifiers.contains(KeyModifiers::CONTROL) && code == KeyCode::Char('c') {
            return Some(AppCommand::Quit);
        }

        match code {
            KeyCode::Char(digit @ '1'..='9') => {
                Some(AppCommand::ToggleCategory(digit as usize - '1' as usize))
            }
            KeyCode::Char('0') => Some(AppCommand::ClearSelection),
            KeyCode::Char('*') => Some(AppCommand::SelectAll),
            KeyCode::Char('a') => Some(AppCommand::Acquire),
            KeyCode::Char('c') | KeyCode::Char(' ') => Some(AppCommand::CaptureAndAnalyze),
            KeyCode::Char('d') => Some(AppCommand::Describe),
            KeyCode::Char('p') => Some(AppCommand::TogglePause),
            KeyCode::Char('s') => Some(AppCommand::SwitchFacing),
            KeyCode::Char('r') => Some(AppCommand::Restart),
            KeyCode::Char('x') => Some(AppCommand::Stop),
            KeyCode::Char('q') | KeyCode::Esc => Some(AppCommand::Quit),
            _ => None,
        }
    }

    /// Start listening for keyboard input
    pub async fn start(&self) -> Result<()> {
        info!("Starting keyboard input handler");

        let commands = self.commands.clone();
        let cancellation_token = self.cancellation_token.clone();

        task::spawn_blocking(move || {
            if let Err(e) = enable_raw_mode() {
                error!("Failed to enable raw mode for keyboard input: {}", e);
                return;
            }

            debug!("Raw mode enabled - keyboard handler active");

            loop {
                if cancellation_token.is_cancelled() {
                    debug!("Keyboard input handler stopping");
                    break;
                }

                match event::poll(Duration::from_millis(100)) {
                    Ok(true) => {
                        let Ok(Event::Key(key_event)) = event::read() else {
                            continue;
                        };
                        // Only handle key press events (not release)
                        if key_event.kind != KeyEventKind::Press {
                            continue;
                        }

                        let Some(command) = Self::map_key(key_event.code, key_event.modifiers)
                        else {
                            debug!("Key pressed: {:?}", key_event.code);
                            continue;
                        };

                        if commands.blocking_send(command).is_err() {
                            debug!("Command channel closed");
                            break;
                        }
                        if command == AppCommand::Quit {
                            break;
                        }
                    }
                    Ok(false) => {}
                    Err(e) => {
                        warn!("Error polling for keyboard events: {}", e);
                    }
                }
            }

            if let Err(e) = disable_raw_mode() {
                error!("Failed to disable raw mode: {}", e);
            } else {
                debug!("Raw mode disabled");
            }

            debug!("Keyboard input handler task exited");
        });

        Ok(())
    }

    /// Stop the keyboard input handler
    pub async fn stop(&self) -> Result<()> {
        info!("Stopping keyboard input handler");
        self.cancellation_token.cancel();

        // Give the task a moment to clean up and disable raw mode
        tokio::time::sleep(Duration::from_millis(200)).await;

        // Ensure raw mode is disabled even if the task didn't clean up properly
        let _ = disable_raw_mode();

        Ok(())
    }
}
