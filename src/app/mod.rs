mod commands;
mod console;
mod orchestrator;
mod runtime;
mod shutdown;
mod startup;
mod types;

#[cfg(test)]
mod tests;

pub use console::{ConsoleDisplay, ConsoleSurface};
pub use orchestrator::CamsightApp;
pub use types::{AppCommand, ShutdownReason};
