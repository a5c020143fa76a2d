//! Clipboard and paste-automation output.

pub mod clipboard;

pub use clipboard::{CommandExecutor, SystemCommandExecutor, TextOutput};
