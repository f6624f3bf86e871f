use std::io::{self, BufRead, Write};

use client_core::Dialogs;
use tracing::warn;

/// Alerts on stderr, prompts answered from stdin. End of input cancels.
pub struct TerminalDialogs;

impl Dialogs for TerminalDialogs {
    fn alert(&self, message: &str) {
        eprintln!("[alert] {message}");
    }

    fn prompt(&self, message: &str) -> Option<String> {
        let mut stderr = io::stderr();
        let _ = write!(stderr, "{message}");
        let _ = stderr.flush();

        let mut line = String::new();
        match io::stdin().lock().read_line(&mut line) {
            Ok(0) => None,
            Ok(_) => Some(line.trim_end_matches(['\r', '\n']).to_string()),
            Err(err) => {
                warn!("failed to read prompt answer: {err}");
                None
            }
        }
    }
}
