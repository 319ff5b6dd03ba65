use anyhow::{Context, Result};
use arboard::Clipboard;
use client_core::ClipboardSink;

/// Opens a fresh handle per write, the way short-lived copy actions are done elsewhere in the UI.
pub struct SystemClipboard;

impl SystemClipboard {
    /// Fails on hosts without a reachable clipboard (headless sessions, no display server).
    pub fn probe() -> Result<Self> {
        Clipboard::new().context("system clipboard is not available")?;
        Ok(Self)
    }
}

impl ClipboardSink for SystemClipboard {
    fn set_text(&self, text: &str) -> Result<()> {
        let mut clipboard = Clipboard::new().context("failed to open system clipboard")?;
        clipboard
            .set_text(text.to_string())
            .context("failed to write to system clipboard")
    }
}
