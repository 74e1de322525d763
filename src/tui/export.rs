use crate::model::WorkflowConfig;
use anyhow::Result;
use std::sync::mpsc as std_mpsc;
use std::sync::OnceLock;
use std::time::Duration;

use super::state::UiState;

// Global clipboard manager channel - initialized once on first use
static CLIPBOARD_SENDER: OnceLock<std_mpsc::Sender<String>> = OnceLock::new();

/// Save the current workflow as a JSON report in the current directory.
/// Returns the absolute path of the written file.
pub fn save_report(cfg: &WorkflowConfig, state: &UiState) -> Result<std::path::PathBuf> {
    let report = crate::report::build_report(cfg, &state.workflow);
    let path = crate::report::default_export_path(&report)?;
    crate::report::export_json(&path, &report)?;
    Ok(path)
}

/// Save the report and update state.info with the saved path message.
pub fn save_and_show_path(cfg: &WorkflowConfig, state: &mut UiState) {
    match save_report(cfg, state) {
        Ok(path) => {
            state.last_exported_path = Some(path.to_string_lossy().to_string());
            state.info = format!("Saved: {}", path.display());
        }
        Err(e) => {
            state.info = format!("Save failed: {e:#}");
        }
    }
}

/// Initialize the clipboard manager thread if not already initialized.
/// The thread keeps each clipboard instance alive long enough for clipboard managers
/// on Linux to read the contents.
fn init_clipboard_manager() -> Result<&'static std_mpsc::Sender<String>> {
    CLIPBOARD_SENDER.get_or_init(|| {
        let (tx, rx) = std_mpsc::channel::<String>();

        std::thread::spawn(move || {
            use arboard::Clipboard;

            for text in rx {
                if let Ok(mut clipboard) = Clipboard::new() {
                    if clipboard.set_text(&text).is_ok() {
                        std::thread::sleep(Duration::from_secs(2));
                    }
                }
            }
        });

        tx
    });

    CLIPBOARD_SENDER
        .get()
        .ok_or_else(|| anyhow::anyhow!("Failed to initialize clipboard manager"))
}

/// Queue text for the clipboard without blocking the UI thread.
pub fn copy_to_clipboard(text: &str) -> Result<()> {
    let sender = init_clipboard_manager()?;
    sender
        .send(text.to_string())
        .map_err(|_| anyhow::anyhow!("Clipboard manager channel closed"))?;
    Ok(())
}
