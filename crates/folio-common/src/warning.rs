//! Recoverable-condition reporting with colored terminal output.
//!
//! Layout and style resolution run to completion past anything that is not
//! fatal: an unknown tag, an unsupported property value, content wider than
//! the page. Each such condition is reported here exactly once per unique
//! message so a document with ten thousand identical declarations does not
//! emit ten thousand lines.

use std::collections::HashSet;
use std::sync::Mutex;

/// ANSI color codes for terminal output
const YELLOW: &str = "\x1b[33m";
const RESET: &str = "\x1b[0m";

/// Messages already emitted, for deduplication across the whole process.
static EMITTED: Mutex<Option<HashSet<String>>> = Mutex::new(None);

/// Report a recoverable condition (prints once per unique message).
///
/// The `component` tag names the subsystem ("style", "layout", "table", ...)
/// so the source of a fallback is visible at a glance.
///
/// # Example
/// ```ignore
/// warn_once("style", "unsupported float value 'center', treating as none");
/// ```
///
/// # Panics
/// Panics if the global dedup set mutex is poisoned.
pub fn warn_once(component: &str, message: &str) {
    let key = format!("[{component}] {message}");
    let first_time = EMITTED
        .lock()
        .unwrap()
        .get_or_insert_with(HashSet::new)
        .insert(key);

    if first_time {
        eprintln!("{YELLOW}[folio {component}] {message}{RESET}");
    }
}

/// Forget all recorded messages (call when starting a new document).
///
/// # Panics
/// Panics if the global dedup set mutex is poisoned.
pub fn clear_warnings() {
    let mut guard = EMITTED.lock().unwrap();
    if let Some(set) = guard.as_mut() {
        set.clear();
    }
}
