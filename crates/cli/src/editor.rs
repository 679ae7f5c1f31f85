// Text editor lookup for `droppy config`.

use std::path::PathBuf;

/// Tried in order after the user's preferred editor.
pub const FALLBACK_EDITORS: [&str; 7] = ["vim", "nano", "vi", "npp", "pico", "emacs", "notepad"];

/// Ordered candidates: `preferred` first unless it is already a fallback.
pub fn candidates(preferred: Option<&str>) -> Vec<&str> {
    let mut list = Vec::with_capacity(FALLBACK_EDITORS.len() + 1);
    if let Some(editor) = preferred.filter(|e| !e.is_empty() && !FALLBACK_EDITORS.contains(e)) {
        list.push(editor);
    }
    list.extend(FALLBACK_EDITORS);
    list
}

/// First candidate `lookup` resolves to an executable path.
pub fn resolve_with<F>(preferred: Option<&str>, lookup: F) -> Option<PathBuf>
where
    F: Fn(&str) -> Option<PathBuf>,
{
    candidates(preferred).into_iter().find_map(lookup)
}

/// Resolve against `PATH`.
pub fn resolve(preferred: Option<&str>) -> Option<PathBuf> {
    resolve_with(preferred, |name| which::which(name).ok())
}
