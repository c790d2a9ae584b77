//! Literal patterns compiled once per process.

use regex::Regex;
use std::sync::OnceLock;

/// Compile `pattern` into `cell` on first use and hand out the shared copy.
///
/// Every caller passes a literal, so `None` means a pattern typo; callers
/// treat it as "no match".
pub fn compiled(cell: &'static OnceLock<Option<Regex>>, pattern: &str) -> Option<&'static Regex> {
    cell.get_or_init(|| Regex::new(pattern).ok()).as_ref()
}
