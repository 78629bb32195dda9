//! strftime-style timestamp expansion for output URL patterns.
//!
//! SPDX-License-Identifier: GPL-3.0-or-later
//!
//! Grounded in `original_source/src/zcamera.c`'s `outputOpen`, which calls
//! C's `strftime(url, sizeof(url), config->url, &tm)` against local time
//! before opening each output. `chrono`'s `format` conversion specifiers are
//! a superset of C's strftime, so expansion delegates to it directly rather
//! than reimplementing a specifier table.

use chrono::Local;

/// Expands strftime conversion specifiers in `pattern` against the current
/// local time, e.g. `"motion-%Y%m%d-%H%M%S.mp4"` ->
/// `"motion-20260728-143000.mp4"`. Patterns with no specifiers pass through
/// unchanged.
pub fn expand(pattern: &str) -> String {
    Local::now().format(pattern).to_string()
}
