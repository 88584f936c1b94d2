//! Ordered fallback chains.
//!
//! Values such as the location name or the posted speed can come from several
//! places. Each chain is a list of named sources evaluated top-down; the first
//! one producing a value wins.

use tracing::debug;

/// A named source in a fallback chain.
pub type Source<'a, T> = (&'static str, &'a dyn Fn() -> Option<T>);

/// Returns the first value produced by `sources` and the name of its source.
pub fn resolve<T>(what: &str, sources: &[Source<'_, T>]) -> Option<(T, &'static str)> {
    for (name, source) in sources {
        if let Some(value) = source() {
            debug!(what, source = *name, "Value resolved");
            return Some((value, *name));
        }
    }
    debug!(what, "No source produced a value");
    None
}

/// Like [`resolve`], ending the chain with a hardcoded default.
pub fn resolve_or<T>(what: &str, sources: &[Source<'_, T>], default: T) -> T {
    resolve(what, sources).map_or(default, |(value, _)| value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_first_source_wins() {
        let sources: [Source<'_, u32>; 2] = [("reference", &|| Some(35)), ("other", &|| Some(25))];
        let resolved = resolve("posted_speed", &sources);
        assert_eq!(resolved, Some((35, "reference")));
    }

    #[test]
    fn test_later_sources_not_evaluated_after_hit() {
        let calls = Cell::new(0);
        let second = || {
            calls.set(calls.get() + 1);
            Some("unused".to_string())
        };
        let sources: [Source<'_, String>; 2] = [
            ("metadata", &|| Some("Main St".to_string())),
            ("stem", &second),
        ];
        let value = resolve_or("location", &sources, "x".to_string());
        assert_eq!(value, "Main St");
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn test_default_when_all_sources_empty() {
        let sources: [Source<'_, u32>; 1] = [("reference", &|| None)];
        assert_eq!(resolve_or("posted_speed", &sources, 30), 30);
        assert_eq!(resolve::<u32>("posted_speed", &[]), None);
    }
}
