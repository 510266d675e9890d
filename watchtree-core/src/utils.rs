//! Helpers around the monitor tree: name checks, subtree aggregation and a
//! plain-text tree dump.

use std::fmt::Write as _;

use watchtree_types::{
    CounterAggregate, Nanos, Sample, StopwatchAggregate, HIERARCHY_DELIMITER,
};

use crate::error::MonitorError;
use crate::monitor::Monitor;
use crate::pattern::Pattern;

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || "-_[].,@$%()<>".contains(c)
}

/// Whether `name` is a non-empty string of allowed name characters.
pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(is_name_char)
}

/// Like [`is_valid_name`] but also accepts the empty string, for the
/// literal parts of a pattern.
pub fn is_valid_name_part(part: &str) -> bool {
    part.chars().all(is_name_char)
}

pub fn check_name(name: &str) -> Result<(), MonitorError> {
    if is_valid_name(name) {
        Ok(())
    } else {
        Err(MonitorError::InvalidName(name.to_string()))
    }
}

/// Last segment of a dotted name.
pub fn local_name(name: &str) -> &str {
    match name.rfind(HIERARCHY_DELIMITER) {
        Some(ix) => &name[ix + HIERARCHY_DELIMITER.len_utf8()..],
        None => name,
    }
}

/// Resets `monitor` and every monitor below it, one at a time.
pub fn recursive_reset(monitor: &dyn Monitor) {
    monitor.reset();
    for child in monitor.children() {
        recursive_reset(child.as_monitor());
    }
}

fn walk(monitor: &dyn Monitor, visit: &mut dyn FnMut(&dyn Monitor)) {
    visit(monitor);
    for child in monitor.children() {
        walk(child.as_monitor(), visit);
    }
}

/// Folds the samples of every stopwatch in the subtree, optionally only the
/// ones `filter` matches.
pub fn aggregate_stopwatches(root: &dyn Monitor, filter: Option<&Pattern>) -> StopwatchAggregate {
    let mut aggregate = StopwatchAggregate::new();
    walk(root, &mut |monitor| {
        if filter.is_some_and(|p| !p.matches_monitor(monitor)) {
            return;
        }
        if let Some(stopwatch) = monitor.as_stopwatch() {
            aggregate.add_sample(&stopwatch.sample_stopwatch());
        }
    });
    aggregate
}

/// Folds the samples of every counter in the subtree, optionally only the
/// ones `filter` matches.
pub fn aggregate_counters(root: &dyn Monitor, filter: Option<&Pattern>) -> CounterAggregate {
    let mut aggregate = CounterAggregate::new();
    walk(root, &mut |monitor| {
        if filter.is_some_and(|p| !p.matches_monitor(monitor)) {
            return;
        }
        if let Some(counter) = monitor.as_counter() {
            aggregate.add_sample(&counter.sample_counter());
        }
    });
    aggregate
}

/// Human-readable nanoseconds, e.g. `12.3 ms`.
pub fn present_nanos(nanos: u64) -> String {
    Nanos(nanos).to_string()
}

fn summary(sample: &Sample) -> String {
    match sample {
        Sample::Counter(c) => match (c.defined_min(), c.defined_max()) {
            (Some(min), Some(max)) => format!("counter={} min={} max={}", c.counter, min, max),
            _ => format!("counter={}", c.counter),
        },
        Sample::Stopwatch(s) => format!(
            "count={} total={} mean={} active={}",
            s.counter,
            Nanos(s.total),
            Nanos(s.mean as u64),
            s.active
        ),
        Sample::Unknown(_) => "unknown".to_string(),
    }
}

/// Renders the subtree, one monitor per line, children indented by two
/// spaces: `local(+): summary` where `+`/`-` is the effective state.
/// Returns `None` for anonymous monitors.
pub fn tree_string(root: &dyn Monitor) -> Option<String> {
    root.name()?;
    let mut out = String::new();
    print_tree(0, root, &mut out);
    Some(out)
}

fn print_tree(level: usize, monitor: &dyn Monitor, out: &mut String) {
    let name = monitor.name().unwrap_or_default();
    let _ = writeln!(
        out,
        "{}{}({}): {}",
        "  ".repeat(level),
        local_name(name),
        if monitor.is_enabled() { '+' } else { '-' },
        summary(&monitor.sample())
    );
    for child in monitor.children() {
        print_tree(level + 1, child.as_monitor(), out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::node::testing::Fixture;
    use crate::monitor::{Counter, Stopwatch};
    use watchtree_types::{MonitorKind, MonitorState};

    #[test]
    fn validates_names() {
        assert!(is_valid_name("org.example.Service[2](x)@host,$%<>-_"));
        assert!(!is_valid_name(""));
        assert!(!is_valid_name("has space"));
        assert!(!is_valid_name("star*"));
        assert!(is_valid_name_part(""));
        assert!(matches!(
            check_name("a/b"),
            Err(MonitorError::InvalidName(name)) if name == "a/b"
        ));
    }

    #[test]
    fn local_name_is_last_segment() {
        assert_eq!(local_name("org.example.db"), "db");
        assert_eq!(local_name("single"), "single");
        assert_eq!(local_name(""), "");
    }

    #[test]
    fn presents_nanos() {
        assert_eq!(present_nanos(1_500_000), "1.50 ms");
        assert_eq!(present_nanos(u64::MAX), "undef");
    }

    fn small_tree(fx: &Fixture) -> std::sync::Arc<crate::monitor::MonitorNode> {
        let root = fx.root();
        let db = fx.node("db", MonitorKind::Unknown);
        let query = fx.node("db.query", MonitorKind::Stopwatch);
        let update = fx.node("db.update", MonitorKind::Stopwatch);
        let hits = fx.node("hits", MonitorKind::Counter);
        root.link_child(&db);
        db.link_child(&query);
        db.link_child(&update);
        root.link_child(&hits);

        query.add_time(10);
        query.add_time(30);
        update.add_time(20);
        hits.increase_by(4);
        root
    }

    #[test]
    fn aggregates_subtree() {
        let fx = Fixture::new();
        let root = small_tree(&fx);

        let all = aggregate_stopwatches(root.as_monitor(), None);
        assert_eq!(all.counter(), 3);
        assert_eq!(all.total(), 60);
        assert_eq!(all.min(), 10);
        assert_eq!(all.max(), 30);

        let pattern = Pattern::new("db.upd*").unwrap();
        let filtered = aggregate_stopwatches(root.as_monitor(), Some(&pattern));
        assert_eq!(filtered.counter(), 1);

        let counters = aggregate_counters(root.as_monitor(), None);
        assert_eq!(counters.counter(), 4);
    }

    #[test]
    fn recursive_reset_clears_descendants() {
        let fx = Fixture::new();
        let root = small_tree(&fx);
        recursive_reset(root.as_monitor());
        assert_eq!(aggregate_stopwatches(root.as_monitor(), None).counter(), 0);
        assert_eq!(aggregate_counters(root.as_monitor(), None).counter(), 0);
    }

    #[test]
    fn tree_string_indents_children() {
        let fx = Fixture::new();
        let root = small_tree(&fx);
        let hits = root
            .child_nodes()
            .into_iter()
            .find(|c| c.name() == Some("hits"))
            .unwrap();
        hits.set_state(MonitorState::Disabled, false);

        let text = tree_string(root.as_monitor()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[0], "(+): unknown");
        assert_eq!(lines[1], "  db(+): unknown");
        assert!(lines[2].starts_with("    query(+): count=2"));
        assert_eq!(lines[4], "  hits(-): counter=4 min=4 max=4");
    }
}
