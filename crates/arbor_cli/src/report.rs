//! Plain-text rendering for terminal output.

use arbor_log::{Event, StablePeriod, Timeline};
use arbor_replay::Snapshot;
use std::fmt::Write as _;

/// Corpus overview
pub fn summary(timeline: &Timeline, stable: Option<StablePeriod>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "events: {}", timeline.len());
    let _ = writeln!(out, "structural events: {}", timeline.structural().len());
    if let (Some(start), Some(end)) = (timeline.start_time(), timeline.end_time()) {
        let _ = writeln!(out, "start: {start}");
        let _ = writeln!(out, "end: {end}");
    }
    let _ = writeln!(out, "duration: {} ms", timeline.duration_millis());
    match stable {
        Some(period) => {
            let _ = write!(
                out,
                "stable position: {} (quiet for {} ms)",
                period.index, period.gap_millis
            );
        }
        None => out.push_str("stable position: none"),
    }
    out
}

/// One event list row: index, offset from the first event, event
pub fn event_row(timeline: &Timeline, event: &Event) -> String {
    let index = event.index.unwrap_or_default();
    let offset = timeline.offset_millis(index).unwrap_or_default();
    format!("{index:>6} {offset:>+9}ms  {event}")
}

/// Vertex table followed by the edge list
pub fn snapshot(snapshot: &Snapshot<'_>) -> String {
    let mut out = String::new();
    match snapshot.index() {
        Some(index) => {
            let _ = writeln!(out, "at event {index}");
        }
        None => out.push_str("before first event\n"),
    }

    let _ = writeln!(out, "vertices: {}", snapshot.vertex_count());
    for v in snapshot.vertices() {
        let _ = writeln!(
            out,
            "  {:<4} {:<16} {:<15} {:<8} {:<17}{}",
            v.short_label(),
            v.node,
            v.address,
            v.manager_state.literal(),
            v.tree_state.literal(),
            if v.alive { "" } else { " dead" },
        );
    }

    let _ = write!(out, "edges: {}", snapshot.edge_count());
    for e in snapshot.edges() {
        let origin = snapshot.vertex(e.origin).map_or("?", |v| v.node.as_str());
        let destination = snapshot.vertex(e.destination).map_or("?", |v| v.node.as_str());
        let _ = write!(out, "\n  {origin} -> {destination} {:?}", e.kind);
    }
    out
}
