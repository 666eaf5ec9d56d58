//! Text rendering of run reports.
//!
//! Pure formatting over finished reports; nothing here touches the engine.

use stalemate_core::{ConcurrentReport, DeadlockInfo, Event, MetricsSummary, Report, StateSnapshot};
use std::fmt::Write;

/// Per-step state table.
pub fn state_table(snapshot: &StateSnapshot) -> String {
    let mut out = String::from("State table:\n  t  | pid | held         | requested   | state\n");
    for row in &snapshot.processes {
        let held = if row.held.is_empty() { "-".to_string() } else { row.held.join(",") };
        let requested = row.requested.as_deref().unwrap_or("-");
        let _ = writeln!(
            out,
            "  {:02} | {:>3} | {:>12} | {:>11} | {}",
            snapshot.t, row.pid, held, requested, row.state
        );
    }
    out.push('-');
    out
}

/// Wait-for graph edges and the detected cycle.
pub fn wait_for_graph(deadlock: &DeadlockInfo) -> String {
    let mut out = String::from("Wait-for graph:\n");
    for [from, to] in &deadlock.edges {
        let _ = writeln!(out, "  {} -> {}", from, to);
    }
    if let Some(first) = deadlock.cycle.first() {
        let _ = writeln!(out, "Cycle: {} -> {}", deadlock.cycle.join(" -> "), first);
    }
    out.trim_end().to_string()
}

/// Aggregate metrics block of a discrete run.
pub fn summary(report: &Report) -> String {
    let m = &report.metrics;
    [
        "Simulation summary:".to_string(),
        format!("  mode: {}", report.mode),
        format!("  processes: {}", m.processes),
        format!("  resources: {}", m.resources),
        format!("  steps executed: {}", m.steps_executed),
        format!("  completed processes: {}", m.completed_processes),
        format!("  deadlocks detected: {}", m.deadlocks_detected),
        format!("  average waiting time (steps) per blocked process: {:.2}", m.average_waiting_time),
        format!("  time blocked (%): {:.1}%", m.time_blocked_pct),
    ]
    .join("\n")
}

/// Full transcript of a discrete run: each step's events, then its state
/// table, then the wait-for graph at the step that deadlocked.
pub fn discrete_transcript(report: &Report) -> String {
    let mut out = String::new();
    let mut events = report.events.iter().peekable();

    for snapshot in &report.state_history {
        while let Some(event) = events.next_if(|e| e.time <= snapshot.t) {
            push_event(&mut out, event);
        }
        out.push_str(&state_table(snapshot));
        out.push('\n');
        if let Some(deadlock) = report.deadlock.as_ref().filter(|d| d.t == snapshot.t) {
            out.push_str(&wait_for_graph(deadlock));
            out.push('\n');
        }
    }
    for event in events {
        push_event(&mut out, event);
    }
    out.push_str(&summary(report));
    out
}

fn push_event(out: &mut String, event: &Event) {
    out.push_str(&event.message);
    out.push('\n');
}

/// Metrics summary of a concurrent run, tagged with the scenario name.
pub fn concurrent_summary(report: &ConcurrentReport, tag: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "[SUMMARY] Total scenario time: {:.2}s", report.duration);

    if report.telemetry_lost {
        let _ = writeln!(out, "[SUMMARY] Telemetry disabled: worker metrics were not collected.");
    }

    for m in &report.metrics {
        let _ = writeln!(
            out,
            " - {}: status={}, duration={}, wait={}, retries={}",
            m.name,
            m.status,
            seconds(m.duration),
            seconds(m.wait_time),
            m.retries
        );
    }

    let mut expected: Vec<String> = report.metrics.iter().map(|m| m.name.clone()).collect();
    expected.extend(report.missing.iter().cloned());
    let stats = MetricsSummary::compute(&report.metrics, &expected);
    if !stats.missing.is_empty() {
        let _ = writeln!(out, " - No telemetry (terminated?): {}", stats.missing.join(", "));
    }
    if !report.deadlocked.is_empty() {
        let _ = writeln!(out, " - Deadlocked: {}", report.deadlocked.join(", "));
    }
    for leak in &report.leaked {
        let _ = writeln!(out, " - Leaked: {} still held by {}", leak.resource, leak.holder);
    }

    if let Some(avg) = stats.average_retries {
        let _ = writeln!(out, "[{}] Average retries: {:.1}", tag, avg);
    }
    if let Some(avg) = stats.average_duration {
        let _ = writeln!(out, "[{}] Average total time: {:.2}s", tag, avg);
    }
    if let Some(avg) = stats.average_wait_time {
        let _ = writeln!(out, "[{}] Average time waiting for resources: {:.2}s", tag, avg);
    }
    out.trim_end().to_string()
}

fn seconds(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{:.2}s", v))
}

#[cfg(test)]
mod tests {
    use super::*;
    use stalemate_core::{
        AggregateMetrics, EventKind, LeakedResource, ProcessState, WorkerMetrics,
    };
    use stalemate_core::report::ProcessSnapshot;

    fn snapshot(t: u64) -> StateSnapshot {
        StateSnapshot {
            t,
            processes: vec![
                ProcessSnapshot {
                    pid: "P1".into(),
                    held: vec!["R1".into()],
                    requested: Some("R2".into()),
                    state: ProcessState::Blocked,
                },
                ProcessSnapshot {
                    pid: "P2".into(),
                    held: vec![],
                    requested: None,
                    state: ProcessState::Finished,
                },
            ],
        }
    }

    fn deadlock() -> DeadlockInfo {
        DeadlockInfo {
            t: 1,
            edges: vec![["P1".into(), "P2".into()], ["P2".into(), "P1".into()]],
            cycle: vec!["P1".into(), "P2".into()],
        }
    }

    #[test]
    fn test_state_table_rows() {
        let table = state_table(&snapshot(3));
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 5);
        assert!(lines[2].starts_with("  03 |  P1 |"));
        assert!(lines[2].ends_with("R2 | BLOCKED"));
        assert!(lines[3].contains("|            - |           - | FINISHED"));
        assert_eq!(lines[4], "-");
    }

    #[test]
    fn test_wait_for_graph_closes_cycle() {
        let text = wait_for_graph(&deadlock());
        assert!(text.contains("  P1 -> P2"));
        assert!(text.ends_with("Cycle: P1 -> P2 -> P1"));
    }

    #[test]
    fn test_transcript_interleaves_events() {
        let report = Report {
            mode: "naive".into(),
            metrics: AggregateMetrics {
                processes: 2,
                resources: 2,
                steps_executed: 2,
                completed_processes: 0,
                deadlocks_detected: 1,
                average_waiting_time: 1.5,
                time_blocked_pct: 50.0,
            },
            events: vec![
                Event::new(0, EventKind::Start, "start"),
                Event::new(1, EventKind::Deadlock, "*** Deadlock detected at t=1 ***"),
            ],
            state_history: vec![snapshot(0), snapshot(1)],
            deadlock: Some(deadlock()),
        };
        let text = discrete_transcript(&report);
        let start = text.find("start").unwrap();
        let first_table = text.find("State table:").unwrap();
        let deadlock_msg = text.find("*** Deadlock").unwrap();
        let graph = text.find("Wait-for graph:").unwrap();
        assert!(start < first_table);
        assert!(first_table < deadlock_msg);
        assert!(deadlock_msg < graph);
        assert!(text.ends_with("time blocked (%): 50.0%"));
        assert!(text.contains("average waiting time (steps) per blocked process: 1.50"));
    }

    #[test]
    fn test_concurrent_summary_notes_missing_and_leaks() {
        let report = ConcurrentReport {
            mode: "naive".into(),
            duration: 5.0,
            metrics: vec![WorkerMetrics::error("P1", 0), WorkerMetrics::ok("P3", 2, 1.6, 0.4)],
            missing: vec!["P2".into()],
            deadlocked: vec!["P1".into(), "P2".into()],
            leaked: vec![LeakedResource {
                resource: "A".into(),
                holder: "P1".into(),
            }],
            telemetry_lost: false,
            events: vec![],
        };
        let text = concurrent_summary(&report, "naive");
        assert!(text.contains(" - P1: status=error, duration=-, wait=-, retries=0"));
        assert!(text.contains(" - P3: status=ok, duration=1.60s, wait=0.40s, retries=2"));
        assert!(text.contains("No telemetry (terminated?): P2"));
        assert!(text.contains("Leaked: A still held by P1"));
        assert!(text.contains("[naive] Average retries: 1.0"));
        assert!(!text.contains("Telemetry disabled"));
    }

    #[test]
    fn test_concurrent_summary_telemetry_lost() {
        let report = ConcurrentReport {
            mode: "ordered".into(),
            duration: 1.234,
            metrics: vec![],
            missing: vec!["P1".into(), "P2".into()],
            deadlocked: vec![],
            leaked: vec![],
            telemetry_lost: true,
            events: vec![],
        };
        let text = concurrent_summary(&report, "ordered");
        assert!(text.starts_with("[SUMMARY] Total scenario time: 1.23s"));
        assert!(text.contains("Telemetry disabled"));
        assert!(text.contains("No telemetry (terminated?): P1, P2"));
        assert!(!text.contains("Average"));
    }
}
