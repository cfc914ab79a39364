//! Formatted output helpers for CLI commands.
//!
//! Renders plans the same way for `plan` and `apply`: one line per pending
//! change with its marker, then the changed attributes, then a summary.

use std::fmt::Write;

use netform_compose::plan::{Action, Plan, PlannedChange};

/// Renders `plan` for environment `label` as human-readable text.
#[must_use]
pub fn render_plan(label: &str, plan: &Plan) -> String {
    let mut out = String::new();
    if !plan.has_changes() {
        let _ = writeln!(
            out,
            "No changes. Environment \"{label}\" matches its template."
        );
        return out;
    }

    let _ = writeln!(out, "Plan for environment \"{label}\":");
    let _ = writeln!(out);
    for change in plan.pending() {
        let _ = writeln!(out, "{}", change_line(change));
        if change.action != Action::Create && change.action != Action::Delete {
            for attribute in &change.changed {
                let _ = writeln!(out, "        {attribute}");
            }
        }
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "Plan: {}.", plan.summary());
    out
}

fn change_line(change: &PlannedChange) -> String {
    let mut line = format!(
        "  {:>3} {} ({})",
        change.action.symbol(),
        change.address,
        change.action
    );
    if change.drifted {
        line.push_str(" [drifted]");
    }
    line
}
