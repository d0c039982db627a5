//! Colored rendering of node diagnostics.

use std::fmt::Write;

use owo_colors::OwoColorize;
use rosterforge_scope::NodeDump;

/// Renders a [`NodeDump`] for a terminal.
///
/// Carries the same lines as the dump's `Display` output, with violated
/// constraints highlighted and listener-free buckets dimmed.
pub fn render_dump(dump: &NodeDump) -> String {
    let mut out = String::new();
    let hidden = if dump.hidden {
        " [hidden]".bright_black().to_string()
    } else {
        String::new()
    };
    let _ = writeln!(
        out,
        "{} {} {} \"{}\"{}",
        dump.node.to_string().bright_black(),
        dump.def_id.bright_cyan().bold(),
        format!("({:?})", dump.kind).bright_black(),
        dump.name.white().bold(),
        hidden,
    );

    let enabled = if dump.enabled {
        "enabled".green().to_string()
    } else {
        "disabled".yellow().to_string()
    };
    let subscriptions = if dump.subscriptions < 0 {
        dump.subscriptions.bright_red().bold().to_string()
    } else {
        dump.subscriptions.to_string()
    };
    let _ = writeln!(
        out,
        "  amount {} │ propagate {} │ {} │ {} subscriptions",
        dump.amount.bright_yellow(),
        dump.propagate_amount.bright_yellow(),
        enabled,
        subscriptions,
    );

    if !dump.filters.is_empty() {
        let _ = writeln!(out, "  filters {}", dump.filters.join(", ").bright_black());
    }
    if !dump.categories.is_empty() {
        let _ = writeln!(out, "  categories {}", dump.categories.join(", ").magenta());
    }
    for (type_id, total) in &dump.total_costs {
        let unit = dump.unit_costs.get(type_id).copied().unwrap_or(0.0);
        let _ = writeln!(
            out,
            "  cost {} │ unit {} │ total {}",
            type_id.bright_white(),
            unit,
            total.bright_yellow().bold(),
        );
    }

    if !dump.buckets.is_empty() {
        let _ = writeln!(out, "  {}", "buckets".underline());
        for (hash, value) in &dump.buckets {
            let listeners = dump.listeners.get(hash).copied().unwrap_or(0);
            let line = format!("{hash} = {value}");
            if listeners == 0 {
                let _ = writeln!(out, "    {}", line.bright_black());
            } else {
                let _ = writeln!(out, "    {} {}", line, format!("({listeners} listener(s))").cyan());
            }
        }
    }

    for c in &dump.constraints {
        let status = if c.violated {
            "VIOLATED".bright_red().bold().to_string()
        } else {
            "ok".green().to_string()
        };
        let extra = if c.extra { " (extra)" } else { "" };
        let _ = writeln!(
            out,
            "  {:?} {}{} on {}@{} │ {} vs {} │ {}",
            c.kind,
            c.id.white().bold(),
            extra,
            c.hash,
            c.scope,
            c.observed,
            c.limit,
            status,
        );
    }

    for m in &dump.modifiers {
        let times = if m.times > 0.0 {
            format!("x{}", m.times).green().to_string()
        } else {
            format!("x{}", m.times).bright_black().to_string()
        };
        let _ = writeln!(
            out,
            "  modifier {:?} {} {} {} {}",
            m.target, m.op, m.field, m.value, times
        );
    }
    out
}
