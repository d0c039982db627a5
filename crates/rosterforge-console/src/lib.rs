//! Colorful console output for RosterForge.
//!
//! Provides a custom `tracing` layer that formats engine events with colors,
//! and a colored rendering of node diagnostics.
//!
//! ## Log Levels
//!
//! - **INFO**: Auto-check walks (start/end with counts)
//! - **DEBUG**: Per-node mutations (selections, re-parenting, cost limits)
//! - **TRACE**: Queue drains and bucket changes
//! - **WARN**: Unresolved scopes, unfillable groups, subscription leaks

use num_format::{Locale, ToFormattedString};
use owo_colors::OwoColorize;
use std::io::{self, Write};
use std::sync::OnceLock;
use std::time::Instant;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use rosterforge_config::EngineConfig;

mod render;

pub use render::render_dump;

static INIT: OnceLock<()> = OnceLock::new();
static EPOCH: OnceLock<Instant> = OnceLock::new();

/// Filter used when neither `RUST_LOG` nor the config names one.
pub const DEFAULT_FILTER: &str = "rosterforge_scope=info,rosterforge_autocheck=info";

/// Initializes console output with `RUST_LOG`, falling back to
/// [`DEFAULT_FILTER`].
///
/// Safe to call multiple times - only the first call has effect.
pub fn init() {
    install(|| EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER)));
}

/// Initializes console output with the config's `log_filter`.
///
/// An unparsable filter falls back to [`DEFAULT_FILTER`]. Only the first
/// initialization has effect.
pub fn init_with(config: &EngineConfig) {
    let directives = config.log_filter.clone();
    install(move || match directives {
        Some(directives) => {
            EnvFilter::try_new(directives).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
        }
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER)),
    });
}

fn install(filter: impl FnOnce() -> EnvFilter) {
    INIT.get_or_init(|| {
        EPOCH.get_or_init(Instant::now);
        let _ = tracing_subscriber::registry()
            .with(filter())
            .with(RosterConsoleLayer)
            .try_init();
    });
}

// Returns elapsed time since initialization.
fn elapsed_secs() -> f64 {
    EPOCH.get().map_or(0.0, |epoch| epoch.elapsed().as_secs_f64())
}

/// A tracing layer that formats engine events with colors.
pub struct RosterConsoleLayer;

impl<S: Subscriber> Layer<S> for RosterConsoleLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        if !metadata.target().starts_with("rosterforge") {
            return;
        }

        let mut visitor = EventVisitor::default();
        event.record(&mut visitor);

        let output = format_event(&visitor, *metadata.level());
        if !output.is_empty() {
            let _ = writeln!(io::stdout(), "{}", output);
        }
    }
}

#[derive(Debug, Default)]
struct EventVisitor {
    event: Option<String>,
    fields: Vec<(&'static str, String)>,
}

impl EventVisitor {
    fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v.as_str())
    }

    fn push(&mut self, field: &Field, value: String) {
        if field.name() == "event" {
            self.event = Some(value);
        } else {
            self.fields.push((field.name(), value));
        }
    }
}

impl Visit for EventVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        let s = format!("{:?}", value);
        self.push(field, s.trim_matches('"').to_string());
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.push(field, value.to_formatted_string(&Locale::en));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.push(field, value.to_formatted_string(&Locale::en));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.push(field, format!("{value}"));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.push(field, value.to_string());
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.push(field, value.to_string());
    }
}

fn format_event(v: &EventVisitor, level: Level) -> String {
    let event = v.event.as_deref().unwrap_or("");

    match event {
        "auto_check_start" => format_walk_start(v),
        "auto_check_end" => format_walk_end(v),
        "" => String::new(),
        _ => format_generic(event, v, level),
    }
}

fn format_elapsed() -> String {
    format!("{:>7.3}s", elapsed_secs())
        .bright_black()
        .to_string()
}

fn format_walk_start(v: &EventVisitor) -> String {
    format!(
        "{} {} Auto-check │ root {} │ {} nodes",
        format_elapsed(),
        "▶".bright_green().bold(),
        v.get("root").unwrap_or("?").white().bold(),
        v.get("nodes").unwrap_or("0").bright_yellow(),
    )
}

fn format_walk_end(v: &EventVisitor) -> String {
    let warnings = v.get("warnings").unwrap_or("0");
    let warnings = if warnings == "0" {
        format!("{} warnings", warnings.green())
    } else {
        format!("{} warnings", warnings.bright_red().bold())
    };
    format!(
        "{} {} Auto-check complete │ {} changed │ {} removed │ {}",
        format_elapsed(),
        "■".bright_cyan().bold(),
        v.get("changed").unwrap_or("0").bright_yellow(),
        v.get("removed").unwrap_or("0").bright_magenta(),
        warnings,
    )
}

fn format_generic(event: &str, v: &EventVisitor, level: Level) -> String {
    let fields = v
        .fields
        .iter()
        .map(|(name, value)| format!("{}={}", name.bright_black(), value))
        .collect::<Vec<_>>()
        .join(" ");
    let head = match level {
        Level::ERROR => format!("{} {}", "✖".bright_red().bold(), event.bright_red().bold()),
        Level::WARN => format!("{} {}", "⚠".yellow().bold(), event.yellow()),
        Level::INFO => format!("{} {}", "●".bright_blue(), event.white().bold()),
        Level::DEBUG => format!("{} {}", "·".bright_black(), event.white()),
        Level::TRACE => format!("{} {}", "·".bright_black(), event.bright_black()),
    };
    if fields.is_empty() {
        format!("{} {}", format_elapsed(), head)
    } else {
        format!("{} {} │ {}", format_elapsed(), head, fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn visitor(event: &str, fields: &[(&'static str, &str)]) -> EventVisitor {
        EventVisitor {
            event: Some(event.to_string()),
            fields: fields.iter().map(|(n, v)| (*n, v.to_string())).collect(),
        }
    }

    #[test]
    fn test_walk_end_mentions_counts() {
        let v = visitor(
            "auto_check_end",
            &[("changed", "1,204"), ("removed", "2"), ("warnings", "0")],
        );
        let output = format_event(&v, Level::INFO);
        assert!(output.contains("Auto-check complete"));
        assert!(output.contains("1,204"));
        assert!(output.contains("removed"));
    }

    #[test]
    fn test_generic_event_lists_fields() {
        let v = visitor("unresolved_scope", &[("node", "#4v0"), ("scope", "force")]);
        let output = format_event(&v, Level::WARN);
        assert!(output.contains("unresolved_scope"));
        assert!(output.contains("#4v0"));
        assert!(output.contains("force"));
    }

    #[test]
    fn test_events_without_name_are_dropped() {
        let v = EventVisitor::default();
        assert!(format_event(&v, Level::INFO).is_empty());
    }

    #[test]
    fn test_init_is_idempotent() {
        init_with(&EngineConfig::new().with_log_filter("rosterforge_scope=debug"));
        init();
        assert!(INIT.get().is_some());
    }
}
