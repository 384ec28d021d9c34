//! Plain-text run summary for the terminal.

use crate::domain::analysis::{Analysis, SkipReason, SkippedTicker};
use crate::domain::signal::{SignalMask, SignalSet};
use std::fmt::Write;

const MAX_LISTED_DATES: usize = 10;

fn format_dates(mask: &SignalMask) -> String {
    let dates = mask.active_dates();
    if dates.is_empty() {
        return "none".to_string();
    }
    let shown: Vec<String> = dates
        .iter()
        .rev()
        .take(MAX_LISTED_DATES)
        .rev()
        .map(|d| d.format("%Y-%m-%d").to_string())
        .collect();
    if dates.len() > shown.len() {
        format!("{} (latest {}: {})", dates.len(), shown.len(), shown.join(", "))
    } else {
        format!("{} ({})", dates.len(), shown.join(", "))
    }
}

pub fn render_summary(analysis: &Analysis) -> String {
    let mut out = String::new();
    let series = &analysis.series;
    let _ = writeln!(out, "== {} ==", analysis.display_name());

    match (series.first_date(), series.last_date()) {
        (Some(first), Some(last)) => {
            let _ = writeln!(out, "bars: {} ({} to {})", series.len(), first, last);
            let _ = write!(out, "latest {}:", last);
            let last_index = series.len() - 1;
            for (key, ind) in analysis.indicators.iter() {
                match ind.value_at(last_index) {
                    Some(v) => {
                        let _ = write!(out, " {}={:.2}", key, v);
                    }
                    None => {
                        let _ = write!(out, " {}=-", key);
                    }
                }
            }
            let _ = writeln!(out);
        }
        _ => {
            let _ = writeln!(out, "bars: 0");
        }
    }

    render_signals(&mut out, &analysis.signals);
    out
}

fn render_signals(out: &mut String, signals: &SignalSet) {
    for kind in &signals.enabled {
        if let Some(mask) = signals.get(*kind) {
            let _ = writeln!(out, "  {}: {}", kind, format_dates(mask));
        }
    }
    if signals.any_enabled() {
        if signals.composite.active_count() == 0 {
            let _ = writeln!(out, "  {}: no signal on any date", SignalSet::COMPOSITE);
        } else {
            let _ = writeln!(
                out,
                "  {}: {}",
                SignalSet::COMPOSITE,
                format_dates(&signals.composite)
            );
        }
    }
    let _ = writeln!(
        out,
        "  {}: {}",
        SignalSet::COMPOSITE_SIGNAL,
        format_dates(&signals.composite_signal)
    );
}

pub fn render_skipped(skipped: &[SkippedTicker]) -> String {
    let mut out = String::new();
    for s in skipped {
        let reason = match &s.reason {
            SkipReason::NoData => "no data found".to_string(),
            SkipReason::InsufficientBars { bars } => format!("only {} bars", bars),
            SkipReason::FetchFailed { reason } => format!("fetch failed: {}", reason),
            SkipReason::Malformed { reason } => format!("bad data: {}", reason),
        };
        let _ = writeln!(out, "skipped {}: {}", s.ticker, reason);
    }
    out
}
