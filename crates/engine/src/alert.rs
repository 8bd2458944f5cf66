use std::collections::BTreeSet;
use std::fmt::Write;

use analysis::{Analysis, SignalDirection, StructureTag};
use common::Timeframe;

/// Markdown alert for a directional signal, `None` when there is nothing to
/// trade.
pub fn format_alert(symbol: &str, timeframe: Timeframe, analysis: &Analysis) -> Option<String> {
    let signal = &analysis.signal;
    let levels = signal.levels?;
    if signal.direction == SignalDirection::None {
        return None;
    }

    let mut msg = String::new();
    let _ = writeln!(msg, "*SMC signal: {} {}*", symbol, signal.direction);
    let _ = writeln!(msg, "*Timeframe:* {timeframe}");
    if let Some(ctx) = &analysis.context {
        let _ = writeln!(msg, "*Price:* {:.8}", ctx.close);
        let _ = writeln!(msg, "*Trend:* {}", ctx.trend);
        if let Some(rsi) = ctx.rsi {
            let _ = writeln!(msg, "*RSI:* {rsi:.1}");
        }
    }
    let _ = writeln!(msg, "*Confidence:* {:.0}%", signal.confidence * 100.0);
    let _ = writeln!(msg);
    let _ = writeln!(msg, "Entry: {:.8}", levels.entry);
    let _ = writeln!(msg, "Stop: {:.8}", levels.stop);
    let _ = writeln!(msg, "Target: {:.8}", levels.target);
    let _ = writeln!(msg, "R:R: {:.2}", levels.reward_to_risk());

    let tags = supporting_tags(analysis);
    if !tags.is_empty() {
        let joined: Vec<&str> = tags.iter().map(StructureTag::as_str).collect();
        let _ = writeln!(msg);
        let _ = write!(msg, "Structures: {}", joined.join(", "));
    }
    Some(msg)
}

/// Tags of every event behind the signal's POIs.
pub fn supporting_tags(analysis: &Analysis) -> BTreeSet<StructureTag> {
    analysis
        .signal
        .supporting_pois
        .iter()
        .filter_map(|&p| analysis.pois.get(p))
        .flat_map(|poi| poi.events.iter())
        .filter_map(|&e| analysis.events.get(e))
        .map(|e| e.tag())
        .collect()
}
