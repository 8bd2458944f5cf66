use std::fmt::Write;

use analysis::Analysis;
use backtest::Trade;
use engine::WatchItem;

fn price(value: Option<f64>) -> String {
    value.map_or("-".to_string(), |v| format!("{v:.4}"))
}

/// Human-readable summary of one analysis.
pub fn render_analysis(item: &WatchItem, analysis: &Analysis) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "== {item} ==");

    let Some(ctx) = &analysis.context else {
        let _ = write!(out, "No candles.");
        return out;
    };
    let _ = writeln!(out, "Close:      {:.4} ({})", ctx.close, ctx.timestamp);
    let _ = writeln!(out, "Trend:      {}", ctx.trend);
    let rsi_note = if ctx.overbought {
        " overbought"
    } else if ctx.oversold {
        " oversold"
    } else {
        ""
    };
    let _ = writeln!(out, "RSI:        {}{rsi_note}", price(ctx.rsi));
    let _ = writeln!(
        out,
        "Zone:       {}",
        ctx.zone.map_or("-".to_string(), |z| z.to_string())
    );
    let _ = writeln!(out, "Support:    {}", price(ctx.nearest_support));
    let _ = writeln!(out, "Resistance: {}", price(ctx.nearest_resistance));

    let counts: Vec<String> = analysis
        .event_counts()
        .iter()
        .map(|(tag, n)| format!("{tag} {n}"))
        .collect();
    let _ = writeln!(
        out,
        "Swings:     {}   Structures: {}",
        analysis.swings.len(),
        if counts.is_empty() { "-".to_string() } else { counts.join(", ") }
    );

    if !analysis.pois.is_empty() {
        let _ = writeln!(out, "POIs:");
        for (i, poi) in analysis.pois.iter().take(5).enumerate() {
            let _ = writeln!(
                out,
                "  {}. {:.4} - {:.4} {} weight {}",
                i + 1,
                poi.range.low,
                poi.range.high,
                poi.direction,
                poi.weight
            );
        }
    }

    let signal = &analysis.signal;
    let _ = write!(
        out,
        "Signal:     {} ({:.0}%)",
        signal.direction,
        signal.confidence * 100.0
    );
    if let Some(levels) = signal.levels {
        let _ = write!(
            out,
            "\n            entry {:.4}  stop {:.4}  target {:.4}  R:R {:.2}",
            levels.entry,
            levels.stop,
            levels.target,
            levels.reward_to_risk()
        );
    }
    out
}

/// One line per closed trade.
pub fn render_trades(trades: &[Trade]) -> String {
    let mut out = String::new();
    for t in trades {
        let _ = writeln!(
            out,
            "{} {:<5} entry {:.4} exit {:.4} ({}) {:+.2}%  equity {:.2}",
            t.entry_time.format("%Y-%m-%d %H:%M"),
            t.direction.to_string(),
            t.entry_price,
            t.exit_price,
            t.exit_reason,
            t.pnl_pct,
            t.equity_after
        );
    }
    out
}
