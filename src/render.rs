//! Plain-text rendering of codes and countdown frames.

use std::fmt::Write as _;

use vimi_otp::otp::{CodeView, Credential, TickFrame, Urgency};

const BAR_WIDTH: usize = 20;

/// `[████████░░░░░░░░░░░░] 12s` style bar; filled part is the time left.
pub fn countdown_bar(progress: f64, remaining: u32) -> String {
    let filled = ((progress.clamp(0.0, 1.0) * BAR_WIDTH as f64).round() as usize).min(BAR_WIDTH);
    format!(
        "[{}{}] {:>2}s",
        "█".repeat(filled),
        "░".repeat(BAR_WIDTH - filled),
        remaining
    )
}

fn urgency_marker(urgency: Urgency) -> &'static str {
    match urgency {
        Urgency::Normal => "",
        Urgency::Warning => " !",
        Urgency::Danger => " !!",
    }
}

pub fn render_codes(codes: &[CodeView]) -> String {
    let mut out = String::new();
    for view in codes {
        let _ = writeln!(out, "  {:<10} {}", view.formatted, view.display_name);
    }
    out
}

/// One screenful for a scheduler frame.
pub fn render_frame(frame: &TickFrame) -> String {
    let mut out = format!(
        "{}{}\n",
        countdown_bar(frame.progress, frame.remaining),
        urgency_marker(frame.urgency)
    );
    if frame.codes.is_empty() {
        out.push_str("  (no accounts)\n");
    } else {
        out.push_str(&render_codes(&frame.codes));
    }
    out
}

/// Table of stored credentials; secrets are never printed.
pub fn render_list(credentials: &[Credential]) -> String {
    if credentials.is_empty() {
        return "No accounts yet.\n".to_string();
    }
    let mut out = String::new();
    for c in credentials {
        let _ = writeln!(
            out,
            "{}  {}  (added {})",
            c.id,
            c.display_name(),
            c.created_at.format("%Y-%m-%d")
        );
    }
    out
}
