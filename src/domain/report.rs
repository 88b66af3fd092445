//! Report formatting and sink delivery.
//!
//! A report is a list of blocks: the header, one title per market and screen,
//! and one block per match. `chunk` packs blocks into messages without ever
//! splitting a block, so a match never straddles two messages.

use crate::domain::market::MarketProfile;
use crate::domain::matches::{LedgerRow, Match};
use crate::ports::ledger_port::LedgerPort;
use crate::ports::notification_port::NotificationPort;
use chrono::NaiveDate;

pub const NO_SIGNALS: &str = "No signals today.";
const ELLIPSIS: char = '…';

/// One market's matches, with the screen order to report them in.
#[derive(Debug, Clone)]
pub struct ReportSection {
    pub profile: MarketProfile,
    pub screens: Vec<String>,
    pub matches: Vec<Match>,
}

#[derive(Debug, Clone)]
pub struct RenderOptions {
    pub include_links: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            include_links: true,
        }
    }
}

pub fn render(date: NaiveDate, sections: &[ReportSection], options: &RenderOptions) -> Vec<String> {
    let total: usize = sections.iter().map(|s| s.matches.len()).sum();
    let mut blocks = vec![format!("{} signal report ({} matches)", date, total)];

    if total == 0 {
        blocks.push(NO_SIGNALS.to_string());
        return blocks;
    }

    for section in sections {
        if section.matches.is_empty() {
            continue;
        }
        blocks.push(format!(
            "[{}] {} matches",
            section.profile.id,
            section.matches.len()
        ));
        for screen in &section.screens {
            let hits: Vec<&Match> = section
                .matches
                .iter()
                .filter(|m| &m.screen == screen)
                .collect();
            if hits.is_empty() {
                continue;
            }
            blocks.push(format!("# {} ({})", screen, hits.len()));
            for m in hits {
                blocks.push(render_match(m, &section.profile, options));
            }
        }
    }
    blocks
}

fn render_match(m: &Match, profile: &MarketProfile, options: &RenderOptions) -> String {
    let mut line = format!("{} ({}) {}", m.name, m.code, profile.format_price(m.close));
    if let Some(change) = m.change_pct {
        line.push_str(&format!(" ({:+.1}%)", change));
    }
    if let Some(ratio) = m.volume_ratio_pct {
        line.push_str(&format!(", volume {:.0}% of prior day", ratio));
    }
    if options.include_links {
        if let Some(link) = profile.link_for(&m.code) {
            line.push('\n');
            line.push_str(&link);
        }
    }
    line
}

/// Pack `blocks` into newline-joined messages of at most `limit` characters.
///
/// Blocks are never split. A single block longer than `limit` is cut and
/// ends with an ellipsis.
pub fn chunk(blocks: &[String], limit: usize) -> Vec<String> {
    let limit = limit.max(1);
    let mut messages = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for block in blocks {
        let block = truncate(block, limit);
        let len = block.chars().count();
        if !current.is_empty() && current_len + 1 + len > limit {
            messages.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if !current.is_empty() {
            current.push('\n');
            current_len += 1;
        }
        current.push_str(&block);
        current_len += len;
    }

    if !current.is_empty() {
        messages.push(current);
    }
    messages
}

fn truncate(block: &str, limit: usize) -> String {
    if block.chars().count() <= limit {
        return block.to_string();
    }
    let mut cut: String = block.chars().take(limit - 1).collect();
    cut.push(ELLIPSIS);
    cut
}

/// Send every message, logging failures. Returns how many were delivered.
pub fn deliver(notifier: &dyn NotificationPort, messages: &[String]) -> usize {
    let mut delivered = 0;
    for (i, message) in messages.iter().enumerate() {
        match notifier.send(message) {
            Ok(()) => delivered += 1,
            Err(e) => tracing::error!(
                sink = notifier.name(),
                part = i + 1,
                parts = messages.len(),
                error = %e,
                "notification failed"
            ),
        }
    }
    tracing::info!(sink = notifier.name(), delivered, parts = messages.len(), "report sent");
    delivered
}

/// Append one ledger row per match; a failed row is logged and skipped.
pub fn record(ledger: &dyn LedgerPort, matches: &[Match]) -> usize {
    let mut written = 0;
    for m in matches {
        let row = LedgerRow::from(m);
        match ledger.append(&row) {
            Ok(()) => written += 1,
            Err(e) => tracing::error!(
                sink = ledger.name(),
                code = %row.code,
                screen = %row.screen,
                error = %e,
                "ledger append failed"
            ),
        }
    }
    written
}
