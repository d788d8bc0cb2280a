//! Terminal rendering for trips, counts, reports, and history.

use arrow::record_batch::RecordBatch;
use arrow::util::pretty::pretty_format_batches;
use dockcount_core::{
    AppliedCount, ConferenceHeader, ConferenceId, CountOutcome, Progress, StatusCounts,
    TripMetadata,
};

const LABEL_WIDTH: usize = 22;
const BAR_WIDTH: usize = 30;
const MAX_DESCRIPTION: usize = 40;

// ── Public API ──

/// Print the trip card shown after a manifest is loaded.
pub fn print_trip_card(
    metadata: &TripMetadata,
    conference_id: Option<ConferenceId>,
    progress: &Progress,
    counts: &StatusCounts,
) {
    println!(
        "=== Trip {} / Store {} ===",
        or_dash(metadata.trip_id.as_deref()),
        or_dash(metadata.store_id.as_deref())
    );
    println!();

    println!("Trip");
    field("trip_date", or_dash(metadata.trip_date.as_deref()));
    if let Some(id) = conference_id {
        field("conference", id);
    }
    println!();

    print_progress(progress, counts);
}

/// Print progress and the per-status line counts.
pub fn print_progress(progress: &Progress, counts: &StatusCounts) {
    println!("Progress");
    println!(
        "  {} {:>5.1}%",
        bar(progress.fraction_complete),
        progress.fraction_complete * 100.0
    );
    field(
        "units",
        format!("{} / {}", progress.units_counted, progress.units_expected),
    );
    field(
        "items touched",
        format!("{} / {}", progress.items_with_any_count, progress.items_total),
    );
    println!();

    print_status_counts(counts);
}

/// Print the per-status line counts.
pub fn print_status_counts(counts: &StatusCounts) {
    println!("Status");
    field("matched", counts.matched);
    field("shortage", counts.shortage);
    field("surplus", counts.surplus);
    field("unexpected surplus", counts.unexpected_surplus);
    println!();
}

/// One-line echo of an applied count.
pub fn print_applied(applied: &AppliedCount) {
    let line = &applied.line;
    let marker = match applied.outcome {
        CountOutcome::Updated => " ",
        CountOutcome::NewSurplus => "+",
    };
    println!(
        "{marker} {:<14} {:<width$} {:>5} / {:<5} {}",
        line.normalized_code,
        truncate(&line.description, MAX_DESCRIPTION),
        line.counted_qty,
        line.expected_qty,
        line.status(),
        width = MAX_DESCRIPTION,
    );
}

/// Print a report batch as a bordered table.
pub fn print_table(batch: &RecordBatch) -> anyhow::Result<()> {
    if batch.num_rows() == 0 {
        println!("(no lines)");
        return Ok(());
    }
    println!("{}", pretty_format_batches(std::slice::from_ref(batch))?);
    Ok(())
}

/// Print a stored conference header as a short card.
pub fn print_header(header: &ConferenceHeader) {
    println!(
        "=== Conference {} ({}) ===",
        header.id,
        if header.finalized { "finalized" } else { "live" }
    );
    field("trip", or_dash(header.trip_id.as_deref()));
    field("store", or_dash(header.store_id.as_deref()));
    field(
        "trip_date",
        header
            .trip_date
            .map(|d| d.to_string())
            .unwrap_or_else(|| "-".into()),
    );
    field("source_file", or_dash(header.source_file.as_deref()));
    field("created_at", header.created_at.format("%Y-%m-%d %H:%M:%S"));
    println!();
}

/// Print the history listing, newest first.
pub fn print_history(headers: &[ConferenceHeader]) {
    if headers.is_empty() {
        println!("(no conferences)");
        return;
    }
    println!(
        "{:>6}  {:<9}  {:<12}  {:<10}  {:<10}  {:<19}  {}",
        "id", "kind", "trip", "store", "trip_date", "created_at", "source_file"
    );
    for h in headers {
        println!(
            "{:>6}  {:<9}  {:<12}  {:<10}  {:<10}  {:<19}  {}",
            h.id,
            if h.finalized { "finalized" } else { "live" },
            or_dash(h.trip_id.as_deref()),
            or_dash(h.store_id.as_deref()),
            h.trip_date
                .map(|d| d.to_string())
                .unwrap_or_else(|| "-".into()),
            h.created_at.format("%Y-%m-%d %H:%M:%S"),
            or_dash(h.source_file.as_deref()),
        );
    }
}

// ── Helpers ──

fn field(label: &str, value: impl std::fmt::Display) {
    println!("  {:<LABEL_WIDTH$} {}", label, value);
}

fn or_dash(value: Option<&str>) -> &str {
    value.filter(|v| !v.is_empty()).unwrap_or("-")
}

fn bar(fraction: f64) -> String {
    let filled = ((fraction.clamp(0.0, 1.0) * BAR_WIDTH as f64).round() as usize).min(BAR_WIDTH);
    format!("[{}{}]", "#".repeat(filled), ".".repeat(BAR_WIDTH - filled))
}

/// Shorten to `max` characters, ending in `...` when cut.
fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let kept: String = text.chars().take(max.saturating_sub(3)).collect();
    format!("{kept}...")
}
