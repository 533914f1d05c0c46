use std::fmt::Write;

use chrono::Datelike;

use crate::availability::{AvailabilityTier, ConflictReport, MonthlyAvailability, SlotAvailability, SlotDiagnosis};
use crate::service::QueryMetadata;

fn tier_marker(tier: AvailabilityTier) -> &'static str {
    match tier {
        AvailabilityTier::High => "●●●",
        AvailabilityTier::Medium => "●● ",
        AvailabilityTier::Low => "●  ",
    }
}

fn metadata_line(metadata: &QueryMetadata) -> String {
    format!(
        "({} ms{})",
        metadata.query_time_ms,
        if metadata.cache_hit { ", cached" } else { "" }
    )
}

/// One line per remaining day: `2026-11-03 Tue ●●  medium`
pub fn format_monthly(days: &MonthlyAvailability, metadata: &QueryMetadata) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "=== Monthly availability {} ===", metadata_line(metadata));
    if days.is_empty() {
        let _ = writeln!(out, "No remaining days in this month.");
        return out;
    }

    for (date, tier) in days {
        let _ = writeln!(out, "{} {} {} {}", date, date.weekday(), tier_marker(*tier), tier);
    }

    let count = |wanted: AvailabilityTier| days.values().filter(|t| **t == wanted).count();
    let _ = writeln!(
        out,
        "\nhigh: {}  medium: {}  low: {}",
        count(AvailabilityTier::High),
        count(AvailabilityTier::Medium),
        count(AvailabilityTier::Low)
    );
    out
}

pub fn format_daily(slots: &[SlotAvailability], metadata: &QueryMetadata) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "=== Time slots {} ===", metadata_line(metadata));
    for slot in slots {
        let _ = writeln!(
            out,
            "  {:<12} {:<9} drivers {}/{}  movers {}/{}",
            slot.slot.label,
            if slot.bookable { "[OPEN]" } else { "[CLOSED]" },
            slot.available_drivers,
            slot.drivers_needed,
            slot.available_movers,
            slot.movers_needed,
        );
    }
    let open = slots.iter().filter(|s| s.bookable).count();
    let _ = writeln!(out, "\n{} of {} slots bookable", open, slots.len());
    out
}

fn format_reports(out: &mut String, pool: &str, reports: &[ConflictReport]) {
    let free = reports.iter().filter(|r| r.free).count();
    let _ = writeln!(out, "{} ({} of {} free):", pool, free, reports.len());
    if reports.is_empty() {
        let _ = writeln!(out, "  [NONE ON FILE]");
    }
    for report in reports {
        if report.free {
            let _ = writeln!(out, "  {} -> free", report.resource_id);
            continue;
        }
        let _ = writeln!(out, "  {} -> busy", report.resource_id);
        for conflict in &report.conflicts {
            let _ = writeln!(out, "      - {}", conflict.detail);
        }
    }
}

/// Per-resource explanation of a single slot
pub fn format_diagnosis(diagnosis: &SlotDiagnosis) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "=== {} {} ({} - {} UTC) ===",
        diagnosis.slot.date,
        diagnosis.slot.label,
        diagnosis.slot.start.format("%H:%M"),
        diagnosis.slot.end.format("%H:%M"),
    );
    format_reports(&mut out, "Drivers", &diagnosis.drivers);
    format_reports(&mut out, "Movers", &diagnosis.movers);
    out
}

pub fn print_monthly(days: &MonthlyAvailability, metadata: &QueryMetadata) {
    print!("{}", format_monthly(days, metadata));
}

pub fn print_daily(slots: &[SlotAvailability], metadata: &QueryMetadata) {
    print!("{}", format_daily(slots, metadata));
}

pub fn print_diagnosis(diagnosis: &SlotDiagnosis) {
    print!("{}", format_diagnosis(diagnosis));
}
