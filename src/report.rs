use crate::asset::Signature;
use crate::bagcheck::BagReport;
use crate::batch::{DirectoryStatus, Status};
use crate::compare::CompareReport;
use crate::partition::PartitionPlan;
use crate::util::units::human_readable;
use crate::verify::{ModeReport, Outcome, ReconciliationReport};

fn print_lines(lines: Vec<String>) {
    for line in lines {
        println!("{}", line);
    }
}

pub fn print_reconciliation(report: &ReconciliationReport) {
    print_lines(format_reconciliation(report));
}

fn format_reconciliation(report: &ReconciliationReport) -> Vec<String> {
    let mut lines = Vec::new();

    for (path, (old, new)) in &report.modified {
        lines.push(format!("{:<2} {}", Outcome::Modified.code(), path));
        lines.extend(format_signature_change(old, new));
    }
    for path in &report.added {
        lines.push(format!("{:<2} {}", Outcome::Added.code(), path));
    }
    for path in &report.deleted {
        lines.push(format!("{:<2} {}", Outcome::Deleted.code(), path));
    }
    for (signature, paths) in &report.moved {
        lines.push(format!("{:<2} {}", Outcome::Moved.code(), format_signature(signature)));
        for path in paths {
            lines.push(format!("   {}", path));
        }
    }

    if !lines.is_empty() {
        lines.push(String::new());
    }
    let counts = [
        (Outcome::Unchanged, report.unchanged.len()),
        (Outcome::Modified, report.modified.len()),
        (Outcome::Added, report.added.len()),
        (Outcome::Deleted, report.deleted.len()),
        (Outcome::Moved, report.moved.values().map(Vec::len).sum()),
    ];
    let counts: Vec<String> = counts
        .iter()
        .map(|(outcome, n)| format!("{} {}", n, outcome.name()))
        .collect();
    lines.push(format!("{} paths: {}", report.total(), counts.join(", ")));
    lines.push(if report.is_clean() {
        "Success: both collections hold the same files".to_string()
    } else {
        "Possible problems found".to_string()
    });

    lines
}

fn format_signature_change(old: &Signature, new: &Signature) -> Vec<String> {
    let mut lines = Vec::new();
    if old.bytes != new.bytes {
        lines.push(format!(
            "   size: {} -> {}",
            human_readable(old.bytes),
            human_readable(new.bytes)
        ));
    }
    if old.checksum != new.checksum {
        lines.push(format!(
            "   md5: {} -> {}",
            format_checksum(old.checksum.as_deref()),
            format_checksum(new.checksum.as_deref())
        ));
    }
    lines
}

fn format_signature(signature: &Signature) -> String {
    format!(
        "{} ({})",
        format_checksum(signature.checksum.as_deref()),
        human_readable(signature.bytes)
    )
}

fn format_checksum(checksum: Option<&str>) -> String {
    match checksum {
        Some(c) if c.chars().count() > 12 => {
            format!("{}...", c.chars().take(12).collect::<String>())
        }
        Some(c) => c.to_string(),
        None => "none".to_string(),
    }
}

pub fn print_mode_reports(reports: &[ModeReport]) {
    print_lines(format_mode_reports(reports));
}

fn format_mode_reports(reports: &[ModeReport]) -> Vec<String> {
    let mut lines = Vec::new();
    for report in reports {
        lines.push(format!(
            "By {}: {} only in first, {} only in second",
            report.mode.name(),
            report.only_in_first.len(),
            report.only_in_second.len()
        ));
        for path in &report.only_in_first {
            lines.push(format!("  < {}", path));
        }
        for path in &report.only_in_second {
            lines.push(format!("  > {}", path));
        }
    }
    lines
}

pub fn print_compare(report: &CompareReport) {
    print_lines(format_compare(report));
}

fn format_compare(report: &CompareReport) -> Vec<String> {
    let mut lines = vec![format!(
        "{} values are common to all the supplied files",
        report.common.len()
    )];
    for (n, (path, unique)) in report.unique.iter().enumerate() {
        lines.push(format!(
            " => File {}: {} values are unique to {}",
            n + 1,
            unique.len(),
            path.display()
        ));
        for (m, value) in unique.iter().enumerate() {
            lines.push(format!("     ({}) {}", m + 1, value));
        }
    }
    lines
}

pub fn print_bag_report(report: &BagReport) {
    print_lines(format_bag_report(report));
}

fn format_bag_report(report: &BagReport) -> Vec<String> {
    let mut lines = vec![format!(
        "Aligned by stripping {} leading segment(s) from bag paths ({} matched, {})",
        report.trim,
        report.matched,
        report.algorithm.name()
    )];

    for (title, entries) in [
        ("Missing from bag", &report.missing),
        ("Extra in bag", &report.extra),
    ] {
        lines.push(format!("{}: {}", title, entries.len()));
        for (checksum, path) in entries {
            lines.push(format!("  {}  {}", checksum, path));
        }
    }

    lines.push(if report.is_clean() {
        "Success: every inventoried file is in the bag".to_string()
    } else {
        "Possible problems found".to_string()
    });
    lines
}

pub fn print_partition_plan(plan: &PartitionPlan) {
    print_lines(format_partition_plan(plan));
}

fn format_partition_plan(plan: &PartitionPlan) -> Vec<String> {
    let mut lines = vec![format!(
        "Partitioning {} files ({}) in {} mode",
        plan.files,
        human_readable(plan.bytes),
        plan.mode
    )];
    for (n, (source, destination)) in plan.mapping.iter().enumerate() {
        lines.push(format!(
            "  {}. {} -> {}",
            n + 1,
            source.display(),
            destination.display()
        ));
    }
    lines
}

pub fn print_batch_table(statuses: &[DirectoryStatus]) {
    print_lines(format_batch_table(statuses));
}

fn status_label(status: Status) -> &'static str {
    match status {
        Status::ToDo => "ToDo",
        Status::Exclude => "Exclude",
        Status::Complete => "Complete",
    }
}

fn column_width(header: &str, values: impl Iterator<Item = usize>) -> usize {
    values.max().unwrap_or(0).max(header.len())
}

fn format_batch_table(statuses: &[DirectoryStatus]) -> Vec<String> {
    let n_width = statuses.len().to_string().len();
    let d = column_width("DIRNAME", statuses.iter().map(|s| s.dirname.len()));
    let f = column_width("FILES", statuses.iter().map(|s| s.filecount.to_string().len()));
    let b = column_width("BYTES", statuses.iter().map(|s| s.bytecount.to_string().len()));
    let h = column_width("HUMAN", statuses.iter().map(|s| s.humanread.len()));

    let row = |n: &str, dirname: &str, files: &str, bytes: &str, human: &str, status: &str| {
        format!(
            "| {n:>n_width$} | {dirname:<d$} | {files:>f$} | {bytes:>b$} | {human:>h$} | {status:>8} |"
        )
    };

    let header = row("N", "DIRNAME", "FILES", "BYTES", "HUMAN", "STATUS");
    let border = "=".repeat(header.len());

    let mut lines = vec![border.clone(), header, border.clone()];
    for (i, s) in statuses.iter().enumerate() {
        lines.push(row(
            &format!("{:0n_width$}", i + 1),
            &s.dirname,
            &s.filecount.to_string(),
            &s.bytecount.to_string(),
            &s.humanread,
            status_label(s.status),
        ));
    }
    lines.push(border);
    lines
}
