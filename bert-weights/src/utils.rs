use std::{
    io::{self, Write},
    sync::atomic::{AtomicUsize, Ordering},
};

/// Progress tracker for showing progress bars
#[derive(Debug)]
pub(crate) struct ProgressTracker {
    total: usize,
    completed: AtomicUsize,
    last_displayed: AtomicUsize,
    label: String,
}

impl ProgressTracker {
    pub fn new(total: usize, label: &str) -> Self {
        Self {
            total: total.max(1),
            completed: AtomicUsize::new(0),
            last_displayed: AtomicUsize::new(0),
            label: label.to_string(),
        }
    }

    pub fn set_current(&self, current: usize, description: Option<&str>) {
        let current = current.min(self.total);
        self.completed.store(current, Ordering::Relaxed);
        let percent = (current * 100) / self.total;
        let last_displayed = self.last_displayed.load(Ordering::Relaxed);
        let last_percent = (last_displayed * 100) / self.total;

        // Update display every 1% or when complete
        if current == 0 || percent > last_percent || current >= self.total {
            self.last_displayed.store(current, Ordering::Relaxed);
            let bar_width = 30;
            let filled = (current * bar_width) / self.total;
            let bar = "█".repeat(filled) + &"░".repeat(bar_width - filled);

            eprint!(
                "\r{}: [{bar}] {percent}%: {}",
                self.label,
                fixed_len(description.unwrap_or_default(), 42)
            );
            io::stderr().flush().unwrap_or(());

            if current >= self.total {
                eprintln!(); // New line when complete
            }
        }
    }
}

fn fixed_len(description: &str, width: usize) -> String {
    let mut desc = description.to_string();
    if desc.chars().count() > width {
        // Cut and add ".."
        desc = desc.chars().take(width.saturating_sub(2)).collect();
        desc.push_str("..");
    } else {
        desc = format!("{:width$}", desc, width = width);
    }
    desc
}

/// 64-bit FNV-1a, stable across platforms and toolchains.
pub(crate) fn fnv1a64(input: &str) -> u64 {
    const OFFSET_BASIS: u64 = 0xcbf29ce484222325;
    const PRIME: u64 = 0x100000001b3;

    input
        .bytes()
        .fold(OFFSET_BASIS, |hash, byte| (hash ^ u64::from(byte)).wrapping_mul(PRIME))
}

/// Keeps only characters that are safe in a single path component.
pub(crate) fn sanitize_component(value: &str) -> String {
    let sanitized = value
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') { c } else { '_' })
        .collect::<String>();

    match sanitized.trim_matches('.') {
        "" => "_".to_string(),
        trimmed => trimmed.to_string(),
    }
}
