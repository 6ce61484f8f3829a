// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Global `log` sink filtering by severity and category mask.
//!
//! Installed once per process with [`init_logger`]. The category mask can be
//! changed at any time from any thread.

use super::output::{LogLevel, Output};
use super::Category;
use std::io;
use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};
use std::sync::{Arc, OnceLock};

static LOGGER: OnceLock<BusLogger> = OnceLock::new();

/// Process-wide logger state.
pub struct BusLogger {
    output: Arc<dyn Output>,
    level_filter: AtomicU8,
    mask: AtomicU32,
}

impl BusLogger {
    fn new(output: Arc<dyn Output>, level: LogLevel, mask: Category) -> Self {
        Self {
            output,
            level_filter: AtomicU8::new(level as u8),
            mask: AtomicU32::new(mask.bits()),
        }
    }

    fn level_filter(&self) -> LogLevel {
        match self.level_filter.load(Ordering::Relaxed) {
            0 => LogLevel::Debug,
            1 => LogLevel::Info,
            2 => LogLevel::Warning,
            _ => LogLevel::Error,
        }
    }

    /// Whether a record in `target` at `level` passes both filters.
    ///
    /// Targets outside the bus categories are filtered by level only.
    fn passes(&self, target: &str, level: LogLevel) -> bool {
        if level < self.level_filter() {
            return false;
        }
        match Category::for_target(target) {
            Some(cat) => Category::from_bits(self.mask.load(Ordering::Relaxed)).contains(cat),
            None => true,
        }
    }
}

impl log::Log for BusLogger {
    fn enabled(&self, metadata: &log::Metadata<'_>) -> bool {
        self.passes(metadata.target(), LogLevel::from(metadata.level()))
    }

    fn log(&self, record: &log::Record<'_>) {
        let level = LogLevel::from(record.level());
        if !self.passes(record.target(), level) {
            return;
        }
        let label: &str = match Category::for_target(record.target()) {
            Some(cat) => cat.label(),
            None => record.target(),
        };
        let line = format!("[{}] {}", label, record.args());
        let _ = self.output.write(level, &line);
    }

    fn flush(&self) {
        let _ = self.output.flush();
    }
}

/// Install the bus logger as the process `log` backend.
///
/// Only the first call installs; later calls return `false` and leave the
/// existing logger in place.
pub fn init_logger(output: Arc<dyn Output>, level: LogLevel, mask: Category) -> bool {
    let mut installed = false;
    let logger = LOGGER.get_or_init(|| {
        installed = true;
        BusLogger::new(output, level, mask)
    });
    if installed {
        if log::set_logger(logger).is_err() {
            return false;
        }
        log::set_max_level(level.to_level_filter());
    }
    installed
}

/// Replace the active category mask. No-op before [`init_logger`].
pub fn set_category_mask(mask: Category) {
    if let Some(logger) = LOGGER.get() {
        logger.mask.store(mask.bits(), Ordering::Relaxed);
    }
}

/// Active category mask, or `Category::NONE` when no bus logger is installed.
pub fn category_mask() -> Category {
    LOGGER
        .get()
        .map(|l| Category::from_bits(l.mask.load(Ordering::Relaxed)))
        .unwrap_or(Category::NONE)
}

/// Replace the minimum severity. No-op before [`init_logger`].
pub fn set_level(level: LogLevel) {
    if let Some(logger) = LOGGER.get() {
        logger.level_filter.store(level as u8, Ordering::Relaxed);
        log::set_max_level(level.to_level_filter());
    }
}

/// Flush the installed output. Safe to call when not initialized.
pub fn flush_logger() -> io::Result<()> {
    match LOGGER.get() {
        Some(logger) => logger.output.flush(),
        None => Ok(()),
    }
}
