//! Cross-platform disk type detection for performance tuning (spec §6.4's
//! neighbor concern: the scheduler's rotational/SSD distinction, and
//! drive-type-based worker-thread-count tuning, spec §5).

use std::path::Path;

use rusqlite::Connection;

use crate::config::WorkerThreadLimits;

#[cfg(target_os = "linux")]
mod linux;
#[cfg(target_os = "macos")]
mod macos;
#[cfg(target_os = "windows")]
mod windows;

pub mod network;
pub mod probe;

/// Drive type for I/O-ordering strategy and thread-count tuning (spec §4.4, §5).
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum DriveType {
    SSD,
    HDD,
    Network,
    Unknown,
}

impl DriveType {
    pub fn worker_threads(&self, available_threads: usize) -> usize {
        let limits = WorkerThreadLimits::default();
        match self {
            DriveType::SSD => available_threads,
            DriveType::HDD => available_threads.min(limits.hdd_max),
            DriveType::Network => limits.floor,
            DriveType::Unknown => available_threads.min(limits.unknown_max),
        }
    }

    pub fn is_hdd(&self) -> bool {
        matches!(self, DriveType::HDD)
    }

    pub fn is_ssd(&self) -> bool {
        matches!(self, DriveType::SSD)
    }

    pub fn is_network(&self) -> bool {
        matches!(self, DriveType::Network)
    }

    /// Parse cached disk-type string (e.g. "Network+HDD", "Network+SSD") for probe results.
    pub fn from_disk_type_str(s: &str) -> Self {
        if s.contains("HDD") {
            DriveType::HDD
        } else if s.contains("SSD") {
            DriveType::SSD
        } else {
            DriveType::Unknown
        }
    }
}

pub fn drive_type_for_path(path: &Path) -> DriveType {
    detect_drive_type(path)
}

fn detect_drive_type(path: &Path) -> DriveType {
    #[cfg(target_os = "macos")]
    {
        macos::detect(path)
    }

    #[cfg(target_os = "linux")]
    {
        linux::detect(path)
    }

    #[cfg(target_os = "windows")]
    {
        windows::detect(path)
    }

    #[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
    {
        log::debug!("Unsupported platform for drive detection");
        DriveType::Unknown
    }
}

/// Returns `(num_threads, drive_type)`. `conn`, when given, is used to cache
/// and reuse network-mount probe results across runs (spec's diskinfo-
/// equivalent persistence, via the catalog's `diskinfo` table).
pub fn determine_threads_for_drive(
    path: &Path,
    conn: Option<&Connection>,
    available_threads: usize,
    override_threads: Option<usize>,
) -> (usize, DriveType) {
    if let Some(n) = override_threads {
        return (n, drive_type_for_path(path));
    }

    let limits = WorkerThreadLimits::default();
    let drive_type = drive_type_for_path(path);
    let num_threads = match drive_type {
        DriveType::SSD => available_threads,
        DriveType::HDD => available_threads.min(limits.hdd_max),
        DriveType::Network => conn
            .and_then(|c| probe::detect_optimal_workers(path, drive_type, c).ok())
            .unwrap_or(available_threads),
        DriveType::Unknown => available_threads.min(limits.floor),
    };
    (num_threads, drive_type)
}
