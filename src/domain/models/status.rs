//! Hashcat telemetry domain models.
//!
//! Agents post one status frame per update interval while a task runs. The
//! frame carries overall progress, guess metadata, and one entry per compute
//! device.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Guess-position metadata from a status frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HashcatGuess {
    /// Current base candidate (wordlist word or mask)
    pub guess_base: Option<String>,
    pub guess_base_count: i64,
    pub guess_base_offset: i64,
    pub guess_base_percentage: f64,
    /// Current modifier (rule or right-hand mask)
    pub guess_mod: Option<String>,
    pub guess_mod_count: i64,
    pub guess_mod_offset: i64,
    pub guess_mod_percentage: f64,
    pub guess_mode: i64,
}

/// Per-device measurements within a status frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceStatus {
    /// Hashcat device id
    pub device_id: i64,
    /// Vendor device name
    pub device_name: String,
    /// "gpu" or "cpu"
    pub device_type: String,
    /// Guesses per second on this device
    pub speed: i64,
    /// Utilization percentage
    pub utilization: i64,
    /// Temperature in °C; -1 when unreadable
    pub temperature: i64,
}

/// A status frame as submitted by an agent.
///
/// Older agent builds send the device list under `devices`; both names are
/// accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusFrame {
    /// Hashcat-reported wall clock of the frame
    pub time: DateTime<Utc>,
    /// Hashcat session name
    pub session: Option<String>,
    /// Hashcat numeric state code
    pub status: i64,
    /// `[done, total]` keyspace progress
    pub progress: [i64; 2],
    /// Restore point for checkpoint resume
    #[serde(default)]
    pub restore_point: i64,
    /// Rejected candidate count
    #[serde(default)]
    pub rejected: i64,
    /// When the run started
    pub time_start: Option<DateTime<Utc>>,
    /// Hashcat's own finish estimate
    pub estimated_stop: Option<DateTime<Utc>>,
    /// Guess metadata; a frame without one is malformed
    pub hashcat_guess: Option<HashcatGuess>,
    /// Per-device entries; a frame without any is malformed
    #[serde(alias = "devices", default)]
    pub device_statuses: Vec<DeviceStatus>,
}

impl StatusFrame {
    /// Fractional progress of this frame, clamped to `0.0..=1.0`.
    pub fn progress_fraction(&self) -> f64 {
        let [done, total] = self.progress;
        if total <= 0 {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let fraction = done as f64 / total as f64;
        fraction.clamp(0.0, 1.0)
    }
}

/// A persisted status frame, bound to the task that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HashcatStatus {
    /// Unique identifier
    pub id: Uuid,
    /// Task the frame belongs to
    pub task_id: Uuid,
    /// Hashcat-reported wall clock of the frame
    pub time: DateTime<Utc>,
    pub session: Option<String>,
    pub status: i64,
    pub progress: [i64; 2],
    pub restore_point: i64,
    pub rejected: i64,
    pub time_start: Option<DateTime<Utc>>,
    pub estimated_stop: Option<DateTime<Utc>>,
    pub guess: HashcatGuess,
    pub device_statuses: Vec<DeviceStatus>,
    /// When the server received the frame
    pub created_at: DateTime<Utc>,
}

impl HashcatStatus {
    /// Bind a validated frame to a task. Callers must have checked that the
    /// frame carries a guess and at least one device entry.
    pub fn from_frame(task_id: Uuid, frame: StatusFrame) -> Self {
        Self {
            id: Uuid::new_v4(),
            task_id,
            time: frame.time,
            session: frame.session,
            status: frame.status,
            progress: frame.progress,
            restore_point: frame.restore_point,
            rejected: frame.rejected,
            time_start: frame.time_start,
            estimated_stop: frame.estimated_stop,
            guess: frame.hashcat_guess.unwrap_or_default(),
            device_statuses: frame.device_statuses,
            created_at: Utc::now(),
        }
    }

    /// Fractional progress of this frame, clamped to `0.0..=1.0`.
    pub fn progress_fraction(&self) -> f64 {
        let [done, total] = self.progress;
        if total <= 0 {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let fraction = done as f64 / total as f64;
        fraction.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(done: i64, total: i64) -> StatusFrame {
        StatusFrame {
            time: Utc::now(),
            session: None,
            status: 3,
            progress: [done, total],
            restore_point: 0,
            rejected: 0,
            time_start: None,
            estimated_stop: None,
            hashcat_guess: Some(HashcatGuess::default()),
            device_statuses: vec![DeviceStatus {
                device_id: 1,
                device_name: "RTX 4090".to_string(),
                device_type: "gpu".to_string(),
                speed: 1_000_000,
                utilization: 98,
                temperature: 62,
            }],
        }
    }

    #[test]
    fn test_progress_fraction() {
        assert!((frame(25, 100).progress_fraction() - 0.25).abs() < f64::EPSILON);
        assert!((frame(100, 100).progress_fraction() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_progress_fraction_zero_total() {
        assert!(frame(10, 0).progress_fraction().abs() < f64::EPSILON);
    }

    #[test]
    fn test_progress_fraction_clamped() {
        // An agent reporting past the end clamps to 1.0.
        assert!((frame(150, 100).progress_fraction() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_devices_alias_accepted() {
        let json = serde_json::json!({
            "time": Utc::now().to_rfc3339(),
            "status": 3,
            "progress": [1, 10],
            "hashcat_guess": {},
            "devices": [{
                "device_id": 1,
                "device_name": "cpu0",
                "device_type": "cpu",
                "speed": 500,
                "utilization": 50,
                "temperature": -1
            }]
        });
        let frame: StatusFrame = serde_json::from_value(json).unwrap();
        assert_eq!(frame.device_statuses.len(), 1);
    }
}
