//! Optional filesystem watch mode (spec.md §4.1). Secondary to the broker:
//! new files appearing in the configured directory after an upstream call
//! completes are surfaced as `call_end`-style frames.

use crate::types::InboundFrame;
use chrono::Utc;
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;

pub struct FileWatchAdapter {
    directory: PathBuf,
}

impl FileWatchAdapter {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    /// Spawns a blocking task pumping filesystem events into `tx` and
    /// returns the watcher handle — drop it to stop watching.
    pub fn spawn(&self, tx: mpsc::Sender<InboundFrame>) -> notify::Result<RecommendedWatcher> {
        let (std_tx, std_rx) = std::sync::mpsc::channel();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            let _ = std_tx.send(res);
        })?;
        watcher.watch(&self.directory, RecursiveMode::NonRecursive)?;

        tokio::task::spawn_blocking(move || {
            for res in std_rx {
                let Ok(event) = res else { continue };
                if !matches!(event.kind, notify::EventKind::Create(_)) {
                    continue;
                }
                for path in event.paths {
                    let frame = frame_for_path(&path);
                    if tx.blocking_send(frame).is_err() {
                        return;
                    }
                }
            }
        });

        Ok(watcher)
    }
}

/// trunk-recorder names a completed recording `<tgid>-<epoch>_<freq>[-call_N].<ext>`,
/// e.g. `52199-1700000000_460025000.0-call_3.wav`, dropped into a directory
/// tree rooted at the system's short name. Parses both out of `path`.
fn parse_recording_filename(path: &Path) -> Option<(i64, f64, &str)> {
    let short_name = path.parent()?.file_name()?.to_str()?;
    let stem = path.file_stem()?.to_str()?;
    let (tgid_str, rest) = stem.split_once('-')?;
    let tgid: i64 = tgid_str.parse().ok()?;
    let epoch_str = rest.split_once('_').map(|(epoch, _)| epoch).unwrap_or(rest);
    let epoch: f64 = epoch_str.parse().ok()?;
    Some((tgid, epoch, short_name))
}

fn frame_for_path(path: &Path) -> InboundFrame {
    let payload = match parse_recording_filename(path) {
        Some((tgid, epoch, short_name)) => serde_json::json!({
            "instance": "file_watch",
            "name": short_name,
            "tgid": tgid,
            "start": epoch,
            "audio_file": path.to_string_lossy(),
        }),
        None => serde_json::json!({ "raw": path.to_string_lossy() }),
    };

    InboundFrame {
        topic: "call_end".to_string(),
        payload: serde_json::to_vec(&payload).unwrap_or_default(),
        received_at: Utc::now(),
        source_instance: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tgid_epoch_and_short_name_from_a_completed_recording_path() {
        let path = PathBuf::from("/recordings/metro-pd/52199-1700000000_460025000.0-call_3.wav");
        let (tgid, epoch, short_name) = parse_recording_filename(&path).unwrap();
        assert_eq!(tgid, 52199);
        assert_eq!(epoch, 1700000000.0);
        assert_eq!(short_name, "metro-pd");
    }

    #[test]
    fn parses_a_filename_with_no_call_suffix() {
        let path = PathBuf::from("/recordings/metro-pd/52199-1700000000_460025000.0.wav");
        let (tgid, epoch, _) = parse_recording_filename(&path).unwrap();
        assert_eq!(tgid, 52199);
        assert_eq!(epoch, 1700000000.0);
    }

    #[test]
    fn an_unrecognized_filename_falls_back_to_the_raw_path() {
        let path = PathBuf::from("/recordings/metro-pd/readme.txt");
        assert!(parse_recording_filename(&path).is_none());
        let frame = frame_for_path(&path);
        let value: serde_json::Value = serde_json::from_slice(&frame.payload).unwrap();
        assert!(value.get("raw").is_some());
    }
}
