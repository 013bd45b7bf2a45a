//! Per-connection transcripts.
//!
//! Every session records its traffic to its own append-only log named
//! after the peer address, e.g. `log/192_168_18_125_p50000.log`.

use chrono::Local;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::warn;

/// Destination for one connection's transcript lines.
pub trait Transcript: Send + Sync {
    /// Append one line. Failures are reported, never returned.
    fn record(&self, line: &str);
}

/// Transcript appended to a file, one timestamped line per record.
pub struct FileTranscript {
    path: PathBuf,
    file: Mutex<File>,
}

impl FileTranscript {
    /// Open (or create) the transcript for `peer` inside `dir`.
    pub fn open(dir: &Path, peer: SocketAddr) -> io::Result<Self> {
        fs::create_dir_all(dir)?;
        let path = dir.join(file_name(peer));
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Transcript for FileTranscript {
    fn record(&self, line: &str) {
        let stamped = format!("{} {}\n", Local::now().format("%Y/%m/%d %H:%M:%S"), line);
        let mut file = match self.file.lock() {
            Ok(file) => file,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Err(e) = file.write_all(stamped.as_bytes()) {
            warn!(path = %self.path.display(), error = %e, "Failed to write transcript");
        }
    }
}

/// Transcript file name for a peer: `.` and `:` in the IP become `_`,
/// followed by `_p<port>.log`.
pub fn file_name(peer: SocketAddr) -> String {
    let ip: String = peer
        .ip()
        .to_string()
        .chars()
        .map(|c| if c == '.' || c == ':' { '_' } else { c })
        .collect();
    format!("{}_p{}.log", ip, peer.port())
}

/// Transcript kept in memory, for tests.
#[cfg(test)]
#[derive(Default)]
pub struct MemoryTranscript {
    lines: Mutex<Vec<String>>,
}

#[cfg(test)]
impl MemoryTranscript {
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }
}

#[cfg(test)]
impl Transcript for MemoryTranscript {
    fn record(&self, line: &str) {
        self.lines.lock().unwrap().push(line.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_name_ipv4() {
        let peer: SocketAddr = "192.168.18.125:50000".parse().unwrap();
        assert_eq!(file_name(peer), "192_168_18_125_p50000.log");
    }

    #[test]
    fn test_file_name_ipv6() {
        let peer: SocketAddr = "[::1]:4000".parse().unwrap();
        assert_eq!(file_name(peer), "__1_p4000.log");
    }

    #[test]
    fn test_file_transcript_appends() {
        let dir = tempfile::tempdir().unwrap();
        let peer: SocketAddr = "127.0.0.1:5555".parse().unwrap();

        let transcript = FileTranscript::open(dir.path(), peer).unwrap();
        transcript.record("[CLIENT] hello");
        transcript.record("[SERVER] Hi there!");
        drop(transcript);

        // Reopening appends rather than truncating
        let transcript = FileTranscript::open(dir.path(), peer).unwrap();
        transcript.record("[CLIENT] bye");
        assert_eq!(transcript.path(), dir.path().join("127_0_0_1_p5555.log"));

        let contents = fs::read_to_string(transcript.path()).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].ends_with(" [CLIENT] hello"));
        assert!(lines[1].ends_with(" [SERVER] Hi there!"));
        assert!(lines[2].ends_with(" [CLIENT] bye"));
    }

    #[test]
    fn test_creates_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("nested").join("log");
        let peer: SocketAddr = "10.0.0.1:1".parse().unwrap();

        let transcript = FileTranscript::open(&nested, peer).unwrap();
        transcript.record("line");
        assert!(nested.join("10_0_0_1_p1.log").exists());
    }
}
