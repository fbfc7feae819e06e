use super::format::packet_line;
use crate::worker::{Packet, PacketHandler};
use crate::{Result, UdpLogError};
use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::info;

/// Append-only packet log with optional size-based rotation
///
/// Writers are serialized by an async mutex, so lines from concurrent
/// handler units never interleave. When rotation is enabled and the next
/// line would push the file past the limit, the current file is renamed to
/// `<path>.1` (replacing any previous one) and a new file is started.
///
/// # Examples
///
/// ```no_run
/// use udplogd::PacketLog;
///
/// #[tokio::main]
/// async fn main() -> udplogd::Result<()> {
///     let log = PacketLog::new("./udp_log.txt", Some(1024 * 1024));
///     log.append("[2024-01-01 00:00:00] 10.0.0.1:5000 (5 bytes): hello").await?;
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct PacketLog {
    path: PathBuf,
    rotate_at: Option<u64>,
    file: Mutex<Option<File>>,
}

impl PacketLog {
    pub fn new(path: impl Into<PathBuf>, rotate_at: Option<u64>) -> Self {
        Self {
            path: path.into(),
            rotate_at: rotate_at.filter(|limit| *limit > 0),
            file: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Where the previous file goes on rotation
    pub fn rotated_path(&self) -> PathBuf {
        let mut name = self.path.clone().into_os_string();
        name.push(".1");
        PathBuf::from(name)
    }

    /// Appends `line` followed by a newline
    pub async fn append(&self, line: &str) -> Result<()> {
        let entry = format!("{line}\n");
        let mut guard = self.file.lock().await;

        if let Some(limit) = self.rotate_at {
            let current = match fs::metadata(&self.path).await {
                Ok(meta) => meta.len(),
                Err(e) if e.kind() == io::ErrorKind::NotFound => 0,
                Err(e) => return Err(UdpLogError::Io(e)),
            };
            if current > 0 && current + entry.len() as u64 > limit {
                *guard = None;
                fs::rename(&self.path, self.rotated_path()).await?;
                info!(path = %self.path.display(), size = current, "Rotated packet log");
            }
        }

        let mut file = match guard.take() {
            Some(file) => file,
            None => self.open().await?,
        };
        file.write_all(entry.as_bytes()).await?;
        file.flush().await?;
        *guard = Some(file);

        Ok(())
    }

    async fn open(&self) -> Result<File> {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(UdpLogError::Io)
    }
}

/// Default handler: writes every admitted datagram to a [`PacketLog`]
#[derive(Debug)]
pub struct LogHandler {
    log: PacketLog,
}

impl LogHandler {
    pub fn new(log: PacketLog) -> Self {
        Self { log }
    }

    pub fn log(&self) -> &PacketLog {
        &self.log
    }
}

#[async_trait]
impl PacketHandler for LogHandler {
    async fn handle(&self, packet: Packet) -> Result<()> {
        let line = packet_line(&packet);
        info!(addr = %packet.source, size = packet.len(), preview = %packet.trimmed_payload(), "Received datagram");
        self.log.append(&line).await
    }

    async fn summary(&self, line: String) -> Result<()> {
        self.log.append(&line).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_append_creates_file() {
        let dir = tempdir().unwrap();
        let log = PacketLog::new(dir.path().join("udp_log.txt"), None);

        log.append("first").await.unwrap();
        log.append("second").await.unwrap();

        let contents = fs::read_to_string(log.path()).await.unwrap();
        assert_eq!(contents, "first\nsecond\n");
    }

    #[tokio::test]
    async fn test_rotation_moves_full_file_aside() {
        let dir = tempdir().unwrap();
        let log = PacketLog::new(dir.path().join("udp_log.txt"), Some(12));

        log.append("0123456789").await.unwrap();
        log.append("abc").await.unwrap();

        let rotated = fs::read_to_string(log.rotated_path()).await.unwrap();
        let current = fs::read_to_string(log.path()).await.unwrap();
        assert_eq!(rotated, "0123456789\n");
        assert_eq!(current, "abc\n");
    }

    #[tokio::test]
    async fn test_zero_limit_disables_rotation() {
        let dir = tempdir().unwrap();
        let log = PacketLog::new(dir.path().join("udp_log.txt"), Some(0));

        for _ in 0..3 {
            log.append("line").await.unwrap();
        }

        assert!(!log.rotated_path().exists());
        let contents = fs::read_to_string(log.path()).await.unwrap();
        assert_eq!(contents.lines().count(), 3);
    }

    #[tokio::test]
    async fn test_concurrent_appends_do_not_interleave() {
        let dir = tempdir().unwrap();
        let log = std::sync::Arc::new(PacketLog::new(dir.path().join("udp_log.txt"), None));

        let mut tasks = Vec::new();
        for i in 0..16 {
            let log = log.clone();
            tasks.push(tokio::spawn(async move {
                log.append(&format!("line-{i:02}-{}", "x".repeat(64))).await
            }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let contents = fs::read_to_string(log.path()).await.unwrap();
        assert_eq!(contents.lines().count(), 16);
        assert!(contents.lines().all(|line| line.len() == 72));
    }

    #[tokio::test]
    async fn test_handler_writes_packet_line() {
        let dir = tempdir().unwrap();
        let handler = LogHandler::new(PacketLog::new(dir.path().join("udp_log.txt"), None));

        let packet = Packet::new("10.0.0.1:4000".parse().unwrap(), b"  hello \n");
        handler.handle(packet).await.unwrap();

        let contents = fs::read_to_string(handler.log().path()).await.unwrap();
        assert!(contents.ends_with("] 10.0.0.1:4000 (9 bytes): hello\n"));
    }

    #[tokio::test]
    async fn test_handler_writes_summary_lines() {
        let dir = tempdir().unwrap();
        let handler = LogHandler::new(PacketLog::new(dir.path().join("udp_log.txt"), None));

        handler
            .summary("[STATS] Dropped packets: 1, Skipped forks: 0".into())
            .await
            .unwrap();

        let contents = fs::read_to_string(handler.log().path()).await.unwrap();
        assert_eq!(contents, "[STATS] Dropped packets: 1, Skipped forks: 0\n");
    }
}
