//! # Follow-mode line source.
//!
//! A [`LogStream`] yields lines in the order the source produced them until it
//! is released. Releasing a stream never affects the component that owns the
//! underlying file, and lines produced before the release are still yielded:
//! a file follower reads what is left up to end of file, a channel stream
//! stops accepting lines and hands out the ones already queued.
//!
//! ## File following
//! [`LogStream::follow`] reads the file from the beginning, then polls for
//! appended data. The follower survives rotation and truncation:
//! - file removed or replaced (new inode): reopened from the start
//! - file shrunk below the read position, or the bytes just before it changed
//!   (copy-truncate followed by new output): read again from offset 0
//! - file not created yet: waited for
//!
//! Partial lines are held back until their newline arrives.

use std::io::{self, SeekFrom};
use std::path::PathBuf;
use std::time::Duration;

use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncSeekExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Number of lines buffered between the file follower and the consumer.
const FOLLOW_BUFFER: usize = 256;

/// Bytes before the read position re-checked to notice a rewritten file.
const TAIL_CHECK: usize = 64;

/// Restartable stream of log lines.
#[derive(Debug)]
pub struct LogStream {
    rx: Option<mpsc::Receiver<String>>,
    stop: CancellationToken,
    /// The producer ends the channel itself once released (file follower).
    producer_drains: bool,
}

impl LogStream {
    /// Follows `path`, checking for new data every `poll` at end of file.
    ///
    /// A missing file is not an error: the stream waits for it to appear. Any
    /// other open failure is returned.
    pub async fn follow(path: impl Into<PathBuf>, poll: Duration) -> io::Result<Self> {
        let path = path.into();
        let initial = match File::open(&path).await {
            Ok(file) => Some(Opened::new(file).await?),
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => return Err(e),
        };

        let (tx, rx) = mpsc::channel(FOLLOW_BUFFER);
        let stop = CancellationToken::new();
        let follower = Follower {
            path,
            poll,
            tx,
            stop: stop.clone(),
        };
        tokio::spawn(follower.run(initial));

        Ok(Self {
            rx: Some(rx),
            stop,
            producer_drains: true,
        })
    }

    /// A stream fed by the returned sender; ends when every sender is dropped.
    pub fn channel(capacity: usize) -> (mpsc::Sender<String>, Self) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let stream = Self {
            rx: Some(rx),
            stop: CancellationToken::new(),
            producer_drains: false,
        };
        (tx, stream)
    }

    /// A stream that never yields a line and ends only when released.
    pub fn idle() -> Self {
        Self {
            rx: None,
            stop: CancellationToken::new(),
            producer_drains: false,
        }
    }

    /// Next line, or `None` once the stream is exhausted.
    ///
    /// After a release only lines produced before it are returned.
    pub async fn next_line(&mut self) -> Option<String> {
        let Some(rx) = self.rx.as_mut() else {
            self.stop.cancelled().await;
            return None;
        };
        if !self.stop.is_cancelled() {
            tokio::select! {
                biased;
                line = rx.recv() => return line,
                _ = self.stop.cancelled() => {}
            }
        }
        if !self.producer_drains {
            rx.close();
        }
        rx.recv().await
    }

    /// Stops the stream. Lines produced before the release are still
    /// returned by [`next_line`](Self::next_line), then it returns `None`.
    pub fn release(&self) {
        self.stop.cancel();
    }

    /// Token that releases this stream when cancelled, usable from elsewhere.
    pub fn release_handle(&self) -> CancellationToken {
        self.stop.clone()
    }

    pub fn is_released(&self) -> bool {
        self.stop.is_cancelled()
    }
}

impl Drop for LogStream {
    fn drop(&mut self) {
        self.stop.cancel();
    }
}

/// An open log file, how far it has been read and the last bytes read.
struct Opened {
    reader: BufReader<File>,
    id: u64,
    pos: u64,
    tail: Vec<u8>,
}

impl Opened {
    async fn new(file: File) -> io::Result<Self> {
        let id = file_id(&file.metadata().await?);
        Ok(Self {
            reader: BufReader::new(file),
            id,
            pos: 0,
            tail: Vec::with_capacity(TAIL_CHECK),
        })
    }

    fn consumed(&mut self, bytes: &[u8]) {
        self.pos += bytes.len() as u64;
        let keep = &bytes[bytes.len().saturating_sub(TAIL_CHECK)..];
        let overflow = (self.tail.len() + keep.len()).saturating_sub(TAIL_CHECK);
        self.tail.drain(..overflow);
        self.tail.extend_from_slice(keep);
    }

    /// Whether the bytes before `pos` are still the ones read there.
    async fn tail_intact(&mut self) -> bool {
        if self.tail.is_empty() {
            return true;
        }
        let start = self.pos - self.tail.len() as u64;
        let mut seen = vec![0; self.tail.len()];
        if self.reader.seek(SeekFrom::Start(start)).await.is_err() {
            return false;
        }
        // On success the reader is back at `pos`.
        match self.reader.read_exact(&mut seen).await {
            Ok(_) => seen == self.tail,
            Err(_) => false,
        }
    }

    async fn rewind(&mut self) -> io::Result<()> {
        self.reader.seek(SeekFrom::Start(0)).await?;
        self.pos = 0;
        self.tail.clear();
        Ok(())
    }
}

struct Follower {
    path: PathBuf,
    poll: Duration,
    tx: mpsc::Sender<String>,
    stop: CancellationToken,
}

impl Follower {
    async fn run(self, mut current: Option<Opened>) {
        let mut partial: Vec<u8> = Vec::new();

        loop {
            let Some(opened) = current.as_mut() else {
                if self.stop.is_cancelled() {
                    return;
                }
                current = match File::open(&self.path).await {
                    Ok(file) => Opened::new(file).await.ok(),
                    Err(_) => None,
                };
                if current.is_none() && !self.pause().await {
                    return;
                }
                continue;
            };

            match opened.reader.read_until(b'\n', &mut partial).await {
                // Released and caught up with the file.
                Ok(0) if self.stop.is_cancelled() => return,
                Ok(0) => {
                    // A release during the pause still reads up to end of file.
                    self.pause().await;
                    match self.check_rotation(opened).await {
                        Rotation::Unchanged => {}
                        Rotation::Truncated => partial.clear(),
                        Rotation::Replaced => {
                            partial.clear();
                            current = None;
                        }
                    }
                }
                Ok(n) => {
                    opened.consumed(&partial[partial.len() - n..]);
                    if partial.last() != Some(&b'\n') {
                        continue;
                    }
                    let line = take_line(&mut partial);
                    if self.tx.send(line).await.is_err() {
                        return;
                    }
                }
                Err(e) => {
                    tracing::debug!(path = %self.path.display(), error = %e, "log read failed");
                    current = None;
                    if !self.pause().await {
                        return;
                    }
                }
            }
        }
    }

    /// Sleeps one poll interval; false if the stream was released meanwhile.
    async fn pause(&self) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(self.poll) => true,
            _ = self.stop.cancelled() => false,
        }
    }

    async fn check_rotation(&self, opened: &mut Opened) -> Rotation {
        let meta = match tokio::fs::metadata(&self.path).await {
            Ok(meta) => meta,
            Err(_) => return Rotation::Replaced,
        };
        if file_id(&meta) != opened.id {
            return Rotation::Replaced;
        }
        if meta.len() >= opened.pos && opened.tail_intact().await {
            return Rotation::Unchanged;
        }
        if opened.rewind().await.is_err() {
            return Rotation::Replaced;
        }
        Rotation::Truncated
    }
}

enum Rotation {
    Unchanged,
    Truncated,
    Replaced,
}

fn take_line(buf: &mut Vec<u8>) -> String {
    let mut end = buf.len();
    while end > 0 && matches!(buf[end - 1], b'\n' | b'\r') {
        end -= 1;
    }
    let line = String::from_utf8_lossy(&buf[..end]).into_owned();
    buf.clear();
    line
}

#[cfg(unix)]
fn file_id(meta: &std::fs::Metadata) -> u64 {
    use std::os::unix::fs::MetadataExt;
    meta.ino()
}

#[cfg(not(unix))]
fn file_id(_meta: &std::fs::Metadata) -> u64 {
    0
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::Path;
    use tokio::time::timeout;

    const POLL: Duration = Duration::from_millis(10);
    const WAIT: Duration = Duration::from_secs(5);

    async fn next(stream: &mut LogStream) -> String {
        timeout(WAIT, stream.next_line())
            .await
            .expect("no line within timeout")
            .expect("stream ended")
    }

    fn append(path: &Path, text: &str) {
        let mut f = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .unwrap();
        f.write_all(text.as_bytes()).unwrap();
    }

    #[tokio::test]
    async fn follows_existing_content_and_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ceph-mon.a.log");
        append(&path, "mon.a starting\n");

        let mut stream = LogStream::follow(&path, POLL).await.unwrap();
        assert_eq!(next(&mut stream).await, "mon.a starting");

        append(&path, "mon.a is new leader\nelection done\n");
        assert_eq!(next(&mut stream).await, "mon.a is new leader");
        assert_eq!(next(&mut stream).await, "election done");
    }

    #[tokio::test]
    async fn partial_lines_wait_for_their_newline() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log");
        append(&path, "half");

        let mut stream = LogStream::follow(&path, POLL).await.unwrap();
        assert!(timeout(POLL * 5, stream.next_line()).await.is_err());

        append(&path, " and half\n");
        assert_eq!(next(&mut stream).await, "half and half");
    }

    #[tokio::test]
    async fn missing_file_is_waited_for() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ceph-osd.0.log");

        let mut stream = LogStream::follow(&path, POLL).await.unwrap();
        append(&path, "osd.0 booted\n");
        assert_eq!(next(&mut stream).await, "osd.0 booted");
    }

    #[tokio::test]
    async fn truncation_restarts_from_the_beginning() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log");
        append(&path, "a fairly long first line\n");

        let mut stream = LogStream::follow(&path, POLL).await.unwrap();
        assert_eq!(next(&mut stream).await, "a fairly long first line");

        std::fs::write(&path, "short\n").unwrap();
        assert_eq!(next(&mut stream).await, "short");
    }

    #[tokio::test]
    async fn rewrite_longer_than_the_read_position_restarts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log");
        append(&path, "ab\n");

        let mut stream = LogStream::follow(&path, Duration::from_millis(200)).await.unwrap();
        assert_eq!(next(&mut stream).await, "ab");

        // Let the follower go idle, then truncate in place and write past the
        // old offset within one poll.
        tokio::time::sleep(Duration::from_millis(50)).await;
        std::fs::write(&path, "first line after rotate\n").unwrap();
        assert_eq!(next(&mut stream).await, "first line after rotate");
    }

    #[tokio::test]
    async fn replaced_file_is_reopened() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log");
        append(&path, "old\n");

        let mut stream = LogStream::follow(&path, POLL).await.unwrap();
        assert_eq!(next(&mut stream).await, "old");

        std::fs::rename(&path, dir.path().join("log.1")).unwrap();
        append(&path, "new\n");
        assert_eq!(next(&mut stream).await, "new");
    }

    #[tokio::test]
    async fn unreadable_location_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("file"), b"").unwrap();
        let err = LogStream::follow(dir.path().join("file").join("below"), POLL)
            .await
            .unwrap_err();
        assert_ne!(err.kind(), io::ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn release_ends_the_stream() {
        let mut idle = LogStream::idle();
        let handle = idle.release_handle();
        tokio::spawn(async move {
            tokio::time::sleep(POLL).await;
            handle.cancel();
        });
        assert_eq!(timeout(WAIT, idle.next_line()).await.unwrap(), None);
        assert!(idle.is_released());
    }

    #[tokio::test]
    async fn release_still_yields_what_was_written_before_it() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ceph-osd.0.log");
        append(&path, "booting\n");

        let mut stream = LogStream::follow(&path, Duration::from_millis(200)).await.unwrap();
        assert_eq!(next(&mut stream).await, "booting");

        tokio::time::sleep(Duration::from_millis(50)).await;
        append(&path, "shutting down\n");
        stream.release();

        assert_eq!(next(&mut stream).await, "shutting down");
        assert_eq!(timeout(WAIT, stream.next_line()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn released_channel_hands_out_queued_lines_only() {
        let (tx, mut stream) = LogStream::channel(4);
        tx.send("queued".into()).await.unwrap();
        stream.release();

        assert_eq!(stream.next_line().await.as_deref(), Some("queued"));
        assert!(tx.send("late".into()).await.is_err());
        assert_eq!(stream.next_line().await, None);
    }

    #[tokio::test]
    async fn channel_stream_ends_with_its_senders() {
        let (tx, mut stream) = LogStream::channel(4);
        tx.send("one".into()).await.unwrap();
        drop(tx);
        assert_eq!(stream.next_line().await.as_deref(), Some("one"));
        assert_eq!(stream.next_line().await, None);
    }
}
