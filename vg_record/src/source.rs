//! ABOUTME: Frame sources feeding the capture loop
//! ABOUTME: Image-directory replay, in-memory frames and a bounded read-ahead buffer

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{sync_channel, Receiver};
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};
use vg_core::{Error, Result};
use vg_vision::Frame;

/// Image file extensions an [`ImageDirSource`] picks up
const IMAGE_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// Stream properties reported before the first frame is read
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SourceMetadata {
    pub width: u32,
    pub height: u32,
    /// Nominal frame rate used for replay timing
    pub fps: f64,
}

/// Sequential producer of frames.
///
/// `Ok(None)` marks the end of the stream; every frame has the dimensions
/// reported by [`FrameSource::metadata`].
pub trait FrameSource: Send {
    fn metadata(&self) -> SourceMetadata;

    fn next_frame(&mut self) -> Result<Option<Frame>>;
}

/// Replays the image files of a directory in file-name order
#[derive(Debug)]
pub struct ImageDirSource {
    dir: PathBuf,
    files: VecDeque<PathBuf>,
    pending: Option<Frame>,
    metadata: SourceMetadata,
}

impl ImageDirSource {
    /// Index `dir` and decode its first image to learn the frame size
    pub fn open<P: AsRef<Path>>(dir: P, fps: f64) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        if !dir.is_dir() {
            return Err(Error::Source(format!(
                "Input directory does not exist: {}",
                dir.display()
            )));
        }

        let mut files: Vec<PathBuf> = std::fs::read_dir(&dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file() && is_image(path))
            .collect();
        files.sort();

        let mut files = VecDeque::from(files);
        let first_path = files.pop_front().ok_or_else(|| {
            Error::Source(format!("No image files found in {}", dir.display()))
        })?;
        let first = load_frame(&first_path)?;

        let metadata = SourceMetadata {
            width: first.width(),
            height: first.height(),
            fps,
        };
        info!(
            dir = %dir.display(),
            frames = files.len() + 1,
            width = metadata.width,
            height = metadata.height,
            fps,
            "Opened image directory source"
        );

        Ok(Self {
            dir,
            files,
            pending: Some(first),
            metadata,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Frames not yet returned
    pub fn remaining(&self) -> usize {
        self.files.len() + usize::from(self.pending.is_some())
    }
}

impl FrameSource for ImageDirSource {
    fn metadata(&self) -> SourceMetadata {
        self.metadata
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if let Some(frame) = self.pending.take() {
            return Ok(Some(frame));
        }

        let Some(path) = self.files.pop_front() else {
            return Ok(None);
        };

        let frame = load_frame(&path)?;
        if frame.dimensions() != (self.metadata.width, self.metadata.height) {
            return Err(Error::Source(format!(
                "{} is {}x{}, expected {}x{}",
                path.display(),
                frame.width(),
                frame.height(),
                self.metadata.width,
                self.metadata.height
            )));
        }
        Ok(Some(frame))
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
        .unwrap_or(false)
}

fn load_frame(path: &Path) -> Result<Frame> {
    debug!(path = %path.display(), "Decoding frame");
    Ok(image::open(path)?.to_rgb8())
}

/// Frames held in memory, handy for replay and tests
#[derive(Debug, Clone)]
pub struct VecSource {
    frames: VecDeque<Frame>,
    metadata: SourceMetadata,
}

impl VecSource {
    pub fn new(frames: Vec<Frame>, fps: f64) -> Self {
        let (width, height) = frames.first().map(|f| f.dimensions()).unwrap_or((0, 0));
        Self {
            frames: frames.into(),
            metadata: SourceMetadata { width, height, fps },
        }
    }
}

impl FrameSource for VecSource {
    fn metadata(&self) -> SourceMetadata {
        self.metadata
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        Ok(self.frames.pop_front())
    }
}

/// Reads ahead from another source on a dedicated thread.
///
/// At most `capacity` decoded frames wait in the channel; the reader thread
/// blocks once it is full, so a slow consumer never makes memory grow.
pub struct BufferedSource {
    metadata: SourceMetadata,
    receiver: Receiver<Result<Frame>>,
    reader: Option<JoinHandle<()>>,
}

impl BufferedSource {
    pub fn spawn<S: FrameSource + 'static>(mut source: S, capacity: usize) -> Result<Self> {
        let metadata = source.metadata();
        let (sender, receiver) = sync_channel(capacity.max(1));

        let reader = thread::Builder::new()
            .name("vigil-reader".to_string())
            .spawn(move || loop {
                match source.next_frame() {
                    Ok(Some(frame)) => {
                        if sender.send(Ok(frame)).is_err() {
                            debug!("Frame consumer went away, stopping reader");
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        let _ = sender.send(Err(e));
                        break;
                    }
                }
            })?;

        debug!(capacity, "Started buffered frame reader");
        Ok(Self {
            metadata,
            receiver,
            reader: Some(reader),
        })
    }
}

impl std::fmt::Debug for BufferedSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferedSource")
            .field("metadata", &self.metadata)
            .field("reader_running", &self.reader.is_some())
            .finish()
    }
}

impl FrameSource for BufferedSource {
    fn metadata(&self) -> SourceMetadata {
        self.metadata
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        match self.receiver.recv() {
            Ok(result) => result.map(Some),
            Err(_) => {
                // Sender dropped: the reader has finished
                if let Some(reader) = self.reader.take() {
                    if reader.join().is_err() {
                        warn!("Frame reader thread panicked");
                        return Err(Error::Source("frame reader thread panicked".to_string()));
                    }
                }
                Ok(None)
            }
        }
    }
}
