//! ABOUTME: Recording decisions, frame annotation and the capture loop
//! ABOUTME: Turns motion scores into a debounced recording flag and drives source, sink and display

pub mod annotate;
pub mod display;
pub mod driver;
pub mod session;
pub mod sink;
pub mod source;
pub mod state;

pub use annotate::{AnnotationStyle, Annotator};
pub use display::{Display, DisplayControl, HeadlessDisplay, SnapshotDisplay};
pub use driver::{run, RunSummary, StopHandle};
pub use session::{CycleOutput, RecorderSession};
pub use sink::{run_directory, FrameSink, ImageSequenceSink};
pub use source::{BufferedSource, FrameSource, ImageDirSource, SourceMetadata, VecSource};
pub use state::{RecordingPolicy, RecordingStateMachine, RecordingStatus, Transition};
