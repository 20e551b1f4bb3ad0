use tonecast_core::Result;

/// A running sink that drives the synthesizer (audio device or offline renderer).
pub trait Output {
    /// Stop pulling samples and release the sink. Called once the queue has drained.
    fn finish(self: Box<Self>) -> Result<()>;
}
