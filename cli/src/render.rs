//! Offline rendering to a WAV file
//!
//! A render thread stands in for the audio device: it pulls callback-sized buffers from the
//! synthesizer and writes them out as 16-bit mono PCM. It only renders while symbols are
//! queued, so time spent waiting on input isn't recorded as silence.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use hound::{WavSpec, WavWriter};
use log::{debug, info};
use tonecast_core::{ModemConfig, ModemError, Result, Synthesizer};

use crate::output::Output;

const IDLE_WAIT: Duration = Duration::from_millis(1);

pub struct WavRender {
    path: PathBuf,
    stop: Arc<AtomicBool>,
    handle: JoinHandle<Result<u64>>,
}

impl WavRender {
    pub fn start(path: &Path, config: &ModemConfig, mut synth: Synthesizer) -> Result<Self> {
        let spec = WavSpec {
            channels: 1,
            sample_rate: config.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let mut writer = WavWriter::create(path, spec).map_err(wav_error)?;
        let frames = config.callback_frames();
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = stop.clone();

        let handle = thread::Builder::new()
            .name("wav-render".into())
            .spawn(move || -> Result<u64> {
                let mut buffer = vec![0i16; frames];
                let mut written = 0u64;

                while !stop_flag.load(Ordering::Acquire) {
                    if synth.pending() == 0 {
                        thread::sleep(IDLE_WAIT);
                        continue;
                    }

                    synth.fill(&mut buffer);
                    write_buffer(&mut writer, &buffer)?;
                    written += buffer.len() as u64;
                }

                writer.finalize().map_err(wav_error)?;
                Ok(written)
            })?;

        debug!("Rendering to {}", path.display());

        Ok(Self {
            path: path.to_path_buf(),
            stop,
            handle,
        })
    }
}

impl Output for WavRender {
    fn finish(self: Box<Self>) -> Result<()> {
        let WavRender { path, stop, handle } = *self;
        stop.store(true, Ordering::Release);

        let written = handle
            .join()
            .map_err(|_| ModemError::Output("render thread panicked".into()))??;

        info!("Wrote {} samples to {}", written, path.display());
        Ok(())
    }
}

fn write_buffer(writer: &mut WavWriter<BufWriter<File>>, buffer: &[i16]) -> Result<()> {
    for &sample in buffer {
        writer.write_sample(sample).map_err(wav_error)?;
    }
    Ok(())
}

fn wav_error(e: hound::Error) -> ModemError {
    ModemError::Output(format!("WAV error: {}", e))
}
