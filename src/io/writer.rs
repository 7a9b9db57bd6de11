use anyhow::Result;
use crossbeam::channel::{Receiver, Sender, bounded};
use hound::WavWriter;
use log::{error, info};
use std::path::{Path, PathBuf};
use std::{fs, thread};

/// Interleaved 32-bit float frames.
pub type AudioBlock = Vec<f32>;
const BLOCK_CHANNEL_CAPACITY: usize = 32;

/// Build `<dir>/tubecity_<timestamp>.wav`.
pub fn timestamped_path(dir: &Path) -> PathBuf {
    dir.join(format!(
        "tubecity_{}.wav",
        chrono::Local::now().format("%Y%m%d_%H%M%S")
    ))
}

/// Writes rendered blocks to a WAV file from a background thread.
pub struct WavWriterThread {
    tx: Sender<AudioBlock>,
    handle: thread::JoinHandle<Result<u64>>,
}

impl WavWriterThread {
    /// Spawn the writer. The parent directory is created if needed; the file
    /// itself is opened on the writer thread.
    pub fn new(path: &Path, sample_rate: u32, channels: u16) -> Result<Self> {
        let (tx, rx) = bounded::<AudioBlock>(BLOCK_CHANNEL_CAPACITY);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let path = path.to_path_buf();
        info!("Writing to: {}", path.display());

        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let handle = thread::spawn(move || run_writer_thread(spec, &path, rx));

        Ok(Self { tx, handle })
    }

    /// Returns a clone of the sender for sending audio blocks.
    pub fn sender(&self) -> Sender<AudioBlock> {
        self.tx.clone()
    }

    /// Close the channel and wait for the file to be finalized. Returns the
    /// number of samples written.
    pub fn stop(self) -> Result<u64> {
        drop(self.tx);
        self.handle
            .join()
            .map_err(|e| anyhow::anyhow!("Writer thread panicked (join failed): {:?}", e))?
    }
}

/// Drains the channel into the file until every sender is dropped.
fn run_writer_thread(spec: hound::WavSpec, path: &Path, rx: Receiver<AudioBlock>) -> Result<u64> {
    let mut writer = match WavWriter::create(path, spec) {
        Ok(w) => w,
        Err(e) => {
            error!("Failed to create WAV file '{}': {e}", path.display());
            return Err(e.into());
        }
    };

    let mut written = 0u64;
    for block in rx {
        for &sample in &block {
            writer.write_sample(sample)?;
        }
        written += block.len() as u64;
    }

    writer.finalize()?;
    info!("Render saved: {} ({written} samples)", path.display());
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hound::WavReader;
    use std::f32::consts::PI;
    use tempfile::TempDir;

    #[test]
    fn writes_float_wav() -> Result<()> {
        const SAMPLE_RATE: u32 = 48000;
        const TEST_FREQ: f32 = 440.0;
        const AMPLITUDE: f32 = 0.5;
        const FRAMES: usize = 4800;

        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("out").join("test.wav");

        let writer = WavWriterThread::new(&path, SAMPLE_RATE, 2)?;
        let tx = writer.sender();

        let mut expected = Vec::with_capacity(FRAMES * 2);
        for chunk in (0..FRAMES).collect::<Vec<_>>().chunks(256) {
            let mut block = Vec::with_capacity(chunk.len() * 2);
            for &i in chunk {
                let t = i as f32 / SAMPLE_RATE as f32;
                let sample = (2.0 * PI * TEST_FREQ * t).sin() * AMPLITUDE;
                block.push(sample);
                block.push(-sample);
            }
            expected.extend_from_slice(&block);
            tx.send(block)?;
        }

        drop(tx);
        assert_eq!(writer.stop()?, (FRAMES * 2) as u64);

        let mut reader = WavReader::open(&path)?;
        let spec = reader.spec();
        assert_eq!(spec.sample_rate, SAMPLE_RATE);
        assert_eq!(spec.channels, 2);
        assert_eq!(spec.bits_per_sample, 32);
        assert_eq!(spec.sample_format, hound::SampleFormat::Float);

        let samples: Vec<f32> = reader.samples::<f32>().collect::<Result<Vec<_>, _>>()?;
        assert_eq!(samples, expected);
        Ok(())
    }

    #[test]
    fn timestamped_path_lands_in_dir() {
        let path = timestamped_path(Path::new("/tmp/renders"));
        assert_eq!(path.parent(), Some(Path::new("/tmp/renders")));
        let name = path.file_name().and_then(|n| n.to_str()).unwrap();
        assert!(name.starts_with("tubecity_") && name.ends_with(".wav"));
    }
}
