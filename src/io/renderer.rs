use anyhow::{Context, Result};
use hound::{SampleFormat, WavReader};
use log::{debug, info, warn};
use std::path::Path;
use std::str::FromStr;

use crate::amp::kernel::MAX_CHANNELS;
use crate::amp::{MeterInfo, ParameterAddress, ParameterEvent, TubeKernel};
use crate::io::writer::WavWriterThread;

/// A parameter change at an absolute frame of the render, written on the
/// command line as `ID@FRAME=VALUE` (for example `warmtube@48000=0.5`).
/// `ID` is a parameter identifier or its raw address.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Automation {
    pub address: ParameterAddress,
    pub frame: usize,
    pub value: f32,
}

impl FromStr for Automation {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let (id, rest) = s
            .split_once('@')
            .with_context(|| format!("expected ID@FRAME=VALUE, got '{s}'"))?;
        let (frame, value) = rest
            .split_once('=')
            .with_context(|| format!("expected ID@FRAME=VALUE, got '{s}'"))?;

        let address = match id.trim().parse::<u64>() {
            Ok(raw) => ParameterAddress::from_raw(raw)
                .with_context(|| format!("unknown parameter address {raw}"))?,
            Err(_) => id.parse()?,
        };
        anyhow::ensure!(!address.is_read_only(), "{address} is read-only");

        let frame = frame
            .trim()
            .parse()
            .with_context(|| format!("invalid frame '{frame}'"))?;
        let value: f32 = value
            .trim()
            .parse()
            .with_context(|| format!("invalid value '{value}'"))?;
        let (min, max) = address.range();
        anyhow::ensure!(
            address.contains(value),
            "{address} = {value} is outside {min}..={max}"
        );

        Ok(Self {
            address,
            frame,
            value,
        })
    }
}

/// What a finished render produced.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderSummary {
    pub frames: usize,
    pub channels: usize,
    pub sample_rate: u32,
    /// Highest meter reading seen at a block boundary.
    pub peak_level: f32,
}

/// Drives a [`TubeKernel`] over whole files, block by block.
pub struct Renderer {
    kernel: TubeKernel,
    block_size: usize,
    inputs: Vec<Vec<f32>>,
    outputs: Vec<Vec<f32>>,
    events: Vec<ParameterEvent>,
}

impl Renderer {
    /// # Panics
    /// If `block_size` is zero or larger than the kernel's maximum frames.
    pub fn new(kernel: TubeKernel, block_size: usize) -> Self {
        assert!(
            block_size > 0 && block_size <= kernel.maximum_frames_to_render(),
            "block size {block_size} outside 1..={}",
            kernel.maximum_frames_to_render()
        );
        Self {
            kernel,
            block_size,
            inputs: Vec::new(),
            outputs: Vec::new(),
            events: Vec::new(),
        }
    }

    pub const fn kernel(&self) -> &TubeKernel {
        &self.kernel
    }

    /// Render `input` through the kernel into a 32-bit float WAV at `output`.
    pub fn render_file(
        &mut self,
        input: &Path,
        output: &Path,
        automation: &[Automation],
    ) -> Result<RenderSummary> {
        let (samples, spec) = read_wav(input)
            .with_context(|| format!("failed to read '{}'", input.display()))?;
        info!(
            "Input: {} ({} ch, {} Hz, {} frames)",
            input.display(),
            spec.channels,
            spec.sample_rate,
            samples.len() / spec.channels as usize
        );

        let writer = WavWriterThread::new(output, spec.sample_rate, spec.channels)?;
        let tx = writer.sender();
        let summary = self.render(
            &samples,
            spec.channels as usize,
            spec.sample_rate,
            automation,
            |block| {
                tx.send(block.to_vec())
                    .map_err(|_| anyhow::anyhow!("writer thread stopped early"))
            },
        );
        drop(tx);
        let written = writer.stop()?;
        let summary = summary?;

        debug!("Wrote {written} samples to {}", output.display());
        Ok(summary)
    }

    /// Render interleaved samples, handing each processed block (also
    /// interleaved) to `sink`. The kernel is initialized for `channels` and
    /// `sample_rate` before the first block.
    pub fn render<F>(
        &mut self,
        interleaved: &[f32],
        channels: usize,
        sample_rate: u32,
        automation: &[Automation],
        mut sink: F,
    ) -> Result<RenderSummary>
    where
        F: FnMut(&[f32]) -> Result<()>,
    {
        anyhow::ensure!(
            (1..=MAX_CHANNELS).contains(&channels),
            "{channels} channels not supported (max {MAX_CHANNELS})"
        );
        anyhow::ensure!(sample_rate > 0, "sample rate must be positive");
        anyhow::ensure!(
            interleaved.len() % channels == 0,
            "sample count {} is not a multiple of {channels} channels",
            interleaved.len()
        );

        self.kernel
            .initialize(channels, channels, f64::from(sample_rate));
        self.prepare_buffers(channels);

        let mut automation = automation.to_vec();
        automation.sort_by_key(|a| a.frame);
        let mut pending = automation.as_slice();

        let total_frames = interleaved.len() / channels;
        if let Some(last) = automation.last().filter(|a| a.frame >= total_frames) {
            warn!(
                "Automation at frame {} is past the end ({total_frames} frames); applied after the last block",
                last.frame
            );
        }

        let mut interleaved_out = Vec::with_capacity(self.block_size * channels);
        let mut peak_level = 0.0f32;
        let mut start = 0;

        while start < total_frames {
            let frames = self.block_size.min(total_frames - start);
            let end = start + frames;
            let last_block = end == total_frames;

            // Deinterleave
            for (frame, chunk) in interleaved[start * channels..end * channels]
                .chunks_exact(channels)
                .enumerate()
            {
                for (ch, &sample) in chunk.iter().enumerate() {
                    self.inputs[ch][frame] = sample;
                }
            }

            self.events.clear();
            let due = if last_block {
                pending.len()
            } else {
                pending.partition_point(|a| a.frame < end)
            };
            self.events.extend(pending[..due].iter().map(|a| {
                ParameterEvent::new(a.frame.saturating_sub(start), a.address, a.value)
            }));
            pending = &pending[due..];

            // Channel views on the stack, none allocated per block
            let empty: &[f32] = &[];
            let mut inputs = [empty; MAX_CHANNELS];
            let mut outputs: [&mut [f32]; MAX_CHANNELS] = Default::default();
            for (view, buffer) in inputs.iter_mut().zip(&self.inputs) {
                *view = &buffer[..frames];
            }
            for (view, buffer) in outputs.iter_mut().zip(&mut self.outputs) {
                *view = &mut buffer[..frames];
            }
            self.kernel.process_with_events(
                &inputs[..channels],
                &mut outputs[..channels],
                frames,
                &self.events,
            );

            interleaved_out.clear();
            for frame in 0..frames {
                interleaved_out.extend(outputs[..channels].iter().map(|b| b[frame]));
            }
            sink(&interleaved_out)?;

            peak_level = peak_level.max(self.kernel.signal_level());
            start = end;
        }

        // An empty input never reaches the loop; its events still apply
        if total_frames == 0 {
            for a in pending {
                self.kernel.set(a.address, a.value);
            }
        }

        info!(
            "Rendered {total_frames} frames, peak level {:.1} dB",
            MeterInfo::from_level(peak_level).level_db
        );

        Ok(RenderSummary {
            frames: total_frames,
            channels,
            sample_rate,
            peak_level,
        })
    }

    fn prepare_buffers(&mut self, channels: usize) {
        self.inputs.resize_with(channels, Vec::new);
        self.outputs.resize_with(channels, Vec::new);
        self.inputs.truncate(channels);
        self.outputs.truncate(channels);
        for buffer in self.inputs.iter_mut().chain(self.outputs.iter_mut()) {
            buffer.clear();
            buffer.resize(self.block_size, 0.0);
        }
    }
}

/// Read a WAV file as interleaved `f32` in `-1.0..=1.0`.
pub fn read_wav(path: &Path) -> Result<(Vec<f32>, hound::WavSpec)> {
    let mut reader = WavReader::open(path)?;
    let spec = reader.spec();

    let samples = match spec.sample_format {
        SampleFormat::Float => reader.samples::<f32>().collect::<Result<Vec<_>, _>>()?,
        SampleFormat::Int => {
            let scale = 1.0 / (1u64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 * scale))
                .collect::<Result<Vec<_>, _>>()?
        }
    };

    Ok((samples, spec))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(
        renderer: &mut Renderer,
        input: &[f32],
        channels: usize,
        automation: &[Automation],
    ) -> Vec<f32> {
        let mut out = Vec::new();
        renderer
            .render(input, channels, 48_000, automation, |block| {
                out.extend_from_slice(block);
                Ok(())
            })
            .unwrap();
        out
    }

    #[test]
    fn parses_automation() {
        let a: Automation = "warmtube@48000=0.5".parse().unwrap();
        assert_eq!(a.address, ParameterAddress::WarmTube);
        assert_eq!(a.frame, 48_000);
        assert_eq!(a.value, 0.5);

        let raw: Automation = "1@10=1".parse().unwrap();
        assert_eq!(raw.address, ParameterAddress::Bypass);
    }

    #[test]
    fn rejects_bad_automation() {
        for bad in [
            "warmtube=0.5",
            "warmtube@10",
            "nosuch@0=1",
            "warmtube@x=0.5",
            "warmtube@0=abc",
            "warmtube@0=1.5",
            "signallevel@0=0.5",
            "42@0=1",
        ] {
            assert!(bad.parse::<Automation>().is_err(), "{bad} parsed");
        }
    }

    #[test]
    fn block_size_does_not_change_output() {
        let input: Vec<f32> = (0..2000)
            .flat_map(|i| {
                let s = (i as f32 * 0.03).sin() * 0.8;
                [s, -s * 0.5]
            })
            .collect();
        let automation = [
            "tubegain@333=1.7".parse().unwrap(),
            "aggressivetube@1000=0.8".parse().unwrap(),
        ];

        let mut small = Renderer::new(TubeKernel::new(), 64);
        let mut large = Renderer::new(TubeKernel::new(), 1000);
        let a = collect(&mut small, &input, 2, &automation);
        let b = collect(&mut large, &input, 2, &automation);

        assert_eq!(a.len(), input.len());
        assert_eq!(a, b);
    }

    #[test]
    fn bypass_automation_passes_input_through() {
        let input: Vec<f32> = (0..512).map(|i| (i as f32 * 0.1).sin()).collect();
        let mut renderer = Renderer::new(TubeKernel::new(), 128);
        let out = collect(&mut renderer, &input, 1, &["bypass@256=1".parse().unwrap()]);

        assert_eq!(&out[256..], &input[256..]);
        assert_ne!(&out[..256], &input[..256]);
        assert!(renderer.kernel().is_bypassed());
    }

    #[test]
    fn all_channels_keep_their_order() {
        let input: Vec<f32> = (0..300 * MAX_CHANNELS).map(|i| i as f32 * 1e-4).collect();
        let mut renderer = Renderer::new(TubeKernel::new(), 128);
        let out = collect(&mut renderer, &input, MAX_CHANNELS, &["bypass@0=1".parse().unwrap()]);

        assert_eq!(out, input);
        assert_eq!(renderer.kernel().channel_count(), MAX_CHANNELS);
    }

    #[test]
    fn automation_past_end_is_applied() {
        let mut renderer = Renderer::new(TubeKernel::new(), 64);
        collect(&mut renderer, &[0.1; 100], 1, &["warmtube@5000=0.7".parse().unwrap()]);
        assert_eq!(renderer.kernel().get(ParameterAddress::WarmTube), 0.7);
    }

    #[test]
    fn summary_reports_peak() {
        let mut renderer = Renderer::new(TubeKernel::new(), 256);
        let input: Vec<f32> = (0..1024).map(|i| (i as f32 * 0.05).sin() * 0.5).collect();
        let summary = renderer
            .render(&input, 1, 44_100, &[], |_| Ok(()))
            .unwrap();

        assert_eq!(summary.frames, 1024);
        assert_eq!(summary.channels, 1);
        assert!(summary.peak_level > 0.0);
        assert!(summary.peak_level >= renderer.kernel().signal_level());
    }

    #[test]
    fn rejects_ragged_input() {
        let mut renderer = Renderer::new(TubeKernel::new(), 64);
        let result = renderer.render(&[0.0; 5], 2, 48_000, &[], |_| Ok(()));
        assert!(result.is_err());
    }

    #[test]
    #[should_panic(expected = "block size")]
    fn oversized_block_size_panics() {
        let _ = Renderer::new(TubeKernel::new(), 4096);
    }
}
