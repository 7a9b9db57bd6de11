use log::{debug, info};
use std::ops::Range;
use std::sync::Arc;

use crate::amp::meter::{MeterHandle, SignalMeter};
use crate::amp::params::{
    ParameterAddress, ParameterEvent, ParameterHandle, ParameterSnapshot, SharedParameters,
};
use crate::amp::stages::clipper::Clipper;
use crate::amp::stages::filter::{BiquadState, PreEmphasis};
use crate::amp::stages::oversampler::Oversampler;
use crate::amp::stages::tube::TubeBank;

/// Largest channel count a kernel accepts.
pub const MAX_CHANNELS: usize = 8;
/// Fixed compensation for the level lost in the tube stages.
pub const MAKEUP_GAIN: f32 = 2.5;
pub const DEFAULT_MAX_FRAMES: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelState {
    Uninitialized,
    Bypassed,
    Processing,
}

impl std::fmt::Display for KernelState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Uninitialized => write!(f, "uninitialized"),
            Self::Bypassed => write!(f, "bypassed"),
            Self::Processing => write!(f, "processing"),
        }
    }
}

/// Everything one channel remembers between samples.
#[derive(Debug, Clone)]
struct ChannelState {
    pre_emphasis: BiquadState,
    oversampler: Oversampler,
    tubes: TubeBank,
}

impl ChannelState {
    fn new(sample_rate: f32) -> Self {
        Self {
            pre_emphasis: BiquadState::default(),
            oversampler: Oversampler::new(),
            tubes: TubeBank::new(sample_rate),
        }
    }

    /// Retune the tube units for a new rate and drop all history.
    fn reconfigure(&mut self, sample_rate: f32) {
        self.tubes.set_sample_rate(sample_rate);
        self.reset();
    }

    fn reset(&mut self) {
        self.pre_emphasis.reset();
        self.oversampler.reset();
        self.tubes.reset();
    }

    /// Pre-emphasis, drive, 4x clip, decimate, tube blend. Output is before
    /// makeup gain and volume.
    #[inline]
    fn render(
        &mut self,
        input: f32,
        filter: &PreEmphasis,
        clipper: &Clipper,
        params: &ParameterSnapshot,
    ) -> f32 {
        let emphasized = filter.apply(input, &mut self.pre_emphasis);
        let driven = emphasized * params.tube_gain;

        let upsampled = self.oversampler.upsample(driven);
        let clipped = clipper.process_oversampled(upsampled);
        let decimated = self.oversampler.downsample(clipped);

        self.tubes.process(decimated, &params.mix)
    }
}

#[derive(Debug, Clone, Copy)]
struct Session {
    sample_rate: f64,
}

/// The tube saturation processor.
///
/// Construct once, [`initialize`](Self::initialize) with the channel layout
/// and sample rate, then call [`process`](Self::process) or
/// [`process_with_events`](Self::process_with_events) from the audio thread.
/// Neither allocates, locks or blocks. Parameters can be changed from other
/// threads through a [`ParameterHandle`].
pub struct TubeKernel {
    params: Arc<SharedParameters>,
    session: Option<Session>,
    pre_emphasis: PreEmphasis,
    channels: Vec<ChannelState>,
    meter: SignalMeter,
    max_frames: usize,
}

impl Default for TubeKernel {
    fn default() -> Self {
        Self::new()
    }
}

impl TubeKernel {
    pub fn new() -> Self {
        Self {
            params: Arc::new(SharedParameters::default()),
            session: None,
            pre_emphasis: PreEmphasis::default(),
            channels: Vec::with_capacity(MAX_CHANNELS),
            meter: SignalMeter::new(),
            max_frames: DEFAULT_MAX_FRAMES,
        }
    }

    /// Prepare for a render session. Calling it again (for example after a
    /// sample-rate change) recomputes the filter and clears all history.
    ///
    /// # Panics
    /// If the channel counts differ, are zero or exceed [`MAX_CHANNELS`], or
    /// the sample rate is not a positive finite number.
    pub fn initialize(&mut self, input_channels: usize, output_channels: usize, sample_rate: f64) {
        assert_eq!(
            input_channels, output_channels,
            "input and output channel counts must match"
        );
        assert!(
            (1..=MAX_CHANNELS).contains(&input_channels),
            "channel count {input_channels} outside 1..={MAX_CHANNELS}"
        );
        assert!(
            sample_rate.is_finite() && sample_rate > 0.0,
            "invalid sample rate {sample_rate}"
        );

        if let Some(previous) = self.session {
            debug!(
                "Reinitializing kernel: {} Hz -> {} Hz",
                previous.sample_rate, sample_rate
            );
        }

        self.pre_emphasis = PreEmphasis::new(sample_rate);
        self.channels.truncate(input_channels);
        for channel in &mut self.channels {
            channel.reconfigure(sample_rate as f32);
        }
        self.channels
            .resize_with(input_channels, || ChannelState::new(sample_rate as f32));
        self.meter.reset();
        self.params.publish_signal_level(0.0);
        self.session = Some(Session { sample_rate });

        info!("Kernel initialized: {input_channels} channel(s) at {sample_rate} Hz");
        debug!("Pre-emphasis coefficients: {:?}", self.pre_emphasis.coefficients());
    }

    /// Tear the session down. Parameters keep their values.
    pub fn deinitialize(&mut self) {
        if self.session.take().is_some() {
            debug!("Kernel deinitialized");
        }
        self.channels.clear();
        self.meter.reset();
        self.params.publish_signal_level(0.0);
    }

    /// Clear per-channel history, tube state and the meter.
    pub fn reset(&mut self) {
        for channel in &mut self.channels {
            channel.reset();
        }
        self.meter.reset();
        self.params.publish_signal_level(0.0);
    }

    pub const fn is_initialized(&self) -> bool {
        self.session.is_some()
    }

    pub fn state(&self) -> KernelState {
        match self.session {
            None => KernelState::Uninitialized,
            Some(_) if self.params.is_bypassed() => KernelState::Bypassed,
            Some(_) => KernelState::Processing,
        }
    }

    pub fn sample_rate(&self) -> Option<f64> {
        self.session.map(|s| s.sample_rate)
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub const fn maximum_frames_to_render(&self) -> usize {
        self.max_frames
    }

    pub const fn set_maximum_frames_to_render(&mut self, max_frames: usize) {
        self.max_frames = max_frames;
    }

    pub fn handle(&self) -> ParameterHandle {
        ParameterHandle::new(Arc::clone(&self.params))
    }

    pub fn meter(&self) -> MeterHandle {
        MeterHandle::new(Arc::clone(&self.params))
    }

    pub fn set_parameter(&mut self, address: u64, value: f32) {
        self.params.set_raw(address, value);
    }

    /// Unknown addresses read as 0.0.
    pub fn get_parameter(&self, address: u64) -> f32 {
        ParameterAddress::from_raw(address).map_or(0.0, |a| self.get(a))
    }

    pub fn set(&mut self, address: ParameterAddress, value: f32) {
        self.params.set(address, value);
    }

    pub fn get(&self, address: ParameterAddress) -> f32 {
        match address {
            ParameterAddress::SignalLevel => self.signal_level(),
            _ => self.params.get(address),
        }
    }

    pub fn set_bypass(&mut self, bypassed: bool) {
        self.params.set_bypass(bypassed);
    }

    pub fn is_bypassed(&self) -> bool {
        self.params.is_bypassed()
    }

    /// Current meter level; 0.0 while bypassed.
    pub fn signal_level(&self) -> f32 {
        if self.is_bypassed() {
            0.0
        } else {
            self.meter.read()
        }
    }

    /// Render `frame_count` frames from `inputs` into `outputs`.
    ///
    /// # Panics
    /// If the kernel is not initialized, the buffer lists differ in length or
    /// exceed the initialized channel count, any buffer is shorter than
    /// `frame_count`, or `frame_count` exceeds the maximum frames to render.
    pub fn process(&mut self, inputs: &[&[f32]], outputs: &mut [&mut [f32]], frame_count: usize) {
        self.process_with_events(inputs, outputs, frame_count, &[]);
    }

    /// Render a block, applying each event at its frame offset.
    ///
    /// Events are expected in non-decreasing offset order. An event that is
    /// already behind the render position takes effect immediately; one past
    /// the end of the block takes effect after the last frame.
    ///
    /// # Panics
    /// Same conditions as [`process`](Self::process).
    pub fn process_with_events(
        &mut self,
        inputs: &[&[f32]],
        outputs: &mut [&mut [f32]],
        frame_count: usize,
        events: &[ParameterEvent],
    ) {
        self.check_buffers(inputs, outputs, frame_count);

        let mut pending = events.iter().peekable();
        let mut cursor = 0;
        let mut last_bypassed_end = None;
        loop {
            while let Some(event) = pending.next_if(|e| e.sample_offset <= cursor) {
                self.params.set_raw(event.address, event.value);
            }
            if cursor >= frame_count {
                break;
            }

            let end = pending
                .peek()
                .map_or(frame_count, |e| e.sample_offset.min(frame_count));
            if self.render_segment(inputs, outputs, cursor..end) {
                last_bypassed_end = Some(end);
            }
            cursor = end;
        }

        for event in pending {
            self.params.set_raw(event.address, event.value);
        }

        self.update_meter(outputs, frame_count, last_bypassed_end);
    }

    /// Feed the block to the meter channel by channel, as if it had been
    /// rendered in one piece. Every channel pass crosses the bypassed ranges,
    /// which force the meter to 0, so after one only the last channel's tail
    /// still counts.
    fn update_meter(
        &mut self,
        outputs: &[&mut [f32]],
        frame_count: usize,
        last_bypassed_end: Option<usize>,
    ) {
        match last_bypassed_end {
            None => {
                for output in outputs {
                    self.meter.process(&output[..frame_count]);
                }
            }
            Some(end) => {
                self.meter.reset();
                if let Some(last) = outputs.last() {
                    self.meter.process(&last[end..frame_count]);
                }
            }
        }
        self.params.publish_signal_level(self.meter.read());
    }

    fn check_buffers(&self, inputs: &[&[f32]], outputs: &[&mut [f32]], frame_count: usize) {
        assert!(self.is_initialized(), "process called before initialize");
        assert_eq!(
            inputs.len(),
            outputs.len(),
            "input and output channel counts must match"
        );
        assert!(
            inputs.len() <= self.channels.len(),
            "{} channels passed to a kernel initialized for {}",
            inputs.len(),
            self.channels.len()
        );
        assert!(
            frame_count <= self.max_frames,
            "frame count {frame_count} exceeds maximum {}",
            self.max_frames
        );
        assert!(
            inputs.iter().all(|b| b.len() >= frame_count)
                && outputs.iter().all(|b| b.len() >= frame_count),
            "buffer shorter than frame count {frame_count}"
        );
    }

    /// Render one stretch of the block with the current parameters. Returns
    /// whether it was bypassed.
    fn render_segment(
        &mut self,
        inputs: &[&[f32]],
        outputs: &mut [&mut [f32]],
        range: Range<usize>,
    ) -> bool {
        let params = self.params.snapshot();

        if params.bypassed {
            for (input, output) in inputs.iter().zip(outputs.iter_mut()) {
                output[range.clone()].copy_from_slice(&input[range.clone()]);
            }
            return true;
        }

        let clipper = Clipper::for_gain(params.tube_gain);
        let filter = &self.pre_emphasis;

        for ((state, input), output) in self
            .channels
            .iter_mut()
            .zip(inputs.iter())
            .zip(outputs.iter_mut())
        {
            for (x, y) in input[range.clone()]
                .iter()
                .zip(output[range.clone()].iter_mut())
            {
                let saturated = state.render(*x, filter, &clipper, &params);
                *y = saturated * MAKEUP_GAIN * params.output_volume;
            }
        }

        false
    }
}
