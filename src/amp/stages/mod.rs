pub mod clipper;
pub mod common;
pub mod filter;
pub mod oversampler;
pub mod tube;

// The capability every saturation unit implements. The kernel only ever
// talks to the tube units through this trait.
pub trait Stage: Send + 'static {
    // Process a single sample through this stage
    fn process(&mut self, input: f32) -> f32;

    // Process a block of samples through this stage
    fn process_block(&mut self, input: &mut [f32]) {
        for sample in input.iter_mut() {
            *sample = self.process(*sample);
        }
    }

    // Recompute anything that depends on the processing rate
    fn set_sample_rate(&mut self, sample_rate: f32);

    // Clear internal state without touching configuration
    fn reset(&mut self);
}
