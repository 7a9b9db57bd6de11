pub mod renderer;
pub mod writer;
