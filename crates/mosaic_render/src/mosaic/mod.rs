pub mod grid;
pub mod palette;
pub mod quantize;
pub mod ramp;
