pub mod consts;
pub mod deconv;
pub mod error;
pub mod fft;
pub mod filter;
pub mod fusion;
pub mod gradient;
pub mod io;
pub mod pipeline;
pub mod register;
pub mod resample;
pub mod volume;
