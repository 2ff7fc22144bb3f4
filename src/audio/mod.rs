//! Sampling and analysis stages, leaf first:
//!
//! source -> preprocess -> agc -> peak      (every decimated sample)
//! source -> spectrum -> bands              (once per transform block)
pub mod agc;
pub mod bands;
pub mod calibration;
pub mod decode;
pub mod features;
pub mod peak;
pub mod preprocess;
pub mod source;
pub mod spectrum;
