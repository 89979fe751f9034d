// Small adapter-level helpers.

pub mod rng;
