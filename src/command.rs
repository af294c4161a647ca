//! Command production: encoding command lines into requests, the generators that expand a
//! trigger into command lines, and the chat trigger patterns themselves.

pub mod encoder;
pub mod generator;
pub mod trigger;

pub use encoder::{CommandEncoder, CommandOrigin, Request};
pub use generator::{
    BlockCensusGenerator, CommandGenerator, GeneratorError, PyramidGenerator, MAX_CENSUS_DEPTH,
    MAX_CENSUS_RADIUS, MAX_PYRAMID_SIZE,
};
pub use trigger::{Trigger, TriggerMatch, TriggerMatcher};
