//! Reference resolvers: currency symbol/code resolution, FX rates, and the
//! location code vocabulary.

pub mod currency;
pub mod location;
