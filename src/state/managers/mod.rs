//! Manager structs that own the relay's concurrent state.

pub mod connection;
pub mod presence;
pub mod room;
