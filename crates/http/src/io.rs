mod chunks;

pub use chunks::*;
