mod multiplexer;
#[cfg(test)]
mod tests;
mod watch;

pub use multiplexer::Multiplexer;
pub use watch::{parse_control, watch, Control};
