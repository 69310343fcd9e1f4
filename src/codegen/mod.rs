pub mod printer;

pub use printer::{emit_node_text, emit_program_text};
