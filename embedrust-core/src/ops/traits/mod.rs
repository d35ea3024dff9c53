pub mod numeric;

pub use numeric::{EmbedFloat, EmbedIndex};
