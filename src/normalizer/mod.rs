mod ids;
mod normalizer;

pub use ids::IdGenerator;
pub use normalizer::{Normalizer, DEFAULT_BRAND, DEFAULT_MEMO};
