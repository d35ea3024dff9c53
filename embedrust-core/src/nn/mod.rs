// src/nn/mod.rs
// Layers built on the indexing core, the Module trait and parameter initialisation.

pub mod init;
pub mod layers;
pub mod module;
pub mod parameter;

pub use layers::embedding::Embedding;
pub use module::Module;
pub use parameter::Parameter;
