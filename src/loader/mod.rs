// Getting sounds from wherever they live into memory.
pub mod fetch;
pub mod resolver;
pub mod sample_loader;
pub mod signer;
