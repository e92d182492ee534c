pub mod filename;
pub mod hashing;
pub mod image_compress;
