pub mod input;
pub mod pipe;
