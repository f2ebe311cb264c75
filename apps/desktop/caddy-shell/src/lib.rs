// Library exports for testing
// The binary (main.rs) imports these as well

pub mod console;
pub mod error;
pub mod logger;
pub mod paths;
pub mod surface;

#[cfg(test)]
mod tests;
