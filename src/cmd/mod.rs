pub mod output;
pub mod servers;
pub mod stream;
