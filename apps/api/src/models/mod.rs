pub mod dimension;
pub mod prompt;
