pub mod generate;
pub mod parse;
pub mod settings;
