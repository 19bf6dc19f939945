pub mod prefix;
pub mod settings;
