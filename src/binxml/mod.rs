pub mod name;
pub mod tokens;
pub mod value_variant;

pub(crate) mod deserializer;
pub(crate) mod value_render;
pub(crate) mod xml_render;
