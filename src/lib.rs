pub mod adaptor;
pub mod api;
pub mod error;
pub mod host;
pub mod lexer;
pub mod parser;
pub mod reflect;
pub mod safety;
pub mod serializer;
pub mod value;

pub use api::Engine;
pub use error::SerializeError;
pub use host::{OpaqueValue, SelfDescribing};
pub use parser::parse;
pub use serializer::SerializeOptions;
pub use value::{JsonArray, JsonObject, JsonValue};
