pub mod extractor;
pub mod json_output;
pub mod resolver;
pub mod tutor;

pub use extractor::{Extractor, LlmExtractor, RoutingExtractor, TextExtractor};
pub use resolver::{LlmResolver, Resolver};
pub use tutor::Tutor;
