pub mod assets;
pub mod config;
pub mod document;
pub mod error;
pub mod frontmatter;
pub mod inference;
pub mod loader;
pub mod query;
pub mod resolvers;
pub mod schema;
pub mod store;

pub use assets::{Base64Images, ImageResolver, KeepImages, PrefixImages};
pub use config::{Config, ImageStrategy};
pub use document::{ContentItem, MarkdownRenderer};
pub use error::{MdGraphError, Result};
pub use inference::{DocumentFieldSet, FieldType, InferredField, ScalarType, SchemaFieldRegistry};
pub use loader::{load_markdown, LoadOptions, PublishedSchema};
pub use query::{translate, Filter, Pagination, QuerySpec, Selector, Sort, StorePlan};
pub use resolvers::Resolvers;
pub use schema::TypeDefs;
pub use store::{ContentStore, StoreQuery};
