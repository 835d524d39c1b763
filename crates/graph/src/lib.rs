pub mod builder;
pub mod memory;
pub mod neo4j;
pub mod store;

pub use builder::GraphBuilder;
pub use memory::MemoryStore;
pub use neo4j::Neo4jStore;
pub use store::{EntityRecord, GraphStats, GraphStore, Neighbor};
