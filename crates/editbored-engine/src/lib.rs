pub mod autosave;
pub mod editing;
pub mod embed;
pub mod io;
pub mod markdown;
pub mod mentions;
pub mod models;
pub mod preview;
pub mod scheduler;
pub mod session;

#[cfg(test)]
pub mod tests;

// Re-export key types for easier usage
pub use editing::{FormatEngine, FormatState, Key, KeyOutcome, KeyPress, Modifiers, Mutator};
pub use embed::{EmbedDescriptor, EmbedType, classify};
pub use io::{FileStore, KeyValueStore, MemoryStore, PersistedSnapshot, StoreError};
pub use models::*;
pub use session::{BodyFormat, Collaborators, EditorOptions, EditorSession, UploadError};
