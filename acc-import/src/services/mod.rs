pub mod blob_store;
pub mod dedup;
pub mod fetcher;
pub mod importer;
pub mod index_writer;
pub mod kv_store;
pub mod oauth_client;
pub mod search_index;
pub mod session_manager;

pub use blob_store::{BlobDescriptor, BlobStore, ListPage, MemoryBlobStore, PutOptions, StorageError};
pub use dedup::find_uploaded_ids;
pub use fetcher::{FetchedImage, HttpImageFetcher, ImageFetcher};
pub use importer::{ImportError, Importer};
pub use index_writer::{describe, IndexWriter};
pub use kv_store::{KvError, KvStore, MemoryKvStore};
pub use oauth_client::{OAuthClient, TokenGrant, TokenProvider};
pub use search_index::{IndexError, IndexRecord, MemorySearchIndex, SearchHit, SearchIndex};
pub use session_manager::SessionManager;
