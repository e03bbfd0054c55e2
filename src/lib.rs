pub mod config;
pub mod host;
pub mod terrain;
pub mod threading;

pub use config::{ConfigError, LodInfo, TerrainSettings};
pub use host::{ObjectHandle, SceneHost};
pub use terrain::streamer::TerrainStreamer;
pub use threading::{AsyncWorkQueue, WorkerError};
