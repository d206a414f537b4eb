//! On-disk pose graph archives.
//!
//! Layout: 4-byte magic, u16 LE version, then a postcard-encoded
//! [`SessionArchive`].

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::engine::graph::ScanGraph;
use crate::engine::{Dataset, MapperConfig, OdometryMapper, PoseGraphMapper};
use crate::error::{Result, SlamError};

pub const ARCHIVE_MAGIC: [u8; 4] = *b"SETU";
pub const ARCHIVE_VERSION: u16 = 1;

const PREAMBLE: usize = 6;

/// Decoded archive contents. `graph` is `None` when the file was written
/// without a mapper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionArchive {
    pub graph: Option<ScanGraph>,
    pub dataset: Dataset,
}

#[derive(Serialize)]
struct SessionArchiveRef<'a> {
    graph: Option<&'a ScanGraph>,
    dataset: &'a Dataset,
}

/// Mapper and dataset rebuilt from an archive.
pub struct RestoredSession {
    pub mapper: Option<Box<dyn PoseGraphMapper>>,
    pub dataset: Dataset,
}

pub trait GraphArchive: Send + Sync {
    fn write(&self, path: &Path, mapper: &dyn PoseGraphMapper, dataset: &Dataset) -> Result<()>;
    fn read(&self, path: &Path) -> Result<RestoredSession>;
}

/// Postcard codec producing [`OdometryMapper`]s on read.
pub struct PostcardArchive {
    mapper_config: MapperConfig,
}

impl PostcardArchive {
    pub fn new(mapper_config: MapperConfig) -> Self {
        Self { mapper_config }
    }

    pub fn encode(graph: Option<&ScanGraph>, dataset: &Dataset) -> Result<Vec<u8>> {
        let mut bytes = Vec::with_capacity(PREAMBLE);
        bytes.extend_from_slice(&ARCHIVE_MAGIC);
        bytes.extend_from_slice(&ARCHIVE_VERSION.to_le_bytes());
        let body = postcard::to_allocvec(&SessionArchiveRef { graph, dataset })?;
        bytes.extend_from_slice(&body);
        Ok(bytes)
    }

    pub fn decode(bytes: &[u8]) -> Result<SessionArchive> {
        if bytes.len() < PREAMBLE || bytes[..4] != ARCHIVE_MAGIC {
            return Err(SlamError::Codec("missing archive magic".to_string()));
        }
        let version = u16::from_le_bytes([bytes[4], bytes[5]]);
        if version != ARCHIVE_VERSION {
            return Err(SlamError::Codec(format!(
                "unsupported archive version {} (expected {})",
                version, ARCHIVE_VERSION
            )));
        }
        Ok(postcard::from_bytes(&bytes[PREAMBLE..])?)
    }
}

impl GraphArchive for PostcardArchive {
    fn write(&self, path: &Path, mapper: &dyn PoseGraphMapper, dataset: &Dataset) -> Result<()> {
        let bytes = Self::encode(Some(mapper.graph()), dataset)?;
        fs::write(path, bytes)?;
        log::info!(
            "Wrote {} ({} vertices, {} edges, {} lasers)",
            path.display(),
            mapper.graph().vertex_count(),
            mapper.graph().edge_count(),
            dataset.lasers().len()
        );
        Ok(())
    }

    fn read(&self, path: &Path) -> Result<RestoredSession> {
        let archive = Self::decode(&fs::read(path)?)?;
        let mapper = archive.graph.map(|graph| {
            Box::new(OdometryMapper::from_graph(graph, self.mapper_config.clone()))
                as Box<dyn PoseGraphMapper>
        });
        Ok(RestoredSession {
            mapper,
            dataset: archive.dataset,
        })
    }
}
