//! Volume driver: plugin requests mapped onto the mount registry.

use std::sync::Arc;

use tracing::{debug, info, warn};

use memvol_kernel::{MountRegistry, VolumeResult};

use crate::constants::{VOLUME_DRIVER, VOLUME_SCOPE};
use crate::protocol::{
    ActivateResponse, Capabilities, CapabilitiesResponse, CreateRequest, Empty, GetResponse,
    ListResponse, MountRequest, MountpointResponse, NameRequest, Volume,
};

/// Answers `VolumeDriver.*` calls for in-memory volumes.
#[derive(Debug, Clone)]
pub struct MemDriver {
    registry: Arc<MountRegistry>,
}

impl MemDriver {
    pub fn new(registry: Arc<MountRegistry>) -> Self {
        Self { registry }
    }

    pub fn activate(&self) -> ActivateResponse {
        ActivateResponse {
            implements: vec![VOLUME_DRIVER.to_string()],
        }
    }

    /// Volumes are created lazily on first mount; nothing to do yet.
    pub fn create(&self, req: CreateRequest) -> Empty {
        info!(volume = %req.name, opts = ?req.opts, "create volume");
        Empty {}
    }

    pub async fn get(&self, req: NameRequest) -> VolumeResult<GetResponse> {
        let info = self.registry.lookup(&req.name).await?;
        Ok(GetResponse {
            volume: Volume::from(info),
        })
    }

    pub async fn list(&self) -> ListResponse {
        let volumes = self
            .registry
            .list()
            .await
            .into_iter()
            .map(Volume::from)
            .collect();
        ListResponse { volumes }
    }

    /// Always succeeds; failures tearing the session down are only logged.
    pub async fn remove(&self, req: NameRequest) -> Empty {
        info!(volume = %req.name, "remove volume");
        if let Err(e) = self.registry.remove(&req.name).await {
            warn!(volume = %req.name, error = %e, "failed to remove volume");
        }
        Empty {}
    }

    pub fn path(&self, req: NameRequest) -> MountpointResponse {
        MountpointResponse {
            mountpoint: self.registry.mountpoint(&req.name).display().to_string(),
        }
    }

    pub async fn mount(&self, req: MountRequest) -> VolumeResult<MountpointResponse> {
        debug!(volume = %req.name, id = %req.id, "mount request");
        let mountpoint = self.registry.mount(&req.name).await?;
        Ok(MountpointResponse {
            mountpoint: mountpoint.display().to_string(),
        })
    }

    pub async fn unmount(&self, req: MountRequest) -> VolumeResult<Empty> {
        debug!(volume = %req.name, id = %req.id, "unmount request");
        self.registry.unmount(&req.name).await?;
        Ok(Empty {})
    }

    pub fn capabilities(&self) -> CapabilitiesResponse {
        CapabilitiesResponse {
            capabilities: Capabilities {
                scope: VOLUME_SCOPE.to_string(),
            },
        }
    }
}
