//! Docker volume plugin wire types.
//!
//! Field names follow the plugin protocol's PascalCase JSON. Unknown fields
//! are ignored so newer daemons can talk to us.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use memvol_kernel::MountInfo;

/// `VolumeDriver.Create`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateRequest {
    pub name: String,
    #[serde(default)]
    pub opts: Option<HashMap<String, String>>,
}

/// `Remove`, `Path` and `Get` carry only a name.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct NameRequest {
    pub name: String,
}

/// `VolumeDriver.Mount` and `VolumeDriver.Unmount`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MountRequest {
    pub name: String,
    /// Caller identity. Docker sends one per container; we count calls, not IDs.
    #[serde(rename = "ID", default)]
    pub id: String,
}

/// Response with no payload, serialized as `{}`.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct Empty {}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct MountpointResponse {
    pub mountpoint: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct Volume {
    pub name: String,
    pub mountpoint: String,
}

impl From<MountInfo> for Volume {
    fn from(info: MountInfo) -> Self {
        Self {
            name: info.name,
            mountpoint: info.mountpoint.display().to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct GetResponse {
    pub volume: Volume,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct ListResponse {
    pub volumes: Vec<Volume>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct Capabilities {
    pub scope: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct CapabilitiesResponse {
    pub capabilities: Capabilities,
}

/// `Plugin.Activate`
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct ActivateResponse {
    pub implements: Vec<String>,
}

/// Body of every failed call.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ErrorResponse {
    #[serde(rename = "Err")]
    pub err: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::path::PathBuf;

    #[test]
    fn test_mount_request_fields() {
        let req: MountRequest =
            serde_json::from_value(json!({"Name": "scratch", "ID": "c0ffee"})).unwrap();
        assert_eq!(req.name, "scratch");
        assert_eq!(req.id, "c0ffee");

        // ID is optional, extra fields are ignored
        let req: MountRequest =
            serde_json::from_value(json!({"Name": "scratch", "Extra": 1})).unwrap();
        assert_eq!(req.id, "");
    }

    #[test]
    fn test_create_request_opts() {
        let req: CreateRequest =
            serde_json::from_value(json!({"Name": "v", "Opts": {"size": "1g"}})).unwrap();
        assert_eq!(req.opts.unwrap()["size"], "1g");

        let req: CreateRequest = serde_json::from_value(json!({"Name": "v", "Opts": null})).unwrap();
        assert!(req.opts.is_none());
    }

    #[test]
    fn test_response_shapes() {
        assert_eq!(serde_json::to_value(Empty {}).unwrap(), json!({}));

        let volume = Volume::from(MountInfo {
            name: "a".to_string(),
            mountpoint: PathBuf::from("/r/a"),
        });
        assert_eq!(
            serde_json::to_value(GetResponse { volume }).unwrap(),
            json!({"Volume": {"Name": "a", "Mountpoint": "/r/a"}})
        );
        assert_eq!(
            serde_json::to_value(ListResponse { volumes: vec![] }).unwrap(),
            json!({"Volumes": []})
        );
        assert_eq!(
            serde_json::to_value(ErrorResponse {
                err: "boom".to_string()
            })
            .unwrap(),
            json!({"Err": "boom"})
        );
        assert_eq!(
            serde_json::to_value(CapabilitiesResponse {
                capabilities: Capabilities {
                    scope: "local".to_string()
                }
            })
            .unwrap(),
            json!({"Capabilities": {"Scope": "local"}})
        );
    }
}
