use crate::analysis::exceptions::{ConfigError, ExceptionResource};
use crate::cluster::ResourceKind;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// File names searched in the working directory when `--config` is not given
pub const DEFAULT_CONFIG_NAMES: [&str; 4] = [".kor.json", ".kor.yaml", ".kor.yml", ".kor.toml"];

/// Exception configuration: one allow-list per auditable kind.
///
/// Unknown keys are ignored and missing lists are empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub exception_config_maps: Vec<ExceptionResource>,
    pub exception_daemon_sets: Vec<ExceptionResource>,
    pub exception_deployments: Vec<ExceptionResource>,
    pub exception_jobs: Vec<ExceptionResource>,
    pub exception_network_policies: Vec<ExceptionResource>,
    pub exception_pdbs: Vec<ExceptionResource>,
    pub exception_pvcs: Vec<ExceptionResource>,
    pub exception_pvs: Vec<ExceptionResource>,
    pub exception_rollouts: Vec<ExceptionResource>,
    pub exception_secrets: Vec<ExceptionResource>,
    pub exception_service_accounts: Vec<ExceptionResource>,
    pub exception_services: Vec<ExceptionResource>,
    pub exception_stateful_sets: Vec<ExceptionResource>,
    pub exception_storage_classes: Vec<ExceptionResource>,
}

impl Config {
    /// Exceptions shipped with the binary
    pub fn builtin() -> Self {
        let kube_system = || vec![ExceptionResource::regex("^kube-system$", ".*")];

        Self {
            exception_config_maps: vec![
                ExceptionResource::regex(".*", "^kube-root-ca\\.crt$"),
                ExceptionResource::regex("^kube-system$", ".*"),
            ],
            exception_daemon_sets: kube_system(),
            exception_deployments: kube_system(),
            exception_jobs: kube_system(),
            exception_secrets: kube_system(),
            exception_service_accounts: vec![
                ExceptionResource::regex(".*", "^default$"),
                ExceptionResource::regex("^kube-system$", ".*"),
            ],
            exception_services: vec![
                ExceptionResource::exact("default", "kubernetes"),
                ExceptionResource::regex("^kube-system$", ".*"),
            ],
            exception_stateful_sets: kube_system(),
            ..Self::default()
        }
    }

    /// Append `other`'s entries to ours, kind by kind
    pub fn merge(mut self, other: Config) -> Self {
        self.exception_config_maps.extend(other.exception_config_maps);
        self.exception_daemon_sets.extend(other.exception_daemon_sets);
        self.exception_deployments.extend(other.exception_deployments);
        self.exception_jobs.extend(other.exception_jobs);
        self.exception_network_policies
            .extend(other.exception_network_policies);
        self.exception_pdbs.extend(other.exception_pdbs);
        self.exception_pvcs.extend(other.exception_pvcs);
        self.exception_pvs.extend(other.exception_pvs);
        self.exception_rollouts.extend(other.exception_rollouts);
        self.exception_secrets.extend(other.exception_secrets);
        self.exception_service_accounts
            .extend(other.exception_service_accounts);
        self.exception_services.extend(other.exception_services);
        self.exception_stateful_sets
            .extend(other.exception_stateful_sets);
        self.exception_storage_classes
            .extend(other.exception_storage_classes);
        self
    }

    pub fn exceptions_for(&self, kind: ResourceKind) -> &[ExceptionResource] {
        match kind {
            ResourceKind::ConfigMap => &self.exception_config_maps,
            ResourceKind::DaemonSet => &self.exception_daemon_sets,
            ResourceKind::Deployment => &self.exception_deployments,
            ResourceKind::Job => &self.exception_jobs,
            ResourceKind::NetworkPolicy => &self.exception_network_policies,
            ResourceKind::PodDisruptionBudget => &self.exception_pdbs,
            ResourceKind::PersistentVolumeClaim => &self.exception_pvcs,
            ResourceKind::PersistentVolume => &self.exception_pvs,
            ResourceKind::Rollout => &self.exception_rollouts,
            ResourceKind::Secret => &self.exception_secrets,
            ResourceKind::ServiceAccount => &self.exception_service_accounts,
            ResourceKind::Service => &self.exception_services,
            ResourceKind::StatefulSet => &self.exception_stateful_sets,
            ResourceKind::StorageClass => &self.exception_storage_classes,
            ResourceKind::Pod
            | ResourceKind::Endpoints
            | ResourceKind::RoleBinding
            | ResourceKind::ClusterRoleBinding => &[],
        }
    }

    /// Load configuration from a file (JSON, YAML or TOML)
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let display = path.display().to_string();
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: display.clone(),
            message: e.to_string(),
        })?;

        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        let parsed = match extension {
            "yml" | "yaml" => serde_yaml::from_str(&contents).map_err(|e| e.to_string()),
            "toml" => toml::from_str(&contents).map_err(|e| e.to_string()),
            "json" => serde_json::from_str(&contents).map_err(|e| e.to_string()),
            _ => {
                // Try JSON first, then YAML (a superset of it)
                serde_json::from_str(&contents)
                    .or_else(|_| serde_yaml::from_str(&contents))
                    .map_err(|e| e.to_string())
            }
        };

        parsed.map_err(|message| ConfigError::Parse {
            path: display,
            message,
        })
    }

    /// Path of the first default config file present in `dir`
    pub fn find_default(dir: &Path) -> Option<PathBuf> {
        DEFAULT_CONFIG_NAMES
            .iter()
            .map(|name| dir.join(name))
            .find(|path| path.exists())
    }

    /// Try to load configuration from default locations
    pub fn from_default_locations(dir: &Path) -> Result<Self, ConfigError> {
        match Self::find_default(dir) {
            Some(path) => Self::from_file(&path),
            // No config file found, use defaults
            None => Ok(Self::default()),
        }
    }

    /// Total number of entries across all kinds
    pub fn len(&self) -> usize {
        ResourceKind::AUDITABLE
            .iter()
            .map(|kind| self.exceptions_for(*kind).len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
