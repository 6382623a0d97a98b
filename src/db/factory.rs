//! Repository factory for dependency injection.
//!
//! Creates and configures repository instances from code, environment
//! variables, or a `repository.toml` file. Services never construct their own
//! storage; they receive an `Arc<dyn FleetRepository>` built here (or by the
//! embedding application).

use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use super::repo_config::RepositoryConfig;
#[cfg(feature = "local-repo")]
use super::repositories::LocalRepository;
use super::repository::{FleetRepository, RepositoryError, RepositoryResult};

/// Repository backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepositoryType {
    /// In-memory local repository
    Local,
}

impl FromStr for RepositoryType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" | "memory" => Ok(Self::Local),
            _ => Err(format!("Unknown repository type: {}", s)),
        }
    }
}

impl RepositoryType {
    /// Get the repository type from the `REPOSITORY_TYPE` environment
    /// variable, defaulting to `Local`.
    pub fn from_env() -> Self {
        if let Ok(val) = std::env::var("REPOSITORY_TYPE") {
            return val.parse().unwrap_or(Self::Local);
        }
        Self::Local
    }
}

/// Factory for creating repository instances.
///
/// # Example
/// ```ignore
/// use fleet_hos::db::{RepositoryFactory, RepositoryType};
///
/// let repo = RepositoryFactory::create(RepositoryType::Local)?;
/// ```
pub struct RepositoryFactory;

impl RepositoryFactory {
    /// Create a repository instance of the given type.
    pub fn create(repo_type: RepositoryType) -> RepositoryResult<Arc<dyn FleetRepository>> {
        match repo_type {
            RepositoryType::Local => {
                #[cfg(feature = "local-repo")]
                {
                    Ok(Self::create_local())
                }
                #[cfg(not(feature = "local-repo"))]
                {
                    Err(RepositoryError::configuration(
                        "Local repository feature not enabled",
                    ))
                }
            }
        }
    }

    /// Create an in-memory local repository.
    #[cfg(feature = "local-repo")]
    pub fn create_local() -> Arc<dyn FleetRepository> {
        Arc::new(LocalRepository::new())
    }

    /// Create a repository from environment configuration
    /// (`REPOSITORY_TYPE`).
    pub fn from_env() -> RepositoryResult<Arc<dyn FleetRepository>> {
        Self::create(RepositoryType::from_env())
    }

    /// Create a repository from a TOML configuration file.
    pub fn from_config_file<P: AsRef<Path>>(
        config_path: P,
    ) -> RepositoryResult<Arc<dyn FleetRepository>> {
        let config = RepositoryConfig::from_file(config_path)?;
        Self::from_repository_config(&config)
    }

    /// Create a repository from the default configuration file location.
    pub fn from_default_config() -> RepositoryResult<Arc<dyn FleetRepository>> {
        let config = RepositoryConfig::from_default_location()?;
        Self::from_repository_config(&config)
    }

    fn from_repository_config(
        config: &RepositoryConfig,
    ) -> RepositoryResult<Arc<dyn FleetRepository>> {
        let repo_type = config.repository_type().map_err(|e| {
            RepositoryError::configuration(format!("Invalid repository type: {}", e))
        })?;
        Self::create(repo_type)
    }
}

/// Builder for configuring repository creation.
///
/// # Example
/// ```ignore
/// use fleet_hos::db::{RepositoryBuilder, RepositoryType};
///
/// let repo = RepositoryBuilder::new()
///     .repository_type(RepositoryType::Local)
///     .build()?;
/// ```
pub struct RepositoryBuilder {
    repo_type: RepositoryType,
}

impl RepositoryBuilder {
    /// New builder defaulting to the environment-selected backend.
    pub fn new() -> Self {
        Self {
            repo_type: RepositoryType::from_env(),
        }
    }

    /// Set the repository type.
    pub fn repository_type(mut self, repo_type: RepositoryType) -> Self {
        self.repo_type = repo_type;
        self
    }

    /// Load configuration from a TOML file.
    pub fn from_config_file<P: AsRef<Path>>(
        mut self,
        config_path: P,
    ) -> Result<Self, RepositoryError> {
        let config = RepositoryConfig::from_file(config_path)?;
        self.repo_type = config.repository_type().map_err(|e| {
            RepositoryError::configuration(format!("Invalid repository type: {}", e))
        })?;
        Ok(self)
    }

    /// Build the repository instance.
    pub fn build(self) -> RepositoryResult<Arc<dyn FleetRepository>> {
        RepositoryFactory::create(self.repo_type)
    }
}

impl Default for RepositoryBuilder {
    fn default() -> Self {
        Self::new()
    }
}
