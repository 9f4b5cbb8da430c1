//! Business logic services

pub mod catalog;
pub mod circulation;
pub mod media;
pub mod stats;
pub mod users;

use crate::{config::AppConfig, repository::Repository};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub catalog: catalog::CatalogService,
    pub circulation: circulation::CirculationService,
    pub stats: stats::StatsService,
    pub users: users::UsersService,
}

impl Services {
    /// Create all services with the given repository
    pub fn new(repository: Repository, config: &AppConfig) -> Self {
        let media = media::MediaService::new(&config.media);
        Self {
            catalog: catalog::CatalogService::new(repository.clone(), media),
            circulation: circulation::CirculationService::new(repository.clone(), config.circulation.clone()),
            stats: stats::StatsService::new(repository.clone()),
            users: users::UsersService::new(repository, config.auth.clone()),
        }
    }
}
