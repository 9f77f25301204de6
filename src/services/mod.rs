//! Business logic services

pub mod catalog;
pub mod loans;
pub mod redis;
pub mod users;

use crate::{config::AppConfig, policy::LoanPolicy, repository::Repository};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub catalog: catalog::CatalogService,
    pub users: users::UsersService,
    pub loans: loans::LoansService,
    pub redis: redis::RedisService,
    pub repository: Repository,
}

impl Services {
    /// Create all services with the given repository
    pub fn new(repository: Repository, config: &AppConfig, redis_service: redis::RedisService) -> Self {
        Self {
            catalog: catalog::CatalogService::new(repository.clone()),
            users: users::UsersService::new(
                repository.clone(),
                config.auth.clone(),
                redis_service.clone(),
            ),
            loans: loans::LoansService::new(repository.clone(), LoanPolicy::new(&config.loans)),
            redis: redis_service,
            repository,
        }
    }
}
