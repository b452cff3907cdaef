pub mod assemblies;
pub mod health;

pub use assemblies::assemblies_router;
pub use health::health_router;
