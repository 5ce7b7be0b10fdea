//! In-memory implementations of the auth persistence traits (tests/dev).

pub mod challenge;
pub mod identity;
pub mod refresh_token;
pub mod role;

pub use challenge::InMemoryChallengeRepository;
pub use identity::InMemoryIdentityRepository;
pub use refresh_token::InMemoryRefreshTokenRepository;
pub use role::InMemoryRoleRepository;
