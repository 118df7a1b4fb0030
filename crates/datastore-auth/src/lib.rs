//! # Datastore Auth - Authorization Engine for the Datastore API
//!
//! Decides, per request, whether a caller may read data, administer a
//! datastore, provision datastores, or call service endpoints.
//!
//! ## Key Features
//!
//! - **JWKS Signature Verification** - RS256/RS512 tokens verified against keys
//!   fetched from the identity provider and cached per key id
//! - **Policy-Driven Decoding** - required claims and audience checks declared
//!   per token kind, all failures collapsed into one `InvalidToken` error
//! - **Claim Validators** - role, hierarchical datastore coverage and
//!   user-info correlation
//! - **Three Deployment Modes** - `FULL`, `SKIP_SIGNATURE` and `OFF`, chosen
//!   once at start-up
//! - **Constant-Time API Keys** - BLAKE3 pre-hash with `subtle` comparison
//!
//! ## Architecture
//!
//! - [`error`] - `AuthError` taxonomy and HTTP status mapping
//! - [`config`] - `AuthConfig` loaded from environment, files and secrets
//! - [`jwt`] - claims, identities, decode policies, key resolution and decoding
//! - [`validators`] - checks run on decoded claims
//! - [`strategy`] - one `AuthorizationStrategy` per deployment mode
//! - [`api_key`] - service API key validation
//! - [`provisioner`] - datastore provisioner allowlist
//! - [`credentials`] - token and key extraction from request headers
//! - [`authorizer`] - `Authorizer`, the facade route handlers call
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use datastore_auth::{AuthConfig, Authorizer};
//!
//! # async fn run(token: Option<&str>) -> datastore_auth::AuthResult<()> {
//! let authorizer = Authorizer::from_config(&AuthConfig::from_env()?)?;
//!
//! match authorizer.authorize_user(token).await {
//!     Ok(user_id) => println!("Hello {user_id}"),
//!     Err(e) => println!("{} {}", e.status_code(), e.public_message()),
//! }
//! # Ok(())
//! # }
//! ```

pub mod api_key;
pub mod authorizer;
pub mod config;
pub mod credentials;
pub mod error;
pub mod jwt;
pub mod provisioner;
pub mod strategy;
pub mod validators;

#[doc(inline)]
pub use authorizer::Authorizer;

#[doc(inline)]
pub use config::{Audiences, AuthConfig, AuthMode, ConfigError};

#[doc(inline)]
pub use credentials::Credentials;

#[doc(inline)]
pub use error::{AuthError, AuthResult, ErrorKind};

#[doc(inline)]
pub use jwt::{AuthContext, Claims, Identity, SigningKeyResolver, TokenDecoder, TokenPolicy};

#[doc(inline)]
pub use provisioner::ProvisionerGate;

#[doc(inline)]
pub use strategy::{AuthorizationStrategy, TokenRequest};
