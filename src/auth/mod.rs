//! Authentication: credentials, tokens, sessions and the request gate

pub mod cookie;
pub mod middleware;
pub mod password;
pub mod session;
pub mod token;

pub use cookie::CookieSpec;
pub use middleware::{require_session, AuthContext};
pub use password::PasswordHasher;
pub use session::{
    AuthStatus, JsonSessionCodec, SessionBinder, SessionCodec, SessionPayload, SessionRecord,
    SessionStore,
};
pub use token::RefreshTokenIssuer;
