/// Authentication utilities
///
/// # Modules
///
/// - [`jwt`]: HS256 token validation (and minting for tests/tooling)
/// - [`context`]: The tenant context extracted from a validated token
///
/// # Example
///
/// ```
/// use gymbill_shared::auth::context::{Role, TenantContext};
/// use gymbill_shared::auth::jwt::{create_token, validate_token, Claims};
/// use uuid::Uuid;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let secret = "a-secret-key-that-is-at-least-32-bytes";
/// let token = create_token(&Claims::new(Uuid::new_v4(), Uuid::new_v4(), Role::Admin), secret)?;
///
/// let context = TenantContext::from(validate_token(&token, secret)?);
/// assert!(context.is_admin());
/// # Ok(())
/// # }
/// ```

pub mod context;
pub mod jwt;
