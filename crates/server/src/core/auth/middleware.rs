use crate::core::auth::token::token_from_headers;
use crate::core::config::AppState;
use crate::core::ctx::Ctx;
use crate::core::error::{Error, Result};
use crate::core::models::Role;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use tracing::{debug, warn};

/// Resolve the session token into a `Ctx` on the request
pub async fn mw_require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response> {
    debug!("MIDDLEWARE: require_auth");

    let Some(token) = token_from_headers(req.headers()) else {
        debug!("No session token on {}", req.uri().path());
        return Err(Error::AuthFailNoToken);
    };

    let user = match state.auth.resolve_session(&token).await {
        Ok(user) => user,
        Err(e) => {
            warn!("Authentication failed on {}: {}", req.uri().path(), e);
            return Err(e);
        }
    };

    let ctx = Ctx::new(user.id, user.role, token);

    // Store Ctx in request extensions
    req.extensions_mut().insert(ctx);

    Ok(next.run(req).await)
}

/// Reject callers whose role is not in `allowed`. Runs after `mw_require_auth`.
pub async fn mw_require_role(allowed: &'static [Role], req: Request, next: Next) -> Result<Response> {
    debug!("MIDDLEWARE: require_role {:?}", allowed);

    let ctx = req
        .extensions()
        .get::<Ctx>()
        .ok_or(Error::AuthFailCtxNotInRequestExt)?;

    if !allowed.contains(&ctx.role()) {
        warn!(
            "User {} with role {} denied on {}",
            ctx.user_id(),
            ctx.role(),
            req.uri().path()
        );
        return Err(Error::Forbidden(
            "You are not authorized to perform this action".to_string(),
        ));
    }

    Ok(next.run(req).await)
}

/// Role gate for admin-only routes
pub async fn mw_require_admin(req: Request, next: Next) -> Result<Response> {
    mw_require_role(&[Role::Admin], req, next).await
}
