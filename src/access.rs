use axum::{
    extract::{MatchedPath, Request, State},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;

use crate::{AppState, auth::SessionUser, models::Role};

/// Access
///
/// What a route demands of the requester's session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// No session needed.
    Public,
    /// Any logged-in user.
    Authenticated,
    /// A logged-in user with exactly this role.
    Role(Role),
}

impl Access {
    pub fn permits(self, user: Option<&SessionUser>) -> bool {
        match (self, user) {
            (Access::Public, _) => true,
            (Access::Authenticated, user) => user.is_some(),
            (Access::Role(required), Some(user)) => user.role == required,
            (Access::Role(_), None) => false,
        }
    }
}

/// Route Access Table
///
/// One entry per route path, in the router's path syntax. A path missing from this
/// table is denied.
pub const ROUTE_ACCESS: &[(&str, Access)] = &[
    ("/", Access::Public),
    ("/health", Access::Public),
    ("/login", Access::Public),
    ("/logout", Access::Public),
    ("/uploads/{filename}", Access::Public),
    ("/videos/{filename}", Access::Public),
    ("/dashboard", Access::Authenticated),
    ("/upload_note", Access::Role(Role::Teacher)),
    ("/upload_video", Access::Role(Role::Teacher)),
    ("/create_quiz", Access::Role(Role::Teacher)),
    ("/view_notes", Access::Role(Role::Student)),
    ("/view_videos", Access::Role(Role::Student)),
    ("/take_quiz", Access::Role(Role::Student)),
    ("/view_grades", Access::Role(Role::Student)),
    ("/view_courses", Access::Role(Role::Student)),
    ("/enroll/{course_id}", Access::Role(Role::Student)),
    ("/my_courses", Access::Role(Role::Student)),
];

/// Looks up the access rule for a matched route path.
pub fn access_for(path: &str) -> Option<Access> {
    ROUTE_ACCESS
        .iter()
        .find(|(route, _)| *route == path)
        .map(|(_, access)| *access)
}

/// authorize
///
/// Route-layer middleware in front of every application route. It resolves the session
/// from the cookie jar, checks the table entry for the matched path and either
/// redirects home or forwards the request with the `SessionUser` attached to its
/// extensions (when there is one).
pub async fn authorize(
    State(state): State<AppState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    let user = state.sessions.current(&jar).await;

    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|matched| matched.as_str().to_owned());
    let access = path.as_deref().and_then(access_for);

    match access {
        Some(access) if access.permits(user.as_ref()) => {
            if let Some(user) = user {
                request.extensions_mut().insert(user);
            }
            next.run(request).await
        }
        Some(access) => {
            tracing::debug!(?path, ?access, "access denied, redirecting home");
            Redirect::to("/").into_response()
        }
        None => {
            tracing::warn!(?path, "route has no access rule, denying");
            Redirect::to("/").into_response()
        }
    }
}
