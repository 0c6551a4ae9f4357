// CurrentActor extractor - hands the middleware-resolved Actor to handlers

use axum::{extract::FromRequestParts, http::request::Parts};
use std::sync::Arc;

use crate::{error::AppError, infrastructure::actor::Actor};

/// Cheap to clone; derefs to the inner `Actor`.
///
/// ```ignore
/// async fn handler(actor: CurrentActor) -> AppResult<Json<EntUser>> {
///     let me = users.me(&actor).await?;
/// }
/// ```
#[derive(Debug, Clone)]
pub struct CurrentActor(Arc<Actor>);

impl std::ops::Deref for CurrentActor {
    type Target = Actor;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<S> FromRequestParts<S> for CurrentActor
where
    S: Send + Sync,
{
    type Rejection = AppError;

    fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        let actor = parts
            .extensions
            .get::<Arc<Actor>>()
            .map(|actor| CurrentActor(actor.clone()))
            .ok_or_else(|| AppError::Internal("actor middleware is not installed".to_string()));

        async move { actor }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    #[tokio::test]
    async fn test_extracts_actor_from_extensions() {
        let (mut parts, _) = Request::builder().body(()).unwrap().into_parts();
        parts.extensions.insert(Arc::new(Actor::admin(1)));

        let actor = CurrentActor::from_request_parts(&mut parts, &()).await.unwrap();
        assert!(actor.is_staff());
        assert_eq!(actor.id, Some(1));
    }

    #[tokio::test]
    async fn test_missing_extension_is_internal_error() {
        let (mut parts, _) = Request::builder().body(()).unwrap().into_parts();
        let err = CurrentActor::from_request_parts(&mut parts, &()).await.unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));
    }
}
