use super::{bearer_token, signed_in_user, AppError, AppState};
use crate::auth::{self, AuthSession, Credentials};
use crate::db::models::User;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;

pub async fn signup(
    State(state): State<AppState>,
    Json(credentials): Json<Credentials>,
) -> Result<(StatusCode, Json<User>), AppError> {
    let user = auth::sign_up(&state.db, credentials)?;
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn login(
    State(state): State<AppState>,
    Json(credentials): Json<Credentials>,
) -> Result<Json<AuthSession>, AppError> {
    Ok(Json(auth::sign_in(&state.db, credentials)?))
}

pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<StatusCode, AppError> {
    auth::sign_out(&state.db, bearer_token(&headers)?)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn me(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<User>, AppError> {
    signed_in_user(&state, &headers).map(Json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::{test_state, with_token};

    fn creds(email: &str, password: &str) -> Json<Credentials> {
        Json(Credentials {
            email: email.into(),
            password: password.into(),
        })
    }

    #[tokio::test]
    async fn test_account_lifecycle() {
        let (_dir, state) = test_state();
        let (status, Json(user)) = signup(State(state.clone()), creds("ada@example.com", "secret1"))
            .await
            .unwrap();
        assert_eq!(status, StatusCode::CREATED);

        let err = signup(State(state.clone()), creds("ada@example.com", "secret1"))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::CONFLICT);

        let Json(session) = login(State(state.clone()), creds("ada@example.com", "secret1"))
            .await
            .unwrap();
        let Json(current) = me(State(state.clone()), with_token(&session.token))
            .await
            .unwrap();
        assert_eq!(current.id, user.id);

        let status = logout(State(state.clone()), with_token(&session.token))
            .await
            .unwrap();
        assert_eq!(status, StatusCode::NO_CONTENT);
        let err = me(State(state), with_token(&session.token))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_validation_and_missing_token() {
        let (_dir, state) = test_state();
        let err = signup(State(state.clone()), creds("not-an-email", "secret1"))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.message(), "Invalid email address");

        let err = me(State(state), HeaderMap::new()).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
    }
}
