use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{self, request},
};
use skillshare_api::{AuthToken, Uuid};

use crate::{Error, Topics};

#[derive(Clone, axum::extract::FromRef)]
pub struct AppState {
    pub feeds: Topics,
    /// Publishing is disabled when unset
    pub admin_token: Option<AuthToken>,
}

pub struct PreAuth(pub AuthToken);

#[async_trait]
impl<S: Sync> FromRequestParts<S> for PreAuth {
    type Rejection = Error;

    async fn from_request_parts(req: &mut request::Parts, _state: &S) -> Result<PreAuth, Error> {
        let auth = req
            .headers
            .get(http::header::AUTHORIZATION)
            .ok_or_else(Error::permission_denied)?
            .to_str()
            .map_err(|_| Error::permission_denied())?;
        let mut auth = auth.split(' ');
        if !auth
            .next()
            .ok_or_else(Error::permission_denied)?
            .eq_ignore_ascii_case("bearer")
        {
            return Err(Error::permission_denied());
        }
        let token = auth.next().ok_or_else(Error::permission_denied)?;
        if auth.next().is_some() {
            return Err(Error::permission_denied());
        }
        let token = Uuid::try_parse(token).map_err(|_| Error::permission_denied())?;
        Ok(PreAuth(AuthToken(token)))
    }
}

pub struct AdminAuth;

#[async_trait]
impl FromRequestParts<AppState> for AdminAuth {
    type Rejection = Error;

    async fn from_request_parts(
        req: &mut request::Parts,
        state: &AppState,
    ) -> Result<AdminAuth, Error> {
        let token = PreAuth::from_request_parts(req, state).await?.0;
        match state.admin_token {
            Some(admin) if admin == token => Ok(AdminAuth),
            _ => Err(Error::permission_denied()),
        }
    }
}
