use actix_web::{
    dev::{Service, ServiceRequest, ServiceResponse, Transform},
    Error, HttpResponse,
};
use futures_util::future::{ok, LocalBoxFuture, Ready};
use futures_util::FutureExt;
use std::rc::Rc;
use subtle::ConstantTimeEq;

use crate::utils::types::ApiResponse;

/// Bearer-token guard for the admin scope. With no token configured every
/// request passes (local/dev deployments).
#[derive(Clone)]
pub struct AdminAuth {
    token: Option<Rc<str>>,
}

impl AdminAuth {
    pub fn new(token: Option<String>) -> Self {
        Self {
            token: token.map(Rc::from),
        }
    }
}

/// Constant-time comparison of the presented token.
pub fn token_matches(expected: &str, presented: &str) -> bool {
    expected.as_bytes().ct_eq(presented.as_bytes()).into()
}

impl<S> Transform<S, ServiceRequest> for AdminAuth
where
    S: Service<ServiceRequest, Response = ServiceResponse, Error = Error> + 'static,
    S::Future: 'static,
{
    type Response  = ServiceResponse;
    type Error     = Error;
    type InitError = ();
    type Transform = AdminAuthMw<S>;
    type Future    = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, srv: S) -> Self::Future {
        ok(AdminAuthMw {
            inner: srv,
            token: self.token.clone(),
        })
    }
}

pub struct AdminAuthMw<S> {
    inner: S,
    token: Option<Rc<str>>,
}

impl<S> Service<ServiceRequest> for AdminAuthMw<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse, Error = Error> + 'static,
    S::Future: 'static,
{
    type Response = ServiceResponse;
    type Error    = Error;
    type Future   = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(
        &self,
        ctx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(ctx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        if let Some(expected) = self.token.as_deref() {
            let presented = req
                .headers()
                .get("Authorization")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.strip_prefix("Bearer "))
                .unwrap_or_default();

            if !token_matches(expected, presented) {
                log::warn!("admin: rejected {} {}", req.method(), req.path());
                let res = req.into_response(
                    HttpResponse::Unauthorized().json(ApiResponse::<()>::err("admin token required")),
                );
                return async move { Ok(res) }.boxed_local();
            }
        }

        self.inner.call(req).boxed_local()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_compare() {
        assert!(token_matches("s3cret", "s3cret"));
        assert!(!token_matches("s3cret", "s3cre"));
        assert!(!token_matches("s3cret", ""));
    }
}
