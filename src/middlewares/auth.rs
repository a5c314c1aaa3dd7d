use crate::entities::role_entity;
use crate::error::{AppError, AppResult};
use crate::utils::JwtService;
use actix_web::http::Method;
use actix_web::{
    Error, HttpMessage, HttpRequest,
    dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready},
};
use futures_util::future::LocalBoxFuture;
use std::future::{Ready, ready};

/// Authenticated caller, stored in request extensions by [`AuthMiddleware`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub id: i64,
    pub roles: Vec<String>,
}

impl AuthUser {
    pub fn is_staff(&self) -> bool {
        self.roles
            .iter()
            .any(|r| r == role_entity::ADMIN || r == role_entity::MANAGER)
    }
}

/// Which requests skip authentication, and which need staff roles.
struct AccessRules {
    exact_paths: Vec<&'static str>,
    prefix_paths: Vec<&'static str>,
    excluded_paths: Vec<&'static str>,
    /// Readable without a token, GET only
    public_read_prefixes: Vec<&'static str>,
    staff_prefixes: Vec<&'static str>,
}

impl AccessRules {
    fn new() -> Self {
        Self {
            exact_paths: vec!["/swagger-ui", "/swagger-ui/", "/api-docs/openapi.json"],
            prefix_paths: vec!["/swagger-ui/", "/api-docs/", "/v1/auth/"],
            // under a public prefix but still authenticated
            excluded_paths: vec!["/v1/auth/logout"],
            public_read_prefixes: vec!["/v1/products"],
            staff_prefixes: vec!["/v1/admin"],
        }
    }

    fn is_public(&self, method: &Method, path: &str) -> bool {
        if self
            .excluded_paths
            .iter()
            .any(|&excluded| path.starts_with(excluded))
        {
            return false;
        }

        if self.exact_paths.contains(&path) {
            return true;
        }

        if method == Method::GET
            && self
                .public_read_prefixes
                .iter()
                .any(|&prefix| path.starts_with(prefix))
        {
            return true;
        }

        self.prefix_paths
            .iter()
            .any(|&prefix| path.starts_with(prefix))
    }

    fn needs_staff(&self, path: &str) -> bool {
        self.staff_prefixes
            .iter()
            .any(|&prefix| path == prefix || path.starts_with(&format!("{prefix}/")))
    }
}

pub struct AuthMiddleware {
    jwt_service: JwtService,
}

impl AuthMiddleware {
    pub fn new(jwt_service: JwtService) -> Self {
        Self { jwt_service }
    }
}

impl<S, B> Transform<S, ServiceRequest> for AuthMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = AuthMiddlewareService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AuthMiddlewareService {
            service,
            jwt_service: self.jwt_service.clone(),
            rules: AccessRules::new(),
        }))
    }
}

pub struct AuthMiddlewareService<S> {
    service: S,
    jwt_service: JwtService,
    rules: AccessRules,
}

impl<S, B> Service<ServiceRequest> for AuthMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        // CORS preflight
        if req.method() == Method::OPTIONS {
            return Box::pin(self.service.call(req));
        }

        if self.rules.is_public(req.method(), req.path()) {
            return Box::pin(self.service.call(req));
        }

        let token = req
            .headers()
            .get("Authorization")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "));

        let Some(token) = token else {
            let error = AppError::AuthError("Missing access token".to_string());
            return Box::pin(async move { Err(error.into()) });
        };

        let user = match self.jwt_service.verify_access_token(token) {
            Ok(claims) => match claims.user_id() {
                Ok(id) => AuthUser {
                    id,
                    roles: claims.roles,
                },
                Err(e) => return Box::pin(async move { Err(e.into()) }),
            },
            Err(_) => {
                let error = AppError::AuthError("Invalid access token".to_string());
                return Box::pin(async move { Err(error.into()) });
            }
        };

        if self.rules.needs_staff(req.path()) && !user.is_staff() {
            log::warn!("User {} denied access to {}", user.id, req.path());
            return Box::pin(async move { Err(AppError::PermissionDenied.into()) });
        }

        req.extensions_mut().insert(user);
        Box::pin(self.service.call(req))
    }
}

/// Caller placed in the request by [`AuthMiddleware`].
pub fn current_user(req: &HttpRequest) -> AppResult<AuthUser> {
    req.extensions()
        .get::<AuthUser>()
        .cloned()
        .ok_or_else(|| AppError::AuthError("Authentication required".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test as actix_test;
    use actix_web::{App, HttpResponse, web};

    #[test]
    fn test_public_paths() {
        let rules = AccessRules::new();
        assert!(rules.is_public(&Method::POST, "/v1/auth/login"));
        assert!(rules.is_public(&Method::POST, "/v1/auth/refresh"));
        assert!(!rules.is_public(&Method::POST, "/v1/auth/logout"));
        assert!(rules.is_public(&Method::GET, "/v1/products/3"));
        assert!(!rules.is_public(&Method::POST, "/v1/products"));
        assert!(!rules.is_public(&Method::GET, "/v1/orders"));
        assert!(rules.is_public(&Method::GET, "/swagger-ui/index.html"));
    }

    #[test]
    fn test_staff_paths() {
        let rules = AccessRules::new();
        assert!(rules.needs_staff("/v1/admin/orders/1/discount"));
        assert!(rules.needs_staff("/v1/admin"));
        assert!(!rules.needs_staff("/v1/administrators"));
        assert!(!rules.needs_staff("/v1/orders"));
    }

    async fn whoami(req: HttpRequest) -> actix_web::Result<HttpResponse> {
        let user = current_user(&req)?;
        Ok(HttpResponse::Ok().body(user.id.to_string()))
    }

    #[actix_web::test]
    async fn test_middleware_checks_token_and_role() {
        let jwt = JwtService::new("secret", 600, 3600);
        let app = actix_test::init_service(
            App::new()
                .wrap(AuthMiddleware::new(jwt.clone()))
                .route("/v1/orders", web::get().to(whoami))
                .route("/v1/admin/orders", web::get().to(whoami)),
        )
        .await;

        let missing = actix_test::TestRequest::get().uri("/v1/orders").to_request();
        let err = actix_test::try_call_service(&app, missing).await.unwrap_err();
        assert_eq!(err.as_response_error().status_code(), 401);

        let customer = jwt
            .generate_access_token(4, &[role_entity::CUSTOMER.to_string()])
            .unwrap();
        let req = actix_test::TestRequest::get()
            .uri("/v1/orders")
            .insert_header(("Authorization", format!("Bearer {}", customer.token)))
            .to_request();
        let body = actix_test::call_and_read_body(&app, req).await;
        assert_eq!(body, "4");

        let req = actix_test::TestRequest::get()
            .uri("/v1/admin/orders")
            .insert_header(("Authorization", format!("Bearer {}", customer.token)))
            .to_request();
        let err = actix_test::try_call_service(&app, req).await.unwrap_err();
        assert_eq!(err.as_response_error().status_code(), 403);

        let admin = jwt
            .generate_access_token(1, &[role_entity::ADMIN.to_string()])
            .unwrap();
        let req = actix_test::TestRequest::get()
            .uri("/v1/admin/orders")
            .insert_header(("Authorization", format!("Bearer {}", admin.token)))
            .to_request();
        let body = actix_test::call_and_read_body(&app, req).await;
        assert_eq!(body, "1");
    }
}
