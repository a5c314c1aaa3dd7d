use actix_web::{HttpResponse, Result, http::header, web};
use crate::events::{Notifier, notification_stream};

#[utoipa::path(
    get,
    path = "/admin/notifications",
    tag = "admin",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Server-sent events; `new:order` carries each order customers place", content_type = "text/event-stream"),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Staff only")
    )
)]
pub async fn notifications(notifier: web::Data<Notifier>) -> Result<HttpResponse> {
    Ok(HttpResponse::Ok()
        .insert_header((header::CONTENT_TYPE, "text/event-stream"))
        .insert_header((header::CACHE_CONTROL, "no-cache"))
        .streaming(notification_stream(notifier.subscribe())))
}

pub fn notification_config(cfg: &mut web::ServiceConfig) {
    cfg.route("/notifications", web::get().to(notifications));
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::App;
    use actix_web::test as actix_test;

    #[actix_web::test]
    async fn test_notifications_opens_event_stream() {
        let notifier = Notifier::default();
        let app = actix_test::init_service(
            App::new()
                .app_data(web::Data::new(notifier.clone()))
                .configure(notification_config),
        )
        .await;

        let req = actix_test::TestRequest::get().uri("/notifications").to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert!(resp.status().is_success());
        assert_eq!(
            resp.headers().get(header::CONTENT_TYPE).unwrap(),
            "text/event-stream"
        );
    }
}
