use actix_web::{HttpResponse, Responder, get, web};
use log::error;

use crate::types::AppState;

#[get("/")]
pub async fn keep_alive() -> impl Responder {
    HttpResponse::Ok().body("OK")
}

#[get("/health")]
pub async fn health(data: web::Data<AppState>) -> impl Responder {
    match data.registry.ping().await {
        Ok(()) => HttpResponse::Ok().body("OK"),
        Err(err) => {
            error!("[Health] Database unreachable. Err: {err}");
            HttpResponse::ServiceUnavailable().body("database unreachable")
        }
    }
}
