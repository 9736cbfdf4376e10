//! ABOUTME: HTTP status service for a running recorder
//! ABOUTME: Serves health, frame rate, recording state and JPEG previews of the latest cycle

use actix_web::{
    dev::{Server, ServiceRequest, ServiceResponse},
    middleware::Logger,
    web, App, HttpResponse, HttpServer, Result as ActixResult,
};
use image::{DynamicImage, ImageFormat};
use serde_json::json;
use std::io::Cursor;
use tracing::{debug, error, info};
use vg_core::{Error, Result};

pub mod status;

pub use status::{FpsMeter, LiveStatus, StatusDisplay, StatusSnapshot};

/// Liveness probe
async fn healthy() -> ActixResult<HttpResponse> {
    Ok(HttpResponse::Ok().content_type("text/plain").body("ok"))
}

/// Measured processing rate as plain text
async fn fps(status: web::Data<LiveStatus>) -> ActixResult<HttpResponse> {
    let snapshot = status.snapshot();
    Ok(HttpResponse::Ok()
        .content_type("text/plain")
        .body(snapshot.fps.to_string()))
}

async fn recorder_status(status: web::Data<LiveStatus>) -> ActixResult<HttpResponse> {
    Ok(HttpResponse::Ok().json(status.snapshot()))
}

async fn current_frame(status: web::Data<LiveStatus>) -> ActixResult<HttpResponse> {
    match status.current_frame() {
        Some(frame) => Ok(jpeg_response(DynamicImage::ImageRgb8(frame))),
        None => Ok(no_frame_yet()),
    }
}

async fn motion_mask(status: web::Data<LiveStatus>) -> ActixResult<HttpResponse> {
    match status.motion_mask() {
        Some(mask) => Ok(jpeg_response(DynamicImage::ImageLuma8(mask))),
        None => Ok(no_frame_yet()),
    }
}

fn no_frame_yet() -> HttpResponse {
    HttpResponse::ServiceUnavailable().json(json!({
        "error": "No frame processed yet"
    }))
}

fn jpeg_response(image: DynamicImage) -> HttpResponse {
    let mut buffer = Cursor::new(Vec::new());
    match image.write_to(&mut buffer, ImageFormat::Jpeg) {
        Ok(()) => {
            let body = buffer.into_inner();
            debug!(bytes = body.len(), "Encoded preview");
            HttpResponse::Ok().content_type("image/jpeg").body(body)
        }
        Err(e) => {
            error!("Failed to encode preview: {}", e);
            HttpResponse::InternalServerError().json(json!({
                "error": "Failed to encode image"
            }))
        }
    }
}

/// Create status service factory
pub fn create_service(
    status: LiveStatus,
) -> App<
    impl actix_web::dev::ServiceFactory<
        ServiceRequest,
        Config = (),
        Response = ServiceResponse<impl actix_web::body::MessageBody>,
        Error = actix_web::Error,
        InitError = (),
    >,
> {
    App::new()
        .app_data(web::Data::new(status))
        .wrap(Logger::default())
        .service(
            web::scope("/api")
                .route("/healthy", web::get().to(healthy))
                .route("/fps", web::get().to(fps))
                .route("/status", web::get().to(recorder_status))
                .route("/current_frame", web::get().to(current_frame))
                .route("/motion_mask", web::get().to(motion_mask)),
        )
}

/// Bind the status server; the returned future serves until dropped or stopped
pub fn bind_server(bind_addr: &str, status: LiveStatus) -> Result<Server> {
    info!("Starting status server on {}", bind_addr);

    let server = HttpServer::new(move || create_service(status.clone()))
        .workers(1)
        .bind(bind_addr)
        .map_err(|e| Error::Config(format!("Failed to bind status server: {}", e)))?
        .run();

    Ok(server)
}
