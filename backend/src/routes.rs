use actix_multipart::Multipart;
use actix_web::{HttpResponse, web};
use futures::{StreamExt, TryStreamExt};
use log::{error, info};
use serde::Serialize;
use serde_json::json;

use crate::auth::middleware::{AuthMiddleware, AuthenticatedUser};
use crate::auth::routes::{login, register};
use crate::db::models::UserRow;
use crate::db::repository::Repository;
use crate::inference::detector::{DetectError, Detector};
use crate::inference::frames::FrameError;
use crate::storage::media_store::{MediaStore, StorageError};

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

pub fn configure_routes(cfg: &mut web::ServiceConfig, auth_middleware: AuthMiddleware) {
    cfg.service(web::resource("/").route(web::get().to(index)))
        .service(web::resource("/register").route(web::post().to(register)))
        .service(web::resource("/login").route(web::post().to(login)))
        .service(
            web::scope("")
                .wrap(auth_middleware)
                .service(web::resource("/upload").route(web::post().to(upload_media)))
                .service(web::resource("/detect/{media_id}").route(web::post().to(detect_media)))
                .service(web::resource("/result/{media_id}").route(web::get().to(get_result))),
        );
}

async fn index() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "message": "Deepfake Detection API is running." }))
}

/// Resolves the token subject back to an account row. A token whose subject
/// no longer exists is as good as no token.
async fn resolve_account(
    repo: &Repository,
    user: &AuthenticatedUser,
) -> Result<UserRow, HttpResponse> {
    match repo.get_user_by_email(&user.0).await {
        Ok(Some(account)) => Ok(account),
        Ok(None) => Err(HttpResponse::Unauthorized().json(ErrorResponse {
            error: "Could not validate credentials".into(),
        })),
        Err(e) => {
            error!("Failed to resolve account {}: {:?}", user.0, e);
            Err(HttpResponse::InternalServerError().json(ErrorResponse {
                error: "Internal server error".into(),
            }))
        }
    }
}

async fn upload_media(
    user: AuthenticatedUser,
    repo: web::Data<Repository>,
    store: web::Data<MediaStore>,
    mut payload: Multipart,
) -> HttpResponse {
    let account = match resolve_account(&repo, &user).await {
        Ok(account) => account,
        Err(response) => return response,
    };

    let mut upload: Option<(String, Vec<u8>)> = None;
    while let Ok(Some(mut field)) = payload.try_next().await {
        let filename = field
            .content_disposition()
            .and_then(|cd| cd.get_filename().map(str::to_string));
        let Some(filename) = filename else { continue };

        let mut data = Vec::new();
        while let Some(chunk) = field.next().await {
            match chunk {
                Ok(bytes) => data.extend_from_slice(&bytes),
                Err(e) => {
                    error!("Malformed multipart upload: {}", e);
                    return HttpResponse::BadRequest().json(ErrorResponse {
                        error: "Malformed upload".into(),
                    });
                }
            }
        }
        upload = Some((filename, data));
        break;
    }

    let Some((filename, data)) = upload else {
        return HttpResponse::BadRequest().json(ErrorResponse {
            error: "No file provided".into(),
        });
    };

    // Validation happens before any filesystem write.
    let stored_name = match store.save(&filename, &data) {
        Ok(name) => name,
        Err(e @ (StorageError::UnsupportedType(_) | StorageError::FileTooLarge)) => {
            return HttpResponse::BadRequest().json(ErrorResponse {
                error: e.to_string(),
            });
        }
        Err(e) => {
            error!("Failed to store upload {}: {}", filename, e);
            return HttpResponse::InternalServerError().json(ErrorResponse {
                error: "Failed to store upload".into(),
            });
        }
    };

    match repo.create_media(&stored_name, account.id).await {
        Ok(media) => {
            info!("Stored media {} as {}", media.id, media.filename);
            HttpResponse::Ok().json(media.to_response())
        }
        Err(e) => {
            error!("Failed to record media {}: {:?}", stored_name, e);
            HttpResponse::InternalServerError().json(ErrorResponse {
                error: "Failed to record upload".into(),
            })
        }
    }
}

async fn detect_media(
    user: AuthenticatedUser,
    repo: web::Data<Repository>,
    store: web::Data<MediaStore>,
    detector: web::Data<Detector>,
    path: web::Path<i64>,
) -> HttpResponse {
    let media_id = path.into_inner();
    let account = match resolve_account(&repo, &user).await {
        Ok(account) => account,
        Err(response) => return response,
    };

    let media = match repo.get_media_owned(media_id, account.id).await {
        Ok(Some(media)) => media,
        Ok(None) => {
            return HttpResponse::NotFound().json(ErrorResponse {
                error: "Media not found".into(),
            });
        }
        Err(e) => {
            error!("Failed to resolve media {}: {:?}", media_id, e);
            return HttpResponse::InternalServerError().json(ErrorResponse {
                error: "Internal server error".into(),
            });
        }
    };

    let file_path = store.path_for(&media.filename);
    if !file_path.exists() {
        return HttpResponse::NotFound().json(ErrorResponse {
            error: "File not found on server".into(),
        });
    }

    info!("Running detection for media {} ({})", media.id, media.filename);
    let score = match detector.run(&file_path) {
        Ok(score) => score,
        Err(e @ DetectError::Unsupported) => {
            return HttpResponse::BadRequest().json(ErrorResponse {
                error: e.to_string(),
            });
        }
        Err(DetectError::Video(e)) => {
            error!("Video pipeline failed for media {}: {}", media.id, e);
            let message = match e {
                FrameError::CannotOpen(_) => "Could not open video file.",
                FrameError::NoFrames => "No frames extracted from video.",
                _ => {
                    return HttpResponse::InternalServerError().json(ErrorResponse {
                        error: "Detection failed".into(),
                    });
                }
            };
            return HttpResponse::BadRequest().json(ErrorResponse {
                error: message.into(),
            });
        }
    };

    match repo
        .create_detection_result(media.id, score.is_deepfake as i32, f64::from(score.confidence))
        .await
    {
        Ok(result) => {
            info!(
                "Media {} scored: is_deepfake={}, confidence={:.4}",
                media.id, result.is_deepfake, result.confidence
            );
            HttpResponse::Ok().json(result.to_response())
        }
        Err(e) => {
            error!("Failed to persist result for media {}: {:?}", media.id, e);
            HttpResponse::InternalServerError().json(ErrorResponse {
                error: "Failed to persist detection result".into(),
            })
        }
    }
}

async fn get_result(
    user: AuthenticatedUser,
    repo: web::Data<Repository>,
    path: web::Path<i64>,
) -> HttpResponse {
    let media_id = path.into_inner();
    let account = match resolve_account(&repo, &user).await {
        Ok(account) => account,
        Err(response) => return response,
    };

    let media = match repo.get_media_owned(media_id, account.id).await {
        Ok(Some(media)) => media,
        Ok(None) => {
            return HttpResponse::NotFound().json(ErrorResponse {
                error: "Detection result not found".into(),
            });
        }
        Err(e) => {
            error!("Failed to resolve media {}: {:?}", media_id, e);
            return HttpResponse::InternalServerError().json(ErrorResponse {
                error: "Internal server error".into(),
            });
        }
    };

    match repo.latest_result_for_media(media.id).await {
        Ok(Some(result)) => HttpResponse::Ok().json(result.to_response()),
        Ok(None) => HttpResponse::NotFound().json(ErrorResponse {
            error: "Detection result not found".into(),
        }),
        Err(e) => {
            error!("Failed to fetch result for media {}: {:?}", media.id, e);
            HttpResponse::InternalServerError().json(ErrorResponse {
                error: "Internal server error".into(),
            })
        }
    }
}
