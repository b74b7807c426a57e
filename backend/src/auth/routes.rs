use actix_web::{HttpResponse, web};
use log::error;
use serde::Serialize;

use crate::db::repository::Repository;

use super::jwt::JwtService;
use super::models::{AuthResponse, LoginRequest, RegisterRequest, UserResponse};
use super::password;

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

pub async fn register(
    repo: web::Data<Repository>,
    payload: web::Json<RegisterRequest>,
) -> HttpResponse {
    let req = payload.into_inner();

    match repo.get_user_by_email(&req.email).await {
        Ok(Some(_)) => {
            return HttpResponse::BadRequest().json(ErrorResponse {
                error: "Email already registered".into(),
            });
        }
        Ok(None) => {}
        Err(e) => {
            error!("Failed to look up user {}: {:?}", req.email, e);
            return HttpResponse::InternalServerError().json(ErrorResponse {
                error: "Registration failed".into(),
            });
        }
    }

    let hashed = match password::hash_password(&req.password) {
        Ok(hashed) => hashed,
        Err(e) => {
            error!("Password hashing failed: {}", e);
            return HttpResponse::InternalServerError().json(ErrorResponse {
                error: "Registration failed".into(),
            });
        }
    };

    match repo.create_user(&req.email, &hashed).await {
        Ok(user) => {
            log::info!("Registered user {}", user.email);
            HttpResponse::Ok().json(UserResponse {
                id: user.id,
                email: user.email,
            })
        }
        Err(e) => {
            error!("Failed to create user {}: {:?}", req.email, e);
            HttpResponse::InternalServerError().json(ErrorResponse {
                error: "Registration failed".into(),
            })
        }
    }
}

pub async fn login(
    repo: web::Data<Repository>,
    jwt_service: web::Data<JwtService>,
    payload: web::Json<LoginRequest>,
) -> HttpResponse {
    let req = payload.into_inner();

    let user = match repo.get_user_by_email(&req.email).await {
        Ok(user) => user,
        Err(e) => {
            error!("Failed to look up user {}: {:?}", req.email, e);
            return HttpResponse::InternalServerError().json(ErrorResponse {
                error: "Login failed".into(),
            });
        }
    };

    // A missing account and a bad password get the same answer.
    let authenticated = user
        .filter(|u| password::verify_password(&req.password, &u.hashed_password));
    let Some(user) = authenticated else {
        return HttpResponse::BadRequest().json(ErrorResponse {
            error: "Incorrect email or password".into(),
        });
    };

    match jwt_service.generate_token(&user.email) {
        Ok(token) => HttpResponse::Ok().json(AuthResponse {
            access_token: token,
            token_type: "bearer".into(),
        }),
        Err(e) => {
            error!("Token generation failed for {}: {}", user.email, e);
            HttpResponse::InternalServerError().json(ErrorResponse {
                error: "Login failed".into(),
            })
        }
    }
}
