//! Admin HTTP surface: health probe plus CRUD on the check list. Every
//! mutation goes through the store (persisting it when file-backed) and
//! keeps the scheduler in sync.

use std::sync::Arc;

use actix_web::dev::Server;
use actix_web::{App, HttpResponse, HttpServer, web};
use sonda::{Scheduler, Store, parse_check, parse_checks};

pub struct AppState {
    pub store: Arc<dyn Store>,
    pub scheduler: Arc<Scheduler>,
}

pub fn serve(
    listen: &str,
    store: Arc<dyn Store>,
    scheduler: Arc<Scheduler>,
) -> anyhow::Result<Server> {
    let state = web::Data::new(AppState { store, scheduler });
    let server = HttpServer::new(move || App::new().app_data(state.clone()).configure(routes))
        .bind(listen)?
        .run();
    Ok(server)
}

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health))
        .route("/checks", web::get().to(list_checks))
        .route("/checks", web::post().to(add_check))
        .route("/checks", web::put().to(replace_checks))
        .route("/checks/{key}", web::delete().to(delete_check));
}

async fn health() -> HttpResponse {
    HttpResponse::Ok().finish()
}

async fn list_checks(state: web::Data<AppState>) -> HttpResponse {
    match state.store.all().await {
        Ok(checks) => {
            let checks: Vec<_> = checks.iter().map(|c| c.as_ref()).collect();
            HttpResponse::Ok().json(checks)
        }
        Err(err) => HttpResponse::InternalServerError().body(err.to_string()),
    }
}

async fn add_check(state: web::Data<AppState>, body: web::Bytes) -> HttpResponse {
    let check = match parse_check(&body) {
        Ok(check) => Arc::new(check),
        Err(err) => return HttpResponse::BadRequest().body(err.to_string()),
    };

    if let Err(err) = state.store.add(check.clone()).await {
        return HttpResponse::InternalServerError().body(err.to_string());
    }
    state.scheduler.schedule(check);

    HttpResponse::Created().finish()
}

async fn replace_checks(state: web::Data<AppState>, body: web::Bytes) -> HttpResponse {
    let checks = match parse_checks(&body) {
        Ok(checks) => checks,
        Err(err) => return HttpResponse::BadRequest().body(err.to_string()),
    };

    state.scheduler.stop_all();
    if let Err(err) = state.store.clear().await {
        return HttpResponse::InternalServerError().body(err.to_string());
    }

    for check in checks {
        let check = Arc::new(check);
        if let Err(err) = state.store.add(check.clone()).await {
            return HttpResponse::InternalServerError().body(err.to_string());
        }
        state.scheduler.schedule(check);
    }

    HttpResponse::Created().finish()
}

async fn delete_check(state: web::Data<AppState>, path: web::Path<String>) -> HttpResponse {
    let key = path.into_inner();

    match state.store.remove(&key).await {
        Ok(true) => {
            state.scheduler.stop(&key);
            HttpResponse::NoContent().finish()
        }
        Ok(false) => HttpResponse::NotFound().finish(),
        Err(err) => HttpResponse::InternalServerError().body(err.to_string()),
    }
}
