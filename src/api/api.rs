use actix_web::{delete, get, post, put, web, HttpResponse};
use serde::Deserialize;

use crate::errors::ApiError;
use crate::models::task::{NewTask, TaskChanges, TaskPayload};
use crate::repository::database::Database;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    completed: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    titulo: String,
}

#[get("/tareas")]
pub async fn get_tasks(
    db: web::Data<Database>,
    query: web::Query<ListQuery>,
) -> Result<HttpResponse, ApiError> {
    let tasks = match query.completed {
        Some(flag) => db.find_by_completed(flag)?,
        None => db.find_all()?,
    };
    Ok(HttpResponse::Ok().json(tasks))
}

#[get("/tareas/buscar")]
pub async fn search_tasks_by_title(
    db: web::Data<Database>,
    query: web::Query<SearchQuery>,
) -> Result<HttpResponse, ApiError> {
    let tasks = db.find_by_title_contains(&query.titulo)?;
    Ok(HttpResponse::Ok().json(tasks))
}

#[get("/tareas/{id}")]
pub async fn get_task_by_id(
    db: web::Data<Database>,
    path: web::Path<i64>,
) -> Result<HttpResponse, ApiError> {
    let task = db.find_by_id(path.into_inner())?;
    Ok(HttpResponse::Ok().json(task))
}

#[post("/tareas")]
pub async fn create_task(
    db: web::Data<Database>,
    payload: web::Json<TaskPayload>,
) -> Result<HttpResponse, ApiError> {
    let payload = payload.into_inner();
    payload.validate()?;
    // New tasks always start pending, whatever the client claimed.
    let task = db.create(NewTask {
        title: payload.title,
        description: payload.description,
        completed: false,
    })?;
    Ok(HttpResponse::Created().json(task))
}

#[put("/tareas/{id}")]
pub async fn update_task_by_id(
    db: web::Data<Database>,
    path: web::Path<i64>,
    payload: web::Json<TaskPayload>,
) -> Result<HttpResponse, ApiError> {
    let payload = payload.into_inner();
    payload.validate()?;
    let task = db.update(
        path.into_inner(),
        TaskChanges {
            title: payload.title,
            description: payload.description,
            completed: payload.completed,
        },
    )?;
    Ok(HttpResponse::Ok().json(task))
}

#[delete("/tareas/{id}")]
pub async fn delete_task_by_id(
    db: web::Data<Database>,
    path: web::Path<i64>,
) -> Result<HttpResponse, ApiError> {
    db.delete(path.into_inner())?;
    Ok(HttpResponse::NoContent().finish())
}

#[put("/tareas/{id}/completar")]
pub async fn complete_task_by_id(
    db: web::Data<Database>,
    path: web::Path<i64>,
) -> Result<HttpResponse, ApiError> {
    let task = db.complete(path.into_inner())?;
    Ok(HttpResponse::Ok().json(task))
}

pub fn config(cfg: &mut web::ServiceConfig) {
    // "/tareas/buscar" has to be registered ahead of "/tareas/{id}".
    cfg.service(
        web::scope("/api")
            .service(get_tasks)
            .service(search_tasks_by_title)
            .service(get_task_by_id)
            .service(create_task)
            .service(update_task_by_id)
            .service(delete_task_by_id)
            .service(complete_task_by_id),
    );
}
