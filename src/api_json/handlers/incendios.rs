//! Salidas a incendios. Todas las rutas aceptan `?parte_pk=...`; sin él se
//! trabaja sobre la lista temporal.

use crate::api_json::{parametro, respuesta_error};
use crate::registro::incendios::{self, Salida};
use crate::server::EstadoApp;
use actix_web::{web, HttpResponse, Responder};
use serde_json::json;
use std::collections::HashMap;

/// GET /incendios?parte_pk=...
pub async fn incendios_list_handler(
    estado: web::Data<EstadoApp>,
    query: web::Query<HashMap<String, String>>,
) -> impl Responder {
    let pk = parametro(&query, "parte_pk");
    match incendios::cargar(&estado.sesion, estado.almacen.as_deref(), pk.as_deref()) {
        Ok(salidas) => HttpResponse::Ok().json(json!({"parte_pk": pk, "salidas": salidas})),
        Err(e) => respuesta_error(&e),
    }
}

/// POST /incendios?parte_pk=...
/// Añade una salida vacía.
pub async fn incendios_add_handler(
    estado: web::Data<EstadoApp>,
    query: web::Query<HashMap<String, String>>,
) -> impl Responder {
    let pk = parametro(&query, "parte_pk");
    match incendios::anadir(&estado.sesion, pk.as_deref()) {
        Ok(s) => HttpResponse::Created().json(s),
        Err(e) => respuesta_error(&e),
    }
}

/// PUT /incendios/{id}?parte_pk=...
pub async fn incendios_update_handler(
    estado: web::Data<EstadoApp>,
    path: web::Path<String>,
    query: web::Query<HashMap<String, String>>,
    body: web::Json<Salida>,
) -> impl Responder {
    let id = path.into_inner();
    let mut salida = body.into_inner();
    salida.id = id.clone();
    let pk = parametro(&query, "parte_pk");
    match incendios::actualizar(&estado.sesion, pk.as_deref(), salida) {
        Ok(true) => HttpResponse::Ok().json(json!({"status": "ok"})),
        Ok(false) => HttpResponse::NotFound().json(json!({"error": format!("salida '{}' no encontrada", id)})),
        Err(e) => respuesta_error(&e),
    }
}

/// DELETE /incendios/{id}?parte_pk=...
pub async fn incendios_delete_handler(
    estado: web::Data<EstadoApp>,
    path: web::Path<String>,
    query: web::Query<HashMap<String, String>>,
) -> impl Responder {
    let id = path.into_inner();
    let pk = parametro(&query, "parte_pk");
    match incendios::eliminar(&estado.sesion, pk.as_deref(), &id) {
        Ok(true) => HttpResponse::Ok().json(json!({"status": "ok"})),
        Ok(false) => HttpResponse::NotFound().json(json!({"error": format!("salida '{}' no encontrada", id)})),
        Err(e) => respuesta_error(&e),
    }
}

/// POST /incendios/guardar?parte_pk=...
/// Sustituye en el backend las salidas del parte por la lista local.
pub async fn incendios_save_handler(
    estado: web::Data<EstadoApp>,
    query: web::Query<HashMap<String, String>>,
) -> impl Responder {
    let pk = parametro(&query, "parte_pk");
    let salidas = match incendios::listar(&estado.sesion, pk.as_deref()) {
        Ok(s) => s,
        Err(e) => return respuesta_error(&e),
    };
    match incendios::guardar_remoto(estado.almacen.as_deref(), pk.as_deref(), &salidas) {
        Ok(()) => HttpResponse::Ok().json(json!({"status": "ok", "guardadas": salidas.len()})),
        Err(e) => respuesta_error(&e),
    }
}
