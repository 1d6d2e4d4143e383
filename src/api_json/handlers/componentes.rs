use crate::api_json::{parametro, respuesta_error, NuevoComponente};
use crate::registro::componentes;
use crate::server::EstadoApp;
use actix_web::{web, HttpResponse, Responder};
use serde_json::json;
use std::collections::HashMap;

/// GET /componentes?q=garcia
pub async fn componentes_list_handler(
    estado: web::Data<EstadoApp>,
    query: web::Query<HashMap<String, String>>,
) -> impl Responder {
    let lista = match estado.sesion.componentes() {
        Ok(l) => l,
        Err(e) => return respuesta_error(&e),
    };
    let q = parametro(&query, "q").unwrap_or_default();
    let filtrados = componentes::filtrar(&lista, &q);
    HttpResponse::Ok().json(json!({"componentes": filtrados, "total": lista.len()}))
}

/// POST /componentes
pub async fn componentes_create_handler(
    estado: web::Data<EstadoApp>,
    body: web::Json<NuevoComponente>,
) -> impl Responder {
    let c = body.into_inner();
    match componentes::crear(&estado.sesion, &c.nombre, &c.apellidos, c.numero.as_deref()) {
        Ok(nuevo) => HttpResponse::Created().json(nuevo),
        Err(e) => respuesta_error(&e),
    }
}

/// DELETE /componentes/{id}
pub async fn componentes_delete_handler(estado: web::Data<EstadoApp>, path: web::Path<String>) -> impl Responder {
    let id = path.into_inner();
    match componentes::eliminar(&estado.sesion, &id) {
        Ok(true) => HttpResponse::Ok().json(json!({"status": "ok"})),
        Ok(false) => HttpResponse::NotFound().json(json!({"error": format!("componente '{}' no encontrado", id)})),
        Err(e) => respuesta_error(&e),
    }
}
