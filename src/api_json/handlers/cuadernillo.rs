use crate::api_json::{fecha_o_hoy, respuesta_error};
use crate::error::CuadernilloError;
use crate::registro::cuadernillo::{self, CuadernilloRow};
use crate::registro::parte;
use crate::server::EstadoApp;
use actix_web::{web, HttpResponse, Responder};
use serde_json::json;
use std::collections::HashMap;

/// POST /cuadernillo
/// Inserta filas del cuadernillo (`codigo` obligatorio en cada una).
pub async fn cuadernillo_insert_handler(
    estado: web::Data<EstadoApp>,
    body: web::Json<Vec<CuadernilloRow>>,
) -> impl Responder {
    let Some(almacen) = estado.almacen.as_deref() else {
        return respuesta_error(&CuadernilloError::SinBackend);
    };
    let filas = body.into_inner();
    match cuadernillo::insertar(almacen, &filas) {
        Ok(()) => HttpResponse::Created().json(json!({"status": "ok", "insertadas": filas.len()})),
        Err(e) => respuesta_error(&e),
    }
}

/// GET /cuadernillo
/// Todas las filas, las más recientes primero.
pub async fn cuadernillo_list_handler(estado: web::Data<EstadoApp>) -> impl Responder {
    let Some(almacen) = estado.almacen.as_deref() else {
        return respuesta_error(&CuadernilloError::SinBackend);
    };
    match cuadernillo::listar_todo(almacen) {
        Ok(filas) => HttpResponse::Ok().json(json!({"filas": filas})),
        Err(e) => respuesta_error(&e),
    }
}

/// POST /cuadernillo/volcar?fecha=YYYY-MM-DD
/// Convierte el parte del día de la selección confirmada en filas del
/// cuadernillo y las inserta.
pub async fn cuadernillo_volcar_handler(
    estado: web::Data<EstadoApp>,
    query: web::Query<HashMap<String, String>>,
) -> impl Responder {
    let Some(almacen) = estado.almacen.as_deref() else {
        return respuesta_error(&CuadernilloError::SinBackend);
    };
    let fecha = match fecha_o_hoy(&query) {
        Ok(f) => f,
        Err(e) => return respuesta_error(&e),
    };
    let sel = match estado.sesion.seleccion_actual() {
        Ok(Some(s)) => s,
        Ok(None) => return respuesta_error(&CuadernilloError::validacion("no hay selección confirmada")),
        Err(e) => return respuesta_error(&e),
    };
    let componentes = match estado.sesion.componentes() {
        Ok(c) => c,
        Err(e) => return respuesta_error(&e),
    };
    let pk = parte::clave_parte(Some(&sel), fecha);
    let p = match parte::cargar(&estado.sesion, Some(almacen), &pk) {
        Ok(p) => p,
        Err(e) => return respuesta_error(&e),
    };
    let filas = cuadernillo::filas_de_parte(&sel, fecha, &p, &componentes);
    if filas.is_empty() {
        return HttpResponse::Ok().json(json!({"status": "ok", "insertadas": 0}));
    }
    match cuadernillo::insertar(almacen, &filas) {
        Ok(()) => HttpResponse::Created().json(json!({"status": "ok", "insertadas": filas.len()})),
        Err(e) => respuesta_error(&e),
    }
}
