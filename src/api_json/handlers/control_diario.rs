use crate::api_json::{fecha_o_hoy, respuesta_error, AVISO_SIN_BACKEND};
use crate::registro::parte::{self, CodigoParte, Guardado, ParteDiario};
use crate::server::EstadoApp;
use actix_web::{web, HttpResponse, Responder};
use serde_json::json;
use std::collections::HashMap;

/// GET /control-diario?fecha=YYYY-MM-DD
///
/// Parte del día para la selección confirmada, con una fila por componente
/// de la plantilla.
pub async fn control_diario_get_handler(
    estado: web::Data<EstadoApp>,
    query: web::Query<HashMap<String, String>>,
) -> impl Responder {
    let fecha = match fecha_o_hoy(&query) {
        Ok(f) => f,
        Err(e) => return respuesta_error(&e),
    };
    let (sel, componentes) = match (estado.sesion.seleccion_actual(), estado.sesion.componentes()) {
        (Ok(s), Ok(c)) => (s, c),
        (Err(e), _) | (_, Err(e)) => return respuesta_error(&e),
    };
    let pk = parte::clave_parte(sel.as_ref(), fecha);
    let mut parte = match parte::cargar(&estado.sesion, estado.almacen.as_deref(), &pk) {
        Ok(p) => p,
        Err(e) => return respuesta_error(&e),
    };
    parte.filas = parte::sincronizar_con_componentes(parte.filas, &componentes);

    let codigos: Vec<&str> = std::iter::once("").chain(CodigoParte::TODOS.iter().map(|c| c.como_str())).collect();
    let mut resp = json!({
        "pk": pk,
        "fecha": fecha.format("%Y-%m-%d").to_string(),
        "seleccion_actual": sel,
        "componentes": componentes,
        "parte": parte,
        "horas_extras": parte.horas_extras(),
        "codigos": codigos,
    });
    if estado.almacen.is_none() {
        resp["aviso"] = json!(AVISO_SIN_BACKEND);
    }
    HttpResponse::Ok().json(resp)
}

/// PUT /control-diario?fecha=YYYY-MM-DD
/// Guarda en local y programa la escritura remota.
pub async fn control_diario_put_handler(
    estado: web::Data<EstadoApp>,
    query: web::Query<HashMap<String, String>>,
    body: web::Json<ParteDiario>,
) -> impl Responder {
    let fecha = match fecha_o_hoy(&query) {
        Ok(f) => f,
        Err(e) => return respuesta_error(&e),
    };
    let sel = match estado.sesion.seleccion_actual() {
        Ok(s) => s,
        Err(e) => return respuesta_error(&e),
    };
    let parte = body.into_inner();
    let guardado = parte::guardar(
        &estado.sesion,
        estado.almacen.as_ref(),
        &estado.debouncer,
        sel.as_ref(),
        fecha,
        &parte,
    );
    let pk = parte::clave_parte(sel.as_ref(), fecha);
    match guardado {
        Ok(Guardado::Programado) => HttpResponse::Ok().json(json!({"status": "ok", "pk": pk})),
        Ok(Guardado::SoloLocal) => {
            let aviso = if estado.almacen.is_none() {
                AVISO_SIN_BACKEND
            } else {
                "no hay selección confirmada: el parte se ha guardado sólo en este dispositivo"
            };
            HttpResponse::Ok().json(json!({"status": "ok", "pk": pk, "aviso": aviso}))
        }
        Err(e) => respuesta_error(&e),
    }
}

/// GET /salidas-trabajo?fecha=YYYY-MM-DD
pub async fn salidas_trabajo_handler(
    estado: web::Data<EstadoApp>,
    query: web::Query<HashMap<String, String>>,
) -> impl Responder {
    let fecha = match fecha_o_hoy(&query) {
        Ok(f) => f,
        Err(e) => return respuesta_error(&e),
    };
    let (sel, componentes) = match (estado.sesion.seleccion_actual(), estado.sesion.componentes()) {
        (Ok(s), Ok(c)) => (s, c),
        (Err(e), _) | (_, Err(e)) => return respuesta_error(&e),
    };
    let pk = parte::clave_parte(sel.as_ref(), fecha);
    match parte::cargar(&estado.sesion, estado.almacen.as_deref(), &pk) {
        Ok(p) => HttpResponse::Ok().json(json!({"pk": pk, "salidas": parte::salidas_trabajo(&p, &componentes)})),
        Err(e) => respuesta_error(&e),
    }
}
