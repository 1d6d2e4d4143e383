use crate::api_json::{parsear_fecha, respuesta_error, CambioSeleccion, Confirmacion};
use crate::seleccion::Seleccion;
use crate::server::EstadoApp;
use actix_web::{web, HttpResponse, Responder};
use chrono::Local;
use serde_json::{json, Value};

fn estado_seleccion(estado: &EstadoApp, sel: &Seleccion) -> Value {
    let cat = &estado.catalogo;
    json!({
        "seleccion": sel,
        "opciones": {
            "provincias": cat.provincias(),
            "zonas": cat.zonas(&sel.provincia),
            "municipios": cat.municipios(&sel.provincia, &sel.zona),
            "candidatos": sel.candidatos(cat),
        },
        "puede_confirmar": sel.puede_confirmar(),
        "nombre_centro": sel.nombre_centro(),
    })
}

/// GET /seleccion
/// Selección en curso y las opciones de cada selector.
pub async fn seleccion_get_handler(estado: web::Data<EstadoApp>) -> impl Responder {
    let sel = estado.seleccion_en_curso().clone();
    HttpResponse::Ok().json(estado_seleccion(&estado, &sel))
}

/// POST /seleccion
pub async fn seleccion_post_handler(
    estado: web::Data<EstadoApp>,
    body: web::Json<CambioSeleccion>,
) -> impl Responder {
    let cambio = body.into_inner();
    let sel = {
        let mut sel = estado.seleccion_en_curso();
        if let Err(e) = sel.fijar(cambio.nivel, &cambio.valor) {
            return respuesta_error(&e);
        }
        sel.clone()
    };
    HttpResponse::Ok().json(estado_seleccion(&estado, &sel))
}

/// DELETE /seleccion
pub async fn seleccion_delete_handler(estado: web::Data<EstadoApp>) -> impl Responder {
    *estado.seleccion_en_curso() = Seleccion::new();
    HttpResponse::Ok().json(estado_seleccion(&estado, &Seleccion::new()))
}

/// POST /seleccion/confirmar
pub async fn confirmar_handler(estado: web::Data<EstadoApp>, body: Option<web::Json<Confirmacion>>) -> impl Responder {
    let conf = body.map(|b| b.into_inner()).unwrap_or_default();
    let fecha = match conf.fecha.as_deref().filter(|f| !f.trim().is_empty()) {
        Some(f) => match parsear_fecha(f) {
            Ok(d) => d,
            Err(e) => return respuesta_error(&e),
        },
        None => Local::now().date_naive(),
    };
    let sel = estado.seleccion_en_curso().clone();
    match sel.confirmar(&estado.sesion, fecha) {
        Ok(actual) => HttpResponse::Ok().json(actual),
        Err(e) => respuesta_error(&e),
    }
}

/// GET /sesion
/// Última selección confirmada (`null` si no hay).
pub async fn sesion_get_handler(estado: web::Data<EstadoApp>) -> impl Responder {
    match estado.sesion.seleccion_actual() {
        Ok(actual) => HttpResponse::Ok().json(json!({"seleccion_actual": actual})),
        Err(e) => respuesta_error(&e),
    }
}

/// DELETE /sesion
pub async fn sesion_delete_handler(estado: web::Data<EstadoApp>) -> impl Responder {
    match estado.sesion.limpiar_seleccion() {
        Ok(()) => HttpResponse::Ok().json(json!({"status": "ok"})),
        Err(e) => respuesta_error(&e),
    }
}
