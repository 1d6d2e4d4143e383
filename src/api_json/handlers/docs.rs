use crate::api_json::{CambioCelda, CambioSeleccion, Credenciales, NuevoComponente};
use crate::registro::parte::{CodigoParte, ParteDiario, ParteFila, Tramo};
use crate::seleccion::Nivel;
use actix_web::{HttpResponse, Responder};
use serde_json::json;

/// GET /help
pub async fn help_handler() -> impl Responder {
    let mut fila = ParteFila::vacia("<id de componente>");
    fila.codigo = Some(CodigoParte::JR);
    fila.jornada = Tramo { ini: "08:00".to_string(), fin: "15:00".to_string() };
    let parte = ParteDiario { filas: vec![fila], horas_extras_total: "02:30".to_string() };

    let help = json!({
        "description": "API del cuadernillo: selector de provincia, zona, municipio y centro; plantilla de componentes; parte diario; salidas a incendios; cuadrante y resúmenes; consulta de administración.",
        "routes": [
            "GET /catalogo/provincias",
            "GET /catalogo/zonas?provincia=",
            "GET /catalogo/municipios?provincia=&zona=",
            "GET /catalogo/candidatos?provincia=&zona=&municipio=&tipo=unidad|caseta",
            "GET|POST|DELETE /seleccion",
            "POST /seleccion/confirmar",
            "GET|DELETE /sesion",
            "GET /componentes?q=",
            "POST /componentes",
            "DELETE /componentes/{id}",
            "GET|PUT /control-diario?fecha=YYYY-MM-DD",
            "GET /salidas-trabajo?fecha=YYYY-MM-DD",
            "GET|POST /incendios?parte_pk=",
            "PUT|DELETE /incendios/{id}?parte_pk=",
            "POST /incendios/guardar?parte_pk=",
            "GET|POST /cuadernillo",
            "POST /cuadernillo/volcar?fecha=YYYY-MM-DD",
            "GET /cuadrante?anio=&mes=&q=",
            "PUT /cuadrante/celda",
            "GET /resumen-mensual?anio=&mes=",
            "GET /resumen-anual?anio=",
            "POST /admin/login",
            "POST /admin/logout",
            "GET /admin/cuadernillo?fecha=&modo=centro|componente&q=&page=&page_size=50|100|200",
            "GET /admin/cuadernillo.csv (mismos parámetros)",
        ],
        "examples": {
            "seleccion": CambioSeleccion { nivel: Nivel::Municipio, valor: "Plasencia".to_string() },
            "componente": NuevoComponente {
                nombre: "Luis".to_string(),
                apellidos: "García Pérez".to_string(),
                numero: Some("017".to_string()),
            },
            "control_diario": parte,
            "cuadrante_celda": CambioCelda {
                anio: 2025,
                mes: 8,
                componente_id: "<id de componente>".to_string(),
                dia: 3,
                codigo: Some("T".to_string()),
            },
            "admin_login": Credenciales { usuario: "admin".to_string(), clave: "admin".to_string() },
        },
        "note": "Sin CUADERNILLO_DB_URL el servicio funciona en modo degradado: las escrituras se guardan sólo en local y la respuesta incluye 'aviso'. Las rutas de administración piden 'Authorization: Bearer <token>'.",
    });

    HttpResponse::Ok().json(help)
}
