use crate::admin::SesionesAdmin;
use crate::almacen::{AlmacenFilas, PostgresFilas, SqliteFilas};
use crate::api_json::handlers::*;
use crate::catalogo::Catalogo;
use crate::config::{BackendRemoto, Config};
use crate::debounce::Debouncer;
use crate::error::Resultado;
use crate::seleccion::Seleccion;
use crate::sesion::kv::{AlmacenClaveValor, KvMemoria, KvSqlite};
use crate::sesion::ContextoSesion;
use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{info, warn};

/// Estado compartido por todos los handlers.
pub struct EstadoApp {
    pub config: Config,
    pub catalogo: Arc<Catalogo>,
    pub sesion: ContextoSesion,
    /// `None` en modo degradado.
    pub almacen: Option<Arc<dyn AlmacenFilas>>,
    seleccion: Mutex<Seleccion>,
    pub debouncer: Debouncer,
    pub admin: SesionesAdmin,
}

impl EstadoApp {
    pub fn nuevo(
        config: Config,
        catalogo: Catalogo,
        sesion: ContextoSesion,
        almacen: Option<Arc<dyn AlmacenFilas>>,
    ) -> Self {
        EstadoApp {
            debouncer: Debouncer::new(config.debounce),
            admin: SesionesAdmin::new(&config.admin_user, &config.admin_pass),
            catalogo: Arc::new(catalogo),
            sesion,
            almacen,
            seleccion: Mutex::new(Seleccion::new()),
            config,
        }
    }

    /// Abre catálogo, almacén local y backend según la configuración.
    pub fn desde_config(config: Config) -> Resultado<Self> {
        let catalogo = Catalogo::cargar(config.catalogo_path.as_deref())?;
        let kv: Arc<dyn AlmacenClaveValor> = match &config.kv_path {
            Some(p) => Arc::new(KvSqlite::abrir(p)?),
            None => Arc::new(KvMemoria::new()),
        };
        let almacen: Option<Arc<dyn AlmacenFilas>> = match &config.db {
            Some(BackendRemoto::Sqlite(p)) => Some(Arc::new(SqliteFilas::abrir(p)?)),
            Some(BackendRemoto::Postgres(url)) => Some(Arc::new(PostgresFilas::abrir(url)?)),
            None => None,
        };
        Ok(EstadoApp::nuevo(config, catalogo, ContextoSesion::new(kv), almacen))
    }

    pub fn seleccion_en_curso(&self) -> MutexGuard<'_, Seleccion> {
        self.seleccion.lock().unwrap_or_else(|e| e.into_inner())
    }
}

pub fn configurar_rutas(cfg: &mut web::ServiceConfig) {
    cfg.route("/help", web::get().to(help_handler))
        .route("/catalogo/provincias", web::get().to(provincias_handler))
        .route("/catalogo/zonas", web::get().to(zonas_handler))
        .route("/catalogo/municipios", web::get().to(municipios_handler))
        .route("/catalogo/candidatos", web::get().to(candidatos_handler))
        .route("/seleccion", web::get().to(seleccion_get_handler))
        .route("/seleccion", web::post().to(seleccion_post_handler))
        .route("/seleccion", web::delete().to(seleccion_delete_handler))
        .route("/seleccion/confirmar", web::post().to(confirmar_handler))
        .route("/sesion", web::get().to(sesion_get_handler))
        .route("/sesion", web::delete().to(sesion_delete_handler))
        .route("/componentes", web::get().to(componentes_list_handler))
        .route("/componentes", web::post().to(componentes_create_handler))
        .route("/componentes/{id}", web::delete().to(componentes_delete_handler))
        .route("/control-diario", web::get().to(control_diario_get_handler))
        .route("/control-diario", web::put().to(control_diario_put_handler))
        .route("/salidas-trabajo", web::get().to(salidas_trabajo_handler))
        .route("/incendios", web::get().to(incendios_list_handler))
        .route("/incendios", web::post().to(incendios_add_handler))
        .route("/incendios/guardar", web::post().to(incendios_save_handler))
        .route("/incendios/{id}", web::put().to(incendios_update_handler))
        .route("/incendios/{id}", web::delete().to(incendios_delete_handler))
        .route("/cuadernillo", web::get().to(cuadernillo_list_handler))
        .route("/cuadernillo", web::post().to(cuadernillo_insert_handler))
        .route("/cuadernillo/volcar", web::post().to(cuadernillo_volcar_handler))
        .route("/cuadrante", web::get().to(cuadrante_get_handler))
        .route("/cuadrante/celda", web::put().to(cuadrante_celda_handler))
        .route("/resumen-mensual", web::get().to(resumen_mensual_handler))
        .route("/resumen-anual", web::get().to(resumen_anual_handler))
        .route("/admin/login", web::post().to(admin_login_handler))
        .route("/admin/logout", web::post().to(admin_logout_handler))
        .route("/admin/cuadernillo", web::get().to(admin_search_handler))
        .route("/admin/cuadernillo.csv", web::get().to(admin_csv_handler));
}

pub async fn run_server(estado: EstadoApp) -> std::io::Result<()> {
    let bind = estado.config.bind.clone();
    if estado.almacen.is_none() {
        warn!("CUADERNILLO_DB_URL no definido: modo degradado, sólo almacenamiento local");
    }
    info!(%bind, provincias = estado.catalogo.provincias().len(), "iniciando servidor");
    let datos = web::Data::new(estado);
    HttpServer::new(move || {
        App::new()
            .wrap(Cors::default().allow_any_origin().allow_any_method().allow_any_header())
            .app_data(datos.clone())
            .configure(configurar_rutas)
    })
    .bind(bind.as_str())?
    .run()
    .await
}
