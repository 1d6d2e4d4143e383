use chrono::NaiveDate;
use cuadernillo::almacen::{AlmacenFilas, SqliteFilas};
use cuadernillo::debounce::Debouncer;
use cuadernillo::registro::componentes;
use cuadernillo::registro::cuadernillo::{
    buscar, contexto_de_seleccion, exportar_csv, insertar, listar_todo, BusquedaAdmin, CuadernilloRow, ModoBusqueda,
};
use cuadernillo::registro::parte::{self, CodigoParte, Guardado, ParteDiario, ParteFila, Tramo};
use cuadernillo::sesion::kv::KvSqlite;
use cuadernillo::sesion::{ContextoSesion, SeleccionActual};
use cuadernillo::TipoCentro;
use std::sync::Arc;
use std::time::Duration;

fn seleccion(tipo: TipoCentro, centro: &str) -> SeleccionActual {
    SeleccionActual {
        session_key: "sesion-1".into(),
        provincia: Some("Cáceres".into()),
        zona: Some("Zona Norte".into()),
        municipio: Some("Plasencia".into()),
        tipo,
        seleccion: centro.into(),
        nombre_centro: Some("Plasencia".into()),
        fecha_iso: Some("2025-08-01".into()),
    }
}

fn fila(sel: &SeleccionActual, apellidos: &str, codigo: &str) -> CuadernilloRow {
    CuadernilloRow {
        componente_nombre: Some("Ana".into()),
        componente_apellidos: Some(apellidos.into()),
        codigo: codigo.into(),
        ..contexto_de_seleccion(sel)
    }
}

#[test]
fn test_sqlite_en_fichero_persiste() {
    let dir = tempfile::tempdir().unwrap();
    let ruta = dir.path().join("remoto.sqlite");
    let sel = seleccion(TipoCentro::Unidad, "Unidad de Plasencia");
    {
        let db = SqliteFilas::abrir(&ruta).unwrap();
        insertar(&db, &[fila(&sel, "García", "JR")]).unwrap();
    }
    let db = SqliteFilas::abrir(&ruta).unwrap();
    let filas = listar_todo(&db).unwrap();
    assert_eq!(filas.len(), 1);
    assert!(filas[0].id.is_some());
    assert!(filas[0].created_at.is_some());
    assert_eq!(filas[0].unidad.as_deref(), Some("Unidad de Plasencia"));
    assert_eq!(filas[0].caseta, None);
}

#[test]
fn test_insertar_exige_codigo() {
    let db = SqliteFilas::en_memoria().unwrap();
    let sel = seleccion(TipoCentro::Unidad, "Unidad de Plasencia");
    assert!(insertar(&db, &[fila(&sel, "García", "  ")]).is_err());
    assert!(listar_todo(&db).unwrap().is_empty());
}

#[test]
fn test_busqueda_admin_paginada_y_ordenada() {
    let db = SqliteFilas::en_memoria().unwrap();
    let unidad = seleccion(TipoCentro::Unidad, "Unidad de Plasencia");
    let caseta = seleccion(TipoCentro::Caseta, "Caseta Valcorchero");

    let mut filas = Vec::new();
    for i in 0..120 {
        filas.push(fila(&unidad, &format!("Apellido{:03}", i), "JR"));
    }
    filas.push(fila(&caseta, "Zapata", "TH"));
    let mut sin_apellidos = fila(&caseta, "", "V");
    sin_apellidos.componente_apellidos = None;
    filas.push(sin_apellidos);
    let mut otro_dia = fila(&unidad, "Ruiz", "B");
    otro_dia.fecha = Some("2025-08-02".into());
    filas.push(otro_dia);
    insertar(&db, &filas).unwrap();

    let fecha = NaiveDate::from_ymd_opt(2025, 8, 1).unwrap();
    let mut b = BusquedaAdmin { fecha, modo: ModoBusqueda::Centro, q: String::new(), pagina: 0, tamano_pagina: 50 };
    let p0 = buscar(&db, &b).unwrap();
    assert_eq!(p0.total, 122);
    assert_eq!(p0.paginas, 3);
    assert_eq!(p0.filas.len(), 50);
    // "caseta" < "unidad" y, dentro de la caseta, los apellidos nulos primero
    assert_eq!(p0.filas[0].componente_apellidos, None);
    assert_eq!(p0.filas[1].componente_apellidos.as_deref(), Some("Zapata"));
    assert_eq!(p0.filas[2].componente_apellidos.as_deref(), Some("Apellido000"));

    b.pagina = 2;
    let p2 = buscar(&db, &b).unwrap();
    assert_eq!(p2.filas.len(), 22);

    b.pagina = 0;
    b.q = "valcorch".into();
    assert_eq!(buscar(&db, &b).unwrap().total, 2);

    b.modo = ModoBusqueda::Componente;
    b.q = "apellido11".into();
    assert_eq!(buscar(&db, &b).unwrap().total, 10);

    b.tamano_pagina = 75;
    assert!(buscar(&db, &b).is_err());
}

#[test]
fn test_csv_de_una_pagina() {
    let db = SqliteFilas::en_memoria().unwrap();
    let sel = seleccion(TipoCentro::Caseta, "Caseta \"La Vera\"");
    insertar(&db, &[fila(&sel, "Navas", "TC")]).unwrap();
    let fecha = NaiveDate::from_ymd_opt(2025, 8, 1).unwrap();
    let b = BusquedaAdmin { fecha, modo: ModoBusqueda::Centro, q: String::new(), pagina: 0, tamano_pagina: 100 };
    let csv = exportar_csv(&buscar(&db, &b).unwrap().filas);
    let lineas: Vec<&str> = csv.lines().collect();
    assert_eq!(lineas.len(), 2);
    assert!(lineas[1].starts_with("\"2025-08-01\",\"Caseta \"\"La Vera\"\"\",\"Ana\",\"Navas\""));
}

#[test]
fn test_plantilla_en_kv_sqlite() {
    let dir = tempfile::tempdir().unwrap();
    let ruta = dir.path().join("local.sqlite");
    let id = {
        let ctx = ContextoSesion::new(Arc::new(KvSqlite::abrir(&ruta).unwrap()));
        componentes::crear(&ctx, "Luis", "García", None).unwrap().id
    };
    let ctx = ContextoSesion::new(Arc::new(KvSqlite::abrir(&ruta).unwrap()));
    let lista = ctx.componentes().unwrap();
    assert_eq!(lista.len(), 1);
    assert_eq!(lista[0].id, id);
}

#[tokio::test]
async fn test_parte_se_sincroniza_tras_el_retardo() {
    let ctx = ContextoSesion::en_memoria();
    let db: Arc<dyn AlmacenFilas> = Arc::new(SqliteFilas::en_memoria().unwrap());
    let debouncer = Debouncer::new(Duration::from_millis(30));
    let sel = seleccion(TipoCentro::Unidad, "Unidad de Plasencia");
    let fecha = NaiveDate::from_ymd_opt(2025, 8, 1).unwrap();
    let pk = parte::clave_parte(Some(&sel), fecha);
    assert_eq!(pk, "2025-08-01:unidad:Unidad de Plasencia");

    let mut f = ParteFila::vacia("c1");
    f.codigo = Some(CodigoParte::JR);
    f.abono_df = true;
    f.jornada = Tramo { ini: "08:00".into(), fin: "15:00".into() };
    let mut p = ParteDiario { filas: vec![f], horas_extras_total: "1".into() };

    // varias ediciones seguidas: sólo la última llega al backend
    for horas in ["1", "2", "2,5"] {
        p.horas_extras_total = horas.into();
        let r = parte::guardar(&ctx, Some(&db), &debouncer, Some(&sel), fecha, &p).unwrap();
        assert_eq!(r, Guardado::Programado);
    }
    // la copia local ya está
    assert_eq!(ctx.parte_local(&pk).unwrap(), Some(p.clone()));
    assert!(parte::cargar_remoto(db.as_ref(), &pk).unwrap().is_none());

    tokio::time::sleep(Duration::from_millis(300)).await;
    let remoto = parte::cargar_remoto(db.as_ref(), &pk).unwrap().unwrap();
    assert_eq!(remoto.filas, p.filas);
    assert_eq!(remoto.horas_extras(), Some(2.5));

    // una segunda escritura sustituye las filas, no las acumula
    p.filas.push(ParteFila::vacia("c2"));
    parte::guardar(&ctx, Some(&db), &debouncer, Some(&sel), fecha, &p).unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(parte::cargar_remoto(db.as_ref(), &pk).unwrap().unwrap().filas.len(), 2);
}

#[test]
fn test_parte_sin_backend_es_solo_local() {
    let ctx = ContextoSesion::en_memoria();
    let debouncer = Debouncer::new(Duration::from_millis(10));
    let fecha = NaiveDate::from_ymd_opt(2025, 8, 1).unwrap();
    let p = ParteDiario::default();
    let r = parte::guardar(&ctx, None, &debouncer, None, fecha, &p).unwrap();
    assert_eq!(r, Guardado::SoloLocal);
    assert_eq!(ctx.parte_local("2025-08-01:NA:SIN").unwrap(), Some(p));
    assert_eq!(debouncer.pendientes(), 0);
}
