//! Registros planos del cuadernillo (contexto de selección + componente +
//! datos del día), su búsqueda para administración y la exportación a CSV.

use crate::almacen::{a_fila, bool_flexible, AlmacenFilas, Consulta, Filtro, Orden};
use crate::error::{CuadernilloError, Resultado};
use crate::registro::componentes::Componente;
use crate::registro::parte::ParteDiario;
use crate::seleccion::TipoCentro;
use crate::sesion::SeleccionActual;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

pub const TAMANOS_PAGINA: [usize; 3] = [50, 100, 200];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CuadernilloRow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    pub session_key: String,
    #[serde(default)]
    pub provincia: Option<String>,
    #[serde(default)]
    pub zona: Option<String>,
    #[serde(default)]
    pub municipio: Option<String>,
    #[serde(default)]
    pub tipo: Option<TipoCentro>,
    #[serde(default)]
    pub unidad: Option<String>,
    #[serde(default)]
    pub caseta: Option<String>,
    #[serde(default)]
    pub nombre_centro: Option<String>,
    /// `YYYY-MM-DD`
    #[serde(default)]
    pub fecha: Option<String>,
    #[serde(default)]
    pub componente_nombre: Option<String>,
    #[serde(default)]
    pub componente_apellidos: Option<String>,
    #[serde(default)]
    pub componente_numero: Option<String>,
    pub codigo: String,
    #[serde(default, deserialize_with = "bool_flexible")]
    pub abono_df: Option<bool>,
    #[serde(default, deserialize_with = "bool_flexible")]
    pub superior_categoria: Option<bool>,
    #[serde(default)]
    pub jornada_ini: Option<String>,
    #[serde(default)]
    pub jornada_fin: Option<String>,
    #[serde(default)]
    pub horas_extra: Option<f64>,
}

impl CuadernilloRow {
    /// Unidad o caseta según el tipo.
    pub fn centro(&self) -> &str {
        match self.tipo {
            Some(TipoCentro::Unidad) => self.unidad.as_deref().unwrap_or(""),
            Some(TipoCentro::Caseta) => self.caseta.as_deref().unwrap_or(""),
            None => "",
        }
    }
}

/// Fila con el contexto de la selección confirmada y el resto vacío.
pub fn contexto_de_seleccion(sel: &SeleccionActual) -> CuadernilloRow {
    CuadernilloRow {
        session_key: sel.session_key.clone(),
        provincia: sel.provincia.clone(),
        zona: sel.zona.clone(),
        municipio: sel.municipio.clone(),
        tipo: Some(sel.tipo),
        unidad: (sel.tipo == TipoCentro::Unidad).then(|| sel.seleccion.clone()),
        caseta: (sel.tipo == TipoCentro::Caseta).then(|| sel.seleccion.clone()),
        nombre_centro: sel.nombre_centro.clone(),
        fecha: sel.fecha_iso.clone(),
        ..Default::default()
    }
}

/// Una fila por componente con código en el parte del día.
pub fn filas_de_parte(
    sel: &SeleccionActual,
    fecha: NaiveDate,
    parte: &ParteDiario,
    componentes: &[Componente],
) -> Vec<CuadernilloRow> {
    let base = CuadernilloRow { fecha: Some(fecha.format("%Y-%m-%d").to_string()), ..contexto_de_seleccion(sel) };
    let horas = parte.horas_extras();
    parte
        .filas
        .iter()
        .filter_map(|f| {
            let codigo = f.codigo?;
            let c = componentes.iter().find(|c| c.id == f.componente_id);
            Some(CuadernilloRow {
                componente_nombre: c.map(|c| c.nombre.clone()),
                componente_apellidos: c.map(|c| c.apellidos.clone()),
                componente_numero: c.and_then(|c| c.numero.clone()),
                codigo: codigo.como_str().to_string(),
                abono_df: Some(f.abono_df),
                superior_categoria: Some(f.superior_categoria),
                jornada_ini: Some(f.jornada.ini.clone()).filter(|h| !h.is_empty()),
                jornada_fin: Some(f.jornada.fin.clone()).filter(|h| !h.is_empty()),
                horas_extra: horas,
                ..base.clone()
            })
        })
        .collect()
}

pub fn insertar(almacen: &dyn AlmacenFilas, filas: &[CuadernilloRow]) -> Resultado<()> {
    let mut salida = Vec::with_capacity(filas.len());
    for f in filas {
        if f.codigo.trim().is_empty() {
            return Err(CuadernilloError::validacion("el código es obligatorio"));
        }
        if f.session_key.trim().is_empty() {
            return Err(CuadernilloError::validacion("falta el identificador de sesión"));
        }
        salida.push(a_fila(f)?);
    }
    almacen.insert("cuadernillo", &salida)
}

fn decodificar(filas: Vec<crate::almacen::Fila>) -> Resultado<Vec<CuadernilloRow>> {
    filas
        .into_iter()
        .map(|f| serde_json::from_value(Value::Object(f)).map_err(CuadernilloError::from))
        .collect()
}

/// Todos los registros, los más recientes primero.
pub fn listar_todo(almacen: &dyn AlmacenFilas) -> Resultado<Vec<CuadernilloRow>> {
    let r = almacen.select("cuadernillo", &Consulta::default().ordenar(Orden::desc("created_at")))?;
    decodificar(r.filas)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModoBusqueda {
    /// Por unidad o caseta.
    #[default]
    Centro,
    /// Por nombre o apellidos del componente.
    Componente,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BusquedaAdmin {
    pub fecha: NaiveDate,
    pub modo: ModoBusqueda,
    pub q: String,
    /// Página empezando en 0.
    pub pagina: usize,
    pub tamano_pagina: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaginaAdmin {
    pub filas: Vec<CuadernilloRow>,
    pub total: usize,
    pub pagina: usize,
    pub paginas: usize,
}

pub fn buscar(almacen: &dyn AlmacenFilas, b: &BusquedaAdmin) -> Resultado<PaginaAdmin> {
    if !TAMANOS_PAGINA.contains(&b.tamano_pagina) {
        return Err(CuadernilloError::validacion(format!(
            "tamaño de página no permitido: {} (50, 100 o 200)",
            b.tamano_pagina
        )));
    }
    let mut filtro = Filtro::new().igual("fecha", b.fecha.format("%Y-%m-%d").to_string());
    let q = b.q.trim();
    if !q.is_empty() {
        filtro = match b.modo {
            ModoBusqueda::Centro => filtro.contiene_alguna(&["unidad", "caseta"], q),
            ModoBusqueda::Componente => filtro.contiene_alguna(&["componente_nombre", "componente_apellidos"], q),
        };
    }
    let fuera_de_rango = || CuadernilloError::validacion(format!("página fuera de rango: {}", b.pagina));
    let desde = b.pagina.checked_mul(b.tamano_pagina).ok_or_else(fuera_de_rango)?;
    let hasta = desde.checked_add(b.tamano_pagina - 1).ok_or_else(fuera_de_rango)?;
    if i64::try_from(hasta).is_err() {
        return Err(fuera_de_rango());
    }
    let consulta = Consulta::new(filtro)
        .ordenar(Orden::asc("tipo"))
        .ordenar(Orden::asc("unidad"))
        .ordenar(Orden::asc("caseta"))
        .ordenar(Orden::asc("componente_apellidos"))
        .rango(desde, hasta);
    let r = almacen.select("cuadernillo", &consulta)?;
    debug!(total = r.total, pagina = b.pagina, "búsqueda de administración");
    Ok(PaginaAdmin {
        filas: decodificar(r.filas)?,
        total: r.total,
        pagina: b.pagina,
        paginas: r.total.div_ceil(b.tamano_pagina).max(1),
    })
}

const CABECERA_CSV: [&str; 9] = [
    "fecha",
    "unidad_caseta",
    "componente_nombre",
    "componente_apellidos",
    "componente_numero",
    "codigo",
    "jornada_ini",
    "jornada_fin",
    "horas_extra",
];

fn campo_csv(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

/// CSV con cabecera fija; todos los campos entre comillas.
pub fn exportar_csv(filas: &[CuadernilloRow]) -> String {
    let mut lineas = vec![CABECERA_CSV.join(",")];
    for r in filas {
        let horas = r.horas_extra.map(|h| h.to_string()).unwrap_or_default();
        let campos = [
            r.fecha.as_deref().unwrap_or(""),
            r.centro(),
            r.componente_nombre.as_deref().unwrap_or(""),
            r.componente_apellidos.as_deref().unwrap_or(""),
            r.componente_numero.as_deref().unwrap_or(""),
            r.codigo.as_str(),
            r.jornada_ini.as_deref().unwrap_or(""),
            r.jornada_fin.as_deref().unwrap_or(""),
            horas.as_str(),
        ];
        lineas.push(campos.iter().map(|c| campo_csv(c)).collect::<Vec<_>>().join(","));
    }
    lineas.join("\n")
}

pub fn nombre_archivo_csv(fecha: NaiveDate, pagina: usize) -> String {
    format!("cuadernillo_{}_p{}.csv", fecha.format("%Y-%m-%d"), pagina + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sel(tipo: TipoCentro) -> SeleccionActual {
        SeleccionActual {
            session_key: "s-1".into(),
            provincia: Some("Cáceres".into()),
            zona: Some("Zona Norte".into()),
            municipio: Some("Plasencia".into()),
            tipo,
            seleccion: "Caseta Valcorchero".into(),
            nombre_centro: Some("Caseta Valcorchero".into()),
            fecha_iso: Some("2025-08-01".into()),
        }
    }

    #[test]
    fn contexto_reparte_unidad_o_caseta() {
        let r = contexto_de_seleccion(&sel(TipoCentro::Caseta));
        assert_eq!(r.caseta.as_deref(), Some("Caseta Valcorchero"));
        assert!(r.unidad.is_none());
        assert_eq!(r.centro(), "Caseta Valcorchero");
        let r = contexto_de_seleccion(&sel(TipoCentro::Unidad));
        assert!(r.caseta.is_none());
        assert_eq!(r.centro(), "Caseta Valcorchero");
    }

    #[test]
    fn csv_escapa_comillas() {
        let mut r = contexto_de_seleccion(&sel(TipoCentro::Unidad));
        r.codigo = "JR".into();
        r.componente_apellidos = Some("O\"Donnell".into());
        r.horas_extra = Some(1.5);
        let csv = exportar_csv(&[r]);
        let mut lineas = csv.lines();
        assert_eq!(
            lineas.next().unwrap(),
            "fecha,unidad_caseta,componente_nombre,componente_apellidos,componente_numero,codigo,jornada_ini,jornada_fin,horas_extra"
        );
        assert_eq!(
            lineas.next().unwrap(),
            "\"2025-08-01\",\"Caseta Valcorchero\",\"\",\"O\"\"Donnell\",\"\",\"JR\",\"\",\"\",\"1.5\""
        );
    }

    #[test]
    fn filas_desde_el_parte() {
        use crate::registro::parte::{CodigoParte, ParteFila, Tramo};
        let a = Componente::nuevo("Luis", "García", Some("017")).unwrap();
        let b = Componente::nuevo("María", "Santos", None).unwrap();
        let mut fa = ParteFila::vacia(&a.id);
        fa.codigo = Some(CodigoParte::JR);
        fa.abono_df = true;
        fa.jornada = Tramo { ini: "08:00".into(), fin: "".into() };
        let parte = ParteDiario { filas: vec![fa, ParteFila::vacia(&b.id)], horas_extras_total: "1,5".into() };
        let f = NaiveDate::from_ymd_opt(2025, 8, 2).unwrap();
        let filas = filas_de_parte(&sel(TipoCentro::Caseta), f, &parte, &[a, b]);
        assert_eq!(filas.len(), 1);
        assert_eq!(filas[0].fecha.as_deref(), Some("2025-08-02"));
        assert_eq!(filas[0].componente_numero.as_deref(), Some("017"));
        assert_eq!(filas[0].codigo, "JR");
        assert_eq!(filas[0].abono_df, Some(true));
        assert_eq!(filas[0].jornada_ini.as_deref(), Some("08:00"));
        assert_eq!(filas[0].jornada_fin, None);
        assert_eq!(filas[0].horas_extra, Some(1.5));
    }

    #[test]
    fn pagina_enorme_es_error_de_validacion() {
        let db = crate::almacen::SqliteFilas::en_memoria().unwrap();
        let fecha = NaiveDate::from_ymd_opt(2025, 8, 1).unwrap();
        for pagina in [usize::MAX / 50 + 1, usize::MAX, (i64::MAX as usize) / 50 + 1] {
            let b = BusquedaAdmin { fecha, modo: ModoBusqueda::Centro, q: String::new(), pagina, tamano_pagina: 50 };
            assert!(matches!(buscar(&db, &b), Err(CuadernilloError::Validacion(_))), "página {pagina}");
        }
        let b = BusquedaAdmin { fecha, modo: ModoBusqueda::Centro, q: String::new(), pagina: 3, tamano_pagina: 50 };
        assert!(buscar(&db, &b).unwrap().filas.is_empty());
    }

    #[test]
    fn nombre_del_csv() {
        let f = NaiveDate::from_ymd_opt(2025, 8, 1).unwrap();
        assert_eq!(nombre_archivo_csv(f, 0), "cuadernillo_2025-08-01_p1.csv");
    }
}
