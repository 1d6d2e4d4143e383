//! Esquema común a los backends: tablas, columnas con su tipo y DDL de cada
//! motor. Sólo se interpolan en SQL nombres que aparecen aquí.

use super::{Condicion, Filtro};
use crate::error::{CuadernilloError, Resultado};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tipo {
    Texto,
    Entero,
    Real,
}

pub struct Tabla {
    pub nombre: &'static str,
    pub columnas: &'static [(&'static str, Tipo)],
    /// Columnas válidas como clave de conflicto en `upsert`.
    pub unicas: &'static [&'static str],
    pub ddl_sqlite: &'static str,
    pub ddl_postgres: &'static str,
}

use Tipo::{Entero, Real, Texto};

pub const TABLAS: &[Tabla] = &[
    Tabla {
        nombre: "cuadernillo",
        columnas: &[
            ("id", Texto),
            ("created_at", Texto),
            ("session_key", Texto),
            ("provincia", Texto),
            ("zona", Texto),
            ("municipio", Texto),
            ("tipo", Texto),
            ("unidad", Texto),
            ("caseta", Texto),
            ("nombre_centro", Texto),
            ("fecha", Texto),
            ("componente_nombre", Texto),
            ("componente_apellidos", Texto),
            ("componente_numero", Texto),
            ("codigo", Texto),
            ("abono_df", Entero),
            ("superior_categoria", Entero),
            ("jornada_ini", Texto),
            ("jornada_fin", Texto),
            ("horas_extra", Real),
        ],
        unicas: &["id"],
        ddl_sqlite: "CREATE TABLE IF NOT EXISTS cuadernillo (
                id TEXT PRIMARY KEY DEFAULT (lower(hex(randomblob(16)))),
                created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                session_key TEXT NOT NULL,
                provincia TEXT,
                zona TEXT,
                municipio TEXT,
                tipo TEXT,
                unidad TEXT,
                caseta TEXT,
                nombre_centro TEXT,
                fecha TEXT,
                componente_nombre TEXT,
                componente_apellidos TEXT,
                componente_numero TEXT,
                codigo TEXT NOT NULL,
                abono_df INTEGER,
                superior_categoria INTEGER,
                jornada_ini TEXT,
                jornada_fin TEXT,
                horas_extra REAL
            )",
        ddl_postgres: "CREATE TABLE IF NOT EXISTS cuadernillo (
                id TEXT PRIMARY KEY DEFAULT md5(random()::text || clock_timestamp()::text),
                created_at TEXT NOT NULL DEFAULT to_char(now() AT TIME ZONE 'utc', 'YYYY-MM-DD\"T\"HH24:MI:SS.MS\"Z\"'),
                session_key TEXT NOT NULL,
                provincia TEXT,
                zona TEXT,
                municipio TEXT,
                tipo TEXT,
                unidad TEXT,
                caseta TEXT,
                nombre_centro TEXT,
                fecha TEXT,
                componente_nombre TEXT,
                componente_apellidos TEXT,
                componente_numero TEXT,
                codigo TEXT NOT NULL,
                abono_df BIGINT,
                superior_categoria BIGINT,
                jornada_ini TEXT,
                jornada_fin TEXT,
                horas_extra DOUBLE PRECISION
            )",
    },
    Tabla {
        nombre: "partes",
        columnas: &[
            ("pk", Texto),
            ("fecha", Texto),
            ("zona", Texto),
            ("municipio", Texto),
            ("tipo", Texto),
            ("unidad", Texto),
            ("caseta", Texto),
            ("nombre_centro", Texto),
            ("horas_extras_total", Real),
        ],
        unicas: &["pk"],
        ddl_sqlite: "CREATE TABLE IF NOT EXISTS partes (
                pk TEXT PRIMARY KEY,
                fecha TEXT,
                zona TEXT,
                municipio TEXT,
                tipo TEXT,
                unidad TEXT,
                caseta TEXT,
                nombre_centro TEXT,
                horas_extras_total REAL
            )",
        ddl_postgres: "CREATE TABLE IF NOT EXISTS partes (
                pk TEXT PRIMARY KEY,
                fecha TEXT,
                zona TEXT,
                municipio TEXT,
                tipo TEXT,
                unidad TEXT,
                caseta TEXT,
                nombre_centro TEXT,
                horas_extras_total DOUBLE PRECISION
            )",
    },
    Tabla {
        nombre: "parte_filas",
        columnas: &[
            ("id", Entero),
            ("parte_pk", Texto),
            ("componente_id", Texto),
            ("codigo", Texto),
            ("abono_df", Entero),
            ("superior_categoria", Entero),
            ("jornada_ini", Texto),
            ("jornada_fin", Texto),
            ("salida_ini", Texto),
            ("salida_fin", Texto),
        ],
        unicas: &["id"],
        ddl_sqlite: "CREATE TABLE IF NOT EXISTS parte_filas (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                parte_pk TEXT NOT NULL,
                componente_id TEXT NOT NULL,
                codigo TEXT,
                abono_df INTEGER,
                superior_categoria INTEGER,
                jornada_ini TEXT,
                jornada_fin TEXT,
                salida_ini TEXT,
                salida_fin TEXT
            )",
        ddl_postgres: "CREATE TABLE IF NOT EXISTS parte_filas (
                id BIGSERIAL PRIMARY KEY,
                parte_pk TEXT NOT NULL,
                componente_id TEXT NOT NULL,
                codigo TEXT,
                abono_df BIGINT,
                superior_categoria BIGINT,
                jornada_ini TEXT,
                jornada_fin TEXT,
                salida_ini TEXT,
                salida_fin TEXT
            )",
    },
    Tabla {
        nombre: "incendios",
        columnas: &[
            ("id", Texto),
            ("created_at", Texto),
            ("parte_pk", Texto),
            ("termino_municipal", Texto),
            ("h_movilizacion", Texto),
            ("h_salida", Texto),
            ("h_llegada_inc", Texto),
            ("h_regreso", Texto),
            ("h_llegada_base", Texto),
            ("num_componentes", Entero),
        ],
        unicas: &["id"],
        ddl_sqlite: "CREATE TABLE IF NOT EXISTS incendios (
                id TEXT PRIMARY KEY DEFAULT (lower(hex(randomblob(16)))),
                created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                parte_pk TEXT NOT NULL,
                termino_municipal TEXT,
                h_movilizacion TEXT,
                h_salida TEXT,
                h_llegada_inc TEXT,
                h_regreso TEXT,
                h_llegada_base TEXT,
                num_componentes INTEGER
            )",
        ddl_postgres: "CREATE TABLE IF NOT EXISTS incendios (
                id TEXT PRIMARY KEY DEFAULT md5(random()::text || clock_timestamp()::text),
                created_at TEXT NOT NULL DEFAULT to_char(now() AT TIME ZONE 'utc', 'YYYY-MM-DD\"T\"HH24:MI:SS.MS\"Z\"'),
                parte_pk TEXT NOT NULL,
                termino_municipal TEXT,
                h_movilizacion TEXT,
                h_salida TEXT,
                h_llegada_inc TEXT,
                h_regreso TEXT,
                h_llegada_base TEXT,
                num_componentes BIGINT
            )",
    },
];

pub fn tabla(nombre: &str) -> Resultado<&'static Tabla> {
    TABLAS
        .iter()
        .find(|t| t.nombre == nombre)
        .ok_or_else(|| CuadernilloError::validacion(format!("tabla desconocida: '{}'", nombre)))
}

impl Tabla {
    pub fn columna<'a>(&self, c: &'a str) -> Resultado<&'a str> {
        self.tipo(c).map(|_| c)
    }

    pub fn tipo(&self, c: &str) -> Resultado<Tipo> {
        self.columnas
            .iter()
            .find(|(nombre, _)| *nombre == c)
            .map(|(_, t)| *t)
            .ok_or_else(|| {
                CuadernilloError::validacion(format!("columna desconocida '{}' en la tabla '{}'", c, self.nombre))
            })
    }

    pub fn exigir_unica(&self, clave: &str) -> Resultado<()> {
        if self.unicas.contains(&clave) {
            Ok(())
        } else {
            Err(CuadernilloError::validacion(format!("'{}' no es una clave única de '{}'", clave, self.nombre)))
        }
    }
}

/// Parámetro de una consulta, con el tipo de la columna a la que va.
#[derive(Debug, Clone, PartialEq)]
pub struct Parametro {
    pub valor: Value,
    pub tipo: Tipo,
}

/// Traduce un filtro a `WHERE ...`. `marca` es el prefijo de los parámetros
/// numerados (`?` en SQLite, `$` en Postgres) y `plegar` envuelve cada
/// columna de texto en una búsqueda por contenido.
pub fn clausula_where(
    t: &Tabla,
    filtro: &Filtro,
    params: &mut Vec<Parametro>,
    marca: char,
    plegar: impl Fn(&str) -> String,
) -> Resultado<String> {
    if filtro.es_vacio() {
        return Ok(String::new());
    }
    let mut partes = Vec::new();
    for cond in &filtro.condiciones {
        match cond {
            Condicion::Igual(c, Value::Null) => partes.push(format!("{} IS NULL", t.columna(c)?)),
            Condicion::Igual(c, v) => {
                params.push(Parametro { valor: v.clone(), tipo: t.tipo(c)? });
                partes.push(format!("{} = {}{}", c, marca, params.len()));
            }
            Condicion::Entre(c, desde, hasta) => {
                let tipo = t.tipo(c)?;
                params.push(Parametro { valor: desde.clone(), tipo });
                let i = params.len();
                params.push(Parametro { valor: hasta.clone(), tipo });
                partes.push(format!("{c} >= {marca}{} AND {c} <= {marca}{}", i, i + 1));
            }
            Condicion::ContieneAlguna(cols, texto) => {
                if cols.is_empty() {
                    return Err(CuadernilloError::validacion("búsqueda sin columnas"));
                }
                params.push(Parametro {
                    valor: Value::String(patron_like(&crate::catalogo::plegar(texto))),
                    tipo: Tipo::Texto,
                });
                let i = params.len();
                let mut alternativas = Vec::new();
                for c in cols {
                    if t.tipo(c)? != Tipo::Texto {
                        return Err(CuadernilloError::validacion(format!("'{}' no es una columna de texto", c)));
                    }
                    alternativas.push(format!("{} LIKE {}{} ESCAPE '\\'", plegar(c), marca, i));
                }
                partes.push(format!("({})", alternativas.join(" OR ")));
            }
        }
    }
    Ok(format!(" WHERE {}", partes.join(" AND ")))
}

/// `%texto%` con `%`, `_` y `\` escapados.
fn patron_like(texto: &str) -> String {
    let mut s = String::with_capacity(texto.len() + 2);
    s.push('%');
    for c in texto.chars() {
        if matches!(c, '%' | '_' | '\\') {
            s.push('\\');
        }
        s.push(c);
    }
    s.push('%');
    s
}

/// Cláusula `ORDER BY` común; `desempate` se añade al final.
pub fn clausula_orden(t: &Tabla, orden: &[super::Orden], desempate: &str) -> Resultado<String> {
    let mut partes = Vec::new();
    for o in orden {
        let c = t.columna(&o.columna)?;
        let nulos = if o.nulos_primero { "DESC" } else { "ASC" };
        let dir = if o.ascendente { "ASC" } else { "DESC" };
        partes.push(format!("({c} IS NULL) {nulos}, {c} {dir}"));
    }
    partes.push(desempate.to_string());
    Ok(format!(" ORDER BY {}", partes.join(", ")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn where_con_marcas_de_cada_motor() {
        let t = tabla("cuadernillo").unwrap();
        let f = Filtro::new().igual("fecha", "2025-08-01").contiene_alguna(&["unidad", "caseta"], "CÁCERES_1");
        let mut params = Vec::new();
        let sql = clausula_where(t, &f, &mut params, '$', |c| format!("f({c})")).unwrap();
        assert_eq!(sql, " WHERE fecha = $1 AND (f(unidad) LIKE $2 ESCAPE '\\' OR f(caseta) LIKE $2 ESCAPE '\\')");
        assert_eq!(params[1].valor, Value::String("%caceres\\_1%".into()));
    }

    #[test]
    fn contiene_solo_en_texto() {
        let t = tabla("cuadernillo").unwrap();
        let f = Filtro::new().contiene_alguna(&["horas_extra"], "1");
        assert!(clausula_where(t, &f, &mut Vec::new(), '?', |c| c.to_string()).is_err());
        let f = Filtro::new().contiene_alguna(&[], "1");
        assert!(clausula_where(t, &f, &mut Vec::new(), '?', |c| c.to_string()).is_err());
    }

    #[test]
    fn columnas_y_claves() {
        let t = tabla("partes").unwrap();
        assert_eq!(t.tipo("horas_extras_total").unwrap(), Tipo::Real);
        assert!(t.columna("drop table").is_err());
        assert!(t.exigir_unica("pk").is_ok());
        assert!(t.exigir_unica("zona").is_err());
        assert!(tabla("usuarios").is_err());
    }
}
