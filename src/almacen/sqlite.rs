use super::esquema::{self, tabla, Tabla, TABLAS};
use super::{AlmacenFilas, Consulta, Fila, Filtro, Seleccionadas};
use crate::catalogo::plegar;
use crate::error::{CuadernilloError, Resultado};
use rusqlite::functions::FunctionFlags;
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{params_from_iter, Connection};
use serde_json::{Number, Value};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

fn a_sql(v: &Value) -> SqlValue {
    match v {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => SqlValue::Real(n.as_f64().unwrap_or(0.0)),
        },
        Value::String(s) => SqlValue::Text(s.clone()),
        otro => SqlValue::Text(otro.to_string()),
    }
}

fn a_json(v: ValueRef<'_>) -> Value {
    match v {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Number(i.into()),
        ValueRef::Real(f) => Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null),
        ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::String(String::from_utf8_lossy(b).into_owned()),
    }
}

/// `WHERE` con búsquedas por contenido sin tildes ni mayúsculas.
fn clausula_where(t: &Tabla, filtro: &Filtro, params: &mut Vec<SqlValue>) -> Resultado<String> {
    let mut tipados = Vec::new();
    let sql = esquema::clausula_where(t, filtro, &mut tipados, '?', |c| format!("plegar({c})"))?;
    params.extend(tipados.iter().map(|p| a_sql(&p.valor)));
    Ok(sql)
}

pub struct SqliteFilas {
    conn: Mutex<Connection>,
}

impl SqliteFilas {
    pub fn abrir(ruta: &Path) -> Resultado<Self> {
        if let Some(dir) = ruta.parent() {
            if !dir.as_os_str().is_empty() && !dir.exists() {
                std::fs::create_dir_all(dir)?;
            }
        }
        let almacen = Self::con_conexion(Connection::open(ruta)?)?;
        info!(ruta = %ruta.display(), "almacén de filas abierto");
        Ok(almacen)
    }

    pub fn en_memoria() -> Resultado<Self> {
        Self::con_conexion(Connection::open_in_memory()?)
    }

    fn con_conexion(conn: Connection) -> Resultado<Self> {
        conn.create_scalar_function(
            "plegar",
            1,
            FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
            |ctx| {
                let texto: Option<String> = ctx.get(0)?;
                Ok(texto.map(|t| plegar(&t)))
            },
        )?;
        for t in TABLAS {
            conn.execute(t.ddl_sqlite, [])?;
        }
        Ok(SqliteFilas { conn: Mutex::new(conn) })
    }

    fn conexion(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|envenenado| envenenado.into_inner())
    }
}

impl AlmacenFilas for SqliteFilas {
    fn insert(&self, nombre: &str, filas: &[Fila]) -> Resultado<()> {
        let t = tabla(nombre)?;
        let conn = self.conexion();
        for fila in filas {
            let mut columnas = Vec::with_capacity(fila.len());
            let mut valores = Vec::with_capacity(fila.len());
            for (c, v) in fila {
                columnas.push(t.columna(c)?);
                valores.push(a_sql(v));
            }
            let sql = if columnas.is_empty() {
                format!("INSERT INTO {} DEFAULT VALUES", t.nombre)
            } else {
                let marcadores: Vec<String> = (1..=columnas.len()).map(|i| format!("?{}", i)).collect();
                format!(
                    "INSERT INTO {} ({}) VALUES ({})",
                    t.nombre,
                    columnas.join(", "),
                    marcadores.join(", ")
                )
            };
            conn.execute(&sql, params_from_iter(valores.iter()))?;
        }
        debug!(tabla = t.nombre, n = filas.len(), "insert");
        Ok(())
    }

    fn select(&self, nombre: &str, consulta: &Consulta) -> Resultado<Seleccionadas> {
        let t = tabla(nombre)?;
        let mut params = Vec::new();
        let where_sql = clausula_where(t, &consulta.filtro, &mut params)?;
        let conn = self.conexion();

        let total: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM {}{}", t.nombre, where_sql),
            params_from_iter(params.iter()),
            |r| r.get(0),
        )?;

        // desempate estable por orden de inserción
        let orden = esquema::clausula_orden(t, &consulta.orden, "rowid ASC")?;
        let mut sql = format!("SELECT * FROM {}{}{}", t.nombre, where_sql, orden);
        if let Some(r) = consulta.rango {
            let limite = r.hasta.saturating_sub(r.desde) + 1;
            sql.push_str(&format!(" LIMIT {} OFFSET {}", limite, r.desde));
        }

        let mut stmt = conn.prepare(&sql)?;
        let columnas: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let mut filas = Vec::new();
        let mut rows = stmt.query(params_from_iter(params.iter()))?;
        while let Some(row) = rows.next()? {
            let mut fila = Fila::new();
            for (i, c) in columnas.iter().enumerate() {
                fila.insert(c.clone(), a_json(row.get_ref(i)?));
            }
            filas.push(fila);
        }
        Ok(Seleccionadas { filas, total: total.max(0) as usize })
    }

    fn upsert(&self, nombre: &str, fila: &Fila, clave_conflicto: &str) -> Resultado<()> {
        let t = tabla(nombre)?;
        t.exigir_unica(clave_conflicto)?;
        if !fila.contains_key(clave_conflicto) {
            return Err(CuadernilloError::validacion(format!("falta la clave '{}' en el upsert", clave_conflicto)));
        }
        let mut columnas = Vec::new();
        let mut valores = Vec::new();
        for (c, v) in fila {
            columnas.push(t.columna(c)?);
            valores.push(a_sql(v));
        }
        let marcadores: Vec<String> = (1..=columnas.len()).map(|i| format!("?{}", i)).collect();
        let actualizar: Vec<String> = columnas
            .iter()
            .filter(|c| **c != clave_conflicto)
            .map(|c| format!("{c} = excluded.{c}"))
            .collect();
        let accion = if actualizar.is_empty() {
            "DO NOTHING".to_string()
        } else {
            format!("DO UPDATE SET {}", actualizar.join(", "))
        };
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT({}) {}",
            t.nombre,
            columnas.join(", "),
            marcadores.join(", "),
            clave_conflicto,
            accion
        );
        self.conexion().execute(&sql, params_from_iter(valores.iter()))?;
        Ok(())
    }

    fn delete(&self, nombre: &str, filtro: &Filtro) -> Resultado<usize> {
        let t = tabla(nombre)?;
        if filtro.es_vacio() {
            return Err(CuadernilloError::validacion("delete sin filtro"));
        }
        let mut params = Vec::new();
        let where_sql = clausula_where(t, filtro, &mut params)?;
        let n = self
            .conexion()
            .execute(&format!("DELETE FROM {}{}", t.nombre, where_sql), params_from_iter(params.iter()))?;
        debug!(tabla = t.nombre, n, "delete");
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::almacen::Orden;
    use serde_json::json;

    fn fila(v: Value) -> Fila {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn tabla_y_columna_desconocidas() {
        let db = SqliteFilas::en_memoria().unwrap();
        assert!(db.insert("usuarios", &[fila(json!({"a": 1}))]).is_err());
        assert!(db.insert("partes", &[fila(json!({"pk": "x", "drop table": 1}))]).is_err());
        assert!(db.select("partes", &Consulta::new(Filtro::new().igual("nope", 1))).is_err());
    }

    #[test]
    fn upsert_sustituye_por_clave() {
        let db = SqliteFilas::en_memoria().unwrap();
        db.upsert("partes", &fila(json!({"pk": "p1", "zona": "Norte", "horas_extras_total": 2.5})), "pk")
            .unwrap();
        db.upsert("partes", &fila(json!({"pk": "p1", "zona": "Sur"})), "pk").unwrap();
        let r = db.select("partes", &Consulta::new(Filtro::new().igual("pk", "p1"))).unwrap();
        assert_eq!(r.total, 1);
        assert_eq!(r.filas[0]["zona"], "Sur");
        // las columnas no enviadas se conservan
        assert_eq!(r.filas[0]["horas_extras_total"], json!(2.5));
        assert!(db.upsert("partes", &fila(json!({"zona": "x"})), "pk").is_err());
        assert!(db.upsert("partes", &fila(json!({"pk": "p2"})), "zona").is_err());
    }

    #[test]
    fn delete_exige_filtro() {
        let db = SqliteFilas::en_memoria().unwrap();
        db.insert("parte_filas", &[fila(json!({"parte_pk": "a", "componente_id": "c"}))]).unwrap();
        assert!(db.delete("parte_filas", &Filtro::new()).is_err());
        assert_eq!(db.delete("parte_filas", &Filtro::new().igual("parte_pk", "a")).unwrap(), 1);
        assert_eq!(db.delete("parte_filas", &Filtro::new().igual("parte_pk", "a")).unwrap(), 0);
    }

    #[test]
    fn busqueda_contiene_rango_y_orden() {
        let db = SqliteFilas::en_memoria().unwrap();
        let filas: Vec<Fila> = ["Unidad de Coria", "Unidad de Plasencia", "Caseta 100%"]
            .iter()
            .map(|u| fila(json!({"session_key": "s", "codigo": "JR", "unidad": u, "fecha": "2025-08-01"})))
            .collect();
        db.insert("cuadernillo", &filas).unwrap();
        db.insert("cuadernillo", &[fila(json!({"session_key": "s", "codigo": "V", "fecha": "2025-08-01"}))])
            .unwrap();

        let c = Consulta::new(Filtro::new().contiene_alguna(&["unidad", "caseta"], "PLASEN"));
        assert_eq!(db.select("cuadernillo", &c).unwrap().total, 1);

        // el % se busca literalmente
        let c = Consulta::new(Filtro::new().contiene_alguna(&["unidad"], "100%"));
        assert_eq!(db.select("cuadernillo", &c).unwrap().total, 1);

        let c = Consulta::new(Filtro::new().igual("fecha", "2025-08-01"))
            .ordenar(Orden::asc("unidad"))
            .rango(0, 1);
        let r = db.select("cuadernillo", &c).unwrap();
        assert_eq!(r.total, 4);
        assert_eq!(r.filas.len(), 2);
        // nulos primero
        assert_eq!(r.filas[0]["unidad"], Value::Null);
        assert_eq!(r.filas[1]["unidad"], "Caseta 100%");
        // valores por defecto rellenados por la tabla
        assert!(r.filas[0]["id"].is_string());
        assert!(r.filas[0]["created_at"].is_string());
    }

    #[test]
    fn busqueda_sin_tildes_ni_mayusculas() {
        let db = SqliteFilas::en_memoria().unwrap();
        let filas: Vec<Fila> = ["Unidad de Cáceres", "Caseta Monfragüe", "Unidad de Coria"]
            .iter()
            .map(|u| fila(json!({"session_key": "s", "codigo": "JR", "unidad": u, "componente_apellidos": "Núñez"})))
            .collect();
        db.insert("cuadernillo", &filas).unwrap();

        for q in ["CÁCERES", "caceres", "Cáceres", "DE CÁC"] {
            let c = Consulta::new(Filtro::new().contiene_alguna(&["unidad"], q));
            assert_eq!(db.select("cuadernillo", &c).unwrap().total, 1, "q = {q:?}");
        }
        let c = Consulta::new(Filtro::new().contiene_alguna(&["unidad", "caseta"], "MONFRAGÜE"));
        assert_eq!(db.select("cuadernillo", &c).unwrap().total, 1);
        let c = Consulta::new(Filtro::new().contiene_alguna(&["componente_apellidos"], "NUÑEZ"));
        assert_eq!(db.select("cuadernillo", &c).unwrap().total, 3);
    }

    #[test]
    fn entre_y_nulos() {
        let db = SqliteFilas::en_memoria().unwrap();
        for (pk, fecha) in [("a", "2025-07-31"), ("b", "2025-08-01"), ("c", "2025-08-31"), ("d", "2025-09-01")] {
            db.upsert("partes", &fila(json!({"pk": pk, "fecha": fecha})), "pk").unwrap();
        }
        db.upsert("partes", &fila(json!({"pk": "e"})), "pk").unwrap();
        let c = Consulta::new(Filtro::new().entre("fecha", "2025-08-01", "2025-08-31"));
        assert_eq!(db.select("partes", &c).unwrap().total, 2);
        let c = Consulta::new(Filtro::new().igual("fecha", Value::Null));
        assert_eq!(db.select("partes", &c).unwrap().filas[0]["pk"], "e");
    }

    #[test]
    fn booleanos_como_enteros() {
        let db = SqliteFilas::en_memoria().unwrap();
        db.insert(
            "parte_filas",
            &[fila(json!({"parte_pk": "p", "componente_id": "c", "abono_df": true, "superior_categoria": false}))],
        )
        .unwrap();
        let r = db.select("parte_filas", &Consulta::default()).unwrap();
        assert_eq!(r.filas[0]["abono_df"], json!(1));
        assert_eq!(r.filas[0]["superior_categoria"], json!(0));
    }
}
