//! Backend remoto sobre Postgres (`CUADERNILLO_DB_URL=postgres://...`).
//!
//! El cliente `postgres` es síncrono y arranca su propio runtime, así que
//! cada operación abre la conexión en un hilo aparte y no dentro del runtime
//! de actix/tokio.

use super::esquema::{self, tabla, Parametro, Tabla, Tipo, TABLAS};
use super::{AlmacenFilas, Consulta, Fila, Filtro, Seleccionadas};
use crate::error::{CuadernilloError, Resultado};
use postgres::types::ToSql;
use postgres::{Client, NoTls, Row};
use serde_json::{Number, Value};
use tracing::{debug, info};

/// Tildes y eñes que se pliegan en las búsquedas por contenido.
const CON_TILDE: &str = "ÁÀÂÄÉÈÊËÍÌÎÏÓÒÔÖÚÙÛÜÑÇáàâäéèêëíìîïóòôöúùûüñç";
const SIN_TILDE: &str = "AAAAEEEEIIIIOOOOUUUUNCaaaaeeeeiiiioooouuuunc";

type Param = Box<dyn ToSql + Sync>;

fn plegar_columna(c: &str) -> String {
    format!("lower(translate({c}, '{CON_TILDE}', '{SIN_TILDE}'))")
}

fn a_pg(v: &Value, tipo: Tipo) -> Resultado<Param> {
    let incompatible = || CuadernilloError::validacion(format!("valor {} no válido para una columna {:?}", v, tipo));
    let p: Param = match (tipo, v) {
        (Tipo::Texto, Value::Null) => Box::new(None::<String>),
        (Tipo::Texto, Value::String(s)) => Box::new(Some(s.clone())),
        (Tipo::Texto, otro) => Box::new(Some(otro.to_string())),
        (Tipo::Entero, Value::Null) => Box::new(None::<i64>),
        (Tipo::Entero, Value::Bool(b)) => Box::new(Some(i64::from(*b))),
        (Tipo::Entero, Value::Number(n)) => Box::new(Some(n.as_i64().ok_or_else(incompatible)?)),
        (Tipo::Entero, Value::String(s)) => Box::new(Some(s.trim().parse::<i64>().map_err(|_| incompatible())?)),
        (Tipo::Real, Value::Null) => Box::new(None::<f64>),
        (Tipo::Real, Value::Number(n)) => Box::new(Some(n.as_f64().ok_or_else(incompatible)?)),
        (Tipo::Real, Value::String(s)) => {
            Box::new(Some(s.trim().replace(',', ".").parse::<f64>().map_err(|_| incompatible())?))
        }
        _ => return Err(incompatible()),
    };
    Ok(p)
}

fn a_params(params: &[Parametro]) -> Resultado<Vec<Param>> {
    params.iter().map(|p| a_pg(&p.valor, p.tipo)).collect()
}

fn referencias(params: &[Param]) -> Vec<&(dyn ToSql + Sync)> {
    params.iter().map(|p| &**p as &(dyn ToSql + Sync)).collect()
}

fn a_json(fila: &Row, i: usize, tipo: Tipo) -> Resultado<Value> {
    Ok(match tipo {
        Tipo::Texto => fila.try_get::<_, Option<String>>(i)?.map(Value::String).unwrap_or(Value::Null),
        Tipo::Entero => fila
            .try_get::<_, Option<i64>>(i)?
            .map(|n| Value::Number(n.into()))
            .unwrap_or(Value::Null),
        Tipo::Real => fila
            .try_get::<_, Option<f64>>(i)?
            .and_then(Number::from_f64)
            .map(Value::Number)
            .unwrap_or(Value::Null),
    })
}

/// Sentencias de conteo y de lectura para una consulta, con sus parámetros.
fn sentencias_select(t: &Tabla, consulta: &Consulta) -> Resultado<(String, String, Vec<Parametro>)> {
    let mut params = Vec::new();
    let where_sql = esquema::clausula_where(t, &consulta.filtro, &mut params, '$', plegar_columna)?;
    let desempate = t.unicas.first().map(|c| format!("{c} ASC")).unwrap_or_else(|| "1".to_string());
    let orden = esquema::clausula_orden(t, &consulta.orden, &desempate)?;
    let columnas: Vec<&str> = t.columnas.iter().map(|(c, _)| *c).collect();

    let conteo = format!("SELECT COUNT(*) FROM {}{}", t.nombre, where_sql);
    let mut lectura = format!("SELECT {} FROM {}{}{}", columnas.join(", "), t.nombre, where_sql, orden);
    if let Some(r) = consulta.rango {
        let limite = r.hasta.saturating_sub(r.desde) + 1;
        lectura.push_str(&format!(" LIMIT {} OFFSET {}", limite, r.desde));
    }
    Ok((conteo, lectura, params))
}

/// `INSERT` de una fila; sin columnas usa los valores por defecto.
fn sentencia_insert(t: &Tabla, fila: &Fila) -> Resultado<(String, Vec<Parametro>)> {
    let mut columnas = Vec::with_capacity(fila.len());
    let mut params = Vec::with_capacity(fila.len());
    for (c, v) in fila {
        params.push(Parametro { valor: v.clone(), tipo: t.tipo(c)? });
        columnas.push(c.as_str());
    }
    if columnas.is_empty() {
        return Ok((format!("INSERT INTO {} DEFAULT VALUES", t.nombre), params));
    }
    let marcadores: Vec<String> = (1..=columnas.len()).map(|i| format!("${}", i)).collect();
    Ok((
        format!("INSERT INTO {} ({}) VALUES ({})", t.nombre, columnas.join(", "), marcadores.join(", ")),
        params,
    ))
}

fn sentencia_upsert(t: &Tabla, fila: &Fila, clave_conflicto: &str) -> Resultado<(String, Vec<Parametro>)> {
    t.exigir_unica(clave_conflicto)?;
    if !fila.contains_key(clave_conflicto) {
        return Err(CuadernilloError::validacion(format!("falta la clave '{}' en el upsert", clave_conflicto)));
    }
    let (insert, params) = sentencia_insert(t, fila)?;
    let actualizar: Vec<String> = fila
        .keys()
        .filter(|c| c.as_str() != clave_conflicto)
        .map(|c| format!("{c} = EXCLUDED.{c}"))
        .collect();
    let accion = if actualizar.is_empty() {
        "DO NOTHING".to_string()
    } else {
        format!("DO UPDATE SET {}", actualizar.join(", "))
    };
    Ok((format!("{} ON CONFLICT ({}) {}", insert, clave_conflicto, accion), params))
}

pub struct PostgresFilas {
    url: String,
}

impl PostgresFilas {
    /// Comprueba la conexión y crea las tablas que falten.
    pub fn abrir(url: &str) -> Resultado<Self> {
        let almacen = PostgresFilas { url: url.to_string() };
        almacen.con_cliente(|cliente| {
            for t in TABLAS {
                cliente.batch_execute(t.ddl_postgres)?;
            }
            Ok(())
        })?;
        info!("backend Postgres listo");
        Ok(almacen)
    }

    fn con_cliente<T, F>(&self, operacion: F) -> Resultado<T>
    where
        F: FnOnce(&mut Client) -> Resultado<T> + Send,
        T: Send,
    {
        let url = self.url.as_str();
        std::thread::scope(|s| {
            s.spawn(move || {
                let mut cliente = Client::connect(url, NoTls)?;
                operacion(&mut cliente)
            })
            .join()
            .unwrap_or_else(|_| Err(CuadernilloError::Remoto("el hilo de Postgres terminó con un pánico".into())))
        })
    }
}

impl AlmacenFilas for PostgresFilas {
    fn insert(&self, nombre: &str, filas: &[Fila]) -> Resultado<()> {
        let t = tabla(nombre)?;
        let sentencias = filas.iter().map(|f| sentencia_insert(t, f)).collect::<Resultado<Vec<_>>>()?;
        self.con_cliente(|cliente| {
            let mut tx = cliente.transaction()?;
            for (sql, params) in &sentencias {
                let params = a_params(params)?;
                tx.execute(sql.as_str(), &referencias(&params))?;
            }
            tx.commit()?;
            Ok(())
        })?;
        debug!(tabla = t.nombre, n = filas.len(), "insert");
        Ok(())
    }

    fn select(&self, nombre: &str, consulta: &Consulta) -> Resultado<Seleccionadas> {
        let t = tabla(nombre)?;
        let (conteo, lectura, params) = sentencias_select(t, consulta)?;
        self.con_cliente(|cliente| {
            let params = a_params(&params)?;
            let refs = referencias(&params);
            let total: i64 = cliente.query_one(conteo.as_str(), &refs)?.try_get(0usize)?;
            let mut filas = Vec::new();
            for row in cliente.query(lectura.as_str(), &refs)? {
                let mut fila = Fila::new();
                for (i, (c, tipo)) in t.columnas.iter().enumerate() {
                    fila.insert(c.to_string(), a_json(&row, i, *tipo)?);
                }
                filas.push(fila);
            }
            Ok(Seleccionadas { filas, total: usize::try_from(total).unwrap_or(0) })
        })
    }

    fn upsert(&self, nombre: &str, fila: &Fila, clave_conflicto: &str) -> Resultado<()> {
        let t = tabla(nombre)?;
        let (sql, params) = sentencia_upsert(t, fila, clave_conflicto)?;
        self.con_cliente(|cliente| {
            let params = a_params(&params)?;
            cliente.execute(sql.as_str(), &referencias(&params))?;
            Ok(())
        })
    }

    fn delete(&self, nombre: &str, filtro: &Filtro) -> Resultado<usize> {
        let t = tabla(nombre)?;
        if filtro.es_vacio() {
            return Err(CuadernilloError::validacion("delete sin filtro"));
        }
        let mut params = Vec::new();
        let where_sql = esquema::clausula_where(t, filtro, &mut params, '$', plegar_columna)?;
        let sql = format!("DELETE FROM {}{}", t.nombre, where_sql);
        let n = self.con_cliente(|cliente| {
            let params = a_params(&params)?;
            Ok(cliente.execute(sql.as_str(), &referencias(&params))?)
        })?;
        debug!(tabla = t.nombre, n, "delete");
        Ok(usize::try_from(n).unwrap_or(usize::MAX))
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
    fn tildes_y_sus_pliegues_casan() {
        assert_eq!(CON_TILDE.chars().count(), SIN_TILDE.chars().count());
        for (con, sin) in CON_TILDE.chars().zip(SIN_TILDE.chars()) {
            assert_eq!(crate::catalogo::plegar(&con.to_string()), sin.to_lowercase().to_string());
        }
    }

    #[test]
    fn select_con_busqueda_orden_y_rango() {
        let t = tabla("cuadernillo").unwrap();
        let c = Consulta::new(Filtro::new().igual("fecha", "2025-08-01").contiene_alguna(&["unidad"], "Cáceres"))
            .ordenar(Orden::asc("tipo"))
            .rango(100, 149);
        let (conteo, lectura, params) = sentencias_select(t, &c).unwrap();
        assert!(conteo.starts_with("SELECT COUNT(*) FROM cuadernillo WHERE fecha = $1 AND (lower(translate(unidad,"));
        assert!(lectura.starts_with("SELECT id, created_at, session_key,"));
        assert!(lectura.contains("ORDER BY (tipo IS NULL) DESC, tipo ASC, id ASC"));
        assert!(lectura.ends_with(" LIMIT 50 OFFSET 100"));
        assert_eq!(params.len(), 2);
        assert_eq!(params[1].valor, json!("%caceres%"));
    }

    #[test]
    fn upsert_actualiza_todo_menos_la_clave() {
        let t = tabla("partes").unwrap();
        let (sql, params) = sentencia_upsert(t, &fila(json!({"pk": "p1", "zona": "Norte"})), "pk").unwrap();
        assert_eq!(sql, "INSERT INTO partes (pk, zona) VALUES ($1, $2) ON CONFLICT (pk) DO UPDATE SET zona = EXCLUDED.zona");
        assert_eq!(params.len(), 2);
        let (sql, _) = sentencia_upsert(t, &fila(json!({"pk": "p1"})), "pk").unwrap();
        assert!(sql.ends_with("ON CONFLICT (pk) DO NOTHING"));
        assert!(sentencia_upsert(t, &fila(json!({"zona": "x"})), "pk").is_err());
        assert!(sentencia_upsert(t, &fila(json!({"pk": "p2"})), "zona").is_err());
    }

    #[test]
    fn insert_sin_columnas_y_columna_desconocida() {
        let t = tabla("parte_filas").unwrap();
        let (sql, _) = sentencia_insert(t, &Fila::new()).unwrap();
        assert_eq!(sql, "INSERT INTO parte_filas DEFAULT VALUES");
        assert!(sentencia_insert(t, &fila(json!({"nope": 1}))).is_err());
    }

    #[test]
    fn conversion_por_tipo_de_columna() {
        assert!(a_pg(&json!(true), Tipo::Entero).is_ok());
        assert!(a_pg(&json!("2,5"), Tipo::Real).is_ok());
        assert!(a_pg(&json!(2.5), Tipo::Entero).is_err());
        assert!(a_pg(&json!("mucho"), Tipo::Real).is_err());
        assert!(a_pg(&json!([1]), Tipo::Real).is_err());
        assert!(a_pg(&Value::Null, Tipo::Real).is_ok());
    }

    /// Sólo corre con `CUADERNILLO_TEST_PG_URL` apuntando a una base de pruebas.
    #[test]
    fn ida_y_vuelta_contra_postgres() {
        let Ok(url) = std::env::var("CUADERNILLO_TEST_PG_URL") else {
            return;
        };
        let db = PostgresFilas::abrir(&url).unwrap();
        let pk = format!("prueba:{}", uuid::Uuid::new_v4());
        db.upsert("partes", &fila(json!({"pk": pk, "zona": "Norte", "horas_extras_total": 2.5})), "pk").unwrap();
        db.insert("parte_filas", &[fila(json!({"parte_pk": pk, "componente_id": "c", "abono_df": true}))]).unwrap();
        let r = db.select("parte_filas", &Consulta::new(Filtro::new().igual("parte_pk", pk.as_str()))).unwrap();
        assert_eq!(r.total, 1);
        assert_eq!(r.filas[0]["abono_df"], json!(1));
        let r = db.select("partes", &Consulta::new(Filtro::new().igual("pk", pk.as_str()))).unwrap();
        assert_eq!(r.filas[0]["horas_extras_total"], json!(2.5));
        assert_eq!(db.delete("parte_filas", &Filtro::new().igual("parte_pk", pk.as_str())).unwrap(), 1);
        assert_eq!(db.delete("partes", &Filtro::new().igual("pk", pk.as_str())).unwrap(), 1);
    }
}
