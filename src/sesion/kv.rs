//! Almacén clave-valor local. Los valores son texto JSON.

use crate::error::Resultado;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

pub trait AlmacenClaveValor: Send + Sync {
    fn get(&self, clave: &str) -> Resultado<Option<String>>;
    fn set(&self, clave: &str, valor: &str) -> Resultado<()>;
    fn remove(&self, clave: &str) -> Resultado<()>;
}

fn bloquear<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|envenenado| envenenado.into_inner())
}

#[derive(Debug, Default)]
pub struct KvMemoria {
    datos: Mutex<HashMap<String, String>>,
}

impl KvMemoria {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AlmacenClaveValor for KvMemoria {
    fn get(&self, clave: &str) -> Resultado<Option<String>> {
        Ok(bloquear(&self.datos).get(clave).cloned())
    }

    fn set(&self, clave: &str, valor: &str) -> Resultado<()> {
        bloquear(&self.datos).insert(clave.to_string(), valor.to_string());
        Ok(())
    }

    fn remove(&self, clave: &str) -> Resultado<()> {
        bloquear(&self.datos).remove(clave);
        Ok(())
    }
}

/// Almacén clave-valor persistente en un fichero SQLite.
pub struct KvSqlite {
    conn: Mutex<Connection>,
}

impl KvSqlite {
    pub fn abrir(ruta: &Path) -> Resultado<Self> {
        if let Some(dir) = ruta.parent() {
            if !dir.as_os_str().is_empty() && !dir.exists() {
                std::fs::create_dir_all(dir)?;
            }
        }
        Self::con_conexion(Connection::open(ruta)?)
    }

    pub fn en_memoria() -> Resultado<Self> {
        Self::con_conexion(Connection::open_in_memory()?)
    }

    fn con_conexion(conn: Connection) -> Resultado<Self> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS kv (clave TEXT PRIMARY KEY, valor TEXT NOT NULL)",
            [],
        )?;
        Ok(KvSqlite { conn: Mutex::new(conn) })
    }
}

impl AlmacenClaveValor for KvSqlite {
    fn get(&self, clave: &str) -> Resultado<Option<String>> {
        let conn = bloquear(&self.conn);
        let valor = conn
            .query_row("SELECT valor FROM kv WHERE clave = ?1", params![clave], |r| r.get::<_, String>(0))
            .optional()?;
        Ok(valor)
    }

    fn set(&self, clave: &str, valor: &str) -> Resultado<()> {
        bloquear(&self.conn).execute("REPLACE INTO kv (clave, valor) VALUES (?1, ?2)", params![clave, valor])?;
        Ok(())
    }

    fn remove(&self, clave: &str) -> Resultado<()> {
        bloquear(&self.conn).execute("DELETE FROM kv WHERE clave = ?1", params![clave])?;
        Ok(())
    }
}
