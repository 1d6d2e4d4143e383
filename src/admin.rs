//! Sesiones de administración: login con las credenciales configuradas y
//! tokens opacos guardados en memoria.

use crate::catalogo::plegar;
use crate::error::{CuadernilloError, Resultado};
use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};
use tracing::{info, warn};
use uuid::Uuid;

pub struct SesionesAdmin {
    usuario: String,
    clave: String,
    tokens: Mutex<HashSet<String>>,
}

impl SesionesAdmin {
    pub fn new(usuario: &str, clave: &str) -> Self {
        SesionesAdmin {
            usuario: usuario.to_string(),
            clave: clave.to_string(),
            tokens: Mutex::new(HashSet::new()),
        }
    }

    fn tokens(&self) -> MutexGuard<'_, HashSet<String>> {
        self.tokens.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// El usuario se compara sin tildes ni mayúsculas; la clave, exacta.
    pub fn login(&self, usuario: &str, clave: &str) -> Resultado<String> {
        if plegar(usuario) != plegar(&self.usuario) || clave != self.clave {
            warn!("intento de acceso de administración rechazado");
            return Err(CuadernilloError::NoAutorizado);
        }
        let token = Uuid::new_v4().to_string();
        self.tokens().insert(token.clone());
        info!("sesión de administración abierta");
        Ok(token)
    }

    pub fn es_valido(&self, token: &str) -> bool {
        self.tokens().contains(token)
    }

    pub fn logout(&self, token: &str) -> bool {
        self.tokens().remove(token)
    }
}
