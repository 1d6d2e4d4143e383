//! Agrupa escrituras remotas rápidas: para cada clave sólo se ejecuta la
//! última tarea programada, `retardo` después de la última llamada.
//!
//! Una tarea cuyo retardo ya venció no se cancela aunque llegue otra nueva
//! con la misma clave. Las tareas pendientes al cerrar el proceso se pierden.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::trace;

type Pendientes = HashMap<String, (u64, JoinHandle<()>)>;

pub struct Debouncer {
    retardo: Duration,
    pendientes: Arc<Mutex<Pendientes>>,
    secuencia: AtomicU64,
}

fn bloquear(m: &Mutex<Pendientes>) -> MutexGuard<'_, Pendientes> {
    m.lock().unwrap_or_else(|envenenado| envenenado.into_inner())
}

impl Debouncer {
    pub fn new(retardo: Duration) -> Self {
        Debouncer {
            retardo,
            pendientes: Arc::new(Mutex::new(HashMap::new())),
            secuencia: AtomicU64::new(0),
        }
    }

    pub fn retardo(&self) -> Duration {
        self.retardo
    }

    /// Programa `tarea` para la clave, sustituyendo la pendiente si la hay.
    /// Debe llamarse dentro de un runtime de tokio.
    pub fn programar<F, Fut>(&self, clave: impl Into<String>, tarea: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let clave = clave.into();
        let id = self.secuencia.fetch_add(1, Ordering::Relaxed);
        let retardo = self.retardo;
        let pendientes = Arc::clone(&self.pendientes);

        let mut mapa = bloquear(&self.pendientes);
        if let Some((_, anterior)) = mapa.remove(&clave) {
            anterior.abort();
            trace!(clave = %clave, "escritura pendiente sustituida");
        }
        let clave_tarea = clave.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(retardo).await;
            {
                let mut mapa = bloquear(&pendientes);
                if !matches!(mapa.get(&clave_tarea), Some((actual, _)) if *actual == id) {
                    // otra tarea la sustituyó mientras esperaba el cerrojo
                    return;
                }
                // a partir de aquí ya no se puede abortar
                mapa.remove(&clave_tarea);
            }
            tarea().await;
        });
        mapa.insert(clave, (id, handle));
    }

    /// Número de tareas que aún esperan su retardo.
    pub fn pendientes(&self) -> usize {
        bloquear(&self.pendientes).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[tokio::test]
    async fn solo_se_ejecuta_la_ultima() {
        let d = Debouncer::new(Duration::from_millis(40));
        let ejecutadas = Arc::new(AtomicUsize::new(0));
        let ultimo = Arc::new(AtomicUsize::new(0));
        for i in 1..=5 {
            let ejecutadas = ejecutadas.clone();
            let ultimo = ultimo.clone();
            d.programar("parte-1", move || async move {
                ejecutadas.fetch_add(1, Ordering::SeqCst);
                ultimo.store(i, Ordering::SeqCst);
            });
        }
        assert_eq!(d.pendientes(), 1);
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(ejecutadas.load(Ordering::SeqCst), 1);
        assert_eq!(ultimo.load(Ordering::SeqCst), 5);
        assert_eq!(d.pendientes(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn sustituida_mientras_espera_el_cerrojo_no_se_ejecuta() {
        let d = Debouncer::new(Duration::from_millis(10));
        let ejecutadas = Arc::new(AtomicUsize::new(0));
        {
            let ejecutadas = ejecutadas.clone();
            d.programar("parte-1", move || async move {
                ejecutadas.fetch_add(1, Ordering::SeqCst);
            });
        }
        {
            let mut mapa = bloquear(&d.pendientes);
            // la tarea vence su retardo y se queda esperando el cerrojo
            std::thread::sleep(Duration::from_millis(60));
            // lo mismo que hace `programar` al sustituirla
            let (_, anterior) = mapa.remove("parte-1").unwrap();
            anterior.abort();
            mapa.insert("parte-1".to_string(), (u64::MAX, tokio::spawn(async {})));
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(ejecutadas.load(Ordering::SeqCst), 0);
        assert_eq!(d.pendientes(), 1);
    }

    #[tokio::test]
    async fn claves_distintas_no_se_pisan() {
        let d = Debouncer::new(Duration::from_millis(20));
        let ejecutadas = Arc::new(AtomicUsize::new(0));
        for clave in ["a", "b", "c"] {
            let ejecutadas = ejecutadas.clone();
            d.programar(clave, move || async move {
                ejecutadas.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert_eq!(d.pendientes(), 3);
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(ejecutadas.load(Ordering::SeqCst), 3);
    }
}
